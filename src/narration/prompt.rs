//! Prompt builder for spoken tour narration.
//!
//! [`PromptBuilder`] produces a `(system_msg, user_msg)` pair for any
//! OpenAI-compatible chat endpoint.  The language is chosen at construction
//! from a BCP-47 tag (`"en-US"`, `"th-TH"` …); English and Thai have
//! dedicated instructions and anything else falls back to English.

use super::generator::{IntentKind, NarrationContext};

// ---------------------------------------------------------------------------
// System instructions
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION_EN: &str = "\
You are a friendly voice guide walking a visitor through a web page.
Rules:
1. Speak in one or two short sentences; this text is read aloud.
2. Mention the section by name.
3. No markdown, lists, emoji or URLs.
4. Do not invent facts that are not in the provided text.";

const SYSTEM_INSTRUCTION_TH: &str = "\
คุณคือไกด์เสียงที่พาผู้เยี่ยมชมดูหน้าเว็บ
กฎ:
1. พูดสั้น ๆ หนึ่งถึงสองประโยค เพราะข้อความนี้จะถูกอ่านออกเสียง
2. เอ่ยชื่อส่วนของหน้าเว็บ
3. ห้ามใช้ markdown รายการ อีโมจิ หรือ URL
4. ห้ามแต่งข้อมูลที่ไม่มีในข้อความที่ให้มา";

/// Longest excerpt passed to the model, in characters.
const MAX_EXCERPT_CHARS: usize = 600;

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds narration prompts.
///
/// # Example
/// ```rust
/// use voice_tour::narration::{IntentKind, NarrationContext, PromptBuilder};
///
/// let builder = PromptBuilder::new("en-US");
/// let ctx = NarrationContext {
///     section: "Projects".into(),
///     description: "Recent work".into(),
///     excerpt: None,
/// };
/// let (system, user) = builder.build_chat(IntentKind::TourStep, &ctx);
/// assert!(system.contains("voice guide"));
/// assert!(user.contains("Projects"));
/// ```
pub struct PromptBuilder {
    language: String,
}

impl PromptBuilder {
    /// Create a builder for a BCP-47 tag; only the primary subtag matters.
    pub fn new(language: &str) -> Self {
        let primary = language
            .split(['-', '_'])
            .next()
            .unwrap_or("en")
            .to_ascii_lowercase();
        Self { language: primary }
    }

    /// Build a `(system_msg, user_msg)` pair.
    pub fn build_chat(&self, intent: IntentKind, context: &NarrationContext) -> (String, String) {
        let system_msg = self.system_instruction().to_string();

        let task = match intent {
            IntentKind::TourStep => "The tour just moved to this section. Introduce it.",
            IntentKind::SectionOverview => "The visitor asked what this section is about. Summarise it.",
        };

        let mut user_msg = String::with_capacity(1024);
        user_msg.push_str(task);
        user_msg.push_str(&format!("\nSection: {}\n", context.section));
        if !context.description.is_empty() {
            user_msg.push_str(&format!("Description: {}\n", context.description));
        }
        if let Some(excerpt) = context.excerpt.as_deref().filter(|e| !e.is_empty()) {
            let clipped: String = excerpt.chars().take(MAX_EXCERPT_CHARS).collect();
            user_msg.push_str(&format!("Page text: {clipped}\n"));
        }
        user_msg.push_str("\nNarration:\n");

        (system_msg, user_msg)
    }

    fn system_instruction(&self) -> &'static str {
        match self.language.as_str() {
            "th" => SYSTEM_INSTRUCTION_TH,
            _ => SYSTEM_INSTRUCTION_EN,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(excerpt: Option<&str>) -> NarrationContext {
        NarrationContext {
            section: "Pricing".into(),
            description: "Plans and prices".into(),
            excerpt: excerpt.map(str::to_string),
        }
    }

    #[test]
    fn step_prompt_carries_section_and_description() {
        let (system, user) = PromptBuilder::new("en-US").build_chat(IntentKind::TourStep, &ctx(None));

        assert!(system.contains("read aloud"));
        assert!(user.contains("Section: Pricing"));
        assert!(user.contains("Description: Plans and prices"));
        assert!(!user.contains("Page text:"));
        assert!(user.ends_with("Narration:\n"));
    }

    #[test]
    fn overview_prompt_clips_long_excerpts() {
        let long = "x".repeat(MAX_EXCERPT_CHARS * 2);
        let (_, user) =
            PromptBuilder::new("en").build_chat(IntentKind::SectionOverview, &ctx(Some(&long)));

        assert!(user.contains("Summarise"));
        assert!(user.contains(&"x".repeat(MAX_EXCERPT_CHARS)));
        assert!(!user.contains(&"x".repeat(MAX_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn thai_tag_selects_thai_instruction() {
        let (system, _) = PromptBuilder::new("th-TH").build_chat(IntentKind::TourStep, &ctx(None));
        assert!(system.contains("ไกด์เสียง"));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let (system, _) = PromptBuilder::new("ja-JP").build_chat(IntentKind::TourStep, &ctx(None));
        assert!(system.contains("voice guide"));
    }
}
