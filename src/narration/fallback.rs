//! Offline narration and the never-failing fallback wrapper.
//!
//! [`TemplateNarrator`] writes a sentence from the seed text alone.
//! [`FallbackNarrator`] wraps any [`ResponseGenerator`] and answers with the
//! template sentence whenever the wrapped backend errors, so a dead LLM
//! endpoint degrades narration instead of silencing it.

use async_trait::async_trait;

use super::generator::{IntentKind, NarrationContext, NarrationError, ResponseGenerator};

/// Longest excerpt quoted by the template, in characters.
const TEMPLATE_EXCERPT_CHARS: usize = 160;

// ---------------------------------------------------------------------------
// TemplateNarrator
// ---------------------------------------------------------------------------

/// Builds narration from the step title and description.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    pub fn render(intent: IntentKind, context: &NarrationContext) -> String {
        let title = context.section.trim();
        let description = context.description.trim();
        match intent {
            IntentKind::TourStep => match (title.is_empty(), description.is_empty()) {
                (true, true) => String::new(),
                (false, true) => format!("This is the {title} section."),
                (true, false) => description.to_string(),
                (false, false) => format!("{title}. {description}"),
            },
            IntentKind::SectionOverview => {
                let body = context
                    .excerpt
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(|e| clip_sentence(e, TEMPLATE_EXCERPT_CHARS))
                    .unwrap_or_else(|| description.to_string());
                if title.is_empty() {
                    body
                } else if body.is_empty() {
                    format!("You're looking at {title}.")
                } else {
                    format!("You're looking at {title}. {body}")
                }
            }
        }
    }
}

/// Clip at a word boundary and mark the cut.
fn clip_sentence(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let clipped: String = text.chars().take(max_chars).collect();
    let cut = clipped.rfind(' ').unwrap_or(clipped.len());
    format!("{}…", clipped[..cut].trim_end())
}

#[async_trait]
impl ResponseGenerator for TemplateNarrator {
    async fn generate(
        &self,
        intent: IntentKind,
        context: &NarrationContext,
    ) -> Result<String, NarrationError> {
        let text = Self::render(intent, context);
        if text.is_empty() {
            return Err(NarrationError::EmptyResponse);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// FallbackNarrator
// ---------------------------------------------------------------------------

/// Wraps any [`ResponseGenerator`]; on failure returns the template text.
pub struct FallbackNarrator<G: ResponseGenerator> {
    inner: G,
}

impl<G: ResponseGenerator> FallbackNarrator<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: ResponseGenerator> ResponseGenerator for FallbackNarrator<G> {
    async fn generate(
        &self,
        intent: IntentKind,
        context: &NarrationContext,
    ) -> Result<String, NarrationError> {
        match self.inner.generate(intent, context).await {
            Ok(text) => Ok(text),
            Err(err) => {
                log::warn!("narration backend failed ({err}); using template");
                TemplateNarrator.generate(intent, context).await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
