//! Per-section text index handed to the narration generator as context.
//!
//! [`PageAnalyzer::extract_page_content`] is a pure projection of the
//! document; nothing here writes back.

use super::analyzer::PageAnalyzer;
use super::document::Document;

/// Text of one section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionContent {
    pub id: String,
    pub title: String,
    pub text: String,
    pub word_count: usize,
}

/// Text index of a whole page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sections: Vec<SectionContent>,
}

impl PageContent {
    /// Sections mentioning any word of `query` (case-insensitive), best
    /// match first.  Ties keep page order.
    pub fn search(&self, query: &str) -> Vec<&SectionContent> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| t.len() > 2)
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &SectionContent)> = self
            .sections
            .iter()
            .filter_map(|s| {
                let title = s.title.to_lowercase();
                let text = s.text.to_lowercase();
                let score: usize = terms
                    .iter()
                    .map(|t| usize::from(text.contains(t.as_str())) + 2 * usize::from(title.contains(t.as_str())))
                    .sum();
                (score > 0).then_some((score, s))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, s)| s).collect()
    }

    /// Section text by id.
    pub fn section(&self, id: &str) -> Option<&SectionContent> {
        self.sections.iter().find(|s| s.id == id)
    }
}

impl PageAnalyzer {
    /// Build the text index for every discovered section.
    pub fn extract_page_content(&self, doc: &Document) -> PageContent {
        let map = self.analyze_page(doc);
        let sections = map
            .sections
            .iter()
            .filter_map(|s| {
                doc.element(s.element)?;
                let text = doc.text_content(s.element.index);
                Some(SectionContent {
                    id: s.id.clone(),
                    title: s.title.clone(),
                    word_count: text.split_whitespace().count(),
                    text,
                })
            })
            .collect();

        PageContent {
            title: map.title,
            description: doc.meta_description(),
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Cafe</title>
        <meta name="description" content="Coffee and cake"></head><body>
        <section id="menu"><h2>Menu</h2><p>Espresso, flat white and carrot cake.</p></section>
        <section id="hours"><h2>Opening hours</h2><p>Open daily from eight. Cake sells out fast.</p></section>
        </body></html>"#;

    #[test]
    fn extracts_text_per_section() {
        let doc = Document::parse_html(PAGE);
        let content = PageAnalyzer::default().extract_page_content(&doc);

        assert_eq!(content.title.as_deref(), Some("Cafe"));
        assert_eq!(content.description.as_deref(), Some("Coffee and cake"));
        assert_eq!(content.sections.len(), 2);

        let menu = content.section("menu").unwrap();
        assert_eq!(menu.text, "Menu Espresso, flat white and carrot cake.");
        assert_eq!(menu.word_count, 7);
    }

    #[test]
    fn search_prefers_title_hits() {
        let doc = Document::parse_html(PAGE);
        let content = PageAnalyzer::default().extract_page_content(&doc);

        let hits: Vec<&str> = content.search("opening cake").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(hits, vec!["hours", "menu"]);
        assert!(content.search("xy").is_empty());
    }

    #[test]
    fn extraction_does_not_touch_the_document() {
        let doc = Document::parse_html(PAGE);
        let before = format!("{doc:?}");
        let _ = PageAnalyzer::default().extract_page_content(&doc);
        assert_eq!(format!("{doc:?}"), before);
    }
}
