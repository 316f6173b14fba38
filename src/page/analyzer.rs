//! Page-structure analysis: document → [`PageMap`].
//!
//! The analyzer only reads the document.  A [`PageMap`] is a snapshot: its
//! element handles stop resolving once the document remounts, and its rects
//! go stale on reflow, so callers re-run [`PageAnalyzer::analyze_page`]
//! instead of caching maps across navigation or tour starts.


use crate::config::AnalyzerSettings;

use super::document::{Document, ElementHandle, Rect};
use super::locator::{get_selector, Locator};

/// Title given to sections without discoverable heading text.  Tour
/// synthesis skips sections carrying it.
pub const UNTITLED_SECTION: &str = "Untitled Section";

/// Tags that open a section on their own.
const CONTAINER_TAGS: &[&str] = &["section", "article", "header", "footer", "aside"];

// ---------------------------------------------------------------------------
// PageMap types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    pub title: String,
    /// Rank of the titling heading, `0` when the section has none.
    pub level: u8,
    pub element: ElementHandle,
    pub rect: Rect,
    pub locator: Locator,
}

impl Section {
    pub fn is_untitled(&self) -> bool {
        self.title == UNTITLED_SECTION
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadingInfo {
    pub level: u8,
    pub text: String,
    pub id: Option<String>,
    pub element: ElementHandle,
    pub locator: Locator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkInfo {
    pub text: String,
    pub href: String,
    /// Same-page anchor or relative URL.
    pub internal: bool,
    pub element: ElementHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavItem {
    pub label: String,
    pub links: Vec<LinkInfo>,
    pub element: ElementHandle,
    pub rect: Rect,
    pub locator: Locator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    /// `type` of an `<input>`, otherwise the tag name.
    pub kind: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub fields: Vec<FormField>,
    pub element: ElementHandle,
    pub rect: Rect,
    pub locator: Locator,
}

impl FormInfo {
    /// Name or id mentions "contact" (case-insensitive).
    pub fn is_contact_form(&self) -> bool {
        [self.name.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .any(|s| s.to_lowercase().contains("contact"))
    }
}

/// Structural snapshot of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMap {
    pub title: Option<String>,
    /// Document generation the snapshot was taken at.
    pub generation: u64,
    pub sections: Vec<Section>,
    pub navigation: Vec<NavItem>,
    pub forms: Vec<FormInfo>,
    pub headings: Vec<HeadingInfo>,
    pub links: Vec<LinkInfo>,
}

impl PageMap {
    /// `false` once the document has remounted since analysis.
    pub fn is_current(&self, doc: &Document) -> bool {
        self.generation == doc.generation()
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// PageAnalyzer
// ---------------------------------------------------------------------------

/// Builds [`PageMap`]s and applies the tour ordering/size policy.
#[derive(Debug, Clone, Default)]
pub struct PageAnalyzer {
    settings: AnalyzerSettings,
}

impl PageAnalyzer {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Discover sections, headings, links, navigation regions and forms.
    pub fn analyze_page(&self, doc: &Document) -> PageMap {
        let links = self.links_within(doc, doc.indices());
        let map = PageMap {
            title: doc.title(),
            generation: doc.generation(),
            sections: self.sections(doc),
            navigation: self.navigation(doc),
            forms: self.forms(doc),
            headings: self.headings(doc),
            links,
        };
        log::debug!(
            "analyzer: {} sections, {} headings, {} links, {} nav, {} forms",
            map.sections.len(),
            map.headings.len(),
            map.links.len(),
            map.navigation.len(),
            map.forms.len()
        );
        map
    }

    /// Titled sections tall enough to be worth a tour stop, in reading order.
    pub fn tour_sections<'a>(&self, map: &'a PageMap) -> Vec<&'a Section> {
        let mut sections: Vec<&Section> = map
            .sections
            .iter()
            .filter(|s| !s.is_untitled() && s.rect.height >= self.settings.min_section_height)
            .collect();
        sort_reading_order(&mut sections, self.settings.row_band);
        sections
    }

    // -----------------------------------------------------------------------
    // Sections
    // -----------------------------------------------------------------------

    fn is_container(doc: &Document, index: usize) -> bool {
        doc.get(index).is_some_and(|el| {
            CONTAINER_TAGS.contains(&el.tag.as_str())
                || Self::is_explicit_marker(doc, index)
        })
    }

    fn is_explicit_marker(doc: &Document, index: usize) -> bool {
        doc.get(index)
            .is_some_and(|el| el.attr("data-section").is_some() || el.attr("role") == Some("region"))
    }

    fn sections(&self, doc: &Document) -> Vec<Section> {
        let mut roots: Vec<usize> = Vec::new();

        for i in doc.indices() {
            if doc.is_hidden(i) || !Self::is_container(doc, i) {
                continue;
            }
            let nested = doc.ancestors(i).any(|a| Self::is_container(doc, a));
            if nested && !Self::is_explicit_marker(doc, i) {
                continue;
            }
            roots.push(i);
        }

        // Headings outside every container demarcate their own section.
        for i in doc.indices() {
            let Some(level) = doc.get(i).and_then(|e| e.heading_level()) else {
                continue;
            };
            if level > 2 || doc.is_hidden(i) || doc.ancestors(i).any(|a| Self::is_container(doc, a)) {
                continue;
            }
            let owner = match doc.get(i).and_then(|e| e.parent) {
                Some(p) if !matches!(doc.get(p).map(|e| e.tag.as_str()), Some("body" | "html" | "main")) => p,
                _ => i,
            };
            if !roots.contains(&owner) {
                roots.push(owner);
            }
        }
        roots.sort_unstable();

        roots
            .into_iter()
            .enumerate()
            .filter_map(|(n, index)| {
                let el = doc.get(index)?;
                let (title, level) = section_title(doc, index);
                let id = el
                    .id()
                    .or_else(|| el.attr("data-section").filter(|v| !v.is_empty()))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("section-{}", n + 1));
                Some(Section {
                    id,
                    title,
                    level,
                    element: doc.handle(index),
                    rect: el.rect,
                    locator: get_selector(doc, index),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Headings / links / navigation / forms
    // -----------------------------------------------------------------------

    fn headings(&self, doc: &Document) -> Vec<HeadingInfo> {
        doc.indices()
            .filter(|&i| !doc.is_hidden(i))
            .filter_map(|i| {
                let el = doc.get(i)?;
                let level = el.heading_level()?;
                let text = doc.text_content(i);
                if text.is_empty() {
                    return None;
                }
                Some(HeadingInfo {
                    level,
                    text,
                    id: el.id().map(str::to_string),
                    element: doc.handle(i),
                    locator: get_selector(doc, i),
                })
            })
            .collect()
    }

    fn links_within(&self, doc: &Document, scope: impl IntoIterator<Item = usize>) -> Vec<LinkInfo> {
        scope
            .into_iter()
            .filter(|&i| !doc.is_hidden(i))
            .filter_map(|i| {
                let el = doc.get(i)?;
                if el.tag != "a" {
                    return None;
                }
                let href = el.attr("href")?.trim().to_string();
                let text = Some(doc.text_content(i))
                    .filter(|t| !t.is_empty())
                    .or_else(|| el.attr("aria-label").map(str::to_string))
                    .unwrap_or_else(|| href.clone());
                Some(LinkInfo {
                    internal: is_internal_href(&href),
                    text,
                    href,
                    element: doc.handle(i),
                })
            })
            .collect()
    }

    fn navigation(&self, doc: &Document) -> Vec<NavItem> {
        doc.indices()
            .filter(|&i| !doc.is_hidden(i))
            .filter_map(|i| {
                let el = doc.get(i)?;
                if el.tag != "nav" && el.attr("role") != Some("navigation") {
                    return None;
                }
                let label = el
                    .attr("aria-label")
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| l.trim().to_string())
                    .unwrap_or_else(|| "Navigation".to_string());
                Some(NavItem {
                    label,
                    links: self.links_within(doc, doc.descendants(i)),
                    element: doc.handle(i),
                    rect: el.rect,
                    locator: get_selector(doc, i),
                })
            })
            .collect()
    }

    fn forms(&self, doc: &Document) -> Vec<FormInfo> {
        doc.indices()
            .filter(|&i| !doc.is_hidden(i))
            .filter_map(|i| {
                let el = doc.get(i)?;
                if el.tag != "form" {
                    return None;
                }
                let fields = doc
                    .descendants(i)
                    .into_iter()
                    .filter_map(|f| form_field(doc, f))
                    .collect();
                Some(FormInfo {
                    id: el.id().map(str::to_string),
                    name: el.attr("name").map(str::to_string),
                    fields,
                    element: doc.handle(i),
                    rect: el.rect,
                    locator: get_selector(doc, i),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Title and heading rank for the section rooted at `index`.
fn section_title(doc: &Document, index: usize) -> (String, u8) {
    let heading = std::iter::once(index)
        .chain(doc.descendants(index))
        .filter(|&i| !doc.is_hidden(i))
        .find_map(|i| {
            let level = doc.get(i)?.heading_level()?;
            let text = doc.text_content(i);
            (!text.is_empty()).then_some((text, level))
        });
    if let Some(found) = heading {
        return found;
    }
    let label = doc
        .get(index)
        .and_then(|e| e.attr("aria-label"))
        .map(str::trim)
        .filter(|l| !l.is_empty());
    match label {
        Some(label) => (label.to_string(), 0),
        None => (UNTITLED_SECTION.to_string(), 0),
    }
}

fn form_field(doc: &Document, index: usize) -> Option<FormField> {
    let el = doc.get(index)?;
    let kind = match el.tag.as_str() {
        "input" => el.attr("type").unwrap_or("text").to_ascii_lowercase(),
        "select" | "textarea" => el.tag.clone(),
        _ => return None,
    };
    if matches!(kind.as_str(), "hidden" | "submit" | "button" | "reset") {
        return None;
    }
    let name = el
        .attr("name")
        .or_else(|| el.id())
        .unwrap_or(&kind)
        .to_string();
    let label = el
        .id()
        .and_then(|id| {
            doc.indices().find(|&l| {
                doc.get(l)
                    .is_some_and(|e| e.tag == "label" && e.attr("for") == Some(id))
            })
        })
        .map(|l| doc.text_content(l))
        .filter(|t| !t.is_empty())
        .or_else(|| el.attr("aria-label").map(str::to_string))
        .or_else(|| el.attr("placeholder").map(str::to_string));
    Some(FormField { name, kind, label })
}

fn is_internal_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("tel:") || lower.starts_with("javascript:") {
        return false;
    }
    href.starts_with('#') || href.starts_with('/') || !href.contains("://")
}

/// Sort into reading order: top to bottom, then left to right within a row.
///
/// A row starts at the topmost remaining section and takes in every section
/// whose top is less than `band` below that start.
pub fn sort_reading_order(sections: &mut [&Section], band: f32) {
    sections.sort_by(|a, b| a.rect.top().total_cmp(&b.rect.top()));

    let mut rows = Vec::with_capacity(sections.len());
    let mut row = 0usize;
    let mut row_top = sections.first().map(|s| s.rect.top()).unwrap_or_default();
    for s in sections.iter() {
        if s.rect.top() - row_top >= band {
            row += 1;
            row_top = s.rect.top();
        }
        rows.push(row);
    }

    let mut keyed: Vec<(usize, &Section)> = rows.into_iter().zip(sections.iter().copied()).collect();
    keyed.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then(a.rect.left().total_cmp(&b.rect.left())));
    for (slot, (_, s)) in sections.iter_mut().zip(keyed) {
        *slot = s;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PORTFOLIO: &str = r##"<html><head><title>Portfolio</title></head><body>
        <nav aria-label="Primary"><a href="#about">About</a><a href="https://github.com/x">GitHub</a></nav>
        <header id="hero"><h1>Jane Doe</h1><p>Engineer</p></header>
        <main>
          <section id="about"><h2>About Me</h2><p>I build things.</p>
            <article><h3>Nested article</h3></article>
          </section>
          <section data-section="projects"><h2>Projects</h2></section>
          <section><p>No heading here</p></section>
          <h2>Loose heading</h2>
        </main>
        <form id="contact-form" name="contact">
          <label for="email">Your email</label><input id="email" name="email" type="email">
          <textarea name="message" placeholder="Say hi"></textarea>
          <input type="hidden" name="token"><button type="submit">Send</button>
        </form>
        <a href="mailto:jane@example.com">Mail</a>
      </body></html>"##;

    fn analyze(html: &str) -> (Document, PageMap) {
        let doc = Document::parse_html(html);
        let map = PageAnalyzer::default().analyze_page(&doc);
        (doc, map)
    }

    #[test]
    fn discovers_sections_in_document_order() {
        let (_, map) = analyze(PORTFOLIO);
        let ids: Vec<&str> = map.sections.iter().map(|s| s.id.as_str()).collect();
        let titles: Vec<&str> = map.sections.iter().map(|s| s.title.as_str()).collect();

        assert_eq!(ids, vec!["hero", "about", "projects", "section-4", "section-5"]);
        assert_eq!(
            titles,
            vec!["Jane Doe", "About Me", "Projects", UNTITLED_SECTION, "Loose heading"]
        );
        assert_eq!(map.sections[0].level, 1);
        assert_eq!(map.sections[3].level, 0);
    }

    #[test]
    fn analysis_is_deterministic() {
        let doc = Document::parse_html(PORTFOLIO);
        let analyzer = PageAnalyzer::default();
        assert_eq!(analyzer.analyze_page(&doc), analyzer.analyze_page(&doc));
    }

    #[test]
    fn collects_links_navigation_and_forms() {
        let (_, map) = analyze(PORTFOLIO);

        assert_eq!(map.title.as_deref(), Some("Portfolio"));
        assert_eq!(map.navigation.len(), 1);
        assert_eq!(map.navigation[0].label, "Primary");
        assert_eq!(map.navigation[0].links.len(), 2);
        assert!(map.navigation[0].links[0].internal);
        assert!(!map.navigation[0].links[1].internal);

        let mail = map.links.iter().find(|l| l.text == "Mail").unwrap();
        assert!(!mail.internal);

        let form = &map.forms[0];
        assert!(form.is_contact_form());
        let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["email", "message"]);
        assert_eq!(form.fields[0].label.as_deref(), Some("Your email"));
        assert_eq!(form.fields[1].label.as_deref(), Some("Say hi"));
    }

    #[test]
    fn headings_include_every_rank() {
        let (_, map) = analyze(PORTFOLIO);
        let levels: Vec<u8> = map.headings.iter().map(|h| h.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 2, 2]);
    }

    #[test]
    fn map_goes_stale_after_remount() {
        let (mut doc, map) = analyze(PORTFOLIO);
        assert!(map.is_current(&doc));
        doc.remount(PORTFOLIO);
        assert!(!map.is_current(&doc));
        assert!(doc.element(map.sections[0].element).is_none());
    }

    fn section_at(id: &str, x: f32, y: f32, height: f32, title: &str) -> Section {
        Section {
            id: id.into(),
            title: title.into(),
            level: 2,
            element: ElementHandle {
                index: 0,
                generation: 0,
            },
            rect: Rect::new(x, y, 400.0, height),
            locator: Locator::by_id(id),
        }
    }

    #[test]
    fn reading_order_groups_rows_within_band() {
        let left = section_at("left", 0.0, 1020.0, 300.0, "Left");
        let right = section_at("right", 600.0, 1000.0, 300.0, "Right");
        let top = section_at("top", 0.0, 0.0, 300.0, "Top");
        let mut sections = vec![&right, &left, &top];

        sort_reading_order(&mut sections, 50.0);

        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "left", "right"]);
    }

    #[test]
    fn reading_order_handles_staggered_layouts() {
        let owned: Vec<Section> = (0..200)
            .map(|i| {
                let left = ((i * 7919) % 1000) as f32;
                section_at(&format!("s{i}"), left, i as f32 * 40.0, 300.0, "Staggered")
            })
            .collect();
        let mut sections: Vec<&Section> = owned.iter().rev().collect();

        sort_reading_order(&mut sections, 50.0);

        assert_eq!(sections.len(), 200);
        // Rows start every 80px (tops 0/40, 80/120, ...) and read left to right.
        for pair in sections.chunks(2) {
            let row_top = pair[0].rect.top().min(pair[1].rect.top());
            assert_eq!(row_top % 80.0, 0.0);
            assert!(pair[0].rect.left() <= pair[1].rect.left());
        }
        assert!(sections
            .windows(2)
            .all(|w| w[0].rect.top() <= w[1].rect.top() + 40.0));
    }

    #[test]
    fn tour_sections_filter_small_and_untitled() {
        let map = PageMap {
            title: None,
            generation: 0,
            sections: vec![
                section_at("big", 0.0, 0.0, 400.0, "Big"),
                section_at("tiny", 0.0, 500.0, 149.0, "Tiny"),
                section_at("anon", 0.0, 800.0, 400.0, UNTITLED_SECTION),
            ],
            navigation: vec![],
            forms: vec![],
            headings: vec![],
            links: vec![],
        };
        let picked = PageAnalyzer::default().tour_sections(&map);
        let ids: Vec<&str> = picked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["big"]);
    }
}
