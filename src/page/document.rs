//! Live host document: an owned element arena built from HTML.
//!
//! The HTML is parsed once with `scraper` and flattened into a `Vec` of
//! [`Element`]s in document (pre-)order, so index order *is* reading order
//! of the markup.  Everything downstream refers to elements through
//! [`ElementHandle`]s, which carry the document generation they were taken
//! from: after [`Document::remount`] every old handle stops resolving.
//!
//! The document is the one shared mutable resource of the engine and lives
//! behind [`SharedDocument`].  Never hold its lock across an `.await`.

use std::sync::{Arc, RwLock};

use scraper::{ElementRef, Html, Node};

use super::layout;
use super::locator::Locator;

/// Tags whose content is never rendered or read aloud.
const NON_RENDERED: &[&str] = &[
    "head", "script", "style", "noscript", "template", "meta", "link", "title",
];

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// Position snapshot of an element in document coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Element / ElementHandle
// ---------------------------------------------------------------------------

/// One element of the flattened document.
#[derive(Debug, Clone)]
pub struct Element {
    /// Lower-case tag name.
    pub tag: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
    /// Whitespace-normalised text of the element's *direct* text children.
    pub own_text: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub rect: Rect,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Heading rank for `h1`..`h6`.
    pub fn heading_level(&self) -> Option<u8> {
        match self.tag.as_str() {
            "h1" => Some(1),
            "h2" => Some(2),
            "h3" => Some(3),
            "h4" => Some(4),
            "h5" => Some(5),
            "h6" => Some(6),
            _ => None,
        }
    }

    /// Hidden by markup (not by an ancestor — see [`Document::is_hidden`]).
    fn hides_itself(&self) -> bool {
        if NON_RENDERED.contains(&self.tag.as_str()) || self.attr("hidden").is_some() {
            return true;
        }
        if self.attr("aria-hidden") == Some("true") {
            return true;
        }
        self.attr("style")
            .map(|s| {
                let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
                compact.contains("display:none") || compact.contains("visibility:hidden")
            })
            .unwrap_or(false)
    }
}

/// Weak reference into a [`Document`].
///
/// Resolves only while the document is still at the generation the handle
/// was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub index: usize,
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Thread-safe handle to the live document.
pub type SharedDocument = Arc<RwLock<Document>>;

/// The live document.
#[derive(Debug, Clone)]
pub struct Document {
    elements: Vec<Element>,
    generation: u64,
    viewport_width: f32,
}

impl Document {
    /// Parse `html` and lay it out at the default viewport width.
    pub fn parse_html(html: &str) -> Self {
        Self::parse_with_viewport(html, layout::DEFAULT_VIEWPORT_WIDTH)
    }

    /// Parse `html` and lay it out at `viewport_width`.
    pub fn parse_with_viewport(html: &str, viewport_width: f32) -> Self {
        let mut doc = Self {
            elements: Vec::new(),
            generation: 0,
            viewport_width,
        };
        doc.load(html);
        doc
    }

    /// Wrap into a [`SharedDocument`].
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    /// Replace the whole content, as a client-side re-render would.
    ///
    /// Bumps the generation so handles from earlier analyses stop resolving;
    /// locators keep working as long as the new markup still matches them.
    pub fn remount(&mut self, html: &str) {
        self.generation += 1;
        self.load(html);
        log::debug!("document: remounted at generation {}", self.generation);
    }

    fn load(&mut self, html: &str) {
        let parsed = Html::parse_document(html);
        self.elements.clear();
        self.push_element(parsed.root_element(), None);
        layout::flow(self, self.viewport_width);
    }

    fn push_element(&mut self, el: ElementRef<'_>, parent: Option<usize>) -> usize {
        let value = el.value();
        let index = self.elements.len();
        self.elements.push(Element {
            tag: value.name().to_ascii_lowercase(),
            attrs: value
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            own_text: String::new(),
            parent,
            children: Vec::new(),
            rect: Rect::default(),
        });

        let mut words: Vec<String> = Vec::new();
        let mut children = Vec::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => words.extend(text.split_whitespace().map(str::to_string)),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        children.push(self.push_element(child_el, Some(index)));
                    }
                }
                _ => {}
            }
        }

        let node = &mut self.elements[index];
        node.own_text = words.join(" ");
        node.children = children;
        index
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element by arena index (no generation check).
    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    /// Dereference a weak handle; `None` once the document has remounted.
    pub fn element(&self, handle: ElementHandle) -> Option<&Element> {
        if handle.generation != self.generation {
            return None;
        }
        self.elements.get(handle.index)
    }

    pub fn handle(&self, index: usize) -> ElementHandle {
        ElementHandle {
            index,
            generation: self.generation,
        }
    }

    /// Indices of every element in document order.
    pub fn indices(&self) -> std::ops::Range<usize> {
        0..self.elements.len()
    }

    /// Ancestors of `index`, nearest first.
    pub fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.elements.get(index).and_then(|e| e.parent), move |&i| {
            self.elements[i].parent
        })
    }

    /// Descendants of `index` in document order (excluding `index` itself).
    pub fn descendants(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.elements[index].children.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(i);
            stack.extend(self.elements[i].children.iter().rev().copied());
        }
        out
    }

    /// First element with tag `tag`.
    pub fn find_tag(&self, tag: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.tag == tag)
    }

    /// `<body>`, or the root when the markup has none.
    pub fn body(&self) -> usize {
        self.find_tag("body").unwrap_or(0)
    }

    /// Hidden by itself or by any ancestor.
    pub fn is_hidden(&self, index: usize) -> bool {
        std::iter::once(index)
            .chain(self.ancestors(index))
            .any(|i| self.elements[i].hides_itself())
    }

    /// Whitespace-normalised rendered text of `index` and its descendants.
    pub fn text_content(&self, index: usize) -> String {
        let mut words: Vec<&str> = Vec::new();
        self.collect_text(index, &mut words);
        words.join(" ")
    }

    fn collect_text<'a>(&'a self, index: usize, out: &mut Vec<&'a str>) {
        let el = &self.elements[index];
        if NON_RENDERED.contains(&el.tag.as_str()) && el.tag != "title" {
            return;
        }
        if !el.own_text.is_empty() {
            out.push(&el.own_text);
        }
        for &child in &el.children {
            self.collect_text(child, out);
        }
    }

    /// Contents of `<title>`.
    pub fn title(&self) -> Option<String> {
        self.find_tag("title")
            .map(|i| self.text_content(i))
            .filter(|t| !t.is_empty())
    }

    /// `content` of `<meta name="description">`.
    pub fn meta_description(&self) -> Option<String> {
        self.elements
            .iter()
            .find(|e| e.tag == "meta" && e.attr("name") == Some("description"))
            .and_then(|e| e.attr("content"))
            .map(str::to_string)
    }

    /// 1-based position of `index` among its parent's element children.
    pub fn nth_child(&self, index: usize) -> usize {
        self.elements[index]
            .parent
            .and_then(|p| self.elements[p].children.iter().position(|&c| c == index))
            .map(|pos| pos + 1)
            .unwrap_or(1)
    }

    /// Number of elements whose `id` attribute equals `id`.
    pub fn count_id(&self, id: &str) -> usize {
        self.elements.iter().filter(|e| e.id() == Some(id)).count()
    }

    // -----------------------------------------------------------------------
    // Locator resolution
    // -----------------------------------------------------------------------

    /// First element (document order) matched by `locator`.
    pub fn resolve(&self, locator: &Locator) -> Option<ElementHandle> {
        self.indices()
            .find(|&i| locator.matches(self, i))
            .map(|i| self.handle(i))
    }

    /// Parse `target` as a locator and resolve it; an unparsable target
    /// simply does not resolve.
    pub fn query(&self, target: &str) -> Option<ElementHandle> {
        match target.parse::<Locator>() {
            Ok(locator) => self.resolve(&locator),
            Err(e) => {
                log::warn!("document: bad locator {target:?}: {e}");
                None
            }
        }
    }

    /// Every element matched by `locator`, in document order.
    pub fn resolve_all(&self, locator: &Locator) -> Vec<usize> {
        self.indices().filter(|&i| locator.matches(self, i)).collect()
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    /// Override an element's rect with real layout from the host.
    pub fn set_rect(&mut self, index: usize, rect: Rect) {
        if let Some(el) = self.elements.get_mut(index) {
            el.rect = rect;
        }
    }

    /// Re-run the flow-layout estimate, e.g. after a viewport change.
    pub fn reflow(&mut self, viewport_width: f32) {
        self.viewport_width = viewport_width;
        layout::flow(self, viewport_width);
    }

    pub(super) fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
