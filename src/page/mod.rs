//! Page structure — the live document and what the engine knows about it.
//!
//! # Pipeline
//!
//! ```text
//! HTML ─scraper─▶ Document (element arena + layout) ─PageAnalyzer─▶ PageMap
//!                     ▲                                   │
//!                     └──── Locator::resolve ◀── steps ◀──┘ (tour synthesis)
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use voice_tour::page::{Document, PageAnalyzer};
//!
//! let doc = Document::parse_html("<body><section id='about'><h2>About</h2></section></body>");
//! let map = PageAnalyzer::default().analyze_page(&doc);
//! assert_eq!(map.sections[0].title, "About");
//! assert_eq!(map.sections[0].locator.to_string(), "#about");
//! ```

pub mod analyzer;
pub mod content;
pub mod document;
pub mod layout;
pub mod locator;

pub use analyzer::{
    sort_reading_order, FormField, FormInfo, HeadingInfo, LinkInfo, NavItem, PageAnalyzer,
    PageMap, Section, UNTITLED_SECTION,
};
pub use content::{PageContent, SectionContent};
pub use document::{Document, Element, ElementHandle, Rect, SharedDocument};
pub use locator::{get_selector, Locator, LocatorError};
