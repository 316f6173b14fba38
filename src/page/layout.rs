//! Flow-layout estimate for documents that arrive without real geometry.
//!
//! Block elements stack top to bottom at full container width; inline
//! elements contribute their text to the enclosing block and sit on its
//! first line.  Height comes from an estimated line count.  Hosts that know
//! the real layout overwrite the result with [`Document::set_rect`].
//!
//! [`Document::set_rect`]: super::Document::set_rect

use super::document::{Document, Rect};

pub const DEFAULT_VIEWPORT_WIDTH: f32 = 1280.0;

const CHAR_WIDTH: f32 = 8.0;
const CONTROL_HEIGHT: f32 = 40.0;

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "br", "cite", "code", "em", "i", "img", "kbd", "label", "mark", "q", "s",
    "small", "span", "strong", "sub", "sup", "svg", "time", "u",
];

const CONTROL_TAGS: &[&str] = &["button", "input", "select", "textarea"];

const SECTIONING_TAGS: &[&str] = &[
    "article", "aside", "footer", "form", "header", "main", "nav", "section",
];

fn line_height(tag: &str) -> f32 {
    match tag {
        "h1" => 44.0,
        "h2" => 36.0,
        "h3" => 30.0,
        "h4" | "h5" | "h6" => 26.0,
        _ => 24.0,
    }
}

fn padding(tag: &str) -> f32 {
    if SECTIONING_TAGS.contains(&tag) {
        32.0
    } else {
        8.0
    }
}

/// Lay out the whole document at `viewport_width`.
pub fn flow(doc: &mut Document, viewport_width: f32) {
    let mut rects = vec![Rect::default(); doc.len()];
    if !doc.is_empty() {
        let body = doc.body();
        place_block(doc, body, 0.0, 0.0, viewport_width, &mut rects);
    }
    for (el, rect) in doc.elements_mut().iter_mut().zip(rects) {
        el.rect = rect;
    }
}

/// Place `index` at (`x`, `y`) and return the height it occupies.
fn place_block(doc: &Document, index: usize, x: f32, y: f32, width: f32, rects: &mut [Rect]) -> f32 {
    let Some(el) = doc.get(index) else {
        return 0.0;
    };
    if doc.is_hidden(index) {
        return 0.0;
    }
    if CONTROL_TAGS.contains(&el.tag.as_str()) {
        if el.attr("type") == Some("hidden") {
            return 0.0;
        }
        rects[index] = Rect::new(x, y, width, CONTROL_HEIGHT);
        return CONTROL_HEIGHT + 8.0;
    }

    let pad = padding(&el.tag);
    let inline_chars = inline_text_len(doc, index);
    let lines = if inline_chars == 0 {
        0.0
    } else {
        let per_line = ((width - 2.0 * pad) / CHAR_WIDTH).max(1.0);
        (inline_chars as f32 / per_line).ceil()
    };
    let text_height = lines * line_height(&el.tag);

    let content_x = x + pad;
    let content_width = (width - 2.0 * pad).max(0.0);
    place_inline_children(doc, index, content_x, y + pad, content_width, rects);

    let mut cursor = y + pad + text_height;
    for &child in &el.children {
        if is_inline(doc, child) {
            continue;
        }
        cursor += place_block(doc, child, content_x, cursor, content_width, rects);
    }

    let height = cursor - y + pad;
    rects[index] = Rect::new(x, y, width, height);
    height
}

fn is_inline(doc: &Document, index: usize) -> bool {
    doc.get(index)
        .map(|e| INLINE_TAGS.contains(&e.tag.as_str()))
        .unwrap_or(false)
}

/// Characters of text rendered on the block's own lines.
fn inline_text_len(doc: &Document, index: usize) -> usize {
    let Some(el) = doc.get(index) else {
        return 0;
    };
    let own = el.own_text.chars().count();
    own + el
        .children
        .iter()
        .filter(|&&c| is_inline(doc, c) && !doc.is_hidden(c))
        .map(|&c| doc.text_content(c).chars().count() + 1)
        .sum::<usize>()
}

fn place_inline_children(doc: &Document, index: usize, x: f32, y: f32, width: f32, rects: &mut [Rect]) {
    let Some(el) = doc.get(index) else {
        return;
    };
    for &child in &el.children {
        if !is_inline(doc, child) || doc.is_hidden(child) {
            continue;
        }
        let chars = doc.text_content(child).chars().count().max(1) as f32;
        let rect = Rect::new(x, y, (chars * CHAR_WIDTH).min(width), line_height("span"));
        rects[child] = rect;
        // nested inline content shares the same line box
        for desc in doc.descendants(child) {
            rects[desc] = rect;
        }
    }
}
