//! Re-resolvable element locators.
//!
//! A [`Locator`] is a small CSS-like path:
//!
//! ```text
//! locator   := compound ( combinator compound )*
//! combinator:= " > "  (child) | " "  (descendant)
//! compound  := tag? ( "#" ident | "." ident | "[" name ( "=" value )? "]"
//!              | ":nth-child(" n ")" )*
//! ```
//!
//! Tour steps store locators as strings, never element handles, and resolve
//! them at the moment they execute.  [`get_selector`] builds the most stable
//! locator available for an element: id, then a structured data attribute,
//! then `tag.class`, then a positional path.

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use thiserror::Error;

use super::document::Document;

/// Data attributes hosts use to mark sections explicitly, in priority order.
pub const MARKER_ATTRIBUTES: &[&str] = &["data-section", "data-tour", "data-testid"];

// ---------------------------------------------------------------------------
// LocatorError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("empty locator")]
    Empty,

    #[error("unexpected character {0:?}")]
    Unexpected(char),

    #[error("unterminated {0}")]
    Unterminated(&'static str),

    #[error("unsupported pseudo-class :{0}")]
    UnsupportedPseudo(String),

    #[error("invalid nth-child index {0:?}")]
    BadIndex(String),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Child,
    Descendant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    nth_child: Option<usize>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.nth_child.is_none()
    }

    fn matches(&self, doc: &Document, index: usize) -> bool {
        let Some(el) = doc.get(index) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| el.has_class(c)) {
            return false;
        }
        let attrs_ok = self.attrs.iter().all(|(name, value)| match (el.attr(name), value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        });
        if !attrs_ok {
            return false;
        }
        match self.nth_child {
            Some(n) => doc.nth_child(index) == n,
            None => true,
        }
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            f.write_str(tag)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        for (name, value) in &self.attrs {
            match value {
                Some(v) => write!(f, "[{name}=\"{}\"]", v.replace('"', "\\\""))?,
                None => write!(f, "[{name}]")?,
            }
        }
        if let Some(n) = self.nth_child {
            write!(f, ":nth-child({n})")?;
        }
        if self.is_empty() {
            f.write_str("*")?;
        }
        Ok(())
    }
}

/// A parsed, re-resolvable reference to a document element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    /// `(relation to the previous part, compound)`; the first relation is
    /// ignored.
    parts: Vec<(Combinator, Compound)>,
}

impl Locator {
    /// `#id`, or `[id="…"]` when the id is not a plain identifier.
    pub fn by_id(id: &str) -> Self {
        if is_ident(id) {
            Self::single(Compound {
                id: Some(id.to_string()),
                ..Compound::default()
            })
        } else {
            Self::by_attr("id", id)
        }
    }

    /// `[name="value"]`
    pub fn by_attr(name: &str, value: &str) -> Self {
        Self::single(Compound {
            attrs: vec![(name.to_string(), Some(value.to_string()))],
            ..Compound::default()
        })
    }

    /// `tag.class`
    pub fn by_tag_class(tag: &str, class: &str) -> Self {
        Self::single(Compound {
            tag: Some(tag.to_string()),
            classes: vec![class.to_string()],
            ..Compound::default()
        })
    }

    pub fn by_tag(tag: &str) -> Self {
        Self::single(Compound {
            tag: Some(tag.to_string()),
            ..Compound::default()
        })
    }

    /// `self > tag:nth-child(n)`
    pub fn child(mut self, tag: &str, nth: usize) -> Self {
        self.parts.push((
            Combinator::Child,
            Compound {
                tag: Some(tag.to_string()),
                nth_child: Some(nth),
                ..Compound::default()
            },
        ));
        self
    }

    fn single(compound: Compound) -> Self {
        Self {
            parts: vec![(Combinator::Descendant, compound)],
        }
    }

    /// Whether the element at `index` is matched by this locator.
    pub fn matches(&self, doc: &Document, index: usize) -> bool {
        self.matches_from(doc, self.parts.len(), index)
    }

    /// Match `parts[..end]` with the last of them anchored at `index`.
    fn matches_from(&self, doc: &Document, end: usize, index: usize) -> bool {
        let Some((combinator, compound)) = end.checked_sub(1).map(|i| &self.parts[i]) else {
            return true;
        };
        if !compound.matches(doc, index) {
            return false;
        }
        if end == 1 {
            return true;
        }
        let Some(parent) = doc.get(index).and_then(|e| e.parent) else {
            return false;
        };
        match combinator {
            Combinator::Child => self.matches_from(doc, end - 1, parent),
            Combinator::Descendant => std::iter::once(parent)
                .chain(doc.ancestors(parent))
                .any(|a| self.matches_from(doc, end - 1, a)),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (combinator, compound)) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(match combinator {
                    Combinator::Child => " > ",
                    Combinator::Descendant => " ",
                })?;
            }
            write!(f, "{compound}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut chars = input.trim().chars().peekable();
        if chars.peek().is_none() {
            return Err(LocatorError::Empty);
        }

        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;
        loop {
            let compound = parse_compound(&mut chars)?;
            parts.push((combinator, compound));

            let saw_space = skip_whitespace(&mut chars);
            match chars.peek() {
                None => break,
                Some('>') => {
                    chars.next();
                    skip_whitespace(&mut chars);
                    combinator = Combinator::Child;
                }
                Some(_) if saw_space => combinator = Combinator::Descendant,
                Some(&c) => return Err(LocatorError::Unexpected(c)),
            }
        }
        Ok(Self { parts })
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) -> bool {
    let mut skipped = false;
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
        skipped = true;
    }
    skipped
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(is_ident_char)
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

fn take_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn expect_ident(chars: &mut Peekable<Chars<'_>>) -> Result<String, LocatorError> {
    let ident = take_ident(chars);
    if ident.is_empty() {
        return Err(chars
            .peek()
            .map(|&c| LocatorError::Unexpected(c))
            .unwrap_or(LocatorError::Unterminated("identifier")));
    }
    Ok(ident)
}

fn parse_compound(chars: &mut Peekable<Chars<'_>>) -> Result<Compound, LocatorError> {
    let mut compound = Compound::default();
    let mut universal = false;

    match chars.peek() {
        Some('*') => {
            chars.next();
            universal = true;
        }
        Some(&c) if is_ident_char(c) => compound.tag = Some(take_ident(chars).to_ascii_lowercase()),
        _ => {}
    }

    while let Some(&c) = chars.peek() {
        match c {
            '#' => {
                chars.next();
                compound.id = Some(expect_ident(chars)?);
            }
            '.' => {
                chars.next();
                compound.classes.push(expect_ident(chars)?);
            }
            '[' => {
                chars.next();
                compound.attrs.push(parse_attr(chars)?);
            }
            ':' => {
                chars.next();
                compound.nth_child = Some(parse_nth_child(chars)?);
            }
            _ => break,
        }
    }

    if compound.is_empty() && !universal {
        return Err(chars
            .peek()
            .map(|&c| LocatorError::Unexpected(c))
            .unwrap_or(LocatorError::Empty));
    }
    Ok(compound)
}

fn parse_attr(chars: &mut Peekable<Chars<'_>>) -> Result<(String, Option<String>), LocatorError> {
    skip_whitespace(chars);
    let name = expect_ident(chars)?;
    skip_whitespace(chars);
    match chars.next() {
        Some(']') => Ok((name, None)),
        Some('=') => {
            skip_whitespace(chars);
            let value = match chars.peek() {
                Some(&q) if q == '"' || q == '\'' => {
                    chars.next();
                    let mut value = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => {
                                if let Some(escaped) = chars.next() {
                                    value.push(escaped);
                                }
                            }
                            Some(c) if c == q => break,
                            Some(c) => value.push(c),
                            None => return Err(LocatorError::Unterminated("string")),
                        }
                    }
                    value
                }
                _ => expect_ident(chars)?,
            };
            skip_whitespace(chars);
            match chars.next() {
                Some(']') => Ok((name, Some(value))),
                Some(c) => Err(LocatorError::Unexpected(c)),
                None => Err(LocatorError::Unterminated("attribute selector")),
            }
        }
        Some(c) => Err(LocatorError::Unexpected(c)),
        None => Err(LocatorError::Unterminated("attribute selector")),
    }
}

fn parse_nth_child(chars: &mut Peekable<Chars<'_>>) -> Result<usize, LocatorError> {
    let pseudo = take_ident(chars);
    if pseudo != "nth-child" {
        return Err(LocatorError::UnsupportedPseudo(pseudo));
    }
    if chars.next() != Some('(') {
        return Err(LocatorError::Unterminated(":nth-child"));
    }
    let mut digits = String::new();
    loop {
        match chars.next() {
            Some(')') => break,
            Some(c) => digits.push(c),
            None => return Err(LocatorError::Unterminated(":nth-child")),
        }
    }
    match digits.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(LocatorError::BadIndex(digits)),
    }
}

// ---------------------------------------------------------------------------
// get_selector
// ---------------------------------------------------------------------------

/// Build the most stable locator for the element at `index`.
pub fn get_selector(doc: &Document, index: usize) -> Locator {
    let Some(el) = doc.get(index) else {
        return Locator::by_tag("body");
    };

    if let Some(id) = el.id() {
        return Locator::by_id(id);
    }

    for attr in MARKER_ATTRIBUTES {
        if let Some(value) = el.attr(attr).filter(|v| !v.is_empty()) {
            return Locator::by_attr(attr, value);
        }
    }

    if let Some(class) = el.classes().next().filter(|c| is_ident(c)) {
        let candidate = Locator::by_tag_class(&el.tag, class);
        if doc.resolve_all(&candidate).len() == 1 {
            return candidate;
        }
    }

    match el.parent {
        None => Locator::by_tag(&el.tag),
        Some(_) if el.tag == "body" || el.tag == "html" => Locator::by_tag(&el.tag),
        Some(parent) => get_selector(doc, parent).child(&el.tag, doc.nth_child(index)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
