//! Keyword-based command matching.
//!
//! [`CommandMatcher`] holds an ordered list of `{keywords, handler}` entries
//! and resolves a transcript to the first entry with any keyword occurring
//! in it (case-insensitive substring).  Order is the priority: put the more
//! specific phrases first.

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

struct Entry<H> {
    /// Lower-cased.
    keywords: Vec<String>,
    handler: H,
}

/// A resolved command.
#[derive(Debug, PartialEq)]
pub struct CommandMatch<'a, H> {
    pub handler: &'a H,
    /// The keyword that matched, lower-cased.
    pub keyword: &'a str,
    /// Lower-cased text after the keyword, trimmed.
    pub remainder: String,
}

// ---------------------------------------------------------------------------
// CommandMatcher
// ---------------------------------------------------------------------------

/// Ordered keyword table.
///
/// # Example
/// ```rust
/// use voice_tour::command::CommandMatcher;
///
/// let matcher = CommandMatcher::new()
///     .with(&["go to", "take me to"], "jump")
///     .with(&["next"], "next");
/// let hit = matcher.resolve("Please take me to Projects").unwrap();
/// assert_eq!(*hit.handler, "jump");
/// assert_eq!(hit.remainder, "projects");
/// ```
pub struct CommandMatcher<H> {
    entries: Vec<Entry<H>>,
}

impl<H> CommandMatcher<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry (builder form).
    pub fn with(mut self, keywords: &[&str], handler: H) -> Self {
        self.add(keywords, handler);
        self
    }

    /// Append an entry; it is tried after every existing one.
    pub fn add(&mut self, keywords: &[&str], handler: H) {
        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self.entries.push(Entry { keywords, handler });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with a keyword inside `text`.
    pub fn resolve(&self, text: &str) -> Option<CommandMatch<'_, H>> {
        let text = text.to_lowercase();
        self.entries.iter().find_map(|entry| {
            entry.keywords.iter().find_map(|keyword| {
                let at = text.find(keyword.as_str())?;
                Some(CommandMatch {
                    handler: &entry.handler,
                    keyword: keyword.as_str(),
                    remainder: text[at + keyword.len()..].trim().to_string(),
                })
            })
        })
    }
}

impl<H> Default for CommandMatcher<H> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
