//! Visual subsystem — scrolling, outlines, spotlight dimming and pointers.
//!
//! The orchestrator is the only writer of visual state and always goes
//! through a [`Highlighter`].  [`OverlayHighlighter`] keeps that state in
//! memory as a [`VisualState`] for a renderer (or a test) to read back.

pub mod overlay;

pub use overlay::{Highlight, OverlayHighlighter, Pointer, VisualState};

use async_trait::async_trait;
use thiserror::Error;

use crate::page::{ElementHandle, Rect};

// ---------------------------------------------------------------------------
// VisualError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum VisualError {
    /// The element has no layout box (hidden or collapsed).
    #[error("element {0} has no layout box")]
    NoLayout(String),

    /// Renderer-specific failure.
    #[error("renderer failed: {0}")]
    Renderer(String),
}

// ---------------------------------------------------------------------------
// Target / ScrollPosition
// ---------------------------------------------------------------------------

/// Where the target should land in the viewport after scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollPosition {
    Start,
    #[default]
    Center,
    End,
}

/// A freshly resolved step target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Locator the target was resolved from.
    pub locator: String,
    pub element: ElementHandle,
    pub rect: Rect,
}

// ---------------------------------------------------------------------------
// Highlighter
// ---------------------------------------------------------------------------

/// Operations the orchestrator needs from whatever draws on the page.
///
/// Every method must be idempotent when nothing is highlighted.
#[async_trait]
pub trait Highlighter: Send + Sync {
    /// Scroll `target` into view and outline it; with `dim_background` the
    /// rest of the page is dimmed (spotlight).
    async fn scroll_and_highlight(
        &self,
        target: &Target,
        position: ScrollPosition,
        dim_background: bool,
    ) -> Result<(), VisualError>;

    /// Scroll only.
    async fn scroll_to(&self, target: &Target, position: ScrollPosition) -> Result<(), VisualError>;

    /// Show a persistent pointer marker at `target`.
    fn point_to(&self, target: &Target);

    /// Remove every outline, dim layer and pointer.
    fn clear_highlights(&self);
}
