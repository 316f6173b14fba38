//! In-memory overlay: the visual state a renderer draws each frame.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{Highlighter, ScrollPosition, Target, VisualError};
use crate::page::Rect;

/// One outlined element.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub locator: String,
    pub rect: Rect,
}

/// Pointer marker anchored to an element's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub locator: String,
    pub x: f32,
    pub y: f32,
}

/// Everything currently drawn over the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualState {
    /// Vertical scroll offset of the viewport.
    pub scroll_y: f32,
    pub highlights: Vec<Highlight>,
    /// Page outside the highlight is dimmed.
    pub dimmed: bool,
    pub pointer: Option<Pointer>,
}

impl VisualState {
    pub fn is_clear(&self) -> bool {
        self.highlights.is_empty() && !self.dimmed && self.pointer.is_none()
    }
}

/// [`Highlighter`] that records state instead of drawing it.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct OverlayHighlighter {
    state: Arc<Mutex<VisualState>>,
    viewport_height: f32,
    /// How long a scroll "animates" before the returned future resolves.
    scroll_duration: Duration,
}

impl OverlayHighlighter {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(VisualState::default())),
            viewport_height,
            scroll_duration: Duration::ZERO,
        }
    }

    pub fn with_scroll_duration(mut self, duration: Duration) -> Self {
        self.scroll_duration = duration;
        self
    }

    /// Snapshot of the current visual state.
    pub fn state(&self) -> VisualState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VisualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scroll_offset(&self, rect: &Rect, position: ScrollPosition) -> f32 {
        let offset = match position {
            ScrollPosition::Start => rect.top(),
            ScrollPosition::Center => rect.top() + rect.height / 2.0 - self.viewport_height / 2.0,
            ScrollPosition::End => rect.bottom() - self.viewport_height,
        };
        offset.max(0.0)
    }

    async fn scroll(&self, target: &Target, position: ScrollPosition) -> Result<(), VisualError> {
        if target.rect.is_empty() {
            return Err(VisualError::NoLayout(target.locator.clone()));
        }
        let offset = self.scroll_offset(&target.rect, position);
        self.lock().scroll_y = offset;
        if !self.scroll_duration.is_zero() {
            tokio::time::sleep(self.scroll_duration).await;
        }
        Ok(())
    }
}

impl Default for OverlayHighlighter {
    fn default() -> Self {
        Self::new(800.0)
    }
}

#[async_trait]
impl Highlighter for OverlayHighlighter {
    async fn scroll_and_highlight(
        &self,
        target: &Target,
        position: ScrollPosition,
        dim_background: bool,
    ) -> Result<(), VisualError> {
        self.scroll(target, position).await?;
        let mut state = self.lock();
        state.highlights.push(Highlight {
            locator: target.locator.clone(),
            rect: target.rect,
        });
        state.dimmed = dim_background;
        Ok(())
    }

    async fn scroll_to(&self, target: &Target, position: ScrollPosition) -> Result<(), VisualError> {
        self.scroll(target, position).await
    }

    fn point_to(&self, target: &Target) {
        self.lock().pointer = Some(Pointer {
            locator: target.locator.clone(),
            x: target.rect.left(),
            y: target.rect.top(),
        });
    }

    fn clear_highlights(&self) {
        let mut state = self.lock();
        state.highlights.clear();
        state.dimmed = false;
        state.pointer = None;
    }
}
