//! Voice-driven in-page navigation and guided tours.
//!
//! * [`page`] — document model, locators and structure analysis.
//! * [`tour`] — tour definitions, synthesis and the orchestrator.
//! * [`capture`] — continuous speech capture with silence segmentation.
//! * [`command`] — spoken command matching and dispatch.
//! * [`narration`] — text the assistant speaks.
//! * [`visual`] — scrolling, highlights, spotlight and pointer.
//! * [`assistant`] — everything wired together.

pub mod assistant;
pub mod capture;
pub mod command;
pub mod config;
pub mod events;
pub mod narration;
pub mod page;
pub mod tour;
pub mod visual;
