//! Guided tours: definitions, run state, synthesis and the orchestrator.
//!
//! This module provides:
//! * [`TourConfig`] / [`TourStep`] — serde-friendly tour definitions.
//! * [`TourState`] — the run state with its invariants.
//! * [`generate_tour_from_page`] — builds a tour from page structure.
//! * [`TourOrchestrator`] — executes steps, debounces transitions, drives
//!   auto-advance and narration.

pub mod model;
pub mod orchestrator;
pub mod state;
pub mod synthesis;

pub use model::{Progress, StepAction, StepTarget, TourConfig, TourStep};
pub use orchestrator::{StepChange, TourEnd, TourOrchestrator};
pub use state::{TourPhase, TourState};
pub use synthesis::{describe_section, generate_tour_from_page, TourOptions};
