//! Tour run state.
//!
//! [`TourState`] is the single mutable core of the orchestrator.  Its
//! fields are private so the invariants hold by construction:
//!
//! * `current_step` is `Some(i)` with `i < steps.len()` exactly while a tour
//!   is loaded, and `None` otherwise;
//! * `completed_steps` holds no duplicates and only grows during a run.
//!
//! ```text
//! Idle ──start(tour)──▶ Running(step 0)
//!      ◀──clear()─────  Running ──move_to(i)──▶ Running(step i)
//! ```

use std::sync::Arc;

use super::model::{Progress, TourConfig, TourStep};

/// Phase of the orchestrator, derived from [`TourState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TourPhase {
    #[default]
    Idle,
    Running,
}

impl TourPhase {
    pub fn label(&self) -> &'static str {
        match self {
            TourPhase::Idle => "Idle",
            TourPhase::Running => "Running",
        }
    }
}

/// Snapshot-able tour state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourState {
    tour: Option<Arc<TourConfig>>,
    current_step: Option<usize>,
    completed_steps: Vec<String>,
}

impl TourState {
    /// Load `tour` and make step 0 current.  Returns `false` (and stays
    /// idle) for a tour without steps.
    pub(crate) fn start(&mut self, tour: Arc<TourConfig>) -> bool {
        if tour.steps.is_empty() {
            return false;
        }
        self.tour = Some(tour);
        self.current_step = Some(0);
        self.completed_steps.clear();
        true
    }

    /// Make `index` current; out-of-range indices are ignored.
    pub(crate) fn move_to(&mut self, index: usize) -> bool {
        match &self.tour {
            Some(tour) if index < tour.steps.len() => {
                self.current_step = Some(index);
                true
            }
            _ => false,
        }
    }

    /// Record the current step as completed (no duplicates).
    pub(crate) fn complete_current(&mut self) {
        if let Some(step) = self.current_step() {
            if !self.completed_steps.iter().any(|id| *id == step.id) {
                self.completed_steps.push(step.id.clone());
            }
        }
    }

    /// Back to idle.
    pub(crate) fn clear(&mut self) {
        self.tour = None;
        self.current_step = None;
        self.completed_steps.clear();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.tour.is_some()
    }

    pub fn phase(&self) -> TourPhase {
        if self.is_active() {
            TourPhase::Running
        } else {
            TourPhase::Idle
        }
    }

    pub fn tour(&self) -> Option<&Arc<TourConfig>> {
        self.tour.as_ref()
    }

    pub fn current_step_index(&self) -> Option<usize> {
        self.current_step
    }

    pub fn current_step(&self) -> Option<&TourStep> {
        let tour = self.tour.as_ref()?;
        tour.steps.get(self.current_step?)
    }

    pub fn step_count(&self) -> usize {
        self.tour.as_ref().map_or(0, |t| t.steps.len())
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    pub fn progress(&self) -> Progress {
        match self.current_step {
            Some(i) => Progress::new(i + 1, self.step_count()),
            None => Progress::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tour(n: usize) -> Arc<TourConfig> {
        Arc::new(TourConfig {
            id: "t".into(),
            name: "T".into(),
            description: String::new(),
            steps: (0..n)
                .map(|i| TourStep::new(format!("s{i}"), format!("#s{i}"), format!("Step {i}")))
                .collect(),
        })
    }

    #[test]
    fn default_is_idle() {
        let state = TourState::default();
        assert!(!state.is_active());
        assert_eq!(state.phase(), TourPhase::Idle);
        assert_eq!(state.current_step_index(), None);
        assert_eq!(state.progress(), Progress::default());
    }

    #[test]
    fn empty_tour_is_rejected() {
        let mut state = TourState::default();
        assert!(!state.start(tour(0)));
        assert!(!state.is_active());
    }

    #[test]
    fn move_to_is_bounds_checked() {
        let mut state = TourState::default();
        state.start(tour(2));
        assert!(state.move_to(1));
        assert!(!state.move_to(2));
        assert_eq!(state.current_step_index(), Some(1));
        assert_eq!(state.progress(), Progress::new(2, 2));
    }

    #[test]
    fn completion_has_no_duplicates_and_resets_on_start() {
        let mut state = TourState::default();
        state.start(tour(3));
        state.complete_current();
        state.complete_current();
        state.move_to(1);
        state.complete_current();
        assert_eq!(state.completed_steps(), ["s0", "s1"]);

        state.start(tour(3));
        assert!(state.completed_steps().is_empty());
    }

    #[test]
    fn clear_restores_idle_invariant() {
        let mut state = TourState::default();
        state.start(tour(3));
        state.clear();
        assert_eq!(state, TourState::default());
        assert_eq!(TourPhase::Idle.label(), "Idle");
    }
}
