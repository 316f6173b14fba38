//! Tour definitions: [`TourConfig`], [`TourStep`] and friends.
//!
//! Definitions are immutable once handed to the orchestrator and
//! serialise with camelCase keys so a host page can pass them in as JSON.

use serde::{Deserialize, Serialize};

/// Visual treatment of a step's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    /// Scroll + outline.
    #[default]
    Highlight,
    /// Scroll + outline + dim everything else.
    Spotlight,
    /// Scroll only.
    Scroll,
    /// Scroll + persistent pointer marker.
    Point,
}

/// One stop of a tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourStep {
    /// Unique within its tour.
    pub id: String,
    /// Locator string, resolved against the live document each time the
    /// step runs.
    pub target: String,
    pub title: String,
    /// Seed text for narration.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: StepAction,
    /// Stay on this step until the visitor moves on.
    #[serde(default)]
    pub wait_for_interaction: bool,
}

impl TourStep {
    pub fn new(id: impl Into<String>, target: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            title: title.into(),
            description: String::new(),
            action: StepAction::default(),
            wait_for_interaction: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_action(mut self, action: StepAction) -> Self {
        self.action = action;
        self
    }

    pub fn waiting_for_interaction(mut self) -> Self {
        self.wait_for_interaction = true;
        self
    }
}

/// A complete tour definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<TourStep>,
}

impl TourConfig {
    /// Parse a tour from JSON.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Index of the first step with id `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Ids that occur more than once, in first-seen order.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut dups = Vec::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) && !dups.contains(&step.id.as_str()) {
                dups.push(step.id.as_str());
            }
        }
        dups
    }
}

/// Argument of `skip_to_step`: a step id or a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTarget {
    Id(String),
    Index(usize),
}

impl From<&str> for StepTarget {
    fn from(id: &str) -> Self {
        StepTarget::Id(id.to_string())
    }
}

impl From<String> for StepTarget {
    fn from(id: String) -> Self {
        StepTarget::Id(id)
    }
}

impl From<usize> for StepTarget {
    fn from(index: usize) -> Self {
        StepTarget::Index(index)
    }
}

/// Position within the running tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    /// 1-based number of the current step; `0` when idle.
    pub current: usize,
    pub total: usize,
    /// Rounded percentage of `current / total`.
    pub percent: u8,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((current as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Self {
            current,
            total,
            percent,
        }
    }
}
