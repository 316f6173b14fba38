//! Narration — the text the assistant speaks when a step changes.
//!
//! This module provides:
//! * [`ResponseGenerator`] — async trait implemented by every backend.
//! * [`ApiNarrator`] — OpenAI-compatible REST backend.
//! * [`TemplateNarrator`] — offline sentence templates.
//! * [`FallbackNarrator`] — wraps any backend; falls back to the template.
//! * [`PromptBuilder`] — builds the chat prompt.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_tour::config::AppConfig;
//! use voice_tour::narration::build_generator;
//!
//! let config = AppConfig::default();
//! let narrator = build_generator(&config);
//! # let _ = narrator;
//! ```

pub mod fallback;
pub mod generator;
pub mod prompt;

use std::sync::Arc;

pub use fallback::{FallbackNarrator, TemplateNarrator};
pub use generator::{ApiNarrator, IntentKind, NarrationContext, NarrationError, ResponseGenerator};
pub use prompt::PromptBuilder;

use crate::config::{AppConfig, NarrationProvider};

/// Build the narration backend selected in `config`.
pub fn build_generator(config: &AppConfig) -> Arc<dyn ResponseGenerator> {
    match config.narration.provider {
        NarrationProvider::OpenAiCompatible => Arc::new(FallbackNarrator::new(
            ApiNarrator::from_settings(&config.narration, &config.capture.language),
        )),
        NarrationProvider::Template => Arc::new(TemplateNarrator),
    }
}
