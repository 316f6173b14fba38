//! Engine settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every field carries a serde default so a partial `settings.toml` only
//! overrides what it names.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// TourSettings
// ---------------------------------------------------------------------------

/// Timing knobs for the tour orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourSettings {
    /// How long a step stays current before the tour advances on its own.
    pub auto_advance_ms: u64,
    /// Pause between clearing the previous visual state and applying the
    /// next one, so a running scroll animation can finish.
    pub settle_delay_ms: u64,
    /// Window after a manual transition during which further transitions
    /// are rejected (double-trigger guard).
    pub transition_lock_ms: u64,
    /// Drop narration that arrives after its step is no longer current.
    pub suppress_stale_narration: bool,
}

impl Default for TourSettings {
    fn default() -> Self {
        Self {
            auto_advance_ms: 8_000,
            settle_delay_ms: 200,
            transition_lock_ms: 600,
            suppress_stale_narration: true,
        }
    }
}

impl TourSettings {
    pub fn auto_advance(&self) -> Duration {
        Duration::from_millis(self.auto_advance_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn transition_lock(&self) -> Duration {
        Duration::from_millis(self.transition_lock_ms)
    }
}

// ---------------------------------------------------------------------------
// AnalyzerSettings
// ---------------------------------------------------------------------------

/// Page-analysis and auto-tour synthesis thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Sections shorter than this are left out of generated tours.
    pub min_section_height: f32,
    /// Sections whose tops differ by less than this are treated as one row
    /// and ordered left to right.
    pub row_band: f32,
    /// Viewport width used by the built-in flow layout estimate.
    pub viewport_width: f32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            min_section_height: 150.0,
            row_band: 50.0,
            viewport_width: 1280.0,
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureSettings
// ---------------------------------------------------------------------------

/// Continuous speech-capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// BCP-47 recognition language passed to the speech source.
    pub language: String,
    /// Quiet period after the last partial result that closes an utterance.
    pub silence_timeout_ms: u64,
    /// Forward partial results to subscribers while the user is speaking.
    pub interim_results: bool,
    /// How many recognition alternatives are considered per result.
    pub max_alternatives: usize,
    /// Emit any pending partial text as a final transcript when listening
    /// stops before the silence timer fires.
    pub flush_on_stop: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            silence_timeout_ms: 1_500,
            interim_results: true,
            max_alternatives: 1,
            flush_on_stop: true,
        }
    }
}

impl CaptureSettings {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// NarrationProvider / NarrationSettings
// ---------------------------------------------------------------------------

/// Selects which backend writes step narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NarrationProvider {
    /// Any OpenAI-compatible chat-completions endpoint (Ollama, OpenAI, Groq …).
    OpenAiCompatible,
    /// Built-in sentence templates, no network.
    Template,
}

impl Default for NarrationProvider {
    fn default() -> Self {
        Self::Template
    }
}

/// Settings for the narration generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationSettings {
    pub provider: NarrationProvider,
    /// Base URL of the API endpoint (no trailing `/v1/...`).
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Maximum seconds to wait for a response.
    pub timeout_secs: u64,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            provider: NarrationProvider::default(),
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.6,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_tour::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert_eq!(config.tour.transition_lock_ms, 600);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tour: TourSettings,
    pub analyzer: AnalyzerSettings,
    pub capture: CaptureSettings,
    pub narration: NarrationSettings,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn default_timings() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.tour.settle_delay(), Duration::from_millis(200));
        assert_eq!(cfg.tour.transition_lock(), Duration::from_millis(600));
        assert_eq!(cfg.tour.auto_advance(), Duration::from_secs(8));
        assert!(cfg.tour.suppress_stale_narration);
        assert_eq!(cfg.analyzer.min_section_height, 150.0);
        assert_eq!(cfg.analyzer.row_band, 50.0);
        assert_eq!(cfg.capture.silence_timeout(), Duration::from_millis(1_500));
        assert_eq!(cfg.capture.language, "en-US");
        assert_eq!(cfg.narration.provider, NarrationProvider::Template);
        assert!(cfg.narration.api_key.is_none());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.tour.auto_advance_ms = 12_000;
        cfg.analyzer.min_section_height = 90.0;
        cfg.capture.language = "th-TH".into();
        cfg.capture.interim_results = false;
        cfg.narration.provider = NarrationProvider::OpenAiCompatible;
        cfg.narration.api_key = Some("sk-test".into());

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[capture]\nsilence_timeout_ms = 900\n").expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.capture.silence_timeout_ms, 900);
        assert_eq!(loaded.capture.language, "en-US");
        assert_eq!(loaded.tour, TourSettings::default());
    }
}
