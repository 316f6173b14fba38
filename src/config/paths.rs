//! Cross-platform application paths using the `dirs` crate.
//!
//! Config dir:
//!   Windows: %APPDATA%\voice-tour\
//!   macOS:   ~/Library/Application Support/voice-tour/
//!   Linux:   ~/.config/voice-tour/
//!
//! Inside it:
//!   settings.toml   written by `AppConfig::save`
//!   tours/<name>.json
//!                   hand-written tours, looked up by name on the command
//!                   line.  Read-only: nothing here creates the directory or
//!                   writes tours into it.

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml` and the `tours/` directory.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Where `<name>.json` tours are looked up.  Never created or written.
    pub tours_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-tour";

    /// Resolves all paths using the `dirs` crate, falling back to the
    /// current directory when the platform has no config dir.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let tours_dir = config_dir.join("tours");

        Self {
            config_dir,
            settings_file,
            tours_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
