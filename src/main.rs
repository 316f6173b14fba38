//! Terminal front-end — drive a tour of an HTML page from the keyboard.
//!
//! ```text
//! voice-tour <page.html> [tour.json | tour-name]
//! ```
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the tokio runtime (multi-thread, 2 workers).
//! 4. Parse the page and build narration + overlay.
//! 5. Assemble the [`VoiceAssistant`] on a channel-backed speech source.
//! 6. Optionally start a hand-written tour.
//! 7. Read stdin: `~text` is fed to the recogniser as speech, anything else
//!    is handled as a typed command.  `quit` exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use voice_tour::{
    assistant::VoiceAssistant,
    capture::{channel_source, CaptureEvent, RecognitionEvent, RecognitionSender},
    config::{AppConfig, AppPaths},
    narration::build_generator,
    page::Document,
    tour::TourConfig,
    visual::OverlayHighlighter,
};

// ---------------------------------------------------------------------------
// Tour files
// ---------------------------------------------------------------------------

/// `arg` as a path, else `<tours_dir>/<arg>.json`.
fn tour_path(arg: &str) -> PathBuf {
    let direct = PathBuf::from(arg);
    if direct.exists() {
        return direct;
    }
    AppPaths::new().tours_dir.join(format!("{arg}.json"))
}

fn load_tour(path: &Path) -> Result<TourConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading tour {}", path.display()))?;
    TourConfig::from_json(&json).with_context(|| format!("parsing tour {}", path.display()))
}

// ---------------------------------------------------------------------------
// Console output
// ---------------------------------------------------------------------------

fn attach_console(assistant: &VoiceAssistant, overlay: &OverlayHighlighter) {
    let tours = assistant.tours();
    let view = overlay.clone();
    tours.on_step_change(move |change| match (&change.step, change.index) {
        (Some(step), Some(_)) => {
            let p = change.progress;
            println!("▶ [{}/{} {}%] {} ({})", p.current, p.total, p.percent, step.title, step.target);
            let state = view.state();
            log::debug!(
                "overlay: scroll_y={:.0} highlights={} dimmed={}",
                state.scroll_y,
                state.highlights.len(),
                state.dimmed
            );
        }
        _ => println!("■ tour stopped"),
    });
    tours.on_tour_end(|end| {
        println!(
            "✓ tour {:?} over: {} step(s) seen{}",
            end.tour_id,
            end.completed_steps.len(),
            if end.finished { ", finished" } else { "" }
        );
    });
    tours.on_speak(|text| println!("🔊 {text}"));

    assistant.capture().on_event(|event| match event {
        CaptureEvent::Interim { text } => println!("… {text}"),
        CaptureEvent::Final { text, confidence } => println!("🎤 {text} ({confidence:.2})"),
        CaptureEvent::Error(message) => println!("⚠ recogniser: {message}"),
        CaptureEvent::Started | CaptureEvent::Stopped => {}
    });
}

// ---------------------------------------------------------------------------
// Input loop
// ---------------------------------------------------------------------------

async fn read_input(assistant: VoiceAssistant, speech: RecognitionSender) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        if let Some(spoken) = line.strip_prefix('~') {
            if !speech.send(RecognitionEvent::interim(spoken.trim(), 0.9)).await {
                log::warn!("recogniser is not listening");
            }
            continue;
        }
        match assistant.handle(line).await {
            Some((command, outcome)) => log::info!("{} -> {outcome:?}", command.label()),
            None => println!("? try: start tour, next, go back, go to <section>, pause, resume, what is this, stop tour"),
        }
    }

    assistant.tours().end_tour();
    assistant.stop_listening().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(page_path) = args.next() else {
        bail!("usage: voice-tour <page.html> [tour.json | tour-name]");
    };
    let tour_arg = args.next();

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        // 4. Page, narration, overlay
        let html = std::fs::read_to_string(&page_path)
            .with_context(|| format!("reading page {page_path}"))?;
        let document =
            Document::parse_with_viewport(&html, config.analyzer.viewport_width).into_shared();
        let narrator = build_generator(&config);
        let overlay = OverlayHighlighter::default();

        // 5. Assistant
        let (speech, source) = channel_source();
        let assistant = VoiceAssistant::new(
            config,
            document,
            Arc::new(overlay.clone()),
            narrator,
            source,
        );
        attach_console(&assistant, &overlay);

        let runner = assistant.clone();
        tokio::spawn(async move { runner.run().await });
        assistant.start_listening().await?;
        log::info!("voice-tour ready: {page_path}");

        // 6. Hand-written tour
        if let Some(arg) = tour_arg {
            let tour = load_tour(&tour_path(&arg))?;
            if !assistant.tours().start_tour(tour).await {
                log::warn!("tour {arg:?} has no steps");
            }
        }

        // 7. Input
        read_input(assistant, speech).await
    })
}
