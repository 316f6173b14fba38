//! Continuous speech capture with silence segmentation.
//!
//! This module provides:
//! * [`RecognitionSource`] — trait a speech engine implements.
//! * [`channel_source`] — a source fed by hand (terminal front-end, tests).
//! * [`ContinuousCapture`] — session lifecycle, silence timer, events.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_tour::capture::{channel_source, CaptureEvent, ContinuousCapture, RecognitionEvent};
//! use voice_tour::config::CaptureSettings;
//!
//! # async fn run() -> Result<(), voice_tour::capture::CaptureError> {
//! let (speech, source) = channel_source();
//! let capture = ContinuousCapture::new(source, CaptureSettings::default());
//! capture.on_event(|event| {
//!     if let CaptureEvent::Final { text, .. } = event {
//!         println!("heard: {text}");
//!     }
//! });
//! capture.start().await?;
//! speech.send(RecognitionEvent::interim("next", 0.9)).await;
//! # Ok(())
//! # }
//! ```

pub mod continuous;
pub mod session;
pub mod source;

pub use continuous::ContinuousCapture;
pub use session::{CaptureSession, SilenceTimer};
pub use source::{
    channel_source, Alternative, ChannelSource, RecognitionEvent, RecognitionResult,
    RecognitionSender, RecognitionSource,
};

use thiserror::Error;

/// Errors raised when a capture session cannot start.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No speech engine is available (missing device, permission, …).
    #[error("recognition source unavailable: {0}")]
    Unavailable(String),

    #[error("recognition source failed: {0}")]
    Source(String),
}

/// Lifecycle and transcript events of a capture session.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Started,
    /// Partial hypothesis; replaced by the next one.
    Interim { text: String },
    /// One utterance, promoted after the silence timeout.
    Final { text: String, confidence: f32 },
    Stopped,
    Error(String),
}
