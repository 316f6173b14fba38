//! Per-session capture state and the silence timer.

use std::time::Duration;

use tokio::time::Instant;

use super::source::RecognitionResult;

// ---------------------------------------------------------------------------
// SilenceTimer
// ---------------------------------------------------------------------------

/// Resettable one-shot deadline.
///
/// The timer does not run anything itself; the session loop sleeps until
/// [`deadline`](Self::deadline) and treats reaching it as end of utterance.
#[derive(Debug, Clone)]
pub struct SilenceTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl SilenceTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Restart the countdown from now.
    pub fn reset(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// Transcript state of the running (or last) capture session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSession {
    pub is_listening: bool,
    /// Latest partial hypothesis; replaced on every result.
    pub current_transcript: String,
    /// Last promoted utterance.
    pub final_transcript: String,
    pub confidence: f32,
}

impl CaptureSession {
    /// Fresh listening session.
    pub fn listening() -> Self {
        Self {
            is_listening: true,
            ..Self::default()
        }
    }

    /// Take the best hypothesis of `result` as the current transcript.
    ///
    /// Returns the new transcript, or `None` when the result carried no
    /// usable text.
    pub fn update(&mut self, result: &RecognitionResult, max_alternatives: usize) -> Option<&str> {
        let best = result.best(max_alternatives)?;
        let text = best.transcript.trim();
        if text.is_empty() {
            return None;
        }
        self.current_transcript = text.to_string();
        self.confidence = best.confidence.clamp(0.0, 1.0);
        Some(&self.current_transcript)
    }

    /// Promote the pending transcript to final and clear interim state.
    pub fn promote(&mut self) -> Option<(String, f32)> {
        if self.current_transcript.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.current_transcript);
        let confidence = std::mem::take(&mut self.confidence);
        self.final_transcript = text.clone();
        Some((text, confidence))
    }

    pub fn has_pending(&self) -> bool {
        !self.current_transcript.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
