//! Recognition sources: the seam between the capture pipeline and a
//! speech engine.
//!
//! A [`RecognitionSource`] is opened once per capture session and hands back
//! the receiving end of a channel of [`RecognitionEvent`]s.  Closing the
//! source (or dropping every sender) ends the stream, which ends the
//! session.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::config::CaptureSettings;

use super::CaptureError;

/// Events buffered per session before senders wait.
const CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One hypothesis for an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    /// Engine confidence in `0.0..=1.0`.
    pub confidence: f32,
}

/// A partial or final recognition result.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Hypotheses, engine's preferred first.
    pub alternatives: Vec<Alternative>,
    pub is_final: bool,
}

impl RecognitionResult {
    /// Most confident among the first `max_alternatives` hypotheses.
    pub fn best(&self, max_alternatives: usize) -> Option<&Alternative> {
        self.alternatives
            .iter()
            .take(max_alternatives.max(1))
            .fold(None, |best: Option<&Alternative>, alt| match best {
                Some(b) if b.confidence >= alt.confidence => Some(b),
                _ => Some(alt),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Result(RecognitionResult),
    /// Engine failure; ends the session.
    Error(String),
}

impl RecognitionEvent {
    /// Single-hypothesis interim result.
    pub fn interim(text: impl Into<String>, confidence: f32) -> Self {
        RecognitionEvent::Result(RecognitionResult {
            alternatives: vec![Alternative {
                transcript: text.into(),
                confidence,
            }],
            is_final: false,
        })
    }

    /// Single-hypothesis result the engine considers final.
    pub fn final_result(text: impl Into<String>, confidence: f32) -> Self {
        match Self::interim(text, confidence) {
            RecognitionEvent::Result(mut result) => {
                result.is_final = true;
                RecognitionEvent::Result(result)
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// RecognitionSource
// ---------------------------------------------------------------------------

/// A speech engine that streams recognition events.
pub trait RecognitionSource: Send {
    /// Begin recognising with `settings` and return the event stream.
    fn open(&mut self, settings: &CaptureSettings)
        -> Result<mpsc::Receiver<RecognitionEvent>, CaptureError>;

    /// Stop recognising.  The stream returned by `open` ends.
    fn close(&mut self);
}

// ---------------------------------------------------------------------------
// Channel-backed source
// ---------------------------------------------------------------------------

type Slot = Arc<Mutex<Option<mpsc::Sender<RecognitionEvent>>>>;

/// Create a source whose events are pushed by hand through the returned
/// [`RecognitionSender`].
///
/// Used by the terminal front-end (typed lines stand in for speech) and by
/// tests.  Events sent while the source is closed are dropped.
pub fn channel_source() -> (RecognitionSender, ChannelSource) {
    let slot: Slot = Arc::new(Mutex::new(None));
    (
        RecognitionSender {
            slot: Arc::clone(&slot),
        },
        ChannelSource { slot },
    )
}

/// Receiving half of [`channel_source`].
#[derive(Debug)]
pub struct ChannelSource {
    slot: Slot,
}

impl RecognitionSource for ChannelSource {
    fn open(
        &mut self,
        settings: &CaptureSettings,
    ) -> Result<mpsc::Receiver<RecognitionEvent>, CaptureError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        log::debug!("capture: channel source opened ({})", settings.language);
        Ok(rx)
    }

    fn close(&mut self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Sending half of [`channel_source`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct RecognitionSender {
    slot: Slot,
}

impl RecognitionSender {
    /// Deliver `event` to the open session.  Returns `false` when no
    /// session is listening.
    pub async fn send(&self, event: RecognitionEvent) -> bool {
        let tx = self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn result(alts: &[(&str, f32)]) -> RecognitionResult {
        RecognitionResult {
            alternatives: alts
                .iter()
                .map(|(t, c)| Alternative {
                    transcript: t.to_string(),
                    confidence: *c,
                })
                .collect(),
            is_final: false,
        }
    }

    #[test]
    fn best_respects_max_alternatives() {
        let r = result(&[("next", 0.6), ("text", 0.9)]);
        assert_eq!(r.best(1).map(|a| a.transcript.as_str()), Some("next"));
        assert_eq!(r.best(2).map(|a| a.transcript.as_str()), Some("text"));
        assert_eq!(r.best(0).map(|a| a.transcript.as_str()), Some("next"));
        assert!(result(&[]).best(3).is_none());
    }

    #[test]
    fn final_result_sets_flag() {
        match RecognitionEvent::final_result("stop", 1.0) {
            RecognitionEvent::Result(r) => assert!(r.is_final),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn sender_reaches_only_open_sessions() {
        let (tx, mut source) = channel_source();
        assert!(!tx.send(RecognitionEvent::interim("lost", 0.5)).await);

        let mut rx = source.open(&CaptureSettings::default()).unwrap();
        assert!(tx.is_open());
        assert!(tx.send(RecognitionEvent::interim("hello", 0.5)).await);
        assert_eq!(rx.recv().await, Some(RecognitionEvent::interim("hello", 0.5)));

        source.close();
        assert!(!tx.is_open());
        assert_eq!(rx.recv().await, None);
    }
}
