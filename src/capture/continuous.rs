//! Continuous capture: turns a stream of partial results into utterances.
//!
//! ```text
//! start() ──▶ source.open() ──▶ session task
//!                                 ├─ result      → update transcript, reset silence timer
//!                                 ├─ silence     → promote → CaptureEvent::Final
//!                                 ├─ error       → CaptureEvent::Error, end
//!                                 └─ stop / EOS  → flush (optional), CaptureEvent::Stopped
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::config::CaptureSettings;
use crate::events::{Registry, Subscription};

use super::session::{CaptureSession, SilenceTimer};
use super::source::{RecognitionEvent, RecognitionSource};
use super::{CaptureError, CaptureEvent};

type SharedSource = Arc<Mutex<Box<dyn RecognitionSource>>>;

struct Running {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    settings: CaptureSettings,
    source: SharedSource,
    session: Mutex<CaptureSession>,
    events: Registry<CaptureEvent>,
    running: Mutex<Option<Running>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Stopped,
    StreamClosed,
    Failed,
}

/// Always-on listener with silence-based utterance segmentation.
///
/// At most one session runs per instance; cheap to clone, clones share it.
#[derive(Clone)]
pub struct ContinuousCapture {
    inner: Arc<Inner>,
}

impl ContinuousCapture {
    pub fn new(source: impl RecognitionSource + 'static, settings: CaptureSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                source: Arc::new(Mutex::new(Box::new(source))),
                session: Mutex::new(CaptureSession::default()),
                events: Registry::new("capture"),
                running: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.inner.settings
    }

    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CaptureEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    pub fn is_listening(&self) -> bool {
        self.inner.session().is_listening
    }

    /// Snapshot of the session state.
    pub fn session(&self) -> CaptureSession {
        self.inner.session().clone()
    }

    /// Open the source and start a session, stopping any running one first.
    pub async fn start(&self) -> Result<(), CaptureError> {
        self.stop().await;

        let rx = {
            let mut source = self.inner.source.lock().unwrap_or_else(PoisonError::into_inner);
            source.open(&self.inner.settings)?
        };
        *self.inner.session() = CaptureSession::listening();

        let (stop_tx, stop_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_session(rx, stop_rx).await });
        *self.inner.running() = Some(Running { stop_tx, handle });

        log::info!(
            "capture: listening ({}, silence {} ms)",
            self.inner.settings.language,
            self.inner.settings.silence_timeout_ms
        );
        self.inner.events.emit(&CaptureEvent::Started);
        Ok(())
    }

    /// End the running session and wait for it to wind down.
    pub async fn stop(&self) {
        let Some(running) = self.inner.running().take() else {
            return;
        };
        // The task may already have ended on its own.
        let _ = running.stop_tx.send(());
        if let Err(e) = running.handle.await {
            log::warn!("capture: session task failed: {e}");
        }
    }
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, CaptureSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_final(&self) {
        let promoted = self.session().promote();
        if let Some((text, confidence)) = promoted {
            log::debug!("capture: final {text:?} ({confidence:.2})");
            self.events.emit(&CaptureEvent::Final { text, confidence });
        }
    }

    async fn run_session(
        &self,
        mut rx: mpsc::Receiver<RecognitionEvent>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        let settings = &self.settings;
        let mut silence = SilenceTimer::new(settings.silence_timeout());

        let reason = loop {
            let deadline = silence.deadline();
            tokio::select! {
                biased;

                event = rx.recv() => match event {
                    Some(RecognitionEvent::Result(result)) => {
                        let interim = self
                            .session()
                            .update(&result, settings.max_alternatives)
                            .map(str::to_string);
                        if let Some(text) = interim {
                            silence.reset();
                            if settings.interim_results {
                                self.events.emit(&CaptureEvent::Interim { text });
                            }
                        }
                    }
                    Some(RecognitionEvent::Error(message)) => {
                        log::warn!("capture: recognition error: {message}");
                        self.events.emit(&CaptureEvent::Error(message));
                        break EndReason::Failed;
                    }
                    None => break EndReason::StreamClosed,
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    silence.cancel();
                    self.emit_final();
                }

                _ = &mut stop_rx => break EndReason::Stopped,
            }
        };

        if reason != EndReason::Failed && settings.flush_on_stop {
            self.emit_final();
        }
        {
            let mut session = self.session();
            session.is_listening = false;
            session.current_transcript.clear();
        }
        self.source.lock().unwrap_or_else(PoisonError::into_inner).close();
        self.running().take();

        log::info!("capture: session ended ({reason:?})");
        self.events.emit(&CaptureEvent::Stopped);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::capture::source::{channel_source, RecognitionSender};

    struct Harness {
        capture: ContinuousCapture,
        tx: RecognitionSender,
        events: Arc<Mutex<Vec<CaptureEvent>>>,
    }

    impl Harness {
        fn new(settings: CaptureSettings) -> Self {
            let (tx, source) = channel_source();
            let capture = ContinuousCapture::new(source, settings);
            let events = Arc::new(Mutex::new(Vec::new()));
            let e = Arc::clone(&events);
            capture.on_event(move |ev| e.lock().unwrap().push(ev.clone()));
            Self { capture, tx, events }
        }

        fn finals(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    CaptureEvent::Final { text, .. } => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, pred: impl Fn(&CaptureEvent) -> bool) -> usize {
            self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
        }

        async fn say(&self, text: &str) {
            assert!(self.tx.send(RecognitionEvent::interim(text, 0.9)).await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silence_promotes_last_interim_once() {
        let h = Harness::new(CaptureSettings::default());
        h.capture.start().await.unwrap();

        h.say("go").await;
        sleep(Duration::from_millis(500)).await;
        h.say("go to").await;
        sleep(Duration::from_millis(700)).await;
        h.say("go to about").await;
        sleep(Duration::from_millis(3000)).await;

        assert_eq!(h.finals(), vec!["go to about"]);
        let session = h.capture.session();
        assert_eq!(session.final_transcript, "go to about");
        assert!(session.current_transcript.is_empty());
        assert!(session.is_listening);
    }

    #[tokio::test(start_paused = true)]
    async fn no_final_before_silence_elapses() {
        let h = Harness::new(CaptureSettings::default());
        h.capture.start().await.unwrap();

        h.say("next").await;
        sleep(Duration::from_millis(1400)).await;
        assert!(h.finals().is_empty());
        sleep(Duration::from_millis(200)).await;
        assert_eq!(h.finals(), vec!["next"]);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_utterances_give_separate_finals() {
        let h = Harness::new(CaptureSettings::default());
        h.capture.start().await.unwrap();

        h.say("start tour").await;
        sleep(Duration::from_secs(2)).await;
        h.say("next").await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(h.finals(), vec!["start tour", "next"]);
    }

    #[tokio::test(start_paused = true)]
    async fn interim_events_can_be_hidden() {
        let h = Harness::new(CaptureSettings {
            interim_results: false,
            ..CaptureSettings::default()
        });
        h.capture.start().await.unwrap();
        h.say("pause").await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(h.count(|e| matches!(e, CaptureEvent::Interim { .. })), 0);
        assert_eq!(h.finals(), vec!["pause"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_flushes_pending_text() {
        let h = Harness::new(CaptureSettings::default());
        h.capture.start().await.unwrap();
        h.say("go back").await;
        sleep(Duration::from_millis(100)).await;

        h.capture.stop().await;
        assert_eq!(h.finals(), vec!["go back"]);
        assert!(!h.capture.is_listening());
        assert!(!h.tx.is_open());
        assert_eq!(h.count(|e| *e == CaptureEvent::Stopped), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_flush_drops_pending_text() {
        let h = Harness::new(CaptureSettings {
            flush_on_stop: false,
            ..CaptureSettings::default()
        });
        h.capture.start().await.unwrap();
        h.say("go back").await;
        sleep(Duration::from_millis(100)).await;

        h.capture.stop().await;
        assert!(h.finals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn source_error_ends_session() {
        let h = Harness::new(CaptureSettings::default());
        h.capture.start().await.unwrap();
        h.say("half a sent").await;
        h.tx.send(RecognitionEvent::Error("network".into())).await;
        sleep(Duration::from_millis(10)).await;

        assert!(!h.capture.is_listening());
        assert_eq!(h.count(|e| *e == CaptureEvent::Error("network".into())), 1);
        assert!(h.finals().is_empty());
        assert_eq!(h.count(|e| *e == CaptureEvent::Stopped), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_stops_previous_session_first() {
        let h = Harness::new(CaptureSettings::default());
        h.capture.start().await.unwrap();
        h.capture.start().await.unwrap();

        assert!(h.capture.is_listening());
        assert_eq!(h.count(|e| *e == CaptureEvent::Started), 2);
        assert_eq!(h.count(|e| *e == CaptureEvent::Stopped), 1);

        h.say("still listening").await;
        sleep(Duration::from_secs(2)).await;
        assert_eq!(h.finals(), vec!["still listening"]);
    }
}
