//! Voice assistant — wires capture → command matcher → tour orchestrator.
//!
//! # Flow
//!
//! ```text
//! ContinuousCapture ──Final{text}──▶ utterance channel ──▶ run()
//!                                                        └─▶ handle(text)
//!                                                              ├─ start    → analyse page, synthesise tour, start
//!                                                              ├─ describe → page text → narrator → speak
//!                                                              └─ others   → command::dispatch
//! ```
//!
//! Typed commands go straight to [`VoiceAssistant::handle`].

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::capture::{CaptureError, CaptureEvent, ContinuousCapture, RecognitionSource};
use crate::command::{default_commands, dispatch, jump_target, CommandMatcher, Dispatch, TourCommand};
use crate::config::AppConfig;
use crate::narration::{IntentKind, NarrationContext, ResponseGenerator};
use crate::page::{PageAnalyzer, PageContent, SectionContent, SharedDocument};
use crate::tour::{generate_tour_from_page, TourOptions, TourOrchestrator};
use crate::visual::Highlighter;

struct Inner {
    config: AppConfig,
    tours: TourOrchestrator,
    capture: ContinuousCapture,
    commands: CommandMatcher<TourCommand>,
    narrator: Arc<dyn ResponseGenerator>,
    analyzer: PageAnalyzer,
    utterances: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

/// The assembled engine.  Cheap to clone.
#[derive(Clone)]
pub struct VoiceAssistant {
    inner: Arc<Inner>,
}

impl VoiceAssistant {
    pub fn new(
        config: AppConfig,
        document: SharedDocument,
        highlighter: Arc<dyn Highlighter>,
        narrator: Arc<dyn ResponseGenerator>,
        source: impl RecognitionSource + 'static,
    ) -> Self {
        let tours = TourOrchestrator::new(
            document,
            highlighter,
            Arc::clone(&narrator),
            config.tour.clone(),
        );
        let capture = ContinuousCapture::new(source, config.capture.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        capture.on_event(move |event| {
            if let CaptureEvent::Final { text, .. } = event {
                // The receiver is gone once run() has returned.
                let _ = tx.send(text.clone());
            }
        });

        Self {
            inner: Arc::new(Inner {
                analyzer: PageAnalyzer::new(config.analyzer.clone()),
                config,
                tours,
                capture,
                commands: default_commands(),
                narrator,
                utterances: Mutex::new(Some(rx)),
            }),
        }
    }

    pub fn tours(&self) -> &TourOrchestrator {
        &self.inner.tours
    }

    pub fn capture(&self) -> &ContinuousCapture {
        &self.inner.capture
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub async fn start_listening(&self) -> Result<(), CaptureError> {
        self.inner.capture.start().await
    }

    pub async fn stop_listening(&self) {
        self.inner.capture.stop().await;
    }

    /// Handle spoken utterances until the capture side goes away.
    ///
    /// Only the first call does anything; the utterance stream can be
    /// consumed once.
    pub async fn run(&self) {
        let rx = self
            .inner
            .utterances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut rx) = rx else {
            log::warn!("assistant: run() called twice");
            return;
        };
        while let Some(text) = rx.recv().await {
            log::info!("assistant: heard {text:?}");
            self.handle(&text).await;
        }
        log::info!("assistant: utterance stream closed");
    }

    /// Match `text` against the command table and act on it.
    ///
    /// Returns the recognised command and what became of it, or `None`
    /// when nothing matched.
    pub async fn handle(&self, text: &str) -> Option<(TourCommand, Dispatch)> {
        let Some(hit) = self.inner.commands.resolve(text) else {
            log::debug!("assistant: no command in {text:?}");
            return None;
        };
        let command = *hit.handler;
        let remainder = hit.remainder;

        let outcome = match dispatch(&self.inner.tours, command, &remainder).await {
            Dispatch::Delegated => match command {
                TourCommand::Start => self.start_page_tour().await,
                TourCommand::Describe => self.describe(&remainder).await,
                _ => Dispatch::Ignored,
            },
            other => other,
        };
        Some((command, outcome))
    }

    /// Analyse the page as it is now and start a tour of it.
    pub async fn start_page_tour(&self) -> Dispatch {
        let options = TourOptions {
            analyzer: self.inner.config.analyzer.clone(),
            ..TourOptions::default()
        };
        let tour = {
            let doc = self
                .inner
                .tours
                .document()
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            generate_tour_from_page(&doc, &options)
        };
        if tour.steps.is_empty() {
            self.inner.tours.say("There is nothing on this page to show yet.");
            return Dispatch::Ignored;
        }
        if self.inner.tours.start_tour(tour).await {
            Dispatch::Accepted
        } else {
            Dispatch::Ignored
        }
    }

    /// Speak an overview of the section being looked at (the current step,
    /// or the section named in `remainder`).
    pub async fn describe(&self, remainder: &str) -> Dispatch {
        let content = {
            let doc = self
                .inner
                .tours
                .document()
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            self.inner.analyzer.extract_page_content(&doc)
        };
        let context = self.overview_context(&content, jump_target(remainder));

        match self
            .inner
            .narrator
            .generate(IntentKind::SectionOverview, &context)
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                self.inner.tours.say(&text);
                Dispatch::Accepted
            }
            Ok(_) => Dispatch::Ignored,
            Err(e) => {
                log::warn!("assistant: overview narration failed: {e}");
                Dispatch::Ignored
            }
        }
    }

    fn overview_context(&self, content: &PageContent, named: &str) -> NarrationContext {
        let section: Option<&SectionContent> = if !named.is_empty() {
            content.search(named).into_iter().next()
        } else {
            self.inner.tours.current_step().and_then(|step| {
                content
                    .section(&step.id)
                    .or_else(|| content.search(&step.title).into_iter().next())
            })
        };

        match section {
            Some(s) => NarrationContext {
                section: s.title.clone(),
                description: String::new(),
                excerpt: Some(s.text.clone()),
            },
            None => NarrationContext {
                section: content.title.clone().unwrap_or_else(|| "this page".to_string()),
                description: content.description.clone().unwrap_or_default(),
                excerpt: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
