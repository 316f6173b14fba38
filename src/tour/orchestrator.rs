//! The tour state machine.
//!
//! [`TourOrchestrator`] is a cheap, cloneable handle around shared state.
//! Every run of a tour gets a fresh run id; settle delays, auto-advance
//! timers and narration requests carry the run id (and step index) they
//! were started for and do nothing once it is no longer current.
//!
//! Lock discipline: the control mutex is only held for short synchronous
//! sections and never across an `.await`; subscribers are always called
//! with no lock held.  The async visual lock serialises clear, settle and
//! visual action so one step's highlight can never land after another
//! step's clear.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

use crate::config::TourSettings;
use crate::events::{Registry, Subscription};
use crate::narration::{IntentKind, NarrationContext, ResponseGenerator};
use crate::page::SharedDocument;
use crate::visual::{Highlighter, ScrollPosition, Target};

use super::model::{Progress, StepAction, StepTarget, TourConfig, TourStep};
use super::state::TourState;

/// Longest slice of section text handed to the narrator.
const NARRATION_EXCERPT_CHARS: usize = 800;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Emitted after a step's visual action, and with `step: None` when a run
/// ends.
#[derive(Debug, Clone, PartialEq)]
pub struct StepChange {
    pub step: Option<TourStep>,
    pub index: Option<usize>,
    pub progress: Progress,
}

/// Emitted once per run, after the state has been cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct TourEnd {
    pub tour_id: String,
    pub completed_steps: Vec<String>,
    /// `true` when the run ended by advancing past its last step.
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// Control state
// ---------------------------------------------------------------------------

struct AutoTimer {
    token: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Control {
    state: TourState,
    run_id: u64,
    /// A step is being executed.
    in_flight: bool,
    /// Manual transitions are rejected until this instant.
    locked_until: Option<Instant>,
    timer: Option<AutoTimer>,
    next_token: u64,
}

impl Control {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }

    fn is_current(&self, run_id: u64, index: usize) -> bool {
        self.run_id == run_id && self.state.current_step_index() == Some(index)
    }

    fn is_locked(&self) -> bool {
        self.in_flight || self.locked_until.is_some_and(|t| Instant::now() < t)
    }
}

enum Move {
    To { index: usize, forward: bool },
    End,
    Stay,
}

struct Inner {
    document: SharedDocument,
    highlighter: Arc<dyn Highlighter>,
    narrator: Arc<dyn ResponseGenerator>,
    settings: TourSettings,
    control: Mutex<Control>,
    visual: tokio::sync::Mutex<()>,
    step_change: Registry<StepChange>,
    tour_end: Registry<TourEnd>,
    speak: Registry<str>,
}

// ---------------------------------------------------------------------------
// TourOrchestrator
// ---------------------------------------------------------------------------

/// Runs one tour at a time against a live document.
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_tour::config::TourSettings;
/// use voice_tour::narration::TemplateNarrator;
/// use voice_tour::page::Document;
/// use voice_tour::tour::{TourConfig, TourOrchestrator, TourStep};
/// use voice_tour::visual::OverlayHighlighter;
///
/// # async fn run() {
/// let doc = Document::parse_html("<section id='a'><h2>A</h2></section>").into_shared();
/// let tours = TourOrchestrator::new(
///     doc,
///     Arc::new(OverlayHighlighter::default()),
///     Arc::new(TemplateNarrator),
///     TourSettings::default(),
/// );
/// tours.on_speak(|text| println!("{text}"));
/// tours
///     .start_tour(TourConfig {
///         id: "demo".into(),
///         name: "Demo".into(),
///         description: String::new(),
///         steps: vec![TourStep::new("a", "#a", "A")],
///     })
///     .await;
/// # }
/// ```
#[derive(Clone)]
pub struct TourOrchestrator {
    inner: Arc<Inner>,
}

impl TourOrchestrator {
    pub fn new(
        document: SharedDocument,
        highlighter: Arc<dyn Highlighter>,
        narrator: Arc<dyn ResponseGenerator>,
        settings: TourSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                document,
                highlighter,
                narrator,
                settings,
                control: Mutex::new(Control::default()),
                visual: tokio::sync::Mutex::new(()),
                step_change: Registry::new("step_change"),
                tour_end: Registry::new("tour_end"),
                speak: Registry::new("speak"),
            }),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn document(&self) -> &SharedDocument {
        &self.inner.document
    }

    pub fn settings(&self) -> &TourSettings {
        &self.inner.settings
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn on_step_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StepChange) + Send + Sync + 'static,
    {
        self.inner.step_change.subscribe(callback)
    }

    pub fn on_tour_end<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TourEnd) + Send + Sync + 'static,
    {
        self.inner.tour_end.subscribe(callback)
    }

    pub fn on_speak<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.speak.subscribe(callback)
    }

    /// Hand `text` to the speak subscribers outside of step narration.
    pub fn say(&self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.inner.speak.emit(text);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        self.control().state.is_active()
    }

    pub fn current_step(&self) -> Option<TourStep> {
        self.control().state.current_step().cloned()
    }

    pub fn progress(&self) -> Progress {
        self.control().state.progress()
    }

    /// Snapshot of the run state.
    pub fn state(&self) -> TourState {
        self.control().state.clone()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start `config`, ending any run in progress first.
    ///
    /// Returns `false` for a tour without steps.
    pub async fn start_tour(&self, config: impl Into<Arc<TourConfig>>) -> bool {
        let tour: Arc<TourConfig> = config.into();
        if tour.steps.is_empty() {
            log::warn!("tour: {:?} has no steps; not starting", tour.id);
            return false;
        }
        for dup in tour.duplicate_ids() {
            log::warn!("tour: {:?} repeats step id {dup:?}", tour.id);
        }

        self.end_run(false);

        let (run_id, from, to) = {
            let mut c = self.control();
            c.cancel_timer();
            let from = c.state.phase();
            c.state.start(Arc::clone(&tour));
            c.run_id += 1;
            c.in_flight = true;
            c.locked_until = None;
            (c.run_id, from, c.state.phase())
        };
        log::info!(
            "tour: {} -> {}: started {:?} ({} steps)",
            from.label(),
            to.label(),
            tour.id,
            tour.steps.len()
        );

        self.execute_step(run_id, 0, false).await;
        true
    }

    /// End the current run.  Does nothing when idle.
    pub fn end_tour(&self) {
        self.end_run(false);
    }

    fn end_run(&self, finished: bool) {
        let (ended, from, to) = {
            let mut c = self.control();
            if !c.state.is_active() {
                return;
            }
            c.cancel_timer();
            let ended = TourEnd {
                tour_id: c.state.tour().map(|t| t.id.clone()).unwrap_or_default(),
                completed_steps: c.state.completed_steps().to_vec(),
                finished,
            };
            let from = c.state.phase();
            c.state.clear();
            c.run_id += 1;
            c.in_flight = false;
            c.locked_until = None;
            (ended, from, c.state.phase())
        };
        self.inner.highlighter.clear_highlights();
        log::info!(
            "tour: {} -> {}: ended {:?} ({} completed, finished={finished})",
            from.label(),
            to.label(),
            ended.tour_id,
            ended.completed_steps.len()
        );

        self.inner.step_change.emit(&StepChange {
            step: None,
            index: None,
            progress: Progress::default(),
        });
        self.inner.tour_end.emit(&ended);
    }

    /// Stop auto-advancing; the current step stays put.
    pub fn pause(&self) {
        let mut c = self.control();
        if c.state.is_active() {
            c.cancel_timer();
            log::debug!("tour: paused");
        }
    }

    /// Re-arm auto-advance after `delay` (the configured interval when `None`).
    pub fn resume(&self, delay: Option<Duration>) {
        let mut c = self.control();
        if !c.state.is_active() {
            return;
        }
        let delay = delay.unwrap_or_else(|| self.inner.settings.auto_advance());
        self.arm_timer(&mut c, delay);
        log::debug!("tour: resumed, advancing in {delay:?}");
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Advance one step; past the last step the tour ends.
    pub async fn next_step(&self) -> bool {
        self.transition("next", |state| match state.current_step_index() {
            Some(i) if i + 1 < state.step_count() => Move::To {
                index: i + 1,
                forward: true,
            },
            Some(_) => Move::End,
            None => Move::Stay,
        })
        .await
    }

    /// Go back one step; a no-op on the first step.
    pub async fn previous_step(&self) -> bool {
        self.transition("previous", |state| match state.current_step_index() {
            Some(i) if i > 0 => Move::To {
                index: i - 1,
                forward: false,
            },
            _ => Move::Stay,
        })
        .await
    }

    /// Jump to a step by id or position.  A string that names no step id
    /// but parses as a number is taken as a position.
    pub async fn skip_to_step(&self, target: impl Into<StepTarget>) -> bool {
        let target = target.into();
        self.transition("skip", move |state| {
            let Some(tour) = state.tour() else {
                return Move::Stay;
            };
            let index = match &target {
                StepTarget::Id(id) => tour
                    .position(id)
                    .or_else(|| id.trim().parse::<usize>().ok()),
                StepTarget::Index(i) => Some(*i),
            };
            match (index, state.current_step_index()) {
                (Some(i), Some(current)) if i < tour.steps.len() => Move::To {
                    index: i,
                    forward: i > current,
                },
                _ => Move::Stay,
            }
        })
        .await
    }

    /// Jump to the first step whose title or id contains `name`
    /// (case-insensitive).
    pub async fn skip_to_section(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        let index = {
            let c = self.control();
            c.state.tour().and_then(|tour| {
                tour.steps.iter().position(|s| {
                    s.title.to_lowercase().contains(&needle) || s.id.to_lowercase().contains(&needle)
                })
            })
        };
        match index {
            Some(i) => self.skip_to_step(i).await,
            None => {
                log::debug!("tour: no step matches section {name:?}");
                false
            }
        }
    }

    async fn transition<F>(&self, label: &str, plan: F) -> bool
    where
        F: FnOnce(&TourState) -> Move,
    {
        let (run_id, index) = {
            let mut c = self.control();
            if !c.state.is_active() {
                return false;
            }
            if c.is_locked() {
                log::debug!("tour: {label} ignored, transition in progress");
                return false;
            }
            match plan(&c.state) {
                Move::Stay => return false,
                Move::End => {
                    c.state.complete_current();
                    drop(c);
                    self.end_run(true);
                    return true;
                }
                Move::To { index, forward } => {
                    c.cancel_timer();
                    if forward {
                        c.state.complete_current();
                    }
                    c.state.move_to(index);
                    c.in_flight = true;
                    (c.run_id, index)
                }
            }
        };
        log::debug!("tour: {label} -> step {index}");
        self.execute_step(run_id, index, true).await;
        true
    }

    // -----------------------------------------------------------------------
    // Step execution
    // -----------------------------------------------------------------------

    fn resolve(&self, locator: &str) -> Option<Target> {
        let doc = self.inner.document.read().unwrap_or_else(PoisonError::into_inner);
        let handle = doc.query(locator)?;
        let rect = doc.element(handle)?.rect;
        Some(Target {
            locator: locator.to_string(),
            element: handle,
            rect,
        })
    }

    /// Handle still valid, or the locator resolved again after a remount.
    fn refresh(&self, target: Target) -> Option<Target> {
        let still_mounted = {
            let doc = self.inner.document.read().unwrap_or_else(PoisonError::into_inner);
            doc.element(target.element).map(|el| el.rect)
        };
        match still_mounted {
            Some(rect) => Some(Target { rect, ..target }),
            None => self.resolve(&target.locator),
        }
    }

    async fn execute_step(&self, run_id: u64, index: usize, lock_after: bool) {
        let step = {
            let c = self.control();
            if !c.is_current(run_id, index) {
                return;
            }
            match c.state.current_step() {
                Some(step) => step.clone(),
                None => return,
            }
        };

        let visual = self.inner.visual.lock().await;
        if !self.control().is_current(run_id, index) {
            log::debug!("tour: step {:?} superseded before it ran", step.id);
            return;
        }

        let target = self.resolve(&step.target);
        if target.is_none() {
            log::warn!("tour: step {:?} target {:?} not found", step.id, step.target);
        }
        self.inner.highlighter.clear_highlights();

        sleep(self.inner.settings.settle_delay()).await;
        if !self.control().is_current(run_id, index) {
            log::debug!("tour: step {:?} abandoned during settle", step.id);
            return;
        }

        let target = target.and_then(|t| self.refresh(t));
        if let Some(target) = &target {
            self.apply_action(step.action, target).await;
        }

        let change = {
            let mut c = self.control();
            if !c.is_current(run_id, index) {
                drop(c);
                // Superseded mid-action: whatever it drew is stale.
                self.inner.highlighter.clear_highlights();
                log::debug!("tour: step {:?} superseded during its visual action", step.id);
                return;
            }
            c.in_flight = false;
            if lock_after {
                c.locked_until = Some(Instant::now() + self.inner.settings.transition_lock());
            }
            if !step.wait_for_interaction {
                self.arm_timer(&mut c, self.inner.settings.auto_advance());
            }
            StepChange {
                step: Some(step.clone()),
                index: Some(index),
                progress: c.state.progress(),
            }
        };
        drop(visual);
        self.inner.step_change.emit(&change);

        if let Some(target) = target {
            let this = self.clone();
            tokio::spawn(async move { this.narrate(run_id, index, step, target).await });
        }
    }

    async fn apply_action(&self, action: StepAction, target: &Target) {
        let highlighter = &self.inner.highlighter;
        let position = ScrollPosition::Center;
        let result = match action {
            StepAction::Spotlight => highlighter.scroll_and_highlight(target, position, true).await,
            StepAction::Highlight => highlighter.scroll_and_highlight(target, position, false).await,
            StepAction::Scroll => highlighter.scroll_to(target, position).await,
            StepAction::Point => {
                let scrolled = highlighter.scroll_to(target, position).await;
                if scrolled.is_ok() {
                    highlighter.point_to(target);
                }
                scrolled
            }
        };
        if let Err(e) = result {
            log::warn!("tour: visual action on {:?} failed: {e}", target.locator);
        }
    }

    async fn narrate(&self, run_id: u64, index: usize, step: TourStep, target: Target) {
        let excerpt = {
            let doc = self.inner.document.read().unwrap_or_else(PoisonError::into_inner);
            doc.element(target.element)
                .map(|_| doc.text_content(target.element.index))
                .map(|text| text.chars().take(NARRATION_EXCERPT_CHARS).collect::<String>())
                .filter(|text| !text.is_empty())
        };
        let context = NarrationContext {
            section: step.title.clone(),
            description: step.description.clone(),
            excerpt,
        };

        let text = match self.inner.narrator.generate(IntentKind::TourStep, &context).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("tour: narration for {:?} failed: {e}", step.id);
                return;
            }
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.inner.settings.suppress_stale_narration && !self.control().is_current(run_id, index) {
            log::debug!("tour: dropping stale narration for {:?}", step.id);
            return;
        }
        self.inner.speak.emit(text);
    }

    // -----------------------------------------------------------------------
    // Auto-advance
    // -----------------------------------------------------------------------

    fn arm_timer(&self, c: &mut Control, delay: Duration) {
        c.cancel_timer();
        let token = c.next_token;
        c.next_token += 1;
        let handle = tokio::spawn(self.auto_advance(token, c.run_id, delay));
        c.timer = Some(AutoTimer { token, handle });
    }

    fn auto_advance(&self, token: u64, run_id: u64, delay: Duration) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move {
            sleep(delay).await;
            loop {
                let wait = {
                    let mut c = this.control();
                    if c.run_id != run_id || c.timer.as_ref().map(|t| t.token) != Some(token) {
                        return;
                    }
                    match c.locked_until {
                        Some(until) if until > Instant::now() => Some(until),
                        _ => {
                            // Detach before advancing: next_step cancels the
                            // stored timer, which would otherwise be this task.
                            c.timer = None;
                            None
                        }
                    }
                };
                match wait {
                    Some(until) => sleep_until(until).await,
                    None => break,
                }
            }
            log::debug!("tour: auto-advance");
            this.next_step().await;
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::narration::{NarrationError, TemplateNarrator};
    use crate::page::Document;
    use crate::visual::OverlayHighlighter;

    const PAGE: &str = r#"<html><body>
        <section id="a"><h2>Alpha</h2><p>First part of the page.</p></section>
        <section id="b"><h2>Beta</h2><p>Second part of the page.</p></section>
        <section id="c"><h2>Gamma</h2><p>Third part of the page.</p></section>
    </body></html>"#;

    struct SlowEcho(Duration);

    #[async_trait]
    impl ResponseGenerator for SlowEcho {
        async fn generate(&self, _: IntentKind, ctx: &NarrationContext) -> Result<String, NarrationError> {
            sleep(self.0).await;
            Ok(ctx.section.clone())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl ResponseGenerator for AlwaysFails {
        async fn generate(&self, _: IntentKind, _: &NarrationContext) -> Result<String, NarrationError> {
            Err(NarrationError::Timeout)
        }
    }

    struct Harness {
        tours: TourOrchestrator,
        overlay: OverlayHighlighter,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Harness {
        fn new(narrator: Arc<dyn ResponseGenerator>, settings: TourSettings) -> Self {
            Self::with_overlay(OverlayHighlighter::default(), narrator, settings)
        }

        fn with_overlay(
            overlay: OverlayHighlighter,
            narrator: Arc<dyn ResponseGenerator>,
            settings: TourSettings,
        ) -> Self {
            let tours = TourOrchestrator::new(
                Document::parse_html(PAGE).into_shared(),
                Arc::new(overlay.clone()),
                narrator,
                settings,
            );
            let log = Arc::new(Mutex::new(Vec::new()));

            let l = Arc::clone(&log);
            tours.on_step_change(move |change| {
                let entry = match (&change.step, change.index) {
                    (Some(step), Some(i)) => format!("step:{}:{i}", step.id),
                    _ => "step:none".to_string(),
                };
                l.lock().unwrap().push(entry);
            });
            let l = Arc::clone(&log);
            tours.on_tour_end(move |end| {
                l.lock().unwrap().push(format!("end:{}:{}", end.tour_id, end.finished));
            });
            let l = Arc::clone(&log);
            tours.on_speak(move |text| l.lock().unwrap().push(format!("say:{text}")));

            Self { tours, overlay, log }
        }

        fn template() -> Self {
            Self::new(Arc::new(TemplateNarrator), TourSettings::default())
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn steps(&self) -> Vec<String> {
            self.log().into_iter().filter(|e| e.starts_with("step:")).collect()
        }

        fn spoken(&self) -> Vec<String> {
            self.log().into_iter().filter(|e| e.starts_with("say:")).collect()
        }
    }

    fn tour(id: &str) -> TourConfig {
        TourConfig {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            steps: vec![
                TourStep::new("a", "#a", "Alpha").with_description("First."),
                TourStep::new("b", "#b", "Beta").with_description("Second."),
                TourStep::new("c", "#c", "Gamma").with_description("Third."),
            ],
        }
    }

    fn single(id: &str, step: &str, target: &str) -> TourConfig {
        TourConfig {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            steps: vec![TourStep::new(step, target, step.to_uppercase())],
        }
    }

    fn slow_scroll() -> Harness {
        Harness::with_overlay(
            OverlayHighlighter::default().with_scroll_duration(Duration::from_millis(500)),
            Arc::new(TemplateNarrator),
            TourSettings::default(),
        )
    }

    fn highlighted(h: &Harness) -> Vec<String> {
        h.overlay.state().highlights.into_iter().map(|hl| hl.locator).collect()
    }

    fn lock_window() -> Duration {
        TourSettings::default().transition_lock()
    }

    #[tokio::test(start_paused = true)]
    async fn three_step_scenario() {
        let h = Harness::template();

        assert!(h.tours.start_tour(tour("t")).await);
        assert_eq!(h.tours.state().current_step_index(), Some(0));

        assert!(h.tours.next_step().await);
        assert!(!h.tours.next_step().await);
        assert_eq!(h.tours.state().current_step_index(), Some(1));

        sleep(lock_window()).await;
        assert!(h.tours.next_step().await);
        assert_eq!(h.tours.state().current_step_index(), Some(2));

        sleep(lock_window()).await;
        assert!(h.tours.next_step().await);
        assert!(!h.tours.is_active());

        assert_eq!(h.steps(), vec!["step:a:0", "step:b:1", "step:c:2", "step:none"]);
        assert_eq!(h.log().last().map(String::as_str), Some("end:t:true"));
        assert!(h.overlay.state().is_clear());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_nexts_advance_once() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;

        let (first, second) = tokio::join!(h.tours.next_step(), h.tours.next_step());
        assert!(first ^ second);
        assert_eq!(h.tours.state().current_step_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn completion_is_forward_only_and_unique() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;

        h.tours.next_step().await;
        sleep(lock_window()).await;
        h.tours.previous_step().await;
        sleep(lock_window()).await;
        h.tours.next_step().await;

        assert_eq!(h.tours.state().completed_steps(), ["a"]);
        assert_eq!(h.tours.state().current_step_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn previous_on_first_step_is_noop() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;
        assert!(!h.tours.previous_step().await);
        assert_eq!(h.tours.state().current_step_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_again_ends_previous_run() {
        let h = Harness::template();
        h.tours.start_tour(tour("first")).await;
        h.tours.start_tour(tour("second")).await;

        let ends: Vec<String> = h.log().into_iter().filter(|e| e.starts_with("end:")).collect();
        assert_eq!(ends, vec!["end:first:false"]);
        assert_eq!(h.tours.state().tour().map(|t| t.id.as_str()), Some("second"));
        assert_eq!(h.overlay.state().highlights.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_tour_is_rejected() {
        let h = Harness::template();
        let mut empty = tour("t");
        empty.steps.clear();
        assert!(!h.tours.start_tour(empty).await);
        assert!(!h.tours.is_active());
        assert!(h.log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn end_tour_is_idempotent() {
        let h = Harness::template();
        h.tours.end_tour();
        assert!(h.log().is_empty());

        h.tours.start_tour(tour("t")).await;
        h.tours.end_tour();
        h.tours.end_tour();

        let tail: Vec<String> = h.log().into_iter().filter(|e| !e.starts_with("say:")).collect();
        assert_eq!(tail, vec!["step:a:0", "step:none", "end:t:false"]);
        assert_eq!(h.tours.progress(), Progress::default());
        assert!(h.overlay.state().is_clear());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_advance_moves_on() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;

        let settings = TourSettings::default();
        sleep(settings.auto_advance() + settings.settle_delay() + Duration::from_millis(50)).await;
        assert_eq!(h.tours.state().current_step_index(), Some(1));
        assert_eq!(h.tours.state().completed_steps(), ["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_interaction_holds_the_step() {
        let h = Harness::template();
        let mut t = tour("t");
        t.steps[0] = t.steps[0].clone().waiting_for_interaction();
        h.tours.start_tour(t).await;

        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.tours.state().current_step_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;

        h.tours.pause();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.tours.state().current_step_index(), Some(0));

        h.tours.resume(Some(Duration::from_secs(1)));
        sleep(Duration::from_millis(1300)).await;
        assert_eq!(h.tours.state().current_step_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_by_id_index_and_numeric_string() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;

        assert!(h.tours.skip_to_step("c").await);
        assert_eq!(h.tours.state().current_step_index(), Some(2));

        sleep(lock_window()).await;
        assert!(h.tours.skip_to_step(0).await);
        assert_eq!(h.tours.state().current_step_index(), Some(0));

        sleep(lock_window()).await;
        assert!(h.tours.skip_to_step("1").await);
        assert_eq!(h.tours.state().current_step_index(), Some(1));

        sleep(lock_window()).await;
        assert!(!h.tours.skip_to_step("nope").await);
        assert!(!h.tours.skip_to_step(7).await);
        assert_eq!(h.tours.state().current_step_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_to_section_matches_titles_case_insensitively() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;

        let before = h.tours.state();
        assert!(!h.tours.skip_to_section("contact").await);
        assert_eq!(h.tours.state(), before);

        assert!(h.tours.skip_to_section("GAMMA").await);
        assert_eq!(h.tours.state().current_step_index(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_target_still_advances() {
        let h = Harness::template();
        let mut t = tour("t");
        t.steps[0].target = "#missing".into();
        h.tours.start_tour(t).await;
        sleep(Duration::from_millis(10)).await;

        assert_eq!(h.steps(), vec!["step:a:0"]);
        assert!(h.spoken().is_empty());
        assert!(h.overlay.state().is_clear());

        assert!(h.tours.next_step().await);
        assert_eq!(h.tours.state().current_step_index(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn highlights_never_accumulate() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;
        assert_eq!(h.overlay.state().highlights.len(), 1);
        assert!(!h.overlay.state().dimmed);

        let mut t = tour("spot");
        t.steps[1] = t.steps[1].clone().with_action(StepAction::Spotlight);
        h.tours.start_tour(t).await;
        h.tours.next_step().await;

        let state = h.overlay.state();
        assert_eq!(state.highlights.len(), 1);
        assert_eq!(state.highlights[0].locator, "#b");
        assert!(state.dimmed);
    }

    #[tokio::test(start_paused = true)]
    async fn point_action_sets_pointer_without_outline() {
        let h = Harness::template();
        let mut t = tour("t");
        t.steps[0] = t.steps[0].clone().with_action(StepAction::Point);
        h.tours.start_tour(t).await;

        let state = h.overlay.state();
        assert!(state.highlights.is_empty());
        assert_eq!(state.pointer.map(|p| p.locator), Some("#a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn narration_is_spoken_for_each_step() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;
        sleep(Duration::from_millis(10)).await;
        assert_eq!(h.spoken(), vec!["say:Alpha. First."]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_narration_is_dropped() {
        let h = Harness::new(Arc::new(SlowEcho(Duration::from_secs(2))), TourSettings::default());
        h.tours.start_tour(tour("t")).await;
        h.tours.next_step().await;
        sleep(Duration::from_secs(5)).await;

        assert_eq!(h.spoken(), vec!["say:Beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_narration_kept_when_configured() {
        let settings = TourSettings {
            suppress_stale_narration: false,
            ..TourSettings::default()
        };
        let h = Harness::new(Arc::new(SlowEcho(Duration::from_secs(2))), settings);
        h.tours.start_tour(tour("t")).await;
        h.tours.next_step().await;
        sleep(Duration::from_secs(5)).await;

        assert_eq!(h.spoken(), vec!["say:Alpha", "say:Beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn narration_failure_is_silent() {
        let h = Harness::new(Arc::new(AlwaysFails), TourSettings::default());
        h.tours.start_tour(tour("t")).await;
        sleep(Duration::from_millis(10)).await;

        assert!(h.spoken().is_empty());
        assert_eq!(h.tours.state().current_step_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_subscriber_does_not_stop_the_tour() {
        let h = Harness::template();
        h.tours.on_step_change(|_| panic!("subscriber bug"));
        let seen = Arc::new(Mutex::new(0));
        let s = Arc::clone(&seen);
        h.tours.on_step_change(move |_| *s.lock().unwrap() += 1);

        h.tours.start_tour(tour("t")).await;
        h.tours.next_step().await;

        assert_eq!(*seen.lock().unwrap(), 2);
        assert_eq!(h.steps(), vec!["step:a:0", "step:b:1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn step_target_follows_remount() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;
        {
            let mut doc = h.tours.document().write().unwrap();
            doc.remount(r#"<body><div id="b"><h2>Beta again</h2></div></body>"#);
        }
        h.tours.next_step().await;

        assert_eq!(h.overlay.state().highlights.len(), 1);
        assert_eq!(h.overlay.state().highlights[0].locator, "#b");
    }

    #[tokio::test(start_paused = true)]
    async fn progress_reports_position() {
        let h = Harness::template();
        h.tours.start_tour(tour("t")).await;
        assert_eq!(h.tours.progress(), Progress::new(1, 3));
        assert_eq!(h.tours.current_step().map(|s| s.id), Some("a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_during_slow_scroll_keeps_only_new_highlight() {
        let h = slow_scroll();
        let first = h.tours.clone();
        let pending = tokio::spawn(async move { first.start_tour(single("one", "a", "#a")).await });

        // Settle is over, the scroll to #a is still running.
        sleep(Duration::from_millis(250)).await;
        assert!(h.tours.start_tour(single("two", "b", "#b")).await);
        assert!(pending.await.unwrap());

        assert_eq!(highlighted(&h), vec!["#b"]);
        assert_eq!(h.tours.state().tour().map(|t| t.id.clone()), Some("two".to_string()));
        assert_eq!(h.tours.state().current_step_index(), Some(0));
        assert_eq!(h.steps(), vec!["step:none", "step:b:0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn end_during_slow_scroll_leaves_nothing_behind() {
        let h = slow_scroll();
        let first = h.tours.clone();
        let pending = tokio::spawn(async move { first.start_tour(tour("t")).await });

        sleep(Duration::from_millis(250)).await;
        h.tours.end_tour();
        pending.await.unwrap();

        assert!(h.overlay.state().is_clear());
        assert_eq!(h.tours.state().current_step_index(), None);

        assert!(h.tours.start_tour(single("again", "c", "#c")).await);
        assert_eq!(highlighted(&h), vec!["#c"]);
        assert_eq!(h.tours.state().current_step_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_next_during_settle_cancels_auto_advance() {
        let settings = TourSettings {
            auto_advance_ms: 1_000,
            ..TourSettings::default()
        };
        let h = Harness::new(Arc::new(TemplateNarrator), settings);
        h.tours.start_tour(tour("t")).await;

        // The timer would fire at 1200 ms; the manual step settles until 1300 ms.
        sleep(Duration::from_millis(900)).await;
        let manual = h.tours.clone();
        let pending = tokio::spawn(async move { manual.next_step().await });
        sleep(Duration::from_millis(350)).await;
        assert!(pending.await.unwrap());

        assert_eq!(h.tours.state().current_step_index(), Some(1));
        assert_eq!(highlighted(&h), vec!["#b"]);
        assert_eq!(h.steps(), vec!["step:a:0", "step:b:1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_next_during_auto_advance_settle_is_rejected() {
        let settings = TourSettings {
            auto_advance_ms: 1_000,
            ..TourSettings::default()
        };
        let h = Harness::with_overlay(
            OverlayHighlighter::default().with_scroll_duration(Duration::from_millis(100)),
            Arc::new(TemplateNarrator),
            settings,
        );
        h.tours.start_tour(tour("t")).await;

        // Step 0 is done at 300 ms; auto-advance fires at 1300 ms, settles
        // until 1500 ms and scrolls until 1600 ms.
        sleep(Duration::from_millis(1_400)).await;
        assert!(!h.tours.next_step().await);

        sleep(Duration::from_millis(300)).await;
        assert_eq!(h.tours.state().current_step_index(), Some(1));
        assert_eq!(highlighted(&h), vec!["#b"]);
        assert_eq!(h.steps(), vec!["step:a:0", "step:b:1"]);
    }
}
