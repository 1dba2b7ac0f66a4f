//! Animated replacement of the active screen
//!
//! A transition moves through four phases:
//!
//! ```text
//! Idle -> FadingOut -> RunningIntermediate -> FadingIn -> Idle
//! ```
//!
//! `RunningIntermediate` is skipped when no work is queued. Inside it the
//! loading indicator is shown for one frame before any work is polled, then
//! permanent work runs in registration order, then the one-shot chain, then
//! a settle delay elapses before the indicator is hidden.
//!
//! The controller never blocks: [`TransitionController::render`] is called
//! once per frame, reads the clock, and polls queued work with a no-op waker.
//! It is single-writer state owned by the UI thread.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::error::NavigationError;
use crate::registry::{Producer, ViewRegistry};

/// Future produced by a queued work item.
pub type WorkFuture = LocalBoxFuture<'static, anyhow::Result<()>>;

type PermanentWork = Rc<dyn Fn() -> WorkFuture>;
type OneShotWork = Box<dyn FnOnce() -> WorkFuture>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionKind {
    /// Swap immediately, no animation and no work
    None,
    #[default]
    Fade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    FadingOut,
    RunningIntermediate,
    FadingIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTiming {
    /// Length of each opacity ramp
    pub fade: Duration,
    /// Delay after work completes before the loading indicator is hidden
    pub settle: Duration,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            fade: Duration::from_millis(500),
            settle: Duration::from_millis(1000),
        }
    }
}

/// What the host should draw this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    pub content: T,
    /// 0.0 (invisible) to 1.0 (opaque)
    pub opacity: f32,
    pub loading: bool,
}

enum WorkStage {
    /// Indicator visible; work starts on the next frame
    Yield,
    Running(WorkFuture),
    Settling { since: Duration },
}

enum Phase {
    Idle,
    FadingOut { started: Duration },
    RunningIntermediate(WorkStage),
    FadingIn { started: Duration },
}

impl Phase {
    fn name(&self) -> TransitionPhase {
        match self {
            Phase::Idle => TransitionPhase::Idle,
            Phase::FadingOut { .. } => TransitionPhase::FadingOut,
            Phase::RunningIntermediate(_) => TransitionPhase::RunningIntermediate,
            Phase::FadingIn { .. } => TransitionPhase::FadingIn,
        }
    }
}

pub struct TransitionController<V, T> {
    registry: ViewRegistry<V, T>,
    clock: Box<dyn Clock>,
    timing: TransitionTiming,
    current: (V, Producer<T>),
    pending: Option<(V, Producer<T>)>,
    kind: TransitionKind,
    phase: Phase,
    intermediate: Vec<OneShotWork>,
    permanent: Vec<PermanentWork>,
}

impl<V, T> TransitionController<V, T>
where
    V: Copy + Eq + Hash + Debug,
{
    /// Create a controller showing `initial`.
    pub fn new(
        registry: ViewRegistry<V, T>,
        initial: V,
        clock: Box<dyn Clock>,
        timing: TransitionTiming,
    ) -> Result<Self, NavigationError<V>> {
        let producer = registry
            .get(&initial)
            .ok_or(NavigationError::UnknownView { view: initial })?;
        Ok(Self {
            registry,
            clock,
            timing,
            current: (initial, producer),
            pending: None,
            kind: TransitionKind::Fade,
            phase: Phase::Idle,
            intermediate: Vec::new(),
            permanent: Vec::new(),
        })
    }

    pub fn current_view(&self) -> V {
        self.current.0
    }

    pub fn pending_view(&self) -> Option<V> {
        self.pending.as_ref().map(|(view, _)| *view)
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase.name()
    }

    pub fn in_transition(&self) -> bool {
        self.pending.is_some() || !matches!(self.phase, Phase::Idle)
    }

    pub fn registry(&self) -> &ViewRegistry<V, T> {
        &self.registry
    }

    /// Request a switch to `target`.
    ///
    /// While a transition is in flight the latest request wins: the pending
    /// target is replaced and a running fade-out restarts. Work that is
    /// already running is never cancelled; one-shot work queued meanwhile
    /// runs after it, and the settle delay restarts once that is done.
    pub fn navigate(&mut self, target: V, kind: TransitionKind) -> Result<(), NavigationError<V>> {
        let producer = self
            .registry
            .get(&target)
            .ok_or(NavigationError::UnknownView { view: target })?;
        info!(
            "[TransitionController] navigate {:?} -> {:?} ({:?}, phase {:?})",
            self.current.0,
            target,
            kind,
            self.phase.name()
        );

        self.kind = kind;
        if let Phase::RunningIntermediate(_) = self.phase {
            self.pending = Some((target, producer));
            return Ok(());
        }

        match kind {
            TransitionKind::None => {
                self.current = (target, producer);
                self.pending = None;
                self.phase = Phase::Idle;
            }
            TransitionKind::Fade => {
                self.pending = Some((target, producer));
                self.phase = Phase::FadingOut {
                    started: self.clock.now(),
                };
            }
        }
        Ok(())
    }

    /// Queue async work for the middle of the next animated transition.
    ///
    /// Permanent work runs on every such transition and is never cleared.
    /// One-shot work is appended to the chain for the next transition only.
    pub fn queue_intermediate<F, Fut>(&mut self, permanent: bool, work: F)
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        if permanent {
            self.permanent.push(Rc::new(move || work().boxed_local()));
        } else {
            self.intermediate
                .push(Box::new(move || work().boxed_local()));
        }
    }

    fn has_work(&self) -> bool {
        !self.intermediate.is_empty() || !self.permanent.is_empty()
    }

    /// Permanent work, then the one-shot chain, each awaited in turn.
    fn start_work(&mut self) -> WorkFuture {
        let permanent = self.permanent.clone();
        let once = std::mem::take(&mut self.intermediate);
        debug!(
            "[TransitionController] running {} permanent and {} one-shot work items",
            permanent.len(),
            once.len()
        );
        async move {
            for work in permanent {
                work().await?;
            }
            for work in once {
                work().await?;
            }
            anyhow::Ok(())
        }
        .boxed_local()
    }

    /// One-shot work queued after the current chain started.
    fn start_queued(&mut self) -> WorkFuture {
        let once = std::mem::take(&mut self.intermediate);
        debug!(
            "[TransitionController] running {} late one-shot work items",
            once.len()
        );
        async move {
            for work in once {
                work().await?;
            }
            anyhow::Ok(())
        }
        .boxed_local()
    }

    fn begin_fade_in(&mut self, now: Duration) {
        if let Some(next) = self.pending.take() {
            self.current = next;
        }
        self.phase = Phase::FadingIn { started: now };
    }

    fn ramp(&self, started: Duration, now: Duration) -> f32 {
        if self.timing.fade.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(started).as_secs_f32();
        (elapsed / self.timing.fade.as_secs_f32()).clamp(0.0, 1.0)
    }

    fn frame(&self, opacity: f32, loading: bool) -> Frame<T> {
        Frame {
            content: (self.current.1)(),
            opacity,
            loading,
        }
    }

    /// Advance the state machine and describe the frame to draw.
    ///
    /// Returns `TransitionWork` on the single frame where queued work fails;
    /// the transition is then aborted and the current screen fades back in.
    pub fn render(&mut self) -> Result<Frame<T>, NavigationError<V>> {
        let now = self.clock.now();
        loop {
            match &mut self.phase {
                Phase::Idle => return Ok(self.frame(1.0, false)),

                Phase::FadingOut { started } => {
                    let started = *started;
                    if now.saturating_sub(started) < self.timing.fade {
                        return Ok(self.frame(1.0 - self.ramp(started, now), false));
                    }
                    if self.has_work() {
                        self.phase = Phase::RunningIntermediate(WorkStage::Yield);
                        return Ok(self.frame(0.0, true));
                    }
                    self.begin_fade_in(now);
                }

                Phase::RunningIntermediate(WorkStage::Yield) => {
                    let work = self.start_work();
                    self.phase = Phase::RunningIntermediate(WorkStage::Running(work));
                }

                Phase::RunningIntermediate(WorkStage::Running(work)) => {
                    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
                    match work.poll_unpin(&mut cx) {
                        Poll::Pending => return Ok(self.frame(0.0, true)),
                        Poll::Ready(Ok(())) if !self.intermediate.is_empty() => {
                            // Queued while the chain ran, e.g. for a new target
                            let more = self.start_queued();
                            self.phase = Phase::RunningIntermediate(WorkStage::Running(more));
                        }
                        Poll::Ready(Ok(())) => {
                            self.phase =
                                Phase::RunningIntermediate(WorkStage::Settling { since: now });
                        }
                        Poll::Ready(Err(source)) => {
                            error!(
                                "[TransitionController] work failed, staying on {:?}: {:#}",
                                self.current.0, source
                            );
                            self.pending = None;
                            self.phase = Phase::FadingIn { started: now };
                            return Err(NavigationError::TransitionWork { source });
                        }
                    }
                }

                Phase::RunningIntermediate(WorkStage::Settling { .. })
                    if !self.intermediate.is_empty() =>
                {
                    let more = self.start_queued();
                    self.phase = Phase::RunningIntermediate(WorkStage::Running(more));
                }

                Phase::RunningIntermediate(WorkStage::Settling { since }) => {
                    if now.saturating_sub(*since) < self.timing.settle {
                        return Ok(self.frame(0.0, true));
                    }
                    match self.kind {
                        TransitionKind::Fade => self.begin_fade_in(now),
                        TransitionKind::None => {
                            if let Some(next) = self.pending.take() {
                                self.current = next;
                            }
                            self.phase = Phase::Idle;
                        }
                    }
                }

                Phase::FadingIn { started } => {
                    let started = *started;
                    if now.saturating_sub(started) < self.timing.fade {
                        return Ok(self.frame(self.ramp(started, now), false));
                    }
                    debug!(
                        "[TransitionController] transition to {:?} complete",
                        self.current.0
                    );
                    self.phase = Phase::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Screen {
        Home,
        About,
        Contact,
    }

    fn controller(clock: &ManualClock) -> TransitionController<Screen, &'static str> {
        let registry = ViewRegistry::builder()
            .register(Screen::Home, || "home")
            .register(Screen::About, || "about")
            .build();
        TransitionController::new(
            registry,
            Screen::Home,
            Box::new(clock.clone()),
            TransitionTiming::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_idle_render_shows_current() {
        let clock = ManualClock::new();
        let mut ctrl = controller(&clock);
        let frame = ctrl.render().unwrap();
        assert_eq!(frame.content, "home");
        assert_eq!(frame.opacity, 1.0);
        assert!(!frame.loading);
        assert!(!ctrl.in_transition());
    }

    #[test]
    fn test_unknown_view_is_an_error() {
        let clock = ManualClock::new();
        let mut ctrl = controller(&clock);
        let err = ctrl.navigate(Screen::Contact, TransitionKind::Fade).unwrap_err();
        assert!(matches!(
            err,
            NavigationError::UnknownView {
                view: Screen::Contact
            }
        ));
        assert!(!ctrl.in_transition());
        assert_eq!(ctrl.current_view(), Screen::Home);
    }

    #[test]
    fn test_unknown_initial_view() {
        let registry = ViewRegistry::<Screen, &str>::builder()
            .register(Screen::Home, || "home")
            .build();
        let result = TransitionController::new(
            registry,
            Screen::About,
            Box::new(ManualClock::new()),
            TransitionTiming::default(),
        );
        assert!(matches!(
            result,
            Err(NavigationError::UnknownView { view: Screen::About })
        ));
    }

    #[test]
    fn test_fade_without_work_skips_intermediate_phase() {
        let clock = ManualClock::new();
        let mut ctrl = controller(&clock);
        ctrl.navigate(Screen::About, TransitionKind::Fade).unwrap();
        assert!(ctrl.in_transition());

        let frame = ctrl.render().unwrap();
        assert_eq!(frame.content, "home");
        assert_eq!(frame.opacity, 1.0);

        clock.advance(Duration::from_millis(250));
        let frame = ctrl.render().unwrap();
        assert_eq!(frame.content, "home");
        assert!((frame.opacity - 0.5).abs() < 1e-6);

        clock.advance(Duration::from_millis(250));
        let frame = ctrl.render().unwrap();
        assert_eq!(ctrl.phase(), TransitionPhase::FadingIn);
        assert_eq!(frame.content, "about");
        assert_eq!(frame.opacity, 0.0);
        assert!(!frame.loading);
        assert_eq!(ctrl.pending_view(), None);

        clock.advance(Duration::from_millis(500));
        let frame = ctrl.render().unwrap();
        assert_eq!(frame.opacity, 1.0);
        assert_eq!(ctrl.phase(), TransitionPhase::Idle);
        assert!(!ctrl.in_transition());
    }

    #[test]
    fn test_none_kind_swaps_synchronously() {
        let clock = ManualClock::new();
        let mut ctrl = controller(&clock);
        ctrl.navigate(Screen::About, TransitionKind::None).unwrap();
        assert_eq!(ctrl.current_view(), Screen::About);
        assert!(!ctrl.in_transition());

        let frame = ctrl.render().unwrap();
        assert_eq!(frame.content, "about");
        assert_eq!(ctrl.current_view(), Screen::About);
        assert!(!ctrl.in_transition());
    }

    #[test]
    fn test_navigate_restarts_fade_out() {
        let clock = ManualClock::new();
        let mut ctrl = controller(&clock);
        ctrl.navigate(Screen::About, TransitionKind::Fade).unwrap();
        clock.advance(Duration::from_millis(400));
        ctrl.render().unwrap();

        ctrl.navigate(Screen::Home, TransitionKind::Fade).unwrap();
        let frame = ctrl.render().unwrap();
        assert_eq!(frame.opacity, 1.0);
        assert_eq!(ctrl.pending_view(), Some(Screen::Home));
    }

    #[test]
    fn test_loading_indicator_shows_before_work_runs() {
        let clock = ManualClock::new();
        let mut ctrl = controller(&clock);
        let ran = Rc::new(std::cell::Cell::new(false));
        let flag = ran.clone();
        ctrl.queue_intermediate(false, move || {
            let flag = flag.clone();
            async move {
                flag.set(true);
                anyhow::Ok(())
            }
        });

        ctrl.navigate(Screen::About, TransitionKind::Fade).unwrap();
        clock.advance(Duration::from_millis(500));
        let frame = ctrl.render().unwrap();
        assert!(frame.loading);
        assert_eq!(ctrl.phase(), TransitionPhase::RunningIntermediate);
        assert!(!ran.get(), "work must wait one frame for the indicator");

        let frame = ctrl.render().unwrap();
        assert!(frame.loading);
        assert!(ran.get());

        clock.advance(Duration::from_millis(999));
        assert!(ctrl.render().unwrap().loading);

        clock.advance(Duration::from_millis(1));
        let frame = ctrl.render().unwrap();
        assert!(!frame.loading);
        assert_eq!(frame.content, "about");
        assert_eq!(ctrl.phase(), TransitionPhase::FadingIn);
    }
}
