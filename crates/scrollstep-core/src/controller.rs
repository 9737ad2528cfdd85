#![forbid(unsafe_code)]

//! Scroll-step controller.
//!
//! [`ScrollStepController`] owns a [`StepMachine`] and the injected
//! collaborators. Hosts forward visibility notifications and wheel events;
//! the controller runs the machine, carries out the resulting
//! [`StepCommand`]s, and tells the host whether to suppress the native
//! default.
//!
//! Lifecycle:
//! - [`attach`](ScrollStepController::attach) starts a fresh session at step
//!   0 and registers observation.
//! - Events delivered while detached are recorded and dropped.
//! - [`detach`](ScrollStepController::detach) is idempotent; it disconnects
//!   observation and resumes the smooth-scroll driver if a lock is held.
//!   Dropping an attached controller detaches it.
//!
//! A missing smooth-scroll driver is not an error: suspend/resume commands
//! are skipped until one is installed.

use std::collections::VecDeque;

use crate::config::{ConfigError, ScrollStepConfig};
use crate::host::{PageScroller, SmoothScrollDriver, VisibilityObserver};
use crate::machine::{
    RegionSide, StepCommand, StepEffect, StepIgnoredReason, StepMachine, StepTransition,
};
use crate::state::{ScrollStepState, StepSnapshot};
use crate::wheel::WheelDelta;

/// Lifecycle phase recorded for one controller dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepLifecyclePhase {
    Attach,
    Visibility,
    Wheel,
    DriverInstalled,
    Detach,
}

/// Outcome category for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepLogOutcome {
    /// The machine changed state.
    Applied(StepEffect),
    /// The machine saw the input and left the state unchanged.
    Ignored(StepIgnoredReason),
    /// The controller is not attached; the input never reached the machine.
    NotAttached,
    /// Lifecycle bookkeeping with no machine input.
    Lifecycle,
}

/// Structured record of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepLogEntry {
    pub sequence: u64,
    pub phase: StepLifecyclePhase,
    pub step_index: u16,
    pub locked: bool,
    pub commands_run: u8,
    pub commands_skipped: u8,
    pub outcome: StepLogOutcome,
}

/// Result of one controller dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDispatch {
    pub transition: Option<StepTransition>,
    pub log: StepLogEntry,
}

impl StepDispatch {
    /// Whether the host must suppress the native default action.
    #[must_use]
    pub fn prevent_default(&self) -> bool {
        self.transition
            .as_ref()
            .is_some_and(|transition| transition.prevent_default)
    }
}

/// Answer to a wheel event, in the shape a DOM listener needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelVerdict {
    pub prevent_default: bool,
    pub step_index: u16,
    pub locked: bool,
}

/// Step controller bound to one region.
pub struct ScrollStepController<D, S, O>
where
    D: SmoothScrollDriver,
    S: PageScroller,
    O: VisibilityObserver,
{
    machine: StepMachine,
    driver: Option<D>,
    scroller: S,
    observer: Option<O>,
    log: VecDeque<StepLogEntry>,
    next_sequence: u64,
}

impl<D, S, O> ScrollStepController<D, S, O>
where
    D: SmoothScrollDriver,
    S: PageScroller,
    O: VisibilityObserver,
{
    /// Build a detached controller. `driver` may be `None` when the
    /// smooth-scroll driver initialises later.
    pub fn new(config: ScrollStepConfig, driver: Option<D>, scroller: S) -> Result<Self, ConfigError> {
        let capacity = config.log_capacity;
        Ok(Self {
            machine: StepMachine::new(config)?,
            driver,
            scroller,
            observer: None,
            log: VecDeque::with_capacity(capacity),
            next_sequence: 1,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ScrollStepConfig {
        self.machine.config()
    }

    #[must_use]
    pub const fn state(&self) -> &ScrollStepState {
        self.machine.state()
    }

    #[must_use]
    pub const fn snapshot(&self) -> StepSnapshot {
        self.machine.snapshot()
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.observer.is_some()
    }

    #[must_use]
    pub const fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Retained dispatch records, oldest first.
    pub fn dispatch_log(&self) -> impl Iterator<Item = &StepLogEntry> + '_ {
        self.log.iter()
    }

    #[must_use]
    pub fn last_log(&self) -> Option<&StepLogEntry> {
        self.log.back()
    }

    pub fn driver_mut(&mut self) -> Option<&mut D> {
        self.driver.as_mut()
    }

    pub fn scroller_mut(&mut self) -> &mut S {
        &mut self.scroller
    }

    pub fn observer_mut(&mut self) -> Option<&mut O> {
        self.observer.as_mut()
    }

    /// Install (or replace) the smooth-scroll driver. If a lock is already
    /// held, the outgoing driver is restarted and the new one stopped, so
    /// every `stop()` stays paired with a `start()` on the same driver.
    pub fn install_driver(&mut self, mut driver: D) -> StepDispatch {
        let mut run = 0;
        let previous = self.driver.take();
        if self.machine.state().locked() {
            if let Some(mut previous) = previous {
                previous.start();
                run += 1;
            }
            driver.stop();
            run += 1;
        }
        self.driver = Some(driver);
        tracing::debug!(
            target: "scrollstep.controller",
            locked = self.machine.state().locked(),
            "smooth-scroll driver installed"
        );
        self.record(
            StepLifecyclePhase::DriverInstalled,
            None,
            StepLogOutcome::Lifecycle,
            run,
            0,
        )
    }

    /// Start a fresh session observing the region through `observer`.
    ///
    /// An attached controller is detached first.
    pub fn attach(&mut self, mut observer: O) -> StepDispatch {
        if self.is_attached() {
            self.detach();
        }
        self.machine.reset();
        let threshold = self.machine.config().visibility_threshold;
        observer.observe(threshold);
        self.observer = Some(observer);
        tracing::debug!(
            target: "scrollstep.controller",
            threshold,
            max_step = self.machine.config().max_step,
            "controller attached"
        );
        self.record(StepLifecyclePhase::Attach, None, StepLogOutcome::Lifecycle, 0, 0)
    }

    /// Tear down: disconnect observation and resume the driver if locked.
    /// Safe to call repeatedly.
    pub fn detach(&mut self) -> StepDispatch {
        let Some(mut observer) = self.observer.take() else {
            return self.record(
                StepLifecyclePhase::Detach,
                None,
                StepLogOutcome::NotAttached,
                0,
                0,
            );
        };
        observer.disconnect();
        let transition = self.machine.release();
        let (run, skipped) = self.run_commands(&transition.commands);
        tracing::debug!(
            target: "scrollstep.controller",
            released = !transition.is_ignored(),
            step_index = self.machine.state().step_index(),
            "controller detached"
        );
        let outcome = outcome_of(&transition);
        self.record(
            StepLifecyclePhase::Detach,
            Some(transition),
            outcome,
            run,
            skipped,
        )
    }

    /// Forward a boolean visibility notification.
    pub fn handle_visibility(&mut self, in_view: bool) -> StepDispatch {
        let _span = tracing::debug_span!("scrollstep.visibility", in_view).entered();
        self.dispatch(StepLifecyclePhase::Visibility, |machine| {
            machine.on_visibility_change(in_view)
        })
    }

    /// Forward a raw intersection ratio.
    pub fn handle_intersection(&mut self, ratio: f64) -> StepDispatch {
        let _span = tracing::debug_span!("scrollstep.visibility", ratio).entered();
        self.dispatch(StepLifecyclePhase::Visibility, |machine| {
            machine.on_intersection(ratio)
        })
    }

    /// Forward a raw intersection ratio with the side of the viewport the
    /// region sits on.
    pub fn handle_intersection_at(&mut self, ratio: f64, side: Option<RegionSide>) -> StepDispatch {
        let _span = tracing::debug_span!("scrollstep.visibility", ratio, side = ?side).entered();
        self.dispatch(StepLifecyclePhase::Visibility, |machine| {
            machine.on_intersection_at(ratio, side)
        })
    }

    /// Forward a wheel event and return the full dispatch record.
    pub fn dispatch_wheel(&mut self, delta: impl Into<WheelDelta>) -> StepDispatch {
        let delta = delta.into();
        let _span = tracing::debug_span!("scrollstep.wheel", dy = delta.dy).entered();
        self.dispatch(StepLifecyclePhase::Wheel, |machine| machine.on_wheel(delta))
    }

    /// Forward a wheel event.
    pub fn handle_wheel(&mut self, delta: impl Into<WheelDelta>) -> WheelVerdict {
        let dispatch = self.dispatch_wheel(delta);
        WheelVerdict {
            prevent_default: dispatch.prevent_default(),
            step_index: dispatch.log.step_index,
            locked: dispatch.log.locked,
        }
    }

    fn dispatch(
        &mut self,
        phase: StepLifecyclePhase,
        step: impl FnOnce(&mut StepMachine) -> StepTransition,
    ) -> StepDispatch {
        if !self.is_attached() {
            tracing::trace!(
                target: "scrollstep.controller",
                phase = ?phase,
                "input dropped while detached"
            );
            return self.record(phase, None, StepLogOutcome::NotAttached, 0, 0);
        }
        let transition = step(&mut self.machine);
        let (run, skipped) = self.run_commands(&transition.commands);
        let outcome = outcome_of(&transition);
        self.record(phase, Some(transition), outcome, run, skipped)
    }

    fn run_commands(&mut self, commands: &[StepCommand]) -> (u8, u8) {
        let mut run = 0u8;
        let mut skipped = 0u8;
        for command in commands {
            match (*command, self.driver.as_mut()) {
                (StepCommand::SuspendSmoothScroll, Some(driver)) => {
                    driver.stop();
                    run += 1;
                }
                (StepCommand::ResumeSmoothScroll, Some(driver)) => {
                    driver.start();
                    run += 1;
                }
                (StepCommand::SuspendSmoothScroll | StepCommand::ResumeSmoothScroll, None) => {
                    tracing::debug!(
                        target: "scrollstep.controller",
                        command = ?command,
                        "smooth-scroll driver not installed; command skipped"
                    );
                    skipped += 1;
                }
                (StepCommand::AlignRegion { offset_px }, _) => {
                    self.scroller.scroll_to_region(offset_px);
                    run += 1;
                }
            }
        }
        (run, skipped)
    }

    fn record(
        &mut self,
        phase: StepLifecyclePhase,
        transition: Option<StepTransition>,
        outcome: StepLogOutcome,
        commands_run: u8,
        commands_skipped: u8,
    ) -> StepDispatch {
        let state = self.machine.state();
        let entry = StepLogEntry {
            sequence: self.next_sequence,
            phase,
            step_index: state.step_index(),
            locked: state.locked(),
            commands_run,
            commands_skipped,
            outcome,
        };
        self.next_sequence += 1;
        if self.log.len() == self.machine.config().log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(entry);
        StepDispatch {
            transition,
            log: entry,
        }
    }
}

impl<D, S, O> Drop for ScrollStepController<D, S, O>
where
    D: SmoothScrollDriver,
    S: PageScroller,
    O: VisibilityObserver,
{
    fn drop(&mut self) {
        if self.is_attached() {
            self.detach();
        }
    }
}

impl<D, S, O> std::fmt::Debug for ScrollStepController<D, S, O>
where
    D: SmoothScrollDriver,
    S: PageScroller,
    O: VisibilityObserver,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollStepController")
            .field("state", self.machine.state())
            .field("attached", &self.is_attached())
            .field("has_driver", &self.has_driver())
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

fn outcome_of(transition: &StepTransition) -> StepLogOutcome {
    match transition.effect {
        StepEffect::Ignored(reason) => StepLogOutcome::Ignored(reason),
        effect => StepLogOutcome::Applied(effect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{
        CallLog, HostCall, RecordingDriver, RecordingObserver, RecordingScroller,
    };

    type TestController = ScrollStepController<RecordingDriver, RecordingScroller, RecordingObserver>;

    fn attached(log: &CallLog, config: ScrollStepConfig) -> TestController {
        let mut controller =
            TestController::new(config, Some(log.driver()), log.scroller()).expect("valid config");
        controller.attach(log.observer());
        controller
    }

    #[test]
    fn attach_observes_with_configured_threshold() {
        let log = CallLog::new();
        let controller = attached(&log, ScrollStepConfig::default().visibility_threshold(0.75));
        assert!(controller.is_attached());
        assert_eq!(log.calls(), vec![HostCall::Observe(0.75)]);
    }

    #[test]
    fn lock_entry_stops_driver_then_aligns() {
        let log = CallLog::new();
        let mut controller = attached(&log, ScrollStepConfig::default());
        log.clear();
        let dispatch = controller.handle_visibility(true);
        assert_eq!(log.calls(), vec![HostCall::Stop, HostCall::ScrollToRegion(100.0)]);
        assert_eq!(dispatch.log.outcome, StepLogOutcome::Applied(StepEffect::Locked));
        assert_eq!(dispatch.log.commands_run, 2);
    }

    #[test]
    fn completing_the_sequence_restarts_driver() {
        let log = CallLog::new();
        let mut controller = attached(&log, ScrollStepConfig::with_max_step(2));
        controller.handle_visibility(true);
        log.clear();
        assert!(controller.handle_wheel(10.0).prevent_default);
        let verdict = controller.handle_wheel(10.0);
        assert_eq!(
            verdict,
            WheelVerdict {
                prevent_default: true,
                step_index: 2,
                locked: false,
            }
        );
        assert_eq!(log.calls(), vec![HostCall::Start]);
    }

    #[test]
    fn detach_while_locked_resumes_driver_and_disconnects() {
        let log = CallLog::new();
        let mut controller = attached(&log, ScrollStepConfig::default());
        controller.handle_visibility(true);
        controller.handle_wheel(1.0);
        log.clear();

        let dispatch = controller.detach();
        assert_eq!(log.calls(), vec![HostCall::Disconnect, HostCall::Start]);
        assert_eq!(dispatch.log.outcome, StepLogOutcome::Applied(StepEffect::Released));
        assert!(!controller.state().locked());

        let before = *controller.state();
        let verdict = controller.handle_wheel(1.0);
        assert!(!verdict.prevent_default);
        assert_eq!(*controller.state(), before);
        assert_eq!(
            controller.last_log().map(|entry| entry.outcome),
            Some(StepLogOutcome::NotAttached)
        );
    }

    #[test]
    fn detach_is_idempotent() {
        let log = CallLog::new();
        let mut controller = attached(&log, ScrollStepConfig::default());
        controller.handle_visibility(true);
        controller.detach();
        log.clear();
        let dispatch = controller.detach();
        assert_eq!(dispatch.log.outcome, StepLogOutcome::NotAttached);
        assert!(log.calls().is_empty());
    }

    #[test]
    fn missing_driver_skips_suspend_and_resume() {
        let log = CallLog::new();
        let mut controller =
            TestController::new(ScrollStepConfig::with_max_step(1), None, log.scroller())
                .expect("valid config");
        controller.attach(log.observer());
        let lock = controller.handle_visibility(true);
        assert_eq!(lock.log.commands_skipped, 1);
        assert_eq!(lock.log.commands_run, 1);
        assert!(controller.state().locked());

        let done = controller.dispatch_wheel(5.0);
        assert_eq!(done.log.commands_skipped, 1);
        assert!(!controller.state().locked());
        assert_eq!(log.count(&HostCall::Start), 0);
    }

    #[test]
    fn late_driver_is_stopped_when_lock_is_held() {
        let log = CallLog::new();
        let mut controller =
            TestController::new(ScrollStepConfig::default(), None, log.scroller())
                .expect("valid config");
        controller.attach(log.observer());
        controller.handle_visibility(true);
        log.clear();
        controller.install_driver(log.driver());
        assert_eq!(log.calls(), vec![HostCall::Stop]);
        controller.detach();
        assert_eq!(log.count(&HostCall::Start), 1);
    }

    #[test]
    fn replacing_driver_while_locked_restarts_the_old_one() {
        let old = CallLog::new();
        let new = CallLog::new();
        let mut controller = attached(&old, ScrollStepConfig::default());
        controller.handle_visibility(true);
        assert_eq!(old.count(&HostCall::Stop), 1);

        let dispatch = controller.install_driver(new.driver());
        assert_eq!(dispatch.log.commands_run, 2);
        assert_eq!(old.count(&HostCall::Start), 1);
        assert_eq!(new.calls(), vec![HostCall::Stop]);

        controller.detach();
        assert_eq!(old.count(&HostCall::Start), 1);
        assert_eq!(new.count(&HostCall::Start), 1);
    }

    #[test]
    fn replacing_driver_while_idle_touches_neither() {
        let old = CallLog::new();
        let new = CallLog::new();
        let mut controller = attached(&old, ScrollStepConfig::default());
        old.clear();
        controller.install_driver(new.driver());
        assert!(old.calls().is_empty());
        assert!(new.calls().is_empty());
    }

    #[test]
    fn intersection_from_above_does_not_lock() {
        let log = CallLog::new();
        let mut controller = attached(&log, ScrollStepConfig::default());
        log.clear();
        let dispatch = controller.handle_intersection_at(0.9, Some(RegionSide::Above));
        assert_eq!(
            dispatch.log.outcome,
            StepLogOutcome::Ignored(StepIgnoredReason::BackwardEntry)
        );
        assert!(log.calls().is_empty());
    }

    #[test]
    fn events_before_attach_are_dropped() {
        let log = CallLog::new();
        let mut controller =
            TestController::new(ScrollStepConfig::default(), Some(log.driver()), log.scroller())
                .expect("valid config");
        let dispatch = controller.handle_visibility(true);
        assert_eq!(dispatch.log.outcome, StepLogOutcome::NotAttached);
        assert!(dispatch.transition.is_none());
        assert!(!controller.state().locked());
        assert!(log.calls().is_empty());
    }

    #[test]
    fn reattach_starts_a_fresh_session() {
        let log = CallLog::new();
        let mut controller = attached(&log, ScrollStepConfig::with_max_step(1));
        controller.handle_visibility(true);
        controller.handle_wheel(1.0);
        assert_eq!(controller.state().step_index(), 1);

        controller.attach(log.observer());
        assert_eq!(controller.state().step_index(), 0);
        assert!(!controller.state().in_view());
        assert_eq!(
            controller.handle_visibility(true).log.outcome,
            StepLogOutcome::Applied(StepEffect::Locked)
        );
    }

    #[test]
    fn drop_detaches() {
        let log = CallLog::new();
        {
            let mut controller = attached(&log, ScrollStepConfig::default());
            controller.handle_visibility(true);
        }
        let calls = log.calls();
        assert_eq!(&calls[calls.len() - 2..], &[HostCall::Disconnect, HostCall::Start]);
    }

    #[test]
    fn dispatch_log_is_bounded_and_sequenced() {
        let log = CallLog::new();
        let config = ScrollStepConfig {
            log_capacity: 4,
            ..ScrollStepConfig::default()
        };
        let mut controller = attached(&log, config);
        for _ in 0..10 {
            controller.handle_wheel(1.0);
        }
        let sequences: Vec<u64> = controller.dispatch_log().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![8, 9, 10, 11]);
    }
}
