#![forbid(unsafe_code)]

//! Pure step state machine.
//!
//! [`StepMachine`] turns visibility notifications and wheel deltas into step
//! transitions. It performs no I/O: every side effect the host must carry out
//! comes back as a [`StepCommand`] inside the returned [`StepTransition`].
//!
//! # States
//!
//! ```text
//!            visible rising edge, step != max
//!   Idle ─────────────────────────────────────▶ Locked
//!    ▲                                          │  wheel ±1 inside bounds
//!    │        forward wheel reaches max         │◀─┘
//!    └──────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. `step_index` stays in `[0, max_step]` for any input sequence.
//! 2. Locking happens only on a `false -> true` visibility edge, never while
//!    already locked, and never at `max_step`.
//! 3. Every wheel event delivered while locked reports `prevent_default`.
//! 4. Wheel events while idle leave the state untouched.
//! 5. A lock entry emits exactly one [`StepCommand::AlignRegion`].

use crate::config::{ConfigError, ReentryPolicy, ScrollStepConfig};
use crate::state::{ScrollStepState, StepPhase, StepSnapshot};
use crate::wheel::{WheelDelta, WheelDirection};

/// Side effect requested from the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepCommand {
    /// Suspend the smooth-scroll driver (`stop()`).
    SuspendSmoothScroll,
    /// Resume the smooth-scroll driver (`start()`).
    ResumeSmoothScroll,
    /// Animate the page so the region top sits `offset_px` below the
    /// viewport top.
    AlignRegion { offset_px: f64 },
}

/// Where the region sits relative to the viewport at a visibility crossing.
///
/// On entry, `Above` means the region came in through the top edge (the page
/// is scrolling backward). On exit, `Below` means it left through the bottom
/// edge, so the next entry is a forward one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionSide {
    Above,
    Below,
}

impl RegionSide {
    /// Classify from the region's `boundingClientRect.top`. Zero and
    /// non-finite values carry no side.
    #[must_use]
    pub fn from_top_px(top: f64) -> Option<Self> {
        if top < 0.0 {
            Some(Self::Above)
        } else if top > 0.0 {
            Some(Self::Below)
        } else {
            None
        }
    }
}

/// Input that produced a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepTrigger {
    Visibility {
        in_view: bool,
        side: Option<RegionSide>,
    },
    Wheel { delta: WheelDelta },
    Release,
}

/// Why an input left the state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepIgnoredReason {
    /// Wheel input while idle; the page scrolls natively.
    NotLocked,
    /// Visibility report matching the current value.
    NoCrossing,
    /// Rising edge while a lock is already held.
    AlreadyLocked,
    /// Rising edge after the sequence was exhausted.
    Exhausted,
    /// Wheel direction would leave `[0, max_step]`.
    AtBoundary,
    /// Zero or non-finite wheel delta.
    NoDirection,
    /// Falling edge while locked; the lock is kept.
    HeldWhileLocked,
    /// Rising edge through the top of the viewport; only forward entries lock.
    BackwardEntry,
}

/// Effect of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepEffect {
    /// Idle -> Locked on entry.
    Locked,
    /// Step index moved forward by one.
    Advanced,
    /// Step index moved backward by one.
    Retreated,
    /// Forward step reached `max_step`; lock released.
    Completed,
    /// Backward wheel at step 0 released the lock.
    ReleasedAtStart,
    /// Region left the viewport while idle.
    Exited,
    /// Region left through the bottom of the viewport while exhausted;
    /// sequence rewound to step 0.
    Rewound,
    /// Lock released by teardown.
    Released,
    Ignored(StepIgnoredReason),
}

/// Result of feeding one input to the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTransition {
    pub trigger: StepTrigger,
    pub effect: StepEffect,
    pub from: StepPhase,
    pub to: StepPhase,
    pub step_before: u16,
    pub step_after: u16,
    /// Host must suppress the native default action of the input event.
    pub prevent_default: bool,
    /// Host side effects, in execution order.
    pub commands: Vec<StepCommand>,
}

impl StepTransition {
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self.effect, StepEffect::Ignored(_))
    }

    #[must_use]
    pub fn step_changed(&self) -> bool {
        self.step_before != self.step_after
    }

    #[must_use]
    pub fn ignored_reason(&self) -> Option<StepIgnoredReason> {
        match self.effect {
            StepEffect::Ignored(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Deterministic step machine.
#[derive(Debug, Clone)]
pub struct StepMachine {
    state: ScrollStepState,
    config: ScrollStepConfig,
}

impl StepMachine {
    /// Construct a machine from a validated config.
    pub fn new(config: ScrollStepConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        Ok(Self {
            state: ScrollStepState::new(config.max_step),
            config,
        })
    }

    #[must_use]
    pub const fn state(&self) -> &ScrollStepState {
        &self.state
    }

    #[must_use]
    pub const fn config(&self) -> &ScrollStepConfig {
        &self.config
    }

    #[must_use]
    pub const fn snapshot(&self) -> StepSnapshot {
        self.state.snapshot()
    }

    /// Return to step 0, idle and out of view.
    pub fn reset(&mut self) {
        self.state = ScrollStepState::new(self.config.max_step);
    }

    /// Feed a raw intersection ratio; compares it against the configured
    /// visibility threshold.
    pub fn on_intersection(&mut self, ratio: f64) -> StepTransition {
        self.on_intersection_at(ratio, None)
    }

    /// Feed an intersection ratio together with the side of the viewport the
    /// region sits on.
    pub fn on_intersection_at(&mut self, ratio: f64, side: Option<RegionSide>) -> StepTransition {
        // NaN compares false and counts as out of view.
        let in_view = ratio >= self.config.visibility_threshold;
        self.on_region_crossing(in_view, side)
    }

    /// Feed a visibility notification with no geometry.
    pub fn on_visibility_change(&mut self, in_view: bool) -> StepTransition {
        self.on_region_crossing(in_view, None)
    }

    /// Feed a visibility notification.
    ///
    /// An entry through the top edge never locks, and under
    /// [`ReentryPolicy::ResetOnExit`] only an exit through the bottom edge
    /// rewinds an exhausted sequence.
    pub fn on_region_crossing(
        &mut self,
        in_view: bool,
        side: Option<RegionSide>,
    ) -> StepTransition {
        let trigger = StepTrigger::Visibility { in_view, side };
        if in_view == self.state.in_view {
            return self.ignored(trigger, StepIgnoredReason::NoCrossing, false);
        }
        self.state.in_view = in_view;

        if in_view {
            if self.state.locked {
                return self.ignored(trigger, StepIgnoredReason::AlreadyLocked, false);
            }
            if self.state.at_last_step() {
                return self.ignored(trigger, StepIgnoredReason::Exhausted, false);
            }
            if side == Some(RegionSide::Above) {
                return self.ignored(trigger, StepIgnoredReason::BackwardEntry, false);
            }
            return self.apply(
                trigger,
                StepEffect::Locked,
                false,
                |state| state.locked = true,
                vec![
                    StepCommand::SuspendSmoothScroll,
                    StepCommand::AlignRegion {
                        offset_px: self.config.align_offset_px,
                    },
                ],
            );
        }

        if self.state.locked {
            return self.ignored(trigger, StepIgnoredReason::HeldWhileLocked, false);
        }
        if self.state.exhausted
            && self.config.reentry == ReentryPolicy::ResetOnExit
            && side == Some(RegionSide::Below)
        {
            return self.apply(
                trigger,
                StepEffect::Rewound,
                false,
                |state| {
                    state.step_index = 0;
                    state.exhausted = false;
                },
                Vec::new(),
            );
        }
        self.apply(trigger, StepEffect::Exited, false, |_| {}, Vec::new())
    }

    /// Feed one wheel event.
    pub fn on_wheel(&mut self, delta: impl Into<WheelDelta>) -> StepTransition {
        let delta = delta.into();
        let trigger = StepTrigger::Wheel { delta };
        if !self.state.locked {
            return self.ignored(trigger, StepIgnoredReason::NotLocked, false);
        }

        let max_step = self.state.max_step;
        match delta.direction() {
            WheelDirection::None => self.ignored(trigger, StepIgnoredReason::NoDirection, true),
            WheelDirection::Forward if self.state.step_index >= max_step => {
                self.ignored(trigger, StepIgnoredReason::AtBoundary, true)
            }
            WheelDirection::Forward if self.state.step_index + 1 == max_step => self.apply(
                trigger,
                StepEffect::Completed,
                true,
                |state| {
                    state.step_index = max_step;
                    state.locked = false;
                    state.exhausted = true;
                },
                vec![StepCommand::ResumeSmoothScroll],
            ),
            WheelDirection::Forward => self.apply(
                trigger,
                StepEffect::Advanced,
                true,
                |state| state.step_index += 1,
                Vec::new(),
            ),
            WheelDirection::Backward if self.state.step_index == 0 => {
                if self.config.release_at_start {
                    self.apply(
                        trigger,
                        StepEffect::ReleasedAtStart,
                        true,
                        |state| state.locked = false,
                        vec![StepCommand::ResumeSmoothScroll],
                    )
                } else {
                    self.ignored(trigger, StepIgnoredReason::AtBoundary, true)
                }
            }
            WheelDirection::Backward => self.apply(
                trigger,
                StepEffect::Retreated,
                true,
                |state| state.step_index -= 1,
                Vec::new(),
            ),
        }
    }

    /// Drop any held lock. Used on teardown; a no-op while idle.
    pub fn release(&mut self) -> StepTransition {
        let trigger = StepTrigger::Release;
        if !self.state.locked {
            return self.ignored(trigger, StepIgnoredReason::NotLocked, false);
        }
        self.apply(
            trigger,
            StepEffect::Released,
            false,
            |state| state.locked = false,
            vec![StepCommand::ResumeSmoothScroll],
        )
    }

    fn apply(
        &mut self,
        trigger: StepTrigger,
        effect: StepEffect,
        prevent_default: bool,
        mutate: impl FnOnce(&mut ScrollStepState),
        commands: Vec<StepCommand>,
    ) -> StepTransition {
        let from = self.state.phase();
        let step_before = self.state.step_index;
        mutate(&mut self.state);
        debug_assert!(self.state.step_index <= self.state.max_step);
        let transition = StepTransition {
            trigger,
            effect,
            from,
            to: self.state.phase(),
            step_before,
            step_after: self.state.step_index,
            prevent_default,
            commands,
        };
        tracing::debug!(
            target: "scrollstep.machine",
            effect = ?transition.effect,
            from = transition.from.label(),
            to = transition.to.label(),
            step_before = transition.step_before,
            step_after = transition.step_after,
            "step transition"
        );
        transition
    }

    fn ignored(
        &self,
        trigger: StepTrigger,
        reason: StepIgnoredReason,
        prevent_default: bool,
    ) -> StepTransition {
        let phase = self.state.phase();
        StepTransition {
            trigger,
            effect: StepEffect::Ignored(reason),
            from: phase,
            to: phase,
            step_before: self.state.step_index,
            step_after: self.state.step_index,
            prevent_default,
            commands: Vec::new(),
        }
    }
}
