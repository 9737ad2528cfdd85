#![forbid(unsafe_code)]

//! Step state and the read-only snapshot handed to renderers.

/// Lock phase of the step machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StepPhase {
    /// Native page scrolling runs; wheel input is not intercepted.
    #[default]
    Idle,
    /// Native page scrolling is suspended and wheel input drives the step.
    Locked,
}

impl StepPhase {
    /// Stable lowercase label for logs and JSON.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Locked => "locked",
        }
    }
}

/// Mutable state owned by the step machine.
///
/// Invariant: `step_index <= max_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScrollStepState {
    pub(crate) step_index: u16,
    pub(crate) max_step: u16,
    pub(crate) locked: bool,
    pub(crate) in_view: bool,
    pub(crate) exhausted: bool,
}

impl ScrollStepState {
    /// Fresh state at step 0, unlocked and out of view.
    #[must_use]
    pub const fn new(max_step: u16) -> Self {
        Self {
            step_index: 0,
            max_step,
            locked: false,
            in_view: false,
            exhausted: false,
        }
    }

    #[must_use]
    pub const fn step_index(&self) -> u16 {
        self.step_index
    }

    #[must_use]
    pub const fn max_step(&self) -> u16 {
        self.max_step
    }

    #[must_use]
    pub const fn locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub const fn in_view(&self) -> bool {
        self.in_view
    }

    /// Whether the forward pass has reached the last step.
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.exhausted
    }

    #[must_use]
    pub const fn phase(&self) -> StepPhase {
        if self.locked {
            StepPhase::Locked
        } else {
            StepPhase::Idle
        }
    }

    #[must_use]
    pub const fn at_last_step(&self) -> bool {
        self.step_index == self.max_step
    }

    #[must_use]
    pub const fn snapshot(&self) -> StepSnapshot {
        StepSnapshot {
            step_index: self.step_index,
            max_step: self.max_step,
            locked: self.locked,
            in_view: self.in_view,
        }
    }
}

/// What a rendering layer needs to show the current item and a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepSnapshot {
    pub step_index: u16,
    pub max_step: u16,
    pub locked: bool,
    pub in_view: bool,
}

impl StepSnapshot {
    /// Number of display items in the sequence.
    #[must_use]
    pub const fn item_count(&self) -> u32 {
        self.max_step as u32 + 1
    }

    /// Fraction of the sequence walked, in `[0.0, 1.0]`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.max_step == 0 {
            return 1.0;
        }
        f64::from(self.step_index) / f64::from(self.max_step)
    }
}
