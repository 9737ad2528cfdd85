#![forbid(unsafe_code)]

//! Core: scroll-driven step state machine and controller.
//!
//! # Role in scrollstep
//! `scrollstep-core` owns the logic that turns wheel input into discrete steps
//! through a fixed, ordered sequence of display items while a page region is
//! the dominant visible content, suspending native page scroll until the
//! sequence is exhausted.
//!
//! # Primary responsibilities
//! - **StepMachine**: pure transitions (`on_visibility_change`, `on_wheel`)
//!   returning host commands; no I/O.
//! - **ScrollStepController**: applies those commands to injected
//!   collaborators and manages attach/detach.
//! - **Collaborator traits**: smooth-scroll driver, page scroller, visibility
//!   observer.
//! - **ScrollStepConfig**: tunables, optionally loaded from TOML/JSON.
//!
//! # How it fits in the system
//! `scrollstep-web` wraps the controller in a host-driven adapter with JSON
//! input parsing and session replay; `scrollstep-wasm` binds it to a real
//! browser page.

pub mod config;
pub mod controller;
pub mod host;
pub mod machine;
pub mod state;
pub mod wheel;

pub use config::{ConfigError, ReentryPolicy, ScrollStepConfig};
pub use controller::{
    ScrollStepController, StepDispatch, StepLifecyclePhase, StepLogEntry, StepLogOutcome,
    WheelVerdict,
};
pub use host::{PageScroller, SmoothScrollDriver, VisibilityObserver};
pub use machine::{
    RegionSide, StepCommand, StepEffect, StepIgnoredReason, StepMachine, StepTransition,
    StepTrigger,
};
pub use state::{ScrollStepState, StepPhase, StepSnapshot};
pub use wheel::{DeltaMode, WheelDelta, WheelDirection};
