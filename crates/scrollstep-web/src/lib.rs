#![forbid(unsafe_code)]

//! `scrollstep-web` provides a host-driven adapter for the scroll-step
//! controller.
//!
//! Design goals:
//! - **Host-driven I/O**: the embedding environment (JS) pushes wheel and
//!   visibility inputs and drains the resulting host commands.
//! - **Deterministic**: no clocks, no threads, no blocking; suitable for
//!   `wasm32-unknown-unknown` and for replaying recorded sessions.
//!
//! This crate does not bind to `wasm-bindgen`. `scrollstep-wasm` wraps it
//! with a JS API.

#[cfg(feature = "input-parser")]
pub mod input_parser;
pub mod session_record;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use scrollstep_core::{
    ConfigError, PageScroller, RegionSide, ScrollStepConfig, ScrollStepController,
    SmoothScrollDriver, StepDispatch, StepSnapshot, VisibilityObserver, WheelDelta, WheelVerdict,
};

/// One input delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepInput {
    /// A wheel event on the page.
    Wheel(WheelDelta),
    /// Raw intersection ratio of the controlled region.
    Intersection(f64),
    /// Intersection ratio with the viewport side the region sits on.
    IntersectionAt { ratio: f64, side: RegionSide },
    /// Pre-thresholded visibility notification.
    Visibility(bool),
    /// Start (or restart) observing the region.
    Attach,
    /// Region unmounted.
    Detach,
}

/// Side effect the host must carry out, in emission order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostCommand {
    StopSmoothScroll,
    StartSmoothScroll,
    ScrollToRegion { offset_px: f64 },
    Observe { threshold: f64 },
    Disconnect,
}

impl HostCommand {
    /// Stable snake_case label for JSON and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StopSmoothScroll => "stop_smooth_scroll",
            Self::StartSmoothScroll => "start_smooth_scroll",
            Self::ScrollToRegion { .. } => "scroll_to_region",
            Self::Observe { .. } => "observe",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Shared FIFO of pending host commands.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue(Rc<RefCell<VecDeque<HostCommand>>>);

impl CommandQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, command: HostCommand) {
        tracing::trace!(target: "scrollstep.web", command = command.label(), "host command queued");
        self.0.borrow_mut().push_back(command);
    }

    /// Remove and return every pending command.
    pub fn drain(&self) -> Vec<HostCommand> {
        self.0.borrow_mut().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Smooth-scroll driver that queues start/stop for the host.
#[derive(Debug, Clone)]
pub struct WebDriver(CommandQueue);

impl SmoothScrollDriver for WebDriver {
    fn stop(&mut self) {
        self.0.push(HostCommand::StopSmoothScroll);
    }

    fn start(&mut self) {
        self.0.push(HostCommand::StartSmoothScroll);
    }
}

/// Page scroller that queues alignment requests for the host.
#[derive(Debug, Clone)]
pub struct WebScroller(CommandQueue);

impl PageScroller for WebScroller {
    fn scroll_to_region(&mut self, offset_px: f64) {
        self.0.push(HostCommand::ScrollToRegion { offset_px });
    }
}

/// Visibility observer that queues (dis)connect requests for the host.
#[derive(Debug, Clone)]
pub struct WebObserver(CommandQueue);

impl VisibilityObserver for WebObserver {
    fn observe(&mut self, threshold: f64) {
        self.0.push(HostCommand::Observe { threshold });
    }

    fn disconnect(&mut self) {
        self.0.push(HostCommand::Disconnect);
    }
}

pub type WebController = ScrollStepController<WebDriver, WebScroller, WebObserver>;

/// Host-driven step controller.
///
/// The host pushes [`StepInput`]s and drains [`HostCommand`]s after each
/// push.
#[derive(Debug)]
pub struct WebStepHost {
    controller: WebController,
    queue: CommandQueue,
}

impl WebStepHost {
    /// Create a detached host. With `with_driver == false` the smooth-scroll
    /// driver is considered not yet initialised; see
    /// [`install_driver`](Self::install_driver).
    pub fn new(config: ScrollStepConfig, with_driver: bool) -> Result<Self, ConfigError> {
        let queue = CommandQueue::new();
        let driver = with_driver.then(|| WebDriver(queue.clone()));
        let controller = WebController::new(config, driver, WebScroller(queue.clone()))?;
        Ok(Self { controller, queue })
    }

    #[must_use]
    pub const fn controller(&self) -> &WebController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut WebController {
        &mut self.controller
    }

    #[must_use]
    pub const fn snapshot(&self) -> StepSnapshot {
        self.controller.snapshot()
    }

    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.controller.is_attached()
    }

    /// Mark the smooth-scroll driver as available.
    pub fn install_driver(&mut self) -> StepDispatch {
        self.controller.install_driver(WebDriver(self.queue.clone()))
    }

    pub fn attach(&mut self) -> StepDispatch {
        self.controller.attach(WebObserver(self.queue.clone()))
    }

    pub fn detach(&mut self) -> StepDispatch {
        self.controller.detach()
    }

    pub fn wheel(&mut self, delta: impl Into<WheelDelta>) -> WheelVerdict {
        self.controller.handle_wheel(delta)
    }

    /// Dispatch one host input.
    pub fn push_input(&mut self, input: StepInput) -> StepDispatch {
        match input {
            StepInput::Wheel(delta) => self.controller.dispatch_wheel(delta),
            StepInput::Intersection(ratio) => self.controller.handle_intersection(ratio),
            StepInput::IntersectionAt { ratio, side } => {
                self.controller.handle_intersection_at(ratio, Some(side))
            }
            StepInput::Visibility(in_view) => self.controller.handle_visibility(in_view),
            StepInput::Attach => self.attach(),
            StepInput::Detach => self.detach(),
        }
    }

    /// Remove and return every pending host command.
    pub fn drain_commands(&mut self) -> Vec<HostCommand> {
        self.queue.drain()
    }

    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }
}
