#![forbid(unsafe_code)]

//! Collaborator traits: the boundary between the step controller and the
//! page it runs on.
//!
//! The controller never reaches into globals. Hosts inject one implementation
//! of each trait: a browser binding, the deterministic in-memory host in
//! `scrollstep-web`, or a test fake.

/// Inertial/smoothed page scrolling that can be paused and resumed.
pub trait SmoothScrollDriver {
    /// Suspend smooth scrolling while steps are intercepted.
    fn stop(&mut self);

    /// Resume smooth scrolling.
    fn start(&mut self);
}

/// Animated page scroll primitive.
pub trait PageScroller {
    /// Animate the page so the controlled region's top edge sits `offset_px`
    /// below the viewport top.
    fn scroll_to_region(&mut self, offset_px: f64);
}

/// Visibility observation of the controlled region.
///
/// Implementations deliver in/out-of-view notifications back to the
/// controller through whatever channel the host owns.
pub trait VisibilityObserver {
    /// Begin observing with the given intersection threshold.
    fn observe(&mut self, threshold: f64);

    /// Stop observing. Must be safe to call more than once.
    fn disconnect(&mut self);
}

impl<T: SmoothScrollDriver + ?Sized> SmoothScrollDriver for Box<T> {
    fn stop(&mut self) {
        (**self).stop();
    }

    fn start(&mut self) {
        (**self).start();
    }
}

impl<T: PageScroller + ?Sized> PageScroller for Box<T> {
    fn scroll_to_region(&mut self, offset_px: f64) {
        (**self).scroll_to_region(offset_px);
    }
}

impl<T: VisibilityObserver + ?Sized> VisibilityObserver for Box<T> {
    fn observe(&mut self, threshold: f64) {
        (**self).observe(threshold);
    }

    fn disconnect(&mut self) {
        (**self).disconnect();
    }
}

/// Recording fakes for tests.
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{PageScroller, SmoothScrollDriver, VisibilityObserver};

    /// One collaborator call observed by a [`CallLog`].
    #[derive(Debug, Clone, PartialEq)]
    pub enum HostCall {
        Stop,
        Start,
        ScrollToRegion(f64),
        Observe(f64),
        Disconnect,
    }

    /// Shared, ordered log of collaborator calls.
    #[derive(Debug, Clone, Default)]
    pub struct CallLog(Rc<RefCell<Vec<HostCall>>>);

    impl CallLog {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, call: HostCall) {
            self.0.borrow_mut().push(call);
        }

        #[must_use]
        pub fn calls(&self) -> Vec<HostCall> {
            self.0.borrow().clone()
        }

        #[must_use]
        pub fn count(&self, call: &HostCall) -> usize {
            self.0.borrow().iter().filter(|c| *c == call).count()
        }

        /// Number of `scroll_to_region` calls, whatever the offset.
        #[must_use]
        pub fn align_count(&self) -> usize {
            self.0
                .borrow()
                .iter()
                .filter(|c| matches!(c, HostCall::ScrollToRegion(_)))
                .count()
        }

        pub fn clear(&self) {
            self.0.borrow_mut().clear();
        }

        #[must_use]
        pub fn driver(&self) -> RecordingDriver {
            RecordingDriver { log: self.clone() }
        }

        #[must_use]
        pub fn scroller(&self) -> RecordingScroller {
            RecordingScroller { log: self.clone() }
        }

        #[must_use]
        pub fn observer(&self) -> RecordingObserver {
            RecordingObserver { log: self.clone() }
        }
    }

    #[derive(Debug, Clone)]
    pub struct RecordingDriver {
        log: CallLog,
    }

    impl SmoothScrollDriver for RecordingDriver {
        fn stop(&mut self) {
            self.log.push(HostCall::Stop);
        }

        fn start(&mut self) {
            self.log.push(HostCall::Start);
        }
    }

    #[derive(Debug, Clone)]
    pub struct RecordingScroller {
        log: CallLog,
    }

    impl PageScroller for RecordingScroller {
        fn scroll_to_region(&mut self, offset_px: f64) {
            self.log.push(HostCall::ScrollToRegion(offset_px));
        }
    }

    #[derive(Debug, Clone)]
    pub struct RecordingObserver {
        log: CallLog,
    }

    impl VisibilityObserver for RecordingObserver {
        fn observe(&mut self, threshold: f64) {
            self.log.push(HostCall::Observe(threshold));
        }

        fn disconnect(&mut self) {
            self.log.push(HostCall::Disconnect);
        }
    }
}
