#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for the ScrollStepRunner.
//!
//! Wraps [`super::runner_core::RunnerCore`] and carries out its host commands
//! against the DOM. Only compiled on `wasm32` targets.
//!
//! Closures hold a `Weak` reference to the shared state, so dropping the
//! runner frees everything even if the browser still holds a callback.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Element, IntersectionObserver, IntersectionObserverEntry,
    IntersectionObserverInit, ScrollBehavior, ScrollToOptions, WheelEvent, Window,
};

use super::runner_core::RunnerCore;
use scrollstep_web::{HostCommand, StepInput};

type IntersectCallback = Closure<dyn FnMut(Array, IntersectionObserver)>;
type WheelCallback = Closure<dyn FnMut(WheelEvent)>;

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

/// Call a zero-argument method on a JS object if it exists.
///
/// A driver that is missing or not yet initialised is skipped silently.
fn call_method(target: &JsValue, name: &str) {
    if target.is_undefined() || target.is_null() {
        return;
    }
    let Ok(method) = Reflect::get(target, &JsValue::from_str(name)) else {
        return;
    };
    let Ok(method) = method.dyn_into::<Function>() else {
        return;
    };
    if let Err(err) = method.call0(target) {
        console_error(&format!("smooth-scroll driver {name}() threw: {err:?}"));
    }
}

struct Shared {
    core: RefCell<RunnerCore>,
    window: Window,
    element: Element,
    driver: RefCell<JsValue>,
    observer: RefCell<Option<IntersectionObserver>>,
    on_intersect: RefCell<Option<IntersectCallback>>,
    on_wheel: RefCell<Option<WheelCallback>>,
    listening: Cell<bool>,
}

impl Shared {
    /// Drain pending host commands and carry them out. The core borrow is
    /// released before any JS call.
    fn flush(&self) {
        let commands = self.core.borrow_mut().drain_commands();
        self.execute(commands);
    }

    fn execute(&self, commands: Vec<HostCommand>) {
        for command in commands {
            match command {
                HostCommand::StopSmoothScroll => call_method(&self.driver.borrow(), "stop"),
                HostCommand::StartSmoothScroll => call_method(&self.driver.borrow(), "start"),
                HostCommand::ScrollToRegion { offset_px } => self.scroll_to_region(offset_px),
                HostCommand::Observe { threshold } => self.observe(threshold),
                HostCommand::Disconnect => {
                    if let Some(observer) = self.observer.borrow_mut().take() {
                        observer.disconnect();
                    }
                }
            }
        }
    }

    fn scroll_to_region(&self, offset_px: f64) {
        let rect = self.element.get_bounding_client_rect();
        let scroll_y = self.window.scroll_y().unwrap_or(0.0);
        let options = ScrollToOptions::new();
        options.set_top(rect.top() + scroll_y - offset_px);
        options.set_behavior(ScrollBehavior::Smooth);
        self.window.scroll_to_with_scroll_to_options(&options);
    }

    fn observe(&self, threshold: f64) {
        let callback = self.on_intersect.borrow();
        let Some(callback) = callback.as_ref() else {
            return;
        };
        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(threshold));
        match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init) {
            Ok(observer) => {
                observer.observe(&self.element);
                if let Some(previous) = self.observer.borrow_mut().replace(observer) {
                    previous.disconnect();
                }
            }
            Err(err) => console_error(&format!("IntersectionObserver unavailable: {err:?}")),
        }
    }

    fn add_wheel_listener(&self) {
        let callback = self.on_wheel.borrow();
        let Some(callback) = callback.as_ref() else {
            return;
        };
        let options = AddEventListenerOptions::new();
        options.set_passive(false);
        if let Err(err) = self
            .window
            .add_event_listener_with_callback_and_add_event_listener_options(
                "wheel",
                callback.as_ref().unchecked_ref(),
                &options,
            )
        {
            console_error(&format!("failed to add wheel listener: {err:?}"));
            return;
        }
        self.listening.set(true);
    }

    fn remove_wheel_listener(&self) {
        let callback = self.on_wheel.borrow();
        let Some(callback) = callback.as_ref() else {
            return;
        };
        let _ = self
            .window
            .remove_event_listener_with_callback("wheel", callback.as_ref().unchecked_ref());
        self.listening.set(false);
    }
}

/// Scroll-step controller bound to one DOM element.
#[wasm_bindgen]
pub struct ScrollStepRunner {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl ScrollStepRunner {
    /// Create a runner for `element`.
    ///
    /// `config_json` may be `undefined` for defaults. `driver` is an optional
    /// smooth-scroll object with `start()`/`stop()` methods; pass it later
    /// with `setDriver` if it initialises after the region mounts.
    #[wasm_bindgen(constructor)]
    pub fn new(
        element: Element,
        config_json: Option<String>,
        driver: JsValue,
    ) -> Result<ScrollStepRunner, JsValue> {
        install_panic_hook();
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let with_driver = !(driver.is_undefined() || driver.is_null());
        let core = RunnerCore::new(config_json.as_deref(), with_driver)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;

        let shared = Rc::new(Shared {
            core: RefCell::new(core),
            window,
            element,
            driver: RefCell::new(driver),
            observer: RefCell::new(None),
            on_intersect: RefCell::new(None),
            on_wheel: RefCell::new(None),
            listening: Cell::new(false),
        });

        let weak: Weak<Shared> = Rc::downgrade(&shared);
        let on_intersect = Closure::<dyn FnMut(Array, IntersectionObserver)>::new(
            move |entries: Array, _observer: IntersectionObserver| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                for entry in entries.iter() {
                    let entry: IntersectionObserverEntry = entry.unchecked_into();
                    let top = entry.bounding_client_rect().top();
                    shared
                        .core
                        .borrow_mut()
                        .intersection(entry.intersection_ratio(), Some(top));
                }
                shared.flush();
            },
        );

        let weak: Weak<Shared> = Rc::downgrade(&shared);
        let on_wheel = Closure::<dyn FnMut(WheelEvent)>::new(move |event: WheelEvent| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let prevent = shared
                .core
                .borrow_mut()
                .wheel(event.delta_y(), event.delta_mode());
            if prevent {
                event.prevent_default();
            }
            shared.flush();
        });

        shared.on_intersect.replace(Some(on_intersect));
        shared.on_wheel.replace(Some(on_wheel));
        Ok(Self { shared })
    }

    /// Start observing the element and intercepting wheel input.
    pub fn attach(&self) {
        if self.shared.core.borrow().is_attached() {
            self.detach();
        }
        self.shared.add_wheel_listener();
        self.shared.core.borrow_mut().attach();
        self.shared.flush();
    }

    /// Stop observing, remove the wheel listener, and resume the driver if a
    /// lock was held. Safe to call repeatedly.
    pub fn detach(&self) {
        self.shared.remove_wheel_listener();
        self.shared.core.borrow_mut().detach();
        self.shared.flush();
    }

    /// Supply the smooth-scroll driver after construction.
    #[wasm_bindgen(js_name = setDriver)]
    pub fn set_driver(&self, driver: JsValue) {
        if driver.is_undefined() || driver.is_null() {
            return;
        }
        self.shared.core.borrow_mut().install_driver();
        let mut commands = self.shared.core.borrow_mut().drain_commands();
        // A restart queued while locked belongs to the outgoing driver.
        let split = commands
            .iter()
            .position(|c| *c == HostCommand::StartSmoothScroll)
            .map_or(0, |i| i + 1);
        let for_new = commands.split_off(split);
        self.shared.execute(commands);
        self.shared.driver.replace(driver);
        self.shared.execute(for_new);
    }

    /// Feed one host-encoded JSON input (see `scrollstep-web`). Lifecycle
    /// records behave exactly like [`attach`](Self::attach) and
    /// [`detach`](Self::detach). Returns `false` for malformed or unmapped
    /// records.
    #[wasm_bindgen(js_name = pushEncodedInput)]
    pub fn push_encoded_input(&self, json: &str) -> bool {
        let Some(input) = RunnerCore::decode_input(json) else {
            return false;
        };
        match input {
            StepInput::Attach => self.attach(),
            StepInput::Detach => self.detach(),
            other => {
                self.shared.core.borrow_mut().push_input(other);
                self.shared.flush();
            }
        }
        true
    }

    /// Whether the window `wheel` listener is registered.
    #[wasm_bindgen(js_name = isListening)]
    pub fn is_listening(&self) -> bool {
        self.shared.listening.get()
    }

    #[wasm_bindgen(js_name = stepIndex)]
    pub fn step_index(&self) -> u16 {
        self.shared.core.borrow().step_index()
    }

    pub fn locked(&self) -> bool {
        self.shared.core.borrow().locked()
    }

    /// Current state as a plain JS object.
    pub fn snapshot(&self) -> JsValue {
        let json = self.shared.core.borrow().snapshot_json();
        js_sys::JSON::parse(&json).unwrap_or(JsValue::NULL)
    }
}

impl Drop for ScrollStepRunner {
    fn drop(&mut self) {
        self.detach();
        self.shared.on_intersect.replace(None);
        self.shared.on_wheel.replace(None);
    }
}
