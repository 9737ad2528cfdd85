#![forbid(unsafe_code)]

//! WASM binding for the scroll-step controller.
//!
//! This crate provides [`ScrollStepRunner`], a `wasm-bindgen`-exported struct
//! that attaches the controller to a DOM element: an `IntersectionObserver`
//! feeds visibility, a non-passive `wheel` listener on `window` feeds wheel
//! input, and host commands are carried out against `window.scrollTo` and an
//! optional JS smooth-scroll object exposing `start()`/`stop()`.

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::ScrollStepRunner;

// Runner core is used by the wasm module and by native tests.
#[cfg(any(target_arch = "wasm32", test))]
mod runner_core;
