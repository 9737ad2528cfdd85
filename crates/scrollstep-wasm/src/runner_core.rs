#![forbid(unsafe_code)]

//! Platform-independent runner core.
//!
//! Owns the [`WebStepHost`] and converts between its types and the plain
//! numbers/JSON strings the JS boundary speaks. Kept free of `wasm-bindgen`
//! so it can be tested natively.

use scrollstep_core::{ConfigError, DeltaMode, RegionSide, ScrollStepConfig, WheelDelta};
use scrollstep_web::input_parser::parse_encoded_input;
use scrollstep_web::{HostCommand, StepInput, WebStepHost};

pub(crate) struct RunnerCore {
    host: WebStepHost,
}

impl RunnerCore {
    /// Build from an optional JSON config; `None` uses defaults.
    pub(crate) fn new(config_json: Option<&str>, with_driver: bool) -> Result<Self, ConfigError> {
        let config = match config_json {
            Some(json) => ScrollStepConfig::from_json_str(json)?,
            None => ScrollStepConfig::default(),
        };
        Ok(Self {
            host: WebStepHost::new(config, with_driver)?,
        })
    }

    pub(crate) fn attach(&mut self) {
        self.host.attach();
    }

    pub(crate) fn detach(&mut self) {
        self.host.detach();
    }

    pub(crate) fn install_driver(&mut self) {
        self.host.install_driver();
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.host.is_attached()
    }

    /// Feed a wheel event; returns whether the host must call
    /// `preventDefault()`.
    pub(crate) fn wheel(&mut self, dy: f64, delta_mode: u32) -> bool {
        self.host
            .wheel(WheelDelta::new(dy, DeltaMode::from_dom_code(delta_mode)))
            .prevent_default
    }

    /// Feed an intersection ratio; `top_px` is the region's
    /// `boundingClientRect.top` when the host has it.
    pub(crate) fn intersection(&mut self, ratio: f64, top_px: Option<f64>) {
        let input = match top_px.and_then(RegionSide::from_top_px) {
            Some(side) => StepInput::IntersectionAt { ratio, side },
            None => StepInput::Intersection(ratio),
        };
        self.host.push_input(input);
    }

    /// Decode one encoded input. `None` for malformed or unmapped records.
    pub(crate) fn decode_input(json: &str) -> Option<StepInput> {
        parse_encoded_input(json).ok().flatten()
    }

    /// Dispatch a decoded input. Lifecycle inputs also (un)register DOM
    /// listeners, so the binding routes `Attach`/`Detach` through its own
    /// `attach`/`detach` instead.
    pub(crate) fn push_input(&mut self, input: StepInput) {
        self.host.push_input(input);
    }

    pub(crate) fn step_index(&self) -> u16 {
        self.host.snapshot().step_index
    }

    pub(crate) fn locked(&self) -> bool {
        self.host.snapshot().locked
    }

    pub(crate) fn drain_commands(&mut self) -> Vec<HostCommand> {
        self.host.drain_commands()
    }

    pub(crate) fn snapshot_json(&self) -> String {
        let snapshot = self.host.snapshot();
        serde_json::json!({
            "step_index": snapshot.step_index,
            "max_step": snapshot.max_step,
            "item_count": snapshot.item_count(),
            "locked": snapshot.locked,
            "in_view": snapshot.in_view,
            "progress": snapshot.progress(),
            "attached": self.host.is_attached(),
        })
        .to_string()
    }

    pub(crate) fn drain_commands_json(&mut self) -> String {
        let commands: Vec<serde_json::Value> = self
            .drain_commands()
            .into_iter()
            .map(command_to_json)
            .collect();
        serde_json::Value::Array(commands).to_string()
    }
}

fn command_to_json(command: HostCommand) -> serde_json::Value {
    match command {
        HostCommand::ScrollToRegion { offset_px } => {
            serde_json::json!({ "kind": command.label(), "offset_px": offset_px })
        }
        HostCommand::Observe { threshold } => {
            serde_json::json!({ "kind": command.label(), "threshold": threshold })
        }
        HostCommand::StopSmoothScroll
        | HostCommand::StartSmoothScroll
        | HostCommand::Disconnect => serde_json::json!({ "kind": command.label() }),
    }
}
