#![forbid(unsafe_code)]

//! JSON input parser for host-encoded step inputs.
//!
//! Accepted records:
//!
//! ```json
//! {"kind":"wheel","dy":120.0,"mode":0}
//! {"kind":"intersection","ratio":0.72,"top":-40.0}
//! {"kind":"visibility","visible":true}
//! {"kind":"attach"}
//! {"kind":"detach"}
//! ```
//!
//! `mode` follows DOM `WheelEvent.deltaMode` and defaults to pixels. `top` is
//! the optional `boundingClientRect.top` of the region; its sign tells which
//! viewport edge the region crosses. Unknown
//! kinds (pointer, key, touch, ...) return `Ok(None)` so hosts can forward
//! their whole input stream unfiltered.

use scrollstep_core::{DeltaMode, RegionSide, WheelDelta};
use serde::Deserialize;

use crate::StepInput;

/// Errors from parsing encoded input JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputParseError {
    /// Malformed JSON.
    Json(String),
    /// Missing required field.
    MissingField(&'static str),
    /// Field present but outside its domain.
    InvalidValue { field: &'static str, value: String },
}

impl core::fmt::Display for InputParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "JSON parse error: {msg}"),
            Self::MissingField(field) => write!(f, "missing required field: {field}"),
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value for {field}: {value}")
            }
        }
    }
}

impl std::error::Error for InputParseError {}

#[derive(Debug, Deserialize)]
struct RawInput {
    kind: String,
    #[serde(default)]
    dy: Option<f64>,
    #[serde(default)]
    mode: Option<u32>,
    #[serde(default)]
    ratio: Option<f64>,
    #[serde(default)]
    top: Option<f64>,
    #[serde(default)]
    visible: Option<bool>,
}

/// Parse one JSON-encoded input record.
///
/// Returns `Ok(None)` for kinds with no [`StepInput`] mapping and `Err` for
/// malformed JSON or missing/invalid fields.
pub fn parse_encoded_input(json: &str) -> Result<Option<StepInput>, InputParseError> {
    let raw: RawInput =
        serde_json::from_str(json).map_err(|e| InputParseError::Json(e.to_string()))?;

    match raw.kind.as_str() {
        "wheel" => parse_wheel(&raw).map(Some),
        "intersection" => parse_intersection(&raw).map(Some),
        "visibility" => raw
            .visible
            .map(|visible| Some(StepInput::Visibility(visible)))
            .ok_or(InputParseError::MissingField("visible")),
        "attach" => Ok(Some(StepInput::Attach)),
        "detach" => Ok(Some(StepInput::Detach)),
        _ => Ok(None),
    }
}

fn parse_wheel(raw: &RawInput) -> Result<StepInput, InputParseError> {
    let dy = raw.dy.ok_or(InputParseError::MissingField("dy"))?;
    let mode = match raw.mode.unwrap_or(0) {
        code @ 0..=2 => DeltaMode::from_dom_code(code),
        other => {
            return Err(InputParseError::InvalidValue {
                field: "mode",
                value: other.to_string(),
            });
        }
    };
    Ok(StepInput::Wheel(WheelDelta::new(dy, mode)))
}

fn parse_intersection(raw: &RawInput) -> Result<StepInput, InputParseError> {
    let ratio = raw.ratio.ok_or(InputParseError::MissingField("ratio"))?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(InputParseError::InvalidValue {
            field: "ratio",
            value: ratio.to_string(),
        });
    }
    Ok(match raw.top.and_then(RegionSide::from_top_px) {
        Some(side) => StepInput::IntersectionAt { ratio, side },
        None => StepInput::Intersection(ratio),
    })
}
