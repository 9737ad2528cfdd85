#![forbid(unsafe_code)]

//! Controller configuration.
//!
//! [`ScrollStepConfig`] collects every tunable of the step controller. It can
//! be built in code or, with the `config` feature, loaded from TOML or JSON:
//!
//! ```toml
//! # scrollstep.toml
//! max_step = 5
//! visibility_threshold = 0.6
//! align_offset_px = 100.0
//! reentry = "stay_exhausted"
//! ```
//!
//! ```rust,ignore
//! let config = ScrollStepConfig::from_toml_file("scrollstep.toml")?;
//! let config = ScrollStepConfig::from_json_str(json)?;
//! ```
//!
//! Loaders validate before returning, so a loaded config is always usable.

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Default highest step index (six display items).
pub const DEFAULT_MAX_STEP: u16 = 5;
/// Default visible fraction of the region required to lock.
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.6;
/// Default distance between the viewport top and the aligned region top.
pub const DEFAULT_ALIGN_OFFSET_PX: f64 = 100.0;
/// Default number of retained dispatch log entries.
pub const DEFAULT_LOG_CAPACITY: usize = 64;

/// What happens when the region is entered again after the forward pass
/// reached the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum ReentryPolicy {
    /// The sequence stays exhausted for the rest of the attachment.
    #[default]
    StayExhausted,
    /// Leaving the viewport while exhausted rewinds to step 0, so the next
    /// entry locks again.
    ResetOnExit,
}

/// Tunables for [`crate::machine::StepMachine`] and
/// [`crate::controller::ScrollStepController`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScrollStepConfig {
    /// Highest step index. The sequence has `max_step + 1` items.
    pub max_step: u16,
    /// Intersection ratio in `(0, 1]` at or above which the region counts as
    /// in view.
    pub visibility_threshold: f64,
    /// Pixels between the viewport top and the region top after alignment.
    pub align_offset_px: f64,
    /// Behaviour when re-entering an exhausted sequence.
    pub reentry: ReentryPolicy,
    /// Release the lock when scrolling backward past the first step.
    pub release_at_start: bool,
    /// Capacity of the controller's dispatch log ring.
    pub log_capacity: usize,
}

impl Default for ScrollStepConfig {
    fn default() -> Self {
        Self {
            max_step: DEFAULT_MAX_STEP,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            align_offset_px: DEFAULT_ALIGN_OFFSET_PX,
            reentry: ReentryPolicy::default(),
            release_at_start: false,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl ScrollStepConfig {
    /// Config with a custom step count and defaults elsewhere.
    #[must_use]
    pub fn with_max_step(max_step: u16) -> Self {
        Self {
            max_step,
            ..Self::default()
        }
    }

    /// Replace the visibility threshold.
    #[must_use]
    pub fn visibility_threshold(mut self, threshold: f64) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    /// Replace the re-entry policy.
    #[must_use]
    pub fn reentry(mut self, policy: ReentryPolicy) -> Self {
        self.reentry = policy;
        self
    }

    /// Replace the alignment offset.
    #[must_use]
    pub fn align_offset_px(mut self, offset: f64) -> Self {
        self.align_offset_px = offset;
        self
    }

    /// Enable or disable release when retreating past step 0.
    #[must_use]
    pub fn release_at_start(mut self, enabled: bool) -> Self {
        self.release_at_start = enabled;
        self
    }

    /// Validate all parameters.
    ///
    /// Returns a list of problems. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_step == 0 {
            errors.push("max_step must be > 0".into());
        }

        // NaN fails both comparisons and lands here too.
        if !(self.visibility_threshold > 0.0 && self.visibility_threshold <= 1.0) {
            errors.push(format!(
                "visibility_threshold must be in (0, 1], got {}",
                self.visibility_threshold
            ));
        }

        if !self.align_offset_px.is_finite() || self.align_offset_px < 0.0 {
            errors.push(format!(
                "align_offset_px must be finite and >= 0, got {}",
                self.align_offset_px
            ));
        }

        if self.log_capacity == 0 {
            errors.push("log_capacity must be > 0".into());
        }

        errors
    }

    /// Validate and wrap the problems in a [`ConfigError`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Toml)?;
        config.validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Json)?;
        config.validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to a JSON string.
    #[cfg(feature = "config")]
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(ConfigError::Json)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from building or loading a [`ScrollStepConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse or encode error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ScrollStepConfig::default().validate().is_empty());
    }

    #[test]
    fn zero_max_step_rejected() {
        let errors = ScrollStepConfig::with_max_step(0).validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("max_step"));
    }

    #[test]
    fn threshold_bounds() {
        for bad in [0.0, -0.1, 1.01, f64::NAN] {
            let errors = ScrollStepConfig::default()
                .visibility_threshold(bad)
                .validate();
            assert!(
                errors.iter().any(|e| e.contains("visibility_threshold")),
                "threshold {bad} should be rejected"
            );
        }
        assert!(
            ScrollStepConfig::default()
                .visibility_threshold(1.0)
                .validate()
                .is_empty()
        );
    }

    #[test]
    fn negative_offset_rejected() {
        let errors = ScrollStepConfig::default()
            .align_offset_px(-4.0)
            .validate();
        assert!(errors[0].contains("align_offset_px"));
    }

    #[test]
    fn validated_collects_every_problem() {
        let config = ScrollStepConfig {
            max_step: 0,
            visibility_threshold: 2.0,
            log_capacity: 0,
            ..ScrollStepConfig::default()
        };
        match config.validated() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_partial_uses_defaults() {
        let config = ScrollStepConfig::from_toml_str(
            r#"
max_step = 3
reentry = "reset_on_exit"
"#,
        )
        .expect("valid toml");
        assert_eq!(config.max_step, 3);
        assert_eq!(config.reentry, ReentryPolicy::ResetOnExit);
        assert_eq!(config.visibility_threshold, DEFAULT_VISIBILITY_THRESHOLD);
        assert_eq!(config.align_offset_px, DEFAULT_ALIGN_OFFSET_PX);
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_rejects_invalid_values() {
        let err = ScrollStepConfig::from_json_str(r#"{"visibility_threshold": 0}"#)
            .expect_err("zero threshold must fail");
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("visibility_threshold"));
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_syntax_error_has_source() {
        use std::error::Error;
        let err = ScrollStepConfig::from_json_str("{").expect_err("truncated json");
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.source().is_some());
    }

    #[cfg(feature = "config")]
    #[test]
    fn files_load() {
        use std::io::Write;

        let mut toml_file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(toml_file, "max_step = 7\nrelease_at_start = true").expect("write");
        let config = ScrollStepConfig::from_toml_file(toml_file.path()).expect("toml file");
        assert_eq!(config.max_step, 7);
        assert!(config.release_at_start);

        let mut json_file = tempfile::NamedTempFile::new().expect("temp file");
        write!(json_file, r#"{{"align_offset_px": 64.0}}"#).expect("write");
        let config = ScrollStepConfig::from_json_file(json_file.path()).expect("json file");
        assert_eq!(config.align_offset_px, 64.0);
    }

    #[cfg(feature = "config")]
    #[test]
    fn missing_file_is_io_error() {
        let err = ScrollStepConfig::from_toml_file("/nonexistent/scrollstep.toml")
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
