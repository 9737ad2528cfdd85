#![forbid(unsafe_code)]

//! Deterministic session recording and replay.
//!
//! [`SessionRecorder`] wraps a [`WebStepHost`], recording every host input
//! and a checkpoint after each one. [`replay`] feeds the recorded inputs
//! through a fresh host and compares checkpoints.
//!
//! # Trace layout
//!
//! - **Header**: controller config and whether a driver was present.
//! - **Input**: timestamped [`StepInput`].
//! - **Checkpoint**: FNV-1a checksum of the controller state, the
//!   `prevent_default` answer, and the host commands emitted by the input,
//!   chained with the previous checkpoint.
//! - **Summary**: checkpoint count and final chain value.
//!
//! # Determinism contract
//!
//! Same config and same inputs produce identical checkpoints. Timestamps are
//! carried for diagnostics only; nothing in the controller reads a clock.

use scrollstep_core::{ConfigError, ScrollStepConfig, StepSnapshot};

use crate::{HostCommand, StepInput, WebStepHost};

/// Schema version for session traces.
pub const SCHEMA_VERSION: &str = "scrollstep-trace-v1";

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a64_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn fnv1a64_u64(hash: u64, v: u64) -> u64 {
    fnv1a64_bytes(hash, &v.to_le_bytes())
}

fn fnv1a64_pair(prev: u64, next: u64) -> u64 {
    let hash = FNV_OFFSET_BASIS;
    let hash = fnv1a64_u64(hash, prev);
    fnv1a64_u64(hash, next)
}

/// Checksum of one dispatch result.
#[must_use]
pub fn checksum_dispatch(
    snapshot: StepSnapshot,
    exhausted: bool,
    prevent_default: bool,
    commands: &[HostCommand],
) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    hash = fnv1a64_u64(hash, u64::from(snapshot.step_index));
    hash = fnv1a64_u64(hash, u64::from(snapshot.max_step));
    let flags = u8::from(snapshot.locked)
        | u8::from(snapshot.in_view) << 1
        | u8::from(exhausted) << 2
        | u8::from(prevent_default) << 3;
    hash = fnv1a64_bytes(hash, &[flags]);
    for command in commands {
        hash = fnv1a64_bytes(hash, command.label().as_bytes());
        match *command {
            HostCommand::ScrollToRegion { offset_px: value }
            | HostCommand::Observe { threshold: value } => {
                hash = fnv1a64_u64(hash, value.to_bits());
            }
            HostCommand::StopSmoothScroll
            | HostCommand::StartSmoothScroll
            | HostCommand::Disconnect => {}
        }
    }
    hash
}

/// A single record in a session trace.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceRecord {
    /// Session header (must be first).
    Header {
        config: ScrollStepConfig,
        with_driver: bool,
    },
    /// A host input at a specific timestamp.
    Input { ts_ns: u64, input: StepInput },
    /// State checkpoint after the preceding input.
    Checkpoint {
        index: u64,
        ts_ns: u64,
        checksum: u64,
        checksum_chain: u64,
    },
    /// Trace summary (must be last).
    Summary {
        total_checkpoints: u64,
        final_checksum_chain: u64,
    },
}

/// A complete recorded session trace.
#[derive(Debug, Clone)]
pub struct SessionTrace {
    pub records: Vec<TraceRecord>,
}

impl SessionTrace {
    /// Number of checkpoints in the trace.
    pub fn checkpoint_count(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| matches!(r, TraceRecord::Checkpoint { .. }))
            .count() as u64
    }

    /// Final checksum chain from the summary record.
    pub fn final_checksum_chain(&self) -> Option<u64> {
        self.records.iter().rev().find_map(|r| match r {
            TraceRecord::Summary {
                final_checksum_chain,
                ..
            } => Some(*final_checksum_chain),
            _ => None,
        })
    }
}

/// Records a host session for deterministic replay.
#[derive(Debug)]
pub struct SessionRecorder {
    host: WebStepHost,
    records: Vec<TraceRecord>,
    checksum_chain: u64,
    next_index: u64,
}

impl SessionRecorder {
    /// Create a recorder around a fresh, detached host.
    pub fn new(config: ScrollStepConfig, with_driver: bool) -> Result<Self, ConfigError> {
        let host = WebStepHost::new(config.clone(), with_driver)?;
        Ok(Self {
            host,
            records: vec![TraceRecord::Header {
                config,
                with_driver,
            }],
            checksum_chain: 0,
            next_index: 0,
        })
    }

    /// Record and dispatch one input. Returns the commands it produced.
    pub fn push_input(&mut self, ts_ns: u64, input: StepInput) -> Vec<HostCommand> {
        self.records.push(TraceRecord::Input { ts_ns, input });
        let dispatch = self.host.push_input(input);
        let commands = self.host.drain_commands();
        let checksum = checksum_dispatch(
            self.host.snapshot(),
            self.host.controller().state().exhausted(),
            dispatch.prevent_default(),
            &commands,
        );
        let chain = fnv1a64_pair(self.checksum_chain, checksum);
        self.records.push(TraceRecord::Checkpoint {
            index: self.next_index,
            ts_ns,
            checksum,
            checksum_chain: chain,
        });
        self.checksum_chain = chain;
        self.next_index += 1;
        commands
    }

    #[must_use]
    pub const fn host(&self) -> &WebStepHost {
        &self.host
    }

    /// Finish recording and return the completed trace.
    pub fn finish(mut self) -> SessionTrace {
        self.records.push(TraceRecord::Summary {
            total_checkpoints: self.next_index,
            final_checksum_chain: self.checksum_chain,
        });
        SessionTrace {
            records: std::mem::take(&mut self.records),
        }
    }
}

/// Result of replaying a session trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    pub total_checkpoints: u64,
    pub final_checksum_chain: u64,
    /// First checkpoint whose checksum differed, if any.
    pub first_mismatch: Option<ReplayMismatch>,
}

impl ReplayResult {
    /// Whether the replay produced identical checksums.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.first_mismatch.is_none()
    }
}

/// Description of a checksum mismatch during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    pub index: u64,
    pub expected: u64,
    pub actual: u64,
}

/// Errors that can occur during replay.
#[derive(Debug)]
pub enum ReplayError {
    /// The first record is not a header.
    MissingHeader,
    /// A checkpoint appeared with no preceding input.
    OrphanCheckpoint { index: u64 },
    /// The header config is invalid.
    Config(ConfigError),
}

impl core::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "trace missing header record"),
            Self::OrphanCheckpoint { index } => {
                write!(f, "checkpoint {index} has no preceding input")
            }
            Self::Config(e) => write!(f, "invalid header config: {e}"),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::MissingHeader | Self::OrphanCheckpoint { .. } => None,
        }
    }
}

impl From<ConfigError> for ReplayError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Replay a recorded trace through a fresh host and verify checkpoints.
pub fn replay(trace: &SessionTrace) -> Result<ReplayResult, ReplayError> {
    let (config, with_driver) = trace
        .records
        .first()
        .and_then(|r| match r {
            TraceRecord::Header {
                config,
                with_driver,
            } => Some((config.clone(), *with_driver)),
            _ => None,
        })
        .ok_or(ReplayError::MissingHeader)?;

    let mut host = WebStepHost::new(config, with_driver)?;
    let mut pending: Option<(bool, Vec<HostCommand>)> = None;
    let mut checksum_chain = 0u64;
    let mut total_checkpoints = 0u64;
    let mut first_mismatch = None;

    for record in &trace.records {
        match record {
            TraceRecord::Input { input, .. } => {
                let dispatch = host.push_input(*input);
                pending = Some((dispatch.prevent_default(), host.drain_commands()));
            }
            TraceRecord::Checkpoint {
                index,
                checksum: expected,
                ..
            } => {
                let (prevent_default, commands) = pending
                    .take()
                    .ok_or(ReplayError::OrphanCheckpoint { index: *index })?;
                let actual = checksum_dispatch(
                    host.snapshot(),
                    host.controller().state().exhausted(),
                    prevent_default,
                    &commands,
                );
                checksum_chain = fnv1a64_pair(checksum_chain, actual);
                if actual != *expected && first_mismatch.is_none() {
                    tracing::debug!(
                        target: "scrollstep.web",
                        index,
                        expected,
                        actual,
                        "replay checkpoint mismatch"
                    );
                    first_mismatch = Some(ReplayMismatch {
                        index: *index,
                        expected: *expected,
                        actual,
                    });
                }
                total_checkpoints += 1;
            }
            TraceRecord::Header { .. } | TraceRecord::Summary { .. } => {}
        }
    }

    Ok(ReplayResult {
        total_checkpoints,
        final_checksum_chain: checksum_chain,
        first_mismatch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scrollstep_core::{ReentryPolicy, RegionSide, WheelDelta};

    fn record_session(config: ScrollStepConfig) -> SessionTrace {
        let mut recorder = SessionRecorder::new(config, true).expect("valid config");
        let inputs = [
            StepInput::Attach,
            StepInput::Intersection(0.3),
            StepInput::Intersection(0.9),
            StepInput::Wheel(WheelDelta::pixels(40.0)),
            StepInput::Wheel(WheelDelta::pixels(-40.0)),
            StepInput::Wheel(WheelDelta::pixels(40.0)),
            StepInput::Wheel(WheelDelta::pixels(40.0)),
            StepInput::IntersectionAt {
                ratio: 0.0,
                side: RegionSide::Below,
            },
            StepInput::IntersectionAt {
                ratio: 0.9,
                side: RegionSide::Below,
            },
            StepInput::Detach,
        ];
        for (i, input) in inputs.into_iter().enumerate() {
            recorder.push_input(i as u64 * 16_000_000, input);
        }
        recorder.finish()
    }

    #[test]
    fn trace_shape() {
        let trace = record_session(ScrollStepConfig::with_max_step(2));
        assert!(matches!(trace.records[0], TraceRecord::Header { .. }));
        assert!(matches!(
            trace.records.last(),
            Some(TraceRecord::Summary {
                total_checkpoints: 10,
                ..
            })
        ));
        assert_eq!(trace.checkpoint_count(), 10);
    }

    #[test]
    fn replay_matches_recording() {
        let trace = record_session(ScrollStepConfig::with_max_step(2));
        let result = replay(&trace).expect("replay");
        assert!(result.ok(), "mismatch: {:?}", result.first_mismatch);
        assert_eq!(result.total_checkpoints, 10);
        assert_eq!(Some(result.final_checksum_chain), trace.final_checksum_chain());
    }

    #[test]
    fn replay_detects_policy_change() {
        let mut trace = record_session(ScrollStepConfig::with_max_step(2));
        if let Some(TraceRecord::Header { config, .. }) = trace.records.first_mut() {
            config.reentry = ReentryPolicy::ResetOnExit;
        }
        let result = replay(&trace).expect("replay");
        assert!(!result.ok());
        // Exit through the bottom after completion is the first input that
        // behaves differently.
        assert_eq!(result.first_mismatch.map(|m| m.index), Some(7));
    }

    #[test]
    fn replay_requires_header() {
        let trace = SessionTrace {
            records: vec![TraceRecord::Input {
                ts_ns: 0,
                input: StepInput::Attach,
            }],
        };
        assert!(matches!(replay(&trace), Err(ReplayError::MissingHeader)));
    }

    #[test]
    fn replay_rejects_orphan_checkpoint() {
        let trace = SessionTrace {
            records: vec![
                TraceRecord::Header {
                    config: ScrollStepConfig::default(),
                    with_driver: true,
                },
                TraceRecord::Checkpoint {
                    index: 0,
                    ts_ns: 0,
                    checksum: 0,
                    checksum_chain: 0,
                },
            ],
        };
        assert!(matches!(
            replay(&trace),
            Err(ReplayError::OrphanCheckpoint { index: 0 })
        ));
    }

    #[test]
    fn replay_rejects_invalid_header_config() {
        let trace = SessionTrace {
            records: vec![TraceRecord::Header {
                config: ScrollStepConfig::with_max_step(0),
                with_driver: true,
            }],
        };
        assert!(matches!(replay(&trace), Err(ReplayError::Config(_))));
    }

    #[test]
    fn checksum_depends_on_commands() {
        let snapshot = StepSnapshot {
            step_index: 0,
            max_step: 5,
            locked: true,
            in_view: true,
        };
        let a = checksum_dispatch(snapshot, false, false, &[HostCommand::StopSmoothScroll]);
        let b = checksum_dispatch(snapshot, false, false, &[HostCommand::StartSmoothScroll]);
        let c = checksum_dispatch(
            snapshot,
            false,
            false,
            &[HostCommand::ScrollToRegion { offset_px: 80.0 }],
        );
        let d = checksum_dispatch(
            snapshot,
            false,
            false,
            &[HostCommand::ScrollToRegion { offset_px: 100.0 }],
        );
        assert_ne!(a, b);
        assert_ne!(c, d);
    }
}
