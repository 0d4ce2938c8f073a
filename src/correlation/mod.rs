/// Correlation of raw moderation events into incidents
///
/// This module provides:
/// - Debounced incident correlation keyed by guild, actor and content fingerprint
/// - Reason classification and severity rules for finalized incidents
/// - The deadline queue driving finalization

pub mod classify;
pub mod debounce;
pub mod engine;

pub use classify::{classify_reason, describe_actions, severity_for, DEFAULT_REASON};
pub use debounce::DebounceQueue;
pub use engine::{
    CorrelatorConfig, CorrelatorConfigBuilder, CorrelatorStats, EventCorrelator, ObserveOutcome,
};
