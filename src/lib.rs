//! Correlation of Discord auto-moderation events into moderator alerts.
//!
//! The platform reports every enforcement action (block, warning, timeout)
//! as a separate event. [`correlation::EventCorrelator`] folds the events of
//! one incident into a single alert after a fixed debounce window, the
//! [`processing::RateLimiter`] flags message floods, and the
//! [`scheduler::SecuritySweepScheduler`] periodically runs the alert system's
//! detectors and evicts stale cache entries.

pub mod alerts;
pub mod clock;
pub mod config;
pub mod correlation;
pub mod error;
pub mod integrations;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod processing;
pub mod scheduler;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use pipeline::{MessageVerdict, ModerationPipeline, PipelineStats};
