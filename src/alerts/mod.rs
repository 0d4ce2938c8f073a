//! Alert publication and the in-memory alert system.

pub mod memory;
pub mod publisher;

pub use memory::{DetectorThresholds, InMemoryAlertSystem};
pub use publisher::{truncate_content, ActionSummary, AlertPublisher};
