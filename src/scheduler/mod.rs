//! Periodic security sweep
//!
//! A fixed-interval background task that runs the alert system's
//! verification, security and anomaly detectors for every guild and then
//! sweeps the time-windowed caches.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use automod_correlator::alerts::InMemoryAlertSystem;
//! use automod_correlator::clock::SystemClock;
//! use automod_correlator::integrations::StaticPlatformClient;
//! use automod_correlator::scheduler::{SchedulerConfig, SecuritySweepScheduler};
//! use automod_correlator::state::CacheJanitor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Arc::new(SecuritySweepScheduler::new(
//!         SchedulerConfig::default(),
//!         Arc::new(StaticPlatformClient::new()),
//!         Arc::new(InMemoryAlertSystem::default()),
//!         Arc::new(CacheJanitor::new(Arc::new(SystemClock::new()))),
//!     ));
//!
//!     let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let handle = scheduler.start(shutdown_rx).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(600)).await;
//!
//!     shutdown_tx.send(true)?;
//!     if let Some(handle) = handle {
//!         handle.await?;
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;

pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use core::{CycleReport, Detector, SchedulerStats, SecuritySweepScheduler};
pub use error::{SchedulerError, SchedulerResult};
