//! Configuration for the scheduler module

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{SchedulerError, SchedulerResult};
use crate::config::SweepSettings;

/// Configuration for the security sweep scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler is enabled
    pub enabled: bool,

    /// Fixed delay between sweep cycles
    pub interval: Duration,
}

impl SchedulerConfig {
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SweepSettings::default().into()
    }
}

impl From<&SweepSettings> for SchedulerConfig {
    fn from(settings: &SweepSettings) -> Self {
        Self {
            enabled: settings.enabled,
            interval: settings.interval(),
        }
    }
}

impl From<SweepSettings> for SchedulerConfig {
    fn from(settings: SweepSettings) -> Self {
        Self::from(&settings)
    }
}

/// Builder for SchedulerConfig
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
