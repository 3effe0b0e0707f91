use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::CoreConstants;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub tick_rate_hz: f64,
    pub poll_interval_ms: u64,
    pub max_call_depth: usize,
    pub frame_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: CoreConstants::TICK_RATE_HZ,
            poll_interval_ms: CoreConstants::POLL_INTERVAL_MS,
            max_call_depth: CoreConstants::MAX_CALL_DEPTH,
            frame_timeout_ms: CoreConstants::FRAME_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "tickRateHz must be a positive number".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "pollIntervalMs must be at least 1".to_string(),
            ));
        }
        if self.max_call_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "maxCallDepth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}
