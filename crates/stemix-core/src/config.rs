//! Engine configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tempo assumed for stems when the caller does not provide one.
pub const DEFAULT_ORIGINAL_BPM: f64 = 120.0;

/// Tunables of the multitrack engine.
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard ceiling for loading a whole stem set.
    pub load_timeout_secs: u64,
    /// How often the playback position is sampled while playing.
    pub position_interval_ms: u64,
    /// Length of the gain ramp applied on volume, mute and solo changes.
    pub volume_ramp_ms: u64,
    /// Length of one time-stretch grain, in seconds.
    pub grain_size_secs: f64,
    /// Crossfade between consecutive grains, in seconds.
    pub grain_overlap_secs: f64,
    /// Wrap around at the end of the song instead of stopping.
    pub loop_playback: bool,
    /// Stem length mismatch above which a warning is logged, in seconds.
    pub length_tolerance_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_timeout_secs: 60,
            position_interval_ms: 100,
            volume_ramp_ms: 100,
            grain_size_secs: 0.2,
            grain_overlap_secs: 0.1,
            loop_playback: true,
            length_tolerance_secs: 0.05,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.load_timeout_secs == 0 {
            return Err(Error::Config("load_timeout_secs must be positive".to_string()));
        }
        if self.position_interval_ms == 0 {
            return Err(Error::Config(
                "position_interval_ms must be positive".to_string(),
            ));
        }
        if !(self.grain_size_secs.is_finite() && self.grain_size_secs > 0.0) {
            return Err(Error::Config("grain_size_secs must be positive".to_string()));
        }
        if !(self.grain_overlap_secs.is_finite()
            && self.grain_overlap_secs >= 0.0
            && self.grain_overlap_secs <= self.grain_size_secs)
        {
            return Err(Error::Config(format!(
                "grain_overlap_secs must be within 0..={}",
                self.grain_size_secs
            )));
        }
        if !(self.length_tolerance_secs.is_finite() && self.length_tolerance_secs >= 0.0) {
            return Err(Error::Config(
                "length_tolerance_secs must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub const fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub const fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms)
    }

    pub const fn volume_ramp(&self) -> Duration {
        Duration::from_millis(self.volume_ramp_ms)
    }
}
