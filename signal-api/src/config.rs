//! Engine configuration
//!
//! One TOML file with a `[lifecycle]` and a `[distribution]` section; every
//! field has a default so partial files load cleanly.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use distribution::BroadcasterConfig;
use lifecycle::LifecycleConfig;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub lifecycle: LifecycleSection,

    #[serde(default)]
    pub distribution: DistributionSection,
}

/// Lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSection {
    /// Maximum active lifetime before a signal expires (hours)
    #[serde(default = "default_lifetime_hours")]
    pub max_signal_lifetime_hours: i64,

    /// How often the expiry sweeper runs (seconds)
    #[serde(default = "default_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
}

impl Default for LifecycleSection {
    fn default() -> Self {
        Self {
            max_signal_lifetime_hours: default_lifetime_hours(),
            expiry_sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl LifecycleSection {
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            max_signal_lifetime_hours: self.max_signal_lifetime_hours,
        }
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.expiry_sweep_interval_secs)
    }
}

/// Distribution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSection {
    /// Per-subscriber delivery buffer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Lifecycle event buffer between the engine and the broadcaster
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for DistributionSection {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl DistributionSection {
    pub fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            channel_capacity: self.channel_capacity,
        }
    }
}

fn default_lifetime_hours() -> i64 {
    48
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_channel_capacity() -> usize {
    64
}

fn default_event_buffer() -> usize {
    256
}

/// Load configuration from a TOML file.
pub fn load_config(path: &str) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a TOML file.
pub fn save_config(config: &EngineConfig, path: &str) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
