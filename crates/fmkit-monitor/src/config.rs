//! Monitor registry configuration.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default window during which repeated change events for one path collapse.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(5000);

/// Default capacity of each handle's event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Configuration for a [`MonitorRegistry`](crate::MonitorRegistry).
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct MonitorConfig {
    /// Minimum interval between two "changed" bursts for the same path.
    #[builder(default = "DEFAULT_RATE_LIMIT")]
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Duration,

    /// Capacity of the broadcast channel behind every handle.
    #[builder(default = "DEFAULT_CHANNEL_CAPACITY")]
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// URI schemes that never get a dummy monitor.
    #[builder(default = "default_no_dummy_schemes()")]
    #[serde(default = "default_no_dummy_schemes")]
    pub no_dummy_schemes: Vec<String>,
}

fn default_rate_limit() -> Duration {
    DEFAULT_RATE_LIMIT
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_no_dummy_schemes() -> Vec<String> {
    ["trash", "computer", "network", "applications"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl MonitorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.channel_capacity {
            return Err("Channel capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl MonitorConfig {
    /// Create a new config builder.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Whether locations with `scheme` are excluded from dummy monitors.
    pub fn skips_dummy(&self, scheme: &str) -> bool {
        self.no_dummy_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            no_dummy_schemes: default_no_dummy_schemes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MonitorConfig::builder()
            .rate_limit(Duration::from_millis(250))
            .channel_capacity(8usize)
            .build()
            .unwrap();

        assert_eq!(config.rate_limit, Duration::from_millis(250));
        assert_eq!(config.channel_capacity, 8);
        assert!(config.skips_dummy("trash"));
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        let result = MonitorConfig::builder().channel_capacity(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_skips_virtual_schemes() {
        let config = MonitorConfig::default();
        assert_eq!(config.rate_limit, Duration::from_secs(5));
        for scheme in ["trash", "computer", "network", "applications", "TRASH"] {
            assert!(config.skips_dummy(scheme), "{scheme}");
        }
        assert!(!config.skips_dummy("sftp"));
    }
}
