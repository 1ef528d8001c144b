//! Application-level configuration.
//!
//! ```yaml
//! profile:
//!   ttl: 5m
//!   max_entries: 1000
//! notifications:
//!   ttl: 30s
//!   page_size: 50
//! feed:
//!   ttl: 1m
//!   page_size: 20
//!   rollback: refetch
//! realtime:
//!   event_buffer: 64
//! ```
//!
//! Omitted sections take their defaults. Within a section, omitted fields
//! take the [`ResourcePolicy`] defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::manager::DEFAULT_EVENT_BUFFER;
use crate::policy::ResourcePolicy;

/// Realtime settings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Changes buffered per channel before a slow consumer lags.
    pub event_buffer: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Policies of the social resources.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    /// User profiles.
    pub profile: ResourcePolicy,
    /// Notification lists.
    pub notifications: ResourcePolicy,
    /// Activity feeds.
    pub feed: ResourcePolicy,
    /// Realtime channels.
    pub realtime: RealtimeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: ResourcePolicy::builder()
                .ttl(Duration::from_secs(5 * 60))
                .build(),
            notifications: ResourcePolicy::builder()
                .ttl(Duration::from_secs(30))
                .page_size(50)
                .build(),
            feed: ResourcePolicy::builder()
                .ttl(Duration::from_secs(60))
                .page_size(20)
                .build(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl Config {
    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_saphyr::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no resource can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, policy) in [
            ("profile", &self.profile),
            ("notifications", &self.notifications),
            ("feed", &self.feed),
        ] {
            if policy.ttl.is_zero() {
                return Err(ConfigError::Invalid(format!("{name}.ttl must be positive")));
            }
            if policy.max_entries == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.max_entries must be positive"
                )));
            }
            if policy.page_size == Some(0) {
                return Err(ConfigError::Invalid(format!("{name}.page_size must be positive")));
            }
        }
        if self.realtime.event_buffer == 0 {
            return Err(ConfigError::Invalid(
                "realtime.event_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
