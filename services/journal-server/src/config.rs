//! Server configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `journal.{toml,yaml,json}` file, then `JOURNAL__*` environment variables
//! (`JOURNAL__HUB__CHANNEL_CAPACITY=512`). A `.env` file is loaded first.

use chrono::{FixedOffset, Local, Offset, Utc};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// No URL means the in-memory repository
    pub database_url: Option<String>,
    /// No secret means every webhook call is rejected
    pub webhook_secret: Option<String>,
    /// Local time zone for calendar days and hour-of-day patterns
    pub utc_offset_minutes: i32,
    pub insight_url: Option<String>,
    pub log_level: String,
    pub hub: HubConfig,
    pub memory: MemoryConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub channel_capacity: usize,
    pub heartbeat_secs: u64,
    /// Trades and signals included in the `init` snapshot
    pub init_recent_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub xp_per_close: u64,
    pub xp_per_lesson: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            webhook_secret: None,
            utc_offset_minutes: Local::now().offset().fix().local_minus_utc() / 60,
            insight_url: None,
            log_level: "info".to_string(),
            hub: HubConfig::default(),
            memory: MemoryConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            heartbeat_secs: 15,
            init_recent_limit: 50,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            xp_per_close: 10,
            xp_per_lesson: 25,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 120,
        }
    }
}

impl ServerConfig {
    /// Load from file and environment on top of the defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config: ServerConfig = Config::builder()
            .add_source(File::with_name("journal").required(false))
            .add_source(
                Environment::with_prefix("JOURNAL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if config.database_url.is_none() {
            config.database_url = std::env::var("DATABASE_URL").ok();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.offset().is_none() {
            anyhow::bail!("utc_offset_minutes {} is out of range", self.utc_offset_minutes);
        }
        if self.hub.heartbeat_secs == 0 {
            anyhow::bail!("hub.heartbeat_secs must be positive");
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            anyhow::bail!("rate_limit window and max_requests must be positive");
        }
        Ok(())
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Offset for in-process use; falls back to UTC when out of range
    pub fn local_offset(&self) -> FixedOffset {
        self.offset().unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.hub.channel_capacity, 256);
        assert_eq!(config.hub.heartbeat_secs, 15);
        assert_eq!(config.memory.xp_per_lesson, 25);
        assert!(config.webhook_secret.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ServerConfig = Config::builder()
            .add_source(config::File::from_str(
                "webhook_secret = \"s3cret\"\nutc_offset_minutes = 120\n[hub]\nheartbeat_secs = 5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.hub.heartbeat_secs, 5);
        assert_eq!(config.hub.channel_capacity, 256);
        assert_eq!(config.local_offset(), FixedOffset::east_opt(7200).unwrap());
    }

    #[test]
    fn test_out_of_range_offset_is_rejected() {
        let config = ServerConfig {
            utc_offset_minutes: 24 * 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
