use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub poll: PollConfig,
    pub session: SessionConfig,
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Request body cap for the multipart upload routes. Recorded clips run
    /// well past the 2 MiB the HTTP layer would otherwise allow.
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub region: String,
    pub bucket: String,
    /// Custom endpoint for MinIO/LocalStack. None means real AWS.
    pub endpoint_url: Option<String>,
    /// Public base URL slide keys are appended to when building image URLs.
    pub public_endpoint: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between completion-marker checks.
    pub interval_secs: u64,
    /// Attempt budget before the conversion is marked failed.
    pub max_attempts: u32,
}

/// Attributes for the session cookie the routing layer issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub http_only: bool,
    pub same_site: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Timeout for one clip upload. None leaves it to the transport.
    pub upload_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            max_upload_bytes: 500 * 1024 * 1024,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            bucket: String::new(),
            endpoint_url: None,
            public_endpoint: String::new(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_attempts: 30,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            http_only: true,
            same_site: "lax".to_string(),
            path: "/".to_string(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            upload_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
            info!("Loaded config from {:?}", config_path);
            config
        } else {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Deployment environments override the file for storage and poll tuning.
    fn apply_env_overrides(&mut self) {
        if let Ok(region) = std::env::var("AWS_REGION") {
            self.storage.region = region;
        }
        if let Ok(bucket) = std::env::var("S3_BUCKET_NAME") {
            self.storage.bucket = bucket;
        }
        if let Ok(endpoint) = std::env::var("S3_ENDPOINT_URL") {
            self.storage.endpoint_url = Some(endpoint);
        }
        if let Ok(public) = std::env::var("S3_BUCKET_WEBSITE_ENDPOINT") {
            self.storage.public_endpoint = public;
        }
        if let Some(interval) = env_parse("POLL_INTERVAL_SECS") {
            self.poll.interval_secs = interval;
        }
        if let Some(attempts) = env_parse("POLL_MAX_ATTEMPTS") {
            self.poll.max_attempts = attempts;
        }
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_poll_contract() {
        let config = Config::default();
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.poll.max_attempts, 30);
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.max_upload_bytes, 500 * 1024 * 1024);
        assert!(config.session.http_only);
        assert_eq!(config.session.same_site, "lax");
        assert_eq!(config.session.path, "/");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            bucket = "podium-slides"
            public_endpoint = "http://cdn.example/"

            [poll]
            max_attempts = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.bucket, "podium-slides");
        assert_eq!(config.poll.max_attempts, 2);
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.server.port, 3001);
    }
}
