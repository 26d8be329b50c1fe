//! Runtime configuration.
//!
//! Everything lives under one data directory: the redb database, the
//! controller registry and an optional `config.yaml`. A missing config
//! file means defaults; secrets can always be supplied through the
//! environment so they stay out of the file.

use crate::breaker::BreakerConfig;
use crate::error::Result;
use crate::retry::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yaml";
pub const REGISTRY_FILE: &str = "controllers.yaml";
pub const DB_FILE: &str = "optout.db";

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

pub fn registry_path(data_dir: &Path) -> PathBuf {
    data_dir.join(REGISTRY_FILE)
}

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE)
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret checked by the `x-secure-cron` header middleware.
    /// Unset means the API is open, which is only sensible locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_secret: Option<String>,
    /// Mail relay bridge endpoint. Unset means email sends fail with
    /// `not_configured` until an operator wires a relay in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub backoff: BackoffPolicy,
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Base64 HMAC key for proof signing. Unset disables signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key_id: Option<String>,
}

fn default_port() -> u16 {
    8484
}

fn default_from_email() -> String {
    "privacy-desk@example.org".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cron_secret: None,
            relay_url: None,
            from_email: default_from_email(),
            timeout_secs: default_timeout_secs(),
            backoff: BackoffPolicy::default(),
            breaker: BreakerConfig::default(),
            signing_key: None,
            signing_key_id: None,
        }
    }
}

impl AppConfig {
    /// Load `config.yaml` from the data directory, falling back to
    /// defaults when absent, then let the environment override secrets.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = config_path(data_dir);
        let mut cfg = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&data)?
        } else {
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var("OPTOUT_CRON_SECRET") {
            if !secret.is_empty() {
                self.cron_secret = Some(secret);
            }
        }
        if let Ok(key) = std::env::var("OPTOUT_SIGNING_KEY") {
            if !key.is_empty() {
                self.signing_key = Some(key);
            }
        }
        if let Ok(key_id) = std::env::var("OPTOUT_SIGNING_KEY_ID") {
            if !key_id.is_empty() {
                self.signing_key_id = Some(key_id);
            }
        }
    }

    /// Write the config to `config.yaml` in the data directory.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&config_path(data_dir), data.as_bytes())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.port, 8484);
        assert_eq!(cfg.timeout_secs, 20);
        assert!(cfg.cron_secret.is_none());
        assert_eq!(cfg.backoff.tries, 3);
        assert_eq!(cfg.breaker.failure_threshold, 8);
    }

    #[test]
    fn partial_file_fills_the_rest_with_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            config_path(dir.path()),
            "port: 9000\nbreaker:\n  failure_threshold: 3\n",
        )
        .unwrap();
        let cfg = AppConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.breaker.failure_threshold, 3);
        assert_eq!(cfg.breaker.window_minutes, 15);
        assert_eq!(cfg.from_email, default_from_email());
    }

    #[test]
    fn config_roundtrips_through_yaml() {
        let mut cfg = AppConfig::default();
        cfg.cron_secret = Some("s3cret".to_string());
        cfg.backoff.base_ms = 250;
        let text = serde_yaml::to_string(&cfg).unwrap();
        let back: AppConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.cron_secret.as_deref(), Some("s3cret"));
        assert_eq!(back.backoff.base_ms, 250);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut cfg = AppConfig::default();
        cfg.port = 9191;
        cfg.save(dir.path()).unwrap();
        let loaded = AppConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.port, 9191);
    }

    #[test]
    fn bad_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(config_path(dir.path()), "port: [not a number\n").unwrap();
        assert!(AppConfig::load(dir.path()).is_err());
    }
}
