//! Pipeline configuration
//!
//! Values come from defaults, an optional JSON file (`DNSLOG_CONFIG`) and
//! `DNSLOG_*` environment variables, in that order of precedence from
//! lowest to highest.
//!
//! Environment:
//! - DNSLOG_DATA_DIR: directory for `query_log.jsonl` (default `data`)
//! - DNSLOG_RETENTION: maximum stored records (default 1000)
//! - DNSLOG_FLUSH_INTERVAL_MS: writer flush interval (default 3000)
//! - DNSLOG_REFRESH_SECS: minimum stats refresh interval (default 60)
//! - DNSLOG_HTTP_ADDR: HTTP listen address (default `127.0.0.1:8053`)
//! - DNSLOG_SERVER_LABEL: label stamped on new records (default `default`)
//! - DNSLOG_LOG: log level filter (default `info`)

use std::collections::HashSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stats::GranularitySpec;
use crate::store::{StoreConfig, DEFAULT_RETENTION_CEILING};

pub const ENV_CONFIG_FILE: &str = "DNSLOG_CONFIG";

/// Runtime configuration for one pipeline instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub retention_ceiling: usize,
    pub flush_interval_ms: u64,
    pub refresh_interval_secs: u64,
    pub granularities: Vec<GranularitySpec>,
    pub http_addr: SocketAddr,
    pub server_label: String,
    pub log_level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            retention_ceiling: DEFAULT_RETENTION_CEILING,
            flush_interval_ms: 3000,
            refresh_interval_secs: 60,
            granularities: GranularitySpec::defaults(),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8053)),
            server_label: "default".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Read a JSON file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from `DNSLOG_CONFIG` if set, then apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var(ENV_CONFIG_FILE) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        base.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(dir) = env::var("DNSLOG_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(ceiling) = parse_env("DNSLOG_RETENTION")? {
            self.retention_ceiling = ceiling;
        }
        if let Some(ms) = parse_env("DNSLOG_FLUSH_INTERVAL_MS")? {
            self.flush_interval_ms = ms;
        }
        if let Some(secs) = parse_env("DNSLOG_REFRESH_SECS")? {
            self.refresh_interval_secs = secs;
        }
        if let Some(addr) = parse_env("DNSLOG_HTTP_ADDR")? {
            self.http_addr = addr;
        }
        if let Ok(label) = env::var("DNSLOG_SERVER_LABEL") {
            self.server_label = label;
        }
        if let Ok(level) = env::var("DNSLOG_LOG") {
            self.log_level = level;
        }
        Ok(self)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "retention_ceiling must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "flush_interval_ms must be positive".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be positive".to_string(),
            ));
        }
        if self.granularities.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one granularity is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &self.granularities {
            if spec.bucket_width_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "granularity {} has a zero bucket width",
                    spec.name
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate granularity {}",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_dir).with_ceiling(self.retention_ceiling)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

fn parse_env<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.flush_interval(), Duration::from_secs(3));
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.store_config().retention_ceiling, 1000);
        assert_eq!(config.granularities.len(), 5);
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dnslog.json");
        fs::write(&path, r#"{"retention_ceiling": 50, "server_label": "office"}"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.retention_ceiling, 50);
        assert_eq!(config.server_label, "office");
        assert_eq!(config.flush_interval_ms, 3000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = PipelineConfig {
            retention_ceiling: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::default();
        config.granularities.push(GranularitySpec {
            name: "hour".to_string(),
            span_secs: Some(60),
            bucket_width_secs: 10,
        });
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.granularities[0].bucket_width_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_env_reports_bad_value() {
        env::set_var("DNSLOG_TEST_RETENTION", "lots");
        let result: Result<Option<usize>, _> = parse_env("DNSLOG_TEST_RETENTION");
        env::remove_var("DNSLOG_TEST_RETENTION");

        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
        assert_eq!(parse_env::<usize>("DNSLOG_TEST_UNSET").unwrap(), None);
    }
}
