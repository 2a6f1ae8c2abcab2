// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Configuration loader for [`RemediationEngine`](crate::engine::RemediationEngine).
//!
//! Supports two load strategies:
//!
//! 1. **TOML file**: [`load_config`] reads and deserialises a TOML file into
//!    a [`RemediationConfig`].
//! 2. **Environment variables**: [`load_config_from_env`] reads
//!    `AUMOS_REMEDIATION_`-prefixed variables.
//!
//! Both loaders validate the result before returning it.  Only compiled with
//! the `config-loader` feature.
//!
//! # File format
//!
//! ```toml
//! reasoner_timeout_ms  = 30000
//! default_max_retries  = 3
//! retry_base_delay_ms  = 500
//! retry_max_delay_ms   = 30000
//! retry_multiplier     = 2.0
//! minutes_per_action   = 15
//! critical_due_hours   = 8
//! high_due_hours       = 24
//! medium_due_hours     = 48
//! low_due_hours        = 72
//! default_assignee     = "compliance_analyst"
//! ```
//!
//! # Environment variables
//!
//! | Variable                                   | Type    | Default                |
//! |--------------------------------------------|---------|------------------------|
//! | `AUMOS_REMEDIATION_REASONER_TIMEOUT_MS`    | integer | 30000                  |
//! | `AUMOS_REMEDIATION_DEFAULT_MAX_RETRIES`    | integer | 3                      |
//! | `AUMOS_REMEDIATION_RETRY_BASE_DELAY_MS`    | integer | 500                    |
//! | `AUMOS_REMEDIATION_RETRY_MAX_DELAY_MS`     | integer | 30000                  |
//! | `AUMOS_REMEDIATION_RETRY_MULTIPLIER`       | float   | 2.0                    |
//! | `AUMOS_REMEDIATION_MINUTES_PER_ACTION`     | integer | 15                     |
//! | `AUMOS_REMEDIATION_CRITICAL_DUE_HOURS`     | integer | 8                      |
//! | `AUMOS_REMEDIATION_HIGH_DUE_HOURS`         | integer | 24                     |
//! | `AUMOS_REMEDIATION_MEDIUM_DUE_HOURS`       | integer | 48                     |
//! | `AUMOS_REMEDIATION_LOW_DUE_HOURS`          | integer | 72                     |
//! | `AUMOS_REMEDIATION_DEFAULT_ASSIGNEE`       | string  | "compliance_analyst"   |

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, RetryPolicy, TaskPolicy};
use crate::error::InvalidConfig;

const ENV_PREFIX: &str = "AUMOS_REMEDIATION_";

// ---------------------------------------------------------------------------
// RemediationConfig
// ---------------------------------------------------------------------------

/// Flat, serialisation-friendly configuration.
///
/// Distinct from the engine-internal [`Config`] so the file and env formats
/// stay stable.  Convert with `Config::from(loaded)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    pub reasoner_timeout_ms: u64,
    pub default_max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_multiplier: f64,
    pub minutes_per_action: u32,
    pub critical_due_hours: u64,
    pub high_due_hours: u64,
    pub medium_due_hours: u64,
    pub low_due_hours: u64,
    pub default_assignee: String,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        let config = Config::default();
        Self {
            reasoner_timeout_ms: config.reasoner_timeout_ms,
            default_max_retries: config.default_max_retries,
            retry_base_delay_ms: config.retry.base_delay_ms,
            retry_max_delay_ms: config.retry.max_delay_ms,
            retry_multiplier: config.retry.multiplier,
            minutes_per_action: config.minutes_per_action,
            critical_due_hours: config.tasks.critical_due_hours,
            high_due_hours: config.tasks.high_due_hours,
            medium_due_hours: config.tasks.medium_due_hours,
            low_due_hours: config.tasks.low_due_hours,
            default_assignee: config.tasks.default_assignee,
        }
    }
}

impl From<RemediationConfig> for Config {
    fn from(flat: RemediationConfig) -> Self {
        Config {
            reasoner_timeout_ms: flat.reasoner_timeout_ms,
            default_max_retries: flat.default_max_retries,
            retry: RetryPolicy {
                base_delay_ms: flat.retry_base_delay_ms,
                max_delay_ms: flat.retry_max_delay_ms,
                multiplier: flat.retry_multiplier,
            },
            tasks: TaskPolicy {
                critical_due_hours: flat.critical_due_hours,
                high_due_hours: flat.high_due_hours,
                medium_due_hours: flat.medium_due_hours,
                low_due_hours: flat.low_due_hours,
                default_assignee: flat.default_assignee,
            },
            minutes_per_action: flat.minutes_per_action,
        }
    }
}

impl RemediationConfig {
    fn validated(self) -> Result<Self, ConfigError> {
        Config::from(self.clone()).validate()?;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("field {field}: cannot parse {value:?}: {reason}")]
    ParseField { field: String, value: String, reason: String },

    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Load and validate a [`RemediationConfig`] from a TOML file.  Missing keys
/// take their defaults.
///
/// # Example
///
/// ```rust,no_run
/// use aumos_remediation_core::config::Config;
/// use aumos_remediation_core::config_loader::load_config;
///
/// let config: Config = load_config("/etc/aumos/remediation.toml").unwrap().into();
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<RemediationConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate TOML text.
pub fn parse_config(content: &str) -> Result<RemediationConfig, ConfigError> {
    toml::from_str::<RemediationConfig>(content)?.validated()
}

/// Load and validate a [`RemediationConfig`] from `AUMOS_REMEDIATION_*`
/// environment variables.  Unset variables keep their defaults.
pub fn load_config_from_env() -> Result<RemediationConfig, ConfigError> {
    load_config_with(|key| std::env::var(key).ok())
}

/// Same as [`load_config_from_env`] with an injectable variable lookup.
pub fn load_config_with<F>(lookup: F) -> Result<RemediationConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RemediationConfig::default();
    let read = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    let config = RemediationConfig {
        reasoner_timeout_ms: parse_or(&read, "REASONER_TIMEOUT_MS", defaults.reasoner_timeout_ms)?,
        default_max_retries: parse_or(&read, "DEFAULT_MAX_RETRIES", defaults.default_max_retries)?,
        retry_base_delay_ms: parse_or(&read, "RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms)?,
        retry_max_delay_ms: parse_or(&read, "RETRY_MAX_DELAY_MS", defaults.retry_max_delay_ms)?,
        retry_multiplier: parse_or(&read, "RETRY_MULTIPLIER", defaults.retry_multiplier)?,
        minutes_per_action: parse_or(&read, "MINUTES_PER_ACTION", defaults.minutes_per_action)?,
        critical_due_hours: parse_or(&read, "CRITICAL_DUE_HOURS", defaults.critical_due_hours)?,
        high_due_hours: parse_or(&read, "HIGH_DUE_HOURS", defaults.high_due_hours)?,
        medium_due_hours: parse_or(&read, "MEDIUM_DUE_HOURS", defaults.medium_due_hours)?,
        low_due_hours: parse_or(&read, "LOW_DUE_HOURS", defaults.low_due_hours)?,
        default_assignee: read("DEFAULT_ASSIGNEE").unwrap_or(defaults.default_assignee),
    };
    config.validated()
}

fn parse_or<T, R>(read: &R, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    R: Fn(&str) -> Option<String>,
{
    match read(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|error| ConfigError::ParseField {
            field: format!("{ENV_PREFIX}{name}"),
            value: raw.clone(),
            reason: error.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn toml_keys_override_defaults() {
        let loaded = parse_config("default_max_retries = 5\nretry_multiplier = 1.5\n").expect("valid");
        assert_eq!(loaded.default_max_retries, 5);
        assert_eq!(loaded.reasoner_timeout_ms, 30_000);

        let config = Config::from(loaded);
        assert_eq!(config.retry.multiplier, 1.5);
    }

    #[test]
    fn toml_validation_rejects_zero_retries() {
        assert!(matches!(
            parse_config("default_max_retries = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(parse_config("default_max_retries = \"x\""), Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn file_loader_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "minutes_per_action = 20").expect("write");
        let loaded = load_config(file.path()).expect("load");
        assert_eq!(loaded.minutes_per_action, 20);

        assert!(matches!(
            load_config("/definitely/not/here.toml"),
            Err(ConfigError::FileRead { .. })
        ));
    }

    #[test]
    fn env_lookup_parses_and_reports_bad_values() {
        let vars: HashMap<&str, &str> = [
            ("AUMOS_REMEDIATION_REASONER_TIMEOUT_MS", "1000"),
            ("AUMOS_REMEDIATION_DEFAULT_ASSIGNEE", "privacy_team"),
        ]
        .into_iter()
        .collect();
        let loaded = load_config_with(|key| vars.get(key).map(|value| value.to_string())).expect("valid");
        assert_eq!(loaded.reasoner_timeout_ms, 1_000);
        assert_eq!(loaded.default_assignee, "privacy_team");

        let bad = load_config_with(|key| {
            (key == "AUMOS_REMEDIATION_HIGH_DUE_HOURS").then(|| "soon".to_string())
        });
        assert!(matches!(bad, Err(ConfigError::ParseField { .. })));
    }
}
