//! Runtime configuration.
//!
//! Every field has a default, so an empty YAML document is a valid
//! configuration. Durations are written in human-readable form (`30s`,
//! `1m 30s`).

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use snac_core::ranker::DEFAULT_MAX_CANDIDATES;
use snac_core::validation::{RuleSet, DEFAULT_RULESET};
use snac_core::{Command, DownloadFormat};

/// SNAC reconciliation endpoint.
pub const DEFAULT_RECONCILE_ENDPOINT: &str = "http://snac-web.iath.virginia.edu:81/";

/// SNAC-Alpha REST endpoint used for EAC-CPF parsing.
pub const DEFAULT_PARSE_ENDPOINT: &str = "http://snac-dev.iath.virginia.edu/alpha/rest/";

/// SNAC endpoint serving constellation exports.
pub const DEFAULT_DOWNLOAD_ENDPOINT: &str = DEFAULT_RECONCILE_ENDPOINT;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for job execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Endpoint for `reconcile` commands
    pub reconcile_endpoint: String,

    /// Endpoint for `parse_eac` commands
    pub parse_endpoint: String,

    /// Endpoint for `download_constellation` commands
    pub download_endpoint: String,

    /// Export format requested by download jobs
    pub download_format: DownloadFormat,

    /// Bound on one whole exchange, including reading the body
    #[serde(with = "duration_human")]
    pub request_timeout: Duration,

    /// Bound on establishing a connection
    #[serde(with = "duration_human")]
    pub connect_timeout: Duration,

    /// Candidates retained per record in batch mode
    pub max_candidates: usize,

    /// Embedded rule set used in validation mode
    pub ruleset: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reconcile_endpoint: DEFAULT_RECONCILE_ENDPOINT.to_string(),
            parse_endpoint: DEFAULT_PARSE_ENDPOINT.to_string(),
            download_endpoint: DEFAULT_DOWNLOAD_ENDPOINT.to_string(),
            download_format: DownloadFormat::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            ruleset: DEFAULT_RULESET.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as null rather than an empty map.
        let config: RuntimeConfig = if yaml.trim().is_empty() {
            RuntimeConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Check endpoints, the candidate cap and the rule set name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, url) in [
            ("reconcile_endpoint", &self.reconcile_endpoint),
            ("parse_endpoint", &self.parse_endpoint),
            ("download_endpoint", &self.download_endpoint),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "{} must start with http:// or https://",
                    field
                )));
            }
        }

        if self.max_candidates == 0 {
            return Err(ConfigError::Invalid(
                "max_candidates must be at least 1".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }

        if !RuleSet::is_embedded(&self.ruleset) {
            return Err(ConfigError::Invalid(format!(
                "unknown rule set: {}",
                self.ruleset
            )));
        }

        Ok(())
    }

    /// Endpoint a remote command is sent to. `Validate` runs locally.
    pub fn endpoint_for(&self, command: Command) -> Option<&str> {
        match command {
            Command::Reconcile => Some(self.reconcile_endpoint.as_str()),
            Command::ParseEac => Some(self.parse_endpoint.as_str()),
            Command::Download => Some(self.download_endpoint.as_str()),
            Command::Validate => None,
        }
    }
}

mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
