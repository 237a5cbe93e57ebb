//! Configuration management for the gateway.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GatewayError, Result};
use crate::ratelimit::TimeWindow;

/// Prefix for environment overrides, e.g. `GATEWAY__LIMITER__REQUESTS_PER_UNIT=5`.
const ENV_PREFIX: &str = "GATEWAY";

/// Main configuration for the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Rate limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Outbound transport configuration
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Window after which permits are refilled
    #[serde(default)]
    pub time_unit: TimeWindow,

    /// Maximum requests admitted per window
    #[serde(default = "default_requests_per_unit")]
    pub requests_per_unit: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            time_unit: TimeWindow::default(),
            requests_per_unit: default_requests_per_unit(),
        }
    }
}

fn default_requests_per_unit() -> u32 {
    10
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Per-request timeout in seconds; no timeout when unset
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl TransportConfig {
    /// The request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatewayError::Config(format!("Failed to parse gateway config: {}", e)))
    }

    /// Load configuration from a YAML file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading gateway configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from an optional file layered under environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    fn load_with_env_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        info!(
            path = ?path.map(|p| p.display().to_string()),
            env_prefix = %prefix,
            "Loading gateway configuration with environment overrides"
        );

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Yaml));
        }

        builder
            .add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| GatewayError::Config(e.to_string()))
    }
}
