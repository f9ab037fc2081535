//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Rule engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Rule engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Invoice amount (minor units) at or above which the KYC check is
    /// forced to re-run even for previously verified customers.
    #[serde(default = "default_kyc_required_threshold")]
    pub kyc_required_threshold: u64,
    /// Timeout for a single external compliance verification call.
    #[serde(default = "default_compliance_timeout_ms")]
    pub compliance_timeout_ms: u64,
    /// How many times a `ConcurrencyConflict` is retried internally
    /// before being surfaced to the caller.
    #[serde(default = "default_concurrency_retry_limit")]
    pub concurrency_retry_limit: u32,
}

fn default_kyc_required_threshold() -> u64 {
    100_000 // 1000.00 in minor units
}

fn default_compliance_timeout_ms() -> u64 {
    3_000
}

fn default_concurrency_retry_limit() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kyc_required_threshold: default_kyc_required_threshold(),
            compliance_timeout_ms: default_compliance_timeout_ms(),
            concurrency_retry_limit: default_concurrency_retry_limit(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("KASIRA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
