//! Configuration management for hfwatch
//!
//! Values are layered: built-in defaults, an optional config file,
//! `HFWATCH__SECTION__KEY` environment variables, then the legacy variables
//! understood by earlier deployments (`TELEGRAM_BOT_TOKEN`, `ETHEREUM_NODE_URL`,
//! `CHECK_INTERVAL`, `USER_DATA_FILE`).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Aave v3 Pool on Ethereum mainnet
pub const DEFAULT_POOL_ADDRESS: &str = "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2";

const ENV_PREFIX: &str = "HFWATCH";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot configuration
    pub telegram: TelegramConfig,

    /// Ethereum node configuration
    pub ethereum: EthereumConfig,

    /// Monitoring loop configuration
    pub monitor: MonitorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("telegram.bot_token", non_empty_var("TELEGRAM_BOT_TOKEN"))?
            .set_override_option("ethereum.node_url", non_empty_var("ETHEREUM_NODE_URL"))?
            .set_override_option("monitor.data_file", non_empty_var("USER_DATA_FILE"))?;

        if let Some(raw) = non_empty_var("CHECK_INTERVAL") {
            let seconds: i64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("CHECK_INTERVAL is not an integer: {raw}")))?;
            builder = builder.set_override("monitor.sweep_interval_seconds", seconds)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the service misbehave
    pub fn validate(&self) -> Result<()> {
        if self.monitor.sweep_interval_seconds == 0 {
            return Err(Error::config("monitor.sweep_interval_seconds must be positive"));
        }
        if self.monitor.sweep_concurrency == 0 {
            return Err(Error::config("monitor.sweep_concurrency must be at least 1"));
        }
        if self.monitor.data_file.as_os_str().is_empty() {
            return Err(Error::config("monitor.data_file must not be empty"));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(Error::config(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }

        check_url("telegram.api_base_url", &self.telegram.api_base_url)?;
        if let Some(url) = &self.ethereum.node_url {
            check_url("ethereum.node_url", url)?;
        }

        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn check_url(key: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::config(format!("{key} is not a valid URL ({e}): {value}")))
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token
    pub bot_token: Option<String>,
    /// Bot API base URL
    pub api_base_url: String,
    /// Long-poll timeout for `getUpdates`
    pub poll_timeout_seconds: u64,
    /// Timeout for ordinary Bot API requests
    pub request_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 30,
            request_timeout_seconds: 10,
        }
    }
}

/// Ethereum node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint
    pub node_url: Option<String>,
    /// Aave v3 Pool contract address
    pub pool_address: String,
    /// Timeout for a single RPC request
    pub request_timeout_seconds: u64,
}

impl Default for EthereumConfig {
    fn default() -> Self {
        Self {
            node_url: None,
            pool_address: DEFAULT_POOL_ADDRESS.to_string(),
            request_timeout_seconds: 30,
        }
    }
}

/// Monitoring loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between sweeps
    pub sweep_interval_seconds: u64,
    /// Seconds before the first sweep
    pub initial_delay_seconds: u64,
    /// Subscribers evaluated concurrently within one sweep
    pub sweep_concurrency: usize,
    /// Subscription state file
    pub data_file: PathBuf,
    /// Link included in threshold alerts
    pub dashboard_url: String,
}

impl MonitorConfig {
    /// Interval between sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Delay before the first sweep
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 3600,
            initial_delay_seconds: 5,
            sweep_concurrency: 1,
            data_file: PathBuf::from("aavehealthchatids.json"),
            dashboard_url: "https://app.aave.com/".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.monitor.sweep_interval(), Duration::from_secs(3600));
        assert_eq!(config.monitor.initial_delay(), Duration::from_secs(5));
        assert_eq!(
            config.monitor.data_file,
            PathBuf::from("aavehealthchatids.json")
        );
        assert_eq!(config.ethereum.pool_address, DEFAULT_POOL_ADDRESS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.monitor.sweep_interval_seconds = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sweep_interval_seconds"));
    }

    #[test]
    fn test_validate_rejects_bad_node_url() {
        let mut config = Config::default();
        config.ethereum.node_url = Some("not a url".to_string());

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [monitor]
            sweep_interval_seconds = 600
            sweep_concurrency = 4

            [ethereum]
            node_url = "http://localhost:8545"
            "#
        )
        .unwrap();

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(config.monitor.sweep_interval_seconds, 600);
        assert_eq!(config.monitor.sweep_concurrency, 4);
        assert_eq!(config.monitor.initial_delay_seconds, 5);
        assert_eq!(
            config.ethereum.node_url.as_deref(),
            Some("http://localhost:8545")
        );
    }
}
