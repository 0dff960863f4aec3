// Application configuration
// Built once at start-up from the environment and handed to the components that need it

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::orders::LifecycleDurations;

/// Errors raised while reading configuration values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Runtime configuration of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub items_file: PathBuf,
    pub orders_file: PathBuf,
    pub promotions_file: PathBuf,
    /// Whether the order status scheduler runs
    pub auto_update_enabled: bool,
    pub pending_to_shipped_secs: u32,
    pub shipped_to_delivered_secs: u32,
    pub scheduler_poll_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            items_file: PathBuf::from("data/items.csv"),
            orders_file: PathBuf::from("data/orders.csv"),
            promotions_file: PathBuf::from("data/promotions.csv"),
            auto_update_enabled: true,
            pending_to_shipped_secs: 10,
            shipped_to_delivered_secs: 20,
            scheduler_poll_millis: 1000,
        }
    }
}

impl AppConfig {
    /// Read the configuration from process environment variables
    ///
    /// Call `dotenv::dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// # Arguments
    /// * `lookup` - Returns the raw value for a key, or `None` to use the default
    ///
    /// # Returns
    /// The configuration, or `ConfigError::Invalid` for the first unparsable value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let scheduler_poll_millis = parse_or(&lookup, "SCHEDULER_POLL_MILLIS", defaults.scheduler_poll_millis)?;
        if scheduler_poll_millis == 0 {
            return Err(ConfigError::Invalid {
                key: "SCHEDULER_POLL_MILLIS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            items_file: lookup("ITEMS_FILE").map(PathBuf::from).unwrap_or(defaults.items_file),
            orders_file: lookup("ORDERS_FILE").map(PathBuf::from).unwrap_or(defaults.orders_file),
            promotions_file: lookup("PROMOTIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.promotions_file),
            auto_update_enabled: parse_flag(&lookup, "AUTO_UPDATE_ENABLED", defaults.auto_update_enabled)?,
            pending_to_shipped_secs: parse_or(&lookup, "PENDING_TO_SHIPPED_SECS", defaults.pending_to_shipped_secs)?,
            shipped_to_delivered_secs: parse_or(
                &lookup,
                "SHIPPED_TO_DELIVERED_SECS",
                defaults.shipped_to_delivered_secs,
            )?,
            scheduler_poll_millis,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Elapsed-time thresholds for the automatic status transitions
    pub fn lifecycle_durations(&self) -> LifecycleDurations {
        LifecycleDurations::from_secs(self.pending_to_shipped_secs, self.shipped_to_delivered_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_poll_millis)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}
