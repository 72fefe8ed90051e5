//! Application configuration loaded from environment variables.

use checkout::CheckoutSettings;
use thiserror::Error;

/// Errors raised while reading the configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set to a value that cannot be parsed.
    #[error("invalid value {value:?} for environment variable {name}")]
    Invalid { name: &'static str, value: String },

    /// The mirror step is enabled without a database service to mirror into.
    #[error("MIRROR_ENABLED is true but DB_SERVICE_URL is not set")]
    MirrorWithoutDatabase,
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `STRIPE_PRIVATE_KEY`: payment provider secret key (required)
/// - `STRIPE_API_BASE`: payment provider host (default: `https://api.stripe.com`)
/// - `CLIENT_URL`: frontend base URL for redirects (required)
/// - `DB_SERVICE_URL`: database service base URL (optional)
/// - `MIRROR_ENABLED`: mirror checkouts into the database service
///   (default: true iff `DB_SERVICE_URL` is set)
/// - `CHECKOUT_CURRENCY`: currency code (default: `"eur"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub client_url: String,
    pub db_service_url: Option<String>,
    pub mirror_enabled: bool,
    pub currency: String,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(p) => p.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: p,
            })?,
            None => defaults.port,
        };

        let db_service_url = get("DB_SERVICE_URL");
        let mirror_enabled = match get("MIRROR_ENABLED") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                name: "MIRROR_ENABLED",
                value: v,
            })?,
            None => db_service_url.is_some(),
        };
        if mirror_enabled && db_service_url.is_none() {
            return Err(ConfigError::MirrorWithoutDatabase);
        }

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            stripe_secret_key: get("STRIPE_PRIVATE_KEY")
                .ok_or(ConfigError::Missing("STRIPE_PRIVATE_KEY"))?,
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            client_url: get("CLIENT_URL").ok_or(ConfigError::Missing("CLIENT_URL"))?,
            db_service_url,
            mirror_enabled,
            currency: get("CHECKOUT_CURRENCY").unwrap_or(defaults.currency),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the orchestrator settings derived from this configuration.
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings::new(self.client_url.as_str()).with_currency(self.currency.as_str())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            stripe_secret_key: String::new(),
            stripe_api_base: checkout::services::stripe::DEFAULT_API_BASE.to_string(),
            client_url: "http://localhost:3000".to_string(),
            db_service_url: None,
            mirror_enabled: false,
            currency: "eur".to_string(),
        }
    }
}
