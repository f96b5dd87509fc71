//! Environment-driven configuration structures shared by all binaries.

use std::env;

use thiserror::Error;

/// Default expiry-sweep cadence when `SWEEP_INTERVAL_SECS` is absent.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Configuration for the HTTP API binary: bind targets, the shared database,
/// and the payment-gateway credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    database_url: String,
    api_bind_address: String,
    internal_bind_address: Option<String>,
    gateway_base_url: String,
    gateway_secret_key: String,
    payment_callback_url: String,
    webhook_secret: Option<String>,
}

impl ApiConfig {
    /// Loads only the environment variables required by the API binary.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            database_url: get_required_var("DATABASE_URL")?,
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            internal_bind_address: get_optional_var("API_INTERNAL_BIND_ADDRESS"),
            gateway_base_url: get_required_var("GATEWAY_BASE_URL")?,
            gateway_secret_key: get_required_var("GATEWAY_SECRET_KEY")?,
            payment_callback_url: get_required_var("PAYMENT_CALLBACK_URL")?,
            webhook_secret: get_optional_var("GATEWAY_WEBHOOK_SECRET"),
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn internal_bind_address(&self) -> Option<&str> {
        self.internal_bind_address.as_deref()
    }

    pub fn has_internal_listener(&self) -> bool {
        self.internal_bind_address.is_some()
    }

    pub fn gateway_base_url(&self) -> &str {
        &self.gateway_base_url
    }

    pub fn gateway_secret_key(&self) -> &str {
        &self.gateway_secret_key
    }

    pub fn payment_callback_url(&self) -> &str {
        &self.payment_callback_url
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}

/// Configuration for the expiry-sweeper binary. It only needs the database
/// and a cadence, so it does not depend on API-only variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    database_url: String,
    sweep_interval_secs: u64,
}

impl SweeperConfig {
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let database_url = get_required_var("DATABASE_URL")?;
        let sweep_interval_secs = match get_optional_var("SWEEP_INTERVAL_SECS") {
            Some(raw) => raw.parse().map_err(|source| ConfigError::InvalidNumber {
                key: "SWEEP_INTERVAL_SECS",
                source,
            })?,
            None => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        Ok(Self {
            database_url,
            sweep_interval_secs,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn sweep_interval_secs(&self) -> u64 {
        self.sweep_interval_secs
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ConfigError::MissingVar { key })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => Err(ConfigError::MissingVar { key }),
    }
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("ALEBAZ_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn set_env() {
        std::env::set_var("ALEBAZ_SKIP_DOTENV", "1");
        std::env::set_var("DATABASE_URL", "sqlite://test.db");
        std::env::set_var("API_BIND_ADDRESS", "127.0.0.1:8080");
        std::env::remove_var("API_INTERNAL_BIND_ADDRESS");
        std::env::set_var("GATEWAY_BASE_URL", "https://gateway.test");
        std::env::set_var("GATEWAY_SECRET_KEY", "sk_test_abc");
        std::env::set_var("PAYMENT_CALLBACK_URL", "https://alebaz.test/callback");
        std::env::remove_var("GATEWAY_WEBHOOK_SECRET");
        std::env::remove_var("SWEEP_INTERVAL_SECS");
    }

    #[test]
    fn api_config_reads_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();

        let config = ApiConfig::load_from_env().expect("api config loads");
        assert_eq!(config.database_url(), "sqlite://test.db");
        assert_eq!(config.api_bind_address(), "127.0.0.1:8080");
        assert_eq!(config.gateway_base_url(), "https://gateway.test");
        assert_eq!(config.webhook_secret(), None);
        assert!(!config.has_internal_listener());
    }

    #[test]
    fn api_config_supports_internal_listener_and_webhook_secret() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("API_INTERNAL_BIND_ADDRESS", "127.0.0.1:9090");
        std::env::set_var("GATEWAY_WEBHOOK_SECRET", "whsec_123");

        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.internal_bind_address(), Some("127.0.0.1:9090"));
        assert_eq!(config.webhook_secret(), Some("whsec_123"));
        assert!(config.has_internal_listener());

        set_env();
    }

    #[test]
    fn sweeper_config_defaults_the_interval() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();

        let config = SweeperConfig::load_from_env().expect("sweeper config loads");
        assert_eq!(config.sweep_interval_secs(), DEFAULT_SWEEP_INTERVAL_SECS);

        std::env::set_var("SWEEP_INTERVAL_SECS", "5");
        let config = SweeperConfig::load_from_env().expect("sweeper config loads");
        assert_eq!(config.sweep_interval_secs(), 5);
        set_env();
    }

    #[test]
    fn empty_required_env_var_is_treated_as_missing() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("GATEWAY_SECRET_KEY", "   ");

        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "GATEWAY_SECRET_KEY"
            }
        ));

        set_env();
    }
}
