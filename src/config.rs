//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::time::Duration;

use crate::payments::providers::paystack::PaystackConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub paystack: PaystackConfig,
    pub checkout: CheckoutConfig,
    pub fulfillment: FulfillmentConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Checkout and reconciliation behaviour
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Base URL of the storefront; the payer is sent back to
    /// `{frontend_url}{callback_path}` after paying.
    pub frontend_url: String,
    pub callback_path: String,
    pub currency: String,
    /// Enforce phone and address on checkout (the storefront always asks for them)
    pub require_contact_details: bool,
    /// Verify pay-on-delivery authorization codes with the gateway before trusting them
    pub verify_pod_authorization: bool,
    /// Rebuild orders from gateway data when a verified reference is unknown locally
    pub recover_unknown_orders: bool,
}

/// Fulfillment queue configuration
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    pub queue_capacity: usize,
    pub rider_assignment_delay: Duration,
    /// Rider assignments running at once
    pub max_concurrent_assignments: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(AppConfig {
            server: ServerConfig::from_lookup(&lookup)?,
            paystack: paystack_from_lookup(&lookup)?,
            checkout: CheckoutConfig::from_lookup(&lookup)?,
            fulfillment: FulfillmentConfig::from_lookup(&lookup)?,
            logging: LoggingConfig::from_lookup(&lookup),
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.checkout.validate()?;
        self.fulfillment.validate()?;
        self.logging.validate()?;

        if self.paystack.secret_key.trim().is_empty() {
            return Err(ConfigError::MissingVariable(
                "PAYSTACK_SECRET_KEY".to_string(),
            ));
        }
        if self.paystack.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PAYSTACK_TIMEOUT_SECS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        _ => Ok(default),
    }
}

fn paystack_from_lookup<F>(lookup: &F) -> Result<PaystackConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secret_key = lookup("PAYSTACK_SECRET_KEY")
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable("PAYSTACK_SECRET_KEY".to_string()))?;
    let defaults = PaystackConfig::default();

    Ok(PaystackConfig {
        webhook_secret: lookup("PAYSTACK_WEBHOOK_SECRET").filter(|v| !v.trim().is_empty()),
        base_url: lookup("PAYSTACK_BASE_URL").unwrap_or(defaults.base_url),
        timeout_secs: parse_or(lookup, "PAYSTACK_TIMEOUT_SECS", defaults.timeout_secs)?,
        max_retries: parse_or(lookup, "PAYSTACK_MAX_RETRIES", defaults.max_retries)?,
        secret_key,
    })
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(ServerConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(lookup, "PORT", 3001)?,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("HOST cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.is_empty() || self.cors_allowed_origins.iter().any(|o| o == "*")
    }
}

impl CheckoutConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let frontend_url = lookup("FRONTEND_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVariable("FRONTEND_URL".to_string()))?;

        Ok(CheckoutConfig {
            frontend_url: frontend_url.trim().trim_end_matches('/').to_string(),
            callback_path: lookup("CALLBACK_PATH").unwrap_or_else(|| "/callback".to_string()),
            currency: lookup("CHECKOUT_CURRENCY")
                .unwrap_or_else(|| "NGN".to_string())
                .trim()
                .to_uppercase(),
            require_contact_details: parse_or(lookup, "REQUIRE_CONTACT_DETAILS", false)?,
            verify_pod_authorization: parse_or(lookup, "POD_VERIFY_AUTHORIZATION", false)?,
            recover_unknown_orders: parse_or(lookup, "RECOVER_UNKNOWN_ORDERS", true)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frontend_url.starts_with("http://") && !self.frontend_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue(
                "FRONTEND_URL must be a valid URL".to_string(),
            ));
        }

        if !self.callback_path.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "CALLBACK_PATH must start with '/'".to_string(),
            ));
        }

        if self.currency.len() != 3 {
            return Err(ConfigError::InvalidValue("CHECKOUT_CURRENCY".to_string()));
        }

        Ok(())
    }

    pub fn callback_url(&self) -> String {
        format!("{}{}", self.frontend_url, self.callback_path)
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            rider_assignment_delay: Duration::from_millis(1000),
            max_concurrent_assignments: 64,
        }
    }
}

impl FulfillmentConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(FulfillmentConfig {
            queue_capacity: parse_or(lookup, "FULFILLMENT_QUEUE_CAPACITY", defaults.queue_capacity)?,
            rider_assignment_delay: Duration::from_millis(parse_or(
                lookup,
                "RIDER_ASSIGNMENT_DELAY_MS",
                defaults.rider_assignment_delay.as_millis() as u64,
            )?),
            max_concurrent_assignments: parse_or(
                lookup,
                "FULFILLMENT_MAX_CONCURRENT",
                defaults.max_concurrent_assignments,
            )?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "FULFILLMENT_QUEUE_CAPACITY cannot be 0".to_string(),
            ));
        }
        if self.max_concurrent_assignments == 0 {
            return Err(ConfigError::InvalidValue(
                "FULFILLMENT_MAX_CONCURRENT cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        LoggingConfig {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
            format: match lookup("LOG_FORMAT")
                .unwrap_or_else(|| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
