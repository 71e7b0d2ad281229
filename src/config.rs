use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;
// Buyers land back on the storefront after checkout; used when the request
// carries no Origin header.
const DEFAULT_PUBLIC_ORIGIN: &str = "https://kids-marketplace.vercel.app";
const DEFAULT_CHECKOUT_CURRENCY: &str = "eur";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret shared with the auth provider (minimum 32 characters)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT issuer expected on inbound tokens
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience expected on inbound tokens
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Access token lifetime in seconds (used when issuing tokens in tests/tools)
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Maximum database connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Minimum database connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Stripe secret API key (sk_...)
    #[validate(length(min = 1))]
    pub stripe_secret_key: String,

    /// Stripe webhook signing secret (whsec_...)
    #[validate(length(min = 1))]
    pub stripe_webhook_secret: String,

    /// Stripe API base URL; overridden in tests to point at a mock server
    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,

    /// Allowed clock skew when verifying webhook signatures, in seconds
    #[serde(default = "default_webhook_tolerance_secs")]
    pub stripe_webhook_tolerance_secs: u64,

    /// Storefront origin used for checkout redirect URLs when the request
    /// carries no Origin header
    #[serde(default = "default_public_origin")]
    pub public_origin: String,

    /// Currency checkout sessions are priced in
    #[serde(default = "default_checkout_currency")]
    pub checkout_currency: String,

    /// Comma-separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Explicitly allow permissive CORS outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Capacity of the in-process event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        jwt_secret: String,
        stripe_secret_key: String,
        stripe_webhook_secret: String,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            jwt_expiration: default_jwt_expiration(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_api_base: default_stripe_api_base(),
            stripe_webhook_tolerance_secs: default_webhook_tolerance_secs(),
            public_origin: default_public_origin(),
            checkout_currency: default_checkout_currency(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }
}

fn default_auth_issuer() -> String {
    "kidsmarket-auth".to_string()
}

fn default_auth_audience() -> String {
    "kidsmarket-api".to_string()
}

fn default_jwt_expiration() -> usize {
    3600
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_stripe_api_base() -> String {
    DEFAULT_STRIPE_API_BASE.to_string()
}

fn default_webhook_tolerance_secs() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}

fn default_public_origin() -> String {
    DEFAULT_PUBLIC_ORIGIN.to_string()
}

fn default_checkout_currency() -> String {
    DEFAULT_CHECKOUT_CURRENCY.to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("kidsmarket_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = Config::builder()
        .set_default("database_url", "sqlite://kidsmarket.db?mode=rwc")?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Secrets have no defaults; fail early with actionable messages.
    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to the secret shared with the auth provider.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET.".into(),
        )));
    }
    if config.get_string("stripe_secret_key").is_err() {
        error!("Stripe secret key is not configured. Set APP__STRIPE_SECRET_KEY.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "stripe_secret_key is required but not configured. Set APP__STRIPE_SECRET_KEY.".into(),
        )));
    }
    if config.get_string("stripe_webhook_secret").is_err() {
        error!("Stripe webhook secret is not configured. Set APP__STRIPE_WEBHOOK_SECRET.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "stripe_webhook_secret is required but not configured. Set APP__STRIPE_WEBHOOK_SECRET."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://kidsmarket.db?mode=memory".into(),
            "super_secure_jwt_secret_that_is_long_enough_123".into(),
            "sk_test_123".into(),
            "whsec_test_123".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn base_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_fails_validation() {
        let mut cfg = base_config();
        cfg.jwt_secret = "short".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn permissive_cors_only_in_development_or_explicit() {
        let mut cfg = base_config();
        assert!(!cfg.should_allow_permissive_cors());
        cfg.environment = "development".into();
        assert!(cfg.should_allow_permissive_cors());
        cfg.environment = "production".into();
        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
    }
}
