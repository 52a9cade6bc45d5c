use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::{error, info};
use validator::{Validate, ValidationError};

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (SQLite file for single-till deployments,
    /// Postgres for anything shared).
    pub database_url: String,

    /// Address the HTTP server binds to
    pub host: String,
    pub port: u16,

    /// Runtime environment name (development/production/test)
    pub environment: String,

    /// Default tracing filter level
    pub log_level: String,
    /// Emit JSON-formatted logs
    pub log_json: bool,

    /// Run embedded migrations at startup
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,

    // Database pool tuning
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Stock below this is reported as critical
    #[serde(default = "default_critical_stock_threshold")]
    #[validate(custom = "validate_threshold")]
    pub critical_stock_threshold: Decimal,
    /// Stock below this (but at or above critical) is reported as low
    #[serde(default = "default_low_stock_threshold")]
    #[validate(custom = "validate_threshold")]
    pub low_stock_threshold: Decimal,
}

fn default_auto_migrate() -> bool {
    true
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_critical_stock_threshold() -> Decimal {
    Decimal::from(5)
}
fn default_low_stock_threshold() -> Decimal {
    Decimal::from(10)
}

fn validate_threshold(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut err = ValidationError::new("stock_threshold");
        err.message = Some("stock thresholds must be non-negative".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    /// Construct a config programmatically; used by tests.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: default_auto_migrate(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            critical_stock_threshold: default_critical_stock_threshold(),
            low_stock_threshold: default_low_stock_threshold(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads application configuration.
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `config/default.toml`
/// 3. `config/{env}.toml` selected by RUN_ENV or APP_ENV
/// 4. Environment variables (`APP__*`)
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

    let config = Config::builder()
        .set_default("database_url", "sqlite://fnb_pos.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

/// Initializes tracing using the provided log level as the default filter.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("fnb_pos_api={},tower_http=debug", level);
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
