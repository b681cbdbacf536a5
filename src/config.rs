use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
/// TTL of the read-through permission cache. Permission edits invalidate
/// synchronously; the TTL only bounds staleness across processes.
const DEFAULT_PERMISSION_CACHE_TTL_SECS: u64 = 60;
/// Days of inactivity after which a positive balance counts as dead stock.
const DEFAULT_DEAD_STOCK_DAYS: i64 = 90;

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Fixed business timezone as minutes east of UTC. Stock-count days
    /// and movement calendar fields are resolved against this offset.
    #[serde(default)]
    #[validate(range(min = -720, max = 840))]
    pub business_tz_offset_minutes: i32,

    /// Permission cache TTL in seconds
    #[serde(default = "default_permission_cache_ttl")]
    pub permission_cache_ttl_secs: u64,

    /// Inactivity window for dead-stock classification, in days
    #[serde(default = "default_dead_stock_days")]
    #[validate(range(min = 1))]
    pub dead_stock_days: i64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_permission_cache_ttl() -> u64 {
    DEFAULT_PERMISSION_CACHE_TTL_SECS
}

fn default_dead_stock_days() -> i64 {
    DEFAULT_DEAD_STOCK_DAYS
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Minimal config for tests: sqlite in-memory, migrations on.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            log_json: false,
            auto_migrate: true,
            business_tz_offset_minutes: 0,
            permission_cache_ttl_secs: DEFAULT_PERMISSION_CACHE_TTL_SECS,
            dead_stock_days: DEFAULT_DEAD_STOCK_DAYS,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/{default,<env>}.toml` plus `APP__*`
/// environment variables, layered over built-in defaults.
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
        .set_default("database_url", "sqlite://stockledger.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .set_default("business_tz_offset_minutes", 0)?
        .set_default(
            "permission_cache_ttl_secs",
            DEFAULT_PERMISSION_CACHE_TTL_SECS as i64,
        )?
        .set_default("dead_stock_days", DEFAULT_DEAD_STOCK_DAYS)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

/// Initialises the global tracing subscriber from config.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("stockledger_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_passes_validation() {
        let cfg = AppConfig::for_tests();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.dead_stock_days, 90);
        assert_eq!(cfg.permission_cache_ttl_secs, 60);
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let mut cfg = AppConfig::for_tests();
        cfg.business_tz_offset_minutes = 2000;
        assert!(cfg.validate().is_err());
    }
}
