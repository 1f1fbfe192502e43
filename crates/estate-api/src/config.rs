//! # Runtime Configuration
//!
//! Every setting can be given as a flag or an environment variable. The
//! configuration is parsed once in `main` and shared read-only afterwards.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::middleware::rate_limit::RateLimitConfig;

/// Deployment environment, reported by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Clone, Parser)]
#[command(name = "estate-api", version, about = "Real-estate listing API server")]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    #[arg(long = "env", env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Postgres connection string. Without one the server keeps state in memory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_MAX_OPEN_CONNS", default_value_t = 25)]
    pub db_max_open_conns: u32,

    /// Upper bound on every database call, in seconds.
    #[arg(long, env = "DB_TIMEOUT_SECS", default_value_t = 3)]
    pub db_timeout_secs: u64,

    #[arg(long, env = "LIMITER_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub limiter_enabled: bool,

    /// Sustained requests per second per client address.
    #[arg(long, env = "LIMITER_RPS", default_value_t = 2.0, value_parser = parse_rate)]
    pub limiter_rps: f64,

    /// Burst capacity per client address.
    #[arg(
        long,
        env = "LIMITER_BURST",
        default_value_t = 4,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub limiter_burst: u32,

    /// Space-separated proxy addresses whose `X-Forwarded-For` is believed.
    #[arg(long, env = "TRUSTED_PROXIES", value_delimiter = ' ', num_args = 0..)]
    pub trusted_proxies: Vec<IpAddr>,

    /// Space-separated list of origins allowed to make cross-origin requests.
    #[arg(long, env = "CORS_TRUSTED_ORIGINS", value_delimiter = ' ', num_args = 0..)]
    pub cors_trusted_origins: Vec<String>,

    /// Deliver notifications by POSTing JSON here instead of logging them.
    #[arg(long, env = "NOTIFY_WEBHOOK_URL")]
    pub notify_webhook_url: Option<String>,

    /// Directory uploaded images are written to and served from.
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 20)]
    pub shutdown_grace_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            enabled: self.limiter_enabled,
            requests_per_second: self.limiter_rps,
            burst: self.limiter_burst,
            trusted_proxies: self.trusted_proxies.clone(),
            ..RateLimitConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            environment: Environment::Development,
            database_url: None,
            db_max_open_conns: 25,
            db_timeout_secs: 3,
            limiter_enabled: true,
            limiter_rps: 2.0,
            limiter_burst: 4,
            trusted_proxies: Vec::new(),
            cors_trusted_origins: Vec::new(),
            notify_webhook_url: None,
            upload_dir: PathBuf::from("uploads"),
            shutdown_grace_secs: 20,
            log_format: LogFormat::Json,
        }
    }
}

/// Requests per second must be a finite positive number.
fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("{raw} is not a positive number"))
    }
}

/// Redacts the database URL, which usually embeds a password.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("db_max_open_conns", &self.db_max_open_conns)
            .field("db_timeout_secs", &self.db_timeout_secs)
            .field("limiter_enabled", &self.limiter_enabled)
            .field("limiter_rps", &self.limiter_rps)
            .field("limiter_burst", &self.limiter_burst)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("cors_trusted_origins", &self.cors_trusted_origins)
            .field("notify_webhook_url", &self.notify_webhook_url)
            .field("upload_dir", &self.upload_dir)
            .field("shutdown_grace_secs", &self.shutdown_grace_secs)
            .field("log_format", &self.log_format)
            .finish()
    }
}
