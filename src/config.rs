use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::generation::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_GENERATION_ATTEMPTS, DEFAULT_MODEL, DEFAULT_OLLAMA_URL,
};

/// Application-level constants
pub const APP_NAME: &str = "ExecMirror";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DATABASE_FILE: &str = "assessments.db";

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "execmirror=info,execmirror_lib=info,tower_http=warn"
}

/// Get the application data directory
/// ~/ExecMirror/ on all platforms; falls back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read from `EXECMIRROR_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub ollama_url: String,
    pub model: String,
    pub call_timeout: Duration,
    pub max_generation_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank values take the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("EXECMIRROR_BIND_ADDR") {
            Some(raw) => parse_value("EXECMIRROR_BIND_ADDR", &raw)?,
            None => parse_value("EXECMIRROR_BIND_ADDR", DEFAULT_BIND_ADDR)?,
        };

        let call_timeout = match get("EXECMIRROR_CALL_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse_value("EXECMIRROR_CALL_TIMEOUT_SECS", &raw)?;
                if secs == 0 {
                    return Err(invalid("EXECMIRROR_CALL_TIMEOUT_SECS", &raw, "must be positive"));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_CALL_TIMEOUT,
        };

        let max_generation_attempts = match get("EXECMIRROR_MAX_GENERATION_ATTEMPTS") {
            Some(raw) => {
                let n: u32 = parse_value("EXECMIRROR_MAX_GENERATION_ATTEMPTS", &raw)?;
                if n == 0 {
                    return Err(invalid(
                        "EXECMIRROR_MAX_GENERATION_ATTEMPTS",
                        &raw,
                        "must be at least 1",
                    ));
                }
                n
            }
            None => DEFAULT_MAX_GENERATION_ATTEMPTS,
        };

        Ok(Self {
            bind_addr,
            db_path: get("EXECMIRROR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            ollama_url: get("EXECMIRROR_OLLAMA_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            model: get("EXECMIRROR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            call_timeout,
            max_generation_attempts,
        })
    }
}

fn parse_value<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(var, raw, &e.to_string()))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
