//! Configuration for the API server and the tool service.
//!
//! Both binaries read environment variables:
//! - `TOOL_SERVICE_ADDR` - Optional. Tool service endpoint. Defaults to `127.0.0.1:8001`.
//! - `TOOL_SERVICE_ROOT` - Optional. Base for relative tool paths (tool service only).
//! - `GOOGLE_API_KEY` - Required by the API server binary.
//! - `ASSISTANT_MODEL` - Optional. Defaults to `gemini-2.0-flash-001`.
//! - `HOST` / `PORT` - Optional. API bind address. Defaults to `0.0.0.0:8000`.
//! - `MAX_ITERATIONS` - Optional. Model turns per request. Defaults to `25`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Deadline for one `/generate` run. Unset means none.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_TOOL_SERVICE_ADDR: &str = "127.0.0.1:8001";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tool service endpoint (`host:port`)
    pub tool_service_addr: String,

    /// Language model identifier
    pub model: String,

    /// Language model API key
    pub api_key: Option<String>,

    pub host: String,
    pub port: u16,

    /// Upper bound on model turns within one request
    pub max_iterations: usize,

    /// Deadline for a whole `/generate` run
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_service_addr: DEFAULT_TOOL_SERVICE_ADDR.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            api_key: None,
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            request_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = parse_var(&lookup, "PORT")?.unwrap_or(defaults.port);
        let max_iterations =
            parse_var(&lookup, "MAX_ITERATIONS")?.unwrap_or(defaults.max_iterations);
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_owned(),
                "must be at least 1".to_owned(),
            ));
        }
        let request_timeout =
            parse_var::<u64>(&lookup, "REQUEST_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            tool_service_addr: lookup("TOOL_SERVICE_ADDR").unwrap_or(defaults.tool_service_addr),
            model: lookup("ASSISTANT_MODEL").unwrap_or(defaults.model),
            api_key: lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty()),
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            max_iterations,
            request_timeout,
        })
    }

    /// The API key, or an error naming the variable that should carry it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GOOGLE_API_KEY".to_owned()))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tool service configuration.
#[derive(Debug, Clone)]
pub struct ToolServerConfig {
    /// Address the tool service listens on.
    pub bind_addr: String,
    /// Base directory for relative tool paths.
    pub root: PathBuf,
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_TOOL_SERVICE_ADDR.to_owned(),
            root: PathBuf::from("."),
        }
    }
}

impl ToolServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: lookup("TOOL_SERVICE_ADDR").unwrap_or(defaults.bind_addr),
            root: lookup("TOOL_SERVICE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
        }
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key.to_owned(), e.to_string()))
        })
        .transpose()
}
