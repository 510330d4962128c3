//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated, `*` for any
    pub client_origin: String,

    /// Longest display name accepted on join, in characters
    pub max_name_len: usize,
    /// Per-connection outbound queue capacity
    pub outbound_queue: usize,
    /// Max inbound messages per second per connection
    pub input_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            log_level: "info".to_string(),
            client_origin: "*".to_string(),
            max_name_len: 32,
            outbound_queue: 64,
            input_rate_limit: 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr: SocketAddr = match env::var("PORT") {
            Ok(port) => format!("0.0.0.0:{}", port)
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            Err(_) => match env::var("SERVER_ADDR") {
                Ok(addr) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
                Err(_) => defaults.server_addr,
            },
        };

        let max_name_len = parse_var("MAX_NAME_LEN", defaults.max_name_len)?;
        let outbound_queue = parse_var("OUTBOUND_QUEUE", defaults.outbound_queue)?;
        let input_rate_limit = parse_var("INPUT_RATE_LIMIT", defaults.input_rate_limit)?;

        if max_name_len == 0 {
            return Err(ConfigError::Invalid("MAX_NAME_LEN"));
        }
        // tokio's bounded channel panics on zero capacity
        if outbound_queue == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_QUEUE"));
        }

        Ok(Self {
            server_addr,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or(defaults.client_origin),
            max_name_len,
            outbound_queue,
            input_rate_limit,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
