//! Environment-driven application configuration.

use std::net::SocketAddr;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is missing.
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },
    /// A variable is present but unparsable.
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Settings shared by the server and worker binaries.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string (Diesel and the task queue).
    pub database_url: String,
    /// Redis connection string (presence, dedup, realtime).
    pub redis_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Root directory of the avatar object store.
    pub storage_root: String,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// `BIND_ADDR` defaults to `0.0.0.0:8080` and `STORAGE_ROOT` to
    /// `./storage`; the connection strings are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;
        let redis_url = require("REDIS_URL")?;

        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_owned())
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                message: err.to_string(),
            })?;

        let storage_root =
            std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_owned());

        Ok(Self {
            database_url,
            redis_url,
            bind_addr,
            storage_root,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing { name })
}
