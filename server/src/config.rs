//! Server configuration parsed from environment variables.
//!
//! All keys are optional. `DATABASE_URL` selects the Postgres sketch
//! repository; without it saved sketches live in memory for the lifetime of
//! the process.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ROOM_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Outbound queue depth per websocket connection.
    pub room_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            room_channel_capacity: DEFAULT_ROOM_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: in-memory sketch storage when absent
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `ROOM_CHANNEL_CAPACITY`: default 256
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric key does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric key does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        Ok(Self {
            port: env_parse(&lookup, "PORT", DEFAULT_PORT)?,
            database_url,
            db_max_connections: env_parse(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            room_channel_capacity: env_parse(&lookup, "ROOM_CHANNEL_CAPACITY", DEFAULT_ROOM_CHANNEL_CAPACITY)?,
        })
    }
}

fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
