//! Process-wide configuration.
//!
//! `Config` is read once at startup and passed by reference to whatever needs it
//! (the credential service, the store bootstrap and the HTTP server). Nothing reads
//! the environment after `main` has built it.

use std::env;
use std::fmt;

const DEFAULT_JWT_SECRET: &str = "default-secret-key";
const DEFAULT_SESSION_SECRET: &str = "default-session-key";

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub server_port: u16,
    pub server_host: String,
    /// Public base URL advertised by the index endpoint.
    pub public_url: Option<String>,
    pub jwt_secret: String,
    pub session_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

/// Raised when an environment value cannot be interpreted.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: &'static str,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid {}={:?}: {}", self.key, self.value, self.reason)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_port = match non_empty("SERVER_PORT").or_else(|| non_empty("PORT")) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
                key: "SERVER_PORT",
                value: raw,
                reason: "must be a port number",
            })?,
            None => 3000,
        };

        let token_ttl_hours = parse_or("TOKEN_TTL_HOURS", non_empty("TOKEN_TTL_HOURS"), 24)?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError {
                key: "TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
                reason: "must be positive",
            });
        }

        let bcrypt_cost = parse_or("BCRYPT_COST", non_empty("BCRYPT_COST"), 10)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31",
            });
        }

        let database_max_connections =
            parse_or("DATABASE_MAX_CONNECTIONS", non_empty("DATABASE_MAX_CONNECTIONS"), 5)?;

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            database_max_connections,
            server_port,
            server_host: non_empty("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            public_url: non_empty("PUBLIC_URL").map(|url| url.trim_end_matches('/').to_string()),
            jwt_secret: non_empty("JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            session_secret: non_empty("SESSION_SECRET")
                .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string()),
            token_ttl_hours,
            bcrypt_cost,
        })
    }

    pub fn server_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}", self.server_host, self.server_port),
        }
    }

    /// True when a secret fell back to its built-in development value.
    pub fn uses_default_secrets(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET || self.session_secret == DEFAULT_SESSION_SECRET
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
            key,
            value: raw,
            reason: "must be a number",
        }),
        None => Ok(default),
    }
}
