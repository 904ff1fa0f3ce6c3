use std::{env, net::IpAddr, time::Duration};

use anyhow::{bail, Context, Result};
use tracing::warn;

const DEV_JWT_SECRET: &str = "chmrs-development-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb,
    Memory,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub cors_allowed_origin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub superadmin_email: String,
    pub superadmin_password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source. Unset variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // Server
        let host = var("SERVER_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .context("Failed to parse SERVER_HOST")?;
        let port = var("SERVER_PORT", "8000")
            .parse::<u16>()
            .context("Failed to parse SERVER_PORT")?;
        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN").filter(|origin| !origin.is_empty());

        // Storage
        let backend = match var("STORAGE_BACKEND", "mongodb").to_lowercase().as_str() {
            "mongodb" => StorageBackend::MongoDb,
            "memory" => StorageBackend::Memory,
            other => bail!("Unknown STORAGE_BACKEND {other}, expected mongodb or memory"),
        };
        let poll_interval = var("POLL_INTERVAL_SECS", "2")
            .parse::<u64>()
            .context("Failed to parse POLL_INTERVAL_SECS")?;
        if poll_interval == 0 {
            bail!("POLL_INTERVAL_SECS must be greater than zero");
        }

        // Auth
        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET is not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        let token_ttl_secs = var("TOKEN_TTL_SECS", "86400")
            .parse::<i64>()
            .context("Failed to parse TOKEN_TTL_SECS")?;

        Ok(Config {
            server: ServerConfig {
                host,
                port,
                cors_allowed_origin,
            },
            storage: StorageConfig {
                backend,
                mongodb_uri: var("MONGODB_URI", "mongodb://localhost:27017"),
                mongodb_database: var("MONGODB_DATABASE", "chmrs"),
                poll_interval: Duration::from_secs(poll_interval),
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_secs,
                superadmin_email: var("SUPERADMIN_EMAIL", "superadmin@chmrs.local"),
                superadmin_password: var("SUPERADMIN_PASSWORD", "superadmin123"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.backend, StorageBackend::MongoDb);
        assert_eq!(config.storage.mongodb_database, "chmrs");
        assert_eq!(config.storage.poll_interval, Duration::from_secs(2));
        assert_eq!(config.auth.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.auth.token_ttl_secs, 86400);
        assert_eq!(config.server.cors_allowed_origin, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_PORT", "9090"),
            ("STORAGE_BACKEND", "memory"),
            ("POLL_INTERVAL_SECS", "5"),
            ("SUPERADMIN_EMAIL", "chief@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.poll_interval, Duration::from_secs(5));
        assert_eq!(config.auth.superadmin_email, "chief@example.com");
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(Config::from_lookup(lookup(&[("SERVER_PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STORAGE_BACKEND", "redis")])).is_err());
        assert!(Config::from_lookup(lookup(&[("POLL_INTERVAL_SECS", "0")])).is_err());
    }
}
