//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - HS256 signing secret (min 32 chars)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `API_PREFIX` - Path every resource is mounted under (default: /api/v1)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `TOKEN_TTL_HOURS` - Access token lifetime (default: 24)
//! - `COMMISSION_RATE` - Platform commission as a fraction (default: 0.05)
//! - `TAX_RATE` - Tax withheld on settlements as a fraction (default: 0.03)
//! - `LOW_STOCK_THRESHOLD` - Stock level that raises an inventory alert (default: 10)
//! - `RUN_MIGRATIONS` - Apply `migrations/` on start-up (default: true)
//! - `NATS_URL` - Publish domain events to this NATS server

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::domain::aggregates::SettlementRates;
use crate::domain::value_objects::Rate;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: SecretString,
    pub jwt_secret: SecretString,
    pub host: IpAddr,
    pub port: u16,
    pub api_prefix: String,
    pub db_max_connections: u32,
    pub token_ttl_hours: i64,
    pub commission_rate: Rate,
    pub tax_rate: Rate,
    pub low_stock_threshold: i32,
    pub run_migrations: bool,
    pub nats_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database_url = SecretString::from(required("DATABASE_URL")?);
        let jwt_secret = SecretString::from(required("JWT_SECRET")?);
        validate_jwt_secret(&jwt_secret)?;

        let api_prefix = normalize_prefix(&or_default("API_PREFIX", "/api/v1"));

        Ok(Self {
            database_url,
            jwt_secret,
            host: parse("HOST", &or_default("HOST", "0.0.0.0"))?,
            port: parse("PORT", &or_default("PORT", "8083"))?,
            api_prefix,
            db_max_connections: parse("DB_MAX_CONNECTIONS", &or_default("DB_MAX_CONNECTIONS", "10"))?,
            token_ttl_hours: parse("TOKEN_TTL_HOURS", &or_default("TOKEN_TTL_HOURS", "24"))?,
            commission_rate: parse("COMMISSION_RATE", &or_default("COMMISSION_RATE", "0.05"))?,
            tax_rate: parse("TAX_RATE", &or_default("TAX_RATE", "0.03"))?,
            low_stock_threshold: parse("LOW_STOCK_THRESHOLD", &or_default("LOW_STOCK_THRESHOLD", "10"))?,
            run_migrations: parse("RUN_MIGRATIONS", &or_default("RUN_MIGRATIONS", "true"))?,
            nats_url: get("NATS_URL").filter(|s| !s.is_empty()),
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn settlement_rates(&self) -> SettlementRates {
        SettlementRates { commission: self.commission_rate, tax: self.tax_rate }
    }

    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// `api/v1/` and `/api/v1` both become `/api/v1`; an empty prefix mounts at the root.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() { String::new() } else { format!("/{trimmed}") }
}

fn validate_jwt_secret(secret: &SecretString) -> Result<(), ConfigError> {
    let len = secret.expose_secret().len();
    if len < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            "JWT_SECRET".to_string(),
            format!("must be at least {MIN_JWT_SECRET_LENGTH} characters (got {len})"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    const BASE: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/market"),
        ("JWT_SECRET", "k3J9x2LmQ8vR4tY7wZ1pA6sD0fG5hB3n"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.low_stock_threshold, 10);
        assert_eq!(config.settlement_rates().commission, "0.05".parse().unwrap());
        assert!(config.run_migrations);
        assert!(config.nats_url.is_none());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8083");
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&BASE[..1])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = Config::from_lookup(lookup(&[BASE[0], ("JWT_SECRET", "hello")])).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = BASE.to_vec();
        pairs.push(("COMMISSION_RATE", "1.2"));
        assert!(matches!(Config::from_lookup(lookup(&pairs)), Err(ConfigError::InvalidEnvVar(k, _)) if k == "COMMISSION_RATE"));
        let mut pairs = BASE.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(normalize_prefix("api/v2/"), "/api/v2");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("k3J9x2LmQ8vR4tY7wZ1pA6sD0fG5hB3n"));
        assert!(!debug.contains("postgres://localhost/market"));
    }
}
