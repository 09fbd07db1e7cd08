use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// PostgreSQL connection URL. Unset runs on the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    /// Event bus channel capacity.
    pub event_bus_capacity: usize,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
    /// How often scheduled releases are settled. Zero disables the scheduler.
    pub settle_interval_secs: u64,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value,
            expected,
        }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source, with defaults for unset names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&lookup, "PORT", 3030, "u16")?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 20, "u32")?,
            db_min_connections: parse(&lookup, "DB_MIN_CONNECTIONS", 5, "u32")?,
            event_bus_capacity: parse(&lookup, "EVENT_BUS_CAPACITY", 1024, "usize")?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            settle_interval_secs: parse(&lookup, "SETTLE_INTERVAL_SECS", 30, "u64")?,
            max_body_bytes: parse(&lookup, "MAX_BODY_BYTES", 2 * 1024 * 1024, "usize")?,
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn settle_interval(&self) -> Option<Duration> {
        (self.settle_interval_secs > 0).then(|| Duration::from_secs(self.settle_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_select_memory_store() {
        let config = config(&[]).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:3030");
        assert!(config.database_url.is_none());
        assert_eq!(config.settle_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/publisher"),
            ("SETTLE_INTERVAL_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/publisher")
        );
        assert_eq!(config.settle_interval(), None);
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.to_string(), "PORT must be a valid u16, got \"eighty\"");
    }
}
