//! Runtime configuration, built from environment variables.

use chrono::FixedOffset;

use crate::error::ConfigError;

/// Default offset for timestamps that carry no zone: UTC+05:30.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub smtp: SmtpConfig,
    /// Offset assumed for added-on timestamps without an explicit zone.
    pub default_offset: FixedOffset,
}

/// Outcome store (REST backend) configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// API root, e.g. `https://api.airtable.com/v0`.
    pub api_base: String,
    pub token: String,
    pub base_id: String,
    pub table: String,
}

/// SMTP notifier configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// Missing required variables are fatal; optional ones fall back to
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = StoreConfig {
            api_base: var_or("NOTIFY_STORE_API_BASE", "https://api.airtable.com/v0"),
            token: require_var("NOTIFY_STORE_TOKEN")?,
            base_id: require_var("NOTIFY_STORE_BASE")?,
            table: var_or("NOTIFY_STORE_TABLE", "Interview Rounds"),
        };

        let username = require_var("NOTIFY_SMTP_USERNAME")?;
        let smtp = SmtpConfig {
            host: require_var("NOTIFY_SMTP_HOST")?,
            port: parse_var("NOTIFY_SMTP_PORT", 587)?,
            from_address: var_or("NOTIFY_SMTP_FROM", &username),
            password: require_var("NOTIFY_SMTP_PASSWORD")?,
            username,
        };

        let offset_minutes: i32 =
            parse_var("NOTIFY_UTC_OFFSET_MINUTES", DEFAULT_UTC_OFFSET_MINUTES)?;
        let default_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "NOTIFY_UTC_OFFSET_MINUTES".into(),
                message: format!("offset {offset_minutes} minutes is out of range"),
            }
        })?;

        Ok(Self {
            store,
            smtp,
            default_offset,
        })
    }
}

fn require_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.into()))
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_offset_is_plus_0530() {
        let offset = FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap();
        assert_eq!(offset.local_minus_utc(), 5 * 3600 + 30 * 60);
    }
}
