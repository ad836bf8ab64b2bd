use oro_store::{ServiceAccountKey, KEY_ENV, SHEET_ID_ENV};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroU32, num::NonZeroU64, path::PathBuf, str::FromStr};
use thiserror::Error;
use tracing::Level;

/// Configuration for the ledger server, usually read from YAML.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub log_level: String,

    /// Serve from an in-process store instead of the spreadsheet.
    pub memory: bool,

    pub sheet_id: Option<String>,
    /// Service account key as JSON or base64 JSON.
    #[serde(skip_serializing)]
    pub service_account_key: Option<String>,
    /// Key file used when no key is given inline.
    pub credentials: PathBuf,

    /// Milliseconds to replenish one request of a client's allowance.
    pub rate_limit_period_ms: u64,
    pub rate_limit_burst: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            log_level: "info".to_string(),
            memory: false,
            sheet_id: None,
            service_account_key: None,
            credentials: PathBuf::from("service-account.json"),
            rate_limit_period_ms: 100,
            rate_limit_burst: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error(transparent)]
    Store(#[from] oro_store::Error),
}

/// Per-client request allowance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub period_ms: NonZeroU64,
    pub burst: NonZeroU32,
}

/// Where ledger rows are kept.
#[derive(Debug)]
pub enum Backend {
    Memory,
    Sheets {
        spreadsheet_id: String,
        key: ServiceAccountKey,
    },
}

#[derive(Debug)]
pub struct ValidatedConfig {
    pub port: u16,
    pub log_level: Level,
    pub backend: Backend,
    pub rate_limit: RateLimit,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Overrides the sheet id and inline key from the process environment.
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Overrides the sheet id and inline key from `lookup`; unset or blank
    /// variables leave the current values alone.
    pub fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(id) = non_empty(lookup(SHEET_ID_ENV)) {
            self.sheet_id = Some(id);
        }
        if let Some(key) = non_empty(lookup(KEY_ENV)) {
            self.service_account_key = Some(key);
        }
        self
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        let period_ms =
            NonZeroU64::new(self.rate_limit_period_ms).ok_or(ConfigError::InvalidNonZero {
                field: "rate_limit_period_ms",
                value: self.rate_limit_period_ms,
            })?;
        let burst = NonZeroU32::new(self.rate_limit_burst).ok_or(ConfigError::InvalidNonZero {
            field: "rate_limit_burst",
            value: self.rate_limit_burst.into(),
        })?;

        let backend = if self.memory {
            Backend::Memory
        } else {
            let spreadsheet_id = non_empty(self.sheet_id)
                .ok_or(oro_store::Error::MissingDocumentId(SHEET_ID_ENV))?;
            let key =
                ServiceAccountKey::load(self.service_account_key.as_deref(), &self.credentials)?;
            Backend::Sheets {
                spreadsheet_id,
                key,
            }
        };

        Ok(ValidatedConfig {
            port: self.port,
            log_level,
            backend,
            rate_limit: RateLimit { period_ms, burst },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY_JSON: &str = r#"{"client_email":"ledger@example.com","private_key":"pem"}"#;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.credentials, PathBuf::from("service-account.json"));
        assert!(!config.memory);
    }

    #[test]
    fn test_yaml_fields() {
        let config: Config = serde_yaml::from_str(
            "port: 8080\nlog_level: debug\nmemory: true\nrate_limit_burst: 5\n",
        )
        .unwrap();
        let validated = config.validate().unwrap();
        assert_eq!(validated.port, 8080);
        assert_eq!(validated.log_level, Level::DEBUG);
        assert!(matches!(validated.backend, Backend::Memory));
        assert_eq!(validated.rate_limit.burst.get(), 5);
    }

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            (SHEET_ID_ENV, "sheet-from-env".to_string()),
            (KEY_ENV, KEY_JSON.to_string()),
        ]);
        let config = Config {
            sheet_id: Some("sheet-from-file".to_string()),
            credentials: PathBuf::from("/nonexistent/key.json"),
            ..Config::default()
        }
        .with_vars(|name| vars.get(name).cloned());
        assert_eq!(config.sheet_id.as_deref(), Some("sheet-from-env"));

        let validated = config.validate().unwrap();
        let Backend::Sheets {
            spreadsheet_id,
            key,
        } = validated.backend
        else {
            panic!("expected sheets backend");
        };
        assert_eq!(spreadsheet_id, "sheet-from-env");
        assert_eq!(key.client_email, "ledger@example.com");
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let config = Config {
            sheet_id: Some("kept".to_string()),
            ..Config::default()
        }
        .with_vars(|_| Some("   ".to_string()));
        assert_eq!(config.sheet_id.as_deref(), Some("kept"));
        assert_eq!(config.service_account_key, None);
    }

    #[test]
    fn test_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service-account.json");
        std::fs::write(&path, KEY_JSON).unwrap();

        let config = Config {
            sheet_id: Some("sheet".to_string()),
            credentials: path,
            ..Config::default()
        };
        assert!(matches!(
            config.validate().unwrap().backend,
            Backend::Sheets { .. }
        ));
    }

    #[test]
    fn test_invalid_configs() {
        let err = Config {
            log_level: "loud".to_string(),
            memory: true,
            ..Config::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel { .. }));

        let err = Config {
            rate_limit_burst: 0,
            memory: true,
            ..Config::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNonZero {
                field: "rate_limit_burst",
                ..
            }
        ));

        let err = Config::default().validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Store(oro_store::Error::MissingDocumentId(_))
        ));

        let err = Config {
            sheet_id: Some("sheet".to_string()),
            credentials: PathBuf::from("/nonexistent/key.json"),
            ..Config::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Store(oro_store::Error::MissingCredentials { .. })
        ));
    }
}
