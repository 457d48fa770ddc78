//! Read-only configuration map, initialized once per run.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration already initialized")]
    AlreadyInitialized,
    #[error("configuration not initialized")]
    NotInitialized,
    #[error("missing configuration key `{0}`")]
    Missing(String),
    #[error("configuration key `{key}` is not a {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("configuration page is not a JSON object: {0}")]
    Invalid(String),
}

#[derive(Debug, Default)]
pub struct Config {
    values: OnceLock<HashMap<String, Value>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialized(values: HashMap<String, Value>) -> Self {
        Self {
            values: OnceLock::from(values),
        }
    }

    pub fn init(&self, values: HashMap<String, Value>) -> Result<(), ConfigError> {
        self.values
            .set(values)
            .map_err(|_| ConfigError::AlreadyInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.values.get().is_some()
    }

    pub fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        self.values
            .get()
            .ok_or(ConfigError::NotInitialized)?
            .get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)?.as_str().ok_or_else(|| ConfigError::WrongType {
            key: key.to_string(),
            expected: "string",
        })
    }

    pub fn get_opt_str(&self, key: &str) -> Result<Option<&str>, ConfigError> {
        match self.get(key) {
            Ok(_) => self.get_str(key).map(Some),
            Err(ConfigError::Missing(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get(key)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s == "true" || s == "1" => Ok(true),
            Value::String(s) if s == "false" || s == "0" || s.is_empty() => Ok(false),
            _ => Err(ConfigError::WrongType {
                key: key.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// A JSON array of strings or a comma-separated string.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let wrong = || ConfigError::WrongType {
            key: key.to_string(),
            expected: "list of strings",
        };
        match self.get(key)? {
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or_else(wrong))
                .collect(),
            Value::String(s) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
            _ => Err(wrong()),
        }
    }
}

/// Parses the on-wiki configuration page into a flat map.
pub fn parse_config_page(text: &str) -> Result<HashMap<String, Value>, ConfigError> {
    serde_json::from_str(text).map_err(|err| ConfigError::Invalid(err.to_string()))
}
