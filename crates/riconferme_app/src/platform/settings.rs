use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse settings {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Local, per-installation settings read from a RON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub main_api_url: String,
    pub central_api_url: String,
    pub private_api_url: String,
    pub username: String,
    pub password: String,
    /// JSON page on the main wiki merged into the configuration.
    pub config_title: String,
    /// JSON page on the main wiki holding the messages.
    pub msg_title: String,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_last_run_file")]
    pub last_run_file: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Local configuration entries; they win over the on-wiki page.
    #[serde(default)]
    pub config: HashMap<String, String>,
}

fn default_time_zone() -> String {
    "Europe/Rome".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("./riconferme.log")
}

fn default_last_run_file() -> PathBuf {
    PathBuf::from("./.riconferme_last_run.ron")
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Settings {
    pub fn time_zone(&self) -> Result<Tz, SettingsError> {
        self.time_zone
            .parse()
            .map_err(|err| SettingsError::Invalid(format!("time zone {}: {err}", self.time_zone)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("main_api_url", &self.main_api_url),
            ("central_api_url", &self.central_api_url),
            ("private_api_url", &self.private_api_url),
            ("username", &self.username),
            ("config_title", &self.config_title),
            ("msg_title", &self.msg_title),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(SettingsError::Invalid(format!("`{name}` is empty")));
        }
        self.time_zone()?;
        Ok(())
    }
}

pub fn parse_settings(text: &str, path: &Path) -> Result<Settings, SettingsError> {
    let settings: Settings = ron::from_str(text).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    Ok(settings)
}

pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&text, path)
}
