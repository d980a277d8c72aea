use std::{path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_STORAGE_ROOT: &str = "./uploads";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// What to do when an upload reuses an original name already in storage.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    #[serde(rename = "allow")]
    Allow,
    #[serde(rename = "reject")]
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(DuplicatePolicy::Allow),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(format!("expected 'allow' or 'reject', got '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LocalConfig {
    #[serde(rename = "storageRoot")]
    pub storage_root: PathBuf,
    pub host: String,
    pub port: u16,
    #[serde(rename = "publicUrl")]
    pub public_url: Option<String>,
    #[serde(rename = "maxUploadSize")]
    pub max_upload_size: usize,
    #[serde(rename = "duplicateNames")]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(rename = "corsAllowedOrigins")]
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            public_url: None,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            duplicate_policy: DuplicatePolicy::Allow,
            cors_allowed_origins: None,
        }
    }
}

impl LocalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; unset or blank values fall
    /// back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(value) => parse_var("PORT", &value)?,
            None => defaults.port,
        };

        let max_upload_size = match var("MAX_UPLOAD_SIZE") {
            Some(value) => parse_var("MAX_UPLOAD_SIZE", &value)?,
            None => defaults.max_upload_size,
        };

        let duplicate_policy = match var("DUPLICATE_NAMES") {
            Some(value) => parse_var("DUPLICATE_NAMES", &value)?,
            None => defaults.duplicate_policy,
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        });

        Ok(Self {
            storage_root: var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            host: var("HOST").unwrap_or(defaults.host),
            port,
            public_url: var("PUBLIC_URL").map(|url| url.trim_end_matches('/').to_string()),
            max_upload_size,
            duplicate_policy,
            cors_allowed_origins,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
