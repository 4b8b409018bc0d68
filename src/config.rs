use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const MAX_PAGE_SIZE: u32 = 1000;
const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 30;

const DATABASE_ENV: &str = "DRIVE_REGISTRY_DB";
const ACCESS_TOKEN_ENV: &str = "DRIVE_ACCESS_TOKEN";
const API_BASE_ENV: &str = "DRIVE_API_BASE";
const PAGE_SIZE_ENV: &str = "DRIVE_PAGE_SIZE";
const PAGE_TIMEOUT_ENV: &str = "DRIVE_PAGE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveConfig {
    pub api_base: String,
    pub page_size: u32,
    /// `None` when the timeout is configured as 0.
    pub page_timeout: Option<Duration>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: MAX_PAGE_SIZE,
            page_timeout: Some(Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS)),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub access_token: Option<String>,
    pub drive: DriveConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("drive", &self.drive)
            .finish()
    }
}

pub fn default_database_path() -> Result<PathBuf, AppError> {
    let dirs = directories::ProjectDirs::from("", "", "drive-registry").ok_or_else(|| {
        AppError::Config("could not resolve a data directory for the registry".to_string())
    })?;
    Ok(dirs.data_dir().join("registry.db"))
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| AppError::Config(format!("{key}={raw:?}: {e}")))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_path = match get(DATABASE_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };

        let mut drive = DriveConfig::default();
        if let Some(base) = get(API_BASE_ENV) {
            drive.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get(PAGE_SIZE_ENV) {
            let size: u32 = parse_number(PAGE_SIZE_ENV, &raw)?;
            drive.page_size = size.clamp(1, MAX_PAGE_SIZE);
        }
        if let Some(raw) = get(PAGE_TIMEOUT_ENV) {
            let secs: u64 = parse_number(PAGE_TIMEOUT_ENV, &raw)?;
            drive.page_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(Self {
            database_path,
            access_token: get(ACCESS_TOKEN_ENV),
            drive,
        })
    }
}
