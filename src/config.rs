//! Non-secret settings loaded from TOML
//!
//! Secrets live in the dotenv file read through [`crate::auth::SecretStore`];
//! this file only says where things are and how to talk to each upstream.

use crate::api::ResilienceConfig;
use crate::api::constants::{dodois, trendyol};
use crate::auth::SecretStore;
use chrono_tz::Tz;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TIMEZONE: &str = "Europe/Istanbul";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/opsync.db";
pub const DATABASE_URL_KEY: &str = "DATABASE_URL";
pub const REGIONS_KEY: &str = "REGIONS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config directory on this platform")]
    NoConfigDir,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown timezone '{0}'")]
    Timezone(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// IANA name of the reporting timezone
    pub timezone: String,
    pub regions_file: PathBuf,
    pub env_file: PathBuf,
    /// Takes precedence over `DATABASE_URL` in the env file
    pub database_url: Option<String>,
    pub page_size: PageSizes,
    pub resilience: UpstreamResilience,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            regions_file: PathBuf::from("data/regions.json"),
            env_file: PathBuf::from("data/.env"),
            database_url: None,
            page_size: PageSizes::default(),
            resilience: UpstreamResilience::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSizes {
    pub trendyol: u32,
    pub dodois: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            trendyol: trendyol::DEFAULT_PAGE_SIZE,
            dodois: dodois::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Per-upstream overrides of the built-in resilience presets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamResilience {
    pub trendyol: Option<ResilienceConfig>,
    pub yemeksepeti: Option<ResilienceConfig>,
    pub dodois: Option<ResilienceConfig>,
}

impl UpstreamResilience {
    pub fn trendyol(&self) -> ResilienceConfig {
        self.trendyol.clone().unwrap_or_else(ResilienceConfig::trendyol)
    }

    pub fn yemeksepeti(&self) -> ResilienceConfig {
        self.yemeksepeti.clone().unwrap_or_else(ResilienceConfig::yemeksepeti)
    }

    pub fn dodois(&self) -> ResilienceConfig {
        self.dodois.clone().unwrap_or_else(ResilienceConfig::dodois)
    }
}

impl Settings {
    /// `<config dir>/opsync/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("opsync").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load settings from `path`, or from the default location. A missing
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        debug!("Loading settings from: {}", path.display());

        if !path.exists() {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }

    /// Settings override, then `DATABASE_URL` from the secret store, then
    /// a local file under `data/`
    pub fn database_url(&self, secrets: &dyn SecretStore) -> String {
        self.database_url
            .clone()
            .or_else(|| secrets.read(DATABASE_URL_KEY))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }
}

/// Region codes with Trendyol credentials, from the comma-separated `REGIONS` secret
pub fn trendyol_regions(secrets: &dyn SecretStore) -> Vec<String> {
    secrets
        .read(REGIONS_KEY)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|region| !region.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
