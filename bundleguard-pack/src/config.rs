//! Packaging configuration, read from `<config_dir>/bundleguard/config.toml`.
//!
//! Every key is optional. A missing or unreadable file is never fatal: the
//! loader logs and falls back to built-in defaults.

use crate::error::PackResult;
use bundleguard_license::{DEFAULT_VALID_DAYS, MAX_VALID_DAYS};
use bundleguard_patch::PatchOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CONFIG_DIR: &str = "bundleguard";
const CONFIG_FILE: &str = "config.toml";

fn default_product_name() -> String {
    "Bundle".to_string()
}

fn default_days() -> i64 {
    DEFAULT_VALID_DAYS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackConfig {
    /// Names the package directory, launcher, archive and documents.
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// Validity period when no expiry is given or the given one is invalid.
    #[serde(default = "default_days")]
    pub default_days: i64,
    #[serde(default)]
    pub patch: PatchOptions,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            default_days: default_days(),
            patch: PatchOptions::default(),
        }
    }
}

impl PackConfig {
    /// Loads from `explicit` if given, else from the platform config file.
    pub fn load(explicit: Option<&Path>) -> Self {
        match explicit.map(Path::to_path_buf).or_else(default_path) {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No config directory on this platform, using defaults");
                Self::default()
            }
        }
    }

    /// Loads from `path`, falling back to defaults if it is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Parses TOML text. A `default_days` outside `1..=MAX_VALID_DAYS` is
    /// replaced by the built-in default.
    ///
    /// # Errors
    ///
    /// [`PackError::Config`](crate::PackError::Config) on invalid TOML or
    /// mistyped keys.
    pub fn parse(contents: &str) -> PackResult<Self> {
        let mut config: Self = toml::from_str(contents)?;
        if !(1..=MAX_VALID_DAYS).contains(&config.default_days) {
            warn!(
                "default_days = {} is out of range (1..={}), using {}",
                config.default_days, MAX_VALID_DAYS, DEFAULT_VALID_DAYS
            );
            config.default_days = DEFAULT_VALID_DAYS;
        }
        Ok(config)
    }
}

/// `<config_dir>/bundleguard/config.toml`, if the platform has a config dir.
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
