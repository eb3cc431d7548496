//! Configuration file support.
//!
//! The file is optional YAML. A missing file yields the defaults; a malformed
//! file is an error so a typo never silently deploys with default settings.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::config_dir;
use instant_engine::DEFAULT_CONCURRENCY;
use instant_util::{expand_tilde, resolve_against};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cli::Target;

/// Test runner invoked for each package's `features` directory.
pub const DEFAULT_TEST_RUNNER: &str = "node_modules/.bin/cucumber-js";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("profile '{name}' is defined more than once")]
    DuplicateProfile { name: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InstantConfig {
    /// Directory searched for package manifests.
    #[serde(default = "default_packages_root")]
    pub packages_root: PathBuf,
    /// Maximum number of package actions running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub target: Target,
    /// Program and leading arguments that run one package's feature suite.
    #[serde(default = "default_test_runner")]
    pub test_runner: String,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    /// Directory of the file this config was loaded from; relative env files resolve against it.
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

/// Named bundle of deploy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub dev: bool,
    #[serde(default)]
    pub only: bool,
    #[serde(default)]
    pub env_files: Vec<String>,
}

impl Default for InstantConfig {
    fn default() -> Self {
        Self {
            packages_root: default_packages_root(),
            concurrency: default_concurrency(),
            target: Target::default(),
            test_runner: default_test_runner(),
            profiles: Vec::new(),
            source_dir: None,
        }
    }
}

impl InstantConfig {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .iter()
            .find(|profile| profile.name == name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.to_string() })
    }

    /// Env files of `profile`, resolved against the config file's directory.
    pub fn env_file_paths(&self, profile: &Profile) -> Vec<PathBuf> {
        let base = self.source_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        profile.env_files.iter().map(|file| resolve_against(&base, file)).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        let mut names = HashSet::new();
        for profile in &self.profiles {
            if !names.insert(profile.name.as_str()) {
                return Err(ConfigError::DuplicateProfile {
                    name: profile.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn default_packages_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_test_runner() -> String {
    DEFAULT_TEST_RUNNER.to_string()
}

/// Returns the default path for the configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var("INSTANT_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("instant").join("config.yaml")
}

/// Loads the configuration named on the command line, or the default file.
///
/// Only the default file may be absent; an explicitly named file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<InstantConfig, ConfigError> {
    match explicit {
        Some(path) => read_config(path),
        None => load_config_from_path(&default_config_path()),
    }
}

/// Loads the configuration from a specific path, falling back to defaults when it is missing.
pub fn load_config_from_path(path: &Path) -> Result<InstantConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(InstantConfig::default());
    }
    read_config(path)
}

fn read_config(path: &Path) -> Result<InstantConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: InstantConfig = if content.trim().is_empty() {
        InstantConfig::default()
    } else {
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };
    config.source_dir = path.parent().map(Path::to_path_buf);
    config.validate()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "loaded config");
    Ok(config)
}
