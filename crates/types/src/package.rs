//! Package metadata as declared in `package-metadata.json` manifests.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Opaque, unique identifier of a deployable package.
pub type PackageId = String;

/// Metadata declared by a package manifest.
///
/// Only `id` is required; every other field falls back to an empty value so
/// that terse legacy `instant.json` manifests still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    /// Unique package identifier used on the command line and in dependency lists.
    pub id: PackageId,
    /// Human readable package name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    /// Identifiers of the packages this package depends on, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<PackageId>,
    /// Environment variables and their default values.
    #[serde(default)]
    pub environment_variables: IndexMap<String, String>,
}

/// A discovered package: its metadata plus the directory it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub metadata: PackageMetadata,
    /// Directory containing the manifest; deployment scripts are resolved against it.
    pub path: PathBuf,
}

impl PackageRecord {
    pub fn new(metadata: PackageMetadata, path: impl Into<PathBuf>) -> Self {
        Self {
            metadata,
            path: path.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn dependencies(&self) -> &[PackageId] {
        &self.metadata.dependencies
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where the effective value of an environment variable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvSource {
    /// Default declared by the package manifest.
    Default,
    /// Loaded from a profile env file.
    File,
    /// Inherited from the invoking process.
    Process,
}

/// An environment variable handed to a package action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    /// Default value declared by the package, if any.
    pub default_value: Option<String>,
    /// Value the action will actually see.
    pub value: String,
    pub source: EnvSource,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>, source: EnvSource) -> Self {
        Self {
            key: key.into(),
            default_value: None,
            value: value.into(),
            source,
        }
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }
}
