use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use instant_engine::DependencySource;
use instant_types::{PackageId, PackageRecord};
use thiserror::Error;
use tracing::{debug, warn};

use crate::discovery::{discover_manifests, load_manifest};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid manifest search pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to scan for package manifests: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("failed to read package metadata {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse package metadata for {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown package id(s): {}", ids.join(", "))]
    UnknownPackages { ids: Vec<PackageId> },
}

/// All packages known to a run, keyed by package id in discovery order.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: IndexMap<PackageId, PackageRecord>,
}

impl PackageRegistry {
    /// Discover and load every package manifest below `root`.
    pub fn discover(root: &Path) -> Result<Self, RegistryError> {
        let mut registry = PackageRegistry::default();
        for manifest in discover_manifests(root)? {
            let record = load_manifest(&manifest)?;
            debug!(package = %record.id(), path = %manifest.display(), "loaded package manifest");
            registry.insert(record);
        }
        Ok(registry)
    }

    /// Add a record; a record with the same id replaces the earlier one.
    pub fn insert(&mut self, record: PackageRecord) {
        if let Some(previous) = self.packages.get(record.id()) {
            warn!(
                package = %record.id(),
                previous = %previous.path().display(),
                replacement = %record.path().display(),
                "duplicate package id, later manifest wins"
            );
        }
        self.packages.insert(record.id().to_string(), record);
    }

    pub fn get(&self, id: &str) -> Option<&PackageRecord> {
        self.packages.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.packages.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &PackageId> {
        self.packages.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Resolve the packages a command should operate on.
    ///
    /// An empty request selects every known package. Otherwise every
    /// requested id must be known; the request order is kept.
    pub fn select(&self, requested: &[PackageId]) -> Result<Vec<PackageId>, RegistryError> {
        if requested.is_empty() {
            return Ok(self.packages.keys().cloned().collect());
        }

        let unknown: Vec<PackageId> = requested.iter().filter(|id| !self.contains(id)).cloned().collect();
        if !unknown.is_empty() {
            return Err(RegistryError::UnknownPackages { ids: unknown });
        }
        Ok(requested.to_vec())
    }
}

impl FromIterator<PackageRecord> for PackageRegistry {
    fn from_iter<I: IntoIterator<Item = PackageRecord>>(iter: I) -> Self {
        let mut registry = PackageRegistry::default();
        for record in iter {
            registry.insert(record);
        }
        registry
    }
}

impl DependencySource for PackageRegistry {
    fn dependencies(&self, id: &str) -> Option<&[PackageId]> {
        self.packages.dependencies(id)
    }
}
