//! Locating and parsing package manifests.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, glob_with};
use instant_types::{PackageMetadata, PackageRecord};
use tracing::debug;

use crate::models::RegistryError;

/// Manifest file name of a package.
pub const MANIFEST_FILE: &str = "package-metadata.json";
/// Manifest file name used by older packages; still honored.
pub const LEGACY_MANIFEST_FILE: &str = "instant.json";
/// Deepest directory level below the search root that is searched.
pub const MAX_NESTING_LEVEL: usize = 5;

/// Find every manifest below `root`, one to [`MAX_NESTING_LEVEL`] directories deep.
///
/// Levels are searched shallowest first; within a level current manifests
/// come before legacy ones, each in lexical path order. Hidden directories
/// below `root` are not searched.
pub fn discover_manifests(root: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let escaped_root = Pattern::escape(&root.to_string_lossy());
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let mut manifests = Vec::new();

    for level in 1..=MAX_NESTING_LEVEL {
        let wildcard_dirs = vec!["*"; level].join("/");
        for file_name in [MANIFEST_FILE, LEGACY_MANIFEST_FILE] {
            let pattern = format!("{escaped_root}/{wildcard_dirs}/{file_name}");
            let entries = glob_with(&pattern, options).map_err(|source| RegistryError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            for entry in entries {
                manifests.push(entry?);
            }
        }
    }

    debug!(root = %root.display(), count = manifests.len(), "discovered package manifests");
    Ok(manifests)
}

/// Parse the manifest at `path` into a record rooted at the manifest's directory.
pub fn load_manifest(path: &Path) -> Result<PackageRecord, RegistryError> {
    let content = fs::read_to_string(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata: PackageMetadata = serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(PackageRecord::new(metadata, directory))
}
