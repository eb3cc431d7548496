//! Package registry for the Instant CLI.
//!
//! This crate discovers package manifests on disk and exposes them as a
//! lookup from package identifier to [`PackageRecord`], which the engine
//! consumes through [`DependencySource`].

pub mod discovery;
pub mod models;

pub use discovery::{LEGACY_MANIFEST_FILE, MANIFEST_FILE, MAX_NESTING_LEVEL, discover_manifests, load_manifest};
pub use instant_engine::DependencySource;
pub use instant_types::PackageRecord;
pub use models::{PackageRegistry, RegistryError};
