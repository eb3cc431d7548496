//! Shared type definitions for the Instant CLI.
//!
//! These types describe deployable packages as they appear on disk and are
//! consumed by the registry, the engine, and the command line front-end.

pub mod package;

pub use package::{EnvSource, EnvVar, PackageId, PackageMetadata, PackageRecord};
