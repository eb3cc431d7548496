//! Error types raised by the dependency engine.

use std::sync::Arc;

use instant_types::PackageId;
use thiserror::Error;

/// Errors raised while expanding chosen packages into a dependency tree.
///
/// Both variants are fatal to the build: no partial tree is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// A root or transitively referenced package is absent from the registry.
    #[error("Invalid package ID: {id}")]
    UnknownPackage { id: PackageId },

    /// The package is reachable from itself through its own dependency chain.
    #[error("Circular dependency detected: {id} has already been visited.")]
    Cycle { id: PackageId },
}

impl DependencyError {
    pub fn unknown_package(id: impl Into<PackageId>) -> Self {
        Self::UnknownPackage { id: id.into() }
    }

    pub fn cycle(id: impl Into<PackageId>) -> Self {
        Self::Cycle { id: id.into() }
    }

    /// The package identifier the error refers to.
    pub fn package_id(&self) -> &str {
        match self {
            Self::UnknownPackage { id } | Self::Cycle { id } => id,
        }
    }
}

/// Failure of a package action, as observed through the executor.
///
/// The error is cheap to clone so that every caller awaiting the same
/// single-flight handle receives the same failure.
#[derive(Debug, Clone, Error)]
#[error("action for package '{id}' failed: {cause:#}")]
pub struct ActionError {
    id: PackageId,
    cause: Arc<anyhow::Error>,
}

impl ActionError {
    pub fn new(id: impl Into<PackageId>, cause: anyhow::Error) -> Self {
        Self {
            id: id.into(),
            cause: Arc::new(cause),
        }
    }

    pub fn package_id(&self) -> &str {
        &self.id
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }

    /// Whether two errors originate from the very same failed invocation.
    pub fn same_failure(&self, other: &ActionError) -> bool {
        Arc::ptr_eq(&self.cause, &other.cause)
    }
}

/// Errors raised when configuring the bounded executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("concurrency limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: usize, max: usize },
}
