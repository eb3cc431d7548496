//! # Instant Engine
//!
//! Expands a set of chosen packages into their dependency tree and runs a
//! per-package action over that tree in dependency order, with a cap on how
//! many actions run at once and a guarantee that each package's action runs
//! at most once per invocation.
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use instant_engine::{WalkOrder, bounded_action, build_dependency_tree, walk_dependency_tree};
//!
//! # let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
//! # runtime.block_on(async {
//! let registry: HashMap<String, Vec<String>> = HashMap::from([
//!     ("app".to_string(), vec!["db".to_string()]),
//!     ("db".to_string(), vec![]),
//! ]);
//! let tree = build_dependency_tree(&registry, ["app"])?;
//!
//! let action = bounded_action(|id: String| async move {
//!     println!("starting {id}");
//!     anyhow::Ok(())
//! }, 4)?;
//! let report = walk_dependency_tree(&tree, WalkOrder::Post, action).await;
//! assert!(report.is_success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`tree`**: builds the dependency forest, rejecting cycles and unknown packages
//! - **`walk`**: visits the forest in pre- or post-order, siblings concurrently
//! - **`executor`**: single-flight, concurrency limited wrapper around the caller's action

pub mod error;
pub mod executor;
pub mod tree;
pub mod walk;

pub use error::{ActionError, DependencyError, ExecutorError};
pub use executor::{ActionOutcome, BoundedExecutor, DEFAULT_CONCURRENCY, bounded_action};
pub use tree::{DependencyNode, DependencySource, DependencyTree, build_dependency_tree};
pub use walk::{WalkOrder, WalkReport, walk_dependency_tree};
