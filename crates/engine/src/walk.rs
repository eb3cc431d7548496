//! Ordered traversal of a dependency tree.
//!
//! All children of a node are visited concurrently. The walker neither limits
//! concurrency nor deduplicates: a package reached through several branches is
//! handed to the action once per occurrence.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use futures_util::future::{BoxFuture, FutureExt, join_all};
use indexmap::IndexMap;
use instant_types::PackageId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ActionError;
use crate::tree::{DependencyNode, DependencyTree};

/// When a package's action runs relative to its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkOrder {
    /// The action for a package starts before any of its dependencies' actions.
    Pre,
    /// The action for a package starts only after all of its dependencies' actions completed.
    Post,
}

impl fmt::Display for WalkOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkOrder::Pre => f.write_str("pre"),
            WalkOrder::Post => f.write_str("post"),
        }
    }
}

impl FromStr for WalkOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pre" => Ok(WalkOrder::Pre),
            "post" => Ok(WalkOrder::Post),
            other => Err(format!("unknown walk order '{other}', expected 'pre' or 'post'")),
        }
    }
}

/// Outcome of a full walk.
#[derive(Debug, Clone, Default)]
pub struct WalkReport {
    /// Number of times the walker invoked the action, duplicates included.
    pub invocations: usize,
    /// One failure per failing package, in the order they were first observed.
    pub failures: IndexMap<PackageId, ActionError>,
}

impl WalkReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &PackageId> {
        self.failures.keys()
    }

    fn record<T>(&mut self, id: &PackageId, outcome: Result<T, ActionError>) {
        self.invocations += 1;
        if let Err(error) = outcome {
            debug!(package = %id, error = %error, "recording action failure");
            self.failures.entry(id.clone()).or_insert(error);
        }
    }

    fn merge(mut self, other: WalkReport) -> WalkReport {
        self.invocations += other.invocations;
        for (id, error) in other.failures {
            self.failures.entry(id).or_insert(error);
        }
        self
    }
}

/// Walk `tree`, invoking `action` for every package occurrence in `order`.
///
/// A failed action never cancels the walk: the remaining branches, and in
/// [`WalkOrder::Post`] the dependents of the failed package, still run. The
/// failures are returned in the report.
pub async fn walk_dependency_tree<F, Fut, T>(tree: &DependencyTree, order: WalkOrder, action: F) -> WalkReport
where
    F: Fn(PackageId) -> Fut + Sync,
    Fut: Future<Output = Result<T, ActionError>> + Send,
    T: Send,
{
    debug!(order = %order, roots = tree.roots().len(), "walking dependency tree");
    visit_children(tree.roots(), order, &action).await
}

fn visit_children<'a, F, Fut, T>(node: &'a DependencyNode, order: WalkOrder, action: &'a F) -> BoxFuture<'a, WalkReport>
where
    F: Fn(PackageId) -> Fut + Sync,
    Fut: Future<Output = Result<T, ActionError>> + Send,
    T: Send,
{
    async move {
        let branches = node.iter().map(|(id, child)| visit_branch(id, child, order, action));
        join_all(branches).await.into_iter().fold(WalkReport::default(), WalkReport::merge)
    }
    .boxed()
}

async fn visit_branch<F, Fut, T>(id: &PackageId, node: &DependencyNode, order: WalkOrder, action: &F) -> WalkReport
where
    F: Fn(PackageId) -> Fut + Sync,
    Fut: Future<Output = Result<T, ActionError>> + Send,
    T: Send,
{
    let mut report = WalkReport::default();
    if order == WalkOrder::Pre {
        report.record(id, action(id.clone()).await);
    }
    report = report.merge(visit_children(node, order, action).await);
    if order == WalkOrder::Post {
        report.record(id, action(id.clone()).await);
    }
    report
}
