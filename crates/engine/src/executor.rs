//! Bounded, deduplicating execution of package actions.
//!
//! [`BoundedExecutor`] decorates a base action so that
//! - the base action runs at most once per package identifier for the
//!   lifetime of the executor; later or concurrent callers await the same
//!   shared handle and observe the same outcome, failures included;
//! - at most `limit` base actions are incomplete at any moment.
//!
//! Admission goes through a counting semaphore. A permit is acquired right
//! before the base action is invoked and released when it completes, so a
//! woken waiter can only proceed once a slot is actually free.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use instant_types::PackageId;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{ActionError, ExecutorError};

/// Outcome of a decorated action.
pub type ActionOutcome<T> = Result<T, ActionError>;

type SharedOutcome<T> = Shared<BoxFuture<'static, ActionOutcome<T>>>;

/// Default number of package actions allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Single-flight, concurrency limited wrapper around a package action.
///
/// One executor is meant to serve one run; nothing is shared between
/// instances.
pub struct BoundedExecutor<F, T> {
    action: Arc<F>,
    limit: usize,
    permits: Arc<Semaphore>,
    /// Handle per requested package, kept after completion.
    handles: Mutex<HashMap<PackageId, SharedOutcome<T>>>,
}

impl<F, Fut, T> BoundedExecutor<F, T>
where
    F: Fn(PackageId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Wrap `action` so that at most `limit` invocations are in flight.
    pub fn new(action: F, limit: usize) -> Result<Self, ExecutorError> {
        if limit == 0 || limit > Semaphore::MAX_PERMITS {
            return Err(ExecutorError::InvalidLimit {
                limit,
                max: Semaphore::MAX_PERMITS,
            });
        }

        Ok(Self {
            action: Arc::new(action),
            limit,
            permits: Arc::new(Semaphore::new(limit)),
            handles: Mutex::new(HashMap::new()),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of base actions currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    /// Run the action for `id`, or join the invocation already made for it.
    pub async fn run(&self, id: PackageId) -> ActionOutcome<T> {
        let handle = {
            let mut handles = self.handles.lock().await;
            match handles.get(&id) {
                Some(existing) => {
                    debug!(package = %id, "returning existing handle");
                    existing.clone()
                }
                None => {
                    let handle = self.start(id.clone());
                    handles.insert(id, handle.clone());
                    handle
                }
            }
        };
        handle.await
    }

    /// Number of distinct packages requested so far.
    pub async fn requested(&self) -> usize {
        self.handles.lock().await.len()
    }

    fn start(&self, id: PackageId) -> SharedOutcome<T> {
        let action = Arc::clone(&self.action);
        let permits = Arc::clone(&self.permits);

        async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|error| ActionError::new(id.clone(), anyhow::Error::new(error)))?;

            info!(package = %id, "executing action");
            let outcome = action(id.clone()).await.map_err(|cause| ActionError::new(id.clone(), cause));
            match &outcome {
                Ok(_) => info!(package = %id, "action finished"),
                Err(error) => warn!(package = %id, error = %error, "action failed"),
            }
            outcome
        }
        .boxed()
        .shared()
    }
}

/// Decorate `action` with single-flight memoization and a concurrency limit.
///
/// The returned closure has the same shape as the base action and can be
/// handed straight to [`walk_dependency_tree`](crate::walk::walk_dependency_tree).
pub fn bounded_action<F, Fut, T>(
    action: F,
    limit: usize,
) -> Result<impl Fn(PackageId) -> BoxFuture<'static, ActionOutcome<T>> + Clone + Send + Sync, ExecutorError>
where
    F: Fn(PackageId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    let executor = Arc::new(BoundedExecutor::new(action, limit)?);
    Ok(move |id: PackageId| {
        let executor = Arc::clone(&executor);
        async move { executor.run(id).await }.boxed()
    })
}
