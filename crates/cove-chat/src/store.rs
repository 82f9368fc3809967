use std::sync::Arc;

use tokio::sync::RwLock;

/// Lifecycle of a scoped collection fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Errored,
}

/// A shared, phase-tracked collection of rows for one scope.
///
/// Cloning the store clones the handle, not the data — the session and the
/// reconciler's fold task see the same collection. A full fetch replaces the
/// contents wholesale via [`begin`]/[`complete`]; everything incremental
/// goes through [`apply`], the only other mutation entry point.
///
/// [`begin`]: Store::begin
/// [`complete`]: Store::complete
/// [`apply`]: Store::apply
pub struct Store<T> {
    inner: Arc<RwLock<StoreInner<T>>>,
}

struct StoreInner<T> {
    items: Vec<T>,
    phase: Phase,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                items: Vec::new(),
                phase: Phase::Idle,
            })),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.inner.read().await.phase
    }

    /// Snapshot of the current collection.
    pub async fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.inner.read().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    /// Start a fetch: the old collection is discarded up front.
    pub async fn begin(&self) {
        let mut inner = self.inner.write().await;
        inner.phase = Phase::Loading;
        inner.items.clear();
    }

    /// Fetch succeeded: replace the collection wholesale.
    pub async fn complete(&self, items: Vec<T>) {
        let mut inner = self.inner.write().await;
        inner.items = items;
        inner.phase = Phase::Ready;
    }

    /// Fetch failed: the phase flips, the collection stays as [`begin`] left
    /// it.
    ///
    /// [`begin`]: Store::begin
    pub async fn fail(&self) {
        self.inner.write().await.phase = Phase::Errored;
    }

    /// Apply an incremental mutation. The closure runs under the write lock,
    /// so folds from the feed and reads from the session serialize here.
    pub async fn apply<R>(&self, mutate: impl FnOnce(&mut Vec<T>) -> R) -> R {
        mutate(&mut self.inner.write().await.items)
    }
}
