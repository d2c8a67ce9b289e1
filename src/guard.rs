//! Idempotent operation guard.
//!
//! Deduplicates concurrent async operations that share an identifier: while
//! a call for an identifier is in flight, every other caller joins the same
//! future instead of starting a second one. After the operation settles,
//! the identifier is retained for a short window so rapid duplicates (two
//! admin tabs exchanging the same session token) still observe the cached
//! completion, then evicted to bound memory.
//!
//! Eviction happens whether the operation succeeded or failed, and even if
//! every caller aborts mid-flight: a detached task drives the shared future
//! to completion and clears the entry after the retention window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

/// How long a settled identifier is remembered before eviction.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

/// Deduplicates concurrent operations sharing an identifier.
///
/// `T` must be `Clone` because every joined caller receives its own copy of
/// the settled value; wrap non-cloneable errors in `Arc`.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::guard::IdempotentGuard;
///
/// # tokio_test::block_on(async {
/// let guard: IdempotentGuard<u32> = IdempotentGuard::new();
/// let value = guard.run("job-1", async { 41 + 1 }).await;
/// assert_eq!(value, 42);
/// # });
/// ```
pub struct IdempotentGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    inflight: Arc<Mutex<HashMap<String, Shared<BoxFuture<'static, T>>>>>,
    retention: Duration,
}

impl<T> Default for IdempotentGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdempotentGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a guard with the default 60-second retention window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Creates a guard with a custom retention window.
    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    /// Runs `operation` under `identifier`, joining any in-flight or
    /// recently settled call with the same identifier.
    ///
    /// The first caller's operation is the one that executes; `operation`
    /// arguments from joining callers are dropped unpolled. Within the
    /// retention window a settled result (success or failure) is returned
    /// without re-executing; afterwards the identifier is forgotten and the
    /// next call starts fresh.
    pub async fn run<F>(&self, identifier: &str, operation: F) -> T
    where
        F: std::future::Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().await;
            if let Some(existing) = inflight.get(identifier) {
                tracing::debug!(identifier, "joining deduplicated operation");
                existing.clone()
            } else {
                let shared = operation.boxed().shared();
                inflight.insert(identifier.to_string(), shared.clone());

                let map = Arc::clone(&self.inflight);
                let key = identifier.to_string();
                let retention = self.retention;
                let drive = shared.clone();
                tokio::spawn(async move {
                    // Drive to completion even if every caller aborts, then
                    // hold the settled entry for the dedup window.
                    let _ = drive.await;
                    tokio::time::sleep(retention).await;
                    map.lock().await.remove(&key);
                });

                shared
            }
        };

        shared.await
    }

    /// Returns the number of tracked identifiers (in flight or retained).
    pub async fn tracked(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

impl<T> std::fmt::Debug for IdempotentGuard<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotentGuard")
            .field("retention", &self.retention)
            .finish()
    }
}
