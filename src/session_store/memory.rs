//! In-memory session store.
//!
//! The reference [`SessionStore`] adapter, used in tests and development.
//! It follows the same lifecycle contract as a real back end: the store is
//! lazily initialized on first access behind a shared readiness guard, and
//! its migration list runs through the [`MigrationEngine`] exactly once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OnceCell, RwLock};

use crate::auth::Session;
use crate::config::ShopDomain;
use crate::session_store::migrations::{MigrationEngine, MigrationLedger};
use crate::session_store::{SessionStore, SessionStorageError, FIND_SESSIONS_LIMIT};

/// The memory adapter's "tables": session rows keyed by id.
pub type MemoryTables = RwLock<HashMap<String, Session>>;

/// Ledger of applied migration names, kept in the same "back end".
#[derive(Default)]
struct MemoryLedger {
    applied: RwLock<Option<HashSet<String>>>,
}

#[async_trait]
impl MigrationLedger for MemoryLedger {
    async fn ensure_ready(&self) -> Result<(), SessionStorageError> {
        let mut applied = self.applied.write().await;
        if applied.is_none() {
            *applied = Some(HashSet::new());
        }
        Ok(())
    }

    async fn applied_names(&self) -> Result<HashSet<String>, SessionStorageError> {
        self.applied
            .read()
            .await
            .clone()
            .ok_or_else(|| SessionStorageError::StoreMissing {
                detail: "migration ledger not initialized".to_string(),
            })
    }

    async fn record_applied(&self, name: &str) -> Result<(), SessionStorageError> {
        let mut applied = self.applied.write().await;
        applied
            .as_mut()
            .ok_or_else(|| SessionStorageError::StoreMissing {
                detail: "migration ledger not initialized".to_string(),
            })?
            .insert(name.to_string());
        Ok(())
    }
}

/// An in-memory [`SessionStore`].
///
/// # Concurrency
///
/// All operations go through a `tokio` read/write lock, so overlapping
/// async requests are safe. `store_session` is an upsert: concurrent
/// writers for the same id do not conflict, the last one wins.
///
/// # Example
///
/// ```rust
/// use shopify_app_auth::session_store::{MemorySessionStore, SessionStore};
/// use shopify_app_auth::{Session, ShopDomain};
///
/// # tokio_test::block_on(async {
/// let store = MemorySessionStore::new();
/// let shop = ShopDomain::new("my-store").unwrap();
/// let session = Session::new(
///     Session::offline_id(&shop),
///     shop,
///     "token".to_string(),
///     "read_products".parse().unwrap(),
///     false,
///     None,
/// );
///
/// store.store_session(session.clone()).await.unwrap();
/// let loaded = store.load_session(&session.id).await.unwrap();
/// assert_eq!(loaded, Some(session));
/// # });
/// ```
pub struct MemorySessionStore {
    tables: Arc<MemoryTables>,
    ledger: MemoryLedger,
    migrations: MigrationEngine<MemoryTables>,
    ready: OnceCell<()>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    /// Creates an empty store with no migrations.
    #[must_use]
    pub fn new() -> Self {
        Self::with_migrations(MigrationEngine::new())
    }

    /// Creates a store with a custom migration list, applied lazily on
    /// first access.
    #[must_use]
    pub fn with_migrations(migrations: MigrationEngine<MemoryTables>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            ledger: MemoryLedger::default(),
            migrations,
            ready: OnceCell::new(),
        }
    }

    /// Waits for lazy initialization, running pending migrations once.
    ///
    /// Concurrent early callers all await the same initialization instead
    /// of each starting their own.
    async fn ensure_ready(&self) -> Result<(), SessionStorageError> {
        self.ready
            .get_or_try_init(|| async {
                self.migrations.run(&self.tables, &self.ledger).await?;
                Ok::<(), SessionStorageError>(())
            })
            .await?;
        Ok(())
    }

    /// Returns the number of stored sessions (test helper).
    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    /// Returns `true` when no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn store_session(&self, session: Session) -> Result<bool, SessionStorageError> {
        self.ensure_ready().await?;
        self.tables
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(true)
    }

    async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionStorageError> {
        self.ensure_ready().await?;
        Ok(self.tables.read().await.get(id).cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<bool, SessionStorageError> {
        self.ensure_ready().await?;
        self.tables.write().await.remove(id);
        // Deleting an absent id still succeeds: the row is gone either way
        Ok(true)
    }

    async fn delete_sessions(&self, ids: &[String]) -> Result<bool, SessionStorageError> {
        self.ensure_ready().await?;
        let mut tables = self.tables.write().await;
        for id in ids {
            tables.remove(id);
        }
        Ok(true)
    }

    async fn find_sessions_by_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Vec<Session>, SessionStorageError> {
        self.ensure_ready().await?;
        let tables = self.tables.read().await;

        let mut sessions: Vec<Session> = tables
            .values()
            .filter(|session| session.shop == *shop)
            .cloned()
            .collect();

        // Non-expiring sessions first, then latest expiry first
        sessions.sort_by(|a, b| match (a.expires, b.expires) {
            (None, None) => a.id.cmp(&b.id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(ea), Some(eb)) => eb.cmp(&ea),
        });
        sessions.truncate(FIND_SESSIONS_LIMIT);

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthScopes;
    use crate::session_store::migrations::Migration;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shop(name: &str) -> ShopDomain {
        ShopDomain::new(name).unwrap()
    }

    fn session(id: &str, shop_name: &str) -> Session {
        Session::new(
            id.to_string(),
            shop(shop_name),
            "token".to_string(),
            AuthScopes::new(),
            false,
            None,
        )
    }

    #[tokio::test]
    async fn test_store_and_load_round_trip() {
        let store = MemorySessionStore::new();
        let s = session("offline_a.myshopify.com", "a");

        assert!(store.store_session(s.clone()).await.unwrap());
        assert_eq!(store.load_session(&s.id).await.unwrap(), Some(s));
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load_session("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_is_upsert() {
        let store = MemorySessionStore::new();
        let mut s = session("offline_a.myshopify.com", "a");
        store.store_session(s.clone()).await.unwrap();

        s.access_token = "rotated-token".to_string();
        store.store_session(s.clone()).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load_session(&s.id).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "rotated-token");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemorySessionStore::new();
        let s = session("offline_a.myshopify.com", "a");
        store.store_session(s.clone()).await.unwrap();

        assert!(store.delete_session(&s.id).await.unwrap());
        assert!(store.delete_session(&s.id).await.unwrap());
        assert_eq!(store.load_session(&s.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_sessions_batch() {
        let store = MemorySessionStore::new();
        store.store_session(session("one", "a")).await.unwrap();
        store.store_session(session("two", "a")).await.unwrap();
        store.store_session(session("three", "b")).await.unwrap();

        let deleted = store
            .delete_sessions(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert!(deleted);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_sessions_by_shop_exact_match_only() {
        let store = MemorySessionStore::new();
        store
            .store_session(session("offline_aa.myshopify.com", "aa"))
            .await
            .unwrap();
        // Shop whose id shares a prefix with the other shop's id
        store
            .store_session(session("offline_aa-b.myshopify.com", "aa-b"))
            .await
            .unwrap();

        let found = store.find_sessions_by_shop(&shop("aa")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].shop.as_ref(), "aa.myshopify.com");
    }

    #[tokio::test]
    async fn test_find_sessions_ordered_by_expires_descending() {
        let store = MemorySessionStore::new();
        let now = Utc::now();

        let mut soon = session("soon", "a");
        soon.expires = Some(now + Duration::hours(1));
        let mut later = session("later", "a");
        later.expires = Some(now + Duration::hours(5));
        let never = session("never", "a");

        store.store_session(soon).await.unwrap();
        store.store_session(later).await.unwrap();
        store.store_session(never).await.unwrap();

        let found = store.find_sessions_by_shop(&shop("a")).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["never", "later", "soon"]);
    }

    #[tokio::test]
    async fn test_find_sessions_bounded() {
        let store = MemorySessionStore::new();
        for i in 0..40 {
            store
                .store_session(session(&format!("id-{i}"), "a"))
                .await
                .unwrap();
        }

        let found = store.find_sessions_by_shop(&shop("a")).await.unwrap();
        assert_eq!(found.len(), FIND_SESSIONS_LIMIT);
    }

    #[tokio::test]
    async fn test_migrations_run_lazily_and_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut engine = MigrationEngine::new();
        let c = Arc::clone(&counter);
        engine.register(Migration::new("seed", move |_tables: Arc<MemoryTables>| {
            let c = Arc::clone(&c);
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }));

        let store = MemorySessionStore::with_migrations(engine);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // First access initializes; later accesses do not re-run
        store.load_session("x").await.unwrap();
        store.load_session("y").await.unwrap();
        store.store_session(session("s", "a")).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_initializes_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut engine = MigrationEngine::new();
        let c = Arc::clone(&counter);
        engine.register(Migration::new("slow-init", move |_tables: Arc<MemoryTables>| {
            let c = Arc::clone(&c);
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }));

        let store = Arc::new(MemorySessionStore::with_migrations(engine));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.load_session("x").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
