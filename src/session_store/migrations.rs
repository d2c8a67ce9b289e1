//! Generic, idempotent schema/data migration engine.
//!
//! Storage adapters ship an ordered list of named migrations. The engine
//! tracks which names have been applied (persisted in the same back end,
//! via the [`MigrationLedger`] port) and runs pending ones in declaration
//! order exactly once per store lifetime.
//!
//! # Rules
//!
//! - The migration list is append-only: a name, once applied, is never
//!   re-run, and new migrations are added after existing ones.
//! - Migrations run strictly in declaration order. If one fails, the run
//!   stops: later migrations are not attempted, earlier ones stay recorded,
//!   and nothing is rolled back.
//! - A store that predates ledger tracking may already be in a migration's
//!   target state. The first run against such a store (empty ledger) may
//!   probe actual schema state and record a migration as applied without
//!   executing it.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::session_store::SessionStorageError;

/// Persistence port for the set of applied migration names.
///
/// Implemented by each storage adapter against its own back end (a
/// dedicated table, key, or document).
#[async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Ensures the persistence area for applied names exists, creating it
    /// if missing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    async fn ensure_ready(&self) -> Result<(), SessionStorageError>;

    /// Returns the set of migration names already applied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    async fn applied_names(&self) -> Result<HashSet<String>, SessionStorageError>;

    /// Records a migration name as applied.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    async fn record_applied(&self, name: &str) -> Result<(), SessionStorageError>;
}

/// Async closure applying one migration against a shared connection.
pub type MigrationFn<C> =
    Box<dyn Fn(Arc<C>) -> BoxFuture<'static, Result<(), SessionStorageError>> + Send + Sync>;

/// Async closure probing whether a migration's target state already holds.
pub type ProbeFn<C> =
    Box<dyn Fn(Arc<C>) -> BoxFuture<'static, Result<bool, SessionStorageError>> + Send + Sync>;

/// One named migration.
pub struct Migration<C> {
    name: String,
    run: MigrationFn<C>,
    probe: Option<ProbeFn<C>>,
}

impl<C> Migration<C> {
    /// Creates a migration with the given name and apply function.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        run: impl Fn(Arc<C>) -> BoxFuture<'static, Result<(), SessionStorageError>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
            probe: None,
        }
    }

    /// Attaches a schema probe consulted on the first run against a store
    /// with an empty ledger. When the probe reports the target state
    /// already holds, the migration is recorded without executing.
    #[must_use]
    pub fn with_probe(
        mut self,
        probe: impl Fn(Arc<C>) -> BoxFuture<'static, Result<bool, SessionStorageError>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Returns the migration's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C> std::fmt::Debug for Migration<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("has_probe", &self.probe.is_some())
            .finish()
    }
}

/// Ordered migration runner.
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = MigrationEngine::new();
/// engine.register(Migration::new("create-sessions-table", |conn| {
///     Box::pin(async move { create_table(&conn).await })
/// }));
/// engine.run(&connection, &ledger).await?;
/// ```
pub struct MigrationEngine<C> {
    migrations: Vec<Migration<C>>,
}

impl<C> Default for MigrationEngine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MigrationEngine<C> {
    /// Creates an engine with no migrations.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    /// Appends a migration to the ordered list.
    pub fn register(&mut self, migration: Migration<C>) {
        self.migrations.push(migration);
    }

    /// Returns the registered migration names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.migrations.iter().map(Migration::name).collect()
    }

    /// Runs all pending migrations in declaration order.
    ///
    /// Returns the number of migrations that were executed (recorded-only
    /// probe short-circuits do not count).
    ///
    /// # Errors
    ///
    /// Returns the first migration failure, wrapped as
    /// [`SessionStorageError::MigrationFailed`]. Earlier migrations remain
    /// recorded; later ones are not attempted.
    pub async fn run(
        &self,
        conn: &Arc<C>,
        ledger: &dyn MigrationLedger,
    ) -> Result<usize, SessionStorageError> {
        ledger.ensure_ready().await?;
        let applied = ledger.applied_names().await?;
        let fresh_ledger = applied.is_empty();

        let mut executed = 0;
        for migration in &self.migrations {
            if applied.contains(&migration.name) {
                continue;
            }

            // A pre-existing store may already be in the target state even
            // though the ledger has no record of it yet.
            if fresh_ledger {
                if let Some(probe) = &migration.probe {
                    if probe(Arc::clone(conn)).await? {
                        tracing::debug!(name = %migration.name, "migration already satisfied");
                        ledger.record_applied(&migration.name).await?;
                        continue;
                    }
                }
            }

            tracing::debug!(name = %migration.name, "applying migration");
            (migration.run)(Arc::clone(conn)).await.map_err(|e| {
                SessionStorageError::MigrationFailed {
                    name: migration.name.clone(),
                    detail: e.to_string(),
                }
            })?;
            ledger.record_applied(&migration.name).await?;
            executed += 1;
        }

        Ok(executed)
    }
}

impl<C> std::fmt::Debug for MigrationEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("migrations", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct TestLedger {
        applied: RwLock<HashSet<String>>,
    }

    #[async_trait]
    impl MigrationLedger for TestLedger {
        async fn ensure_ready(&self) -> Result<(), SessionStorageError> {
            Ok(())
        }

        async fn applied_names(&self) -> Result<HashSet<String>, SessionStorageError> {
            Ok(self.applied.read().await.clone())
        }

        async fn record_applied(&self, name: &str) -> Result<(), SessionStorageError> {
            self.applied.write().await.insert(name.to_string());
            Ok(())
        }
    }

    fn counting_migration(name: &str, counter: Arc<AtomicUsize>) -> Migration<()> {
        Migration::new(name, move |_conn| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_each_migration_runs_exactly_once_across_engine_instances() {
        let ledger = TestLedger::default();
        let conn = Arc::new(());
        let counter = Arc::new(AtomicUsize::new(0));

        let build_engine = |counter: &Arc<AtomicUsize>| {
            let mut engine = MigrationEngine::new();
            for name in ["a", "b", "c"] {
                engine.register(counting_migration(name, Arc::clone(counter)));
            }
            engine
        };

        let executed = build_engine(&counter).run(&conn, &ledger).await.unwrap();
        assert_eq!(executed, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        // A fresh engine instance with the same list re-executes nothing
        let executed = build_engine(&counter).run(&conn, &ledger).await.unwrap();
        assert_eq!(executed, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_migrations_run_in_declaration_order() {
        let ledger = TestLedger::default();
        let conn = Arc::new(());
        let order = Arc::new(RwLock::new(Vec::new()));

        let mut engine = MigrationEngine::new();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            engine.register(Migration::new(name, move |_conn| {
                let order = Arc::clone(&order);
                Box::pin(async move {
                    order.write().await.push(name);
                    Ok(())
                })
            }));
        }

        engine.run(&conn, &ledger).await.unwrap();
        assert_eq!(*order.read().await, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_failure_stops_run_and_keeps_earlier_applied() {
        let ledger = TestLedger::default();
        let conn = Arc::new(());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut engine = MigrationEngine::new();
        engine.register(counting_migration("ok-one", Arc::clone(&counter)));
        engine.register(Migration::new("broken", |_conn| {
            Box::pin(async {
                Err(SessionStorageError::Backend {
                    detail: "boom".to_string(),
                })
            })
        }));
        engine.register(counting_migration("never-reached", Arc::clone(&counter)));

        let result = engine.run(&conn, &ledger).await;
        assert!(matches!(
            result,
            Err(SessionStorageError::MigrationFailed { ref name, .. }) if name == "broken"
        ));

        let applied = ledger.applied_names().await.unwrap();
        assert!(applied.contains("ok-one"));
        assert!(!applied.contains("broken"));
        assert!(!applied.contains("never-reached"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_short_circuits_on_fresh_ledger() {
        let ledger = TestLedger::default();
        let conn = Arc::new(());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut engine = MigrationEngine::new();
        let migration = counting_migration("already-done", Arc::clone(&counter))
            .with_probe(|_conn| Box::pin(async { Ok(true) }));
        engine.register(migration);

        let executed = engine.run(&conn, &ledger).await.unwrap();
        assert_eq!(executed, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(ledger
            .applied_names()
            .await
            .unwrap()
            .contains("already-done"));
    }

    #[tokio::test]
    async fn test_probe_ignored_once_ledger_has_entries() {
        let ledger = TestLedger::default();
        let conn = Arc::new(());
        ledger.record_applied("earlier").await.unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut engine = MigrationEngine::new();
        // Probe claims the state holds, but the ledger is not fresh, so the
        // migration must actually run.
        let migration = counting_migration("new-one", Arc::clone(&counter))
            .with_probe(|_conn| Box::pin(async { Ok(true) }));
        engine.register(migration);

        let executed = engine.run(&conn, &ledger).await.unwrap();
        assert_eq!(executed, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_appending_migrations_is_incremental() {
        let ledger = TestLedger::default();
        let conn = Arc::new(());
        let counter = Arc::new(AtomicUsize::new(0));

        let mut engine = MigrationEngine::new();
        engine.register(counting_migration("a", Arc::clone(&counter)));
        engine.run(&conn, &ledger).await.unwrap();

        // Later release appends "b"; only "b" executes
        let mut engine = MigrationEngine::new();
        engine.register(counting_migration("a", Arc::clone(&counter)));
        engine.register(counting_migration("b", Arc::clone(&counter)));
        let executed = engine.run(&conn, &ledger).await.unwrap();

        assert_eq!(executed, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
