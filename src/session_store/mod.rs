//! Session storage port.
//!
//! Every persistence back end (Postgres, Redis, KV, ...) implements the
//! [`SessionStore`] trait; the strategy engine only ever talks to this
//! port and never branches on a concrete back end. A reference in-memory
//! adapter is provided for tests and development.
//!
//! # Error semantics
//!
//! "Not authenticated" and "infrastructure broken" must stay
//! distinguishable: a missing session row is `Ok(None)`, while an
//! unavailable back end or missing table is an `Err` that propagates to the
//! caller as a server error rather than being treated as "no session".

pub mod memory;
pub mod migrations;

pub use memory::MemorySessionStore;
pub use migrations::{Migration, MigrationEngine, MigrationLedger};

use crate::auth::Session;
use crate::config::ShopDomain;
use async_trait::async_trait;
use thiserror::Error;

/// Maximum number of sessions returned by a shop lookup.
///
/// Bounds `find_sessions_by_shop` so a shop with pathological session churn
/// cannot trigger unbounded scans.
pub const FIND_SESSIONS_LIMIT: usize = 25;

/// Errors produced by session storage adapters.
#[derive(Debug, Error, Clone)]
pub enum SessionStorageError {
    /// The sessions table/collection does not exist yet.
    ///
    /// Distinguished from [`Backend`](Self::Backend) so callers can tell an
    /// unprovisioned store apart from a transient backend failure.
    #[error("Session store is missing or not provisioned: {detail}")]
    StoreMissing {
        /// Adapter-specific detail.
        detail: String,
    },

    /// The back end failed (connection refused, timeout, query error).
    #[error("Session storage backend error: {detail}")]
    Backend {
        /// Adapter-specific detail.
        detail: String,
    },

    /// A stored session could not be serialized or deserialized.
    #[error("Session serialization error: {detail}")]
    Serialization {
        /// Adapter-specific detail.
        detail: String,
    },

    /// A migration failed to apply.
    #[error("Migration '{name}' failed: {detail}")]
    MigrationFailed {
        /// The migration's name.
        name: String,
        /// Adapter-specific detail.
        detail: String,
    },
}

/// Storage port for [`Session`] persistence.
///
/// Implementations must be safe under many concurrent logical requests:
/// `store_session` is an upsert (last writer wins), `delete_session` is
/// idempotent, and lookups never mutate state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Upserts a session by id.
    ///
    /// Returns `true` on success. Concurrent upserts of the same id must
    /// not fail; the last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    async fn store_session(&self, session: Session) -> Result<bool, SessionStorageError>;

    /// Loads a session by id, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    /// Absence is `Ok(None)`, never an error.
    async fn load_session(&self, id: &str) -> Result<Option<Session>, SessionStorageError>;

    /// Deletes a session by id.
    ///
    /// Deleting a non-existent id is a success: the post-condition (no row)
    /// already holds.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    async fn delete_session(&self, id: &str) -> Result<bool, SessionStorageError>;

    /// Deletes a batch of sessions by id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    async fn delete_sessions(&self, ids: &[String]) -> Result<bool, SessionStorageError>;

    /// Finds sessions whose shop matches `shop` exactly.
    ///
    /// Results are ordered by `expires` descending (non-expiring sessions
    /// first) and bounded to [`FIND_SESSIONS_LIMIT`] entries.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStorageError`] when the back end is unavailable.
    async fn find_sessions_by_shop(
        &self,
        shop: &ShopDomain,
    ) -> Result<Vec<Session>, SessionStorageError>;
}
