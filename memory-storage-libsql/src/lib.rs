//! # Memory Storage - libSQL
//!
//! libSQL (Turso-compatible) storage backend for the episodic memory
//! service: a [`memory_core::StorageBackend`] implementation over three
//! tables (`episodes`, `embedding_jobs`, `narrative_traces`) plus a
//! `temporal_edges` index mirroring each episode's embedded temporal refs.
//!
//! Semantic search ranks by cosine similarity computed in Rust over every
//! `ready` embedding rather than a native vector index: libSQL's
//! `vector_top_k`/`vector_distance_cos` extension is the production path the
//! schema is shaped for (`F32_BLOB`-sized embedding column), but without a
//! way to exercise the extension's exact SQL surface here, the same
//! `memory_core::cosine_similarity` the rest of the crate already uses is
//! the safer ranking implementation. Swapping in the native index later is
//! a storage-internal change; [`memory_core::StorageBackend`] doesn't move.
//!
//! ```no_run
//! use memory_storage_libsql::LibsqlStorage;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = LibsqlStorage::connect("file:memory.db", "").await?;
//! storage.initialize_schema().await?;
//! # Ok(())
//! # }
//! ```

mod row;
pub mod schema;
mod storage;

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use memory_core::{Error, Result};
use tokio::sync::Mutex;
use tracing::info;

/// libSQL-backed storage. Every operation serializes through a single
/// connection: local SQLite files tolerate only one writer at a time, and a
/// remote Turso database pays no meaningful overhead for serialized access
/// at this service's request volume. Connection pooling (as the teacher's
/// `ConnectionPool` provides) is dropped for that reason — see `DESIGN.md`.
pub struct LibsqlStorage {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Mutex<Connection>,
}

impl LibsqlStorage {
    /// Connect to `url`, which must be `libsql://...` (remote, requires
    /// `token`), `file:...` (local), or `:memory:`.
    ///
    /// # Errors
    /// Returns [`Error::StorageUnavailable`] if the connection cannot be
    /// established, or [`Error::Validation`] if `url` uses an unsupported
    /// protocol or a remote URL is missing its token.
    pub async fn connect(url: &str, token: &str) -> Result<Self> {
        if !url.starts_with("libsql://") && !url.starts_with("file:") && url != ":memory:" {
            return Err(Error::Validation(format!(
                "unsupported database URL {url:?}: expected libsql://, file:, or :memory:"
            )));
        }
        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::Validation("remote libsql:// connections require an auth token".to_string()));
        }

        info!(url, "connecting to libSQL database");

        let db = if url.starts_with("libsql://") {
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path)
                .build()
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
        };

        let conn = db.connect().map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        Ok(Self { db: Arc::new(db), conn: Mutex::new(conn) })
    }

    /// Create every table and index, idempotently.
    ///
    /// # Errors
    /// Returns [`Error::StorageUnavailable`] if a statement fails.
    pub async fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        for statement in schema::ALL_STATEMENTS {
            conn.execute(statement, ())
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_protocol() {
        let result = LibsqlStorage::connect("http://example.com", "").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_remote_url_without_token() {
        let result = LibsqlStorage::connect("libsql://example.turso.io", "").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn connects_to_in_memory_database_and_creates_schema() {
        let storage = LibsqlStorage::connect(":memory:", "").await.expect("connect");
        storage.initialize_schema().await.expect("schema");
    }
}
