//! SQLite-backed store with a reference-counted connection handle
//!
//! One table, one file. The connection opens lazily on first use, is shared
//! by every logical operation in flight, and closes when the last handle
//! drops. A subsequent operation re-opens fresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::PATH_SEPARATOR;
use crate::error::{AgentboxError, Result};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    path TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER
)";

const DB_FILE_NAME: &str = "kv.sqlite3";

struct HandleState {
    conn: Option<Arc<Mutex<Connection>>>,
    refs: usize,
}

/// Durable key/value store over a single SQLite file.
///
/// All access goes through ref-counted handles obtained by the scope layer.
/// Rows carry an optional expiry (unix milliseconds); expired rows are
/// treated as absent and removed opportunistically.
pub struct KvStore {
    db_path: PathBuf,
    state: Mutex<HandleState>,
}

impl KvStore {
    /// Create a store rooted at `cache_dir`.
    ///
    /// If `cache_dir` already names a `.sqlite3` file it is used directly,
    /// otherwise `kv.sqlite3` inside the directory is used. With `clean`
    /// set, an existing backing file is removed before first open.
    ///
    /// # Errors
    /// `Storage` if the existing file cannot be removed.
    pub fn new(cache_dir: impl AsRef<Path>, clean: bool) -> Result<Self> {
        let cache_dir = cache_dir.as_ref();
        let db_path = if cache_dir.extension().is_some_and(|ext| ext == "sqlite3") {
            cache_dir.to_path_buf()
        } else {
            cache_dir.join(DB_FILE_NAME)
        };

        if clean && db_path.is_file() {
            debug!(path = %db_path.display(), "removing cache file on startup");
            std::fs::remove_file(&db_path)
                .map_err(|e| AgentboxError::Storage(format!("failed to clean cache file: {e}")))?;
        }

        Ok(Self { db_path, state: Mutex::new(HandleState { conn: None, refs: 0 }) })
    }

    /// Acquire a handle on the open connection, opening it if this is the
    /// first concurrent user.
    pub(crate) fn open(&self) -> Result<StoreHandle<'_>> {
        let mut state = self.state.lock();

        if state.conn.is_none() {
            if let Some(parent) = self.db_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AgentboxError::Storage(format!("failed to create cache directory: {e}"))
                })?;
            }
            let conn = Connection::open(&self.db_path)?;
            conn.execute(SCHEMA, [])?;
            // Opportunistic maintenance: drop rows that expired while the
            // store was closed.
            let purged = conn
                .execute("DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1", [
                    now_millis(),
                ])?;
            if purged > 0 {
                debug!(purged, "purged expired cache rows on open");
            }
            debug!(path = %self.db_path.display(), "opened cache store");
            state.conn = Some(Arc::new(Mutex::new(conn)));
        }

        state.refs += 1;
        let conn = match state.conn.as_ref() {
            Some(conn) => Arc::clone(conn),
            // Unreachable: populated just above while the lock is held.
            None => return Err(AgentboxError::Internal("cache handle vanished".into())),
        };

        Ok(StoreHandle { store: self, conn })
    }

    /// Path of the backing SQLite file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of handles currently outstanding.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.state.lock().refs
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.refs = state.refs.saturating_sub(1);
        if state.refs == 0 {
            // Last user out: drop our Arc so the connection closes once any
            // in-progress statement on another clone finishes.
            state.conn = None;
            debug!(path = %self.db_path.display(), "closed cache store");
        }
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("db_path", &self.db_path)
            .field("handles", &self.handle_count())
            .finish()
    }
}

/// Ref-counted view of the open store connection.
///
/// Dropping the handle releases the reference; the last release closes the
/// connection.
pub(crate) struct StoreHandle<'a> {
    store: &'a KvStore,
    conn: Arc<Mutex<Connection>>,
}

impl StoreHandle<'_> {
    /// Read a live (non-expired) row. An expired row is deleted on sight
    /// and reported as absent.
    pub(crate) fn get(&self, path: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let row: Option<(String, Option<i64>)> = conn
            .query_row("SELECT value, expires_at FROM kv WHERE path = ?1", [path], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?;

        match row {
            Some((_, Some(expires_at))) if expires_at <= now_millis() => {
                conn.execute("DELETE FROM kv WHERE path = ?1", [path])?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    pub(crate) fn set(&self, path: &str, value: &str, ttl_ms: Option<i64>) -> Result<()> {
        let expires_at = ttl_ms.map(|ttl| now_millis().saturating_add(ttl));
        self.conn.lock().execute(
            "INSERT INTO kv (path, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET value = excluded.value,
                                             expires_at = excluded.expires_at",
            params![path, value, expires_at],
        )?;
        Ok(())
    }

    pub(crate) fn delete(&self, path: &str) -> Result<()> {
        self.conn.lock().execute("DELETE FROM kv WHERE path = ?1", [path])?;
        Ok(())
    }

    /// Delete the whole subtree under `prefix`. An empty prefix clears
    /// everything.
    pub(crate) fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = match subtree_bounds(prefix) {
            Some((low, high)) => conn
                .execute("DELETE FROM kv WHERE path >= ?1 AND path < ?2", params![low, high])?,
            None => conn.execute("DELETE FROM kv", [])?,
        };
        if deleted > 0 {
            debug!(deleted, prefix, "cleared cache subtree");
        }
        Ok(deleted)
    }

    /// Enumerate live rows strictly under `prefix`, in path order.
    pub(crate) fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let now = now_millis();

        fn collect(
            stmt: &mut rusqlite::Statement<'_>,
            params: &[&dyn rusqlite::ToSql],
        ) -> Result<Vec<(String, String)>> {
            let mapped = stmt.query_map(params, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut out = Vec::new();
            for row in mapped {
                out.push(row?);
            }
            Ok(out)
        }

        match subtree_bounds(prefix) {
            Some((low, high)) => {
                let mut stmt = conn.prepare(
                    "SELECT path, value FROM kv
                     WHERE path >= ?1 AND path < ?2
                       AND (expires_at IS NULL OR expires_at > ?3)
                     ORDER BY path",
                )?;
                collect(&mut stmt, &[&low, &high, &now])
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT path, value FROM kv
                     WHERE expires_at IS NULL OR expires_at > ?1
                     ORDER BY path",
                )?;
                collect(&mut stmt, &[&now])
            }
        }
    }
}

impl Drop for StoreHandle<'_> {
    fn drop(&mut self) {
        self.store.release();
    }
}

/// Half-open encoded-path range covering every entry strictly under
/// `prefix`. `None` means the whole table (root scope).
fn subtree_bounds(prefix: &str) -> Option<(String, String)> {
    if prefix.is_empty() {
        return None;
    }
    let low = format!("{prefix}{PATH_SEPARATOR}");
    // The next byte after the separator upper-bounds every path that starts
    // with `prefix` + separator.
    let mut high = String::from(prefix);
    high.push(char::from(PATH_SEPARATOR as u8 + 1));
    Some((low, high))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
