//! `SQLite` connection pooling for the storage layer.
//!
//! Built on `r2d2` with the `r2d2_sqlite` backend. Every connection
//! runs the same init batch before it joins the pool: WAL journaling so
//! worker claims and operator reads interleave, foreign keys so
//! embedding-store rows cascade-delete with their source row, and a
//! busy timeout so claim transactions wait out writer contention
//! instead of failing fast.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool size for file-backed databases when the caller has no opinion.
pub const DEFAULT_POOL_SIZE: u32 = 8;

const BUSY_TIMEOUT_MS: u32 = 5_000;

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;\
         PRAGMA foreign_keys = ON;\
         PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
    ))
}

/// In-memory pool for tests, capped at one connection so every handle
/// sees the same database.
pub fn new_in_memory() -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::memory().with_init(init_connection);
    let pool = Pool::builder()
        .max_size(1)
        .connection_timeout(std::time::Duration::from_secs(5))
        .build(manager)?;
    Ok(pool)
}

/// File-backed pool with up to `max_connections` handles.
pub fn new_file(path: &str, max_connections: u32) -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::file(path).with_init(init_connection);
    let pool = Pool::builder()
        .max_size(max_connections)
        .connection_timeout(std::time::Duration::from_secs(5))
        .build(manager)?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_connections_enforce_foreign_keys() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER REFERENCES parent(id) ON DELETE CASCADE
             );",
        )
        .unwrap();
        assert!(conn.execute("INSERT INTO child VALUES (1, 99)", []).is_err());
    }

    #[test]
    fn file_pool_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = new_file(path.to_str().unwrap(), DEFAULT_POOL_SIZE).unwrap();
        let conn = pool.get().unwrap();
        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn file_pool_serves_concurrent_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = new_file(path.to_str().unwrap(), 4).unwrap();
        let conns: Vec<_> = (0..4).map(|_| pool.get().unwrap()).collect();
        assert_eq!(conns.len(), 4);
    }
}
