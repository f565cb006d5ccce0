//! Embedded store implementation.
//!
//! The database lives in memory and the whole image is written back to disk
//! after every mutation. That costs O(database size) per write, which is fine
//! at the write volumes a single booking business produces.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rusqlite::backup::Progress;
use rusqlite::{params_from_iter, Connection, DatabaseName};

use booking_core::sql::StatementKind;
use booking_core::storage::{BackendMode, Result, Row, Store, StoreError, Value};

use super::conversions::{row_to_row, to_sql_value};
use super::error::{is_duplicate_column, map_rusqlite_error};
use crate::storage::schema;

/// Synchronous, file-backed store for local and offline use.
pub struct EmbeddedStore {
    conn: Mutex<Connection>,
    snapshot_path: Option<PathBuf>,
}

impl EmbeddedStore {
    /// Opens the store persisted at `data_dir/file_name`.
    ///
    /// The data directory is created if missing. An existing snapshot is
    /// loaded, otherwise the store starts empty. The schema and migrations
    /// are applied either way.
    pub fn open(data_dir: &Path, file_name: &str) -> Result<Self> {
        fs::create_dir_all(data_dir).map_err(|e| {
            StoreError::Io(format!(
                "cannot create data directory {}: {e}",
                data_dir.display()
            ))
        })?;

        let path = data_dir.join(file_name);
        let mut conn = Connection::open_in_memory().map_err(map_rusqlite_error)?;

        if path.exists() {
            conn.restore(DatabaseName::Main, &path, None::<fn(Progress)>)
                .map_err(|e| {
                    StoreError::Io(format!("cannot load snapshot {}: {e}", path.display()))
                })?;
            tracing::info!(path = %path.display(), "Loaded embedded snapshot");
        } else {
            tracing::info!(path = %path.display(), "No snapshot found, starting empty");
        }

        let store = Self {
            conn: Mutex::new(conn),
            snapshot_path: Some(path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates a store that is never written to disk.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_rusqlite_error)?;
        let store = Self {
            conn: Mutex::new(conn),
            snapshot_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Where snapshots are written, if anywhere.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves the connection itself usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(map_rusqlite_error)?;

        for migration in schema::MIGRATIONS {
            match conn.execute_batch(migration) {
                Ok(()) => tracing::debug!(migration, "Applied migration"),
                Err(e) if is_duplicate_column(&e) => {}
                Err(e) => return Err(map_rusqlite_error(e)),
            }
        }

        self.persist(&conn)
    }

    /// Writes the whole database image to a temporary file, then renames it
    /// over the snapshot so a crash never leaves a truncated image behind.
    fn persist(&self, conn: &Connection) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        conn.backup(DatabaseName::Main, &tmp, None)
            .map_err(|e| StoreError::Io(format!("cannot write snapshot {}: {e}", tmp.display())))?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Runs a statement, persisting the image afterwards. Returns the number
    /// of affected rows.
    pub fn run(&self, query: &str, params: &[Value]) -> Result<u64> {
        let conn = self.lock();
        let affected = {
            let mut stmt = conn.prepare(query).map_err(map_rusqlite_error)?;
            let params = params_from_iter(params.iter().map(to_sql_value));
            if stmt.column_count() > 0 {
                // RETURNING clauses make the statement yield rows.
                let mut rows = stmt.query(params).map_err(map_rusqlite_error)?;
                let mut count = 0u64;
                while rows.next().map_err(map_rusqlite_error)?.is_some() {
                    count += 1;
                }
                count
            } else {
                stmt.execute(params).map_err(map_rusqlite_error)? as u64
            }
        };
        self.persist(&conn)?;
        Ok(affected)
    }

    /// Runs a query and collects every row.
    ///
    /// Writes issued through here (`INSERT ... RETURNING`) are persisted too.
    pub fn query(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.lock();
        let rows = {
            let mut stmt = conn.prepare(query).map_err(map_rusqlite_error)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let mapped = stmt
                .query_map(params_from_iter(params.iter().map(to_sql_value)), |row| {
                    row_to_row(row, &columns)
                })
                .map_err(map_rusqlite_error)?;

            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row.map_err(map_rusqlite_error)?);
            }
            rows
        };

        if StatementKind::of(query).is_write() {
            self.persist(&conn)?;
        }
        Ok(rows)
    }
}

#[async_trait]
impl Store for EmbeddedStore {
    fn mode(&self) -> BackendMode {
        BackendMode::Embedded
    }

    fn execute(&self, query: &str, params: &[Value]) -> Result<()> {
        self.run(query, params).map(|_| ())
    }

    async fn execute_async(&self, query: &str, params: &[Value]) -> Result<()> {
        self.run(query, params).map(|_| ())
    }

    fn fetch_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query(query, params)
    }

    async fn fetch_all_async(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query(query, params)
    }

    async fn force_cache_refresh(&self) -> Result<()> {
        Ok(())
    }
}
