//! SQLite store backed by rusqlite. Used for local databases and tests.

use crate::error::StoreError;
use crate::execution::store::{RelationalStore, StatementOutcome, StoreConnection};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RelationalStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let path = self.path.clone();
        // Never create a database file as a side effect of a query.
        let conn = tokio::task::spawn_blocking(move || {
            Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
        .map_err(|e| StoreError::Connect(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), "opened sqlite connection");
        Ok(Box::new(SqliteConnection {
            conn: Arc::new(Mutex::new(conn)),
        }))
    }
}

struct SqliteConnection {
    conn: Arc<Mutex<Connection>>,
}

#[async_trait]
impl StoreConnection for SqliteConnection {
    async fn run(&mut self, sql: &str) -> Result<StatementOutcome, StoreError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Runtime("sqlite connection lock poisoned".to_string()))?;
            run_statement(&conn, &sql)
        })
        .await
        .map_err(|e| StoreError::Runtime(e.to_string()))?
    }

    async fn close(self: Box<Self>) {
        // Dropping the last handle closes the sqlite connection.
        drop(self);
    }
}

fn run_statement(conn: &Connection, sql: &str) -> Result<StatementOutcome, StoreError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| StoreError::Statement(e.to_string()))?;

    if stmt.column_count() == 0 {
        let affected = stmt
            .execute([])
            .map_err(|e| StoreError::Statement(e.to_string()))?;
        return Ok(StatementOutcome::Affected(affected as u64));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt
        .query([])
        .map_err(|e| StoreError::Statement(e.to_string()))?;
    while let Some(row) = cursor
        .next()
        .map_err(|e| StoreError::Statement(e.to_string()))?
    {
        let mut values = Vec::with_capacity(width);
        for (idx, column) in columns.iter().enumerate() {
            let value = row.get_ref(idx).map_err(|e| StoreError::Decode {
                column: column.clone(),
                message: e.to_string(),
            })?;
            values.push(to_json(value));
        }
        rows.push(values);
    }

    Ok(StatementOutcome::Rows { columns, rows })
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for b in bytes {
                let _ = write!(hex, "{:02x}", b);
            }
            Value::String(hex)
        }
    }
}
