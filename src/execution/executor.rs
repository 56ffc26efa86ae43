//! Executor - runs one validated statement and normalizes what comes back
//!
//! Expected failures (bad SQL, lost connectivity, timeouts) are returned as
//! `QueryResult::Error` values, never raised. A connection is acquired per
//! call and released on every path before `execute` returns.

use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::execution::postgres::PostgresStore;
use crate::execution::profile::QueryProfile;
use crate::execution::result::{QueryResult, RowSet};
use crate::execution::sqlite::SqliteStore;
use crate::execution::store::{RelationalStore, StatementOutcome};
use crate::validator::ValidatedQuery;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of one `execute` call, traced at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Connected,
    Fetched,
    Acknowledged,
    Failed,
    Closed,
}

#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn RelationalStore>,
}

impl Executor {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn RelationalStore> = match config {
            DatabaseConfig::Postgres(pg) => Arc::new(PostgresStore::new(pg)?),
            DatabaseConfig::Sqlite { path } => Arc::new(SqliteStore::new(path)),
        };
        Ok(Self::new(store))
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn execute(&self, query: &ValidatedQuery) -> QueryResult {
        let started = Instant::now();
        let sql = query.as_str();
        let profile = QueryProfile::from_sql(sql);
        debug!(
            store = self.store.name(),
            sql = %sql,
            tables = ?profile.tables,
            joins = profile.join_count,
            ctes = profile.uses_ctes,
            read_only = profile.is_read_only,
            "executing statement"
        );
        transition(ExecutorState::Idle);

        let mut conn = match self.store.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                transition(ExecutorState::Failed);
                warn!(store = self.store.name(), "connect failed: {}", e);
                return QueryResult::error(e.to_string());
            }
        };
        transition(ExecutorState::Connected);

        let outcome = conn.run(sql).await;
        let (result, state) = match outcome {
            Ok(StatementOutcome::Rows { columns, rows }) => (
                QueryResult::Rows(RowSet::from_rows(columns, rows)),
                ExecutorState::Fetched,
            ),
            Ok(StatementOutcome::Affected(n)) => (QueryResult::acknowledged(n), ExecutorState::Acknowledged),
            Err(e) => {
                warn!(store = self.store.name(), "statement failed: {}", e);
                (QueryResult::error(e.to_string()), ExecutorState::Failed)
            }
        };
        transition(state);

        conn.close().await;
        transition(ExecutorState::Closed);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            QueryResult::Rows(rows) => info!(rows = rows.len(), elapsed_ms, "query returned records"),
            QueryResult::Acknowledged { rows_affected, .. } => {
                info!(rows_affected, elapsed_ms, "statement acknowledged")
            }
            QueryResult::Error { .. } => info!(elapsed_ms, "query failed"),
        }
        result
    }
}

fn transition(state: ExecutorState) {
    debug!(state = ?state, "executor state");
}
