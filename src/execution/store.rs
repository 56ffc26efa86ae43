//! Relational store contract
//!
//! The executor only sees these two traits. A store hands out a fresh
//! connection per statement; pooling can be added behind `connect` without
//! the executor noticing.

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

/// What a single statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// The statement declared a result set (possibly with zero rows).
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// No result set; the change is committed.
    Affected(u64),
}

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Backend name for logs ("postgres", "sqlite", ...)
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;
}

#[async_trait]
pub trait StoreConnection: Send {
    /// Runs exactly one statement and materializes its outcome.
    async fn run(&mut self, sql: &str) -> Result<StatementOutcome, StoreError>;

    /// Releases the connection. Dropping it must release it as well.
    async fn close(self: Box<Self>);
}
