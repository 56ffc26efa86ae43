//! PostgreSQL store using sqlx
//!
//! One `PgConnection` per statement. The statement is prepared first so the
//! declared columns are known even when no row comes back.

use crate::config::PostgresConfig;
use crate::error::StoreError;
use crate::execution::store::{RelationalStore, StatementOutcome, StoreConnection};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row, Statement, TypeInfo};
use std::str::FromStr;
use tracing::{debug, warn};

pub struct PostgresStore {
    options: PgConnectOptions,
}

impl PostgresStore {
    pub fn new(config: &PostgresConfig) -> Result<Self, StoreError> {
        let options = match config {
            PostgresConfig::Url { url, .. } => PgConnectOptions::from_str(url)
                .map_err(|e| StoreError::Connect(format!("invalid DATABASE_URL: {}", e)))?,
            PostgresConfig::Params {
                host,
                port,
                dbname,
                user,
                password,
                ..
            } => PgConnectOptions::new()
                .host(host)
                .port(*port)
                .database(dbname)
                .username(user)
                .password(password),
        };

        let timeout_ms = config.statement_timeout().as_millis().to_string();
        let options = options
            .application_name("pmayg-insights")
            .options([("statement_timeout", timeout_ms.as_str())]);

        Ok(Self { options })
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        debug!(host = %self.options.get_host(), "opened postgres connection");
        Ok(Box::new(PostgresConnection { conn }))
    }
}

struct PostgresConnection {
    conn: PgConnection,
}

#[async_trait]
impl StoreConnection for PostgresConnection {
    async fn run(&mut self, sql: &str) -> Result<StatementOutcome, StoreError> {
        let statement = (&mut self.conn)
            .prepare(sql)
            .await
            .map_err(|e| StoreError::Statement(e.to_string()))?;

        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        if columns.is_empty() {
            let done = statement
                .query()
                .execute(&mut self.conn)
                .await
                .map_err(|e| StoreError::Statement(e.to_string()))?;
            return Ok(StatementOutcome::Affected(done.rows_affected()));
        }

        let fetched = statement
            .query()
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| StoreError::Statement(e.to_string()))?;

        let rows = fetched
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StatementOutcome::Rows { columns, rows })
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.close().await {
            warn!("closing postgres connection failed: {}", e);
        }
    }
}

fn decode_row(row: &PgRow) -> Result<Vec<Value>, StoreError> {
    row.columns()
        .iter()
        .map(|column| {
            decode_value(row, column.ordinal(), column.type_info().name()).map_err(|e| {
                StoreError::Decode {
                    column: column.name().to_string(),
                    message: e.to_string(),
                }
            })
        })
        .collect()
}

fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(|f| float(f as f64)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(float),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(idx)?.map(decimal),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::from)
        }
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)?
            .map(|d| Value::from(d.to_string())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)?
            .map(|ts| Value::from(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)?
            .map(|ts| Value::from(ts.to_rfc3339())),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)?
            .map(|u| Value::from(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?,
        other => match row.try_get_unchecked::<Option<String>, _>(idx) {
            Ok(text) => text.map(Value::from),
            Err(e) => {
                warn!(type_name = other, "unsupported column type, returning null: {}", e);
                None
            }
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

fn float(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// NUMERIC arrives as an exact decimal; integral values stay integers.
fn decimal(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
    }
    d.to_f64().map(float).unwrap_or_else(|| Value::from(d.to_string()))
}
