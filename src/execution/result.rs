//! Query Result - normalized output of one executed statement
//!
//! Consumed by the chart selector and the narrators. Built once by the
//! executor and never mutated afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One result row, keyed by column name in declared column order.
pub type Record = serde_json::Map<String, Value>;

/// Records of a statement that produced a result set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl RowSet {
    /// Zips raw rows with the declared columns. Rows shorter than the column
    /// list are padded with nulls. A repeated column name gets a numeric
    /// suffix (`name`, `name_2`) so every column keeps its own key.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = unique_columns(columns);
        let records = rows
            .into_iter()
            .map(|row| {
                let mut values = row.into_iter();
                columns
                    .iter()
                    .map(|col| (col.clone(), values.next().unwrap_or(Value::Null)))
                    .collect::<Record>()
            })
            .collect();
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one column, top to bottom. Missing cells read as null.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records
            .iter()
            .map(move |record| record.get(column).unwrap_or(&Value::Null))
    }
}

fn unique_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(columns.len());
    columns
        .into_iter()
        .map(|column| {
            let name = if seen.contains(&column) {
                let mut n = 2;
                while seen.contains(&format!("{}_{}", column, n)) {
                    n += 1;
                }
                format!("{}_{}", column, n)
            } else {
                column
            };
            seen.insert(name.clone());
            name
        })
        .collect()
}

impl Serialize for RowSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RowSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<Record>::deserialize(deserializer)?;
        let columns = records
            .first()
            .map(|record| record.keys().cloned().collect())
            .unwrap_or_default();
        Ok(Self { columns, records })
    }
}

/// Standardized result of one statement: records, a write acknowledgment or
/// an error. Serializes to `[{...}]`, `{"status", "rows_affected"}` or
/// `{"error"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Rows(RowSet),
    Acknowledged { status: String, rows_affected: u64 },
    Error { error: String },
}

impl QueryResult {
    pub fn acknowledged(rows_affected: u64) -> Self {
        QueryResult::Acknowledged {
            status: "success".to_string(),
            rows_affected,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        QueryResult::Error {
            error: message.into(),
        }
    }

    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            QueryResult::Error { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error { .. })
    }

    /// True for an error or a result set without records.
    pub fn has_no_data(&self) -> bool {
        match self {
            QueryResult::Rows(rows) => rows.is_empty(),
            QueryResult::Acknowledged { .. } => false,
            QueryResult::Error { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RowSet {
        RowSet::from_rows(
            vec!["indicator".to_string(), "total".to_string()],
            vec![vec![json!("SC"), json!(120.5)], vec![json!("ST")]],
        )
    }

    #[test]
    fn test_records_keep_column_order() {
        let rows = sample();
        assert_eq!(rows.len(), 2);
        let keys: Vec<_> = rows.records()[0].keys().cloned().collect();
        assert_eq!(keys, vec!["indicator", "total"]);
        assert_eq!(rows.records()[1]["total"], Value::Null);
        assert_eq!(
            rows.column_values("total").cloned().collect::<Vec<_>>(),
            vec![json!(120.5), Value::Null]
        );
    }

    #[test]
    fn test_repeated_column_names_keep_every_value() {
        let rows = RowSet::from_rows(
            vec!["name".to_string(), "name".to_string(), "total".to_string(), "name".to_string()],
            vec![vec![json!("PUNE"), json!("KHED"), json!(3), json!("X")]],
        );
        assert_eq!(rows.columns(), ["name", "name_2", "total", "name_3"]);
        let record = &rows.records()[0];
        assert_eq!(record.len(), rows.columns().len());
        assert_eq!(record["name"], json!("PUNE"));
        assert_eq!(record["name_2"], json!("KHED"));
        assert_eq!(record["name_3"], json!("X"));
    }

    #[test]
    fn test_serialized_shapes() {
        let rows = QueryResult::Rows(sample());
        assert_eq!(
            serde_json::to_string(&rows).unwrap(),
            r#"[{"indicator":"SC","total":120.5},{"indicator":"ST","total":null}]"#
        );
        assert_eq!(
            serde_json::to_value(QueryResult::acknowledged(3)).unwrap(),
            json!({"status": "success", "rows_affected": 3})
        );
        assert_eq!(
            serde_json::to_value(QueryResult::error("boom")).unwrap(),
            json!({"error": "boom"})
        );
        assert_eq!(
            serde_json::to_string(&QueryResult::Rows(RowSet::default())).unwrap(),
            "[]"
        );
    }

    #[test]
    fn test_deserialize_untagged() {
        let parsed: QueryResult = serde_json::from_str(r#"{"error":"relation does not exist"}"#).unwrap();
        assert_eq!(parsed.error_message(), Some("relation does not exist"));

        let parsed: QueryResult = serde_json::from_str(r#"[{"b":1,"a":2}]"#).unwrap();
        assert_eq!(parsed.rows().unwrap().columns(), ["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_no_data() {
        assert!(QueryResult::Rows(RowSet::default()).has_no_data());
        assert!(QueryResult::error("x").has_no_data());
        assert!(!QueryResult::acknowledged(0).has_no_data());
        assert!(!QueryResult::Rows(sample()).has_no_data());
    }
}
