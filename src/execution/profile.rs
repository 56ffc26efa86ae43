//! Query Profile - characteristics of a statement before it runs
//!
//! Parsed with sqlparser for structured logging only. The validator remains
//! the safety gate; a profile never blocks execution.

use serde::{Deserialize, Serialize};
use sqlparser::ast::{Query, SetExpr, Statement, TableFactor};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryProfile {
    /// Whether the text parsed; `false` means the fields came from the heuristic
    pub parsed: bool,
    pub statement_count: usize,
    pub uses_ctes: bool,
    pub join_count: usize,
    /// Base tables referenced, CTE names excluded
    pub tables: BTreeSet<String>,
    pub is_read_only: bool,
}

impl QueryProfile {
    pub fn from_sql(sql: &str) -> Self {
        match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
            Ok(statements) => {
                let mut profile = Self {
                    parsed: true,
                    statement_count: statements.len(),
                    is_read_only: true,
                    ..Self::default()
                };
                let mut ctes = BTreeSet::new();
                for statement in &statements {
                    match statement {
                        Statement::Query(query) => profile.analyze_query(query, &mut ctes),
                        _ => profile.is_read_only = false,
                    }
                }
                profile.tables.retain(|t| !ctes.contains(t));
                profile
            }
            Err(e) => {
                tracing::debug!("SQL parsing failed: {}, using heuristic profile", e);
                Self::from_sql_heuristic(sql)
            }
        }
    }

    fn from_sql_heuristic(sql: &str) -> Self {
        let lowered = sql.to_lowercase();
        let is_read_only = ["insert", "update", "delete", "create", "drop", "alter", "truncate"]
            .iter()
            .all(|kw| !lowered.contains(kw));

        Self {
            parsed: false,
            statement_count: lowered.split(';').filter(|s| !s.trim().is_empty()).count(),
            uses_ctes: lowered.trim_start().starts_with("with"),
            join_count: lowered.matches(" join ").count(),
            tables: BTreeSet::new(),
            is_read_only,
        }
    }

    fn analyze_query(&mut self, query: &Query, ctes: &mut BTreeSet<String>) {
        if let Some(with) = &query.with {
            self.uses_ctes = true;
            for cte in &with.cte_tables {
                ctes.insert(cte.alias.name.value.to_lowercase());
                self.analyze_query(&cte.query, ctes);
            }
        }
        self.analyze_set_expr(&query.body, ctes);
    }

    fn analyze_set_expr(&mut self, body: &SetExpr, ctes: &mut BTreeSet<String>) {
        match body {
            SetExpr::Select(select) => {
                for from in &select.from {
                    self.analyze_table_factor(&from.relation, ctes);
                    self.join_count += from.joins.len();
                    for join in &from.joins {
                        self.analyze_table_factor(&join.relation, ctes);
                    }
                }
            }
            SetExpr::Query(query) => self.analyze_query(query, ctes),
            SetExpr::SetOperation { left, right, .. } => {
                self.analyze_set_expr(left, ctes);
                self.analyze_set_expr(right, ctes);
            }
            SetExpr::Insert(_) | SetExpr::Update(_) => self.is_read_only = false,
            _ => {}
        }
    }

    fn analyze_table_factor(&mut self, factor: &TableFactor, ctes: &mut BTreeSet<String>) {
        match factor {
            TableFactor::Table { name, .. } => {
                self.tables.insert(name.to_string().to_lowercase());
            }
            TableFactor::Derived { subquery, .. } => self.analyze_query(subquery, ctes),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.analyze_table_factor(&table_with_joins.relation, ctes);
                self.join_count += table_with_joins.joins.len();
                for join in &table_with_joins.joins {
                    self.analyze_table_factor(&join.relation, ctes);
                }
            }
            _ => {}
        }
    }
}
