//! Narrators
//!
//! Turn query results into prose through the completion oracle. An error
//! result is narrated like any other result: the user still gets a sentence
//! explaining that no data could be produced.

use crate::catalog::{Catalog, HEADLINE_FUND_FLOW};
use crate::error::Result;
use crate::execution::{Executor, QueryResult};
use crate::llm::CompletionOracle;
use crate::model::IndicatorCategory;
use crate::validator::validate;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};

pub const NO_DATA: &str = "No relevant data found.";

lazy_static! {
    static ref BLANK_RUNS: Regex = Regex::new(r"\n+").unwrap();
    static ref TRAILING_SPACE: Regex = Regex::new(r"\s+\n").unwrap();
}

/// How a result is shown to the model.
pub fn render_result(result: &QueryResult) -> String {
    match result {
        QueryResult::Rows(rows) if rows.is_empty() => NO_DATA.to_string(),
        QueryResult::Error { error } => format!("The query could not be run: {}", error),
        other => serde_json::to_string(other).unwrap_or_else(|_| NO_DATA.to_string()),
    }
}

/// Collapses blank-line runs and trailing whitespace in a model reply.
pub fn tidy(text: &str) -> String {
    let collapsed = BLANK_RUNS.replace_all(text, "\n");
    TRAILING_SPACE.replace_all(&collapsed, "\n").trim().to_string()
}

pub struct InsightNarrator {
    oracle: Arc<dyn CompletionOracle>,
}

impl InsightNarrator {
    pub fn new(oracle: Arc<dyn CompletionOracle>) -> Self {
        Self { oracle }
    }

    pub async fn narrate(&self, question: &str, sql: Option<&str>, result: &QueryResult) -> Result<String> {
        let prompt = insight_prompt(question, sql, result);
        let reply = self.oracle.complete(&prompt).await?;
        Ok(tidy(&reply))
    }
}

fn insight_prompt(question: &str, sql: Option<&str>, result: &QueryResult) -> String {
    format!(
        r#"
You are an expert analyst evaluating government fund allocation and utilization at multiple levels (state, district, block, panchayat). Use clear, professional language.

Query result (already processed):
{data}
All numeric values are in lakhs.
If a column has the value "Total", it represents the sum across all beneficiary categories ({categories}).
It does not represent a separate beneficiary category.

SQL used (for context only):
{sql}

User's question:
{question}

Instructions:
1. Begin your response by directly answering the user's question in one clear sentence.
2. Then provide a concise, readable summary of any notable insights supported by the data. Include only what is relevant to the question.
3. Use bullets or numbered points if helpful, but do not force a fixed number of points.
4. Highlight relative magnitudes, percentages, or patterns only if they help explain the data.
5. Avoid inventing numbers or assuming data that isn't present.
6. If the query returns no data or could not be run, state that concisely.

Focus on making the data interpretable and meaningful for the user's question.
Always answer the user's question directly and clearly FIRST.
ONLY RETURN INSIGHTS. DO NOT RETURN SQL OR RAW DATA. DO NOT REPEAT THE USER'S QUESTION.
"#,
        data = render_result(result),
        categories = Catalog::indicators()
            .iter()
            .filter(|i| i.category == IndicatorCategory::Beneficiary && !i.is_cross_category_total())
            .map(|i| i.name.as_str())
            .join(", "),
        sql = sql.unwrap_or("(none)"),
        question = question.trim(),
    )
}

/// Whole-programme summary built from two fixed aggregate queries.
pub struct OverviewNarrator {
    oracle: Arc<dyn CompletionOracle>,
    executor: Executor,
}

impl OverviewNarrator {
    pub fn new(oracle: Arc<dyn CompletionOracle>, executor: Executor) -> Self {
        Self { oracle, executor }
    }

    pub fn state_fund_flow_sql() -> String {
        let names = HEADLINE_FUND_FLOW.iter().map(|n| format!("'{}'", n)).join(",");
        format!(
            "SELECT i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_state s ON ff.state_id = s.state_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE i.name IN ({})
GROUP BY i.name",
            names
        )
    }

    pub fn block_beneficiary_sql() -> String {
        let names = Catalog::indicators_in(IndicatorCategory::Beneficiary)
            .map(|n| format!("'{}'", n))
            .join(",");
        format!(
            "SELECT b.name AS block_name, i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_block b ON ff.block_id = b.block_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE i.name IN ({})
GROUP BY b.name, i.name",
            names
        )
    }

    async fn run(&self, sql: &str) -> QueryResult {
        match validate(sql) {
            Ok(query) => self.executor.execute(&query).await,
            Err(e) => {
                warn!("overview query rejected: {}", e);
                QueryResult::error(e.to_string())
            }
        }
    }

    pub async fn summarize(&self) -> Result<String> {
        let state = self.run(&Self::state_fund_flow_sql()).await;
        let blocks = self.run(&Self::block_beneficiary_sql()).await;
        info!(
            state_rows = state.rows().map(|r| r.len()).unwrap_or(0),
            block_rows = blocks.rows().map(|r| r.len()).unwrap_or(0),
            "overview data loaded"
        );

        let prompt = overview_prompt(&state, &blocks);
        let reply = self.oracle.complete(&prompt).await?;
        Ok(tidy(&reply))
    }
}

fn overview_prompt(state: &QueryResult, blocks: &QueryResult) -> String {
    format!(
        r#"
You are a social sector analyst reviewing the PMAY-G program.

State-level fund flow summary:
{state}

Block-level beneficiary summary:
{blocks}

Write a concise, high-level summary (10-15 lines):
- Include fund allocation, release, utilization, percentage utilization.
- Include beneficiary counts by block and category.
- The beneficiary indicator "Total" is the sum of the other categories; do not add it to them.
- Highlight underutilization or anomalies.
- Avoid mechanically repeating numbers.
- If no data exists at a level, mention it clearly.
"#,
        state = render_result(state),
        blocks = render_result(blocks),
    )
}
