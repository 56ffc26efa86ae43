//! Natural language → SQL translation
//!
//! One prompt, one oracle call, then the first SELECT is cut out of whatever
//! text came back. Structural safety is left to the validator.

use crate::catalog::Catalog;
use crate::error::{PipelineError, Result, ValidationError};
use crate::llm::CompletionOracle;
use crate::validator::{validate, ValidatedQuery};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Unvalidated SQL produced by the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery(String);

impl CandidateQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn validate(&self) -> std::result::Result<ValidatedQuery, ValidationError> {
        validate(&self.0)
    }
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Translator {
    oracle: Arc<dyn CompletionOracle>,
    catalog: Catalog,
}

impl Translator {
    pub fn new(oracle: Arc<dyn CompletionOracle>, catalog: Catalog) -> Self {
        Self { oracle, catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn translate(&self, question: &str) -> Result<CandidateQuery> {
        let prompt = build_prompt(question, &self.catalog);
        let response = self.oracle.complete(&prompt).await?;
        debug!(response = %response, "LLM response for SQL generation");

        let candidate = extract_statement(&response)?;
        info!(sql = %candidate, "generated SQL");
        Ok(candidate)
    }
}

/// Instruction block, schema, examples, then the question last.
pub fn build_prompt(question: &str, catalog: &Catalog) -> String {
    format!(
        r#"You are a PostgreSQL SQL assistant specialized in PMAY-G fund allocation data.

Hierarchy rules:
{rules}

Rules:
1. Output ONLY ONE SQL query, no explanations.
2. Use COALESCE(column,0) for SUM aggregates.
3. Avoid window functions unless strictly necessary.
4. All selected columns must be aggregated or in GROUP BY.
5. Use clear aliases.
6. Follow PostgreSQL syntax strictly.

For questions asking about most/least, return all rows, do not limit.

Database schema:
{schema}

Few-shot examples:
{examples}

Q: {question}
SQL:"#,
        rules = Catalog::hierarchy_rules(),
        schema = catalog.schema.trim_end(),
        examples = catalog.few_shot_block(),
        question = question.trim(),
    )
}

/// Cuts the first SELECT statement out of a free-form reply and terminates it
/// with exactly one semicolon.
pub fn extract_statement(response: &str) -> Result<CandidateQuery> {
    // ASCII lowercasing keeps byte offsets aligned with the original text.
    let start = response
        .to_ascii_lowercase()
        .find("select")
        .ok_or(PipelineError::NoStatementFound)?;

    let tail = &response[start..];
    let statement = &tail[..statement_end(tail)];
    let statement = statement.trim().trim_end_matches(';').trim_end();

    Ok(CandidateQuery(format!("{};", statement)))
}

/// Byte offset of the first `;` outside a quoted literal or identifier, or
/// the end of the text. A doubled quote (`'it''s'`) closes and reopens, so it
/// needs no special case.
fn statement_end(sql: &str) -> usize {
    let mut quote: Option<char> = None;
    for (idx, ch) in sql.char_indices() {
        match (quote, ch) {
            (None, ';') => return idx,
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            _ => {}
        }
    }
    sql.len()
}
