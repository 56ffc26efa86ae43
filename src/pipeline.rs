//! Question → SQL → result → chart + insights
//!
//! Steps run one after another for each question. A refused or failed query
//! still yields a complete outcome; only a broken oracle call is an `Err`.

use crate::catalog::Catalog;
use crate::chart::{shape, ChartSpec};
use crate::error::{PipelineError, Result};
use crate::execution::{Executor, QueryResult};
use crate::llm::CompletionOracle;
use crate::narrator::InsightNarrator;
use crate::translator::Translator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub request_id: Uuid,
    pub question: String,
    /// The SQL that ran, or the candidate that was refused.
    pub sql: Option<String>,
    pub result: QueryResult,
    pub chart: Option<ChartSpec>,
    pub insights: String,
}

pub struct Pipeline {
    translator: Translator,
    executor: Executor,
    narrator: InsightNarrator,
}

impl Pipeline {
    pub fn new(oracle: Arc<dyn CompletionOracle>, executor: Executor, catalog: Catalog) -> Self {
        Self {
            translator: Translator::new(oracle.clone(), catalog),
            executor,
            narrator: InsightNarrator::new(oracle),
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub async fn run(&self, question: &str) -> Result<PipelineOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!("pipeline", %request_id);
        self.run_inner(request_id, question).instrument(span).await
    }

    async fn run_inner(&self, request_id: Uuid, question: &str) -> Result<PipelineOutcome> {
        info!(question = %question, "answering question");

        let (sql, result) = match self.translator.translate(question).await {
            Ok(candidate) => match candidate.validate() {
                Ok(query) => {
                    let result = self.executor.execute(&query).await;
                    (Some(query.into_string()), result)
                }
                Err(e) => {
                    warn!(sql = %candidate, "generated SQL rejected: {}", e);
                    (Some(candidate.to_string()), cannot_run(&e.to_string()))
                }
            },
            Err(PipelineError::NoStatementFound) => {
                warn!("LLM produced no SELECT statement");
                (None, cannot_run(&PipelineError::NoStatementFound.to_string()))
            }
            Err(e) => return Err(e),
        };

        let chart = shape(&result);
        let insights = self.narrator.narrate(question, sql.as_deref(), &result).await?;

        Ok(PipelineOutcome {
            request_id,
            question: question.to_string(),
            sql,
            result,
            chart,
            insights,
        })
    }
}

fn cannot_run(reason: &str) -> QueryResult {
    QueryResult::error(format!("cannot run this query: {}", reason))
}
