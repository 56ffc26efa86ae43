//! Natural-language questions over the PMAY-G fund dataset.
//!
//! A question is translated to SQL by a language model, checked by the
//! validator, run against the store and shaped into records, a chart choice
//! and a written answer.

pub mod catalog;
pub mod chart;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod model;
pub mod narrator;
pub mod pipeline;
pub mod translator;
pub mod validator;

pub use catalog::Catalog;
pub use chart::{shape, ChartSpec};
pub use config::{AppConfig, DatabaseConfig, LlmConfig};
pub use error::{PipelineError, Result, StoreError, ValidationError};
pub use execution::{Executor, QueryResult};
pub use llm::{CompletionOracle, LlmClient};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use translator::{CandidateQuery, Translator};
pub use validator::{validate, ValidatedQuery};
