use thiserror::Error;

/// Reasons a candidate SQL string is refused before it reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Only SELECT queries or CTE-based SELECT queries are allowed")]
    NotAReadQuery,

    #[error("Query contains forbidden operation: {keyword}")]
    ForbiddenOperation { keyword: &'static str },

    #[error("Multiple statements detected ({count}); only a single SELECT is allowed")]
    MultipleStatements { count: usize },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No SELECT statement found in LLM output")]
    NoStatementFound,

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures raised by a relational store backend. The executor turns these
/// into `QueryResult::Error` values.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("statement failed: {0}")]
    Statement(String),

    #[error("could not decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("store runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
