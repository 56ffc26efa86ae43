//! Runtime configuration
//!
//! Everything the pipeline needs from the environment is read once into
//! plain values and handed to the components that use them. `.env` files are
//! loaded by the binary before [`AppConfig::from_env`] runs.

use crate::error::{PipelineError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests do not have to
    /// touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: DatabaseConfig::from_lookup(&lookup)?,
            llm: LlmConfig::from_lookup(&lookup)?,
        })
    }
}

/// Where queries run. Passed into the executor at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Postgres(PostgresConfig),
    Sqlite { path: PathBuf },
}

impl DatabaseConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let statement_timeout =
            Duration::from_secs(parse_var(lookup, "STATEMENT_TIMEOUT_SECS", 30u64)?);

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            if let Some(path) = url.strip_prefix("sqlite:") {
                let path = path.trim_start_matches("//");
                return Ok(DatabaseConfig::Sqlite {
                    path: PathBuf::from(path),
                });
            }
            return Ok(DatabaseConfig::Postgres(PostgresConfig::Url {
                url,
                statement_timeout,
            }));
        }

        Ok(DatabaseConfig::Postgres(PostgresConfig::Params {
            host: lookup("PGHOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_var(lookup, "PGPORT", 5432u16)?,
            dbname: lookup("PGDATABASE").unwrap_or_else(|| "postgres".to_string()),
            user: lookup("PGUSER").unwrap_or_else(|| "postgres".to_string()),
            password: lookup("PGPASSWORD").unwrap_or_default(),
            statement_timeout,
        }))
    }
}

#[derive(Clone, PartialEq)]
pub enum PostgresConfig {
    Url {
        url: String,
        statement_timeout: Duration,
    },
    Params {
        host: String,
        port: u16,
        dbname: String,
        user: String,
        password: String,
        statement_timeout: Duration,
    },
}

impl PostgresConfig {
    pub fn statement_timeout(&self) -> Duration {
        match self {
            PostgresConfig::Url { statement_timeout, .. }
            | PostgresConfig::Params { statement_timeout, .. } => *statement_timeout,
        }
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostgresConfig::Url { url, statement_timeout } => f
                .debug_struct("Url")
                .field("host", &url.split('@').nth(1).unwrap_or("database"))
                .field("statement_timeout", statement_timeout)
                .finish(),
            PostgresConfig::Params {
                host,
                port,
                dbname,
                user,
                statement_timeout,
                ..
            } => f
                .debug_struct("Params")
                .field("host", host)
                .field("port", port)
                .field("dbname", dbname)
                .field("user", user)
                .field("statement_timeout", statement_timeout)
                .finish(),
        }
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = ["LLM_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                PipelineError::Config(
                    "LLM API key not found. Set LLM_API_KEY, GROQ_API_KEY or OPENAI_API_KEY".to_string(),
                )
            })?;

        Ok(Self {
            api_key,
            base_url: lookup("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            temperature: parse_var(lookup, "LLM_TEMPERATURE", 0.1f32)?,
            timeout: Duration::from_secs(parse_var(lookup, "LLM_TIMEOUT_SECS", 60u64)?),
        })
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| PipelineError::Config(format!("Invalid {}='{}': {}", key, raw, e))),
        _ => Ok(default),
    }
}
