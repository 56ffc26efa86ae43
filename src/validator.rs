//! SQL safety validator
//!
//! Gatekeeps every statement that reaches the store. Only a single SELECT
//! (or a CTE ending in a SELECT) gets through. The keyword scan is a blunt
//! substring match over the whole text, so an identifier such as `updates`
//! is refused as well.

use crate::error::ValidationError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

pub const FORBIDDEN_KEYWORDS: [&str; 8] = [
    "delete", "drop", "update", "insert", "truncate", "alter", "grant", "revoke",
];

lazy_static! {
    static ref FENCE_ARTIFACTS: Regex = Regex::new(r#"```|""""#).unwrap();
}

/// A statement that passed [`validate`]. The only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedQuery(String);

impl ValidatedQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ValidatedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks a candidate statement and returns it cleaned of fencing artifacts.
///
/// The prefix and keyword rules hold for the input as written and again for
/// the cleaned text that is returned. Pure: no I/O, same input gives the same
/// answer.
pub fn validate(candidate: &str) -> Result<ValidatedQuery, ValidationError> {
    let sql = candidate.trim();
    check_read_only(sql)?;

    let cleaned = strip_fences(sql);
    let cleaned = cleaned.trim();
    check_read_only(cleaned)?;

    let statements = cleaned
        .split(';')
        .filter(|segment| !segment.trim().is_empty())
        .count();
    if statements > 1 {
        return Err(ValidationError::MultipleStatements { count: statements });
    }

    Ok(ValidatedQuery(cleaned.to_string()))
}

fn check_read_only(sql: &str) -> Result<(), ValidationError> {
    let lowered = sql.to_lowercase();

    if !(lowered.starts_with("select") || lowered.starts_with("with")) {
        return Err(ValidationError::NotAReadQuery);
    }

    match FORBIDDEN_KEYWORDS.iter().find(|kw| lowered.contains(*kw)) {
        Some(keyword) => Err(ValidationError::ForbiddenOperation { keyword }),
        None => Ok(()),
    }
}

/// Removing one artifact can join its neighbours into a new one, so strip
/// until none is left.
fn strip_fences(sql: &str) -> String {
    let mut cleaned = sql.to_string();
    while FENCE_ARTIFACTS.is_match(&cleaned) {
        cleaned = FENCE_ARTIFACTS.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_select_and_cte() {
        assert_eq!(validate("  SELECT 1;  ").unwrap().as_str(), "SELECT 1;");
        assert_eq!(validate("select name from pmayg_state").unwrap().as_str(), "select name from pmayg_state");
        let cte = "WITH t AS (SELECT 1 AS x) SELECT x FROM t";
        assert_eq!(validate(cte).unwrap().as_str(), cte);
    }

    #[test]
    fn test_rejects_non_read_prefix() {
        for sql in [
            "EXPLAIN SELECT 1",
            "CREATE TABLE t (x INT)",
            "",
            "   ",
            "-- comment\nSELECT 1",
            "```sql\nSELECT 1\n```",
            "(SELECT 1)",
        ] {
            assert_eq!(validate(sql), Err(ValidationError::NotAReadQuery), "{sql:?}");
        }
    }

    #[test]
    fn test_rejects_forbidden_keywords_anywhere() {
        assert_eq!(
            validate("SELECT 1; DROP TABLE x"),
            Err(ValidationError::ForbiddenOperation { keyword: "drop" })
        );
        assert_eq!(
            validate("SELECT * FROM (DELETE FROM pmayg_state RETURNING *) s"),
            Err(ValidationError::ForbiddenOperation { keyword: "delete" })
        );
        assert_eq!(
            validate("WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x"),
            Err(ValidationError::ForbiddenOperation { keyword: "insert" })
        );
        assert_eq!(
            validate("select * from t /* GRANT all */"),
            Err(ValidationError::ForbiddenOperation { keyword: "grant" })
        );
    }

    #[test]
    fn test_identifier_false_positive_is_rejected() {
        assert_eq!(
            validate("SELECT updates FROM changelog"),
            Err(ValidationError::ForbiddenOperation { keyword: "update" })
        );
    }

    #[test]
    fn test_every_keyword_is_caught() {
        for keyword in FORBIDDEN_KEYWORDS {
            let sql = format!("SELECT 1 AS {}", keyword.to_uppercase());
            assert!(matches!(
                validate(&sql),
                Err(ValidationError::ForbiddenOperation { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_multiple_statements() {
        assert_eq!(
            validate("SELECT 1; SELECT 2"),
            Err(ValidationError::MultipleStatements { count: 2 })
        );
        assert_eq!(
            validate("SELECT 1;\n;SELECT 2;"),
            Err(ValidationError::MultipleStatements { count: 2 })
        );
        // Empty segments do not count as statements.
        assert!(validate("SELECT 1;;  ;").is_ok());
    }

    #[test]
    fn test_strips_fencing_artifacts() {
        assert_eq!(
            validate("SELECT name FROM pmayg_state;\n```").unwrap().as_str(),
            "SELECT name FROM pmayg_state;"
        );
        assert_eq!(
            validate("SELECT 1 \"\"\"").unwrap().as_str(),
            "SELECT 1"
        );
    }

    #[test]
    fn test_keyword_split_by_fence_is_rejected() {
        assert_eq!(
            validate("WITH d AS (DEL```ETE FROM pmayg_state RETURNING *) SELECT * FROM d"),
            Err(ValidationError::ForbiddenOperation { keyword: "delete" })
        );
        assert_eq!(
            validate("SELECT 1; DR\"\"\"OP TABLE pmayg_state"),
            Err(ValidationError::ForbiddenOperation { keyword: "drop" })
        );
    }

    #[test]
    fn test_fences_merging_after_removal() {
        assert_eq!(validate("SELECT \"\"```\" AS x").unwrap().as_str(), "SELECT  AS x");
        assert_eq!(
            validate("SELECT name FROM pmayg_state``\"\"\"`;").unwrap().as_str(),
            "SELECT name FROM pmayg_state;"
        );
    }

    #[test]
    fn test_idempotent() {
        for sql in [
            "SELECT 1;",
            "  select name from pmayg_state  ```",
            "WITH t AS (SELECT 1) SELECT * FROM t;;",
            "SELECT '\"\"\"' AS q",
            "SELECT \"\"```\" AS x",
            "SELECT 1 ``````` AS y",
        ] {
            let once = validate(sql).unwrap();
            let twice = validate(once.as_str()).unwrap();
            assert_eq!(once, twice, "{sql:?}");
        }
    }
}
