#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use pmayg_insights::catalog::Catalog;
use pmayg_insights::model::{FundFact, GeoLevel, GeoRef, GeographicEntity, Report};
use pmayg_insights::{CompletionOracle, PipelineError};
use rusqlite::{params, Connection};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

const DDL: &str = "
CREATE TABLE pmayg_state (state_id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE pmayg_district (district_id INTEGER PRIMARY KEY, state_id INT, name TEXT);
CREATE TABLE pmayg_block (block_id INTEGER PRIMARY KEY, district_id INT, name TEXT);
CREATE TABLE pmayg_panchayat (panchayat_id INTEGER PRIMARY KEY, block_id INT, name TEXT);
CREATE TABLE pmayg_indicator (indicator_id INTEGER PRIMARY KEY, name TEXT, type TEXT);
CREATE TABLE pmayg_report (report_id INTEGER PRIMARY KEY, report_type TEXT, report_date TIMESTAMP, source_file TEXT);
CREATE TABLE pmayg_fund_fact (fact_id INTEGER PRIMARY KEY, report_id INT, state_id INT, district_id INT,
    block_id INT, panchayat_id INT, indicator_id INT, amount NUMERIC);
";

/// Temporary SQLite database holding the PMAY-G tables. Removed on drop.
pub struct Fixture {
    pub path: PathBuf,
}

impl Fixture {
    /// Tables only, no rows.
    pub fn empty() -> Self {
        let path = std::env::temp_dir().join(format!("pmayg-{}.db", Uuid::new_v4()));
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(DDL).unwrap();
        Self { path }
    }

    /// One state, one district, two blocks and a handful of facts. Rows go
    /// through the model types so the fixture obeys the granularity rules.
    pub fn seeded() -> Self {
        let fixture = Self::empty();
        let conn = Connection::open(&fixture.path).unwrap();

        let entities = [
            GeographicEntity::new(1, "MAHARASHTRA", GeoLevel::State, None).unwrap(),
            GeographicEntity::new(1, "PUNE", GeoLevel::District, Some(GeoRef::State(1))).unwrap(),
            GeographicEntity::new(1, "KHED", GeoLevel::Block, Some(GeoRef::District(1))).unwrap(),
            GeographicEntity::new(2, "HAVELI", GeoLevel::Block, Some(GeoRef::District(1))).unwrap(),
        ];
        for entity in &entities {
            insert_entity(&conn, entity);
        }

        let report = Report {
            id: 1,
            report_type: "block_beneficiary".to_string(),
            report_date: NaiveDate::from_ymd_opt(2024, 4, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            source_file: Some("blocks.xlsx".to_string()),
        };
        conn.execute(
            "INSERT INTO pmayg_report (report_id, report_type, report_date, source_file) VALUES (?1, ?2, ?3, ?4)",
            params![
                report.id,
                report.report_type,
                report.report_date.format("%Y-%m-%d %H:%M:%S").to_string(),
                report.source_file
            ],
        )
        .unwrap();

        let indicators = Catalog::indicators();
        for indicator in &indicators {
            conn.execute(
                "INSERT INTO pmayg_indicator (indicator_id, name, type) VALUES (?1, ?2, ?3)",
                params![indicator.id, indicator.name, indicator.category.as_str()],
            )
            .unwrap();
        }

        let facts = [
            (GeoRef::Block(1), "SC", Some(10.0)),
            (GeoRef::Block(1), "ST", Some(5.0)),
            (GeoRef::Block(1), "Total", Some(15.0)),
            (GeoRef::Block(2), "SC", Some(4.0)),
            (GeoRef::Block(2), "ST", None),
            (GeoRef::Block(2), "Minority", Some(2.0)),
            (GeoRef::Block(2), "Total", Some(6.0)),
            (GeoRef::State(1), "Allocated_Total", Some(1000.0)),
            (GeoRef::State(1), "Released_Total", Some(800.0)),
            (GeoRef::State(1), "Utilization of Funds", Some(600.0)),
        ];
        for (n, (geography, name, amount)) in facts.into_iter().enumerate() {
            let indicator = indicators.iter().find(|i| i.name == name).unwrap();
            let fact = FundFact {
                id: n as i64 + 1,
                report_id: report.id,
                geography,
                indicator_id: indicator.id,
                amount,
            };
            fact.check_granularity(indicator).unwrap();
            insert_fact(&conn, &fact);
        }

        fixture
    }
}

fn insert_entity(conn: &Connection, entity: &GeographicEntity) {
    let table = entity.level.table();
    let key = entity.level.key_column();
    match entity.parent {
        None => conn.execute(
            &format!("INSERT INTO {} ({}, name) VALUES (?1, ?2)", table, key),
            params![entity.id, entity.name],
        ),
        Some(parent) => conn.execute(
            &format!(
                "INSERT INTO {} ({}, {}, name) VALUES (?1, ?2, ?3)",
                table,
                key,
                parent.level().key_column()
            ),
            params![entity.id, parent.id(), entity.name],
        ),
    }
    .unwrap();
}

fn insert_fact(conn: &Connection, fact: &FundFact) {
    conn.execute(
        &format!(
            "INSERT INTO pmayg_fund_fact (fact_id, report_id, {}, indicator_id, amount) VALUES (?1, ?2, ?3, ?4, ?5)",
            fact.geography.level().key_column()
        ),
        params![fact.id, fact.report_id, fact.geography.id(), fact.indicator_id, fact.amount],
    )
    .unwrap();
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Oracle that answers from a fixed script and remembers every prompt.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionOracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> pmayg_insights::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PipelineError::Llm("script exhausted".to_string()))
    }
}
