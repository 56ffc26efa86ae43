//! Schema & example catalog
//!
//! Static description of the fund tables and the worked question → SQL
//! pairs handed to the language model. Nothing here talks to the store.

use crate::model::{GeoLevel, Indicator, IndicatorCategory};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// PostgreSQL layout of the loaded dataset, as shown to the model.
pub const SCHEMA: &str = "\
Table pmayg_state(state_id SERIAL PRIMARY KEY, name TEXT)
Table pmayg_district(district_id SERIAL PRIMARY KEY, state_id INT, name TEXT)
Table pmayg_block(block_id SERIAL PRIMARY KEY, district_id INT, name TEXT)
Table pmayg_panchayat(panchayat_id SERIAL PRIMARY KEY, block_id INT, name TEXT)
Table pmayg_indicator(indicator_id SERIAL PRIMARY KEY, name TEXT, type TEXT)
Table pmayg_report(report_id SERIAL PRIMARY KEY, report_type TEXT, report_date TIMESTAMP, source_file TEXT)
Table pmayg_fund_fact(fact_id SERIAL PRIMARY KEY, report_id INT, state_id INT, district_id INT, block_id INT, panchayat_id INT, indicator_id INT, amount NUMERIC)
";

/// Indicators loaded by the ETL, in load order. `Released_ State` keeps the
/// stray space from the source sheet header.
pub const INDICATORS: &[(&str, IndicatorCategory)] = &[
    ("SC", IndicatorCategory::Beneficiary),
    ("ST", IndicatorCategory::Beneficiary),
    ("Minority", IndicatorCategory::Beneficiary),
    ("Others", IndicatorCategory::Beneficiary),
    ("Total", IndicatorCategory::Beneficiary),
    ("Opening Balance", IndicatorCategory::FundFlow),
    ("Allocated_Central", IndicatorCategory::FundFlow),
    ("Allocated_State", IndicatorCategory::FundFlow),
    ("Allocated_Total", IndicatorCategory::FundFlow),
    ("Released_Central", IndicatorCategory::FundFlow),
    ("Released_ State", IndicatorCategory::FundFlow),
    ("Released_Total", IndicatorCategory::FundFlow),
    ("Total Available Funds", IndicatorCategory::FundFlow),
    ("Utilization of Funds", IndicatorCategory::FundFlow),
    ("Percentage Utilization", IndicatorCategory::FundFlow),
];

/// Fund flow indicators summarised in the programme overview.
pub const HEADLINE_FUND_FLOW: &[&str] = &[
    "Allocated_Total",
    "Released_Total",
    "Total Available Funds",
    "Utilization of Funds",
    "Percentage Utilization",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub sql: String,
}

impl FewShotExample {
    pub fn new(question: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            sql: sql.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub schema: String,
    pub examples: Vec<FewShotExample>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::pmayg()
    }
}

impl Catalog {
    pub fn new(schema: impl Into<String>, examples: Vec<FewShotExample>) -> Self {
        Self {
            schema: schema.into(),
            examples,
        }
    }

    /// The built-in PMAY-G schema and worked examples.
    pub fn pmayg() -> Self {
        Self::new(SCHEMA, default_examples())
    }

    /// Indicators as loaded, with ids assigned in load order from 1.
    pub fn indicators() -> Vec<Indicator> {
        INDICATORS
            .iter()
            .zip(1..)
            .map(|((name, category), id)| Indicator {
                id,
                name: name.to_string(),
                category: *category,
            })
            .collect()
    }

    pub fn indicators_in(category: IndicatorCategory) -> impl Iterator<Item = &'static str> {
        INDICATORS
            .iter()
            .filter(move |(_, c)| *c == category)
            .map(|(name, _)| *name)
    }

    /// Which indicator category exists at which geographic level, phrased for
    /// the prompt.
    pub fn hierarchy_rules() -> String {
        let levels_for = |category: IndicatorCategory| {
            GeoLevel::ALL
                .iter()
                .filter(|level| category.valid_at(**level))
                .map(|level| capitalize(&level.to_string()))
                .join(" / ")
        };

        format!(
            "- {} level: only beneficiary indicators exist ({})\n\
             - {} level: all fund flow indicators exist ({})\n\
             - Always use the most specific geographic level mentioned for beneficiary queries.\n\
             - For fund flow queries, always query at state level.\n\
             - The beneficiary indicator 'Total' is the sum of the other beneficiary categories, not a category of its own.",
            levels_for(IndicatorCategory::Beneficiary),
            Self::indicators_in(IndicatorCategory::Beneficiary).join(", "),
            levels_for(IndicatorCategory::FundFlow),
            Self::indicators_in(IndicatorCategory::FundFlow).join(", "),
        )
    }

    /// Examples as `Q:`/`SQL:` pairs in catalog order.
    pub fn few_shot_block(&self) -> String {
        self.examples
            .iter()
            .map(|ex| format!("Q: {}\nSQL: {}", ex.question, ex.sql.trim()))
            .join("\n")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn default_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new(
            "How much fund has been released in Maharashtra?",
            "SELECT i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total_released
FROM pmayg_fund_fact ff
JOIN pmayg_state s ON ff.state_id = s.state_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE s.name='MAHARASHTRA' AND i.name='Released_Total'
GROUP BY i.name;",
        ),
        FewShotExample::new(
            "Which beneficiary category received the most funds in Pune district?",
            "SELECT i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_district d ON ff.district_id = d.district_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE d.name='PUNE' AND i.type='beneficiary'
GROUP BY i.name
ORDER BY total DESC;",
        ),
        FewShotExample::new(
            "Which beneficiary category received the least funds in Pune district?",
            "SELECT i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_district d ON ff.district_id = d.district_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE d.name='PUNE' AND i.type='beneficiary'
GROUP BY i.name
ORDER BY total ASC;",
        ),
        FewShotExample::new(
            "Which beneficiary category is most underrepresented in Khed block?",
            "SELECT i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_block b ON ff.block_id = b.block_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE b.name='KHED' AND i.type='beneficiary'
GROUP BY i.name
ORDER BY total ASC;",
        ),
        FewShotExample::new(
            "Compare fund allocation across beneficiary categories in Khed block",
            "SELECT i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_block b ON ff.block_id = b.block_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE b.name='KHED' AND i.type='beneficiary'
GROUP BY i.name
ORDER BY total DESC;",
        ),
        FewShotExample::new(
            "Which beneficiary received the most funds in BHOSE panchayat?",
            "SELECT i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_panchayat p ON ff.panchayat_id = p.panchayat_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE p.name='BHOSE' AND i.type='beneficiary'
GROUP BY i.name
ORDER BY total DESC;",
        ),
        FewShotExample::new(
            "Compare fund allocation across blocks in Maharashtra",
            "SELECT b.name AS block_name, i.name AS indicator, COALESCE(SUM(ff.amount),0) AS total
FROM pmayg_fund_fact ff
JOIN pmayg_block b ON ff.block_id = b.block_id
JOIN pmayg_district d ON b.district_id = d.district_id
JOIN pmayg_state s ON d.state_id = s.state_id
JOIN pmayg_indicator i ON ff.indicator_id = i.indicator_id
WHERE s.name='MAHARASHTRA' AND i.type='beneficiary'
GROUP BY b.name, i.name
ORDER BY b.name, i.name;",
        ),
    ]
}
