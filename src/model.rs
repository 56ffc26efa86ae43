//! Data model of the fund dataset.
//!
//! The store owns these rows; the crate only needs them to describe the
//! schema to the language model and to state the granularity rules that a
//! generated query has to respect.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{child} must be owned by a {expected}, got {actual:?}")]
    WrongParent {
        child: GeoLevel,
        expected: GeoLevel,
        actual: Option<GeoLevel>,
    },

    #[error("{category} indicator '{indicator}' is not reported at {level} level")]
    WrongGranularity {
        indicator: String,
        category: IndicatorCategory,
        level: GeoLevel,
    },

    #[error("unknown indicator category: {0}")]
    UnknownCategory(String),
}

/// Level in the state → district → block → panchayat hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    State,
    District,
    Block,
    Panchayat,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 4] = [
        GeoLevel::State,
        GeoLevel::District,
        GeoLevel::Block,
        GeoLevel::Panchayat,
    ];

    pub fn parent(self) -> Option<GeoLevel> {
        match self {
            GeoLevel::State => None,
            GeoLevel::District => Some(GeoLevel::State),
            GeoLevel::Block => Some(GeoLevel::District),
            GeoLevel::Panchayat => Some(GeoLevel::Block),
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            GeoLevel::State => "pmayg_state",
            GeoLevel::District => "pmayg_district",
            GeoLevel::Block => "pmayg_block",
            GeoLevel::Panchayat => "pmayg_panchayat",
        }
    }

    /// Primary key column, also the foreign key column on `pmayg_fund_fact`.
    pub fn key_column(self) -> &'static str {
        match self {
            GeoLevel::State => "state_id",
            GeoLevel::District => "district_id",
            GeoLevel::Block => "block_id",
            GeoLevel::Panchayat => "panchayat_id",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeoLevel::State => "state",
            GeoLevel::District => "district",
            GeoLevel::Block => "block",
            GeoLevel::Panchayat => "panchayat",
        };
        f.write_str(name)
    }
}

/// Reference to exactly one geographic entity. A fact carries one of these,
/// so the other three level references are unset by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum GeoRef {
    State(i64),
    District(i64),
    Block(i64),
    Panchayat(i64),
}

impl GeoRef {
    pub fn new(level: GeoLevel, id: i64) -> Self {
        match level {
            GeoLevel::State => GeoRef::State(id),
            GeoLevel::District => GeoRef::District(id),
            GeoLevel::Block => GeoRef::Block(id),
            GeoLevel::Panchayat => GeoRef::Panchayat(id),
        }
    }

    pub fn level(&self) -> GeoLevel {
        match self {
            GeoRef::State(_) => GeoLevel::State,
            GeoRef::District(_) => GeoLevel::District,
            GeoRef::Block(_) => GeoLevel::Block,
            GeoRef::Panchayat(_) => GeoLevel::Panchayat,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            GeoRef::State(id) | GeoRef::District(id) | GeoRef::Block(id) | GeoRef::Panchayat(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographicEntity {
    pub id: i64,
    pub name: String,
    pub level: GeoLevel,
    pub parent: Option<GeoRef>,
}

impl GeographicEntity {
    /// Builds an entity, checking the parent sits exactly one level up.
    /// Names are only unique within the parent, so nothing is checked there.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        level: GeoLevel,
        parent: Option<GeoRef>,
    ) -> Result<Self, ModelError> {
        let actual = parent.map(|p| p.level());
        if level.parent() != actual {
            return Err(ModelError::WrongParent {
                child: level,
                expected: level.parent().unwrap_or(level),
                actual,
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            level,
            parent,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorCategory {
    Beneficiary,
    FundFlow,
}

impl IndicatorCategory {
    /// The value stored in `pmayg_indicator.type`.
    pub fn as_str(self) -> &'static str {
        match self {
            IndicatorCategory::Beneficiary => "beneficiary",
            IndicatorCategory::FundFlow => "fund_flow",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ModelError> {
        match s.trim() {
            "beneficiary" => Ok(IndicatorCategory::Beneficiary),
            "fund_flow" => Ok(IndicatorCategory::FundFlow),
            other => Err(ModelError::UnknownCategory(other.to_string())),
        }
    }

    /// Fund flow is reported per state only; beneficiary counts only below it.
    pub fn valid_at(self, level: GeoLevel) -> bool {
        match self {
            IndicatorCategory::FundFlow => level == GeoLevel::State,
            IndicatorCategory::Beneficiary => level != GeoLevel::State,
        }
    }
}

impl fmt::Display for IndicatorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: i64,
    pub name: String,
    pub category: IndicatorCategory,
}

impl Indicator {
    /// "Total" under beneficiary sums the other categories; it is not a
    /// category of its own.
    pub fn is_cross_category_total(&self) -> bool {
        self.category == IndicatorCategory::Beneficiary && self.name == "Total"
    }
}

/// Provenance of a batch of loaded facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub report_type: String,
    pub report_date: NaiveDateTime,
    pub source_file: Option<String>,
}

/// One observation. `amount` is in lakhs; `None` means "not reported",
/// which is different from a reported zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundFact {
    pub id: i64,
    pub report_id: i64,
    pub geography: GeoRef,
    pub indicator_id: i64,
    pub amount: Option<f64>,
}

impl FundFact {
    pub fn check_granularity(&self, indicator: &Indicator) -> Result<(), ModelError> {
        let level = self.geography.level();
        if indicator.category.valid_at(level) {
            Ok(())
        } else {
            Err(ModelError::WrongGranularity {
                indicator: indicator.name.clone(),
                category: indicator.category,
                level,
            })
        }
    }

    pub fn is_reported(&self) -> bool {
        self.amount.is_some()
    }
}
