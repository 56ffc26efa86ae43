//! Chart selection
//!
//! Picks between a single bar chart and a grouped bar chart from column-type
//! counts alone. Anything else gets no chart.

use crate::execution::{QueryResult, RowSet};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub category: String,
    /// `None` when no row reported a value; a reported zero stays `Some(0.0)`.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarGroup {
    pub category: String,
    /// One value per series, in series order. `None` when no row had a value.
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartSpec {
    SingleBar {
        title: String,
        category_axis: String,
        value_axis: String,
        value_label: String,
        /// Values are printed on the bars.
        labels_in_place: bool,
        bars: Vec<Bar>,
    },
    GroupedBar {
        title: String,
        category_axis: String,
        series: Vec<String>,
        groups: Vec<BarGroup>,
    },
}

impl ChartSpec {
    pub fn title(&self) -> &str {
        match self {
            ChartSpec::SingleBar { title, .. } | ChartSpec::GroupedBar { title, .. } => title,
        }
    }
}

pub fn shape(result: &QueryResult) -> Option<ChartSpec> {
    let rows = result.rows().filter(|rows| !rows.is_empty())?;

    let (numeric, categorical): (Vec<&str>, Vec<&str>) = rows
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|col| rows.column_values(col).any(|v| !v.is_null()))
        .partition(|col| rows.column_values(col).all(|v| v.is_null() || v.is_number()));

    match (numeric.as_slice(), categorical.as_slice()) {
        ([value], [category]) => Some(single_bar(rows, category, value)),
        (values, [category]) if values.len() > 1 => Some(grouped_bar(rows, category, values)),
        _ => None,
    }
}

fn single_bar(rows: &RowSet, category: &str, value: &str) -> ChartSpec {
    let bars = aggregate(rows, category, &[value])
        .into_iter()
        .map(|(category, values)| Bar {
            category,
            value: values.into_iter().next().flatten(),
        })
        .collect();

    ChartSpec::SingleBar {
        title: format!("{} by {}", value, category),
        category_axis: category.to_string(),
        value_axis: value.to_string(),
        value_label: format!("{} (in lakhs)", value),
        labels_in_place: true,
        bars,
    }
}

fn grouped_bar(rows: &RowSet, category: &str, values: &[&str]) -> ChartSpec {
    let groups = aggregate(rows, category, values)
        .into_iter()
        .map(|(category, values)| BarGroup { category, values })
        .collect();

    ChartSpec::GroupedBar {
        title: format!("Comparison of {} by {}", values.iter().join(", "), category),
        category_axis: category.to_string(),
        series: values.iter().map(|v| v.to_string()).collect(),
        groups,
    }
}

/// Sums each series per distinct category, keeping first-appearance order.
fn aggregate(rows: &RowSet, category: &str, series: &[&str]) -> Vec<(String, Vec<Option<f64>>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for record in rows.records() {
        let key = category_label(record.get(category).unwrap_or(&Value::Null));
        let idx = *index.entry(key.clone()).or_insert_with(|| {
            out.push((key, vec![None; series.len()]));
            out.len() - 1
        });
        for (slot, column) in out[idx].1.iter_mut().zip(series) {
            if let Some(v) = record.get(*column).and_then(Value::as_f64) {
                *slot = Some(slot.unwrap_or(0.0) + v);
            }
        }
    }
    out
}

fn category_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "(none)".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult::Rows(RowSet::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
        ))
    }

    #[test]
    fn test_single_bar() {
        let chart = shape(&result(
            &["category", "value"],
            vec![vec![json!("A"), json!(10)], vec![json!("B"), json!(20)]],
        ))
        .unwrap();

        match chart {
            ChartSpec::SingleBar {
                title,
                category_axis,
                value_axis,
                value_label,
                labels_in_place,
                bars,
            } => {
                assert_eq!(category_axis, "category");
                assert_eq!(value_axis, "value");
                assert_eq!(title, "value by category");
                assert_eq!(value_label, "value (in lakhs)");
                assert!(labels_in_place);
                assert_eq!(
                    bars,
                    vec![
                        Bar { category: "A".to_string(), value: Some(10.0) },
                        Bar { category: "B".to_string(), value: Some(20.0) },
                    ]
                );
            }
            other => panic!("expected single bar, got {:?}", other),
        }
    }

    #[test]
    fn test_grouped_bar() {
        let chart = shape(&result(
            &["category", "v1", "v2"],
            vec![
                vec![json!("A"), json!(1), json!(3)],
                vec![json!("B"), json!(2), json!(4)],
            ],
        ))
        .unwrap();

        match chart {
            ChartSpec::GroupedBar {
                title,
                category_axis,
                series,
                groups,
            } => {
                assert_eq!(title, "Comparison of v1, v2 by category");
                assert_eq!(category_axis, "category");
                assert_eq!(series, vec!["v1", "v2"]);
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].values, vec![Some(1.0), Some(3.0)]);
                assert_eq!(groups[1].category, "B");
            }
            other => panic!("expected grouped bar, got {:?}", other),
        }
    }

    #[test]
    fn test_no_chart_cases() {
        assert_eq!(shape(&result(&["category", "value"], vec![])), None);
        assert_eq!(
            shape(&result(
                &["block_name", "indicator"],
                vec![vec![json!("KHED"), json!("SC")]]
            )),
            None
        );
        assert_eq!(shape(&QueryResult::error("boom")), None);
        assert_eq!(shape(&QueryResult::acknowledged(1)), None);
        assert_eq!(shape(&result(&["total"], vec![vec![json!(1)]])), None);
    }

    #[test]
    fn test_two_categories_and_a_number_gives_none() {
        let chart = shape(&result(
            &["block_name", "indicator", "total"],
            vec![vec![json!("KHED"), json!("SC"), json!(12.5)]],
        ));
        assert_eq!(chart, None);
    }

    #[test]
    fn test_all_null_columns_are_dropped() {
        let chart = shape(&result(
            &["indicator", "note", "total"],
            vec![
                vec![json!("SC"), Value::Null, json!(5.5)],
                vec![json!("ST"), Value::Null, Value::Null],
            ],
        ))
        .unwrap();
        match chart {
            ChartSpec::SingleBar { bars, .. } => {
                assert_eq!(bars.len(), 2);
                assert_eq!(bars[0].value, Some(5.5));
                assert_eq!(bars[1].value, None);
            }
            other => panic!("expected single bar, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_categories_merge() {
        let chart = shape(&result(
            &["indicator", "total"],
            vec![
                vec![json!("SC"), json!(1.5)],
                vec![json!("ST"), json!(2)],
                vec![json!("SC"), json!(3)],
            ],
        ))
        .unwrap();
        match chart {
            ChartSpec::SingleBar { bars, .. } => {
                assert_eq!(bars.len(), 2);
                assert_eq!(bars[0], Bar { category: "SC".to_string(), value: Some(4.5) });
            }
            other => panic!("expected single bar, got {:?}", other),
        }
    }

    #[test]
    fn test_reported_zero_differs_from_unreported() {
        let chart = shape(&result(
            &["indicator", "total"],
            vec![
                vec![json!("SC"), json!(0)],
                vec![json!("ST"), Value::Null],
                vec![json!("Minority"), json!(2)],
            ],
        ))
        .unwrap();
        match chart {
            ChartSpec::SingleBar { bars, .. } => {
                assert_eq!(bars[0].value, Some(0.0));
                assert_eq!(bars[1].value, None);
                assert_eq!(
                    serde_json::to_value(&bars[1]).unwrap(),
                    json!({"category": "ST", "value": null})
                );
            }
            other => panic!("expected single bar, got {:?}", other),
        }
    }

    #[test]
    fn test_many_categories_keep_first_appearance_order() {
        let rows: Vec<Vec<Value>> = (0..500)
            .rev()
            .flat_map(|i| {
                let block = format!("B{}", i);
                vec![vec![json!(block), json!(1)], vec![json!(block), json!(2)]]
            })
            .collect();
        let chart = shape(&result(&["block_name", "total"], rows)).unwrap();
        match chart {
            ChartSpec::SingleBar { bars, .. } => {
                assert_eq!(bars.len(), 500);
                assert_eq!(bars[0], Bar { category: "B499".to_string(), value: Some(3.0) });
                assert_eq!(bars[499].category, "B0");
            }
            other => panic!("expected single bar, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_looking_category_column() {
        // A year column stored as text still counts as a category.
        let chart = shape(&result(
            &["year", "total"],
            vec![vec![json!("2023"), json!(1)], vec![json!("2024"), json!(2)]],
        ))
        .unwrap();
        assert_eq!(chart.title(), "total by year");
    }
}
