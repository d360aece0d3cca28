// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Summary statistics and grouped aggregates for the insight panel.
//! Missing cells are excluded from every statistic, never counted as
//! zero; a group with no usable values is reported as `NoData` rather
//! than dropped.

use crate::error::DataResult;
use crate::table::{Column, ColumnType, Dataset};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Per-column min/max/mean over non-missing values. All three are
/// `None` when the column has no values at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStat {
    pub column: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Non-missing value count the statistics were computed over.
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Mean,
    Sum,
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AggregateFn::Mean => write!(f, "mean"),
            AggregateFn::Sum => write!(f, "sum"),
        }
    }
}

/// A group's aggregate. `NoData` marks a group whose rows exist but
/// carry no usable value for the aggregated field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GroupValue {
    Value(f64),
    NoData,
}

impl GroupValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GroupValue::Value(v) => Some(*v),
            GroupValue::NoData => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupOrder {
    /// Largest aggregate first; `NoData` groups trail, ties keep
    /// first-appearance order.
    #[default]
    ValueDescending,
    /// Order groups appeared in the dataset.
    FirstAppearance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedAggregate {
    pub group_field: String,
    pub value_field: String,
    pub function: AggregateFn,
    pub groups: Vec<(String, GroupValue)>,
}

/// Row achieving the maximum of some numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremalRow {
    pub label: String,
    pub value: f64,
    pub row_index: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsightEngine;

impl InsightEngine {
    pub fn new() -> Self {
        Self
    }

    /// One `SummaryStat` per numeric column, in dataset column order.
    pub fn summarize(&self, dataset: &Dataset) -> Vec<SummaryStat> {
        dataset
            .column_names()
            .iter()
            .filter_map(|name| {
                let column = dataset.get_column(name)?;
                match column.column_type() {
                    ColumnType::Int64 | ColumnType::Float64 => {
                        Some(summarize_column(name, column))
                    }
                    ColumnType::String => None,
                }
            })
            .collect()
    }

    /// Aggregates `value_field` per distinct value of `group_field`.
    /// Rows whose group key is missing are left out; rows whose value
    /// is missing still count toward the group's existence.
    pub fn group_aggregate(
        &self,
        dataset: &Dataset,
        group_field: &str,
        value_field: &str,
        function: AggregateFn,
        order: GroupOrder,
    ) -> DataResult<GroupedAggregate> {
        let group_column = dataset.require_column(group_field)?;
        let value_column = dataset.require_column(value_field)?;

        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut accumulators: Vec<(String, f64, usize)> = Vec::new();
        for i in 0..dataset.row_count() {
            let Some(key) = group_column.get_string(i) else {
                continue;
            };
            let slot = *slots.entry(key.clone()).or_insert_with(|| {
                accumulators.push((key, 0.0, 0));
                accumulators.len() - 1
            });
            if let Some(value) = value_column.to_f64(i) {
                accumulators[slot].1 += value;
                accumulators[slot].2 += 1;
            }
        }

        let mut groups: Vec<(String, GroupValue)> = accumulators
            .into_iter()
            .map(|(key, sum, count)| {
                let value = if count == 0 {
                    GroupValue::NoData
                } else {
                    match function {
                        AggregateFn::Sum => GroupValue::Value(sum),
                        AggregateFn::Mean => GroupValue::Value(sum / count as f64),
                    }
                };
                (key, value)
            })
            .collect();

        if order == GroupOrder::ValueDescending {
            groups.sort_by(|(_, a), (_, b)| match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }

        Ok(GroupedAggregate {
            group_field: group_field.to_string(),
            value_field: value_field.to_string(),
            function,
            groups,
        })
    }

    /// Label of the row with the maximum of `value_field`; ties go to
    /// the earliest row. `None` when no row has both a label and a
    /// value.
    pub fn extremal_row(
        &self,
        dataset: &Dataset,
        label_field: &str,
        value_field: &str,
    ) -> DataResult<Option<ExtremalRow>> {
        let label_column = dataset.require_column(label_field)?;
        let value_column = dataset.require_column(value_field)?;

        let mut best: Option<ExtremalRow> = None;
        for i in 0..dataset.row_count() {
            let (Some(label), Some(value)) =
                (label_column.get_string(i), value_column.to_f64(i))
            else {
                continue;
            };
            // Strictly greater keeps the first occurrence on ties.
            let is_better = best.as_ref().map(|b| value > b.value).unwrap_or(true);
            if is_better {
                best = Some(ExtremalRow {
                    label,
                    value,
                    row_index: i,
                });
            }
        }
        Ok(best)
    }
}

fn summarize_column(name: &str, column: &Column) -> SummaryStat {
    let mut min: Option<f64> = None;
    let mut max: Option<f64> = None;
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..column.len() {
        let Some(value) = column.to_f64(i) else {
            continue;
        };
        min = Some(min.map_or(value, |m: f64| m.min(value)));
        max = Some(max.map_or(value, |m: f64| m.max(value)));
        sum += value;
        count += 1;
    }
    SummaryStat {
        column: name.to_string(),
        min,
        max,
        mean: (count > 0).then(|| sum / count as f64),
        count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Dataset};

    fn games() -> Dataset {
        Dataset::from_columns(
            "games",
            vec![
                (
                    "category",
                    Column::from_str_values(vec![Some("Arcade"), Some("Puzzle"), Some("Arcade")]),
                ),
                (
                    "installs",
                    Column::from_i64(vec![Some(1000), Some(50000), Some(2000)]),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn summarize_excludes_missing_values() {
        let dataset = Dataset::from_columns(
            "t",
            vec![(
                "score",
                Column::from_i64(vec![Some(10), Some(20), None, Some(30)]),
            )],
        )
        .unwrap();
        let stats = InsightEngine::new().summarize(&dataset);
        assert_eq!(stats.len(), 1);
        let stat = &stats[0];
        assert_eq!(stat.max, Some(30.0));
        assert_eq!(stat.min, Some(10.0));
        assert_eq!(stat.mean, Some(20.0));
        assert_eq!(stat.count, 3);
    }

    #[test]
    fn summarize_of_all_missing_column_yields_none() {
        let dataset = Dataset::from_columns(
            "t",
            vec![("score", Column::from_i64(vec![None, None]))],
        )
        .unwrap();
        let stats = InsightEngine::new().summarize(&dataset);
        assert_eq!(stats[0].mean, None);
        assert_eq!(stats[0].count, 0);
    }

    #[test]
    fn group_sum_orders_by_value_descending() {
        let result = InsightEngine::new()
            .group_aggregate(
                &games(),
                "category",
                "installs",
                AggregateFn::Sum,
                GroupOrder::ValueDescending,
            )
            .unwrap();
        assert_eq!(
            result.groups,
            vec![
                ("Puzzle".to_string(), GroupValue::Value(50000.0)),
                ("Arcade".to_string(), GroupValue::Value(3000.0)),
            ]
        );
    }

    #[test]
    fn group_mean_divides_by_non_missing_count() {
        let dataset = Dataset::from_columns(
            "t",
            vec![
                (
                    "category",
                    Column::from_str_values(vec![Some("a"), Some("a"), Some("b")]),
                ),
                ("score", Column::from_i64(vec![Some(4), None, Some(10)])),
            ],
        )
        .unwrap();
        let result = InsightEngine::new()
            .group_aggregate(
                &dataset,
                "category",
                "score",
                AggregateFn::Mean,
                GroupOrder::FirstAppearance,
            )
            .unwrap();
        assert_eq!(
            result.groups,
            vec![
                ("a".to_string(), GroupValue::Value(4.0)),
                ("b".to_string(), GroupValue::Value(10.0)),
            ]
        );
    }

    #[test]
    fn empty_groups_are_flagged_not_dropped() {
        let dataset = Dataset::from_columns(
            "t",
            vec![
                (
                    "category",
                    Column::from_str_values(vec![Some("a"), Some("b")]),
                ),
                ("score", Column::from_i64(vec![Some(5), None])),
            ],
        )
        .unwrap();
        let result = InsightEngine::new()
            .group_aggregate(
                &dataset,
                "category",
                "score",
                AggregateFn::Sum,
                GroupOrder::ValueDescending,
            )
            .unwrap();
        assert_eq!(
            result.groups,
            vec![
                ("a".to_string(), GroupValue::Value(5.0)),
                ("b".to_string(), GroupValue::NoData),
            ]
        );
    }

    #[test]
    fn group_sums_total_matches_column_sum() {
        let dataset = games();
        let result = InsightEngine::new()
            .group_aggregate(
                &dataset,
                "category",
                "installs",
                AggregateFn::Sum,
                GroupOrder::ValueDescending,
            )
            .unwrap();
        let grouped_total: f64 = result
            .groups
            .iter()
            .filter_map(|(_, v)| v.as_f64())
            .sum();
        let column = dataset.get_column("installs").unwrap();
        let direct_total: f64 = (0..dataset.row_count())
            .filter_map(|i| column.to_f64(i))
            .sum();
        assert_eq!(grouped_total, direct_total);
    }

    #[test]
    fn extremal_row_breaks_ties_by_first_occurrence() {
        let dataset = Dataset::from_columns(
            "t",
            vec![
                (
                    "title",
                    Column::from_str_values(vec![Some("first"), Some("second")]),
                ),
                ("score", Column::from_i64(vec![Some(9), Some(9)])),
            ],
        )
        .unwrap();
        let best = InsightEngine::new()
            .extremal_row(&dataset, "title", "score")
            .unwrap()
            .unwrap();
        assert_eq!(best.label, "first");
        assert_eq!(best.row_index, 0);
        assert_eq!(best.value, 9.0);
    }

    #[test]
    fn extremal_row_skips_rows_without_label_or_value() {
        let dataset = Dataset::from_columns(
            "t",
            vec![
                (
                    "title",
                    Column::from_str_values(vec![None, Some("kept")]),
                ),
                ("score", Column::from_i64(vec![Some(100), Some(1)])),
            ],
        )
        .unwrap();
        let best = InsightEngine::new()
            .extremal_row(&dataset, "title", "score")
            .unwrap()
            .unwrap();
        assert_eq!(best.label, "kept");
    }
}
