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

//! Renderer-agnostic chart descriptors. `SpecBuilder` is a pure mapping
//! from a `DerivedTable` plus the originating request to a `ChartSpec`;
//! all validation has already happened upstream.

use crate::error::DataResult;
use crate::request::{ChartKind, ChartRequest};
use crate::table::{Column, Dataset};
use crate::transform::DerivedTable;
use itertools::Itertools;
use serde::Serialize;

/// Deterministic palette-slot assignment: each distinct label gets the
/// slot of its first appearance, so re-renders of the same data keep
/// the same colors. Actual palette colors belong to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorEncoding {
    pub field: String,
    pub assignments: Vec<(String, usize)>,
}

impl ColorEncoding {
    fn from_labels(field: &str, labels: impl Iterator<Item = Option<String>>) -> Self {
        let assignments = labels
            .flatten()
            .unique()
            .enumerate()
            .map(|(slot, label)| (label, slot))
            .collect();
        Self {
            field: field.to_string(),
            assignments,
        }
    }

    pub fn slot_of(&self, label: &str) -> Option<usize> {
        self.assignments
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, slot)| *slot)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Per-kind series payload. Value vectors stay row-aligned with their
/// label vectors; missing cells stay `None` instead of being dropped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ChartSeries {
    Bar {
        categories: Vec<Option<String>>,
        values: Vec<Option<f64>>,
        /// Display labels, two significant figures ("1.2M"). The
        /// underlying values above remain exact.
        labels: Vec<Option<String>>,
        color: ColorEncoding,
    },
    Scatter {
        x_values: Vec<Option<String>>,
        y_values: Vec<Option<f64>>,
        color: ColorEncoding,
        size_values: Option<Vec<Option<f64>>>,
    },
    Box {
        grouped_values: Vec<(String, Vec<f64>)>,
        color: ColorEncoding,
    },
    Histogram {
        buckets: Vec<HistogramBucket>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x_field: String,
    pub y_field: String,
    pub caption: Option<String>,
    pub series: ChartSeries,
}

impl ChartSpec {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpecBuilder;

impl SpecBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, derived: &DerivedTable, request: &ChartRequest) -> DataResult<ChartSpec> {
        let table = &derived.table;
        let series = match request.kind {
            ChartKind::Bar => self.bar_series(table, request)?,
            ChartKind::Scatter => self.scatter_series(table, request)?,
            ChartKind::Box => self.box_series(table, request)?,
            ChartKind::Histogram => {
                let values = numeric_values(table.require_column(&request.axes.y_field)?);
                ChartSeries::Histogram {
                    buckets: sturges_buckets(&values),
                }
            }
        };
        Ok(ChartSpec {
            kind: request.kind,
            x_field: request.axes.x_field.clone(),
            y_field: request.axes.y_field.clone(),
            caption: derived.applied.describe(),
            series,
        })
    }

    fn bar_series(&self, table: &Dataset, request: &ChartRequest) -> DataResult<ChartSeries> {
        let categories = string_values(table.require_column(&request.axes.x_field)?);
        let y = table.require_column(&request.axes.y_field)?;
        let values: Vec<Option<f64>> = (0..y.len()).map(|i| y.to_f64(i)).collect();
        let labels = values
            .iter()
            .map(|v| v.map(abbreviate_value))
            .collect();
        let color = ColorEncoding::from_labels(
            &request.axes.x_field,
            categories.iter().cloned(),
        );
        Ok(ChartSeries::Bar {
            categories,
            values,
            labels,
            color,
        })
    }

    fn scatter_series(&self, table: &Dataset, request: &ChartRequest) -> DataResult<ChartSeries> {
        let x_values = string_values(table.require_column(&request.axes.x_field)?);
        let y = table.require_column(&request.axes.y_field)?;
        let y_values = (0..y.len()).map(|i| y.to_f64(i)).collect();
        let color_field = request
            .color_field
            .as_deref()
            .unwrap_or(&request.axes.x_field);
        let color = ColorEncoding::from_labels(
            color_field,
            string_values(table.require_column(color_field)?).into_iter(),
        );
        let size_values = match &request.size_field {
            Some(field) => {
                let column = table.require_column(field)?;
                Some((0..column.len()).map(|i| column.to_f64(i)).collect())
            }
            None => None,
        };
        Ok(ChartSeries::Scatter {
            x_values,
            y_values,
            color,
            size_values,
        })
    }

    /// Groups in first-appearance order. A group whose rows all lack a
    /// measure still shows up, with an empty value list.
    fn box_series(&self, table: &Dataset, request: &ChartRequest) -> DataResult<ChartSeries> {
        let x = table.require_column(&request.axes.x_field)?;
        let y = table.require_column(&request.axes.y_field)?;
        let mut grouped: Vec<(String, Vec<f64>)> = Vec::new();
        for i in 0..table.row_count() {
            let Some(key) = x.get_string(i) else { continue };
            let slot = match grouped.iter().position(|(k, _)| *k == key) {
                Some(slot) => slot,
                None => {
                    grouped.push((key, Vec::new()));
                    grouped.len() - 1
                }
            };
            if let Some(value) = y.to_f64(i) {
                grouped[slot].1.push(value);
            }
        }
        let color = ColorEncoding::from_labels(
            &request.axes.x_field,
            grouped.iter().map(|(k, _)| Some(k.clone())),
        );
        Ok(ChartSeries::Box {
            grouped_values: grouped,
            color,
        })
    }
}

fn string_values(column: &Column) -> Vec<Option<String>> {
    (0..column.len()).map(|i| column.get_string(i)).collect()
}

fn numeric_values(column: &Column) -> Vec<f64> {
    (0..column.len()).filter_map(|i| column.to_f64(i)).collect()
}

/// Two-significant-figure display abbreviation: 1234567 → "1.2M".
/// Formatting only; underlying values stay exact.
pub fn abbreviate_value(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    let (scaled, suffix) = if magnitude >= 1e9 {
        (magnitude / 1e9, "B")
    } else if magnitude >= 1e6 {
        (magnitude / 1e6, "M")
    } else if magnitude >= 1e3 {
        (magnitude / 1e3, "K")
    } else if magnitude.fract() == 0.0 {
        return format!("{sign}{magnitude:.0}");
    } else {
        return format!("{sign}{magnitude:.1}");
    };
    if scaled >= 10.0 {
        format!("{sign}{scaled:.0}{suffix}")
    } else {
        format!("{sign}{scaled:.1}{suffix}")
    }
}

/// Sturges' rule: `ceil(log2(n)) + 1` equal-width buckets over the
/// observed range. Degenerate ranges collapse to a single bucket.
fn sturges_buckets(values: &[f64]) -> Vec<HistogramBucket> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![HistogramBucket {
            start: min,
            end: max,
            count: values.len(),
        }];
    }
    let bucket_count = ((values.len() as f64).log2().ceil() as usize) + 1;
    let width = (max - min) / bucket_count as f64;
    let mut buckets: Vec<HistogramBucket> = (0..bucket_count)
        .map(|i| HistogramBucket {
            start: min + width * i as f64,
            end: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for &value in values {
        let mut index = ((value - min) / width) as usize;
        if index >= bucket_count {
            index = bucket_count - 1;
        }
        buckets[index].count += 1;
    }
    buckets
}
