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

//! Per-request row selection and ordering: filter, stable descending
//! sort, top-N truncation, and projection down to the fields the chart
//! needs. The source dataset is never mutated; every pass produces a
//! fresh `DerivedTable`.

use crate::error::Result;
use crate::request::{CategoryFilter, ChartKind, ChartRequest};
use crate::schema::{ColumnClassification, ColumnKind};
use crate::table::{Column, Dataset};
use log::debug;
use std::cmp::Ordering;

/// Record of what the engine actually did, for captions like
/// "Top 10 by installs" next to the rendered chart.
#[derive(Debug, Clone, Default)]
pub struct AppliedTransform {
    pub filter: Option<CategoryFilter>,
    pub sorted_descending_by: Option<String>,
    pub limit: Option<usize>,
}

impl AppliedTransform {
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(filter) = &self.filter {
            parts.push(format!("{} = {}", filter.field, filter.value));
        }
        match (&self.sorted_descending_by, self.limit) {
            (Some(field), Some(n)) => parts.push(format!("Top {n} by {field}")),
            (Some(field), None) => parts.push(format!("Sorted by {field} (descending)")),
            (None, Some(n)) => parts.push(format!("First {n} rows")),
            (None, None) => {}
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Ordered row subset ready for aggregation and chart building.
#[derive(Debug, Clone)]
pub struct DerivedTable {
    pub table: Dataset,
    pub applied: AppliedTransform,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine;

impl QueryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(
        &self,
        dataset: &Dataset,
        classification: &ColumnClassification,
        request: &ChartRequest,
    ) -> Result<DerivedTable> {
        request.validate(classification)?;

        let mut indices: Vec<usize> = (0..dataset.row_count()).collect();

        if let Some(filter) = &request.filter {
            let column = dataset.require_column(&filter.field)?;
            indices.retain(|&i| {
                column
                    .get_string(i)
                    .map(|v| v == filter.value)
                    .unwrap_or(false)
            });
        }

        // Top-N without an explicit sort field gets an implicit
        // descending sort on the measure; truncating an unsorted
        // sequence would make the result order meaningless.
        let sort_field = request
            .sort_descending_by
            .clone()
            .or_else(|| request.top_n.map(|_| request.axes.y_field.clone()));

        if let Some(field) = &sort_field {
            let column = dataset.require_column(field)?;
            let kind = classification
                .kind_of(field)
                .unwrap_or(ColumnKind::Categorical);
            sort_descending_stable(&mut indices, column, kind);
        }

        if let Some(n) = request.top_n {
            indices.truncate(n);
        }

        let fields = projected_fields(request);
        let table = dataset.select(&fields)?.select_rows(&indices)?;

        debug!(
            "transform: {} -> {} rows, {} columns",
            dataset.row_count(),
            table.row_count(),
            table.column_count()
        );

        Ok(DerivedTable {
            table,
            applied: AppliedTransform {
                filter: request.filter.clone(),
                sorted_descending_by: sort_field,
                limit: request.top_n,
            },
        })
    }
}

/// Histograms bin the measure alone; every other kind keeps the label
/// axis and any encoding fields alongside it.
fn projected_fields(request: &ChartRequest) -> Vec<String> {
    let mut fields: Vec<String> = match request.kind {
        ChartKind::Histogram => vec![request.axes.y_field.clone()],
        _ => vec![request.axes.x_field.clone(), request.axes.y_field.clone()],
    };
    for extra in [&request.color_field, &request.size_field] {
        if let Some(field) = extra {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
    }
    fields
}

/// Stable descending sort of row indices by one column. Missing cells
/// sink to the end; equal values keep original row order.
fn sort_descending_stable(indices: &mut [usize], column: &Column, kind: ColumnKind) {
    match kind {
        ColumnKind::Numeric => indices.sort_by(|&a, &b| {
            compare_descending(column.to_f64(a), column.to_f64(b), |x, y| {
                y.partial_cmp(x).unwrap_or(Ordering::Equal)
            })
        }),
        ColumnKind::Categorical => indices.sort_by(|&a, &b| {
            compare_descending(column.get_string(a), column.get_string(b), |x, y| y.cmp(x))
        }),
    }
}

fn compare_descending<T>(
    a: Option<T>,
    b: Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
