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

use crate::error::{DataError, DataResult};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    String,
}

/// A single named column's values. Payloads are shared `Arc` slices so
/// derived tables can be built without copying surviving columns.
#[derive(Debug, Clone)]
pub enum Column {
    Int64(Arc<[Option<i64>]>),
    Float64(Arc<[Option<f64>]>),
    String(Arc<[Option<Arc<str>>]>),
}

impl Column {
    pub fn from_i64(values: Vec<Option<i64>>) -> Self {
        Column::Int64(values.into())
    }

    pub fn from_f64(values: Vec<Option<f64>>) -> Self {
        Column::Float64(values.into())
    }

    pub fn from_str_values(values: Vec<Option<&str>>) -> Self {
        let data: Vec<Option<Arc<str>>> = values
            .into_iter()
            .map(|opt| opt.map(Arc::from))
            .collect();
        Column::String(data.into())
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int64(data) => data.len(),
            Column::Float64(data) => data.len(),
            Column::String(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64(_) => ColumnType::Int64,
            Column::Float64(_) => ColumnType::Float64,
            Column::String(_) => ColumnType::String,
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Int64(data) => data.par_iter().filter(|v| v.is_none()).count(),
            Column::Float64(data) => data.par_iter().filter(|v| v.is_none()).count(),
            Column::String(data) => data.par_iter().filter(|v| v.is_none()).count(),
        }
    }

    pub fn get_string(&self, index: usize) -> Option<String> {
        match self {
            Column::Int64(data) => data.get(index)?.as_ref().map(|v| v.to_string()),
            Column::Float64(data) => data.get(index)?.as_ref().map(|v| v.to_string()),
            Column::String(data) => data.get(index)?.as_ref().map(|s| s.to_string()),
        }
    }

    pub fn to_f64(&self, index: usize) -> Option<f64> {
        match self {
            Column::Int64(data) => data.get(index).and_then(|opt| opt.map(|v| v as f64)),
            Column::Float64(data) => data.get(index).copied()?,
            Column::String(data) => data
                .get(index)
                .and_then(|opt| opt.as_ref().and_then(|s| s.parse::<f64>().ok())),
        }
    }

    pub fn select_rows(&self, indices: &[usize]) -> DataResult<Column> {
        fn gather<T: Clone + Send + Sync>(
            data: &[Option<T>],
            indices: &[usize],
        ) -> DataResult<Vec<Option<T>>> {
            indices
                .par_iter()
                .map(|&i| {
                    data.get(i).cloned().ok_or(DataError::LengthMismatch {
                        column: String::new(),
                        expected: data.len(),
                        actual: i,
                    })
                })
                .collect()
        }
        Ok(match self {
            Column::Int64(data) => Column::Int64(gather(data, indices)?.into()),
            Column::Float64(data) => Column::Float64(gather(data, indices)?.into()),
            Column::String(data) => Column::String(gather(data, indices)?.into()),
        })
    }
}

/// Accumulates raw string cells and infers the narrowest type that every
/// present value fits. A column where any value refuses to parse stays
/// textual; a load never fails on a stray cell.
#[derive(Debug, Default)]
pub struct ColumnBuilder {
    values: Vec<Option<String>>,
}

impl ColumnBuilder {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: Option<String>) {
        match value {
            Some(s) if s.trim().is_empty() => self.values.push(None),
            other => self.values.push(other),
        }
    }

    pub fn build(self) -> Column {
        let mut all_int = true;
        let mut all_float = true;
        let mut present = 0usize;
        for value in self.values.iter().flatten() {
            present += 1;
            if all_int && value.parse::<i64>().is_err() {
                all_int = false;
            }
            if all_float && value.parse::<f64>().is_err() {
                all_float = false;
            }
            if !all_int && !all_float {
                break;
            }
        }
        if present == 0 {
            return Column::String(
                self.values
                    .iter()
                    .map(|_| None)
                    .collect::<Vec<Option<Arc<str>>>>()
                    .into(),
            );
        }
        if all_int {
            let data: Vec<Option<i64>> = self
                .values
                .iter()
                .map(|opt| opt.as_ref().and_then(|s| s.parse().ok()))
                .collect();
            Column::Int64(data.into())
        } else if all_float {
            let data: Vec<Option<f64>> = self
                .values
                .iter()
                .map(|opt| opt.as_ref().and_then(|s| s.parse().ok()))
                .collect();
            Column::Float64(data.into())
        } else {
            let data: Vec<Option<Arc<str>>> = self
                .values
                .into_iter()
                .map(|opt| opt.map(|s| Arc::from(s.as_str())))
                .collect();
            Column::String(data.into())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub id: DatasetId,
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub created_at: DateTime<Utc>,
    pub source_path: Option<std::path::PathBuf>,
}

impl DatasetMetadata {
    pub fn derived_from(parent: &DatasetMetadata, suffix: &str) -> Self {
        Self {
            id: DatasetId::new(),
            name: format!("{}_{suffix}", parent.name),
            row_count: 0,
            column_count: 0,
            created_at: Utc::now(),
            source_path: None,
        }
    }
}

/// An immutable tabular dataset: ordered, equally sized named columns.
/// Transformations never mutate in place; they produce new `Dataset`
/// values sharing column storage where rows survive unchanged.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: HashMap<String, Arc<Column>>,
    column_order: Vec<String>,
    pub metadata: DatasetMetadata,
}

impl Dataset {
    pub fn new(metadata: DatasetMetadata) -> Self {
        Self {
            columns: HashMap::new(),
            column_order: Vec::new(),
            metadata,
        }
    }

    /// Convenience constructor used when a table is assembled from
    /// already-typed columns rather than a file.
    pub fn from_columns(name: &str, columns: Vec<(&str, Column)>) -> DataResult<Self> {
        let metadata = DatasetMetadata {
            id: DatasetId::new(),
            name: name.to_string(),
            row_count: 0,
            column_count: 0,
            created_at: Utc::now(),
            source_path: None,
        };
        let mut dataset = Dataset::new(metadata);
        for (column_name, column) in columns {
            dataset.add_column(column_name.to_string(), column)?;
        }
        Ok(dataset)
    }

    pub fn add_column(&mut self, name: String, column: Column) -> DataResult<()> {
        if let Some(first) = self.columns.values().next() {
            if column.len() != first.len() {
                return Err(DataError::LengthMismatch {
                    column: name,
                    expected: first.len(),
                    actual: column.len(),
                });
            }
        }
        if !self.columns.contains_key(&name) {
            self.column_order.push(name.clone());
        }
        self.metadata.row_count = column.len();
        self.columns.insert(name, Arc::new(column));
        self.metadata.column_count = self.columns.len();
        Ok(())
    }

    /// Swaps a column's values for a same-length replacement. Used only
    /// by schema inference at load time, before the dataset is frozen.
    pub fn replace_column(&mut self, name: &str, column: Column) -> DataResult<()> {
        let existing = self
            .columns
            .get(name)
            .ok_or_else(|| DataError::ColumnNotFound {
                column: name.to_string(),
            })?;
        if column.len() != existing.len() {
            return Err(DataError::LengthMismatch {
                column: name.to_string(),
                expected: existing.len(),
                actual: column.len(),
            });
        }
        self.columns.insert(name.to_string(), Arc::new(column));
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.metadata.row_count
    }

    pub fn column_count(&self) -> usize {
        self.metadata.column_count
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name).map(|arc| arc.as_ref())
    }

    pub fn require_column(&self, name: &str) -> DataResult<&Column> {
        self.get_column(name).ok_or_else(|| DataError::ColumnNotFound {
            column: name.to_string(),
        })
    }

    /// New dataset restricted to the named columns, storage shared.
    pub fn select(&self, column_names: &[String]) -> DataResult<Dataset> {
        let mut metadata = DatasetMetadata::derived_from(&self.metadata, "view");
        metadata.source_path = self.metadata.source_path.clone();
        let mut result = Dataset::new(metadata);
        for name in column_names {
            let column = self.columns.get(name).ok_or_else(|| DataError::ColumnNotFound {
                column: name.clone(),
            })?;
            result.column_order.push(name.clone());
            result.columns.insert(name.clone(), Arc::clone(column));
        }
        result.metadata.column_count = result.columns.len();
        result.metadata.row_count = self.metadata.row_count;
        Ok(result)
    }

    /// New dataset with the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> DataResult<Dataset> {
        let metadata = DatasetMetadata::derived_from(&self.metadata, "rows");
        let mut result = Dataset::new(metadata);
        for name in &self.column_order {
            let column = self.columns[name].select_rows(indices).map_err(|e| match e {
                DataError::LengthMismatch { expected, actual, .. } => DataError::LengthMismatch {
                    column: name.clone(),
                    expected,
                    actual,
                },
                other => other,
            })?;
            result.add_column(name.clone(), column)?;
        }
        result.metadata.row_count = indices.len();
        Ok(result)
    }

    pub fn print_sample(&self, limit: usize) {
        let sample_size = std::cmp::min(limit, self.row_count());
        let header = self.column_order.join(" | ");
        println!("{header}");
        println!("{}", "-".repeat(header.len()));
        for i in 0..sample_size {
            let row: Vec<String> = self
                .column_order
                .iter()
                .map(|name| {
                    self.columns[name]
                        .get_string(i)
                        .unwrap_or_else(|| "NULL".to_string())
                })
                .collect();
            println!("{}", row.join(" | "));
        }
        if self.row_count() > sample_size {
            println!("... ({} more rows)", self.row_count() - sample_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(values: &[Option<&str>]) -> Column {
        let mut builder = ColumnBuilder::new();
        for v in values {
            builder.push(v.map(|s| s.to_string()));
        }
        builder.build()
    }

    #[test]
    fn builder_infers_integer_columns() {
        let column = build(&[Some("1"), Some("2"), None, Some("3")]);
        assert_eq!(column.column_type(), ColumnType::Int64);
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn builder_infers_float_when_any_value_is_fractional() {
        let column = build(&[Some("1"), Some("2.5")]);
        assert_eq!(column.column_type(), ColumnType::Float64);
    }

    #[test]
    fn builder_falls_back_to_string_on_mixed_values() {
        let column = build(&[Some("1"), Some("2"), Some("apple")]);
        assert_eq!(column.column_type(), ColumnType::String);
        assert_eq!(column.get_string(2).as_deref(), Some("apple"));
    }

    #[test]
    fn blank_cells_become_missing() {
        let column = build(&[Some("  "), Some("7")]);
        assert_eq!(column.column_type(), ColumnType::Int64);
        assert_eq!(column.null_count(), 1);
    }

    #[test]
    fn add_column_rejects_length_mismatch() {
        let mut dataset = Dataset::from_columns(
            "t",
            vec![("a", Column::from_i64(vec![Some(1), Some(2)]))],
        )
        .unwrap();
        let err = dataset
            .add_column("b".to_string(), Column::from_i64(vec![Some(1)]))
            .unwrap_err();
        assert!(matches!(err, DataError::LengthMismatch { .. }));
    }

    #[test]
    fn select_rows_preserves_requested_order() {
        let dataset = Dataset::from_columns(
            "t",
            vec![(
                "label",
                Column::from_str_values(vec![Some("a"), Some("b"), Some("c")]),
            )],
        )
        .unwrap();
        let picked = dataset.select_rows(&[2, 0]).unwrap();
        let column = picked.get_column("label").unwrap();
        assert_eq!(column.get_string(0).as_deref(), Some("c"));
        assert_eq!(column.get_string(1).as_deref(), Some("a"));
    }
}
