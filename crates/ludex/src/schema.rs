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

//! Column role inference. Once a dataset is loaded, every column is
//! classified as either numeric (measures) or categorical (dimensions),
//! after an optional normalisation pass that rescues count-like text
//! columns such as `"10,000+"` install figures.

use crate::error::{DashboardWarning, DataResult};
use crate::table::{Column, ColumnType, Dataset};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// Column roles in dataset column order. Selector UIs iterate
/// `numeric_fields`/`categorical_fields` directly, so order stability
/// matters here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnClassification {
    entries: Vec<(String, ColumnKind)>,
}

impl ColumnClassification {
    pub fn kind_of(&self, field: &str) -> Option<ColumnKind> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, kind)| *kind)
    }

    pub fn numeric_fields(&self) -> Vec<&str> {
        self.fields_of_kind(ColumnKind::Numeric)
    }

    pub fn categorical_fields(&self) -> Vec<&str> {
        self.fields_of_kind(ColumnKind::Categorical)
    }

    pub fn fields_of_kind(&self, kind: ColumnKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}

/// Tuning knobs for inference. Defaults match the Android-games
/// dashboard this was built for, but both lists are plain data.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Lowercase substrings that mark a column as count-like, making it
    /// a candidate for `"10,000+"`-style normalisation.
    pub count_like_markers: Vec<String>,
    /// Columns the dashboard's stock views rely on. Absence produces a
    /// warning and disables the dependent view, never an error.
    pub expected_columns: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            count_like_markers: vec!["install".to_string()],
            expected_columns: vec![
                "title".to_string(),
                "category".to_string(),
                "rating".to_string(),
                "installs".to_string(),
                "price".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaInferencer {
    config: InferenceConfig,
}

impl SchemaInferencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InferenceConfig) -> Self {
        Self { config }
    }

    /// Classifies every column, normalising count-like text columns
    /// first. Consumes the dataset because normalisation replaces
    /// column storage; the returned dataset is the one to keep.
    pub fn classify(
        &self,
        mut dataset: Dataset,
    ) -> DataResult<(Dataset, ColumnClassification, Vec<DashboardWarning>)> {
        let mut warnings = Vec::new();

        let candidates: Vec<String> = dataset
            .column_names()
            .iter()
            .filter(|name| self.is_count_like(name))
            .cloned()
            .collect();
        for name in candidates {
            match self.normalise_count_column(&dataset, &name)? {
                NormalisationOutcome::Replaced(column) => {
                    debug!("normalised count-like column '{name}' to integers");
                    dataset.replace_column(&name, column)?;
                }
                NormalisationOutcome::Rejected { offending } => {
                    warn!("column '{name}' stays categorical: '{offending}' is not count-like");
                    warnings.push(DashboardWarning::Normalization {
                        column: name.clone(),
                        value: offending,
                    });
                }
                NormalisationOutcome::AlreadyNumeric => {}
            }
        }

        let entries: Vec<(String, ColumnKind)> = dataset
            .column_names()
            .iter()
            .map(|name| {
                let kind = match dataset
                    .get_column(name)
                    .map(Column::column_type)
                {
                    Some(ColumnType::Int64) | Some(ColumnType::Float64) => ColumnKind::Numeric,
                    _ => ColumnKind::Categorical,
                };
                (name.clone(), kind)
            })
            .collect();

        for expected in &self.config.expected_columns {
            let present = dataset
                .column_names()
                .iter()
                .any(|name| name.eq_ignore_ascii_case(expected));
            if !present {
                warnings.push(DashboardWarning::MissingColumn {
                    column: expected.clone(),
                });
            }
        }

        info!(
            "classified {} columns ({} numeric, {} categorical), {} warning(s)",
            entries.len(),
            entries.iter().filter(|(_, k)| *k == ColumnKind::Numeric).count(),
            entries.iter().filter(|(_, k)| *k == ColumnKind::Categorical).count(),
            warnings.len()
        );

        Ok((dataset, ColumnClassification { entries }, warnings))
    }

    fn is_count_like(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.config
            .count_like_markers
            .iter()
            .any(|marker| lower.contains(marker.as_str()))
    }

    /// All-or-nothing: either every present value parses after grouping
    /// separators and trailing `+` are stripped, or the column is left
    /// untouched. Missing cells stay missing and cast no veto.
    fn normalise_count_column(
        &self,
        dataset: &Dataset,
        name: &str,
    ) -> DataResult<NormalisationOutcome> {
        let column = dataset.require_column(name)?;
        let data = match column {
            Column::String(data) => data,
            _ => return Ok(NormalisationOutcome::AlreadyNumeric),
        };

        let mut parsed: Vec<Option<i64>> = Vec::with_capacity(data.len());
        for cell in data.iter() {
            match cell {
                None => parsed.push(None),
                Some(raw) => match parse_count(raw) {
                    Some(value) => parsed.push(Some(value)),
                    None => {
                        return Ok(NormalisationOutcome::Rejected {
                            offending: raw.to_string(),
                        })
                    }
                },
            }
        }
        Ok(NormalisationOutcome::Replaced(Column::from_i64(parsed)))
    }
}

enum NormalisationOutcome {
    Replaced(Column),
    Rejected { offending: String },
    AlreadyNumeric,
}

/// `"10,000+"` → `10000`. Strips commas and at most one trailing `+`;
/// anything left that is not a plain integer fails the parse.
fn parse_count(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let without_plus = trimmed.strip_suffix('+').unwrap_or(trimmed);
    let digits: String = without_plus.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
