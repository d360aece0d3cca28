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

//! Chart request types. A `ChartRequest` is an immutable description of
//! what the caller wants drawn; validation against a
//! `ColumnClassification` happens before any data is touched.

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{ColumnClassification, ColumnKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    Bar,
    Scatter,
    Box,
    Histogram,
}

/// Axis pair shared by every chart kind: a categorical label axis and a
/// numeric measure axis. Histograms bin the measure and use the label
/// axis only for captions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSelection {
    pub x_field: String,
    pub y_field: String,
}

/// Equality filter on one categorical column, e.g. `category == "Arcade"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub field: String,
    pub value: String,
}

/// One user interaction's worth of chart configuration. Built fresh per
/// interaction, immutable once built, consumed once downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub axes: AxisSelection,
    pub color_field: Option<String>,
    pub size_field: Option<String>,
    pub filter: Option<CategoryFilter>,
    pub top_n: Option<usize>,
    pub sort_descending_by: Option<String>,
}

impl ChartRequest {
    pub fn new(kind: ChartKind, x_field: impl Into<String>, y_field: impl Into<String>) -> Self {
        Self {
            kind,
            axes: AxisSelection {
                x_field: x_field.into(),
                y_field: y_field.into(),
            },
            color_field: None,
            size_field: None,
            filter: None,
            top_n: None,
            sort_descending_by: None,
        }
    }

    pub fn with_color(mut self, field: impl Into<String>) -> Self {
        self.color_field = Some(field.into());
        self
    }

    pub fn with_size(mut self, field: impl Into<String>) -> Self {
        self.size_field = Some(field.into());
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(CategoryFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    pub fn with_sort_descending_by(mut self, field: impl Into<String>) -> Self {
        self.sort_descending_by = Some(field.into());
        self
    }

    /// Stock request for a chart kind: first categorical and first
    /// numeric column in classification order, mirroring what a
    /// selector UI defaults to. Fails when the dataset has no column of
    /// a required role.
    pub fn default_for(
        kind: ChartKind,
        classification: &ColumnClassification,
    ) -> ConfigResult<Self> {
        let x = classification
            .categorical_fields()
            .first()
            .copied()
            .ok_or(ConfigError::NoColumnsOfRequiredKind {
                kind: ColumnKind::Categorical,
            })?
            .to_string();
        let y = classification
            .numeric_fields()
            .first()
            .copied()
            .ok_or(ConfigError::NoColumnsOfRequiredKind {
                kind: ColumnKind::Numeric,
            })?
            .to_string();
        Ok(ChartRequest::new(kind, x, y))
    }

    /// Checks every referenced field against the classification. A
    /// request that passes here cannot fail field lookups downstream.
    pub fn validate(&self, classification: &ColumnClassification) -> ConfigResult<()> {
        require_kind(classification, &self.axes.x_field, ColumnKind::Categorical)?;
        require_kind(classification, &self.axes.y_field, ColumnKind::Numeric)?;

        if let Some(color) = &self.color_field {
            require_kind(classification, color, ColumnKind::Categorical)?;
        }
        if let Some(size) = &self.size_field {
            require_kind(classification, size, ColumnKind::Numeric)?;
        }
        if let Some(filter) = &self.filter {
            require_kind(classification, &filter.field, ColumnKind::Categorical)?;
        }
        if let Some(sort_field) = &self.sort_descending_by {
            if classification.kind_of(sort_field).is_none() {
                return Err(ConfigError::UnknownField {
                    field: sort_field.clone(),
                });
            }
        }
        if let Some(0) = self.top_n {
            return Err(ConfigError::InvalidTopN { value: 0 });
        }
        Ok(())
    }
}

fn require_kind(
    classification: &ColumnClassification,
    field: &str,
    expected: ColumnKind,
) -> ConfigResult<()> {
    match classification.kind_of(field) {
        None => Err(ConfigError::UnknownField {
            field: field.to_string(),
        }),
        Some(actual) if actual != expected => Err(ConfigError::InvalidAxis {
            field: field.to_string(),
            expected,
        }),
        Some(_) => Ok(()),
    }
}
