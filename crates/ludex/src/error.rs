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

use crate::schema::ColumnKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("data load error: {0}")]
    Data(#[from] DataError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Fatal problems with the source file itself. Nothing downstream can
/// render once one of these is raised.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("source file contains no data rows")]
    EmptyDataset,
    #[error("column '{column}' not found in dataset")]
    ColumnNotFound { column: String },
    #[error("column '{column}' length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Per-request problems. Scoped to a single chart render; the cached
/// dataset is untouched and other requests proceed normally.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("dataset has no {kind} columns for the requested axis")]
    NoColumnsOfRequiredKind { kind: ColumnKind },
    #[error("field '{field}' is not a {expected} column")]
    InvalidAxis { field: String, expected: ColumnKind },
    #[error("field '{field}' does not exist in the dataset")]
    UnknownField { field: String },
    #[error("top-N must be a positive integer, got {value}")]
    InvalidTopN { value: usize },
}

/// Non-fatal conditions surfaced to the caller alongside results.
/// A warning disables the dependent feature; it never aborts a load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardWarning {
    #[error("column '{column}' could not be normalised: '{value}' is not count-like; keeping the column categorical")]
    Normalization { column: String, value: String },
    #[error("optional column '{column}' is absent; dependent features are disabled")]
    MissingColumn { column: String },
}

pub type Result<T> = std::result::Result<T, DashboardError>;
pub type DataResult<T> = std::result::Result<T, DataError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl DashboardError {
    /// Configuration errors are recoverable: the caller can offer a
    /// different axis or chart kind. Load errors are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DashboardError::Config(_))
    }

    pub fn category(&self) -> &'static str {
        match self {
            DashboardError::Data(_) => "Data",
            DashboardError::Config(_) => "Configuration",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            DashboardError::Data(DataError::EmptyDataset) => {
                "The dataset appears to be empty. Please provide a file with at least one row."
                    .to_string()
            }
            DashboardError::Data(DataError::Io(_)) => {
                "Unable to read the source file. Please check the path and permissions."
                    .to_string()
            }
            DashboardError::Config(ConfigError::NoColumnsOfRequiredKind { kind }) => {
                format!("This chart needs a {kind} column, but the dataset has none.")
            }
            _ => self.to_string(),
        }
    }
}
