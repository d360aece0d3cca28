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

//! Data preparation and chart selection for tabular dashboards.
//!
//! The pipeline: a CSV file is loaded once and cached, its columns are
//! classified as numeric or categorical (with count-like text columns
//! such as `"10,000+"` normalised to integers), and each user request
//! is answered by a synchronous pass of filter/sort/top-N
//! transformation, summary and group aggregation, and a
//! renderer-agnostic chart descriptor.
//!
//! `Dashboard` is the facade over the whole pipeline; the individual
//! engines are public for callers that need finer control.

pub mod chart_spec;
pub mod error;
pub mod insight;
pub mod loader;
pub mod request;
pub mod schema;
pub mod table;
pub mod transform;

pub use chart_spec::{ChartSeries, ChartSpec, ColorEncoding, HistogramBucket, SpecBuilder};
pub use error::{ConfigError, DashboardError, DashboardWarning, DataError, Result};
pub use insight::{
    AggregateFn, ExtremalRow, GroupOrder, GroupValue, GroupedAggregate, InsightEngine,
    SummaryStat,
};
pub use loader::{CsvLoader, DatasetCache, LoadedDataset};
pub use request::{AxisSelection, CategoryFilter, ChartKind, ChartRequest};
pub use schema::{ColumnClassification, ColumnKind, InferenceConfig, SchemaInferencer};
pub use table::{Column, ColumnBuilder, ColumnType, Dataset, DatasetMetadata};
pub use transform::{AppliedTransform, DerivedTable, QueryEngine};

use std::path::Path;
use std::sync::Arc;

/// Everything the renderer needs for one chart: the derived rows for
/// tabular display, the chart descriptor, and the insight-panel
/// statistics computed over the derived rows.
#[derive(Debug)]
pub struct ChartView {
    pub derived: DerivedTable,
    pub spec: ChartSpec,
    pub summary: Vec<SummaryStat>,
}

/// Facade over the full pipeline. Holds the process-wide dataset cache;
/// the first `open` pays for parsing and classification, later calls
/// reuse the frozen dataset.
#[derive(Debug, Default)]
pub struct Dashboard {
    cache: DatasetCache,
    inferencer: SchemaInferencer,
    query: QueryEngine,
    insight: InsightEngine,
    builder: SpecBuilder,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: InferenceConfig) -> Self {
        Self {
            inferencer: SchemaInferencer::with_config(config),
            ..Self::default()
        }
    }

    /// Loads and classifies the backing file, memoized process-wide.
    pub fn open(&self, path: &Path) -> Result<Arc<LoadedDataset>> {
        Ok(self.cache.get_or_load(path, &self.inferencer)?)
    }

    /// One synchronous request pass: transform, summarize, build spec.
    pub fn render(&self, loaded: &LoadedDataset, request: &ChartRequest) -> Result<ChartView> {
        let derived = self
            .query
            .transform(&loaded.dataset, &loaded.classification, request)?;
        let spec = self.builder.build(&derived, request)?;
        let summary = self.insight.summarize(&derived.table);
        Ok(ChartView {
            derived,
            spec,
            summary,
        })
    }

    /// Grouped insight over the full dataset: `y_field` aggregated per
    /// distinct `x_field` value, largest first.
    pub fn group_insight(
        &self,
        loaded: &LoadedDataset,
        request: &ChartRequest,
        function: AggregateFn,
    ) -> Result<GroupedAggregate> {
        request.validate(&loaded.classification)?;
        Ok(self.insight.group_aggregate(
            &loaded.dataset,
            &request.axes.x_field,
            &request.axes.y_field,
            function,
            GroupOrder::ValueDescending,
        )?)
    }

    /// The dataset row maximizing the request's measure, labelled by
    /// its label axis.
    pub fn extremal(
        &self,
        loaded: &LoadedDataset,
        request: &ChartRequest,
    ) -> Result<Option<ExtremalRow>> {
        request.validate(&loaded.classification)?;
        Ok(self.insight.extremal_row(
            &loaded.dataset,
            &request.axes.x_field,
            &request.axes.y_field,
        )?)
    }

    /// Dataset-wide summary statistics, one per numeric column.
    pub fn overview(&self, loaded: &LoadedDataset) -> Vec<SummaryStat> {
        self.insight.summarize(&loaded.dataset)
    }
}
