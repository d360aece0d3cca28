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

//! CSV ingestion and the load-once dataset cache.

use crate::error::{DashboardWarning, DataResult};
use crate::schema::{ColumnClassification, SchemaInferencer};
use crate::table::{ColumnBuilder, Dataset, DatasetId, DatasetMetadata};
use chrono::Utc;
use log::info;
use once_cell::sync::OnceCell;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A dataset together with the classification and warnings produced at
/// load time. This is the unit the cache hands out; callers never
/// re-run inference on a cached dataset.
#[derive(Debug)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub classification: ColumnClassification,
    pub warnings: Vec<DashboardWarning>,
}

#[derive(Debug, Default)]
pub struct CsvLoader {
    delimiter: u8,
}

impl CsvLoader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn load(&self, path: &Path) -> DataResult<Dataset> {
        let file = File::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        let mut dataset = self.read(file, &name)?;
        dataset.metadata.source_path = Some(PathBuf::from(path));
        info!(
            "loaded '{}': {} rows x {} columns",
            dataset.metadata.name,
            dataset.row_count(),
            dataset.column_count()
        );
        Ok(dataset)
    }

    /// Reads headed CSV into typed columns. Short records are padded
    /// with missing cells rather than rejected.
    pub fn read<R: Read>(&self, reader: R, name: &str) -> DataResult<Dataset> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut builders: Vec<ColumnBuilder> =
            headers.iter().map(|_| ColumnBuilder::new()).collect();

        let mut row_count = 0usize;
        for record in csv_reader.records() {
            let record = record?;
            for (i, builder) in builders.iter_mut().enumerate() {
                builder.push(record.get(i).map(|s| s.to_string()));
            }
            row_count += 1;
        }
        if row_count == 0 {
            return Err(crate::error::DataError::EmptyDataset);
        }

        let metadata = DatasetMetadata {
            id: DatasetId::new(),
            name: name.to_string(),
            row_count: 0,
            column_count: 0,
            created_at: Utc::now(),
            source_path: None,
        };
        let mut dataset = Dataset::new(metadata);
        for (header, builder) in headers.into_iter().zip(builders) {
            dataset.add_column(header, builder.build())?;
        }
        Ok(dataset)
    }
}

/// Load-once cache for the dashboard's backing dataset. The first
/// caller pays for parsing and inference; every later request reuses
/// the same `Arc`. A failed load leaves the slot empty so the next
/// request can retry.
#[derive(Debug)]
pub struct DatasetCache {
    slot: OnceCell<Arc<LoadedDataset>>,
}

impl DatasetCache {
    pub const fn new() -> Self {
        Self {
            slot: OnceCell::new(),
        }
    }

    pub fn get_or_load(
        &self,
        path: &Path,
        inferencer: &SchemaInferencer,
    ) -> DataResult<Arc<LoadedDataset>> {
        let loaded = self.slot.get_or_try_init(|| {
            let raw = CsvLoader::new().load(path)?;
            let (dataset, classification, warnings) = inferencer.classify(raw)?;
            Ok::<_, crate::error::DataError>(Arc::new(LoadedDataset {
                dataset,
                classification,
                warnings,
            }))
        })?;
        Ok(Arc::clone(loaded))
    }

    pub fn get(&self) -> Option<Arc<LoadedDataset>> {
        self.slot.get().cloned()
    }
}

impl Default for DatasetCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;

    const SAMPLE: &str = "\
title,category,installs,rating
Alpha,Arcade,\"1,000+\",4.2
Beta,Puzzle,\"50,000+\",3.9
Gamma,Arcade,\"2,000+\",4.6
";

    #[test]
    fn reads_headers_and_types() {
        let dataset = CsvLoader::new()
            .read(SAMPLE.as_bytes(), "games")
            .unwrap();
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(
            dataset.column_names(),
            &["title", "category", "installs", "rating"]
        );
        assert_eq!(
            dataset.get_column("rating").unwrap().column_type(),
            ColumnType::Float64
        );
        assert_eq!(
            dataset.get_column("installs").unwrap().column_type(),
            ColumnType::String
        );
    }

    #[test]
    fn short_records_become_missing_cells() {
        let csv = "a,b\n1,2\n3\n";
        let dataset = CsvLoader::new().read(csv.as_bytes(), "t").unwrap();
        assert_eq!(dataset.get_column("b").unwrap().null_count(), 1);
    }

    #[test]
    fn empty_file_is_an_error() {
        let err = CsvLoader::new().read("a,b\n".as_bytes(), "t").unwrap_err();
        assert!(matches!(err, crate::error::DataError::EmptyDataset));
    }

    #[test]
    fn cache_loads_once_and_reuses() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let cache = DatasetCache::new();
        let inferencer = SchemaInferencer::new();
        let first = cache.get_or_load(file.path(), &inferencer).unwrap();
        let second = cache.get_or_load(file.path(), &inferencer).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dataset.row_count(), 3);
    }
}
