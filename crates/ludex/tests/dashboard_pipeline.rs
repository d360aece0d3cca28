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

use anyhow::Result;
use ludex::{
    AggregateFn, ChartKind, ChartRequest, ChartSeries, ColumnKind, ConfigError, Dashboard,
    DashboardError, GroupValue,
};
use proptest::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const GAMES_CSV: &str = "\
title,category,installs,rating,price
Sky Racer,Racing,\"1,000,000+\",4.3,0
Block Drop,Puzzle,\"50,000+\",4.7,0.99
Neon Dash,Arcade,\"1,000+\",4.2,0
Mind Bender,Puzzle,\"10,000+\",3.9,1.99
Pixel Jump,Arcade,\"2,000+\",4.6,0
";

fn write_csv(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn test_full_pipeline_on_games_csv() -> Result<()> {
    let file = write_csv(GAMES_CSV)?;
    let dashboard = Dashboard::new();
    let loaded = dashboard.open(file.path())?;

    assert_eq!(loaded.dataset.row_count(), 5);
    assert_eq!(
        loaded.classification.kind_of("installs"),
        Some(ColumnKind::Numeric)
    );
    assert_eq!(
        loaded.classification.kind_of("category"),
        Some(ColumnKind::Categorical)
    );
    assert!(loaded.warnings.is_empty());

    let request = ChartRequest::new(ChartKind::Bar, "title", "installs").with_top_n(3);
    let view = dashboard.render(&loaded, &request)?;
    assert_eq!(view.derived.table.row_count(), 3);
    assert_eq!(
        view.derived.applied.describe().as_deref(),
        Some("Top 3 by installs")
    );

    let ChartSeries::Bar {
        categories,
        values,
        labels,
        ..
    } = &view.spec.series
    else {
        panic!("expected bar series");
    };
    assert_eq!(categories[0].as_deref(), Some("Sky Racer"));
    assert_eq!(values[0], Some(1_000_000.0));
    assert_eq!(labels[0].as_deref(), Some("1.0M"));

    // The spec serializes for the renderer without loss of shape.
    let json = view.spec.to_json()?;
    assert!(json.contains("\"Bar\""));
    Ok(())
}

#[test]
fn test_group_sum_and_extremal_scenario() -> Result<()> {
    let csv = "\
category,installs
Arcade,\"1,000+\"
Puzzle,\"50,000+\"
Arcade,\"2,000+\"
";
    let file = write_csv(csv)?;
    let dashboard = Dashboard::new();
    let loaded = dashboard.open(file.path())?;

    let request = ChartRequest::new(ChartKind::Bar, "category", "installs");
    let grouped = dashboard.group_insight(&loaded, &request, AggregateFn::Sum)?;
    assert_eq!(
        grouped.groups,
        vec![
            ("Puzzle".to_string(), GroupValue::Value(50000.0)),
            ("Arcade".to_string(), GroupValue::Value(3000.0)),
        ]
    );

    let top = dashboard.extremal(&loaded, &request)?.expect("has rows");
    assert_eq!(top.label, "Puzzle");
    assert_eq!(top.value, 50000.0);

    let top_one = request.clone().with_top_n(1).with_sort_descending_by("installs");
    let view = dashboard.render(&loaded, &top_one)?;
    assert_eq!(view.derived.table.row_count(), 1);
    assert_eq!(
        view.derived
            .table
            .get_column("category")
            .and_then(|c| c.get_string(0))
            .as_deref(),
        Some("Puzzle")
    );
    Ok(())
}

#[test]
fn test_classification_is_deterministic_across_loads() -> Result<()> {
    let file = write_csv(GAMES_CSV)?;
    let first = Dashboard::new().open(file.path())?;
    let second = Dashboard::new().open(file.path())?;
    let a: Vec<_> = first.classification.iter().collect();
    let b: Vec<_> = second.classification.iter().collect();
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn test_bad_request_does_not_poison_the_cache() -> Result<()> {
    let file = write_csv(GAMES_CSV)?;
    let dashboard = Dashboard::new();
    let loaded = dashboard.open(file.path())?;

    let bad = ChartRequest::new(ChartKind::Bar, "rating", "installs");
    let err = dashboard.render(&loaded, &bad).unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(
        err,
        DashboardError::Config(ConfigError::InvalidAxis { .. })
    ));

    let good = ChartRequest::new(ChartKind::Bar, "category", "rating");
    assert!(dashboard.render(&loaded, &good).is_ok());
    Ok(())
}

#[test]
fn test_partial_normalization_falls_back_with_warning() -> Result<()> {
    let csv = "\
category,installs
Arcade,\"1,000+\"
Puzzle,unknown
";
    let file = write_csv(csv)?;
    let loaded = Dashboard::new().open(file.path())?;
    assert_eq!(
        loaded.classification.kind_of("installs"),
        Some(ColumnKind::Categorical)
    );
    assert!(loaded
        .warnings
        .iter()
        .any(|w| w.to_string().contains("installs")));

    // With no numeric column left, a stock request cannot be built.
    let err = ChartRequest::default_for(ChartKind::Bar, &loaded.classification).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::NoColumnsOfRequiredKind {
            kind: ColumnKind::Numeric
        }
    ));
    Ok(())
}

#[test]
fn test_missing_file_is_fatal() {
    let dashboard = Dashboard::new();
    let err = dashboard
        .open(std::path::Path::new("/nonexistent/games.csv"))
        .unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(err.category(), "Data");
}

proptest! {
    // Sum of per-group sums equals the whole-column sum over
    // non-missing values, whatever the grouping looks like.
    #[test]
    fn prop_group_sums_partition_the_total(
        rows in prop::collection::vec((0usize..4, prop::option::of(0i64..10_000)), 1..60)
    ) {
        let group_names = ["Arcade", "Puzzle", "Racing", "Casual"];
        let categories: Vec<Option<&str>> =
            rows.iter().map(|(g, _)| Some(group_names[*g])).collect();
        let values: Vec<Option<i64>> = rows.iter().map(|(_, v)| *v).collect();
        let direct_total: f64 = values.iter().flatten().map(|v| *v as f64).sum();

        let dataset = ludex::Dataset::from_columns(
            "t",
            vec![
                ("category", ludex::Column::from_str_values(categories)),
                ("installs", ludex::Column::from_i64(values)),
            ],
        )
        .unwrap();
        let grouped = ludex::InsightEngine::new()
            .group_aggregate(
                &dataset,
                "category",
                "installs",
                AggregateFn::Sum,
                ludex::GroupOrder::ValueDescending,
            )
            .unwrap();
        let grouped_total: f64 = grouped
            .groups
            .iter()
            .filter_map(|(_, v)| v.as_f64())
            .sum();
        prop_assert!((grouped_total - direct_total).abs() < 1e-6);
    }
}
