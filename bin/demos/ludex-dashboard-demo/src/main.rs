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

//! Terminal walkthrough of the dashboard pipeline: load a games CSV,
//! show the inferred schema, run a top-10 bar request, and print the
//! insight panel plus the chart spec a renderer would consume.

use anyhow::{Context, Result};
use ludex::{
    AggregateFn, ChartKind, ChartRequest, ChartSpec, Dashboard, GroupValue, LoadedDataset,
};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let path: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "android-games.csv".to_string())
        .into();

    let dashboard = Dashboard::new();
    let loaded = dashboard
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    print_overview(&dashboard, &loaded);

    let request = ChartRequest::default_for(ChartKind::Bar, &loaded.classification)?
        .with_top_n(10);
    let view = dashboard.render(&loaded, &request)?;

    println!();
    if let Some(caption) = view.derived.applied.describe() {
        println!("=== {caption} ===");
    }
    view.derived.table.print_sample(10);

    print_insights(&dashboard, &loaded, &request)?;
    print_spec(&view.spec)?;
    Ok(())
}

fn print_overview(dashboard: &Dashboard, loaded: &LoadedDataset) {
    let dataset = &loaded.dataset;
    println!(
        "=== {} ({} rows, {} columns) ===",
        dataset.metadata.name,
        dataset.row_count(),
        dataset.column_count()
    );
    for (name, kind) in loaded.classification.iter() {
        println!("  {name}: {kind}");
    }
    for warning in &loaded.warnings {
        println!("  warning: {warning}");
    }

    println!();
    println!("=== Summary statistics ===");
    for stat in dashboard.overview(loaded) {
        match (stat.min, stat.max, stat.mean) {
            (Some(min), Some(max), Some(mean)) => println!(
                "  {}: min={min:.2} max={max:.2} mean={mean:.2} (n={})",
                stat.column, stat.count
            ),
            _ => println!("  {}: no values", stat.column),
        }
    }
}

fn print_insights(
    dashboard: &Dashboard,
    loaded: &LoadedDataset,
    request: &ChartRequest,
) -> Result<()> {
    println!();
    println!(
        "=== {} of {} by {} ===",
        AggregateFn::Sum,
        request.axes.y_field,
        request.axes.x_field
    );
    let grouped = dashboard.group_insight(loaded, request, AggregateFn::Sum)?;
    for (key, value) in grouped.groups.iter().take(10) {
        match value {
            GroupValue::Value(v) => println!("  {key}: {}", ludex::chart_spec::abbreviate_value(*v)),
            GroupValue::NoData => println!("  {key}: no data"),
        }
    }

    if let Some(top) = dashboard.extremal(loaded, request)? {
        println!(
            "Top entry: {} ({} = {})",
            top.label,
            request.axes.y_field,
            ludex::chart_spec::abbreviate_value(top.value)
        );
    }
    Ok(())
}

fn print_spec(spec: &ChartSpec) -> Result<()> {
    println!();
    println!("=== Chart spec ===");
    println!("{}", spec.to_json()?);
    Ok(())
}
