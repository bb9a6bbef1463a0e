//! Output formatting and persistence for engine results.
//!
//! Supports pretty-printing, JSON serialization, a grid CSV export and a
//! KPI CSV history that grows one row per run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, info};

use crate::analytics::types::KpiMetrics;
use crate::grid::GridCellView;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Writes a value to stdout as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Flat CSV row for one grid cell.
#[derive(Debug, Serialize)]
struct GridRow<'a> {
    h3: String,
    trips: u64,
    avg_spd: f64,
    wait_proxy: u64,
    lat: f64,
    lng: f64,
    last_updated: &'a DateTime<Utc>,
}

impl<'a> From<&'a GridCellView> for GridRow<'a> {
    fn from(view: &'a GridCellView) -> Self {
        Self {
            h3: view.cell.cell.to_string(),
            trips: view.cell.trips,
            avg_spd: view.cell.avg_spd,
            wait_proxy: view.cell.wait_proxy,
            lat: view.lat,
            lng: view.lng,
            last_updated: &view.last_updated,
        }
    }
}

/// Writes the grid to `path`, replacing any existing file.
pub fn write_grid_csv(path: &str, cells: &[GridCellView]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create '{path}'"))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for view in cells {
        writer.serialize(GridRow::from(view))?;
    }
    writer.flush()?;

    info!(path, cells = cells.len(), "Grid exported");
    Ok(())
}

#[derive(Debug, Serialize)]
struct KpiRow {
    timestamp: DateTime<Utc>,
    total_trips: u64,
    avg_speed: f64,
    eta: f64,
    coverage: f64,
    pickup_dist: f64,
    anomalies_per_1k: f64,
    co2_proxy: f64,
}

impl KpiRow {
    fn new(timestamp: DateTime<Utc>, kpis: &KpiMetrics) -> Self {
        Self {
            timestamp,
            total_trips: kpis.total_trips,
            avg_speed: kpis.avg_speed,
            eta: kpis.eta,
            coverage: kpis.coverage,
            pickup_dist: kpis.pickup_dist,
            anomalies_per_1k: kpis.anomalies_per_1k,
            co2_proxy: kpis.co2_proxy,
        }
    }
}

/// Appends a timestamped [`KpiMetrics`] row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_kpis(path: &str, kpis: &KpiMetrics) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending KPI record");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open '{path}'"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // only the first write gets a header
        .from_writer(file);

    writer.serialize(KpiRow::new(Utc::now(), kpis))?;
    writer.flush()?;

    Ok(())
}
