//! Hex-cell aggregation of trajectory points.

use chrono::{DateTime, Utc};
use h3o::CellIndex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::geo::cell_center;

/// Serializes a cell index as its hexadecimal string form.
pub fn serialize_cell<S: Serializer>(cell: &CellIndex, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(cell)
}

pub fn serialize_opt_cell<S: Serializer>(
    cell: &Option<CellIndex>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match cell {
        Some(cell) => serializer.collect_str(cell),
        None => serializer.serialize_none(),
    }
}

/// Running aggregate for one hex cell.
///
/// `avg_spd` is always the exact mean of every sample folded in so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    #[serde(rename = "h3", serialize_with = "serialize_cell")]
    pub cell: CellIndex,
    pub trips: u64,
    #[serde(rename = "avgSpd")]
    pub avg_spd: f64,
    pub wait_proxy: u64,
}

impl Cell {
    pub fn new(cell: CellIndex) -> Self {
        Self {
            cell,
            trips: 0,
            avg_spd: 0.0,
            wait_proxy: 0,
        }
    }

    /// Folds one speed sample into the running mean.
    pub fn fold(&mut self, speed: f64, wait_threshold: f64) {
        self.trips += 1;
        self.avg_spd = (self.avg_spd * (self.trips - 1) as f64 + speed) / self.trips as f64;
        if speed < wait_threshold {
            self.wait_proxy += 1;
        }
    }
}

/// The cell map of one snapshot, ordered by cell index so that every
/// iteration (and every tie in a ranking) is reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    cells: BTreeMap<CellIndex, Cell>,
    wait_threshold: f64,
}

impl Grid {
    pub fn new(wait_threshold: f64) -> Self {
        Self {
            cells: BTreeMap::new(),
            wait_threshold,
        }
    }

    /// Folds a sample into `cell`, creating the cell on first sight.
    pub fn fold(&mut self, cell: CellIndex, speed: f64) {
        let wait_threshold = self.wait_threshold;
        self.cells
            .entry(cell)
            .or_insert_with(|| Cell::new(cell))
            .fold(speed, wait_threshold);
    }

    pub fn get(&self, cell: &CellIndex) -> Option<&Cell> {
        self.cells.get(cell)
    }

    pub fn get_mut(&mut self, cell: &CellIndex) -> Option<&mut Cell> {
        self.cells.get_mut(cell)
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CellIndex> {
        self.cells.keys()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn total_trips(&self) -> u64 {
        self.cells.values().map(|c| c.trips).sum()
    }
}

/// A cell as handed to the request layer, with its center attached.
#[derive(Debug, Clone, Serialize)]
pub struct GridCellView {
    #[serde(flatten)]
    pub cell: Cell,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl GridCellView {
    pub fn new(cell: &Cell, last_updated: DateTime<Utc>) -> Self {
        let (lat, lng) = cell_center(cell.cell);
        Self {
            cell: cell.clone(),
            lat,
            lng,
            last_updated,
        }
    }
}
