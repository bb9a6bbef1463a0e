//! Shared state: the current trajectory set and grid snapshot.
//!
//! A [`GridStore`] holds one immutable [`GridSnapshot`] behind an `Arc`.
//! Ingestion builds a complete replacement off to the side and publishes
//! it in a single swap, so readers never block on a rebuild and never see
//! a half-built grid. Readers keep whichever snapshot they picked up for
//! as long as they need it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::config::WAIT_SPEED_THRESHOLD;
use crate::grid::Grid;
use crate::trajectory::Trajectory;

/// Number of cell keys reported by [`GridStore::status`].
const SAMPLE_KEYS: usize = 5;

#[derive(Debug, Clone)]
pub struct GridSnapshot {
    pub trajectories: BTreeMap<String, Trajectory>,
    pub grid: Grid,
    pub last_update: DateTime<Utc>,
}

impl GridSnapshot {
    pub fn empty(last_update: DateTime<Utc>) -> Self {
        Self {
            trajectories: BTreeMap::new(),
            grid: Grid::new(WAIT_SPEED_THRESHOLD),
            last_update,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.grid.is_empty()
    }
}

/// Store diagnostics for the request layer.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub grid_size: usize,
    pub trajectories_size: usize,
    pub last_update: DateTime<Utc>,
    pub has_data: bool,
    pub grid_keys: Vec<String>,
}

#[derive(Debug)]
pub struct GridStore {
    current: RwLock<Arc<GridSnapshot>>,
}

impl Default for GridStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GridStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(GridSnapshot::empty(Utc::now()))),
        }
    }

    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The snapshot current at the time of the call.
    pub fn snapshot(&self) -> Arc<GridSnapshot> {
        // The lock only guards an Arc swap, so a poisoned lock still holds a
        // complete snapshot.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replaces the current snapshot wholesale.
    pub fn publish(&self, snapshot: GridSnapshot) {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
    }

    /// Clears trajectories and grid, stamping the update time.
    pub fn reset(&self) {
        self.publish(GridSnapshot::empty(Utc::now()));
        info!("Grid store has been reset");
    }

    pub fn has_data(&self) -> bool {
        self.snapshot().has_data()
    }

    pub fn status(&self) -> StoreStatus {
        let snapshot = self.snapshot();
        StoreStatus {
            grid_size: snapshot.grid.len(),
            trajectories_size: snapshot.trajectories.len(),
            last_update: snapshot.last_update,
            has_data: snapshot.has_data(),
            grid_keys: snapshot
                .grid
                .keys()
                .take(SAMPLE_KEYS)
                .map(|k| k.to_string())
                .collect(),
        }
    }
}
