//! Rebalancing simulation.
//!
//! Moves a share of trips out of above-average cells into the recommended
//! target cells and compares grid KPIs before and after. The simulation
//! always works on a private copy of the grid.

use h3o::CellIndex;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::analytics::kpi::grid_kpis;
use crate::analytics::types::SimulationResult;
use crate::config::KpiConfig;
use crate::error::EngineError;
use crate::grid::Grid;

pub const NO_DONORS_MESSAGE: &str = "No supply-rich zones found to reallocate from.";

/// Runs the relocation of `relocate_share` of donor trips towards `targets`.
///
/// # Errors
///
/// [`EngineError::EmptyGrid`] when `grid` has no cells and
/// [`EngineError::InvalidShare`] when the share lies outside (0, 1].
pub fn run_simulation(
    grid: &Grid,
    targets: &[CellIndex],
    relocate_share: f64,
    config: &KpiConfig,
) -> Result<SimulationResult, EngineError> {
    if grid.is_empty() {
        return Err(EngineError::EmptyGrid);
    }
    if !(relocate_share > 0.0 && relocate_share <= 1.0) {
        return Err(EngineError::InvalidShare(relocate_share));
    }

    let kpi_before = grid_kpis(grid, config);
    let mut sim = grid.clone();

    let targets: BTreeSet<CellIndex> = targets.iter().copied().collect();
    let mean_trips = sim.total_trips() as f64 / sim.len() as f64;

    let donors: Vec<CellIndex> = sim
        .cells()
        .filter(|c| c.trips as f64 > mean_trips && !targets.contains(&c.cell))
        .map(|c| c.cell)
        .collect();

    if donors.is_empty() {
        info!(mean_trips, "No donor cells above mean demand");
        return Ok(SimulationResult {
            delta: kpi_before.delta(&kpi_before),
            kpi_after: kpi_before.clone(),
            kpi_before,
            relocated_trips: 0,
            message: Some(NO_DONORS_MESSAGE.to_string()),
        });
    }

    let mut relocated = 0u64;
    for donor in &donors {
        if let Some(cell) = sim.get_mut(donor) {
            let moved = (cell.trips as f64 * relocate_share).floor() as u64;
            cell.trips -= moved;
            relocated += moved;
        }
    }

    if !targets.is_empty() {
        let per_target = relocated / targets.len() as u64;
        for target in &targets {
            match sim.get_mut(target) {
                Some(cell) => cell.trips += per_target,
                None => warn!(target = %target, "Simulation target is not in the grid"),
            }
        }
    }

    let kpi_after = grid_kpis(&sim, config);
    info!(
        donors = donors.len(),
        targets = targets.len(),
        relocated,
        "Rebalancing simulation finished"
    );

    Ok(SimulationResult {
        delta: kpi_before.delta(&kpi_after),
        kpi_before,
        kpi_after,
        relocated_trips: relocated,
        message: None,
    })
}
