//! Per-cell demand forecasts.
//!
//! There is no time series behind a snapshot, so the forecast for a cell
//! is its current trip count with a fixed relative band around it.

use crate::analytics::types::ForecastEntry;
use crate::config::ScoringConfig;
use crate::grid::{Cell, Grid};

pub fn forecast(cell: &Cell, scoring: &ScoringConfig) -> ForecastEntry {
    let demand_pred = cell.trips as f64;
    ForecastEntry {
        cell: cell.cell,
        demand_pred,
        lo: demand_pred * (1.0 - scoring.band),
        hi: demand_pred * (1.0 + scoring.band),
    }
}

/// Forecasts for every cell, in grid order.
pub fn all_forecasts(grid: &Grid, scoring: &ScoringConfig) -> Vec<ForecastEntry> {
    grid.cells().map(|c| forecast(c, scoring)).collect()
}

/// The `top` highest-demand forecasts. Ties keep grid order.
pub fn top_forecasts(grid: &Grid, top: usize, scoring: &ScoringConfig) -> Vec<ForecastEntry> {
    let mut forecasts = all_forecasts(grid, scoring);
    forecasts.sort_by(|a, b| b.demand_pred.total_cmp(&a.demand_pred));
    forecasts.truncate(top);
    forecasts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::cell_for;
    use h3o::{CellIndex, Resolution};

    fn grid_with(counts: &[(f64, f64, usize)]) -> (Grid, Vec<CellIndex>) {
        let mut grid = Grid::new(5.0);
        let mut cells = Vec::new();
        for &(lat, lng, n) in counts {
            let cell = cell_for(lat, lng, Resolution::Eight).unwrap();
            (0..n).for_each(|_| grid.fold(cell, 10.0));
            cells.push(cell);
        }
        (grid, cells)
    }

    #[test]
    fn test_forecast_band() {
        let (grid, _) = grid_with(&[(51.128, 71.430, 10)]);
        let entry = forecast(grid.cells().next().unwrap(), &ScoringConfig::default());
        assert_eq!(entry.demand_pred, 10.0);
        assert!((entry.lo - 8.0).abs() < 1e-9);
        assert!((entry.hi - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_forecasts_sorted_and_truncated() {
        let (grid, cells) = grid_with(&[(51.10, 71.40, 3), (51.20, 71.50, 9), (51.30, 71.60, 5)]);
        let top = top_forecasts(&grid, 2, &ScoringConfig::default());
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].cell, cells[1]);
        assert_eq!(top[1].cell, cells[2]);
    }

    #[test]
    fn test_top_forecasts_larger_than_grid() {
        let (grid, _) = grid_with(&[(51.10, 71.40, 3), (51.20, 71.50, 9)]);
        assert_eq!(top_forecasts(&grid, 50, &ScoringConfig::default()).len(), 2);
    }

    #[test]
    fn test_ties_follow_grid_order() {
        let (grid, _) = grid_with(&[(51.10, 71.40, 4), (51.20, 71.50, 4), (51.30, 71.60, 4)]);
        let order: Vec<CellIndex> = grid.keys().copied().collect();
        let top: Vec<CellIndex> = top_forecasts(&grid, 3, &ScoringConfig::default())
            .into_iter()
            .map(|f| f.cell)
            .collect();
        assert_eq!(top, order);
    }

    #[test]
    fn test_empty_grid_has_no_forecasts() {
        let grid = Grid::new(5.0);
        assert!(top_forecasts(&grid, 20, &ScoringConfig::default()).is_empty());
    }
}
