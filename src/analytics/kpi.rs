//! Scalar operational metrics for a grid snapshot.

use crate::analytics::types::{GridKpis, KpiMetrics};
use crate::analytics::utility::{mean, round_to, stddev};
use crate::config::KpiConfig;
use crate::grid::Grid;

/// Trip totals shared by both KPI sets.
struct Reduction {
    total_trips: u64,
    avg_speed: f64,
    coverage: f64,
}

fn reduce(grid: &Grid, demand_threshold: u64) -> Reduction {
    let mut total_trips = 0u64;
    let mut weighted_speed = 0.0;
    let mut demand_cells = 0usize;

    for cell in grid.cells() {
        total_trips += cell.trips;
        weighted_speed += cell.avg_spd * cell.trips as f64;
        if cell.trips > demand_threshold {
            demand_cells += 1;
        }
    }

    Reduction {
        total_trips,
        avg_speed: if total_trips > 0 {
            weighted_speed / total_trips as f64
        } else {
            0.0
        },
        coverage: if grid.is_empty() {
            0.0
        } else {
            demand_cells as f64 / grid.len() as f64
        },
    }
}

fn eta_minutes(pickup_dist_km: f64, avg_speed: f64) -> f64 {
    if avg_speed > 0.0 {
        pickup_dist_km / avg_speed * 60.0
    } else {
        0.0
    }
}

/// KPIs for the live snapshot. An empty grid yields all zeros, placeholders
/// included.
pub fn kpis(grid: &Grid, trajectories: usize, anomalies: usize, config: &KpiConfig) -> KpiMetrics {
    if grid.is_empty() {
        return KpiMetrics::default();
    }

    let r = reduce(grid, config.demand_threshold);
    let anomalies_per_1k = if trajectories > 0 {
        anomalies as f64 / trajectories as f64 * 1000.0
    } else {
        0.0
    };

    KpiMetrics {
        total_trips: r.total_trips,
        avg_speed: r.avg_speed,
        eta: round_to(eta_minutes(config.pickup_dist_km, r.avg_speed), 1),
        coverage: round_to(r.coverage, 2),
        pickup_dist: config.pickup_dist_km,
        anomalies_per_1k: round_to(anomalies_per_1k, 1),
        co2_proxy: config.co2_proxy,
    }
}

/// Grid-only KPIs used by the rebalancing simulator.
pub fn grid_kpis(grid: &Grid, config: &KpiConfig) -> GridKpis {
    if grid.is_empty() {
        return GridKpis::default();
    }

    let r = reduce(grid, config.demand_threshold);
    let eta = eta_minutes(config.pickup_dist_km, r.avg_speed).clamp(0.0, config.eta_cap_minutes);
    let trips: Vec<f64> = grid.cells().map(|c| c.trips as f64).collect();

    GridKpis {
        total_trips: r.total_trips,
        eta_avg: round_to(eta, 1),
        util_avg: round_to(r.coverage, 2),
        co2_emissions_proxy: round_to(config.co2_proxy, 1),
        demand_supply_gap: round_to(stddev(&trips, mean(&trips)), 2),
    }
}
