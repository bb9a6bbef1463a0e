//! Result types produced by the analytics pipeline.

use h3o::CellIndex;
use serde::Serialize;

use crate::grid::serialize_cell;

/// Demand estimate for one cell with its heuristic band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
    #[serde(rename = "h3", serialize_with = "serialize_cell")]
    pub cell: CellIndex,
    #[serde(rename = "demandPred")]
    pub demand_pred: f64,
    pub lo: f64,
    pub hi: f64,
}

/// A forecast ranked relative to a query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub forecast: ForecastEntry,
    pub center_lat: f64,
    pub center_lng: f64,
    pub dist_km: f64,
    pub score: f64,
    pub eta_gain_minutes: f64,
}

/// Operational metrics for a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiMetrics {
    pub total_trips: u64,
    /// Trip-weighted mean of cell speeds.
    pub avg_speed: f64,
    /// Minutes.
    pub eta: f64,
    /// Share of cells above the demand threshold.
    pub coverage: f64,
    pub pickup_dist: f64,
    pub anomalies_per_1k: f64,
    pub co2_proxy: f64,
}

/// Grid-only metrics compared before and after a simulated relocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridKpis {
    pub total_trips: u64,
    /// Minutes, capped.
    pub eta_avg: f64,
    pub util_avg: f64,
    pub co2_emissions_proxy: f64,
    /// Population standard deviation of per-cell trip counts.
    pub demand_supply_gap: f64,
}

/// Signed difference between two [`GridKpis`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GridKpisDelta {
    pub total_trips: i64,
    pub eta_avg: f64,
    pub util_avg: f64,
    pub co2_emissions_proxy: f64,
    pub demand_supply_gap: f64,
}

impl GridKpis {
    pub fn delta(&self, after: &GridKpis) -> GridKpisDelta {
        GridKpisDelta {
            total_trips: after.total_trips as i64 - self.total_trips as i64,
            eta_avg: after.eta_avg - self.eta_avg,
            util_avg: after.util_avg - self.util_avg,
            co2_emissions_proxy: after.co2_emissions_proxy - self.co2_emissions_proxy,
            demand_supply_gap: after.demand_supply_gap - self.demand_supply_gap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub kpi_before: GridKpis,
    pub kpi_after: GridKpis,
    pub delta: GridKpisDelta,
    pub relocated_trips: u64,
    /// Set when the simulation was a no-op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
