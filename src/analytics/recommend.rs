//! Relocation targets ranked around a query point.

use crate::analytics::forecast::all_forecasts;
use crate::analytics::types::Recommendation;
use crate::config::ScoringConfig;
use crate::geo::{cell_center, haversine_km};
use crate::grid::Grid;

/// Minutes saved by relocating `dist_km`, at the baseline speed and gain share.
pub fn eta_gain_minutes(dist_km: f64, scoring: &ScoringConfig) -> f64 {
    dist_km / scoring.baseline_speed_kmh * 60.0 * scoring.eta_gain_share
}

/// Every cell scored by `demand / (1 + distance_km)` from `(lat, lng)`,
/// best first, limited to `k`.
pub fn recommendations(grid: &Grid, lat: f64, lng: f64, k: usize, scoring: &ScoringConfig) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = all_forecasts(grid, scoring)
        .into_iter()
        .map(|forecast| {
            let (center_lat, center_lng) = cell_center(forecast.cell);
            let dist_km = haversine_km(lat, lng, center_lat, center_lng);
            let score = forecast.demand_pred / (1.0 + dist_km);
            Recommendation {
                forecast,
                center_lat,
                center_lng,
                dist_km,
                score,
                eta_gain_minutes: eta_gain_minutes(dist_km, scoring),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(k);
    ranked
}
