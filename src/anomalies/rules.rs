//! Per-trajectory driving rules.

use crate::anomalies::{Anomaly, AnomalyKind, OutlierDetector, Severity};
use crate::config::AnomalyConfig;
use crate::geo::{bearing_change, bearing_deg, haversine_km};
use crate::trajectory::Trajectory;

/// Sudden stops, circular routes, route deviation and zigzagging.
///
/// Each rule fires at most once per trajectory. Trajectories with fewer
/// than two points are skipped.
#[derive(Debug, Clone)]
pub struct RuleDetector {
    sudden_stop_decel: f64,
    sudden_stop_speed: f64,
    circular_end_km: f64,
    circular_min_km: f64,
    deviation_factor: f64,
    zigzag_angle_deg: f64,
    zigzag_min_turns: usize,
}

impl RuleDetector {
    pub fn new(config: &AnomalyConfig) -> Self {
        Self {
            sudden_stop_decel: config.sudden_stop_decel,
            sudden_stop_speed: config.sudden_stop_speed,
            circular_end_km: config.circular_end_km,
            circular_min_km: config.circular_min_km,
            deviation_factor: config.deviation_factor,
            zigzag_angle_deg: config.zigzag_angle_deg,
            zigzag_min_turns: config.zigzag_min_turns,
        }
    }

    pub fn detect_trajectory(&self, trajectory: &Trajectory) -> Vec<Anomaly> {
        if trajectory.len() < 2 {
            return Vec::new();
        }

        let mut found = Vec::new();

        if self.sudden_stop(trajectory) {
            found.extend(Anomaly::at_start(trajectory, AnomalyKind::SuddenStop, Severity::High, 1.0));
        }

        if self.circular_route(trajectory) {
            found.extend(Anomaly::at_start(trajectory, AnomalyKind::CircularRoute, Severity::Medium, 1.0));
        }

        if let Some(ratio) = self.route_deviation(trajectory) {
            found.extend(Anomaly::at_start(trajectory, AnomalyKind::RouteDeviation, Severity::Low, ratio));
        }

        if self.zigzag(trajectory) {
            found.extend(Anomaly::at_start(trajectory, AnomalyKind::Zigzag, Severity::Medium, 1.0));
        }

        found
    }

    /// Hard braking to a standstill away from either end of the trajectory.
    ///
    /// The braking segment must start after the first point and the stop
    /// must land before the last point.
    fn sudden_stop(&self, trajectory: &Trajectory) -> bool {
        let points = &trajectory.points;
        let last = points.len() - 1;

        (2..last).any(|i| {
            let (prev, cur) = (&points[i - 1], &points[i]);
            let dt = (cur.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
            if dt == 0.0 {
                return false;
            }
            let accel = (cur.speed - prev.speed) / dt;
            accel < self.sudden_stop_decel && cur.speed < self.sudden_stop_speed
        })
    }

    fn straight_line_km(trajectory: &Trajectory) -> f64 {
        match (trajectory.start(), trajectory.end()) {
            (Some(s), Some(e)) => haversine_km(s.lat, s.lng, e.lat, e.lng),
            _ => 0.0,
        }
    }

    fn circular_route(&self, trajectory: &Trajectory) -> bool {
        Self::straight_line_km(trajectory) < self.circular_end_km
            && trajectory.total_distance > self.circular_min_km
    }

    /// Ratio of driven to straight-line distance, when above the factor.
    fn route_deviation(&self, trajectory: &Trajectory) -> Option<f64> {
        let straight = Self::straight_line_km(trajectory);
        if straight == 0.0 {
            return None;
        }
        let ratio = trajectory.total_distance / straight;
        (ratio > self.deviation_factor).then_some(ratio)
    }

    fn zigzag(&self, trajectory: &Trajectory) -> bool {
        let bearings: Vec<f64> = trajectory
            .points
            .windows(2)
            .map(|w| bearing_deg(w[0].lat, w[0].lng, w[1].lat, w[1].lng))
            .collect();

        let sharp_turns = bearings
            .windows(2)
            .filter(|w| bearing_change(w[0], w[1]) > self.zigzag_angle_deg)
            .count();

        sharp_turns >= self.zigzag_min_turns
    }
}

impl OutlierDetector for RuleDetector {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn detect(&self, trajectories: &[&Trajectory]) -> Vec<Anomaly> {
        trajectories
            .iter()
            .flat_map(|t| self.detect_trajectory(t))
            .collect()
    }
}
