//! Trajectory reconstruction from a batch of raw probes.
//!
//! Valid probes are grouped per vehicle, ordered by sequence number,
//! timestamped by a [`Sequencer`] and folded into a fresh [`Grid`]. The
//! result is a complete [`GridSnapshot`] that the caller publishes.

use chrono::{DateTime, Utc};
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::{CoordinateBounds, ValidationConfig};
use crate::geo::cell_for;
use crate::grid::Grid;
use crate::store::GridSnapshot;
use crate::trajectory::{Sequencer, Trajectory, TrajectoryPoint};

/// One GPS sample as it arrives from the ingestion adapter.
///
/// Every field is optional so that missing or malformed values reach the
/// validator instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawProbe {
    #[serde(rename = "randomized_id", alias = "vehicle_id", default)]
    pub vehicle_id: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub lng: Option<f64>,
    #[serde(rename = "spd", alias = "speed", default, deserialize_with = "csv::invalid_option")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub seq: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawProbe {
    pub fn new(vehicle_id: &str, lat: f64, lng: f64, speed: f64, seq: i64) -> Self {
        Self {
            vehicle_id: Some(vehicle_id.to_string()),
            lat: Some(lat),
            lng: Some(lng),
            speed: Some(speed),
            seq: Some(seq),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Why a probe was rejected. A probe is charged to its first failing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Coordinates,
    Speed,
    VehicleId,
    Sequence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub coordinates: usize,
    pub speed: usize,
    pub vehicle_id: usize,
    pub sequence: usize,
}

impl RejectionCounts {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Coordinates => self.coordinates += 1,
            Rejection::Speed => self.speed += 1,
            Rejection::VehicleId => self.vehicle_id += 1,
            Rejection::Sequence => self.sequence += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.coordinates + self.speed + self.vehicle_id + self.sequence
    }
}

/// A probe that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidProbe {
    pub vehicle_id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub seq: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Row-level validator for the configured coordinate bounds.
#[derive(Debug, Clone)]
pub struct Validator {
    bounds: CoordinateBounds,
    max_speed: f64,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            bounds: config.bounds.clone(),
            max_speed: config.max_speed,
        }
    }

    fn coordinates_ok(&self, lat: f64, lng: f64) -> bool {
        match &self.bounds {
            CoordinateBounds::Global => {
                (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
            }
            CoordinateBounds::Region(bbox) => bbox.contains(lat, lng),
        }
    }

    pub fn validate(&self, probe: &RawProbe) -> Result<ValidProbe, Rejection> {
        let (lat, lng) = match (probe.lat, probe.lng) {
            (Some(lat), Some(lng)) if self.coordinates_ok(lat, lng) => (lat, lng),
            _ => return Err(Rejection::Coordinates),
        };

        let speed = match probe.speed {
            Some(speed) if (0.0..=self.max_speed).contains(&speed) => speed,
            _ => return Err(Rejection::Speed),
        };

        let vehicle_id = match probe.vehicle_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(Rejection::VehicleId),
        };

        let seq = probe.seq.ok_or(Rejection::Sequence)?;

        Ok(ValidProbe {
            vehicle_id,
            lat,
            lng,
            speed,
            seq,
            timestamp: probe.timestamp,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestResult {
    pub rows_ingested: usize,
    pub valid_rows: usize,
    pub vehicles: usize,
    pub zones_affected: usize,
    pub total_grid_cells: usize,
    pub filtered_errors: usize,
    pub rejected: RejectionCounts,
}

/// Ingestion parameters resolved from the engine configuration.
pub struct IngestOptions<'a> {
    pub validator: &'a Validator,
    pub resolution: Resolution,
    pub wait_threshold: f64,
    pub sequencer: &'a dyn Sequencer,
    pub ingested_at: DateTime<Utc>,
}

/// Builds a complete snapshot from `probes`. Nothing is carried over from
/// any previous snapshot.
pub fn build_snapshot(probes: &[RawProbe], options: &IngestOptions<'_>) -> (GridSnapshot, IngestResult) {
    let mut rejected = RejectionCounts::default();
    let mut by_vehicle: BTreeMap<String, Vec<ValidProbe>> = BTreeMap::new();

    for probe in probes {
        match options.validator.validate(probe) {
            Ok(valid) => by_vehicle.entry(valid.vehicle_id.clone()).or_default().push(valid),
            Err(rejection) => rejected.record(rejection),
        }
    }

    info!(
        rows = probes.len(),
        vehicles = by_vehicle.len(),
        invalid = rejected.total(),
        "Probe batch validated"
    );

    let mut snapshot = GridSnapshot::empty(options.ingested_at);
    snapshot.grid = Grid::new(options.wait_threshold);
    let mut unmapped = 0usize;

    for (vehicle_id, mut points) in by_vehicle {
        // Stable: equal sequence numbers keep their arrival order.
        points.sort_by_key(|p| p.seq);

        let trajectory = reconstruct(vehicle_id, &points, options);
        for point in &trajectory.points {
            match point.cell {
                Some(cell) => snapshot.grid.fold(cell, point.speed),
                None => unmapped += 1,
            }
        }
        snapshot
            .trajectories
            .insert(trajectory.vehicle_id.clone(), trajectory);
    }

    if unmapped > 0 {
        warn!(unmapped, "Points skipped: no hex cell for coordinate");
    }

    let result = IngestResult {
        rows_ingested: probes.len(),
        valid_rows: probes.len() - rejected.total(),
        vehicles: snapshot.trajectories.len(),
        zones_affected: snapshot.grid.len(),
        total_grid_cells: snapshot.grid.len(),
        filtered_errors: rejected.total(),
        rejected,
    };

    debug!(cells = result.total_grid_cells, "Hex grid built");
    (snapshot, result)
}

fn reconstruct(vehicle_id: String, probes: &[ValidProbe], options: &IngestOptions<'_>) -> Trajectory {
    let points = probes
        .iter()
        .enumerate()
        .map(|(i, probe)| TrajectoryPoint {
            lat: probe.lat,
            lng: probe.lng,
            speed: probe.speed,
            timestamp: options.sequencer.timestamp(probe.timestamp, i),
            cell: cell_for(probe.lat, probe.lng, options.resolution).ok(),
            seq: probe.seq,
        })
        .collect();

    Trajectory::from_points(vehicle_id, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundingBox;
    use crate::geo::haversine_km;
    use crate::trajectory::SyntheticClock;
    use chrono::TimeZone;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn build(probes: &[RawProbe], validator: &Validator) -> (GridSnapshot, IngestResult) {
        let clock = SyntheticClock::new(origin());
        let options = IngestOptions {
            validator,
            resolution: Resolution::Eight,
            wait_threshold: 5.0,
            sequencer: &clock,
            ingested_at: origin(),
        };
        build_snapshot(probes, &options)
    }

    fn global() -> Validator {
        Validator::new(&ValidationConfig::default())
    }

    #[test]
    fn test_validator_rejection_reasons() {
        let v = global();
        assert_eq!(v.validate(&RawProbe::new("a", 91.0, 0.0, 1.0, 1)), Err(Rejection::Coordinates));
        assert_eq!(v.validate(&RawProbe::new("a", 0.0, -181.0, 1.0, 1)), Err(Rejection::Coordinates));
        assert_eq!(v.validate(&RawProbe::new("a", 0.0, 0.0, -0.1, 1)), Err(Rejection::Speed));
        assert_eq!(v.validate(&RawProbe::new("a", 0.0, 0.0, 200.1, 1)), Err(Rejection::Speed));
        assert_eq!(v.validate(&RawProbe::new("", 0.0, 0.0, 1.0, 1)), Err(Rejection::VehicleId));

        let mut no_seq = RawProbe::new("a", 0.0, 0.0, 1.0, 1);
        no_seq.seq = None;
        assert_eq!(v.validate(&no_seq), Err(Rejection::Sequence));

        assert!(v.validate(&RawProbe::new("a", 90.0, 180.0, 200.0, 1)).is_ok());
    }

    #[test]
    fn test_region_validator() {
        let config = ValidationConfig {
            bounds: CoordinateBounds::Region(BoundingBox::OPERATING_REGION),
            ..Default::default()
        };
        let v = Validator::new(&config);
        assert!(v.validate(&RawProbe::new("a", 51.1, 71.4, 10.0, 1)).is_ok());
        assert_eq!(v.validate(&RawProbe::new("a", 40.0, 71.4, 10.0, 1)), Err(Rejection::Coordinates));
    }

    #[test]
    fn test_empty_batch() {
        let (snapshot, result) = build(&[], &global());
        assert_eq!(result, IngestResult::default());
        assert!(snapshot.grid.is_empty());
        assert!(snapshot.trajectories.is_empty());
    }

    #[test]
    fn test_all_invalid_batch() {
        let probes = vec![
            RawProbe::new("a", 100.0, 0.0, 1.0, 1),
            RawProbe::new("", 1.0, 1.0, 1.0, 1),
            RawProbe::default(),
        ];
        let (snapshot, result) = build(&probes, &global());
        assert_eq!(result.rows_ingested, 3);
        assert_eq!(result.valid_rows, 0);
        assert_eq!(result.vehicles, 0);
        assert_eq!(result.total_grid_cells, 0);
        assert_eq!(result.filtered_errors, 3);
        assert_eq!(result.rejected.coordinates, 2);
        assert_eq!(result.rejected.vehicle_id, 1);
        assert!(snapshot.grid.is_empty());
    }

    #[test]
    fn test_points_sorted_by_sequence_stably() {
        let probes = vec![
            RawProbe::new("v", 51.10, 71.40, 10.0, 3),
            RawProbe::new("v", 51.11, 71.41, 20.0, 1),
            RawProbe::new("v", 51.12, 71.42, 30.0, 2),
            RawProbe::new("v", 51.13, 71.43, 40.0, 2),
        ];
        let (snapshot, _) = build(&probes, &global());
        let t = &snapshot.trajectories["v"];
        let speeds: Vec<f64> = t.points.iter().map(|p| p.speed).collect();
        assert_eq!(speeds, vec![20.0, 30.0, 40.0, 10.0]);
    }

    #[test]
    fn test_trajectory_totals() {
        let probes = vec![
            RawProbe::new("v", 51.10, 71.40, 10.0, 1),
            RawProbe::new("v", 51.11, 71.40, 20.0, 2),
            RawProbe::new("v", 51.12, 71.40, 30.0, 3),
        ];
        let (snapshot, result) = build(&probes, &global());
        let t = &snapshot.trajectories["v"];

        let expected = haversine_km(51.10, 71.40, 51.11, 71.40) + haversine_km(51.11, 71.40, 51.12, 71.40);
        assert!((t.total_distance - expected).abs() < 1e-9);
        assert_eq!(t.total_duration, 2.0);
        assert_eq!(t.avg_speed, 20.0);
        assert_eq!(t.points[2].timestamp, origin() + chrono::Duration::seconds(2));
        assert_eq!(t.anomaly_score, None);
        assert_eq!(result.valid_rows, 3);
        assert_eq!(result.vehicles, 1);
    }

    #[test]
    fn test_grid_receives_every_point() {
        let probes = vec![
            RawProbe::new("a", 51.128, 71.430, 10.0, 1),
            RawProbe::new("a", 51.128, 71.430, 2.0, 2),
            RawProbe::new("b", 51.128, 71.430, 30.0, 1),
        ];
        let (snapshot, result) = build(&probes, &global());
        assert_eq!(result.total_grid_cells, 1);
        assert_eq!(result.zones_affected, 1);
        let cell = snapshot.grid.cells().next().unwrap();
        assert_eq!(cell.trips, 3);
        assert!((cell.avg_spd - 14.0).abs() < 1e-9);
        assert_eq!(cell.wait_proxy, 1);
    }
}
