//! Reconstructed per-vehicle paths and the policy that timestamps them.

use chrono::{DateTime, Duration, Utc};
use h3o::CellIndex;
use serde::Serialize;

use crate::config::SequencingPolicy;
use crate::geo::haversine_km;
use crate::grid::serialize_opt_cell;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
    /// `None` when the coordinate could not be mapped to a cell.
    #[serde(rename = "h3Index", serialize_with = "serialize_opt_cell")]
    pub cell: Option<CellIndex>,
    pub seq: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    #[serde(rename = "vehicleId")]
    pub vehicle_id: String,
    pub points: Vec<TrajectoryPoint>,
    /// Kilometers, summed over consecutive segments.
    #[serde(rename = "totalDistance")]
    pub total_distance: f64,
    /// Seconds, summed over consecutive timestamp deltas.
    #[serde(rename = "totalDuration")]
    pub total_duration: f64,
    #[serde(rename = "avgSpeed")]
    pub avg_speed: f64,
    #[serde(rename = "anomalyScore", skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
}

impl Trajectory {
    /// Builds a trajectory from already ordered points, computing its totals.
    pub fn from_points(vehicle_id: String, points: Vec<TrajectoryPoint>) -> Self {
        let mut total_distance = 0.0;
        let mut total_duration = 0.0;

        for pair in points.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            total_distance += haversine_km(prev.lat, prev.lng, next.lat, next.lng);
            total_duration += (next.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
        }

        let avg_speed = if points.is_empty() {
            0.0
        } else {
            points.iter().map(|p| p.speed).sum::<f64>() / points.len() as f64
        };

        Self {
            vehicle_id,
            points,
            total_distance,
            total_duration,
            avg_speed,
            anomaly_score: None,
        }
    }

    pub fn start(&self) -> Option<&TrajectoryPoint> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&TrajectoryPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Supplies the timestamp of the `index`-th point of a trajectory.
pub trait Sequencer: Send + Sync {
    fn timestamp(&self, recorded: Option<DateTime<Utc>>, index: usize) -> DateTime<Utc>;
}

/// One second per point from a fixed origin. Source data carries no
/// timestamps, so this is the default.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticClock {
    origin: DateTime<Utc>,
}

impl SyntheticClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self { origin }
    }
}

impl Sequencer for SyntheticClock {
    fn timestamp(&self, _recorded: Option<DateTime<Utc>>, index: usize) -> DateTime<Utc> {
        self.origin + Duration::seconds(index as i64)
    }
}

/// Uses the probe's own timestamp, falling back to the synthetic clock.
#[derive(Debug, Clone, Copy)]
pub struct RecordedClock {
    fallback: SyntheticClock,
}

impl RecordedClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            fallback: SyntheticClock::new(origin),
        }
    }
}

impl Sequencer for RecordedClock {
    fn timestamp(&self, recorded: Option<DateTime<Utc>>, index: usize) -> DateTime<Utc> {
        recorded.unwrap_or_else(|| self.fallback.timestamp(None, index))
    }
}

/// Builds the sequencer for `policy`, anchored at `origin`.
pub fn sequencer_for(policy: SequencingPolicy, origin: DateTime<Utc>) -> Box<dyn Sequencer> {
    match policy {
        SequencingPolicy::Synthetic => Box::new(SyntheticClock::new(origin)),
        SequencingPolicy::Recorded => Box::new(RecordedClock::new(origin)),
    }
}
