//! Engine configuration.
//!
//! Stored as a JSON object on disk; every section is optional and falls
//! back to its defaults:
//! ```json
//! {
//!   "grid": { "resolution": 8 },
//!   "validation": { "bounds": { "region": { "min_lat": 50.5, "max_lat": 52.0, "min_lng": 70.5, "max_lng": 72.5 } } },
//!   "sequencing": "recorded",
//!   "kpi": { "pickup_dist_km": 2.0 }
//! }
//! ```

use anyhow::{Context, Result};
use h3o::Resolution;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Hex grid resolution used for aggregation (~0.7 km² cells).
pub const DEFAULT_RESOLUTION: u8 = 8;
/// Samples slower than this count towards a cell's wait proxy.
pub const WAIT_SPEED_THRESHOLD: f64 = 5.0;
pub const MAX_SPEED: f64 = 200.0;

/// Placeholder: average pickup distance until a pickup model exists.
pub const PICKUP_DIST_KM: f64 = 2.0;
/// Placeholder: CO2 proxy until an emissions model exists.
pub const CO2_PROXY: f64 = 1.0;
pub const DEMAND_THRESHOLD: u64 = 10;
pub const ETA_CAP_MINUTES: f64 = 60.0;

/// Half-width of the forecast band as a share of the estimate.
pub const FORECAST_BAND: f64 = 0.2;
pub const BASELINE_SPEED_KMH: f64 = 30.0;
/// Placeholder: share of travel time saved by relocating.
pub const ETA_GAIN_SHARE: f64 = 0.2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub validation: ValidationConfig,
    pub sequencing: SequencingPolicy,
    pub anomaly: AnomalyConfig,
    pub kpi: KpiConfig,
    pub scoring: ScoringConfig,
}

impl EngineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.grid.resolution()?;

        if let CoordinateBounds::Region(bbox) = &self.validation.bounds {
            if bbox.min_lat > bbox.max_lat || bbox.min_lng > bbox.max_lng {
                return Err(EngineError::Config(format!(
                    "region bounds are inverted: {bbox:?}"
                )));
            }
        }

        if self.anomaly.forest_trees == 0 || self.anomaly.forest_sample_size < 2 {
            return Err(EngineError::Config(
                "isolation forest needs at least one tree and a sample size of 2".into(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub resolution: u8,
    pub wait_speed_threshold: f64,
}

impl GridConfig {
    pub fn resolution(&self) -> Result<Resolution, EngineError> {
        Resolution::try_from(self.resolution)
            .map_err(|_| EngineError::InvalidResolution(self.resolution))
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            wait_speed_threshold: WAIT_SPEED_THRESHOLD,
        }
    }
}

/// Which coordinate range a probe must fall into to be accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateBounds {
    /// lat in [-90, 90], lng in [-180, 180].
    #[default]
    Global,
    /// A specific operating region.
    Region(BoundingBox),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// The built-in operating region.
    pub const OPERATING_REGION: BoundingBox = BoundingBox {
        min_lat: 50.5,
        max_lat: 52.0,
        min_lng: 70.5,
        max_lng: 72.5,
    };

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub bounds: CoordinateBounds,
    pub max_speed: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            bounds: CoordinateBounds::Global,
            max_speed: MAX_SPEED,
        }
    }
}

/// Where point timestamps come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencingPolicy {
    /// Ingestion time plus one second per point.
    #[default]
    Synthetic,
    /// The probe's own timestamp, synthetic when absent.
    Recorded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Speed units per second; more negative is harsher braking.
    pub sudden_stop_decel: f64,
    pub sudden_stop_speed: f64,
    pub circular_end_km: f64,
    pub circular_min_km: f64,
    pub deviation_factor: f64,
    pub zigzag_angle_deg: f64,
    pub zigzag_min_turns: usize,
    pub statistical_min_trajectories: usize,
    pub statistical_threshold: f64,
    pub forest_trees: usize,
    pub forest_sample_size: usize,
    pub forest_seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            sudden_stop_decel: -20.0,
            sudden_stop_speed: 1.0,
            circular_end_km: 0.5,
            circular_min_km: 2.0,
            deviation_factor: 1.5,
            zigzag_angle_deg: 45.0,
            zigzag_min_turns: 5,
            statistical_min_trajectories: 10,
            statistical_threshold: 0.6,
            forest_trees: 100,
            forest_sample_size: 256,
            forest_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiConfig {
    /// Cells with strictly more trips than this count as covered.
    pub demand_threshold: u64,
    pub pickup_dist_km: f64,
    pub co2_proxy: f64,
    pub eta_cap_minutes: f64,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            demand_threshold: DEMAND_THRESHOLD,
            pickup_dist_km: PICKUP_DIST_KM,
            co2_proxy: CO2_PROXY,
            eta_cap_minutes: ETA_CAP_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub band: f64,
    pub baseline_speed_kmh: f64,
    pub eta_gain_share: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            band: FORECAST_BAND,
            baseline_speed_kmh: BASELINE_SPEED_KMH,
            eta_gain_share: ETA_GAIN_SHARE,
        }
    }
}
