//! The engine facade consumed by the request layer.
//!
//! An [`Engine`] owns no state of its own beyond configuration: every
//! operation reads the [`GridStore`] it was handed, and `ingest` publishes
//! a freshly built snapshot to it. Several engines may share one store.

use chrono::Utc;
use h3o::{CellIndex, Resolution};
use std::sync::Arc;
use tracing::info;

use crate::analytics::types::{ForecastEntry, KpiMetrics, Recommendation, SimulationResult};
use crate::analytics::{forecast, kpi, recommend, simulate};
use crate::anomalies::safety::SafetyReport;
use crate::anomalies::{Anomaly, AnomalyDetector, StatisticalDetector};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::grid::GridCellView;
use crate::ingest::{IngestOptions, IngestResult, RawProbe, Validator, build_snapshot};
use crate::store::{GridSnapshot, GridStore, StoreStatus};
use crate::trajectory::{Sequencer, Trajectory, sequencer_for};

pub struct Engine {
    store: Arc<GridStore>,
    config: EngineConfig,
    resolution: Resolution,
    validator: Validator,
    detector: AnomalyDetector,
    statistical: StatisticalDetector,
}

impl Engine {
    /// Builds an engine over `store`.
    ///
    /// # Errors
    ///
    /// Fails when `config` does not validate.
    pub fn new(store: Arc<GridStore>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            resolution: config.grid.resolution()?,
            validator: Validator::new(&config.validation),
            detector: AnomalyDetector::new(&config.anomaly),
            statistical: StatisticalDetector::new(&config.anomaly),
            store,
            config,
        })
    }

    pub fn store(&self) -> &Arc<GridStore> {
        &self.store
    }

    /// Replaces the current state with trajectories and grid built from
    /// `probes`, timestamped by the configured sequencing policy.
    pub fn ingest(&self, probes: &[RawProbe]) -> IngestResult {
        let now = Utc::now();
        let sequencer = sequencer_for(self.config.sequencing, now);
        self.ingest_at(probes, sequencer.as_ref(), now)
    }

    /// Like [`Engine::ingest`] with an explicit timestamp supplier.
    pub fn ingest_with(&self, probes: &[RawProbe], sequencer: &dyn Sequencer) -> IngestResult {
        self.ingest_at(probes, sequencer, Utc::now())
    }

    #[tracing::instrument(skip_all, fields(rows = probes.len()))]
    fn ingest_at(
        &self,
        probes: &[RawProbe],
        sequencer: &dyn Sequencer,
        ingested_at: chrono::DateTime<Utc>,
    ) -> IngestResult {
        let options = IngestOptions {
            validator: &self.validator,
            resolution: self.resolution,
            wait_threshold: self.config.grid.wait_speed_threshold,
            sequencer,
            ingested_at,
        };
        let (snapshot, result) = build_snapshot(probes, &options);
        self.store.publish(snapshot);

        info!(
            valid_rows = result.valid_rows,
            vehicles = result.vehicles,
            cells = result.total_grid_cells,
            filtered = result.filtered_errors,
            "Ingestion complete"
        );
        result
    }

    pub fn grid(&self) -> Vec<GridCellView> {
        let snapshot = self.store.snapshot();
        snapshot
            .grid
            .cells()
            .map(|c| GridCellView::new(c, snapshot.last_update))
            .collect()
    }

    #[tracing::instrument(skip(self))]
    pub fn kpis(&self) -> KpiMetrics {
        let snapshot = self.store.snapshot();
        let anomalies = self.detect(&snapshot).len();
        kpi::kpis(
            &snapshot.grid,
            snapshot.trajectories.len(),
            anomalies,
            &self.config.kpi,
        )
    }

    #[tracing::instrument(skip(self))]
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.detect(&self.store.snapshot())
    }

    pub fn safety_scan(&self) -> SafetyReport {
        SafetyReport::from_anomalies(self.anomalies())
    }

    pub fn forecast(&self, top: usize) -> Vec<ForecastEntry> {
        forecast::top_forecasts(&self.store.snapshot().grid, top, &self.config.scoring)
    }

    pub fn recommendations(&self, lat: f64, lng: f64, k: usize) -> Vec<Recommendation> {
        recommend::recommendations(&self.store.snapshot().grid, lat, lng, k, &self.config.scoring)
    }

    /// Simulates moving `relocate_share` of supply into the recommended
    /// cells. The live store is never modified.
    #[tracing::instrument(skip(self, recommendations), fields(targets = recommendations.len()))]
    pub fn run_simulation(
        &self,
        recommendations: &[Recommendation],
        relocate_share: f64,
    ) -> Result<SimulationResult, EngineError> {
        let targets: Vec<CellIndex> = recommendations.iter().map(|r| r.forecast.cell).collect();
        simulate::run_simulation(
            &self.store.snapshot().grid,
            &targets,
            relocate_share,
            &self.config.kpi,
        )
    }

    pub fn status(&self) -> StoreStatus {
        self.store.status()
    }

    /// Copies of the current trajectories with `anomaly_score` filled in
    /// by the statistical pass; unscored below its minimum population.
    pub fn scored_trajectories(&self) -> Vec<Trajectory> {
        let snapshot = self.store.snapshot();
        let refs: Vec<&Trajectory> = snapshot.trajectories.values().collect();
        self.statistical.score_trajectories(&refs)
    }

    fn detect(&self, snapshot: &GridSnapshot) -> Vec<Anomaly> {
        let refs: Vec<&Trajectory> = snapshot.trajectories.values().collect();
        self.detector.find_anomalies(&refs)
    }
}
