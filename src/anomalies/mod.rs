//! Anomaly detection over the current trajectory set.
//!
//! Detection runs as an ordered list of [`OutlierDetector`] stages:
//! per-trajectory driving rules, a population-level isolation forest and
//! a route-cluster stage. Their output is merged and deduplicated so that
//! each vehicle reports at most one anomaly per type.

pub mod clustering;
pub mod isolation;
pub mod rules;
pub mod safety;

use chrono::{DateTime, Utc};
use h3o::CellIndex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::AnomalyConfig;
use crate::grid::serialize_opt_cell;
use crate::trajectory::Trajectory;

pub use clustering::RouteClusterDetector;
pub use isolation::{IsolationForest, StatisticalDetector};
pub use rules::RuleDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    SuddenStop,
    CircularRoute,
    RouteDeviation,
    Zigzag,
    Statistical,
    RouteClusterOutlier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    #[serde(rename = "id")]
    pub vehicle_id: String,
    /// Timestamp of the trajectory's first point.
    pub ts: DateTime<Utc>,
    /// Cell of the trajectory's first point.
    #[serde(rename = "h3", serialize_with = "serialize_opt_cell")]
    pub cell: Option<CellIndex>,
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub score: f64,
    pub severity: Severity,
}

impl Anomaly {
    /// Anchors an anomaly at the start of `trajectory`; `None` for an
    /// empty trajectory.
    pub fn at_start(
        trajectory: &Trajectory,
        kind: AnomalyKind,
        severity: Severity,
        score: f64,
    ) -> Option<Self> {
        let start = trajectory.start()?;
        Some(Self {
            vehicle_id: trajectory.vehicle_id.clone(),
            ts: start.timestamp,
            cell: start.cell,
            kind,
            score,
            severity,
        })
    }
}

/// One pluggable detection stage.
pub trait OutlierDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, trajectories: &[&Trajectory]) -> Vec<Anomaly>;
}

/// The full detection pipeline.
pub struct AnomalyDetector {
    stages: Vec<Box<dyn OutlierDetector>>,
}

impl AnomalyDetector {
    /// Rules, then isolation forest, then route clustering.
    pub fn new(config: &AnomalyConfig) -> Self {
        Self::with_stages(vec![
            Box::new(RuleDetector::new(config)),
            Box::new(StatisticalDetector::new(config)),
            Box::new(RouteClusterDetector::default()),
        ])
    }

    pub fn with_stages(stages: Vec<Box<dyn OutlierDetector>>) -> Self {
        Self { stages }
    }

    pub fn find_anomalies(&self, trajectories: &[&Trajectory]) -> Vec<Anomaly> {
        let mut all = Vec::new();
        for stage in &self.stages {
            let found = stage.detect(trajectories);
            debug!(stage = stage.name(), found = found.len(), "Detection stage finished");
            all.extend(found);
        }
        dedup(all)
    }
}

/// Keeps one anomaly per (vehicle, type): the last one computed, in the
/// position where that pair first appeared.
pub fn dedup(anomalies: Vec<Anomaly>) -> Vec<Anomaly> {
    let mut slots: HashMap<(String, AnomalyKind), usize> = HashMap::new();
    let mut unique: Vec<Anomaly> = Vec::with_capacity(anomalies.len());

    for anomaly in anomalies {
        let key = (anomaly.vehicle_id.clone(), anomaly.kind);
        match slots.get(&key) {
            Some(&slot) => unique[slot] = anomaly,
            None => {
                slots.insert(key, unique.len());
                unique.push(anomaly);
            }
        }
    }

    unique
}
