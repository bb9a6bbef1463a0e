//! Route-cluster outlier stage.
//!
//! Intended to flag trajectories that fall outside every common route
//! cluster (`route_cluster_outlier`, severity medium). No clustering
//! algorithm is wired in yet, so the stage reports nothing; a real one
//! replaces [`RouteClusterDetector`] in the pipeline without touching
//! callers.

use tracing::trace;

use crate::anomalies::{Anomaly, OutlierDetector};
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, Default)]
pub struct RouteClusterDetector;

impl OutlierDetector for RouteClusterDetector {
    fn name(&self) -> &'static str {
        "route_clusters"
    }

    fn detect(&self, trajectories: &[&Trajectory]) -> Vec<Anomaly> {
        trace!(trajectories = trajectories.len(), "Route clustering not configured");
        Vec::new()
    }
}
