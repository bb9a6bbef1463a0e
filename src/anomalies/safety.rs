//! Safety scan: anomaly summary plus operator advice.

use serde::Serialize;

use crate::anomalies::{Anomaly, AnomalyKind, Severity};

/// More anomalies than this triggers the general review advice.
const GENERAL_REVIEW_THRESHOLD: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetySummary {
    pub total: usize,
    pub critical: usize,
    #[serde(rename = "safetyScore")]
    pub safety_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyReport {
    pub summary: SafetySummary,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<String>,
}

impl SafetyReport {
    pub fn from_anomalies(anomalies: Vec<Anomaly>) -> Self {
        Self {
            summary: summarize(&anomalies),
            recommendations: recommendations(&anomalies),
            anomalies,
        }
    }
}

/// `safety_score` is the share of non-critical anomalies, as a percentage;
/// 100 with no anomalies at all.
pub fn summarize(anomalies: &[Anomaly]) -> SafetySummary {
    let total = anomalies.len();
    let critical = anomalies.iter().filter(|a| a.severity == Severity::High).count();
    let safety_score = if total == 0 {
        100.0
    } else {
        100.0 - critical as f64 / total as f64 * 100.0
    };

    SafetySummary {
        total,
        critical,
        safety_score,
    }
}

pub fn recommendations(anomalies: &[Anomaly]) -> Vec<String> {
    let has = |kind: AnomalyKind| anomalies.iter().any(|a| a.kind == kind);
    let mut advice = Vec::new();

    if has(AnomalyKind::SuddenStop) {
        advice.push("Review driver behavior for sudden stops. Consider driver coaching.".to_string());
    }
    if has(AnomalyKind::RouteDeviation) {
        advice.push(
            "Investigate route deviations. Check for road closures or inefficient routing.".to_string(),
        );
    }
    if anomalies.len() > GENERAL_REVIEW_THRESHOLD {
        advice.push(
            "High number of anomalies detected. A general review of driver performance is recommended."
                .to_string(),
        );
    }
    if advice.is_empty() {
        advice.push("All clear. No specific safety recommendations at this time.".to_string());
    }

    advice
}
