// Post-run resilience analysis: bottlenecks, failure points, score

use crate::ns_engine::{
    SimulationResult, METRIC_AVAILABILITY, METRIC_CONSENSUS_TIME, METRIC_LATENCY,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// Tunable detection thresholds
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Mean latency above this is flagged as a bottleneck (ms)
    pub latency_ceiling_ms: f64,

    /// Mean availability below this is flagged as a bottleneck (percent)
    pub availability_floor_pct: f64,

    /// Mean time-to-consensus above this is flagged as a bottleneck (ms)
    pub consensus_ceiling_ms: f64,

    /// Points deducted from the recovery sub-score per second of mean
    /// recovery time
    pub recovery_penalty_per_sec: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            latency_ceiling_ms: 100.0,
            availability_floor_pct: 99.0,
            consensus_ceiling_ms: 400.0,
            recovery_penalty_per_sec: 2.0,
        }
    }
}

// ============================================================================
// Analysis Record
// ============================================================================

/// The analysis section of a completed result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub bottlenecks: Vec<String>,
    pub failure_points: Vec<String>,
    pub recommendations: Vec<String>,

    /// 0-100, unweighted mean of the availability, recovery and failure
    /// sub-scores
    pub resilience_score: f64,
}

// ============================================================================
// Analysis Engine
// ============================================================================

/// Fill the analysis section of a completed result in place
///
/// Everything is recomputed from the frozen ledgers and metric series, so
/// re-running on the same result is idempotent.
pub fn analyze(result: &mut SimulationResult, config: &AnalysisConfig) {
    let mut bottlenecks = Vec::new();
    let mut failure_points = Vec::new();
    let mut recommendations = Vec::new();

    // ----- bottlenecks -----

    let mean_latency = mean_metric(result, METRIC_LATENCY);
    if let Some(latency) = mean_latency {
        if latency > config.latency_ceiling_ms {
            bottlenecks.push(format!(
                "high network latency: mean {:.1} ms exceeds the {:.0} ms ceiling",
                latency, config.latency_ceiling_ms
            ));
            recommendations.push(
                "invest in inter-region bandwidth or add relay capacity near latency hot spots"
                    .to_string(),
            );
        }
    }

    let mean_availability = mean_metric(result, METRIC_AVAILABILITY);
    if let Some(availability) = mean_availability {
        if availability < config.availability_floor_pct {
            bottlenecks.push(format!(
                "low availability: mean {:.2}% under the {:.1}% floor",
                availability, config.availability_floor_pct
            ));
            recommendations
                .push("add redundant nodes in under-provisioned regions".to_string());
        }
    }

    if let Some(consensus) = mean_metric(result, METRIC_CONSENSUS_TIME) {
        if consensus > config.consensus_ceiling_ms {
            bottlenecks.push(format!(
                "slow consensus: mean {:.1} ms exceeds the {:.0} ms ceiling",
                consensus, config.consensus_ceiling_ms
            ));
            recommendations
                .push("reduce validator geographic spread or tune consensus timeouts".to_string());
        }
    }

    // ----- failure points -----

    for record in &result.failed {
        failure_points.push(format!(
            "fault '{}' at t={} could not be applied: {} not found",
            record.event.id, record.at, record.event.target
        ));
    }
    if result.completed.len() < result.triggered.len() {
        failure_points.push(format!(
            "{} of {} triggered faults were never recovered within the run",
            result.triggered.len() - result.completed.len(),
            result.triggered.len()
        ));
    }
    if !failure_points.is_empty() {
        recommendations
            .push("improve failure detection and automated recovery paths".to_string());
    }

    // ----- resilience score -----

    let availability_score = mean_availability.unwrap_or(100.0).min(100.0);

    // Zero completed events score full recovery credit. Inherited behavior,
    // kept deliberately.
    let recovery_score = (100.0
        - result.summary.avg_recovery_time_secs * config.recovery_penalty_per_sec)
        .clamp(0.0, 100.0);

    let resolved = result.triggered.len() + result.failed.len();
    let failure_score = if resolved == 0 {
        100.0
    } else {
        100.0 - result.failed.len() as f64 / resolved as f64 * 100.0
    };

    let resilience_score =
        ((availability_score + recovery_score + failure_score) / 3.0).clamp(0.0, 100.0);

    result.analysis = Analysis {
        bottlenecks,
        failure_points,
        recommendations,
        resilience_score,
    };
}

/// Mean of one named metric across the run's samples, None when the metric
/// never appears in the series
fn mean_metric(result: &SimulationResult, name: &str) -> Option<f64> {
    let values: Vec<f64> = result
        .samples
        .iter()
        .filter_map(|s| s.values.get(name).copied())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns_engine::{FaultRecord, MetricSample, MetricsSummary, METRIC_TPS};
    use crate::ns_scenario::{FaultEvent, FaultKind, FaultTarget};
    use indexmap::IndexMap;

    fn sample(t: u64, latency: f64, availability: f64) -> MetricSample {
        let mut values = IndexMap::new();
        values.insert(METRIC_TPS.to_string(), 1000.0);
        values.insert(METRIC_LATENCY.to_string(), latency);
        values.insert(METRIC_AVAILABILITY.to_string(), availability);
        values.insert(METRIC_CONSENSUS_TIME.to_string(), latency * 3.0);
        MetricSample { timestamp: t, values }
    }

    fn event(id: &str) -> FaultEvent {
        FaultEvent {
            id: id.to_string(),
            kind: FaultKind::SoftwareUpdate,
            at: 0,
            target: FaultTarget::Global,
            duration: None,
        }
    }

    fn result_with(samples: Vec<MetricSample>) -> SimulationResult {
        SimulationResult {
            id: "run-test".to_string(),
            scenario_id: "scn".to_string(),
            topology_id: "topo".to_string(),
            started_at_ms: 0,
            ended_at_ms: 0,
            duration_secs: 30,
            seed_used: [0u8; 32],
            triggered: Vec::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            samples,
            summary: MetricsSummary::default(),
            analysis: Analysis::default(),
        }
    }

    #[test]
    fn test_healthy_run_has_no_findings() {
        let mut result = result_with(vec![sample(0, 10.0, 100.0), sample(5, 12.0, 100.0)]);
        analyze(&mut result, &AnalysisConfig::default());

        assert!(result.analysis.bottlenecks.is_empty());
        assert!(result.analysis.failure_points.is_empty());
        assert!(result.analysis.recommendations.is_empty());
        assert!((result.analysis.resilience_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_latency_bottleneck_and_recommendation() {
        let mut result = result_with(vec![sample(0, 150.0, 100.0), sample(5, 180.0, 100.0)]);
        analyze(&mut result, &AnalysisConfig::default());

        assert!(result.analysis.bottlenecks.iter().any(|b| b.contains("high network latency")));
        // Consensus rides on latency, so it fires too at 3x margin
        assert!(result.analysis.bottlenecks.iter().any(|b| b.contains("slow consensus")));
        assert_eq!(result.analysis.recommendations.len(), 2);
    }

    #[test]
    fn test_availability_bottleneck() {
        let mut result = result_with(vec![sample(0, 10.0, 95.0), sample(5, 10.0, 97.0)]);
        analyze(&mut result, &AnalysisConfig::default());
        assert!(result.analysis.bottlenecks.iter().any(|b| b.contains("low availability")));
        // Score drops with the availability sub-score
        assert!(result.analysis.resilience_score < 100.0);
    }

    #[test]
    fn test_failed_events_become_failure_points() {
        let mut result = result_with(vec![sample(0, 10.0, 100.0)]);
        result.failed.push(FaultRecord { event: event("ghost"), at: 5 });
        analyze(&mut result, &AnalysisConfig::default());

        assert_eq!(result.analysis.failure_points.len(), 1);
        assert!(result.analysis.failure_points[0].contains("ghost"));
        assert!(result
            .analysis
            .recommendations
            .iter()
            .any(|r| r.contains("failure detection")));

        // One resolved event, all failed: failure sub-score 0, others 100
        let expected = (100.0 + 100.0 + 0.0) / 3.0;
        assert!((result.analysis.resilience_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unrecovered_fault_is_a_failure_point() {
        let mut result = result_with(vec![sample(0, 10.0, 100.0)]);
        result.triggered.push(FaultRecord { event: event("lingering"), at: 5 });
        analyze(&mut result, &AnalysisConfig::default());
        assert!(result
            .analysis
            .failure_points
            .iter()
            .any(|p| p.contains("never recovered")));
    }

    #[test]
    fn test_recovery_penalty_lowers_score() {
        let mut result = result_with(vec![sample(0, 10.0, 100.0)]);
        result.triggered.push(FaultRecord { event: event("f1"), at: 5 });
        result.completed.push(FaultRecord { event: event("f1"), at: 25 });
        result.summary.avg_recovery_time_secs = 20.0;
        analyze(&mut result, &AnalysisConfig::default());

        // availability 100, recovery 100 - 20*2 = 60, failure 100
        let expected = (100.0 + 60.0 + 100.0) / 3.0;
        assert!((result.analysis.resilience_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_completed_ledger_scores_full_recovery_credit() {
        // The known asymmetry: no completed events means recovery time 0
        let mut result = result_with(vec![sample(0, 10.0, 100.0)]);
        analyze(&mut result, &AnalysisConfig::default());
        assert!((result.analysis.resilience_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_bounds() {
        // Worst case everywhere still stays within [0, 100]
        let mut result = result_with(vec![sample(0, 1000.0, 0.0)]);
        result.failed.push(FaultRecord { event: event("f1"), at: 1 });
        result.summary.avg_recovery_time_secs = 1e6;
        analyze(&mut result, &AnalysisConfig::default());
        assert!(result.analysis.resilience_score >= 0.0);
        assert!(result.analysis.resilience_score <= 100.0);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let mut result = result_with(vec![sample(0, 150.0, 95.0), sample(5, 150.0, 95.0)]);
        result.failed.push(FaultRecord { event: event("ghost"), at: 2 });

        analyze(&mut result, &AnalysisConfig::default());
        let first = result.analysis.clone();
        analyze(&mut result, &AnalysisConfig::default());
        assert_eq!(result.analysis, first);
    }

    #[test]
    fn test_empty_series_gets_neutral_availability() {
        let mut result = result_with(Vec::new());
        analyze(&mut result, &AnalysisConfig::default());
        assert!(result.analysis.bottlenecks.is_empty());
        assert!((result.analysis.resilience_score - 100.0).abs() < 1e-9);
    }
}
