// Scripted fault scenarios: typed events, targets and sampling policy

use crate::ns_interface::{EventId, NodeId, NsTime, RegionId, GLOBAL_TARGET};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Fault Kinds
// ============================================================================

/// Load multiplier applied by a DDoS event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DdosIntensity {
    Low,
    Medium,
    High,
}

impl DdosIntensity {
    /// Factor the target's CPU/memory/network load is multiplied by
    pub fn load_factor(self) -> f64 {
        match self {
            DdosIntensity::Low => 2.0,
            DdosIntensity::Medium => 3.0,
            DdosIntensity::High => 5.0,
        }
    }

    /// Extra errors accumulated per touching connection while under attack
    pub fn error_burst(self) -> u64 {
        match self {
            DdosIntensity::Low => 5,
            DdosIntensity::Medium => 15,
            DdosIntensity::High => 40,
        }
    }
}

/// The six scripted perturbation types with their typed parameters
///
/// Each variant knows how to apply itself to a working topology and how to
/// revert on completion; that dispatch lives in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FaultKind {
    /// Target node goes offline, links severed
    NodeFailure,

    /// Connections straddling the isolated regions and the rest go inactive
    NetworkPartition {
        /// Regions on the isolated side, in addition to a region target
        #[serde(default)]
        regions: Vec<RegionId>,
    },

    /// Latency multiplied on connections (global) or node uplinks (region/node)
    LatencySpike { multiplier: f64 },

    /// Bandwidth divided on connections (global) or node uplinks (region/node)
    BandwidthThrottle { factor: f64 },

    /// Target load percentages multiplied by the intensity factor, capped at 100
    DdosAttack { intensity: DdosIntensity },

    /// Reserved; participates in the ledgers but applies no effect
    SoftwareUpdate,
}

impl FaultKind {
    pub fn label(&self) -> &'static str {
        match self {
            FaultKind::NodeFailure => "node-failure",
            FaultKind::NetworkPartition { .. } => "network-partition",
            FaultKind::LatencySpike { .. } => "latency-spike",
            FaultKind::BandwidthThrottle { .. } => "bandwidth-throttle",
            FaultKind::DdosAttack { .. } => "ddos-attack",
            FaultKind::SoftwareUpdate => "software-update",
        }
    }
}

// ============================================================================
// Targets
// ============================================================================

/// What a fault event is aimed at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultTarget {
    Node(NodeId),
    Region(RegionId),
    Global,
}

impl fmt::Display for FaultTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultTarget::Node(id) => write!(f, "node {}", id),
            FaultTarget::Region(id) => write!(f, "region {}", id),
            FaultTarget::Global => write!(f, "{}", GLOBAL_TARGET),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// A single scripted perturbation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub id: EventId,

    #[serde(flatten)]
    pub kind: FaultKind,

    /// Offset from scenario start, in simulated seconds
    pub at: NsTime,

    pub target: FaultTarget,

    /// Seconds until the effect is reverted. An event without a duration is
    /// triggered but never auto-completes within the run.
    #[serde(default)]
    pub duration: Option<NsTime>,
}

// ============================================================================
// Scenario
// ============================================================================

/// How and which metrics are sampled during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPolicy {
    /// Sampling interval in simulated seconds
    pub sample_interval: NsTime,

    /// Metric names to record; empty means all
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Default for MetricsPolicy {
    fn default() -> Self {
        Self { sample_interval: 5, targets: Vec::new() }
    }
}

/// An ordered, named bundle of fault events plus a sampling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Total run duration in simulated seconds
    pub duration: NsTime,

    pub events: Vec<FaultEvent>,

    #[serde(default)]
    pub metrics: MetricsPolicy,
}

impl Scenario {
    /// Events cloned and ordered by scheduled offset (stable for equal offsets)
    pub fn ordered_events(&self) -> Vec<FaultEvent> {
        let mut events = self.events.clone();
        events.sort_by_key(|e| e.at);
        events
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.duration == 0 {
            return Err(ScenarioError::ZeroDuration);
        }
        if self.metrics.sample_interval == 0 {
            return Err(ScenarioError::ZeroSampleInterval);
        }
        let mut seen = BTreeSet::new();
        for event in &self.events {
            if !seen.insert(event.id.as_str()) {
                return Err(ScenarioError::DuplicateEventId(event.id.clone()));
            }
            match &event.kind {
                FaultKind::LatencySpike { multiplier } if *multiplier <= 0.0 => {
                    return Err(ScenarioError::NonPositiveFactor(event.id.clone()));
                }
                FaultKind::BandwidthThrottle { factor } if *factor <= 0.0 => {
                    return Err(ScenarioError::NonPositiveFactor(event.id.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Scenario-level validation failures
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioError {
    ZeroDuration,
    ZeroSampleInterval,
    DuplicateEventId(EventId),
    NonPositiveFactor(EventId),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::ZeroDuration => write!(f, "scenario duration must be positive"),
            ScenarioError::ZeroSampleInterval => {
                write!(f, "metric sample interval must be positive")
            }
            ScenarioError::DuplicateEventId(id) => write!(f, "duplicate event id '{}'", id),
            ScenarioError::NonPositiveFactor(id) => {
                write!(f, "event '{}' has a non-positive multiplier", id)
            }
        }
    }
}

impl std::error::Error for ScenarioError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_with(events: Vec<FaultEvent>) -> Scenario {
        Scenario {
            id: "scn-test".to_string(),
            name: "test".to_string(),
            description: String::new(),
            duration: 60,
            events,
            metrics: MetricsPolicy::default(),
        }
    }

    #[test]
    fn test_ordered_events_sorts_by_offset() {
        let scenario = scenario_with(vec![
            FaultEvent {
                id: "late".to_string(),
                kind: FaultKind::SoftwareUpdate,
                at: 30,
                target: FaultTarget::Global,
                duration: None,
            },
            FaultEvent {
                id: "early".to_string(),
                kind: FaultKind::NodeFailure,
                at: 5,
                target: FaultTarget::Node("n1".to_string()),
                duration: Some(10),
            },
        ]);

        let ordered = scenario.ordered_events();
        assert_eq!(ordered[0].id, "early");
        assert_eq!(ordered[1].id, "late");
    }

    #[test]
    fn test_validate_rejects_zero_duration_and_interval() {
        let mut scenario = scenario_with(Vec::new());
        scenario.duration = 0;
        assert_eq!(scenario.validate(), Err(ScenarioError::ZeroDuration));

        scenario.duration = 60;
        scenario.metrics.sample_interval = 0;
        assert_eq!(scenario.validate(), Err(ScenarioError::ZeroSampleInterval));
    }

    #[test]
    fn test_validate_rejects_duplicate_event_ids() {
        let event = FaultEvent {
            id: "dup".to_string(),
            kind: FaultKind::SoftwareUpdate,
            at: 1,
            target: FaultTarget::Global,
            duration: None,
        };
        let scenario = scenario_with(vec![event.clone(), event]);
        assert_eq!(
            scenario.validate(),
            Err(ScenarioError::DuplicateEventId("dup".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_non_positive_multiplier() {
        let scenario = scenario_with(vec![FaultEvent {
            id: "spike".to_string(),
            kind: FaultKind::LatencySpike { multiplier: 0.0 },
            at: 1,
            target: FaultTarget::Global,
            duration: Some(5),
        }]);
        assert_eq!(
            scenario.validate(),
            Err(ScenarioError::NonPositiveFactor("spike".to_string()))
        );
    }

    #[test]
    fn test_ddos_intensity_factors() {
        assert_eq!(DdosIntensity::Low.load_factor(), 2.0);
        assert_eq!(DdosIntensity::Medium.load_factor(), 3.0);
        assert_eq!(DdosIntensity::High.load_factor(), 5.0);
    }

    #[test]
    fn test_scenario_yaml_round_trip() {
        let yaml = r#"
id: scn-outage
name: Regional outage
duration: 120
metrics:
  sample_interval: 10
  targets: [tps, availability_pct]
events:
  - id: ev-1
    type: node-failure
    at: 20
    duration: 30
    target:
      node: us-east-validator-1
  - id: ev-2
    type: latency-spike
    multiplier: 4.0
    at: 50
    duration: 20
    target:
      region: eu-west
  - id: ev-3
    type: ddos-attack
    intensity: high
    at: 80
    target: global
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.events.len(), 3);
        assert_eq!(scenario.events[0].kind, FaultKind::NodeFailure);
        assert_eq!(
            scenario.events[1].kind,
            FaultKind::LatencySpike { multiplier: 4.0 }
        );
        assert_eq!(
            scenario.events[2].kind,
            FaultKind::DdosAttack { intensity: DdosIntensity::High }
        );
        assert_eq!(scenario.events[2].target, FaultTarget::Global);
        assert_eq!(scenario.events[2].duration, None);

        // Survives a YAML round trip unchanged
        let back: Scenario = serde_yaml::from_str(&serde_yaml::to_string(&scenario).unwrap()).unwrap();
        assert_eq!(back, scenario);
    }
}
