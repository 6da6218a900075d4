// Repositories and the run contract: topologies, scenarios, run history

use crate::ns_analysis::{analyze, AnalysisConfig};
use crate::ns_engine::{EngineConfig, SimulationResult, SimulationRun};
use crate::ns_scenario::{Scenario, ScenarioError};
use crate::ns_topology::{Topology, TopologyError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors surfaced to the caller before a run starts
#[derive(Debug)]
pub enum SimError {
    UnknownTopology(String),
    UnknownScenario(String),
    DuplicateTopology(String),
    DuplicateScenario(String),
    InvalidTopology(TopologyError),
    InvalidScenario(ScenarioError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownTopology(id) => write!(f, "unknown topology '{}'", id),
            SimError::UnknownScenario(id) => write!(f, "unknown scenario '{}'", id),
            SimError::DuplicateTopology(id) => write!(f, "topology '{}' already registered", id),
            SimError::DuplicateScenario(id) => write!(f, "scenario '{}' already registered", id),
            SimError::InvalidTopology(err) => write!(f, "invalid topology: {}", err),
            SimError::InvalidScenario(err) => write!(f, "invalid scenario: {}", err),
        }
    }
}

impl std::error::Error for SimError {}

impl From<TopologyError> for SimError {
    fn from(err: TopologyError) -> Self {
        SimError::InvalidTopology(err)
    }
}

impl From<ScenarioError> for SimError {
    fn from(err: ScenarioError) -> Self {
        SimError::InvalidScenario(err)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Explicit, injectable repositories plus the run entry point
///
/// One registry per engine instance; tests create isolated registries at
/// will. Runs take `&self` and clone their own working copies, so multiple
/// runs may proceed concurrently against the same canonical data. The run
/// history is the only shared mutable collection and is mutex-guarded.
pub struct NsRegistry {
    topologies: BTreeMap<String, Topology>,
    scenarios: BTreeMap<String, Scenario>,
    history: Mutex<Vec<SimulationResult>>,

    pub engine_config: EngineConfig,
    pub analysis_config: AnalysisConfig,
}

impl Default for NsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NsRegistry {
    pub fn new() -> Self {
        Self {
            topologies: BTreeMap::new(),
            scenarios: BTreeMap::new(),
            history: Mutex::new(Vec::new()),
            engine_config: EngineConfig::default(),
            analysis_config: AnalysisConfig::default(),
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    // ----- registration (generated or hand-built, same contract) -----

    /// Register a topology after validating its structural invariants
    pub fn add_topology(&mut self, topology: Topology) -> Result<String, SimError> {
        topology.validate()?;
        if self.topologies.contains_key(&topology.id) {
            return Err(SimError::DuplicateTopology(topology.id.clone()));
        }
        let id = topology.id.clone();
        log::debug!("registered topology '{}' ({} nodes)", id, topology.nodes.len());
        self.topologies.insert(id.clone(), topology);
        Ok(id)
    }

    /// Register a scenario after validating it
    pub fn add_scenario(&mut self, scenario: Scenario) -> Result<String, SimError> {
        scenario.validate()?;
        if self.scenarios.contains_key(&scenario.id) {
            return Err(SimError::DuplicateScenario(scenario.id.clone()));
        }
        let id = scenario.id.clone();
        log::debug!("registered scenario '{}' ({} events)", id, scenario.events.len());
        self.scenarios.insert(id.clone(), scenario);
        Ok(id)
    }

    // ----- read-only lookups -----

    pub fn topology(&self, id: &str) -> Option<&Topology> {
        self.topologies.get(id)
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    pub fn topologies(&self) -> impl Iterator<Item = &Topology> {
        self.topologies.values()
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    /// Snapshot of the run history, oldest first
    pub fn results(&self) -> Vec<SimulationResult> {
        self.lock_history().clone()
    }

    pub fn result(&self, id: &str) -> Option<SimulationResult> {
        self.lock_history().iter().find(|r| r.id == id).cloned()
    }

    // ----- the run contract -----

    /// Resolve both references (fail fast), clone a working copy, replay the
    /// scenario, analyze the frozen result and append it to the history.
    pub fn run(&self, topology_id: &str, scenario_id: &str) -> Result<SimulationResult, SimError> {
        let topology = self
            .topologies
            .get(topology_id)
            .ok_or_else(|| SimError::UnknownTopology(topology_id.to_string()))?;
        let scenario = self
            .scenarios
            .get(scenario_id)
            .ok_or_else(|| SimError::UnknownScenario(scenario_id.to_string()))?
            .clone();

        log::info!(
            "starting run: scenario '{}' against topology '{}'",
            scenario_id,
            topology_id
        );
        let run = SimulationRun::new(topology, scenario, self.engine_config.clone())?;
        let mut result = run.run();
        analyze(&mut result, &self.analysis_config);

        self.lock_history().push(result.clone());
        Ok(result)
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<SimulationResult>> {
        match self.history.lock() {
            Ok(guard) => guard,
            // A panic mid-append cannot leave a partially written entry;
            // recover the guard and keep serving
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns_builder::{default_regions, BuilderProfile, TopologyBuilder};
    use crate::ns_engine::FaultRecord;
    use crate::ns_interface::wall_clock_ms;
    use crate::ns_scenario::{FaultEvent, FaultKind, FaultTarget, MetricsPolicy};
    use crate::ns_topology::{
        Connection, ConsensusConfig, GeoPoint, Node, NodeCapacity, NodeRole, ResourceLoad,
        TopologyProperties,
    };
    use std::collections::BTreeSet;

    fn small_topology() -> Topology {
        let mut profile = BuilderProfile::default();
        profile.roles.retain(|r| r.role == NodeRole::Validator);
        profile.roles[0].per_region = 2;
        profile.p_intra = 1.0;
        profile.p_inter = 0.0;
        let regions: Vec<_> = default_regions().into_iter().take(2).collect();
        TopologyBuilder::new(profile).with_seed([17u8; 32]).build(&regions).unwrap()
    }

    fn small_scenario(id: &str) -> Scenario {
        Scenario {
            id: id.to_string(),
            name: "smoke".to_string(),
            description: String::new(),
            duration: 20,
            events: vec![FaultEvent {
                id: "ev-1".to_string(),
                kind: FaultKind::SoftwareUpdate,
                at: 5,
                target: FaultTarget::Global,
                duration: None,
            }],
            metrics: MetricsPolicy { sample_interval: 5, targets: Vec::new() },
        }
    }

    #[test]
    fn test_unknown_references_fail_fast() {
        let registry = NsRegistry::new();
        assert!(matches!(
            registry.run("nope", "also-nope"),
            Err(SimError::UnknownTopology(_))
        ));

        let mut registry = NsRegistry::new();
        registry.add_topology(small_topology()).unwrap();
        let topo_id = registry.topologies().next().unwrap().id.clone();
        assert!(matches!(
            registry.run(&topo_id, "missing"),
            Err(SimError::UnknownScenario(_))
        ));
    }

    #[test]
    fn test_end_to_end_run_appends_history() {
        let mut registry = NsRegistry::new();
        registry.engine_config.seed = Some([4u8; 32]);
        let topo_id = registry.add_topology(small_topology()).unwrap();
        let scn_id = registry.add_scenario(small_scenario("scn-smoke")).unwrap();

        let result = registry.run(&topo_id, &scn_id).unwrap();
        assert_eq!(result.triggered.len(), 1);
        assert_eq!(result.samples.len(), 5);
        assert!(result.analysis.resilience_score > 0.0);

        // History holds the same record, retrievable by id
        let history = registry.results();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, result.id);
        assert_eq!(registry.result(&result.id).unwrap().id, result.id);
    }

    #[test]
    fn test_runs_do_not_mutate_canonical_topology() {
        let mut registry = NsRegistry::new();
        registry.engine_config.seed = Some([4u8; 32]);
        let topology = small_topology();
        let victim = topology.nodes[0].id.clone();
        let topo_id = registry.add_topology(topology).unwrap();

        let mut scenario = small_scenario("scn-kill");
        scenario.events = vec![FaultEvent {
            id: "kill".to_string(),
            kind: FaultKind::NodeFailure,
            at: 1,
            target: FaultTarget::Node(victim.clone()),
            duration: None,
        }];
        let scn_id = registry.add_scenario(scenario).unwrap();
        registry.run(&topo_id, &scn_id).unwrap();

        let canonical = registry.topology(&topo_id).unwrap();
        assert!(canonical.node(&victim).unwrap().online);
    }

    #[test]
    fn test_invalid_custom_topology_rejected() {
        let mut topology = small_topology();
        // Same unordered pair under a fresh connection id
        let mut dup = topology.connections[0].clone();
        dup.id = "conn-dup".to_string();
        topology.connections.push(dup);

        let mut registry = NsRegistry::new();
        assert!(matches!(
            registry.add_topology(topology),
            Err(SimError::InvalidTopology(TopologyError::DuplicatePair(_, _)))
        ));
    }

    #[test]
    fn test_invalid_scenario_rejected() {
        let mut scenario = small_scenario("scn-bad");
        scenario.duration = 0;
        let mut registry = NsRegistry::new();
        assert!(matches!(
            registry.add_scenario(scenario),
            Err(SimError::InvalidScenario(ScenarioError::ZeroDuration))
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = NsRegistry::new();
        registry.add_topology(small_topology()).unwrap();
        assert!(matches!(
            registry.add_topology(small_topology()),
            Err(SimError::DuplicateTopology(_))
        ));
    }

    fn custom_node(id: &str, region: &str, role: NodeRole) -> Node {
        Node {
            id: id.to_string(),
            name: id.to_string(),
            role,
            region: region.to_string(),
            datacenter: format!("{}-dc1", region),
            location: GeoPoint { latitude: 0.0, longitude: 0.0 },
            capacity: NodeCapacity {
                cpu_cores: 8,
                cpu_ghz: 3.0,
                memory_gb: 32,
                storage_gb: 1000,
                storage_iops: 10_000,
                bandwidth_mbps: 1000.0,
                base_latency_ms: 2.0,
            },
            online: true,
            last_seen_ms: wall_clock_ms(),
            uptime_pct: 99.9,
            load: ResourceLoad::default(),
            peers: BTreeSet::new(),
            transactions_processed: 0,
            blocks_produced: 0,
            consensus_participation: if role == NodeRole::Validator { 98.0 } else { 0.0 },
            peer_count: 0,
        }
    }

    fn custom_connection(id: &str, from: &str, to: &str) -> Connection {
        Connection {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            bandwidth_mbps: 1000.0,
            latency_ms: 4.0,
            reliability: 0.999,
            cost_per_gb: 0.02,
            encrypted: true,
            compressed: false,
            active: true,
            last_used_ms: wall_clock_ms(),
            traffic_in_mbps: 10.0,
            traffic_out_mbps: 10.0,
            error_count: 0,
        }
    }

    /// Four explicit nodes across two regions, wired by hand
    fn hand_built_topology() -> Topology {
        let now = wall_clock_ms();
        let mut topology = Topology {
            id: "topo-custom".to_string(),
            name: "hand built".to_string(),
            description: String::new(),
            version: 1,
            created_at_ms: now,
            updated_at_ms: now,
            nodes: vec![
                custom_node("a", "us-east", NodeRole::Validator),
                custom_node("b", "us-east", NodeRole::Miner),
                custom_node("c", "eu-west", NodeRole::Validator),
                custom_node("d", "eu-west", NodeRole::FullRelay),
            ],
            connections: vec![
                custom_connection("c1", "a", "b"),
                custom_connection("c2", "c", "d"),
                custom_connection("c3", "b", "c"),
            ],
            consensus: ConsensusConfig::default(),
            properties: TopologyProperties::default(),
        };
        topology.link_nodes("a", "b");
        topology.link_nodes("c", "d");
        topology.link_nodes("b", "c");
        topology.recompute_properties();
        topology
    }

    #[test]
    fn test_hand_built_topology_repeat_runs_classify_identically() {
        // The explicit-topology path involves no generator randomness, so
        // even unseeded repeat runs agree on cadence and classification
        let mut registry = NsRegistry::new();
        let topo_id = registry.add_topology(hand_built_topology()).unwrap();

        let mut scenario = small_scenario("scn-custom");
        scenario.events = vec![
            FaultEvent {
                id: "kill-b".to_string(),
                kind: FaultKind::NodeFailure,
                at: 5,
                target: FaultTarget::Node("b".to_string()),
                duration: Some(5),
            },
            FaultEvent {
                id: "ghost".to_string(),
                kind: FaultKind::LatencySpike { multiplier: 2.0 },
                at: 8,
                target: FaultTarget::Region("mars".to_string()),
                duration: Some(2),
            },
        ];
        let scn_id = registry.add_scenario(scenario).unwrap();

        let a = registry.run(&topo_id, &scn_id).unwrap();
        let b = registry.run(&topo_id, &scn_id).unwrap();

        let ids = |records: &[FaultRecord]| -> Vec<String> {
            records.iter().map(|r| r.event.id.clone()).collect()
        };
        assert_eq!(a.samples.len(), b.samples.len());
        assert_eq!(ids(&a.triggered), ids(&b.triggered));
        assert_eq!(ids(&a.completed), ids(&b.completed));
        assert_eq!(ids(&a.failed), ids(&b.failed));

        assert_eq!(ids(&a.triggered), vec!["kill-b".to_string()]);
        assert_eq!(ids(&a.completed), vec!["kill-b".to_string()]);
        assert_eq!(ids(&a.failed), vec!["ghost".to_string()]);
    }

    #[test]
    fn test_repeat_run_with_same_seed_classifies_identically() {
        let mut registry = NsRegistry::new();
        registry.engine_config.seed = Some([8u8; 32]);
        let topo_id = registry.add_topology(small_topology()).unwrap();
        let scn_id = registry.add_scenario(small_scenario("scn-repeat")).unwrap();

        let a = registry.run(&topo_id, &scn_id).unwrap();
        let b = registry.run(&topo_id, &scn_id).unwrap();
        assert_eq!(a.samples.len(), b.samples.len());
        assert_eq!(a.triggered.len(), b.triggered.len());
        assert_eq!(a.failed.len(), b.failed.len());
        assert_eq!(registry.results().len(), 2);
    }
}
