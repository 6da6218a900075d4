// Simulation engine: replays a scenario against a working copy of a topology

use crate::ns_analysis::Analysis;
use crate::ns_interface::{
    wall_clock_ms, EventId, EventSink, NoOpSink, NodeId, NsTime, RunEvent, SimSeed,
};
use crate::ns_scenario::{FaultEvent, FaultKind, FaultTarget, Scenario, ScenarioError};
use crate::ns_topology::{NodeRole, Topology};
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Metric Names
// ============================================================================

pub const METRIC_TPS: &str = "tps";
pub const METRIC_LATENCY: &str = "latency_ms";
pub const METRIC_AVAILABILITY: &str = "availability_pct";
pub const METRIC_CONSENSUS_TIME: &str = "consensus_time_ms";
pub const METRIC_ERROR_RATE: &str = "error_rate";

// ============================================================================
// Configuration
// ============================================================================

/// Tunable engine parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Random seed for reproducibility; drawn from the thread RNG when unset
    pub seed: Option<SimSeed>,

    /// Probability a recovered node re-establishes a severed same-region link
    pub reconnect_intra_p: f64,

    /// Probability a recovered node re-establishes a severed cross-region link
    pub reconnect_inter_p: f64,

    /// Uptime a node reports right after recovery
    pub recovered_uptime_pct: f64,

    /// Consensus participation restored to recovered validators
    pub recovered_participation: f64,

    /// Time-to-consensus is modeled as mean latency times this margin
    pub consensus_latency_margin: f64,

    /// Relative jitter applied to per-node throughput contributions
    pub throughput_jitter: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            reconnect_intra_p: 0.8,
            reconnect_inter_p: 0.3,
            recovered_uptime_pct: 99.9,
            recovered_participation: 99.0,
            consensus_latency_margin: 3.0,
            throughput_jitter: 0.05,
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Ledger entry: a copy of the original event plus when it was processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    pub event: FaultEvent,
    pub at: NsTime,
}

/// One metric snapshot: flat name to value map, insertion-ordered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: NsTime,
    pub values: IndexMap<String, f64>,
}

/// Aggregates computed over the whole metric time series at run end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub avg_tps: f64,
    pub peak_tps: f64,
    pub avg_latency_ms: f64,
    pub availability_pct: f64,
    pub avg_consensus_time_ms: f64,
    pub avg_recovery_time_secs: f64,
}

/// The output record of one simulation run
///
/// Created with empty ledgers at run start, mutated only by the engine while
/// the run is in progress, then frozen. The analysis section is filled in by
/// the analysis engine afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub id: String,
    pub scenario_id: String,
    pub topology_id: String,

    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration_secs: NsTime,
    pub seed_used: SimSeed,

    // Event ledgers
    pub triggered: Vec<FaultRecord>,
    pub completed: Vec<FaultRecord>,
    pub failed: Vec<FaultRecord>,

    // Metric time series and its summary
    pub samples: Vec<MetricSample>,
    pub summary: MetricsSummary,

    pub analysis: Analysis,
}

impl SimulationResult {
    /// Structured JSON record for storage or the dashboard
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Console report in the scenario runner's format
    pub fn print_summary(&self) {
        println!("\n═══ Run {} ═══", self.id);
        println!("  Scenario: {}  Topology: {}", self.scenario_id, self.topology_id);
        println!("  Simulated duration: {} s, {} samples", self.duration_secs, self.samples.len());

        println!("\n═══ Event Ledger ═══");
        println!("  Triggered: {}", self.triggered.len());
        for record in &self.triggered {
            println!(
                "    t={:>5}  {} '{}' on {}",
                record.at,
                record.event.kind.label(),
                record.event.id,
                record.event.target
            );
        }
        println!("  Completed: {}", self.completed.len());
        for record in &self.completed {
            println!("    t={:>5}  {} '{}'", record.at, record.event.kind.label(), record.event.id);
        }
        println!("  Failed: {}", self.failed.len());
        for record in &self.failed {
            println!(
                "    t={:>5}  '{}' unresolvable target {}",
                record.at, record.event.id, record.event.target
            );
        }

        println!("\n═══ Metrics ═══");
        println!("  TPS: avg {:.0}, peak {:.0}", self.summary.avg_tps, self.summary.peak_tps);
        println!("  Latency: avg {:.1} ms", self.summary.avg_latency_ms);
        println!("  Availability: {:.2}%", self.summary.availability_pct);
        println!("  Time to consensus: avg {:.1} ms", self.summary.avg_consensus_time_ms);
        println!("  Recovery time: avg {:.1} s", self.summary.avg_recovery_time_secs);

        println!("\n═══ Analysis ═══");
        println!("  Resilience score: {:.1} / 100", self.analysis.resilience_score);
        if !self.analysis.bottlenecks.is_empty() {
            println!("  Bottlenecks:");
            for b in &self.analysis.bottlenecks {
                println!("    - {}", b);
            }
        }
        if !self.analysis.failure_points.is_empty() {
            println!("  Failure points:");
            for p in &self.analysis.failure_points {
                println!("    - {}", p);
            }
        }
        if !self.analysis.recommendations.is_empty() {
            println!("  Recommendations:");
            for r in &self.analysis.recommendations {
                println!("    - {}", r);
            }
        }
    }
}

// ============================================================================
// Metric Sampling
// ============================================================================

/// Pluggable per-tick snapshot computation
///
/// The contract consumed by the analysis engine and the dashboard is one
/// snapshot per sampling tick, each a flat name to value map; the formulas
/// behind the values are the sampler's business.
pub trait MetricSampler {
    fn sample(&mut self, topology: &Topology, rng: &mut StdRng) -> IndexMap<String, f64>;
}

/// Default sampler: role-weighted synthetic TPS, mean active-connection
/// latency, availability, a latency-derived consensus time and the mean
/// accumulated connection error count.
pub struct StandardSampler {
    pub consensus_latency_margin: f64,
    pub throughput_jitter: f64,
}

impl MetricSampler for StandardSampler {
    fn sample(&mut self, topology: &Topology, rng: &mut StdRng) -> IndexMap<String, f64> {
        let total = topology.nodes.len();
        let mut online = 0usize;
        let mut tps = 0.0;

        for node in &topology.nodes {
            if !node.online {
                continue;
            }
            online += 1;
            // A loaded node processes less than its nominal share
            let load_penalty = (1.0 - node.load.cpu / 200.0).max(0.0);
            let jitter = if self.throughput_jitter > 0.0 {
                rng.gen_range(1.0 - self.throughput_jitter..1.0 + self.throughput_jitter)
            } else {
                1.0
            };
            tps += node.role.base_throughput() * load_penalty * jitter;
        }

        let active: Vec<_> = topology.connections.iter().filter(|c| c.active).collect();
        let avg_latency = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|c| c.latency_ms).sum::<f64>() / active.len() as f64
        };
        let error_rate = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|c| c.error_count as f64).sum::<f64>() / active.len() as f64
        };
        let availability = if total == 0 {
            100.0
        } else {
            online as f64 / total as f64 * 100.0
        };

        let mut values = IndexMap::new();
        values.insert(METRIC_TPS.to_string(), tps);
        values.insert(METRIC_LATENCY.to_string(), avg_latency);
        values.insert(METRIC_AVAILABILITY.to_string(), availability);
        values.insert(
            METRIC_CONSENSUS_TIME.to_string(),
            avg_latency * self.consensus_latency_margin,
        );
        values.insert(METRIC_ERROR_RATE.to_string(), error_rate);
        values
    }
}

// ============================================================================
// Simulation Run
// ============================================================================

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

/// A single simulation run: a steppable clock over a working copy
///
/// The canonical topology passed to `new` is deep-cloned; nothing outside the
/// run ever observes intermediate fault state. Time advances one simulated
/// second per `step`, executing the trigger, completion and sampling phases
/// in that fixed order. Cancellation is a caller concern: stop calling
/// `step` and drop the run, always at a step boundary.
pub struct SimulationRun {
    topology: Topology,
    scenario: Scenario,
    events: Vec<FaultEvent>,
    next_event: usize,
    active_faults: Vec<FaultEvent>,

    config: EngineConfig,
    rng: StdRng,
    sampler: Box<dyn MetricSampler>,
    sink: Box<dyn EventSink>,

    clock: NsTime,
    state: RunState,

    triggered_at: HashMap<EventId, NsTime>,
    resolved_ids: HashSet<EventId>,

    result: SimulationResult,
}

impl SimulationRun {
    /// Clone the canonical topology and set up an idle run
    pub fn new(
        topology: &Topology,
        scenario: Scenario,
        config: EngineConfig,
    ) -> Result<Self, ScenarioError> {
        scenario.validate()?;

        let seed = config.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });
        let mut rng = StdRng::from_seed(seed);

        let result = SimulationResult {
            id: format!("run-{:016x}", rng.next_u64()),
            scenario_id: scenario.id.clone(),
            topology_id: topology.id.clone(),
            started_at_ms: wall_clock_ms(),
            ended_at_ms: 0,
            duration_secs: scenario.duration,
            seed_used: seed,
            triggered: Vec::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            samples: Vec::new(),
            summary: MetricsSummary::default(),
            analysis: Analysis::default(),
        };

        let sampler = StandardSampler {
            consensus_latency_margin: config.consensus_latency_margin,
            throughput_jitter: config.throughput_jitter,
        };

        Ok(Self {
            topology: topology.clone(),
            events: scenario.ordered_events(),
            scenario,
            next_event: 0,
            active_faults: Vec::new(),
            config,
            rng,
            sampler: Box::new(sampler),
            sink: Box::new(NoOpSink),
            clock: 0,
            state: RunState::Idle,
            triggered_at: HashMap::new(),
            resolved_ids: HashSet::new(),
            result,
        })
    }

    /// Replace the metric sampler before the run starts
    pub fn with_sampler(mut self, sampler: Box<dyn MetricSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Attach an observer for trigger/completion/failure/sampling events
    pub fn with_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn clock(&self) -> NsTime {
        self.clock
    }

    /// The run's working copy. Concurrent readers (the dashboard) look here
    /// or at the finished result, never at canonical state mid-run.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn result(&self) -> &SimulationResult {
        &self.result
    }

    /// Advance one simulated second. Returns false once the run completed.
    pub fn step(&mut self) -> bool {
        match self.state {
            RunState::Completed => return false,
            RunState::Idle => {
                log::debug!("run {}: starting, duration {} s", self.result.id, self.scenario.duration);
                self.state = RunState::Running;
            }
            RunState::Running => {}
        }

        let now = self.clock;
        self.trigger_due(now);
        self.complete_due(now);
        self.advance_counters(now);
        self.sample_if_due(now);

        if now >= self.scenario.duration {
            self.finalize();
            self.state = RunState::Completed;
            return false;
        }
        self.clock += 1;
        true
    }

    /// Batch mode: run every step synchronously and hand back the result
    pub fn run(mut self) -> SimulationResult {
        while self.step() {}
        self.result
    }

    // ----- trigger phase -----

    fn trigger_due(&mut self, now: NsTime) {
        while self.next_event < self.events.len() && self.events[self.next_event].at <= now {
            let event = self.events[self.next_event].clone();
            self.next_event += 1;

            if self.resolved_ids.contains(&event.id) {
                continue; // defensively skip ids already in a ledger
            }

            if !self.target_resolvable(&event) {
                self.resolved_ids.insert(event.id.clone());
                self.sink.log(
                    now,
                    RunEvent::FaultFailed { event_id: event.id.clone(), target: event.target.to_string() },
                );
                log::warn!("run {}: fault '{}' has unresolvable target {}", self.result.id, event.id, event.target);
                self.result.failed.push(FaultRecord { event, at: now });
                continue;
            }

            self.apply(&event);
            self.resolved_ids.insert(event.id.clone());
            self.triggered_at.insert(event.id.clone(), now);
            self.sink.log(
                now,
                RunEvent::FaultTriggered {
                    event_id: event.id.clone(),
                    kind: event.kind.label(),
                    target: event.target.to_string(),
                },
            );
            log::debug!("run {}: t={} triggered {} '{}'", self.result.id, now, event.kind.label(), event.id);
            if event.duration.is_some() {
                self.active_faults.push(event.clone());
            }
            self.result.triggered.push(FaultRecord { event, at: now });
        }
    }

    // ----- completion phase -----

    fn complete_due(&mut self, now: NsTime) {
        let mut i = 0;
        while i < self.active_faults.len() {
            let due = {
                let event = &self.active_faults[i];
                let duration = event.duration.unwrap_or(NsTime::MAX);
                event.at.saturating_add(duration) <= now
            };
            if !due {
                i += 1;
                continue;
            }
            let event = self.active_faults.remove(i);
            self.revert(&event);
            self.sink.log(
                now,
                RunEvent::FaultCompleted { event_id: event.id.clone(), kind: event.kind.label() },
            );
            log::debug!("run {}: t={} completed {} '{}'", self.result.id, now, event.kind.label(), event.id);
            self.result.completed.push(FaultRecord { event, at: now });
        }
    }

    // ----- sampling phase -----

    fn sample_if_due(&mut self, now: NsTime) {
        if now % self.scenario.metrics.sample_interval != 0 {
            return;
        }
        let mut values = self.sampler.sample(&self.topology, &mut self.rng);
        if !self.scenario.metrics.targets.is_empty() {
            let targets = &self.scenario.metrics.targets;
            values.retain(|name, _| targets.iter().any(|t| t == name));
        }
        self.result.samples.push(MetricSample { timestamp: now, values });
        self.sink.log(now, RunEvent::MetricsSampled { sample_index: self.result.samples.len() - 1 });
    }

    // ----- participation counters -----

    fn advance_counters(&mut self, now: NsTime) {
        let block_time = self.topology.consensus.target_block_time_secs;
        for node in &mut self.topology.nodes {
            if !node.online {
                continue;
            }
            node.transactions_processed += node.role.base_throughput() as u64;
            if node.role == NodeRole::Miner && block_time > 0 && now > 0 && now % block_time == 0 {
                node.blocks_produced += 1;
            }
        }
    }

    // ----- fault effects -----

    /// Can this event's target be resolved against the working topology?
    fn target_resolvable(&self, event: &FaultEvent) -> bool {
        let target_ok = match &event.target {
            FaultTarget::Node(id) => self.topology.has_node(id),
            FaultTarget::Region(region) => self.topology.has_region(region),
            FaultTarget::Global => true,
        };
        if !target_ok {
            return false;
        }
        if let FaultKind::NetworkPartition { regions } = &event.kind {
            // Every named region must exist, and the isolated side must be
            // non-empty once the target region is included
            if !regions.iter().all(|r| self.topology.has_region(r)) {
                return false;
            }
            if regions.is_empty() && !matches!(event.target, FaultTarget::Region(_)) {
                return false;
            }
        }
        true
    }

    fn resolve_nodes(&self, target: &FaultTarget) -> Vec<NodeId> {
        match target {
            FaultTarget::Node(id) => {
                if self.topology.has_node(id) {
                    vec![id.clone()]
                } else {
                    Vec::new()
                }
            }
            FaultTarget::Region(region) => self.topology.nodes_in_region(region),
            FaultTarget::Global => self.topology.nodes.iter().map(|n| n.id.clone()).collect(),
        }
    }

    fn isolated_regions(&self, event: &FaultEvent, payload: &[String]) -> BTreeSet<String> {
        let mut isolated: BTreeSet<String> = payload.iter().cloned().collect();
        if let FaultTarget::Region(region) = &event.target {
            isolated.insert(region.clone());
        }
        isolated
    }

    fn apply(&mut self, event: &FaultEvent) {
        match &event.kind {
            FaultKind::NodeFailure => {
                for id in self.resolve_nodes(&event.target) {
                    self.topology.sever_node(&id);
                }
            }
            FaultKind::NetworkPartition { regions } => {
                let isolated = self.isolated_regions(event, regions);
                self.set_partition(&isolated, true);
            }
            FaultKind::LatencySpike { multiplier } => {
                self.scale_latency(&event.target, *multiplier);
            }
            FaultKind::BandwidthThrottle { factor } => {
                self.scale_bandwidth(&event.target, 1.0 / factor);
            }
            FaultKind::DdosAttack { intensity } => {
                let factor = intensity.load_factor();
                let burst = intensity.error_burst();
                for id in self.resolve_nodes(&event.target) {
                    if let Some(node) = self.topology.node_mut(&id) {
                        node.load.cpu = (node.load.cpu * factor).min(100.0);
                        node.load.memory = (node.load.memory * factor).min(100.0);
                        node.load.network = (node.load.network * factor).min(100.0);
                    }
                    for idx in self.topology.connections_touching(&id) {
                        self.topology.connections[idx].error_count += burst;
                    }
                }
            }
            FaultKind::SoftwareUpdate => {
                // Placeholder event: ledger participation only
            }
        }
    }

    fn revert(&mut self, event: &FaultEvent) {
        match &event.kind {
            FaultKind::NodeFailure => {
                for id in self.resolve_nodes(&event.target) {
                    self.recover_node(&id);
                }
            }
            FaultKind::NetworkPartition { regions } => {
                let isolated = self.isolated_regions(event, regions);
                self.set_partition(&isolated, false);
            }
            FaultKind::LatencySpike { multiplier } => {
                self.scale_latency(&event.target, 1.0 / multiplier);
            }
            FaultKind::BandwidthThrottle { factor } => {
                self.scale_bandwidth(&event.target, *factor);
            }
            FaultKind::DdosAttack { intensity } => {
                let factor = intensity.load_factor();
                for id in self.resolve_nodes(&event.target) {
                    if let Some(node) = self.topology.node_mut(&id) {
                        node.load.cpu = (node.load.cpu / factor).max(0.0);
                        node.load.memory = (node.load.memory / factor).max(0.0);
                        node.load.network = (node.load.network / factor).max(0.0);
                    }
                }
            }
            FaultKind::SoftwareUpdate => {}
        }
    }

    /// Deactivate (or reactivate) every connection straddling the isolated
    /// region set and the rest of the network
    fn set_partition(&mut self, isolated: &BTreeSet<String>, apply: bool) {
        let straddling: Vec<usize> = self
            .topology
            .connections
            .iter()
            .enumerate()
            .filter(|(_, conn)| {
                let from_isolated = self
                    .topology
                    .region_of(&conn.from)
                    .map(|r| isolated.contains(r))
                    .unwrap_or(false);
                let to_isolated = self
                    .topology
                    .region_of(&conn.to)
                    .map(|r| isolated.contains(r))
                    .unwrap_or(false);
                from_isolated != to_isolated
            })
            .map(|(i, _)| i)
            .collect();

        for idx in straddling {
            if apply {
                let conn = &mut self.topology.connections[idx];
                conn.active = false;
                conn.traffic_in_mbps = 0.0;
                conn.traffic_out_mbps = 0.0;
            } else {
                let endpoints_online = {
                    let conn = &self.topology.connections[idx];
                    let from_online = self.topology.node(&conn.from).map(|n| n.online).unwrap_or(false);
                    let to_online = self.topology.node(&conn.to).map(|n| n.online).unwrap_or(false);
                    from_online && to_online
                };
                if endpoints_online {
                    self.reactivate_connection(idx);
                }
            }
        }
    }

    fn scale_latency(&mut self, target: &FaultTarget, factor: f64) {
        match target {
            FaultTarget::Global => {
                for conn in &mut self.topology.connections {
                    conn.latency_ms *= factor;
                }
            }
            _ => {
                for id in self.resolve_nodes(target) {
                    if let Some(node) = self.topology.node_mut(&id) {
                        node.capacity.base_latency_ms *= factor;
                    }
                }
            }
        }
    }

    fn scale_bandwidth(&mut self, target: &FaultTarget, factor: f64) {
        match target {
            FaultTarget::Global => {
                for conn in &mut self.topology.connections {
                    conn.bandwidth_mbps *= factor;
                }
            }
            _ => {
                for id in self.resolve_nodes(target) {
                    if let Some(node) = self.topology.node_mut(&id) {
                        node.capacity.bandwidth_mbps *= factor;
                    }
                }
            }
        }
    }

    /// Recovery half of a node failure: back online, then re-establish
    /// severed links probabilistically with a same-region bias. A recovered
    /// node is never left isolated while live candidates exist.
    fn recover_node(&mut self, node_id: &NodeId) {
        self.topology.mark_node_online(
            node_id,
            self.config.recovered_uptime_pct,
            self.config.recovered_participation,
            wall_clock_ms(),
        );

        let my_region = self.topology.region_of(node_id).cloned();
        let same_region = |topology: &Topology, idx: usize| -> bool {
            let conn = &topology.connections[idx];
            conn.other_end(node_id)
                .and_then(|other| topology.region_of(other))
                .map(|r| Some(r) == my_region.as_ref())
                .unwrap_or(false)
        };

        let candidates: Vec<usize> = self
            .topology
            .connections_touching(node_id)
            .into_iter()
            .filter(|&idx| {
                let conn = &self.topology.connections[idx];
                let other_online = conn
                    .other_end(node_id)
                    .and_then(|other| self.topology.node(other))
                    .map(|n| n.online)
                    .unwrap_or(false);
                !conn.active && other_online
            })
            .collect();

        let mut restored = 0usize;
        for &idx in &candidates {
            let p = if same_region(&self.topology, idx) {
                self.config.reconnect_intra_p
            } else {
                self.config.reconnect_inter_p
            };
            if self.rng.gen_bool(p.clamp(0.0, 1.0)) {
                self.reactivate_connection(idx);
                restored += 1;
            }
        }

        if restored == 0 {
            let pick = candidates
                .iter()
                .copied()
                .find(|&idx| same_region(&self.topology, idx))
                .or_else(|| candidates.first().copied());
            if let Some(idx) = pick {
                self.reactivate_connection(idx);
            }
        }
    }

    fn reactivate_connection(&mut self, idx: usize) {
        let (from, to, bandwidth) = {
            let conn = &self.topology.connections[idx];
            (conn.from.clone(), conn.to.clone(), conn.bandwidth_mbps)
        };
        let traffic_cap = (bandwidth * 0.1).max(f64::MIN_POSITIVE);
        {
            let conn = &mut self.topology.connections[idx];
            conn.active = true;
            conn.last_used_ms = wall_clock_ms();
            conn.traffic_in_mbps = self.rng.gen_range(0.0..traffic_cap);
            conn.traffic_out_mbps = self.rng.gen_range(0.0..traffic_cap);
        }
        self.topology.link_nodes(&from, &to);
    }

    // ----- finalization -----

    fn finalize(&mut self) {
        let mean = |name: &str| -> f64 {
            let values: Vec<f64> = self
                .result
                .samples
                .iter()
                .filter_map(|s| s.values.get(name).copied())
                .collect();
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };
        let peak_tps = self
            .result
            .samples
            .iter()
            .filter_map(|s| s.values.get(METRIC_TPS).copied())
            .fold(0.0f64, f64::max);

        let recovery_times: Vec<f64> = self
            .result
            .completed
            .iter()
            .filter_map(|record| {
                self.triggered_at
                    .get(&record.event.id)
                    .map(|&t| (record.at.saturating_sub(t)) as f64)
            })
            .collect();
        let avg_recovery = if recovery_times.is_empty() {
            0.0
        } else {
            recovery_times.iter().sum::<f64>() / recovery_times.len() as f64
        };

        self.result.summary = MetricsSummary {
            avg_tps: mean(METRIC_TPS),
            peak_tps,
            avg_latency_ms: mean(METRIC_LATENCY),
            availability_pct: mean(METRIC_AVAILABILITY),
            avg_consensus_time_ms: mean(METRIC_CONSENSUS_TIME),
            avg_recovery_time_secs: avg_recovery,
        };
        self.result.ended_at_ms = wall_clock_ms();
        self.topology.updated_at_ms = self.result.ended_at_ms;
        self.topology.recompute_properties();

        log::info!(
            "run {}: completed, {} triggered / {} completed / {} failed, {} samples",
            self.result.id,
            self.result.triggered.len(),
            self.result.completed.len(),
            self.result.failed.len(),
            self.result.samples.len()
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
