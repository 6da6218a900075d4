//! # netsim - Network Topology & Failure-Injection Simulator
//!
//! An in-memory simulator for synthetic peer-to-peer networks: build a
//! topology of nodes grouped by geographic region, replay a scripted
//! sequence of fault events against it (node crashes, partitions, latency
//! spikes, throttling, DDoS), sample performance metrics as the faults play
//! out and produce a resilience analysis of the run.
//!
//! ## Core Components
//!
//! - **Topology Model**: `Node`, `Connection`, `Topology` with derived
//!   aggregate properties (redundancy, decentralization entropy)
//! - **TopologyBuilder**: profile-driven regional generation with a
//!   probabilistic connection graph (dense intra-region, sparse inter-region)
//! - **Scenario Model**: typed `FaultEvent`s bundled with a metric policy
//! - **SimulationRun**: the steppable engine replaying a scenario against a
//!   working copy of a topology
//! - **Analysis**: post-run bottleneck/failure-point detection and the
//!   0-100 resilience score
//! - **NsRegistry**: injectable repositories plus the fail-fast run contract
//!
//! ## Usage
//!
//! ```no_run
//! use ns_rust::ns_builder::{default_regions, BuilderProfile, TopologyBuilder};
//! use ns_rust::ns_registry::NsRegistry;
//! use ns_rust::ns_scenario::{FaultEvent, FaultKind, FaultTarget, MetricsPolicy, Scenario};
//!
//! let topology = TopologyBuilder::new(BuilderProfile::default())
//!     .build(&default_regions())
//!     .unwrap();
//!
//! let scenario = Scenario {
//!     id: "scn-demo".to_string(),
//!     name: "single outage".to_string(),
//!     description: String::new(),
//!     duration: 120,
//!     events: vec![FaultEvent {
//!         id: "ev-1".to_string(),
//!         kind: FaultKind::NodeFailure,
//!         at: 30,
//!         target: FaultTarget::Node(topology.nodes[0].id.clone()),
//!         duration: Some(20),
//!     }],
//!     metrics: MetricsPolicy::default(),
//! };
//!
//! let mut registry = NsRegistry::new();
//! let topo_id = registry.add_topology(topology).unwrap();
//! let scn_id = registry.add_scenario(scenario).unwrap();
//! let result = registry.run(&topo_id, &scn_id).unwrap();
//! result.print_summary();
//! ```
//!
//! The engine never performs real I/O: a run mutates an isolated clone of
//! its topology, one simulated second per step, and the canonical data is
//! never touched. Seeds make both generation and replay bit-reproducible.
//!
//! ## Scenario Files
//!
//! The `scenario_runner` binary in `simulator/` loads YAML scenario files
//! (see `scenarios/`) and runs them against generated topologies.

// Core simulator modules
pub mod ns_analysis;
pub mod ns_builder;
pub mod ns_engine;
pub mod ns_interface;
pub mod ns_registry;
pub mod ns_scenario;
pub mod ns_topology;

// Re-export commonly used types
pub use ns_analysis::{analyze, Analysis, AnalysisConfig};
pub use ns_builder::{default_regions, BuilderProfile, RegionSpec, TopologyBuilder};
pub use ns_engine::{
    EngineConfig, MetricSampler, MetricsSummary, RunState, SimulationResult, SimulationRun,
};
pub use ns_interface::{EventSink, LogSink, NoOpSink, NsTime, RunEvent, SimSeed};
pub use ns_registry::{NsRegistry, SimError};
pub use ns_scenario::{FaultEvent, FaultKind, FaultTarget, MetricsPolicy, Scenario};
pub use ns_topology::{Connection, Node, NodeRole, Topology, TopologyError};
