use log::info;
use rand::Rng;
use simple_logger::SimpleLogger;

use ns_rust::ns_builder::{default_regions, BuilderProfile, TopologyBuilder};
use ns_rust::ns_registry::NsRegistry;
use ns_rust::ns_scenario::{
    DdosIntensity, FaultEvent, FaultKind, FaultTarget, MetricsPolicy, Scenario,
};

// Demo run: build the default topology, replay a baseline fault scenario
// against it and log the headline numbers.
fn main() {
    SimpleLogger::new().init().unwrap();

    info!("starting");

    let mut seed = [0u8; 32];
    rand::thread_rng().fill(&mut seed);

    let regions = default_regions();
    let topology = TopologyBuilder::new(BuilderProfile::default())
        .with_seed(seed)
        .build(&regions)
        .expect("default profile builds a valid topology");

    info!(
        "topology {}: {} nodes, {} connections, redundancy {:.1}, decentralization {:.2}",
        topology.id,
        topology.properties.node_count,
        topology.properties.connection_count,
        topology.properties.redundancy,
        topology.properties.decentralization
    );

    let victim = topology.nodes[0].id.clone();
    let hot_region = regions[1].id.clone();

    let scenario = Scenario {
        id: "scn-baseline".to_string(),
        name: "baseline faults".to_string(),
        description: "one crash, one regional latency spike, one ddos burst".to_string(),
        duration: 300,
        events: vec![
            FaultEvent {
                id: "crash-1".to_string(),
                kind: FaultKind::NodeFailure,
                at: 60,
                target: FaultTarget::Node(victim),
                duration: Some(45),
            },
            FaultEvent {
                id: "spike-1".to_string(),
                kind: FaultKind::LatencySpike { multiplier: 3.0 },
                at: 120,
                target: FaultTarget::Region(hot_region),
                duration: Some(60),
            },
            FaultEvent {
                id: "ddos-1".to_string(),
                kind: FaultKind::DdosAttack { intensity: DdosIntensity::Medium },
                at: 200,
                target: FaultTarget::Global,
                duration: Some(30),
            },
        ],
        metrics: MetricsPolicy { sample_interval: 10, targets: Vec::new() },
    };

    let mut registry = NsRegistry::new();
    registry.engine_config.seed = Some(seed);
    let topo_id = registry.add_topology(topology).expect("generated topology is valid");
    let scn_id = registry.add_scenario(scenario).expect("baseline scenario is valid");

    let result = registry.run(&topo_id, &scn_id).expect("references registered above");

    info!("let seed = {:?};", seed);
    info!(
        "run {}: {} triggered, {} completed, {} failed, {} samples",
        result.id,
        result.triggered.len(),
        result.completed.len(),
        result.failed.len(),
        result.samples.len()
    );
    info!(
        "tps avg {:.0} / peak {:.0}, latency {:.1} ms, availability {:.2}%",
        result.summary.avg_tps,
        result.summary.peak_tps,
        result.summary.avg_latency_ms,
        result.summary.availability_pct
    );
    info!("resilience score: {:.1} / 100", result.analysis.resilience_score);

    result.print_summary();
}
