// Basic simulation example: default topology, one crash, printed summary
//
//   cargo run --example basic_simulation

use ns_rust::ns_analysis::{analyze, AnalysisConfig};
use ns_rust::ns_builder::{default_regions, BuilderProfile, TopologyBuilder};
use ns_rust::ns_engine::{EngineConfig, SimulationRun};
use ns_rust::ns_interface::LogSink;
use ns_rust::ns_scenario::{FaultEvent, FaultKind, FaultTarget, MetricsPolicy, Scenario};

fn main() {
    simple_logger::SimpleLogger::new().init().unwrap();

    let seed = [1u8; 32];
    let topology = TopologyBuilder::new(BuilderProfile::default())
        .with_seed(seed)
        .build(&default_regions())
        .expect("default profile builds a valid topology");

    println!(
        "Built topology {}: {} nodes, {} connections",
        topology.id,
        topology.nodes.len(),
        topology.connections.len()
    );

    let victim = topology.nodes[0].id.clone();
    let scenario = Scenario {
        id: "scn-basic".to_string(),
        name: "single crash".to_string(),
        description: "one node fails for thirty seconds".to_string(),
        duration: 120,
        events: vec![FaultEvent {
            id: "crash-1".to_string(),
            kind: FaultKind::NodeFailure,
            at: 30,
            target: FaultTarget::Node(victim),
            duration: Some(30),
        }],
        metrics: MetricsPolicy { sample_interval: 10, targets: Vec::new() },
    };

    let config = EngineConfig { seed: Some(seed), ..EngineConfig::default() };
    let run = SimulationRun::new(&topology, scenario, config)
        .expect("scenario is valid")
        .with_sink(Box::new(LogSink));

    let mut result = run.run();
    analyze(&mut result, &AnalysisConfig::default());

    result.print_summary();
}
