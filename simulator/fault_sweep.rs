// Fault sweep: the same scenario at each DDoS intensity, scores compared
//
//   cargo run --example fault_sweep

use ns_rust::ns_builder::{default_regions, BuilderProfile, TopologyBuilder};
use ns_rust::ns_registry::NsRegistry;
use ns_rust::ns_scenario::{
    DdosIntensity, FaultEvent, FaultKind, FaultTarget, MetricsPolicy, Scenario,
};

fn main() {
    let seed = [2u8; 32];
    let regions = default_regions();

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  FAULT SWEEP - DDoS intensity comparison               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let intensities = [DdosIntensity::Low, DdosIntensity::Medium, DdosIntensity::High];
    let mut rows = Vec::new();

    for intensity in intensities {
        // Fresh registry per run so each sweep is isolated and seeded alike
        let mut registry = NsRegistry::new();
        registry.engine_config.seed = Some(seed);

        let topology = TopologyBuilder::new(BuilderProfile::default())
            .with_seed(seed)
            .build(&regions)
            .expect("default profile builds a valid topology");
        let target_region = topology.nodes[0].region.clone();

        let scenario = Scenario {
            id: format!("scn-ddos-{:?}", intensity).to_lowercase(),
            name: format!("{:?} intensity attack", intensity),
            description: String::new(),
            duration: 180,
            events: vec![
                FaultEvent {
                    id: "ddos-1".to_string(),
                    kind: FaultKind::DdosAttack { intensity },
                    at: 30,
                    target: FaultTarget::Region(target_region),
                    duration: Some(60),
                },
                FaultEvent {
                    id: "spike-1".to_string(),
                    kind: FaultKind::LatencySpike { multiplier: 2.0 },
                    at: 60,
                    target: FaultTarget::Global,
                    duration: Some(30),
                },
            ],
            metrics: MetricsPolicy { sample_interval: 10, targets: Vec::new() },
        };

        let topo_id = registry.add_topology(topology).expect("generated topology is valid");
        let scn_id = registry.add_scenario(scenario).expect("sweep scenario is valid");
        let result = registry.run(&topo_id, &scn_id).expect("references registered above");

        rows.push((
            intensity,
            result.summary.avg_tps,
            result.summary.availability_pct,
            result.analysis.resilience_score,
        ));
    }

    println!("{:<10} {:>12} {:>16} {:>12}", "intensity", "avg tps", "availability %", "score");
    for (intensity, tps, availability, score) in rows {
        println!("{:<10} {:>12.0} {:>16.2} {:>12.1}", format!("{:?}", intensity).to_lowercase(), tps, availability, score);
    }
    println!();
}
