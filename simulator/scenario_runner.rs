// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/baseline.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/baseline.yaml --seed 0x1234...
//   cargo run --bin scenario_runner scenarios/baseline.yaml --json result.json

use ns_rust::ns_builder::{default_regions, BuilderProfile, RegionSpec, TopologyBuilder};
use ns_rust::ns_interface::SimSeed;
use ns_rust::ns_registry::NsRegistry;
use ns_rust::ns_scenario::Scenario;
use ns_rust::ns_topology::NodeRole;
use std::env;
use std::fs;
use std::path::Path;

/// Scenario file format: metadata, topology build config, the scenario itself
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Topology generation settings
    #[serde(default)]
    build: BuildConfig,

    /// The fault scenario to replay
    scenario: Scenario,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
    hypothesis: Option<String>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct BuildConfig {
    /// Regions to populate; the default catalog when empty
    #[serde(default)]
    regions: Vec<RegionSpec>,

    /// Full profile replacement (optional)
    #[serde(default)]
    profile: Option<BuilderProfile>,

    /// Spot overrides applied on top of the profile (optional)
    #[serde(default)]
    overrides: Option<ProfileOverrides>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ProfileOverrides {
    p_intra: Option<f64>,
    p_inter: Option<f64>,
    max_inter_links: Option<usize>,
    validators_per_region: Option<usize>,
    miners_per_region: Option<usize>,
    relays_per_region: Option<usize>,
    light_clients_per_region: Option<usize>,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX] [--json OUT.json]",
            args[0]
        );
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/baseline.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/baseline.yaml --seed 0x123456...", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    let mut seed: Option<SimSeed> = None;
    let mut json_path: Option<String> = None;
    let mut i = 2;
    while i + 1 < args.len() {
        match args[i].as_str() {
            "--seed" => seed = Some(parse_seed_hex(&args[i + 1])),
            "--json" => json_path = Some(args[i + 1].clone()),
            other => {
                eprintln!("Unknown flag: {}", other);
                std::process::exit(1);
            }
        }
        i += 2;
    }

    if path.is_file() {
        run_scenario_file(path, seed, json_path.as_deref());
    } else if path.is_dir() {
        if json_path.is_some() {
            eprintln!("--json applies to a single scenario file, ignoring it for a directory");
        }
        run_scenario_directory(path, seed);
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

fn run_scenario_directory(dir: &Path, seed: Option<SimSeed>) {
    let mut scenarios = Vec::new();

    // Find all .yaml files
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("yaml")
                || path.extension().and_then(|s| s.to_str()) == Some("yml")
            {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO RUNNER - Multiple Scenarios                  ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_scenario_file(scenario_path, seed, None);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All scenarios complete!                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
}

fn run_scenario_file(path: &Path, seed: Option<SimSeed>, json_path: Option<&str>) {
    println!("Loading scenario from: {}", path.display());

    // Load and parse YAML
    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let file: ScenarioFile = serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    });

    // Print scenario header
    println!("\n╔════════════════════════════════════════════════════════╗");
    if let Some(ref name) = file.meta.name {
        println!("║  {}  {}", name, " ".repeat(54_usize.saturating_sub(name.len())));
    } else {
        println!("║  Scenario: {}  ", file.scenario.name);
    }
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = file.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = file.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    // Build the topology from the file's build config
    let regions = if file.build.regions.is_empty() {
        default_regions()
    } else {
        file.build.regions.clone()
    };

    let mut profile = file.build.profile.clone().unwrap_or_default();
    if let Some(ref overrides) = file.build.overrides {
        if let Some(v) = overrides.p_intra {
            profile.p_intra = v;
        }
        if let Some(v) = overrides.p_inter {
            profile.p_inter = v;
        }
        if let Some(v) = overrides.max_inter_links {
            profile.max_inter_links = v;
        }
        if let Some(v) = overrides.validators_per_region {
            set_role_count(&mut profile, NodeRole::Validator, v);
        }
        if let Some(v) = overrides.miners_per_region {
            set_role_count(&mut profile, NodeRole::Miner, v);
        }
        if let Some(v) = overrides.relays_per_region {
            set_role_count(&mut profile, NodeRole::FullRelay, v);
        }
        if let Some(v) = overrides.light_clients_per_region {
            set_role_count(&mut profile, NodeRole::LightClient, v);
        }
    }

    let mut builder = TopologyBuilder::new(profile.clone());
    if let Some(seed) = seed {
        builder = builder.with_seed(seed);
    }
    let topology = builder.build(&regions).unwrap_or_else(|e| {
        eprintln!("Topology generation failed: {}", e);
        std::process::exit(1);
    });

    println!("Configuration:");
    println!("  Duration: {} s", file.scenario.duration);
    println!("  Events: {}", file.scenario.events.len());
    println!("  Sample interval: {} s", file.scenario.metrics.sample_interval);
    println!("  Regions: {}", regions.len());
    println!("  Nodes: {}  Connections: {}", topology.nodes.len(), topology.connections.len());
    println!("  p_intra: {:.2}  p_inter: {:.2}", profile.p_intra, profile.p_inter);
    println!("\nStarting simulation...\n");

    // Run through the registry so inputs are validated and the result analyzed
    let mut registry = NsRegistry::new();
    registry.engine_config.seed = seed;
    let topo_id = registry.add_topology(topology).unwrap_or_else(|e| {
        eprintln!("Topology rejected: {}", e);
        std::process::exit(1);
    });
    let scn_id = registry.add_scenario(file.scenario).unwrap_or_else(|e| {
        eprintln!("Scenario rejected: {}", e);
        std::process::exit(1);
    });

    let result = registry.run(&topo_id, &scn_id).unwrap_or_else(|e| {
        eprintln!("Run failed to start: {}", e);
        std::process::exit(1);
    });

    result.print_summary();

    if let Some(out) = json_path {
        match result.to_json() {
            Ok(json) => {
                if let Err(e) = fs::write(out, json) {
                    eprintln!("Failed to write {}: {}", out, e);
                } else {
                    println!("\nResult written to {}", out);
                }
            }
            Err(e) => eprintln!("Failed to serialize result: {}", e),
        }
    }

    println!("\n✓ Scenario complete!\n");
}

fn set_role_count(profile: &mut BuilderProfile, role: NodeRole, count: usize) {
    if let Some(spec) = profile.roles.iter_mut().find(|r| r.role == role) {
        spec.per_region = count;
    }
}

fn parse_seed_hex(hex: &str) -> SimSeed {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        let byte_str = std::str::from_utf8(chunk).unwrap();
        seed[i] = u8::from_str_radix(byte_str, 16).unwrap_or_else(|e| {
            eprintln!("Invalid hex seed: {}", e);
            std::process::exit(1);
        });
    }

    seed
}
