// Topology generation: regional node populations and probabilistic wiring

use crate::ns_interface::{wall_clock_ms, NodeId, RegionId, SimSeed};
use crate::ns_topology::{
    Connection, ConsensusConfig, GeoPoint, Node, NodeCapacity, NodeRole, ResourceLoad, Topology,
    TopologyError, TopologyProperties,
};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Region Catalog
// ============================================================================

/// A geographic region nodes can be placed in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    pub id: RegionId,
    pub name: String,
    pub location: GeoPoint,

    /// Datacenter names within the region; a synthetic one is generated when empty
    #[serde(default)]
    pub datacenters: Vec<String>,
}

/// Small catalog of real regions so demos and examples run out of the box
pub fn default_regions() -> Vec<RegionSpec> {
    let region = |id: &str, name: &str, lat: f64, lon: f64| RegionSpec {
        id: id.to_string(),
        name: name.to_string(),
        location: GeoPoint { latitude: lat, longitude: lon },
        datacenters: Vec::new(),
    };

    vec![
        region("us-east", "US East", 39.0, -77.5),
        region("us-west", "US West", 45.6, -121.2),
        region("eu-west", "EU West", 53.3, -6.3),
        region("ap-southeast", "AP Southeast", 1.3, 103.8),
        region("sa-east", "SA East", -23.5, -46.6),
    ]
}

// ============================================================================
// Profile
// ============================================================================

/// Resource envelope a role's nodes are drawn from, as (min, max) ranges
///
/// Nodes of the same role end up similar but not identical: every field is
/// sampled uniformly from its range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    pub cpu_cores: (u32, u32),
    pub cpu_ghz: (f64, f64),
    pub memory_gb: (u32, u32),
    pub storage_gb: (u32, u32),
    pub storage_iops: (u32, u32),
    pub bandwidth_mbps: (f64, f64),
    pub base_latency_ms: (f64, f64),
}

impl ResourceEnvelope {
    fn sample(&self, rng: &mut StdRng) -> NodeCapacity {
        NodeCapacity {
            cpu_cores: sample_u32(rng, self.cpu_cores),
            cpu_ghz: sample_f64(rng, self.cpu_ghz),
            memory_gb: sample_u32(rng, self.memory_gb),
            storage_gb: sample_u32(rng, self.storage_gb),
            storage_iops: sample_u32(rng, self.storage_iops),
            bandwidth_mbps: sample_f64(rng, self.bandwidth_mbps),
            base_latency_ms: sample_f64(rng, self.base_latency_ms),
        }
    }
}

fn sample_u32(rng: &mut StdRng, (lo, hi): (u32, u32)) -> u32 {
    if hi <= lo {
        lo
    } else {
        rng.gen_range(lo..=hi)
    }
}

fn sample_f64(rng: &mut StdRng, (lo, hi): (f64, f64)) -> f64 {
    if hi <= lo {
        lo
    } else {
        rng.gen_range(lo..hi)
    }
}

/// Population and envelope for one role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub role: NodeRole,

    /// How many nodes of this role each region receives
    pub per_region: usize,

    pub envelope: ResourceEnvelope,
}

/// Full generation profile: per-role populations plus wiring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderProfile {
    pub name: String,
    pub roles: Vec<RoleSpec>,

    /// Connection probability for node pairs within a region
    pub p_intra: f64,

    /// Connection probability for matched node pairs across regions
    pub p_inter: f64,

    /// Candidate links attempted per region pair
    pub max_inter_links: usize,

    pub consensus: ConsensusConfig,
}

impl Default for BuilderProfile {
    fn default() -> Self {
        let envelope = |cores: (u32, u32), ghz: (f64, f64), mem: (u32, u32), storage: (u32, u32), iops: (u32, u32), bw: (f64, f64)| ResourceEnvelope {
            cpu_cores: cores,
            cpu_ghz: ghz,
            memory_gb: mem,
            storage_gb: storage,
            storage_iops: iops,
            bandwidth_mbps: bw,
            base_latency_ms: (1.0, 4.0),
        };

        Self {
            name: "standard".to_string(),
            roles: vec![
                RoleSpec {
                    role: NodeRole::Validator,
                    per_region: 3,
                    envelope: envelope((16, 32), (3.0, 4.0), (64, 128), (2000, 4000), (50_000, 100_000), (2000.0, 10_000.0)),
                },
                RoleSpec {
                    role: NodeRole::Miner,
                    per_region: 2,
                    envelope: envelope((32, 64), (3.5, 4.5), (128, 256), (4000, 8000), (80_000, 150_000), (2000.0, 10_000.0)),
                },
                RoleSpec {
                    role: NodeRole::FullRelay,
                    per_region: 4,
                    envelope: envelope((8, 16), (2.5, 3.5), (32, 64), (1000, 2000), (20_000, 50_000), (1000.0, 5000.0)),
                },
                RoleSpec {
                    role: NodeRole::LightClient,
                    per_region: 6,
                    envelope: envelope((2, 4), (2.0, 3.0), (4, 8), (100, 250), (2000, 8000), (100.0, 500.0)),
                },
                RoleSpec {
                    role: NodeRole::Archive,
                    per_region: 1,
                    envelope: envelope((16, 32), (2.5, 3.5), (128, 256), (16_000, 32_000), (30_000, 60_000), (1000.0, 5000.0)),
                },
                RoleSpec {
                    role: NodeRole::ApiGateway,
                    per_region: 2,
                    envelope: envelope((8, 16), (3.0, 4.0), (32, 64), (500, 1000), (20_000, 40_000), (2000.0, 8000.0)),
                },
            ],
            p_intra: 0.7,
            p_inter: 0.25,
            max_inter_links: 3,
            consensus: ConsensusConfig::default(),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Deterministic-by-seed topology generator
pub struct TopologyBuilder {
    profile: BuilderProfile,
    seed: Option<SimSeed>,
}

impl TopologyBuilder {
    pub fn new(profile: BuilderProfile) -> Self {
        Self { profile, seed: None }
    }

    /// Fix the random source so repeated builds are bit-identical
    pub fn with_seed(mut self, seed: SimSeed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Instantiate the configured node populations in every region, then
    /// wire connections in two passes: dense intra-region, sparse
    /// inter-region with latency derived from geographic distance.
    pub fn build(&self, regions: &[RegionSpec]) -> Result<Topology, TopologyError> {
        let seed = self.seed.unwrap_or_else(|| {
            let mut seed = [0u8; 32];
            rand::thread_rng().fill(&mut seed);
            seed
        });
        let mut rng = StdRng::from_seed(seed);
        let now = wall_clock_ms();

        let mut topology = Topology {
            id: format!("topo-{:08x}", rng.next_u64() as u32),
            name: format!("{} ({} regions)", self.profile.name, regions.len()),
            description: format!("generated topology, profile '{}'", self.profile.name),
            version: 1,
            created_at_ms: now,
            updated_at_ms: now,
            nodes: Vec::new(),
            connections: Vec::new(),
            consensus: self.profile.consensus.clone(),
            properties: TopologyProperties::default(),
        };

        // Per-region node id lists, in region order, for the wiring passes
        let mut region_members: Vec<Vec<NodeId>> = Vec::with_capacity(regions.len());

        for region in regions {
            let mut members = Vec::new();
            for spec in &self.profile.roles {
                for idx in 0..spec.per_region {
                    let node = self.make_node(region, spec, idx, now, &mut rng);
                    members.push(node.id.clone());
                    topology.nodes.push(node);
                }
            }
            region_members.push(members);
        }

        let mut conn_seq = 0usize;
        let mut pairs: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();

        // Intra-region pass: every pair within a region, probability p_intra.
        // A region with fewer than two nodes simply contributes no pairs.
        for members in &region_members {
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    if !rng.gen_bool(self.profile.p_intra.clamp(0.0, 1.0)) {
                        continue;
                    }
                    let conn = self.make_intra_connection(
                        &topology,
                        &members[i],
                        &members[j],
                        &mut conn_seq,
                        now,
                        &mut rng,
                    );
                    record_connection(&mut topology, &mut pairs, conn);
                }
            }
        }

        // Inter-region pass: matched node indices across each region pair,
        // up to max_inter_links candidates, probability p_inter. Latency
        // follows great-circle distance between the regions.
        for ri in 0..regions.len() {
            for rj in (ri + 1)..regions.len() {
                let candidates = self
                    .profile
                    .max_inter_links
                    .min(region_members[ri].len())
                    .min(region_members[rj].len());
                let distance_km =
                    haversine_km(&regions[ri].location, &regions[rj].location);

                for k in 0..candidates {
                    if !rng.gen_bool(self.profile.p_inter.clamp(0.0, 1.0)) {
                        continue;
                    }
                    let a = region_members[ri][k].clone();
                    let b = region_members[rj][k].clone();
                    let pair = ordered_pair(&a, &b);
                    if pairs.contains(&pair) {
                        continue;
                    }
                    let conn = self.make_inter_connection(
                        &topology,
                        &a,
                        &b,
                        distance_km,
                        &mut conn_seq,
                        now,
                        &mut rng,
                    );
                    record_connection(&mut topology, &mut pairs, conn);
                }
            }
        }

        topology.recompute_properties();
        topology.validate()?;
        Ok(topology)
    }

    fn make_node(
        &self,
        region: &RegionSpec,
        spec: &RoleSpec,
        idx: usize,
        now: u64,
        rng: &mut StdRng,
    ) -> Node {
        let capacity = spec.envelope.sample(rng);
        let datacenter = if region.datacenters.is_empty() {
            format!("{}-dc{}", region.id, rng.gen_range(1..=3))
        } else {
            region.datacenters[rng.gen_range(0..region.datacenters.len())].clone()
        };

        Node {
            id: format!("{}-{}-{}", region.id, spec.role.label(), idx + 1),
            name: format!("{} {} {}", region.name, spec.role.label(), idx + 1),
            role: spec.role,
            region: region.id.clone(),
            datacenter,
            location: GeoPoint {
                latitude: region.location.latitude + rng.gen_range(-1.5..1.5),
                longitude: region.location.longitude + rng.gen_range(-1.5..1.5),
            },
            capacity,
            online: true,
            last_seen_ms: now,
            uptime_pct: rng.gen_range(99.5..100.0),
            load: ResourceLoad {
                cpu: rng.gen_range(10.0..60.0),
                memory: rng.gen_range(20.0..70.0),
                storage: rng.gen_range(10.0..50.0),
                network: rng.gen_range(5.0..40.0),
            },
            peers: BTreeSet::new(),
            transactions_processed: 0,
            blocks_produced: 0,
            consensus_participation: if spec.role == NodeRole::Validator {
                rng.gen_range(95.0..100.0)
            } else {
                0.0
            },
            peer_count: 0,
        }
    }

    fn make_intra_connection(
        &self,
        topology: &Topology,
        a: &str,
        b: &str,
        seq: &mut usize,
        now: u64,
        rng: &mut StdRng,
    ) -> Connection {
        let bandwidth = endpoint_bandwidth(topology, a, b);
        *seq += 1;
        Connection {
            id: format!("conn-{:05}", *seq),
            from: a.to_string(),
            to: b.to_string(),
            bandwidth_mbps: bandwidth,
            latency_ms: rng.gen_range(1.0..5.0),
            reliability: 0.999,
            cost_per_gb: rng.gen_range(0.01..0.05),
            encrypted: true,
            compressed: false,
            active: true,
            last_used_ms: now,
            traffic_in_mbps: rng.gen_range(0.0..bandwidth * 0.1),
            traffic_out_mbps: rng.gen_range(0.0..bandwidth * 0.1),
            error_count: 0,
        }
    }

    fn make_inter_connection(
        &self,
        topology: &Topology,
        a: &str,
        b: &str,
        distance_km: f64,
        seq: &mut usize,
        now: u64,
        rng: &mut StdRng,
    ) -> Connection {
        // Round-trip over fiber: roughly 1 ms per 100 km, plus routing jitter
        let latency = distance_km / 100.0 + rng.gen_range(2.0..10.0);
        let bandwidth = (endpoint_bandwidth(topology, a, b) / 4.0).max(100.0);
        *seq += 1;
        Connection {
            id: format!("conn-{:05}", *seq),
            from: a.to_string(),
            to: b.to_string(),
            bandwidth_mbps: bandwidth,
            latency_ms: latency,
            reliability: rng.gen_range(0.99..0.999),
            cost_per_gb: rng.gen_range(0.05..0.12),
            encrypted: true,
            compressed: true,
            active: true,
            last_used_ms: now,
            traffic_in_mbps: rng.gen_range(0.0..bandwidth * 0.1),
            traffic_out_mbps: rng.gen_range(0.0..bandwidth * 0.1),
            error_count: 0,
        }
    }
}

/// Link capacity is bounded by the slower endpoint
fn endpoint_bandwidth(topology: &Topology, a: &str, b: &str) -> f64 {
    let bw_a = topology.node(a).map(|n| n.capacity.bandwidth_mbps).unwrap_or(1000.0);
    let bw_b = topology.node(b).map(|n| n.capacity.bandwidth_mbps).unwrap_or(1000.0);
    bw_a.min(bw_b)
}

fn ordered_pair(a: &str, b: &str) -> (NodeId, NodeId) {
    if a < b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn record_connection(
    topology: &mut Topology,
    pairs: &mut BTreeSet<(NodeId, NodeId)>,
    conn: Connection,
) {
    pairs.insert(ordered_pair(&conn.from, &conn.to));
    let (from, to) = (conn.from.clone(), conn.to.clone());
    topology.connections.push(conn);
    topology.link_nodes(&from, &to);
}

// ============================================================================
// Geography
// ============================================================================

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometers
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

// ============================================================================
// Tests
// ============================================================================
