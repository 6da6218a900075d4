use crate::ns_interface::{ConnectionId, NodeId, RegionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Node Roles
// ============================================================================

/// Role a node plays in the simulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    Validator,
    Miner,
    FullRelay,
    LightClient,
    Archive,
    ApiGateway,
}

impl NodeRole {
    pub const ALL: [NodeRole; 6] = [
        NodeRole::Validator,
        NodeRole::Miner,
        NodeRole::FullRelay,
        NodeRole::LightClient,
        NodeRole::Archive,
        NodeRole::ApiGateway,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NodeRole::Validator => "validator",
            NodeRole::Miner => "miner",
            NodeRole::FullRelay => "full-relay",
            NodeRole::LightClient => "light-client",
            NodeRole::Archive => "archive",
            NodeRole::ApiGateway => "api-gateway",
        }
    }

    /// Synthetic transaction throughput contribution (tx/s) while online
    ///
    /// Miners carry the heaviest share, relays a moderate one, light clients
    /// close to nothing. The metric sampler sums these across online nodes.
    pub fn base_throughput(&self) -> f64 {
        match self {
            NodeRole::Validator => 850.0,
            NodeRole::Miner => 1200.0,
            NodeRole::FullRelay => 400.0,
            NodeRole::LightClient => 40.0,
            NodeRole::Archive => 150.0,
            NodeRole::ApiGateway => 600.0,
        }
    }
}

// ============================================================================
// Consensus Configuration
// ============================================================================

/// Consensus family the topology is provisioned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsensusKind {
    ProofOfStake,
    ProofOfWork,
    DelegatedProofOfStake,
    Pbft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub kind: ConsensusKind,

    /// Number of shards the network is split into (1 = unsharded)
    pub shard_count: u32,

    /// How many nodes replicate each data item
    pub replication_factor: u32,

    /// Minimum validator population for the network to be considered healthy
    pub min_validators: u32,

    /// Target interval between produced blocks, in seconds
    pub target_block_time_secs: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            kind: ConsensusKind::ProofOfStake,
            shard_count: 1,
            replication_factor: 3,
            min_validators: 4,
            target_block_time_secs: 12,
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Provisioned hardware capacity of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub cpu_cores: u32,
    pub cpu_ghz: f64,
    pub memory_gb: u32,
    pub storage_gb: u32,
    pub storage_iops: u32,
    pub bandwidth_mbps: f64,

    /// Base network latency contributed by this node's uplink, in ms
    pub base_latency_ms: f64,
}

/// Per-resource load percentages (0-100)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLoad {
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
    pub network: f64,
}

/// A participant in the simulated network
///
/// Adjacency (`peers`) is kept symmetric at all times: if A lists B then B
/// lists A. An offline node has an empty adjacency set; its links are severed
/// on failure and re-established on recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,

    // Placement
    pub region: RegionId,
    pub datacenter: String,
    pub location: GeoPoint,

    // Capacity
    pub capacity: NodeCapacity,

    // Live status
    pub online: bool,
    pub last_seen_ms: u64,
    pub uptime_pct: f64,
    pub load: ResourceLoad,

    /// Connected node ids, symmetric with the other endpoint's set
    pub peers: BTreeSet<NodeId>,

    // Participation counters
    pub transactions_processed: u64,
    /// Non-zero only for the miner role
    pub blocks_produced: u64,
    /// Non-zero only for the validator role
    pub consensus_participation: f64,
    pub peer_count: usize,
}

// ============================================================================
// Connection
// ============================================================================

/// An undirected logical link between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub from: NodeId,
    pub to: NodeId,

    pub bandwidth_mbps: f64,
    pub latency_ms: f64,
    /// Delivery reliability in [0, 1]
    pub reliability: f64,
    pub cost_per_gb: f64,
    pub encrypted: bool,
    pub compressed: bool,

    pub active: bool,
    pub last_used_ms: u64,
    pub traffic_in_mbps: f64,
    pub traffic_out_mbps: f64,
    pub error_count: u64,
}

impl Connection {
    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }

    /// The endpoint opposite to `node_id`, if `node_id` is an endpoint at all
    pub fn other_end(&self, node_id: &str) -> Option<&NodeId> {
        if self.from == node_id {
            Some(&self.to)
        } else if self.to == node_id {
            Some(&self.from)
        } else {
            None
        }
    }
}

// ============================================================================
// Topology
// ============================================================================

/// Derived aggregate properties, recomputed after construction or mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyProperties {
    pub node_count: usize,
    pub connection_count: usize,

    /// Mean latency across currently active connections, in ms
    pub avg_latency_ms: f64,

    /// Sum of connection bandwidths
    pub total_bandwidth_mbps: f64,

    /// Mean adjacency size per node
    pub redundancy: f64,

    /// Normalized Shannon entropy of node distribution across regions.
    /// 1.0 = perfectly even spread, 0.0 = single-region concentration.
    pub decentralization: f64,
}

/// The full simulated network: nodes, links and aggregate state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: u32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,

    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,

    pub consensus: ConsensusConfig,
    pub properties: TopologyProperties,
}

// ============================================================================
// Validation Errors
// ============================================================================

/// Construction-time validation failures
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    DuplicateNodeId(NodeId),
    DuplicateConnectionId(ConnectionId),
    SelfLoop(ConnectionId),
    DuplicatePair(NodeId, NodeId),
    UnknownEndpoint { connection: ConnectionId, node: NodeId },
    AsymmetricAdjacency { node: NodeId, peer: NodeId },
    OfflineNodeLinked(NodeId),
    ActiveLinkToOfflineNode { connection: ConnectionId, node: NodeId },
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyError::DuplicateNodeId(id) => write!(f, "duplicate node id '{}'", id),
            TopologyError::DuplicateConnectionId(id) => {
                write!(f, "duplicate connection id '{}'", id)
            }
            TopologyError::SelfLoop(id) => write!(f, "connection '{}' links a node to itself", id),
            TopologyError::DuplicatePair(a, b) => {
                write!(f, "more than one connection between '{}' and '{}'", a, b)
            }
            TopologyError::UnknownEndpoint { connection, node } => {
                write!(f, "connection '{}' references unknown node '{}'", connection, node)
            }
            TopologyError::AsymmetricAdjacency { node, peer } => {
                write!(f, "node '{}' lists '{}' but not vice versa", node, peer)
            }
            TopologyError::OfflineNodeLinked(id) => {
                write!(f, "offline node '{}' still has adjacency entries", id)
            }
            TopologyError::ActiveLinkToOfflineNode { connection, node } => {
                write!(f, "connection '{}' is active but endpoint '{}' is offline", connection, node)
            }
        }
    }
}

impl std::error::Error for TopologyError {}

// ============================================================================
// Implementation
// ============================================================================

impl Topology {
    // ----- lookups -----

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn has_region(&self, region: &str) -> bool {
        self.nodes.iter().any(|n| n.region == region)
    }

    /// Ids of all nodes placed in `region`
    pub fn nodes_in_region(&self, region: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.region == region)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Region of a node, if the node exists
    pub fn region_of(&self, node_id: &str) -> Option<&RegionId> {
        self.node(node_id).map(|n| &n.region)
    }

    /// Node count per region, ordered by region id
    pub fn region_counts(&self) -> BTreeMap<RegionId, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.region.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Indices into `connections` of every link touching `node_id`
    pub fn connections_touching(&self, node_id: &str) -> Vec<usize> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.touches(node_id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Index of the connection between `a` and `b`, in either direction
    pub fn connection_between(&self, a: &str, b: &str) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| (c.from == a && c.to == b) || (c.from == b && c.to == a))
    }

    // ----- invariant-preserving mutation primitives -----

    /// Record adjacency between two nodes on both endpoints
    pub fn link_nodes(&mut self, a: &str, b: &str) {
        if let Some(node) = self.node_mut(a) {
            node.peers.insert(b.to_string());
            node.peer_count = node.peers.len();
        }
        if let Some(node) = self.node_mut(b) {
            node.peers.insert(a.to_string());
            node.peer_count = node.peers.len();
        }
    }

    /// Remove adjacency between two nodes on both endpoints
    pub fn unlink_nodes(&mut self, a: &str, b: &str) {
        if let Some(node) = self.node_mut(a) {
            node.peers.remove(b);
            node.peer_count = node.peers.len();
        }
        if let Some(node) = self.node_mut(b) {
            node.peers.remove(a);
            node.peer_count = node.peers.len();
        }
    }

    /// Take a node offline: adjacency cleared on both sides, every touching
    /// connection deactivated with traffic zeroed, uptime and consensus
    /// participation dropped to zero.
    pub fn sever_node(&mut self, node_id: &str) {
        let former_peers: Vec<NodeId> = match self.node(node_id) {
            Some(node) => node.peers.iter().cloned().collect(),
            None => return,
        };

        for peer in &former_peers {
            self.unlink_nodes(node_id, peer);
        }

        if let Some(node) = self.node_mut(node_id) {
            node.online = false;
            node.uptime_pct = 0.0;
            node.consensus_participation = 0.0;
            node.peers.clear();
            node.peer_count = 0;
        }

        for idx in self.connections_touching(node_id) {
            let conn = &mut self.connections[idx];
            conn.active = false;
            conn.traffic_in_mbps = 0.0;
            conn.traffic_out_mbps = 0.0;
        }
    }

    /// Bring a node back online with the given uptime; consensus
    /// participation is restored only for validators. Reconnection is the
    /// engine's job since it is probabilistic.
    pub fn mark_node_online(&mut self, node_id: &str, uptime_pct: f64, participation: f64, now_ms: u64) {
        if let Some(node) = self.node_mut(node_id) {
            node.online = true;
            node.uptime_pct = uptime_pct;
            node.last_seen_ms = now_ms;
            if node.role == NodeRole::Validator {
                node.consensus_participation = participation;
            }
        }
    }

    // ----- derived properties -----

    /// Recompute the aggregate properties from current node/connection state
    pub fn recompute_properties(&mut self) {
        let node_count = self.nodes.len();
        let connection_count = self.connections.len();

        let active: Vec<&Connection> = self.connections.iter().filter(|c| c.active).collect();
        let avg_latency_ms = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|c| c.latency_ms).sum::<f64>() / active.len() as f64
        };

        let total_bandwidth_mbps = self.connections.iter().map(|c| c.bandwidth_mbps).sum();

        let redundancy = if node_count == 0 {
            0.0
        } else {
            self.nodes.iter().map(|n| n.peers.len()).sum::<usize>() as f64 / node_count as f64
        };

        let counts: Vec<usize> = self.region_counts().values().copied().collect();
        let decentralization = shannon_decentralization(&counts);

        self.properties = TopologyProperties {
            node_count,
            connection_count,
            avg_latency_ms,
            total_bandwidth_mbps,
            redundancy,
            decentralization,
        };
    }

    // ----- validation -----

    /// Check the structural invariants; the builder and the registry reject
    /// any topology that fails here.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut node_ids = BTreeSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(TopologyError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut conn_ids = BTreeSet::new();
        let mut pairs = BTreeSet::new();
        for conn in &self.connections {
            if !conn_ids.insert(conn.id.as_str()) {
                return Err(TopologyError::DuplicateConnectionId(conn.id.clone()));
            }
            if conn.from == conn.to {
                return Err(TopologyError::SelfLoop(conn.id.clone()));
            }
            for endpoint in [&conn.from, &conn.to] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(TopologyError::UnknownEndpoint {
                        connection: conn.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
            let pair = if conn.from < conn.to {
                (conn.from.clone(), conn.to.clone())
            } else {
                (conn.to.clone(), conn.from.clone())
            };
            if !pairs.insert(pair.clone()) {
                return Err(TopologyError::DuplicatePair(pair.0, pair.1));
            }
        }

        for node in &self.nodes {
            if !node.online && !node.peers.is_empty() {
                return Err(TopologyError::OfflineNodeLinked(node.id.clone()));
            }
            for peer in &node.peers {
                let reciprocal = self
                    .node(peer)
                    .map(|p| p.peers.contains(&node.id))
                    .unwrap_or(false);
                if !reciprocal {
                    return Err(TopologyError::AsymmetricAdjacency {
                        node: node.id.clone(),
                        peer: peer.clone(),
                    });
                }
            }
        }

        for conn in &self.connections {
            if conn.active {
                for endpoint in [&conn.from, &conn.to] {
                    let online = self.node(endpoint).map(|n| n.online).unwrap_or(false);
                    if !online {
                        return Err(TopologyError::ActiveLinkToOfflineNode {
                            connection: conn.id.clone(),
                            node: endpoint.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    // ----- export -----

    /// Structured JSON record for storage or the dashboard
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Normalized Shannon entropy of a node-count distribution
///
/// Returns 0.0 for an empty distribution or a single populated region,
/// 1.0 for a perfectly even split.
pub fn shannon_decentralization(region_counts: &[usize]) -> f64 {
    let total: usize = region_counts.iter().sum();
    let populated = region_counts.iter().filter(|&&c| c > 0).count();
    if total == 0 || populated < 2 {
        return 0.0;
    }

    let mut entropy = 0.0;
    for &count in region_counts {
        if count == 0 {
            continue;
        }
        let p = count as f64 / total as f64;
        entropy -= p * p.log2();
    }

    let max_entropy = (populated as f64).log2();
    (entropy / max_entropy).clamp(0.0, 1.0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns_interface::wall_clock_ms;

    fn test_node(id: &str, region: &str, role: NodeRole) -> Node {
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

    fn test_connection(id: &str, from: &str, to: &str) -> Connection {
        Connection {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            bandwidth_mbps: 1000.0,
            latency_ms: 3.0,
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

    fn two_node_topology() -> Topology {
        let mut topo = Topology {
            id: "topo-test".to_string(),
            name: "test".to_string(),
            description: String::new(),
            version: 1,
            created_at_ms: wall_clock_ms(),
            updated_at_ms: wall_clock_ms(),
            nodes: vec![
                test_node("a", "us-east", NodeRole::Validator),
                test_node("b", "eu-west", NodeRole::Miner),
            ],
            connections: vec![test_connection("c1", "a", "b")],
            consensus: ConsensusConfig::default(),
            properties: TopologyProperties::default(),
        };
        topo.link_nodes("a", "b");
        topo.recompute_properties();
        topo
    }

    #[test]
    fn test_link_nodes_is_symmetric() {
        let topo = two_node_topology();

        // A lists B and B lists A
        assert!(topo.node("a").unwrap().peers.contains("b"));
        assert!(topo.node("b").unwrap().peers.contains("a"));
        assert_eq!(topo.node("a").unwrap().peer_count, 1);
        assert!(topo.validate().is_ok());
    }

    #[test]
    fn test_sever_node_clears_adjacency_and_deactivates_links() {
        let mut topo = two_node_topology();
        topo.sever_node("a");

        let a = topo.node("a").unwrap();
        assert!(!a.online);
        assert!(a.peers.is_empty());
        assert_eq!(a.peer_count, 0);
        assert_eq!(a.uptime_pct, 0.0);
        assert_eq!(a.consensus_participation, 0.0);

        // Symmetric removal on the surviving endpoint
        assert!(!topo.node("b").unwrap().peers.contains("a"));

        // Touching connection is inactive with traffic zeroed
        let conn = &topo.connections[0];
        assert!(!conn.active);
        assert_eq!(conn.traffic_in_mbps, 0.0);

        assert!(topo.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_self_loop() {
        let mut topo = two_node_topology();
        topo.connections.push(test_connection("c2", "a", "a"));
        assert_eq!(
            topo.validate(),
            Err(TopologyError::SelfLoop("c2".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_pair() {
        let mut topo = two_node_topology();
        // Same unordered pair, reversed direction
        topo.connections.push(test_connection("c2", "b", "a"));
        assert_eq!(
            topo.validate(),
            Err(TopologyError::DuplicatePair("a".to_string(), "b".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_node_id() {
        let mut topo = two_node_topology();
        topo.nodes.push(test_node("a", "us-east", NodeRole::Archive));
        assert_eq!(
            topo.validate(),
            Err(TopologyError::DuplicateNodeId("a".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_asymmetric_adjacency() {
        let mut topo = two_node_topology();
        topo.node_mut("b").unwrap().peers.remove("a");
        assert!(matches!(
            topo.validate(),
            Err(TopologyError::AsymmetricAdjacency { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_active_link_to_offline_node() {
        let mut topo = two_node_topology();
        // Force the inconsistent state directly, bypassing sever_node
        topo.node_mut("a").unwrap().online = false;
        topo.node_mut("a").unwrap().peers.clear();
        topo.node_mut("b").unwrap().peers.clear();
        assert!(matches!(
            topo.validate(),
            Err(TopologyError::ActiveLinkToOfflineNode { .. })
        ));
    }

    #[test]
    fn test_decentralization_even_split_is_one() {
        assert!((shannon_decentralization(&[2, 2]) - 1.0).abs() < 1e-9);
        assert!((shannon_decentralization(&[5, 5, 5]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decentralization_single_region_is_zero() {
        assert_eq!(shannon_decentralization(&[7]), 0.0);
        assert_eq!(shannon_decentralization(&[7, 0, 0]), 0.0);
        assert_eq!(shannon_decentralization(&[]), 0.0);
    }

    #[test]
    fn test_decentralization_skewed_split_is_between() {
        let d = shannon_decentralization(&[9, 1]);
        assert!(d > 0.0 && d < 1.0);
    }

    #[test]
    fn test_recompute_properties() {
        let topo = two_node_topology();
        assert_eq!(topo.properties.node_count, 2);
        assert_eq!(topo.properties.connection_count, 1);
        assert!((topo.properties.avg_latency_ms - 3.0).abs() < 1e-9);
        assert!((topo.properties.redundancy - 1.0).abs() < 1e-9);
        // Two regions, one node each: even split
        assert!((topo.properties.decentralization - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_avg_latency_ignores_inactive_connections() {
        let mut topo = two_node_topology();
        topo.connections[0].active = false;
        topo.recompute_properties();
        assert_eq!(topo.properties.avg_latency_ms, 0.0);
    }

    #[test]
    fn test_json_round_trip() {
        let topo = two_node_topology();
        let json = topo.to_json().unwrap();
        let back: Topology = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nodes.len(), 2);
        assert_eq!(back.connections[0].id, "c1");
        assert_eq!(back.properties, topo.properties);
    }
}
