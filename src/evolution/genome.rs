//! Genome representation and structural invariants.
//!
//! Node and connection genes live in ordered maps keyed by their stable ids.
//! Ordered iteration keeps summation order and random choices deterministic.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::schema::{ConfigError, ConnectionRecord, GenomeConfig, GenomeRecord, NodeRecord};

use super::activation::Activation;
use super::gene::{ConnectionGene, InnovationId, NodeGene, NodeId, NodeRole};
use super::innovation::InnovationRegistry;
use super::rng::GenomeRng;

/// A structural invariant a genome would break.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralViolation {
    #[error("Connection {innovation} references missing node {node}")]
    DanglingEndpoint {
        innovation: InnovationId,
        node: NodeId,
    },
    #[error("Enabled connections form a cycle")]
    Cycle,
    #[error("Node {node} is missing")]
    MissingNode { node: NodeId },
    #[error("Edge {from} -> {to} is enabled more than once")]
    DuplicateEdge { from: NodeId, to: NodeId },
    #[error("Duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u64 },
    #[error("Node {id} has role {actual:?}, expected {expected:?}")]
    RoleMismatch {
        id: NodeId,
        expected: NodeRole,
        actual: NodeRole,
    },
    #[error("Node {node} cannot be the {end} of a connection")]
    InvalidEndpoint { node: NodeId, end: &'static str },
    #[error("Genome has no inputs or no outputs")]
    EmptyInterface,
    #[error("Genomes have different input or output ids")]
    InterfaceMismatch,
}

/// One candidate network: node genes plus connection genes.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    id: u64,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    nodes: BTreeMap<NodeId, NodeGene>,
    connections: BTreeMap<InnovationId, ConnectionGene>,
}

/// Fixed input and output ids for a network shape: inputs take `0..inputs`,
/// outputs the ids right after them.
pub fn interface_ids(inputs: usize, outputs: usize) -> (Vec<NodeId>, Vec<NodeId>) {
    let input_ids = (0..inputs as NodeId).collect();
    let output_ids = (inputs as NodeId..(inputs + outputs) as NodeId).collect();
    (input_ids, output_ids)
}

impl Genome {
    /// Build a genome with only input and output nodes and a random set of
    /// input→output connections.
    pub fn create_minimal(
        id: u64,
        input_ids: &[NodeId],
        output_ids: &[NodeId],
        config: &GenomeConfig,
        registry: &InnovationRegistry,
        rng: &mut GenomeRng,
    ) -> Result<Self, ConfigError> {
        if input_ids.is_empty() || output_ids.is_empty() {
            return Err(ConfigError::InvalidNodeCounts {
                inputs: input_ids.len(),
                outputs: output_ids.len(),
            });
        }

        let mut genome = Self {
            id,
            inputs: input_ids.to_vec(),
            outputs: output_ids.to_vec(),
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
        };

        for &input in input_ids {
            genome.nodes.insert(
                input,
                NodeGene::new(input, NodeRole::Input, Activation::Identity),
            );
        }
        for &output in output_ids {
            genome.nodes.insert(
                output,
                NodeGene::new(output, NodeRole::Output, config.output_activation),
            );
        }

        for &source in input_ids {
            for &target in output_ids {
                if !rng.chance(config.initial_connection_density) {
                    continue;
                }
                let innovation = registry.get_or_create(source, target);
                let weight = rng.bounded_normal(config.initial_weight_std, config.weight_bound);
                genome
                    .connections
                    .insert(innovation, ConnectionGene::new(innovation, source, target, weight));
            }
        }

        Ok(genome)
    }

    /// Assemble a genome from parts and check every invariant.
    pub fn from_parts(
        id: u64,
        inputs: Vec<NodeId>,
        outputs: Vec<NodeId>,
        nodes: impl IntoIterator<Item = NodeGene>,
        connections: impl IntoIterator<Item = ConnectionGene>,
    ) -> Result<Self, StructuralViolation> {
        let mut node_map = BTreeMap::new();
        for node in nodes {
            if node_map.insert(node.id, node).is_some() {
                return Err(StructuralViolation::DuplicateId {
                    kind: "node",
                    id: node.id,
                });
            }
        }
        let mut connection_map = BTreeMap::new();
        for conn in connections {
            if connection_map.insert(conn.innovation, conn).is_some() {
                return Err(StructuralViolation::DuplicateId {
                    kind: "innovation",
                    id: conn.innovation,
                });
            }
        }

        let genome = Self {
            id,
            inputs,
            outputs,
            nodes: node_map,
            connections: connection_map,
        };
        genome.validate()?;
        Ok(genome)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Copy of this genome under a new identity.
    pub fn with_id(&self, id: u64) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeGene> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeGene> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeGene> {
        self.nodes.values()
    }

    pub fn connection(&self, innovation: InnovationId) -> Option<&ConnectionGene> {
        self.connections.get(&innovation)
    }

    pub(crate) fn connection_mut(
        &mut self,
        innovation: InnovationId,
    ) -> Option<&mut ConnectionGene> {
        self.connections.get_mut(&innovation)
    }

    /// Connections in innovation order.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionGene> {
        self.connections.values()
    }

    pub(crate) fn connections_mut(&mut self) -> impl Iterator<Item = &mut ConnectionGene> {
        self.connections.values_mut()
    }

    pub fn enabled_connections(&self) -> impl Iterator<Item = &ConnectionGene> {
        self.connections.values().filter(|c| c.enabled)
    }

    pub fn hidden_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.role == NodeRole::Hidden)
            .count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether any gene (enabled or not) connects `source -> target`.
    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.connections
            .values()
            .any(|c| c.source == source && c.target == target)
    }

    pub(crate) fn insert_node(&mut self, node: NodeGene) {
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn insert_connection(&mut self, conn: ConnectionGene) {
        self.connections.insert(conn.innovation, conn);
    }

    /// Whether `to` is reachable from `from` over enabled connections.
    pub fn is_reachable(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            for conn in self.enabled_connections().filter(|c| c.source == node) {
                if conn.target == to {
                    return true;
                }
                if visited.insert(conn.target) {
                    stack.push(conn.target);
                }
            }
        }
        false
    }

    /// Whether enabling `source -> target` would close a cycle.
    pub fn would_create_cycle(&self, source: NodeId, target: NodeId) -> bool {
        self.is_reachable(target, source)
    }

    /// Node ids in evaluation order over enabled connections (Kahn's algorithm,
    /// ties broken by node id). Fails with [`StructuralViolation::Cycle`].
    pub fn topological_order(&self) -> Result<Vec<NodeId>, StructuralViolation> {
        let mut in_degree: BTreeMap<NodeId, usize> =
            self.nodes.keys().map(|&id| (id, 0)).collect();
        for conn in self.enabled_connections() {
            if let Some(d) = in_degree.get_mut(&conn.target) {
                *d += 1;
            }
        }

        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for conn in self.enabled_connections().filter(|c| c.source == node) {
                if let Some(d) = in_degree.get_mut(&conn.target) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(conn.target);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(StructuralViolation::Cycle)
        }
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), StructuralViolation> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(StructuralViolation::EmptyInterface);
        }

        let mut seen = HashSet::new();
        let interface = self
            .inputs
            .iter()
            .map(|&id| (id, NodeRole::Input))
            .chain(self.outputs.iter().map(|&id| (id, NodeRole::Output)));
        for (id, expected) in interface {
            if !seen.insert(id) {
                return Err(StructuralViolation::DuplicateId { kind: "node", id });
            }
            let node = self
                .nodes
                .get(&id)
                .ok_or(StructuralViolation::MissingNode { node: id })?;
            if node.role != expected {
                return Err(StructuralViolation::RoleMismatch {
                    id,
                    expected,
                    actual: node.role,
                });
            }
        }
        for node in self.nodes.values() {
            if node.role != NodeRole::Hidden && !seen.contains(&node.id) {
                return Err(StructuralViolation::RoleMismatch {
                    id: node.id,
                    expected: NodeRole::Hidden,
                    actual: node.role,
                });
            }
        }

        let mut enabled_edges = HashSet::new();
        for conn in self.connections.values() {
            for node in [conn.source, conn.target] {
                if !self.nodes.contains_key(&node) {
                    return Err(StructuralViolation::DanglingEndpoint {
                        innovation: conn.innovation,
                        node,
                    });
                }
            }
            if self.nodes[&conn.target].is_input() {
                return Err(StructuralViolation::InvalidEndpoint {
                    node: conn.target,
                    end: "target",
                });
            }
            if conn.enabled && !enabled_edges.insert(conn.edge()) {
                return Err(StructuralViolation::DuplicateEdge {
                    from: conn.source,
                    to: conn.target,
                });
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Convert to the persisted record form.
    pub fn to_record(&self) -> GenomeRecord {
        GenomeRecord {
            genome_id: self.id,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            nodes: self
                .nodes
                .values()
                .map(|n| NodeRecord {
                    id: n.id,
                    role: n.role,
                    activation: n.activation,
                })
                .collect(),
            connections: self
                .connections
                .values()
                .map(|c| ConnectionRecord {
                    innovation: c.innovation,
                    source: c.source,
                    target: c.target,
                    weight: c.weight,
                    enabled: c.enabled,
                })
                .collect(),
        }
    }

    /// Rebuild a genome from a record, validating every invariant.
    pub fn from_record(record: &GenomeRecord) -> Result<Self, StructuralViolation> {
        Self::from_parts(
            record.genome_id,
            record.inputs.clone(),
            record.outputs.clone(),
            record
                .nodes
                .iter()
                .map(|n| NodeGene::new(n.id, n.role, n.activation)),
            record.connections.iter().map(|c| ConnectionGene {
                innovation: c.innovation,
                source: c.source,
                target: c.target,
                weight: c.weight,
                enabled: c.enabled,
            }),
        )
    }

    /// Whether `other` has the same fixed input and output ids.
    pub fn same_interface(&self, other: &Genome) -> bool {
        self.inputs == other.inputs && self.outputs == other.outputs
    }
}

/// Structural distance between two genomes: the fraction of non-shared
/// connection genes plus the mean weight difference of shared ones.
pub fn genome_distance(g1: &Genome, g2: &Genome) -> f32 {
    let mut shared = 0usize;
    let mut weight_diff = 0.0f32;
    for conn in g1.connections() {
        if let Some(other) = g2.connection(conn.innovation) {
            shared += 1;
            weight_diff += (conn.weight - other.weight).abs();
        }
    }

    let total = g1.connection_count().max(g2.connection_count());
    if total == 0 {
        return 0.0;
    }
    let unshared = g1.connection_count() + g2.connection_count() - 2 * shared;
    let mean_diff = if shared > 0 {
        weight_diff / shared as f32
    } else {
        0.0
    };
    unshared as f32 / total as f32 + mean_diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(inputs: usize, outputs: usize, seed: u64) -> (Genome, InnovationRegistry) {
        let (input_ids, output_ids) = interface_ids(inputs, outputs);
        let registry = InnovationRegistry::new((inputs + outputs) as NodeId);
        let mut rng = GenomeRng::new(seed);
        let genome = Genome::create_minimal(
            0,
            &input_ids,
            &output_ids,
            &GenomeConfig::default(),
            &registry,
            &mut rng,
        )
        .unwrap();
        (genome, registry)
    }

    #[test]
    fn test_minimal_genome_fully_connected() {
        let (genome, registry) = minimal(3, 4, 42);
        assert_eq!(genome.node_count(), 7);
        assert_eq!(genome.connection_count(), 12);
        assert_eq!(genome.hidden_count(), 0);
        assert_eq!(registry.innovation_count(), 12);
        assert!(genome.validate().is_ok());
        let bound = GenomeConfig::default().weight_bound;
        assert!(genome.connections().all(|c| c.weight.abs() <= bound));
    }

    #[test]
    fn test_minimal_genomes_share_innovations() {
        let (input_ids, output_ids) = interface_ids(2, 2);
        let registry = InnovationRegistry::new(4);
        let config = GenomeConfig::default();
        let a = Genome::create_minimal(
            0,
            &input_ids,
            &output_ids,
            &config,
            &registry,
            &mut GenomeRng::new(1),
        )
        .unwrap();
        let b = Genome::create_minimal(
            1,
            &input_ids,
            &output_ids,
            &config,
            &registry,
            &mut GenomeRng::new(2),
        )
        .unwrap();
        for conn in a.connections() {
            let other = b.connection(conn.innovation).unwrap();
            assert_eq!(other.edge(), conn.edge());
        }
    }

    #[test]
    fn test_sparse_density() {
        let (input_ids, output_ids) = interface_ids(5, 5);
        let registry = InnovationRegistry::new(10);
        let config = GenomeConfig {
            initial_connection_density: 0.0,
            ..Default::default()
        };
        let genome = Genome::create_minimal(
            0,
            &input_ids,
            &output_ids,
            &config,
            &registry,
            &mut GenomeRng::new(3),
        )
        .unwrap();
        assert_eq!(genome.connection_count(), 0);
        assert!(genome.validate().is_ok());
    }

    #[test]
    fn test_zero_inputs_rejected() {
        let registry = InnovationRegistry::new(0);
        let result = Genome::create_minimal(
            0,
            &[],
            &[0, 1],
            &GenomeConfig::default(),
            &registry,
            &mut GenomeRng::new(0),
        );
        assert!(matches!(result, Err(ConfigError::InvalidNodeCounts { .. })));
    }

    #[test]
    fn test_cycle_detection() {
        let nodes = vec![
            NodeGene::new(0, NodeRole::Input, Activation::Identity),
            NodeGene::new(1, NodeRole::Output, Activation::Tanh),
            NodeGene::new(2, NodeRole::Hidden, Activation::Relu),
            NodeGene::new(3, NodeRole::Hidden, Activation::Relu),
        ];
        let acyclic = vec![
            ConnectionGene::new(0, 0, 2, 1.0),
            ConnectionGene::new(1, 2, 3, 1.0),
            ConnectionGene::new(2, 3, 1, 1.0),
        ];
        let genome =
            Genome::from_parts(0, vec![0], vec![1], nodes.clone(), acyclic.clone()).unwrap();
        assert!(genome.would_create_cycle(3, 2));
        assert!(genome.would_create_cycle(1, 2));
        assert!(!genome.would_create_cycle(2, 1));

        let mut cyclic = acyclic.clone();
        cyclic.push(ConnectionGene::new(3, 3, 2, 1.0));
        assert_eq!(
            Genome::from_parts(0, vec![0], vec![1], nodes.clone(), cyclic),
            Err(StructuralViolation::Cycle)
        );

        // A disabled back edge is fine.
        let mut disabled = acyclic;
        let mut back = ConnectionGene::new(3, 3, 2, 1.0);
        back.enabled = false;
        disabled.push(back);
        assert!(Genome::from_parts(0, vec![0], vec![1], nodes, disabled).is_ok());
    }

    #[test]
    fn test_dangling_endpoint_rejected() {
        let nodes = vec![
            NodeGene::new(0, NodeRole::Input, Activation::Identity),
            NodeGene::new(1, NodeRole::Output, Activation::Tanh),
        ];
        let conns = vec![ConnectionGene::new(0, 0, 9, 1.0)];
        assert_eq!(
            Genome::from_parts(0, vec![0], vec![1], nodes, conns),
            Err(StructuralViolation::DanglingEndpoint {
                innovation: 0,
                node: 9
            })
        );
    }

    #[test]
    fn test_missing_interface_node_rejected() {
        let nodes = vec![NodeGene::new(0, NodeRole::Input, Activation::Identity)];
        assert_eq!(
            Genome::from_parts(0, vec![0], vec![1], nodes, Vec::new()),
            Err(StructuralViolation::MissingNode { node: 1 })
        );
    }

    #[test]
    fn test_duplicate_enabled_edge_rejected() {
        let nodes = vec![
            NodeGene::new(0, NodeRole::Input, Activation::Identity),
            NodeGene::new(1, NodeRole::Output, Activation::Tanh),
        ];
        let conns = vec![
            ConnectionGene::new(0, 0, 1, 1.0),
            ConnectionGene::new(5, 0, 1, -1.0),
        ];
        assert_eq!(
            Genome::from_parts(0, vec![0], vec![1], nodes, conns),
            Err(StructuralViolation::DuplicateEdge { from: 0, to: 1 })
        );
    }

    #[test]
    fn test_record_roundtrip_preserves_genes() {
        let (genome, _) = minimal(3, 2, 9);
        let record = genome.to_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: GenomeRecord = serde_json::from_str(&json).unwrap();
        let restored = Genome::from_record(&parsed).unwrap();
        assert_eq!(restored, genome);
    }

    #[test]
    fn test_genome_distance() {
        let (g1, _) = minimal(3, 2, 1);
        let g2 = g1.with_id(5);
        let (g3, _) = minimal(3, 2, 2);
        assert!(genome_distance(&g1, &g2).abs() < 1e-6);
        assert!(genome_distance(&g1, &g3) > 0.0);
    }
}
