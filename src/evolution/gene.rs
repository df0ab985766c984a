//! Node and connection genes.

use serde::{Deserialize, Serialize};

use super::activation::Activation;

/// Stable node identity within a run.
pub type NodeId = u64;

/// Stable identity of a structural edge within a run.
pub type InnovationId = u64;

/// Role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Sensor input (one per sensor).
    Input,
    /// Hidden node added by mutation.
    Hidden,
    /// Control output (one per control signal).
    Output,
}

/// A node gene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    pub id: NodeId,
    pub role: NodeRole,
    /// Ignored for input nodes, which pass their sensor value through.
    pub activation: Activation,
}

impl NodeGene {
    pub fn new(id: NodeId, role: NodeRole, activation: Activation) -> Self {
        Self {
            id,
            role,
            activation,
        }
    }

    pub fn is_input(&self) -> bool {
        self.role == NodeRole::Input
    }

    pub fn is_output(&self) -> bool {
        self.role == NodeRole::Output
    }
}

/// A connection gene. `innovation`, `source` and `target` never change once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    pub innovation: InnovationId,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f32,
    pub enabled: bool,
}

impl ConnectionGene {
    pub fn new(innovation: InnovationId, source: NodeId, target: NodeId, weight: f32) -> Self {
        Self {
            innovation,
            source,
            target,
            weight,
            enabled: true,
        }
    }

    /// The `(source, target)` pair this gene connects.
    pub fn edge(&self) -> (NodeId, NodeId) {
        (self.source, self.target)
    }
}
