//! Serializable genome records.
//!
//! A record holds exactly what is needed to rebuild a genome's behaviour:
//! node genes, connection genes and the ordered input/output id sets.
//! It is validated when converted back into a genome.

use serde::{Deserialize, Serialize};

use crate::evolution::{Activation, InnovationId, NodeId, NodeRole};

/// Persisted form of a genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    /// Genome identifier at the time of saving.
    pub genome_id: u64,
    /// Input node ids, in sensor order.
    pub inputs: Vec<NodeId>,
    /// Output node ids, in control order.
    pub outputs: Vec<NodeId>,
    pub nodes: Vec<NodeRecord>,
    pub connections: Vec<ConnectionRecord>,
}

/// Persisted node gene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub role: NodeRole,
    pub activation: Activation,
}

/// Persisted connection gene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub innovation: InnovationId,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f32,
    pub enabled: bool,
}

/// A genome file: the record plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeExport {
    #[serde(default)]
    pub metadata: GenomeMetadata,
    pub genome: GenomeRecord,
}

/// Provenance of a saved genome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenomeMetadata {
    /// Fitness when saved, if it was evaluated.
    pub fitness: Option<f32>,
    /// Generation the genome was saved from.
    pub generation: usize,
    /// Rank within its generation (1 = best), for autosaves.
    pub rank: Option<usize>,
    pub laps_completed: u32,
    pub checkpoints: u32,
}
