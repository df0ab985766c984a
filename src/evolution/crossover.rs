//! Innovation-aligned crossover.

use std::collections::BTreeSet;

use super::gene::{ConnectionGene, NodeGene};
use super::genome::{Genome, StructuralViolation};
use super::rng::GenomeRng;

/// Cross two parents into a child genome with id `child_id`.
///
/// Genes are aligned by innovation id. Matching genes come from a random
/// parent; a gene disabled in the chosen parent is re-enabled with probability
/// `reenable_rate` when either parent has it enabled. Disjoint and excess genes
/// come only from the fitter parent, or from a random parent on a tie. Node
/// activations are taken from the parent that donated the node.
///
/// The child is validated; callers fall back to a copy of the fitter parent
/// when this returns an error.
pub fn crossover(
    child_id: u64,
    a: &Genome,
    fitness_a: f32,
    b: &Genome,
    fitness_b: f32,
    reenable_rate: f32,
    rng: &mut GenomeRng,
) -> Result<Genome, StructuralViolation> {
    if !a.same_interface(b) {
        return Err(StructuralViolation::InterfaceMismatch);
    }

    let (fitter, other) = if fitness_a > fitness_b {
        (a, b)
    } else if fitness_b > fitness_a {
        (b, a)
    } else if rng.chance(0.5) {
        (a, b)
    } else {
        (b, a)
    };

    let mut connections: Vec<ConnectionGene> = Vec::with_capacity(fitter.connection_count());
    for gene in fitter.connections() {
        let inherited = match other.connection(gene.innovation) {
            Some(matching) => {
                let mut chosen = if rng.chance(0.5) { *gene } else { *matching };
                if !chosen.enabled
                    && (gene.enabled || matching.enabled)
                    && rng.chance(reenable_rate)
                {
                    chosen.enabled = true;
                }
                chosen
            }
            None => *gene,
        };
        connections.push(inherited);
    }

    let mut needed: BTreeSet<_> = fitter.inputs().iter().chain(fitter.outputs()).copied().collect();
    for conn in &connections {
        needed.insert(conn.source);
        needed.insert(conn.target);
    }

    let mut nodes: Vec<NodeGene> = Vec::with_capacity(needed.len());
    for id in needed {
        let node = match (fitter.node(id), other.node(id)) {
            (Some(f), Some(o)) => {
                if rng.chance(0.5) {
                    *f
                } else {
                    *o
                }
            }
            (Some(f), None) => *f,
            (None, Some(o)) => *o,
            (None, None) => {
                return Err(StructuralViolation::MissingNode { node: id });
            }
        };
        nodes.push(node);
    }

    Genome::from_parts(
        child_id,
        fitter.inputs().to_vec(),
        fitter.outputs().to_vec(),
        nodes,
        connections,
    )
}
