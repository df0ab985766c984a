//! Feed-forward network phenotype compiled from a genome.

use std::collections::HashMap;

use super::activation::Activation;
use super::gene::NodeRole;
use super::genome::{Genome, StructuralViolation};

/// Errors raised when running a network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Expected {expected} inputs, got {actual}")]
    InputLength { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
struct CompiledNode {
    activation: Activation,
    is_input: bool,
    /// `(source slot, weight)` pairs, in innovation order.
    incoming: Vec<(usize, f32)>,
}

/// A genome compiled into evaluation order.
///
/// Node values live in a flat buffer indexed by position in the topological
/// order; every incoming edge refers to an earlier slot.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<CompiledNode>,
    input_slots: Vec<usize>,
    output_slots: Vec<usize>,
    values: Vec<f32>,
}

impl Network {
    /// Compile a genome. Fails if its enabled connections are cyclic.
    pub fn from_genome(genome: &Genome) -> Result<Self, StructuralViolation> {
        let order = genome.topological_order()?;
        let slot_of: HashMap<_, _> = order.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut nodes: Vec<CompiledNode> = order
            .iter()
            .map(|&id| {
                let (activation, is_input) = genome
                    .node(id)
                    .map(|n| (n.activation, n.role == NodeRole::Input))
                    .unwrap_or((Activation::Identity, false));
                CompiledNode {
                    activation,
                    is_input,
                    incoming: Vec::new(),
                }
            })
            .collect();

        for conn in genome.enabled_connections() {
            if let (Some(&src), Some(&dst)) = (slot_of.get(&conn.source), slot_of.get(&conn.target))
            {
                nodes[dst].incoming.push((src, conn.weight));
            }
        }

        let slots = |ids: &[u64]| -> Vec<usize> {
            ids.iter().filter_map(|id| slot_of.get(id).copied()).collect()
        };
        let input_slots = slots(genome.inputs());
        let output_slots = slots(genome.outputs());
        let values = vec![0.0; nodes.len()];

        Ok(Self {
            nodes,
            input_slots,
            output_slots,
            values,
        })
    }

    /// Propagate one sensor vector through the network.
    pub fn forward(&mut self, inputs: &[f32]) -> Result<Vec<f32>, NetworkError> {
        if inputs.len() != self.input_slots.len() {
            return Err(NetworkError::InputLength {
                expected: self.input_slots.len(),
                actual: inputs.len(),
            });
        }

        self.values.fill(0.0);
        for (&slot, &value) in self.input_slots.iter().zip(inputs) {
            self.values[slot] = value;
        }

        for slot in 0..self.nodes.len() {
            let node = &self.nodes[slot];
            if node.is_input {
                continue;
            }
            let sum: f32 = node
                .incoming
                .iter()
                .map(|&(src, weight)| self.values[src] * weight)
                .sum();
            self.values[slot] = node.activation.apply(sum);
        }

        Ok(self.output_slots.iter().map(|&s| self.values[s]).collect())
    }
}

/// Errors from one-shot evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluateError {
    #[error(transparent)]
    Structure(#[from] StructuralViolation),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Compile and run a genome once.
pub fn evaluate(genome: &Genome, inputs: &[f32]) -> Result<Vec<f32>, EvaluateError> {
    Ok(Network::from_genome(genome)?.forward(inputs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::gene::{ConnectionGene, NodeGene};
    use crate::evolution::genome::interface_ids;
    use crate::evolution::innovation::InnovationRegistry;
    use crate::evolution::rng::GenomeRng;
    use crate::schema::GenomeConfig;
    use proptest::prelude::*;

    fn minimal(inputs: usize, outputs: usize, config: &GenomeConfig, seed: u64) -> Genome {
        let (input_ids, output_ids) = interface_ids(inputs, outputs);
        let registry = InnovationRegistry::new((inputs + outputs) as u64);
        Genome::create_minimal(
            0,
            &input_ids,
            &output_ids,
            config,
            &registry,
            &mut GenomeRng::new(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_weight_minimal_genome_outputs_zero() {
        let config = GenomeConfig {
            inputs: 3,
            outputs: 4,
            initial_weight_std: 0.0,
            ..Default::default()
        };
        let genome = minimal(3, 4, &config, 1);
        assert!(genome.connections().all(|c| c.weight == 0.0));
        let outputs = evaluate(&genome, &[1.0, -2.0, 0.5]).unwrap();
        assert_eq!(outputs, vec![0.0; 4]);
    }

    #[test]
    fn test_hidden_chain() {
        let nodes = vec![
            NodeGene::new(0, NodeRole::Input, Activation::Identity),
            NodeGene::new(1, NodeRole::Input, Activation::Identity),
            NodeGene::new(2, NodeRole::Output, Activation::Identity),
            NodeGene::new(3, NodeRole::Hidden, Activation::Relu),
        ];
        let conns = vec![
            ConnectionGene::new(0, 0, 3, 2.0),
            ConnectionGene::new(1, 1, 3, -1.0),
            ConnectionGene::new(2, 3, 2, 0.5),
            ConnectionGene::new(3, 1, 2, 1.0),
        ];
        let genome = Genome::from_parts(0, vec![0, 1], vec![2], nodes, conns).unwrap();
        let mut network = Network::from_genome(&genome).unwrap();

        // hidden = relu(2*1 - 1*3) = 0, out = 0*0.5 + 3
        assert_eq!(network.forward(&[1.0, 3.0]).unwrap(), vec![3.0]);
        // hidden = relu(2*3 - 1) = 5, out = 2.5 + 1
        assert_eq!(network.forward(&[3.0, 1.0]).unwrap(), vec![3.5]);
    }

    #[test]
    fn test_disabled_connections_ignored() {
        let nodes = vec![
            NodeGene::new(0, NodeRole::Input, Activation::Identity),
            NodeGene::new(1, NodeRole::Output, Activation::Identity),
        ];
        let mut conn = ConnectionGene::new(0, 0, 1, 4.0);
        conn.enabled = false;
        let genome = Genome::from_parts(0, vec![0], vec![1], nodes, vec![conn]).unwrap();
        assert_eq!(evaluate(&genome, &[2.0]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_wrong_input_length() {
        let genome = minimal(3, 2, &GenomeConfig::default(), 5);
        assert_eq!(
            evaluate(&genome, &[1.0]),
            Err(EvaluateError::Network(NetworkError::InputLength {
                expected: 3,
                actual: 1
            }))
        );
    }

    proptest! {
        #[test]
        fn prop_evaluate_is_deterministic(
            seed in any::<u64>(),
            inputs in prop::collection::vec(-10.0f32..10.0, 7),
        ) {
            let genome = minimal(7, 4, &GenomeConfig::default(), seed);
            let a = evaluate(&genome, &inputs).unwrap();
            let b = evaluate(&genome, &inputs).unwrap();
            let mut network = Network::from_genome(&genome).unwrap();
            let c = network.forward(&inputs).unwrap();
            let d = network.forward(&inputs).unwrap();
            prop_assert_eq!(a.len(), 4);
            for i in 0..4 {
                prop_assert_eq!(a[i].to_bits(), b[i].to_bits());
                prop_assert_eq!(a[i].to_bits(), c[i].to_bits());
                prop_assert_eq!(c[i].to_bits(), d[i].to_bits());
            }
        }
    }
}
