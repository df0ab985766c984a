//! Mutation operators.
//!
//! Weight and activation mutation touch only the genome they are given.
//! Structural mutation allocates innovation and node ids from the shared
//! registry, so the engine applies it to one genome at a time in slot order.
//! Every operator leaves the genome valid; a mutation that cannot be applied
//! is a no-op.

use log::debug;

use crate::schema::{GenomeConfig, MutationConfig};

use super::gene::{ConnectionGene, NodeGene, NodeId, NodeRole};
use super::genome::Genome;
use super::innovation::InnovationRegistry;
use super::rng::GenomeRng;

/// Perturb each enabled weight with probability `weight_mutation_rate`.
///
/// Returns the number of weights changed.
pub fn mutate_weights(
    genome: &mut Genome,
    mutation: &MutationConfig,
    weight_bound: f32,
    rng: &mut GenomeRng,
) -> usize {
    let mut changed = 0;
    for conn in genome.connections_mut().filter(|c| c.enabled) {
        if rng.chance(mutation.weight_mutation_rate) {
            let noise = rng.symmetric(mutation.weight_noise);
            conn.weight = (conn.weight + noise).clamp(-weight_bound, weight_bound);
            changed += 1;
        }
    }
    changed
}

/// Give one random non-input node a different activation.
///
/// Returns the mutated node id.
pub fn mutate_activation(genome: &mut Genome, rng: &mut GenomeRng) -> Option<NodeId> {
    let candidates: Vec<NodeId> = genome
        .nodes()
        .filter(|n| !n.is_input())
        .map(|n| n.id)
        .collect();
    let id = *rng.pick(&candidates)?;
    let node = genome.node_mut(id)?;
    let alternatives: Vec<_> = node.activation.alternatives().collect();
    node.activation = *rng.pick(&alternatives)?;
    Some(id)
}

/// Add an enabled connection between two unconnected nodes.
///
/// Sources are never outputs and targets are never inputs. Pairs that already
/// have a gene (enabled or not) or that would close a cycle are rejected.
/// Gives up after `add_connection_attempts` rejected pairs.
pub fn add_connection(
    genome: &mut Genome,
    mutation: &MutationConfig,
    genome_config: &GenomeConfig,
    registry: &InnovationRegistry,
    rng: &mut GenomeRng,
) -> Option<ConnectionGene> {
    let sources: Vec<NodeId> = genome
        .nodes()
        .filter(|n| !n.is_output())
        .map(|n| n.id)
        .collect();
    let targets: Vec<NodeId> = genome
        .nodes()
        .filter(|n| !n.is_input())
        .map(|n| n.id)
        .collect();
    if sources.is_empty() || targets.is_empty() {
        return None;
    }

    for _ in 0..mutation.add_connection_attempts {
        let source = sources[rng.index(sources.len())];
        let target = targets[rng.index(targets.len())];
        if source == target
            || genome.has_edge(source, target)
            || genome.would_create_cycle(source, target)
        {
            continue;
        }

        let innovation = registry.get_or_create(source, target);
        let weight = rng.bounded_normal(
            genome_config.initial_weight_std,
            genome_config.weight_bound,
        );
        let conn = ConnectionGene::new(innovation, source, target, weight);
        genome.insert_connection(conn);
        return Some(conn);
    }

    debug!(
        "Genome {}: add-connection gave up after {} attempts",
        genome.id(),
        mutation.add_connection_attempts
    );
    None
}

/// Split a random enabled connection with a new hidden node.
///
/// The old connection is disabled; the incoming connection gets weight 1.0 and
/// the outgoing one the old weight. Returns the new node id.
pub fn add_node(
    genome: &mut Genome,
    genome_config: &GenomeConfig,
    registry: &InnovationRegistry,
    rng: &mut GenomeRng,
) -> Option<NodeId> {
    let enabled: Vec<ConnectionGene> = genome.enabled_connections().copied().collect();
    let split = *rng.pick(&enabled)?;

    let node = registry.new_node_id();
    let incoming = registry.get_or_create(split.source, node);
    let outgoing = registry.get_or_create(node, split.target);

    if let Some(old) = genome.connection_mut(split.innovation) {
        old.enabled = false;
    }
    genome.insert_node(NodeGene::new(
        node,
        NodeRole::Hidden,
        genome_config.split_activation,
    ));
    genome.insert_connection(ConnectionGene::new(incoming, split.source, node, 1.0));
    genome.insert_connection(ConnectionGene::new(
        outgoing,
        node,
        split.target,
        split.weight,
    ));
    Some(node)
}

/// Apply each structural mutation with probability `topology_rate`.
pub fn mutate_topology(
    genome: &mut Genome,
    mutation: &MutationConfig,
    genome_config: &GenomeConfig,
    registry: &InnovationRegistry,
    rng: &mut GenomeRng,
) {
    if rng.chance(mutation.topology_rate) {
        add_connection(genome, mutation, genome_config, registry, rng);
    }
    if rng.chance(mutation.topology_rate) {
        add_node(genome, genome_config, registry, rng);
    }
}

/// Apply the mutations that need no shared state.
pub fn mutate_parameters(
    genome: &mut Genome,
    mutation: &MutationConfig,
    genome_config: &GenomeConfig,
    rng: &mut GenomeRng,
) {
    mutate_weights(genome, mutation, genome_config.weight_bound, rng);
    if rng.chance(mutation.activation_rate) {
        mutate_activation(genome, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::activation::Activation;
    use crate::evolution::genome::interface_ids;
    use crate::evolution::network::evaluate;
    use proptest::prelude::*;

    fn setup(inputs: usize, outputs: usize, seed: u64) -> (Genome, InnovationRegistry, GenomeRng) {
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
        (genome, registry, rng)
    }

    #[test]
    fn test_weight_mutation_respects_bound() {
        let (mut genome, _, mut rng) = setup(3, 2, 1);
        let mutation = MutationConfig {
            weight_mutation_rate: 1.0,
            weight_noise: 100.0,
            ..Default::default()
        };
        let changed = mutate_weights(&mut genome, &mutation, 2.0, &mut rng);
        assert_eq!(changed, 6);
        assert!(genome.connections().all(|c| c.weight.abs() <= 2.0));
    }

    #[test]
    fn test_weight_mutation_rate_zero_is_noop() {
        let (mut genome, _, mut rng) = setup(3, 2, 1);
        let before = genome.clone();
        let mutation = MutationConfig {
            weight_mutation_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(mutate_weights(&mut genome, &mutation, 5.0, &mut rng), 0);
        assert_eq!(genome, before);
    }

    #[test]
    fn test_activation_mutation_changes_non_input() {
        let (mut genome, _, mut rng) = setup(3, 2, 4);
        let before = genome.clone();
        let id = mutate_activation(&mut genome, &mut rng).unwrap();
        let node = genome.node(id).unwrap();
        assert_ne!(node.role, NodeRole::Input);
        assert_ne!(node.activation, before.node(id).unwrap().activation);
    }

    #[test]
    fn test_add_connection_on_full_minimal_genome_gives_up() {
        // Every input→output pair exists and there are no hidden nodes, so
        // output→output is the only remaining choice, which is forbidden.
        let (mut genome, registry, mut rng) = setup(2, 2, 3);
        let before = genome.clone();
        let result = add_connection(
            &mut genome,
            &MutationConfig::default(),
            &GenomeConfig::default(),
            &registry,
            &mut rng,
        );
        assert!(result.is_none());
        assert_eq!(genome, before);
    }

    #[test]
    fn test_add_node_splits_connection() {
        let (mut genome, registry, mut rng) = setup(2, 1, 8);
        let before_connections = genome.connection_count();
        let node = add_node(&mut genome, &GenomeConfig::default(), &registry, &mut rng).unwrap();

        assert_eq!(node, 3);
        assert_eq!(genome.hidden_count(), 1);
        assert_eq!(genome.connection_count(), before_connections + 2);
        assert_eq!(genome.node(node).unwrap().activation, Activation::Identity);
        assert_eq!(genome.connections().filter(|c| !c.enabled).count(), 1);
        assert!(genome.validate().is_ok());
    }

    #[test]
    fn test_add_node_is_near_identity() {
        for seed in 0..20 {
            let (mut genome, registry, mut rng) = setup(4, 3, seed);
            let inputs = [0.3, -1.2, 2.0, 0.7];
            let before = evaluate(&genome, &inputs).unwrap();
            add_node(&mut genome, &GenomeConfig::default(), &registry, &mut rng).unwrap();
            let after = evaluate(&genome, &inputs).unwrap();
            for (b, a) in before.iter().zip(&after) {
                assert!((b - a).abs() < 1e-5, "seed {seed}: {b} vs {a}");
            }
        }
    }

    #[test]
    fn test_same_split_shares_innovations() {
        let (genome, registry, _) = setup(2, 1, 8);
        let mut a = genome.clone();
        let mut b = genome.with_id(1);
        add_node(
            &mut a,
            &GenomeConfig::default(),
            &registry,
            &mut GenomeRng::new(0),
        );
        add_node(
            &mut b,
            &GenomeConfig::default(),
            &registry,
            &mut GenomeRng::new(0),
        );
        // Hidden ids differ, edges are new, but the split connection is the same.
        let disabled_a: Vec<_> = a.connections().filter(|c| !c.enabled).map(|c| c.innovation).collect();
        let disabled_b: Vec<_> = b.connections().filter(|c| !c.enabled).map(|c| c.innovation).collect();
        assert_eq!(disabled_a, disabled_b);
    }

    proptest! {
        #[test]
        fn prop_mutations_keep_genome_acyclic(seed in any::<u64>(), rounds in 1usize..40) {
            let (mut genome, registry, mut rng) = setup(4, 3, seed);
            let mutation = MutationConfig {
                weight_mutation_rate: 0.5,
                topology_rate: 0.8,
                activation_rate: 0.3,
                ..Default::default()
            };
            let config = GenomeConfig::default();
            for _ in 0..rounds {
                mutate_parameters(&mut genome, &mutation, &config, &mut rng);
                mutate_topology(&mut genome, &mutation, &config, &registry, &mut rng);
                prop_assert!(genome.validate().is_ok());
            }
            let endpoints_ok = genome.enabled_connections().all(|c| {
                !genome.node(c.source).unwrap().is_output()
                    && !genome.node(c.target).unwrap().is_input()
            });
            prop_assert!(endpoints_ok);
        }
    }
}
