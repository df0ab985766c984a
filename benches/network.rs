//! Benchmarks for network evaluation and episode scoring.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use neat_racing::{
    Circuit,
    circuit::CIRCUIT_SENSORS,
    evolution::{
        FitnessEvaluator, Genome, GenomeRng, InnovationRegistry, Network, add_connection,
        add_node, interface_ids,
    },
    schema::{EvaluationConfig, FitnessConfig, GenomeConfig, MutationConfig},
};

/// Grow a minimal genome by `hidden` add-node mutations plus extra connections.
fn grown_genome(hidden: usize) -> Genome {
    let config = GenomeConfig::default();
    let mutation = MutationConfig::default();
    let (input_ids, output_ids) = interface_ids(CIRCUIT_SENSORS, config.outputs);
    let registry = InnovationRegistry::new((CIRCUIT_SENSORS + config.outputs) as u64);
    let mut rng = GenomeRng::new(42);
    let mut genome =
        Genome::create_minimal(0, &input_ids, &output_ids, &config, &registry, &mut rng)
            .expect("valid interface");
    for _ in 0..hidden {
        add_node(&mut genome, &config, &registry, &mut rng);
        add_connection(&mut genome, &mutation, &config, &registry, &mut rng);
    }
    genome
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("network_forward");
    let inputs = vec![0.5; CIRCUIT_SENSORS];

    for hidden in [0, 8, 32, 128] {
        let genome = grown_genome(hidden);
        let mut network = Network::from_genome(&genome).expect("acyclic genome");

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_hidden", hidden)),
            &hidden,
            |b, _| {
                b.iter(|| network.forward(black_box(&inputs)));
            },
        );
    }

    group.finish();
}

fn bench_episode(c: &mut Criterion) {
    let mut group = c.benchmark_group("episode");
    let circuit = Circuit::default();
    let evaluator = FitnessEvaluator::new(FitnessConfig::default(), EvaluationConfig::default());

    for hidden in [0, 32] {
        let genome = grown_genome(hidden);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_hidden", hidden)),
            &hidden,
            |b, _| {
                b.iter(|| {
                    let record = evaluator.evaluate(&circuit, black_box(&genome));
                    evaluator.score(&record)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_forward, bench_episode);
criterion_main!(benches);
