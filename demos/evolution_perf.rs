//! Quick evolution performance test

use neat_racing::{
    Circuit, EvolutionConfig, EvolutionEngine,
    schema::{EvaluationConfig, PopulationConfig, SelectionConfig, SelectionMethod},
};
use std::time::Instant;

fn main() {
    println!("=== Evolution Performance Test ===\n");

    // Test different episode lengths
    for seconds in [10.0, 30.0, 60.0] {
        println!("Episode budget: {:.0}s", seconds);

        let config = EvolutionConfig {
            population: PopulationConfig {
                size: 50,
                max_generations: 10,
                ..Default::default()
            },
            evaluation: EvaluationConfig {
                max_generation_time: seconds,
                ..Default::default()
            },
            selection: SelectionConfig {
                method: SelectionMethod::Tournament { size: 3 },
                elite_count: 2,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        };

        let start = Instant::now();
        let mut engine = match EvolutionEngine::new(config, Circuit::default()) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("Invalid configuration: {}", e);
                return;
            }
        };
        let result = match engine.run() {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Evolution failed: {}", e);
                return;
            }
        };
        let elapsed = start.elapsed();

        let total_evals = result.stats.total_evaluations;
        let evals_per_sec = total_evals as f64 / elapsed.as_secs_f64();

        println!("  Generations:    {}", result.stats.generations);
        println!("  Evaluations:    {}", total_evals);
        println!("  Elapsed:        {:.2}s", elapsed.as_secs_f64());
        println!("  Evals/sec:      {:.1}", evals_per_sec);
        println!("  Best fitness:   {:.1}", result.stats.best_fitness);
        println!("  Innovations:    {}", result.stats.innovations);
        println!();
    }

    println!("=== Scalability Test (fixed 30s episodes) ===\n");

    // Test different population sizes
    for pop_size in [25, 50, 100, 200] {
        let config = EvolutionConfig {
            population: PopulationConfig {
                size: pop_size,
                max_generations: 5,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        };

        let start = Instant::now();
        let result = EvolutionEngine::new(config, Circuit::default())
            .and_then(|mut engine| engine.run());
        let elapsed = start.elapsed();

        match result {
            Ok(result) => {
                let total_evals = result.stats.total_evaluations;
                let evals_per_sec = total_evals as f64 / elapsed.as_secs_f64();
                println!(
                    "Population {}: {} evals in {:.2}s ({:.1} evals/sec)",
                    pop_size,
                    total_evals,
                    elapsed.as_secs_f64(),
                    evals_per_sec
                );
            }
            Err(e) => eprintln!("Population {}: {}", pop_size, e),
        }
    }
}
