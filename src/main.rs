//! NEAT Racing CLI - Evolve driving controllers from JSON configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use neat_racing::{
    Circuit, EvolutionEngine,
    evolution::{Controls, evaluate, load_export},
    schema::{EvolutionConfig, EvolutionPhase},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None => {
            print_usage(&args[0]);
            process::exit(1);
        }
        Some("--example") => print_example_config(),
        Some("inspect") => {
            let Some(path) = args.get(2) else {
                print_usage(&args[0]);
                process::exit(1);
            };
            inspect(Path::new(path), &args[3..]);
        }
        Some(config_path) => run(PathBuf::from(config_path), args.get(2).map(PathBuf::from)),
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <config.json> [base_genome.json]", program);
    eprintln!("       {} inspect <genome.json> [inputs...]", program);
    eprintln!();
    eprintln!("Evolve racing controllers from JSON configuration.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json       Path to evolution configuration file");
    eprintln!("  base_genome.json  Seed the population from a saved genome");
    eprintln!();
    eprintln!("A circuit is read from <config>.circuit.json when present.");
    eprintln!("Example configuration is generated with --example flag.");
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> T {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {} file {}: {}", what, path.display(), e);
        process::exit(1);
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing {}: {}", what, e);
        process::exit(1);
    })
}

fn run(config_path: PathBuf, base_path: Option<PathBuf>) {
    let config: EvolutionConfig = read_json(&config_path, "config");

    let circuit_path = config_path.with_extension("circuit.json");
    let circuit: Circuit = if circuit_path.exists() {
        read_json(&circuit_path, "circuit")
    } else {
        Circuit::default()
    };

    println!("NEAT Racing");
    println!("===========");
    println!(
        "Population: {} for up to {} generations",
        config.population.size, config.population.max_generations
    );
    println!(
        "Network: {} inputs, {} outputs",
        config.genome.inputs, config.genome.outputs
    );
    println!(
        "Circuit: {:.0} long, {:.0} wide, {} checkpoints",
        circuit.length, circuit.width, circuit.checkpoints
    );
    println!(
        "Episode: {:.1}s at dt {:.4}",
        config.evaluation.max_generation_time, config.evaluation.fixed_dt
    );
    println!();

    let engine = EvolutionEngine::new(config, circuit).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        process::exit(1);
    });
    let mut engine = match base_path {
        Some(path) => {
            let (genome, metadata) = load_export(&path).unwrap_or_else(|e| {
                eprintln!("Error loading base genome {}: {}", path.display(), e);
                process::exit(1);
            });
            println!(
                "Seeding from {} (generation {}, fitness {:?})",
                path.display(),
                metadata.generation,
                metadata.fitness
            );
            engine.with_base_genome(genome).unwrap_or_else(|e| {
                eprintln!("{}", e);
                process::exit(1);
            })
        }
        None => engine,
    };

    let result = engine
        .run_with_callback(|progress| {
            // Reported once per generation, right after ranking.
            if progress.phase == EvolutionPhase::Selecting {
                println!(
                    "  Generation {}/{}: best={:.1}, avg={:.1}, stagnation={}",
                    progress.generation,
                    progress.total_generations,
                    progress.generation_best,
                    progress.avg_fitness,
                    progress.stagnation_count
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Evolution failed: {}", e);
            process::exit(1);
        });

    let stats = &result.stats;
    println!();
    println!("Stopped: {:?}", stats.stop_reason);
    println!("  Generations: {}", stats.generations);
    println!("  Evaluations: {}", stats.total_evaluations);
    println!("  Innovations: {}", stats.innovations);
    println!(
        "  Time: {:.2}s ({:.1} evals/s)",
        stats.elapsed_seconds, stats.evaluations_per_second
    );
    if let Some(best) = &result.best {
        println!(
            "  Best: #{} fitness={:.1}, laps={}, checkpoints={}, hidden={}, connections={}",
            best.id,
            best.fitness,
            best.laps_completed,
            best.checkpoints,
            best.hidden_nodes,
            best.enabled_connections
        );
    }
}

fn inspect(path: &Path, raw_inputs: &[String]) {
    let (genome, metadata) = load_export(path).unwrap_or_else(|e| {
        eprintln!("Error loading genome {}: {}", path.display(), e);
        process::exit(1);
    });

    println!("Genome #{}", genome.id());
    println!("  Generation: {}", metadata.generation);
    if let Some(fitness) = metadata.fitness {
        println!("  Fitness: {:.1}", fitness);
    }
    println!(
        "  Nodes: {} ({} hidden)",
        genome.node_count(),
        genome.hidden_count()
    );
    println!(
        "  Connections: {} ({} enabled)",
        genome.connection_count(),
        genome.enabled_connections().count()
    );

    let inputs: Vec<f32> = if raw_inputs.is_empty() {
        vec![0.0; genome.inputs().len()]
    } else {
        raw_inputs
            .iter()
            .map(|s| {
                s.parse().unwrap_or_else(|_| {
                    eprintln!("Invalid input value: {}", s);
                    process::exit(1);
                })
            })
            .collect()
    };

    match evaluate(&genome, &inputs) {
        Ok(outputs) => {
            println!("  Inputs: {:?}", inputs);
            println!("  Outputs: {:?}", outputs);
            println!("  Controls: {:?}", Controls::from_outputs(&outputs));
        }
        Err(e) => {
            eprintln!("Evaluation failed: {}", e);
            process::exit(1);
        }
    }
}

fn print_example_config() {
    let config = EvolutionConfig::default();
    let circuit = Circuit::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
    println!();
    println!("Example circuit (config.circuit.json):");
    match serde_json::to_string_pretty(&circuit) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing circuit: {}", e),
    }
}
