//! Neuroevolution of racing car controllers.
//!
//! # Overview
//!
//! The evolution system consists of:
//!
//! - **Genomes** (`gene`, `genome`, `innovation`): node and connection genes,
//!   structural invariants and the run-wide innovation registry
//! - **Networks** (`network`, `activation`): compiling a genome into a
//!   feed-forward evaluator
//! - **Operators** (`mutation`, `crossover`, `rng`): variation driven by
//!   per-slot random streams
//! - **Fitness** (`simulation`, `fitness`): episodes against a [`Simulation`]
//!   and the scoring of their telemetry
//! - **Search** (`search`): the generation loop
//! - **Archive** (`archive`): saving and loading genomes
//!
//! # Example
//!
//! ```rust,no_run
//! use neat_racing::circuit::Circuit;
//! use neat_racing::evolution::EvolutionEngine;
//! use neat_racing::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig::default();
//! let mut engine = EvolutionEngine::new(config, Circuit::default()).unwrap();
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!(
//!             "Generation {}: best fitness = {:.1}",
//!             progress.generation, progress.best_fitness
//!         );
//!     })
//!     .unwrap();
//!
//! if let Some(best) = result.best {
//!     println!("Best: {:.1} ({} laps)", best.fitness, best.laps_completed);
//! }
//! ```

mod activation;
mod archive;
mod crossover;
mod fitness;
mod gene;
mod genome;
mod innovation;
mod mutation;
mod network;
mod rng;
mod search;
mod simulation;

pub use activation::Activation;
pub use archive::{
    ArchiveError, GenomeArchive, GenomeLoadError, load_export, load_genome, save_genome,
};
pub use crossover::crossover;
pub use fitness::{EvaluationStatus, FitnessEvaluator, FitnessRecord};
pub use gene::{ConnectionGene, InnovationId, NodeGene, NodeId, NodeRole};
pub use genome::{Genome, StructuralViolation, genome_distance, interface_ids};
pub use innovation::InnovationRegistry;
pub use mutation::{
    add_connection, add_node, mutate_activation, mutate_parameters, mutate_topology,
    mutate_weights,
};
pub use network::{EvaluateError, Network, NetworkError, evaluate};
pub use rng::{GenomeRng, StreamKind};
pub use search::{Candidate, EvolutionEngine};
pub use simulation::{Controls, Episode, Simulation, StepReport};
