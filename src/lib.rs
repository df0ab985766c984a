//! NEAT Racing - neuroevolution of racing car controllers.
//!
//! This crate evolves feed-forward neural networks that drive a car around a
//! circuit. Genomes grow their topology through structural mutation, genes are
//! aligned across genomes by innovation number, and every candidate is scored
//! from the telemetry of one driving episode.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Configuration, genome file records and progress types
//! - `evolution`: Genomes, networks, operators, fitness and the generation loop
//! - `circuit`: A small kinematic circuit implementing [`evolution::Simulation`]
//!
//! # Example
//!
//! ```rust,no_run
//! use neat_racing::{Circuit, EvolutionConfig, EvolutionEngine};
//!
//! let config = EvolutionConfig {
//!     random_seed: Some(42),
//!     ..Default::default()
//! };
//! let mut engine = EvolutionEngine::new(config, Circuit::default()).unwrap();
//! let result = engine.run().unwrap();
//!
//! println!(
//!     "Best fitness after {} generations: {:.1}",
//!     result.stats.generations, result.stats.best_fitness
//! );
//! ```

pub mod circuit;
pub mod evolution;
pub mod schema;

// Re-export commonly used types
pub use circuit::Circuit;
pub use evolution::{EvolutionEngine, Genome, Network, Simulation};
pub use schema::{EvolutionConfig, EvolutionResult};
