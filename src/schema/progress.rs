//! Progress and result types reported by the evolution engine.

use serde::{Deserialize, Serialize};

use crate::evolution::EvaluationStatus;

use super::record::GenomeRecord;

/// Progress update sent to the callback after every evaluated generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Current generation number.
    pub generation: usize,
    /// Total generations planned.
    pub total_generations: usize,
    /// Number of evaluations completed this generation.
    pub evaluations_completed: usize,
    /// Total evaluations this generation.
    pub evaluations_total: usize,
    /// Best fitness seen so far.
    pub best_fitness: f32,
    /// Average fitness of current population.
    pub avg_fitness: f32,
    /// Best fitness this generation.
    pub generation_best: f32,
    /// Generations since last improvement.
    pub stagnation_count: usize,
    /// Best candidate of the run so far.
    pub best_candidate: Option<CandidateSnapshot>,
    /// Top N candidates of the current generation.
    pub top_candidates: Vec<CandidateSnapshot>,
    /// Statistics history for plotting.
    pub history: EvolutionHistory,
    /// Current phase of the algorithm.
    pub phase: EvolutionPhase,
}

/// Serializable view of a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub id: u64,
    pub fitness: f32,
    pub genome: GenomeRecord,
    /// Generation this candidate was created.
    pub generation: usize,
    /// Parent IDs (for genealogy).
    pub parents: Vec<u64>,
    pub status: EvaluationStatus,
    pub laps_completed: u32,
    /// Checkpoints hit in the required order.
    pub checkpoints: u32,
    pub distance_travelled: f32,
    pub time_alive: f32,
    /// Hidden nodes in the genome.
    pub hidden_nodes: usize,
    /// Enabled connections in the genome.
    pub enabled_connections: usize,
}

/// Evolution history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EvolutionHistory {
    /// Best fitness per generation.
    pub best_fitness: Vec<f32>,
    /// Average fitness per generation.
    pub avg_fitness: Vec<f32>,
    /// Standard deviation per generation.
    pub fitness_std: Vec<f32>,
    /// Mean pairwise genome distance per generation.
    pub diversity: Vec<f32>,
}

/// Current phase of evolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Building the initial population.
    #[default]
    Initializing,
    /// Running episodes.
    Evaluating,
    /// Ranking and choosing elites and parents.
    Selecting,
    /// Creating offspring.
    Reproducing,
    /// Run finished.
    Terminated,
}

/// Final result of evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate of the whole run.
    pub best: Option<CandidateSnapshot>,
    /// Final population, best first.
    pub final_population: Vec<CandidateSnapshot>,
    /// Statistics from the run.
    pub stats: EvolutionStats,
    /// Full history for analysis.
    pub history: EvolutionHistory,
}

/// Statistics from evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Total generations run.
    pub generations: usize,
    /// Total episodes run.
    pub total_evaluations: u64,
    /// Best fitness achieved.
    pub best_fitness: f32,
    /// Average fitness of final population.
    pub final_avg_fitness: f32,
    /// Distinct structural innovations created.
    pub innovations: usize,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Reached target fitness.
    TargetReached,
    /// Stagnation limit hit.
    Stagnation,
    /// Stop requested through the cancel handle.
    Cancelled,
}
