//! Configuration types for evolution runs.
//!
//! Every section has a `Default` and per-field serde defaults, so a JSON file
//! only needs to name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::evolution::Activation;

/// Top-level configuration for an evolution run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Network shape and initial genome construction.
    #[serde(default)]
    pub genome: GenomeConfig,
    /// Mutation and crossover probabilities.
    #[serde(default)]
    pub mutation: MutationConfig,
    /// Elitism and parent selection.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Episode settings (time budget, timestep).
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Fitness weights.
    #[serde(default)]
    pub fitness: FitnessConfig,
    /// Genome archive settings.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Network shape and initial genome construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeConfig {
    /// Number of sensor inputs.
    #[serde(default = "default_inputs")]
    pub inputs: usize,
    /// Number of control outputs (accelerate, brake, turn left, turn right).
    #[serde(default = "default_outputs")]
    pub outputs: usize,
    /// Fraction of input→output connections present in a minimal genome.
    #[serde(default = "default_connection_density")]
    pub initial_connection_density: f32,
    /// Standard deviation of initial and fresh connection weights.
    #[serde(default = "default_weight_std")]
    pub initial_weight_std: f32,
    /// Weights are kept within `[-weight_bound, weight_bound]`.
    #[serde(default = "default_weight_bound")]
    pub weight_bound: f32,
    /// Activation of output nodes in a minimal genome.
    #[serde(default = "default_output_activation")]
    pub output_activation: Activation,
    /// Activation of hidden nodes created by splitting a connection.
    #[serde(default = "default_split_activation")]
    pub split_activation: Activation,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            inputs: default_inputs(),
            outputs: default_outputs(),
            initial_connection_density: default_connection_density(),
            initial_weight_std: default_weight_std(),
            weight_bound: default_weight_bound(),
            output_activation: default_output_activation(),
            split_activation: default_split_activation(),
        }
    }
}

fn default_inputs() -> usize {
    7
}
fn default_outputs() -> usize {
    4
}
fn default_connection_density() -> f32 {
    1.0
}
fn default_weight_std() -> f32 {
    0.5
}
fn default_weight_bound() -> f32 {
    5.0
}
fn default_output_activation() -> Activation {
    Activation::Tanh
}
fn default_split_activation() -> Activation {
    Activation::Identity
}

/// Mutation and crossover probabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Per-connection probability of weight perturbation.
    #[serde(default = "default_weight_mutation_rate")]
    pub weight_mutation_rate: f32,
    /// Perturbations are uniform in `[-weight_noise, weight_noise]`.
    #[serde(default = "default_weight_noise")]
    pub weight_noise: f32,
    /// Per-genome probability of each structural mutation (add-connection, add-node).
    #[serde(default = "default_topology_rate")]
    pub topology_rate: f32,
    /// Per-genome probability of an activation change.
    #[serde(default = "default_activation_rate")]
    pub activation_rate: f32,
    /// Node pairs tried by add-connection before giving up.
    #[serde(default = "default_add_connection_attempts")]
    pub add_connection_attempts: usize,
    /// Chance to re-enable a matching gene disabled in the chosen parent.
    #[serde(default = "default_reenable_rate")]
    pub reenable_rate: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            weight_mutation_rate: default_weight_mutation_rate(),
            weight_noise: default_weight_noise(),
            topology_rate: default_topology_rate(),
            activation_rate: default_activation_rate(),
            add_connection_attempts: default_add_connection_attempts(),
            reenable_rate: default_reenable_rate(),
        }
    }
}

fn default_weight_mutation_rate() -> f32 {
    0.1
}
fn default_weight_noise() -> f32 {
    0.1
}
fn default_topology_rate() -> f32 {
    0.05
}
fn default_activation_rate() -> f32 {
    0.05
}
fn default_add_connection_attempts() -> usize {
    20
}
fn default_reenable_rate() -> f32 {
    0.25
}

/// Elitism and parent selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Parent selection method.
    #[serde(default)]
    pub method: SelectionMethod,
    /// Number of top genomes copied unchanged into the next generation.
    #[serde(default = "default_elite_count")]
    pub elite_count: usize,
    /// Fraction of the ranked population eligible as parents.
    #[serde(default = "default_parent_pool_fraction")]
    pub parent_pool_fraction: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            method: SelectionMethod::default(),
            elite_count: default_elite_count(),
            parent_pool_fraction: default_parent_pool_fraction(),
        }
    }
}

fn default_elite_count() -> usize {
    5
}
fn default_parent_pool_fraction() -> f32 {
    0.5
}

/// Selection method for the parent pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum SelectionMethod {
    /// Tournament selection with configurable size.
    Tournament {
        #[serde(default = "default_tournament_size")]
        size: usize,
    },
    /// Rank-based selection.
    RankBased,
    /// Roulette wheel (fitness-proportionate) selection.
    RouletteWheel,
}

impl Default for SelectionMethod {
    fn default() -> Self {
        Self::Tournament {
            size: default_tournament_size(),
        }
    }
}

fn default_tournament_size() -> usize {
    2
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of individuals in population.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Maximum number of generations.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    /// Target fitness to stop early.
    #[serde(default)]
    pub target_fitness: Option<f32>,
    /// Stagnation limit: stop if no improvement for N generations.
    #[serde(default)]
    pub stagnation_limit: Option<usize>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
            target_fitness: None,
            stagnation_limit: None,
        }
    }
}

fn default_population_size() -> usize {
    50
}
fn default_max_generations() -> usize {
    100
}

/// Episode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Simulated seconds an episode may run before it times out.
    #[serde(default = "default_max_generation_time")]
    pub max_generation_time: f32,
    /// Simulation timestep in seconds.
    #[serde(default = "default_fixed_dt")]
    pub fixed_dt: f32,
    /// Seconds without checkpoint progress before time counts as wasted.
    #[serde(default = "default_stall_grace")]
    pub stall_grace: f32,
    /// Re-run elites instead of reusing their previous record.
    #[serde(default)]
    pub reevaluate_elites: bool,
    /// Number of parallel evaluations (0 = auto-detect).
    #[serde(default)]
    pub parallel_workers: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_generation_time: default_max_generation_time(),
            fixed_dt: default_fixed_dt(),
            stall_grace: default_stall_grace(),
            reevaluate_elites: false,
            parallel_workers: 0,
        }
    }
}

fn default_max_generation_time() -> f32 {
    30.0
}
fn default_fixed_dt() -> f32 {
    1.0 / 60.0
}
fn default_stall_grace() -> f32 {
    3.0
}

/// Fitness weights.
///
/// Laps and checkpoints are flat rewards; the remaining terms are normalized to
/// `[0, 1)` with `x / (x + scale)` before weighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessConfig {
    #[serde(default = "default_lap_reward")]
    pub lap_reward: f32,
    #[serde(default = "default_checkpoint_reward")]
    pub checkpoint_reward: f32,
    #[serde(default = "default_distance_weight")]
    pub distance_weight: f32,
    #[serde(default = "default_distance_scale")]
    pub distance_scale: f32,
    #[serde(default = "default_velocity_weight")]
    pub velocity_weight: f32,
    #[serde(default = "default_velocity_scale")]
    pub velocity_scale: f32,
    #[serde(default = "default_safety_weight")]
    pub safety_weight: f32,
    #[serde(default = "default_safety_scale")]
    pub safety_scale: f32,
    #[serde(default = "default_time_wasted_weight")]
    pub time_wasted_weight: f32,
    #[serde(default = "default_time_wasted_scale")]
    pub time_wasted_scale: f32,
    /// Floor for the time denominator of average velocity.
    #[serde(default = "default_min_time_alive")]
    pub min_time_alive: f32,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            lap_reward: default_lap_reward(),
            checkpoint_reward: default_checkpoint_reward(),
            distance_weight: default_distance_weight(),
            distance_scale: default_distance_scale(),
            velocity_weight: default_velocity_weight(),
            velocity_scale: default_velocity_scale(),
            safety_weight: default_safety_weight(),
            safety_scale: default_safety_scale(),
            time_wasted_weight: default_time_wasted_weight(),
            time_wasted_scale: default_time_wasted_scale(),
            min_time_alive: default_min_time_alive(),
        }
    }
}

impl FitnessConfig {
    /// Largest possible spread of the normalized shaping terms.
    pub fn shaping_span(&self) -> f32 {
        self.distance_weight + self.velocity_weight + self.safety_weight + self.time_wasted_weight
    }
}

fn default_lap_reward() -> f32 {
    10000.0
}
fn default_checkpoint_reward() -> f32 {
    1000.0
}
fn default_distance_weight() -> f32 {
    400.0
}
fn default_distance_scale() -> f32 {
    1000.0
}
fn default_velocity_weight() -> f32 {
    50.0
}
fn default_velocity_scale() -> f32 {
    200.0
}
fn default_safety_weight() -> f32 {
    50.0
}
fn default_safety_scale() -> f32 {
    100.0
}
fn default_time_wasted_weight() -> f32 {
    200.0
}
fn default_time_wasted_scale() -> f32 {
    10.0
}
fn default_min_time_alive() -> f32 {
    0.1
}

/// Genome archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Output directory for saved genomes. Nothing is written when unset.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Number of top genomes written on each autosave.
    #[serde(default = "default_save_top")]
    pub save_top: usize,
    /// Autosave every N generations (0 disables autosave).
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval: usize,
    /// Write the best-of-run genome whenever it improves.
    #[serde(default = "default_save_best")]
    pub save_best: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            save_top: default_save_top(),
            autosave_interval: default_autosave_interval(),
            save_best: default_save_best(),
        }
    }
}

fn default_save_top() -> usize {
    10
}
fn default_autosave_interval() -> usize {
    25
}
fn default_save_best() -> bool {
    true
}

// ============================================================================
// Validation
// ============================================================================

/// Configuration validation errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Input and output counts must be non-zero (inputs: {inputs}, outputs: {outputs})")]
    InvalidNodeCounts { inputs: usize, outputs: usize },
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("At least one elite must be kept")]
    NoElites,
    #[error("Elite count {elite} must be smaller than the population size {size}")]
    TooManyElites { elite: usize, size: usize },
    #[error("Probability `{name}` must be within [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f32 },
    #[error("Parameter `{name}` must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },
    #[error("Tournament size must be at least 1")]
    InvalidTournamentSize,
    #[error(
        "Rewards must dominate shaping terms: lap {lap} > checkpoint {checkpoint} > shaping span {span}"
    )]
    RewardOrdering { lap: f32, checkpoint: f32, span: f32 },
    #[error("Base genome does not match the configured inputs/outputs: {0}")]
    IncompatibleBaseGenome(String),
    #[error("Simulation provides {sensors} sensors but genomes have {inputs} inputs")]
    SensorMismatch { sensors: usize, inputs: usize },
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let genome = &self.genome;
        if genome.inputs == 0 || genome.outputs == 0 {
            return Err(ConfigError::InvalidNodeCounts {
                inputs: genome.inputs,
                outputs: genome.outputs,
            });
        }

        if self.population.size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.selection.elite_count == 0 {
            return Err(ConfigError::NoElites);
        }
        if self.selection.elite_count >= self.population.size {
            return Err(ConfigError::TooManyElites {
                elite: self.selection.elite_count,
                size: self.population.size,
            });
        }

        let check_probability = |value: f32, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidProbability { name, value })
            }
        };
        check_probability(genome.initial_connection_density, "initial_connection_density")?;
        check_probability(self.mutation.weight_mutation_rate, "weight_mutation_rate")?;
        check_probability(self.mutation.topology_rate, "topology_rate")?;
        check_probability(self.mutation.activation_rate, "activation_rate")?;
        check_probability(self.mutation.reenable_rate, "reenable_rate")?;
        check_probability(self.selection.parent_pool_fraction, "parent_pool_fraction")?;

        let check_positive = |value: f32, name: &'static str| {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::NonPositive { name, value })
            }
        };
        check_positive(genome.weight_bound, "weight_bound")?;
        check_positive(self.evaluation.max_generation_time, "max_generation_time")?;
        check_positive(self.evaluation.fixed_dt, "fixed_dt")?;
        check_positive(self.fitness.distance_scale, "distance_scale")?;
        check_positive(self.fitness.velocity_scale, "velocity_scale")?;
        check_positive(self.fitness.safety_scale, "safety_scale")?;
        check_positive(self.fitness.time_wasted_scale, "time_wasted_scale")?;
        check_positive(self.fitness.min_time_alive, "min_time_alive")?;

        if let SelectionMethod::Tournament { size } = self.selection.method
            && size == 0
        {
            return Err(ConfigError::InvalidTournamentSize);
        }

        let fitness = &self.fitness;
        let span = fitness.shaping_span();
        let weights = [
            fitness.distance_weight,
            fitness.velocity_weight,
            fitness.safety_weight,
            fitness.time_wasted_weight,
        ];
        if weights.iter().any(|w| *w < 0.0)
            || fitness.checkpoint_reward <= span
            || fitness.lap_reward <= fitness.checkpoint_reward + span
        {
            return Err(ConfigError::RewardOrdering {
                lap: fitness.lap_reward,
                checkpoint: fitness.checkpoint_reward,
                span,
            });
        }

        Ok(())
    }
}
