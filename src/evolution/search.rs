//! Generation controller: evaluation, selection and reproduction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::schema::{
    CandidateSnapshot, ConfigError, EvolutionConfig, EvolutionHistory, EvolutionPhase,
    EvolutionProgress, EvolutionResult, EvolutionStats, GenomeMetadata, SelectionMethod,
    StopReason,
};

use super::archive::GenomeArchive;
use super::crossover::crossover;
use super::fitness::{FitnessEvaluator, FitnessRecord};
use super::gene::NodeId;
use super::genome::{Genome, genome_distance, interface_ids};
use super::innovation::InnovationRegistry;
use super::mutation::{mutate_parameters, mutate_topology};
use super::rng::{GenomeRng, StreamKind};
use super::simulation::Simulation;

/// A candidate individual in the population.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Unique identifier, equal to the genome id.
    pub id: u64,
    pub genome: Genome,
    /// Score of `record`.
    pub fitness: f32,
    /// Telemetry of the last episode.
    pub record: FitnessRecord,
    /// Generation created.
    pub generation: usize,
    /// Parent IDs.
    pub parents: Vec<u64>,
    /// Whether `record` is up to date for this genome.
    pub evaluated: bool,
}

impl Candidate {
    fn new(genome: Genome, generation: usize, parents: Vec<u64>) -> Self {
        Self {
            id: genome.id(),
            genome,
            fitness: 0.0,
            record: FitnessRecord::default(),
            generation,
            parents,
            evaluated: false,
        }
    }

    /// Convert to snapshot for serialization.
    pub fn to_snapshot(&self) -> CandidateSnapshot {
        CandidateSnapshot {
            id: self.id,
            fitness: self.fitness,
            genome: self.genome.to_record(),
            generation: self.generation,
            parents: self.parents.clone(),
            status: self.record.status,
            laps_completed: self.record.laps_completed,
            checkpoints: self.record.ordered_checkpoints(),
            distance_travelled: self.record.distance_travelled,
            time_alive: self.record.time_alive,
            hidden_nodes: self.genome.hidden_count(),
            enabled_connections: self.genome.enabled_connections().count(),
        }
    }

    fn metadata(&self, generation: usize) -> GenomeMetadata {
        GenomeMetadata {
            fitness: Some(self.fitness),
            generation,
            rank: None,
            laps_completed: self.record.laps_completed,
            checkpoints: self.record.ordered_checkpoints(),
        }
    }
}

/// Evolution engine that runs the search against a simulation.
pub struct EvolutionEngine<S: Simulation> {
    config: EvolutionConfig,
    simulation: S,
    run_seed: u64,
    evaluator: FitnessEvaluator,
    registry: Arc<InnovationRegistry>,
    input_ids: Vec<NodeId>,
    output_ids: Vec<NodeId>,
    base_genome: Option<Genome>,
    population: Vec<Candidate>,
    best: Option<Candidate>,
    archive: Option<GenomeArchive>,
    history: EvolutionHistory,
    generation: usize,
    best_fitness: f32,
    stagnation_count: usize,
    total_evaluations: u64,
    next_id: u64,
    phase: EvolutionPhase,
    cancelled: Arc<AtomicBool>,
    pool: Option<rayon::ThreadPool>,
}

impl<S: Simulation> EvolutionEngine<S> {
    /// Create a new evolution engine. The configuration is validated and the
    /// simulation's sensor count must match the configured inputs.
    pub fn new(config: EvolutionConfig, simulation: S) -> Result<Self, ConfigError> {
        config.validate()?;
        if simulation.sensor_count() != config.genome.inputs {
            return Err(ConfigError::SensorMismatch {
                sensors: simulation.sensor_count(),
                inputs: config.genome.inputs,
            });
        }

        let run_seed = config.random_seed.unwrap_or_else(rand::random);
        let (input_ids, output_ids) = interface_ids(config.genome.inputs, config.genome.outputs);
        let registry = Arc::new(InnovationRegistry::new(
            (input_ids.len() + output_ids.len()) as NodeId,
        ));
        let evaluator = FitnessEvaluator::new(config.fitness.clone(), config.evaluation.clone());
        let archive = GenomeArchive::from_config(&config.archive);

        let pool = match config.evaluation.parallel_workers {
            0 => None,
            workers => match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!("Falling back to the global thread pool: {}", e);
                    None
                }
            },
        };

        Ok(Self {
            config,
            simulation,
            run_seed,
            evaluator,
            registry,
            input_ids,
            output_ids,
            base_genome: None,
            population: Vec::new(),
            best: None,
            archive,
            history: EvolutionHistory::default(),
            generation: 0,
            best_fitness: f32::NEG_INFINITY,
            stagnation_count: 0,
            total_evaluations: 0,
            next_id: 0,
            phase: EvolutionPhase::Initializing,
            cancelled: Arc::new(AtomicBool::new(false)),
            pool,
        })
    }

    /// Seed the population from a saved genome instead of minimal genomes.
    pub fn with_base_genome(mut self, genome: Genome) -> Result<Self, ConfigError> {
        if genome.inputs() != self.input_ids.as_slice()
            || genome.outputs() != self.output_ids.as_slice()
        {
            return Err(ConfigError::IncompatibleBaseGenome(format!(
                "expected {} inputs and {} outputs, genome has {} and {}",
                self.input_ids.len(),
                self.output_ids.len(),
                genome.inputs().len(),
                genome.outputs().len()
            )));
        }
        self.registry.observe(&genome);
        self.base_genome = Some(genome);
        Ok(self)
    }

    /// Write best-of-run and autosaved genomes into `archive`.
    pub fn with_archive(mut self, archive: GenomeArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn registry(&self) -> Arc<InnovationRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    pub fn population(&self) -> &[Candidate] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    /// Best candidate of the run so far.
    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Initialize the population.
    pub fn initialize(&mut self) -> Result<(), ConfigError> {
        self.phase = EvolutionPhase::Initializing;
        self.population.clear();
        self.best = None;
        self.history = EvolutionHistory::default();
        self.generation = 0;
        self.best_fitness = f32::NEG_INFINITY;
        self.stagnation_count = 0;
        self.total_evaluations = 0;

        for slot in 0..self.config.population.size {
            let mut rng = GenomeRng::stream(self.run_seed, 0, slot, StreamKind::Initialize);
            let id = self.allocate_id();
            let genome = match &self.base_genome {
                Some(base) if slot == 0 => base.with_id(id),
                Some(base) => {
                    let mut genome = base.with_id(id);
                    mutate_parameters(
                        &mut genome,
                        &self.config.mutation,
                        &self.config.genome,
                        &mut rng,
                    );
                    mutate_topology(
                        &mut genome,
                        &self.config.mutation,
                        &self.config.genome,
                        &self.registry,
                        &mut rng,
                    );
                    genome
                }
                None => Genome::create_minimal(
                    id,
                    &self.input_ids,
                    &self.output_ids,
                    &self.config.genome,
                    &self.registry,
                    &mut rng,
                )?,
            };
            self.population.push(Candidate::new(genome, 0, Vec::new()));
        }
        Ok(())
    }

    /// Run an episode for every candidate that needs one, then rank the
    /// population and record the generation's statistics.
    pub fn evaluate_population(&mut self) {
        self.phase = EvolutionPhase::Evaluating;
        let reevaluate = self.config.evaluation.reevaluate_elites;
        let pending = self
            .population
            .iter()
            .filter(|c| reevaluate || !c.evaluated)
            .count();

        let evaluator = &self.evaluator;
        let simulation = &self.simulation;
        let population = &mut self.population;
        install(&self.pool, || {
            population
                .par_iter_mut()
                .filter(|c| reevaluate || !c.evaluated)
                .for_each(|candidate| {
                    let record = evaluator.evaluate(simulation, &candidate.genome);
                    candidate.fitness = evaluator.score(&record);
                    candidate.record = record;
                    candidate.evaluated = true;
                });
        });
        self.total_evaluations += pending as u64;

        self.rank_and_record();
    }

    /// Sort best first and update history, best-of-run and the archive.
    fn rank_and_record(&mut self) {
        self.phase = EvolutionPhase::Selecting;
        self.population
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness).then(a.id.cmp(&b.id)));

        let Some(leader) = self.population.first() else {
            return;
        };
        let gen_best = leader.fitness;
        let count = self.population.len() as f32;
        let avg_fitness = self.population.iter().map(|c| c.fitness).sum::<f32>() / count;
        let variance = self
            .population
            .iter()
            .map(|c| (c.fitness - avg_fitness).powi(2))
            .sum::<f32>()
            / count;
        let diversity = self.compute_diversity();

        self.history.best_fitness.push(gen_best);
        self.history.avg_fitness.push(avg_fitness);
        self.history.fitness_std.push(variance.sqrt());
        self.history.diversity.push(diversity);

        if gen_best > self.best_fitness {
            self.best_fitness = gen_best;
            self.stagnation_count = 0;
            self.best = Some(leader.clone());
            if let Some(archive) = self.archive.as_mut()
                && let Err(e) = archive.save_best(&leader.genome, leader.metadata(self.generation))
            {
                warn!("Failed to save best genome: {}", e);
            }
        } else {
            self.stagnation_count += 1;
        }

        if let Some(archive) = self.archive.as_mut()
            && archive.autosave_due(self.generation)
        {
            let generation = self.generation;
            let ranked = self
                .population
                .iter()
                .map(|c| (&c.genome, c.metadata(generation)));
            if let Err(e) = archive.autosave(generation, ranked) {
                warn!("Autosave failed: {}", e);
            }
        }

        info!(
            "Generation {}: best {:.1} (laps {}, checkpoints {}), avg {:.1}, std {:.1}, diversity {:.3}, innovations {}",
            self.generation,
            gen_best,
            leader.record.laps_completed,
            leader.record.ordered_checkpoints(),
            avg_fitness,
            variance.sqrt(),
            diversity,
            self.registry.innovation_count()
        );
    }

    /// Produce the next generation from the ranked population.
    ///
    /// Elites are copied unchanged. The other slots are filled in two phases:
    /// selection, crossover and parameter mutation run in parallel, then
    /// structural mutation runs slot by slot so that innovation numbering does
    /// not depend on thread scheduling.
    pub fn step_generation(&mut self) {
        self.phase = EvolutionPhase::Reproducing;
        let size = self.config.population.size;
        let len = self.population.len();
        if len == 0 {
            return;
        }
        let elite_count = self.config.selection.elite_count.min(len).min(size);
        let pool_size = ((len as f32 * self.config.selection.parent_pool_fraction).ceil() as usize)
            .max(elite_count + 1)
            .min(len);
        let next_generation = self.generation + 1;
        let reevaluate = self.config.evaluation.reevaluate_elites;

        let mut next: Vec<Candidate> = self.population[..elite_count]
            .iter()
            .map(|elite| {
                let mut elite = elite.clone();
                if reevaluate {
                    elite.evaluated = false;
                }
                elite
            })
            .collect();

        let offspring_count = size - elite_count;
        let first_id = self.next_id;
        self.next_id += offspring_count as u64;

        let run_seed = self.run_seed;
        let generation = self.generation;
        let config = &self.config;
        let parents = &self.population[..pool_size];
        let mut children: Vec<Candidate> = install(&self.pool, || {
            (0..offspring_count)
                .into_par_iter()
                .map(|i| {
                    let slot = elite_count + i;
                    let child_id = first_id + i as u64;

                    let mut rng = GenomeRng::stream(run_seed, generation, slot, StreamKind::Selection);
                    let a = &parents[select_parent(parents, &config.selection.method, &mut rng)];
                    let b = &parents[select_parent(parents, &config.selection.method, &mut rng)];

                    let mut rng = GenomeRng::stream(run_seed, generation, slot, StreamKind::Crossover);
                    let mut genome = match crossover(
                        child_id,
                        &a.genome,
                        a.fitness,
                        &b.genome,
                        b.fitness,
                        config.mutation.reenable_rate,
                        &mut rng,
                    ) {
                        Ok(genome) => genome,
                        Err(e) => {
                            debug!(
                                "Crossover of {} and {} rejected ({}), cloning fitter parent",
                                a.id, b.id, e
                            );
                            let fitter = if a.fitness >= b.fitness { a } else { b };
                            fitter.genome.with_id(child_id)
                        }
                    };

                    let mut rng = GenomeRng::stream(run_seed, generation, slot, StreamKind::Mutation);
                    mutate_parameters(&mut genome, &config.mutation, &config.genome, &mut rng);

                    Candidate::new(genome, next_generation, vec![a.id, b.id])
                })
                .collect()
        });

        for (i, child) in children.iter_mut().enumerate() {
            let slot = elite_count + i;
            let mut rng = GenomeRng::stream(run_seed, generation, slot, StreamKind::Topology);
            mutate_topology(
                &mut child.genome,
                &self.config.mutation,
                &self.config.genome,
                &self.registry,
                &mut rng,
            );
        }

        next.extend(children);
        self.population = next;
        self.generation = next_generation;
    }

    /// Compute population diversity as the mean pairwise genome distance.
    fn compute_diversity(&self) -> f32 {
        if self.population.len() < 2 {
            return 0.0;
        }

        let mut total_distance = 0.0f32;
        let mut count = 0;

        for i in 0..self.population.len() {
            for j in (i + 1)..self.population.len() {
                total_distance +=
                    genome_distance(&self.population[i].genome, &self.population[j].genome);
                count += 1;
            }
        }

        total_distance / count as f32
    }

    /// Get current progress.
    pub fn progress(&self) -> EvolutionProgress {
        let avg_fitness: f32 = if self.population.is_empty() {
            0.0
        } else {
            self.population.iter().map(|c| c.fitness).sum::<f32>() / self.population.len() as f32
        };

        let gen_best = self
            .population
            .iter()
            .map(|c| c.fitness)
            .fold(f32::NEG_INFINITY, f32::max);

        let top_candidates: Vec<CandidateSnapshot> = {
            let mut sorted: Vec<_> = self.population.iter().filter(|c| c.evaluated).collect();
            sorted.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
            sorted.into_iter().take(5).map(Candidate::to_snapshot).collect()
        };

        EvolutionProgress {
            generation: self.generation,
            total_generations: self.config.population.max_generations,
            evaluations_completed: self.population.iter().filter(|c| c.evaluated).count(),
            evaluations_total: self.population.len(),
            best_fitness: self.best_fitness,
            avg_fitness,
            generation_best: gen_best,
            stagnation_count: self.stagnation_count,
            best_candidate: self.best.as_ref().map(Candidate::to_snapshot),
            top_candidates,
            history: self.history.clone(),
            phase: self.phase,
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&self) -> Option<StopReason> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Some(StopReason::Cancelled);
        }

        if self.generation >= self.config.population.max_generations {
            return Some(StopReason::MaxGenerations);
        }

        if let Some(target) = self.config.population.target_fitness
            && self.best_fitness >= target
        {
            return Some(StopReason::TargetReached);
        }

        if let Some(limit) = self.config.population.stagnation_limit
            && self.stagnation_count >= limit
        {
            return Some(StopReason::Stagnation);
        }

        None
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EvolutionResult, ConfigError>
    where
        F: FnMut(&EvolutionProgress),
    {
        let start_time = Instant::now();
        info!(
            "Starting evolution: population {}, up to {} generations, seed {}",
            self.config.population.size, self.config.population.max_generations, self.run_seed
        );

        self.initialize()?;
        callback(&self.progress());

        self.evaluate_population();
        callback(&self.progress());

        let stop_reason = loop {
            if let Some(reason) = self.should_stop() {
                break reason;
            }

            self.step_generation();
            self.evaluate_population();
            callback(&self.progress());
        };

        self.phase = EvolutionPhase::Terminated;
        callback(&self.progress());
        info!(
            "Evolution stopped after {} generations ({:?}), best fitness {:.1}",
            self.generation, stop_reason, self.best_fitness
        );

        let elapsed = start_time.elapsed().as_secs_f64();
        let final_avg_fitness = self.progress().avg_fitness;

        Ok(EvolutionResult {
            best: self.best.as_ref().map(Candidate::to_snapshot),
            final_population: self.population.iter().map(Candidate::to_snapshot).collect(),
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.total_evaluations,
                best_fitness: self.best_fitness,
                final_avg_fitness,
                innovations: self.registry.innovation_count(),
                elapsed_seconds: elapsed,
                evaluations_per_second: if elapsed > 0.0 {
                    self.total_evaluations as f64 / elapsed
                } else {
                    0.0
                },
                stop_reason,
            },
            history: self.history.clone(),
        })
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, ConfigError> {
        self.run_with_callback(|_| {})
    }
}

/// Run `op` inside the dedicated pool when one is configured.
fn install<R, OP>(pool: &Option<rayon::ThreadPool>, op: OP) -> R
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

/// Select a parent index from a pool ranked best first.
fn select_parent(pool: &[Candidate], method: &SelectionMethod, rng: &mut GenomeRng) -> usize {
    let len = pool.len();
    if len <= 1 {
        return 0;
    }
    match method {
        SelectionMethod::Tournament { size } => {
            // Lower index means fitter, so the tournament winner is the smallest draw.
            (0..(*size).max(1)).map(|_| rng.index(len)).min().unwrap_or(0)
        }
        SelectionMethod::RankBased => {
            let total_rank = len * (len + 1) / 2;
            let mut target = rng.index(total_rank);
            for i in 0..len {
                let rank = len - i;
                if target < rank {
                    return i;
                }
                target -= rank;
            }
            0
        }
        SelectionMethod::RouletteWheel => {
            // Shift so the weakest member has weight zero; scores may be negative.
            let floor = pool[len - 1].fitness;
            let total: f32 = pool.iter().map(|c| c.fitness - floor).sum();
            if !total.is_finite() || total <= 0.0 {
                return rng.index(len);
            }
            let target = rng.unit() * total;
            let mut cumulative = 0.0;
            for (i, candidate) in pool.iter().enumerate() {
                cumulative += candidate.fitness - floor;
                if cumulative > target {
                    return i;
                }
            }
            0
        }
    }
}
