//! Episode telemetry and fitness scoring.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::schema::{EvaluationConfig, FitnessConfig};

use super::genome::Genome;
use super::network::Network;
use super::simulation::{Controls, Episode, Simulation, StepReport};

/// Outcome of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvaluationStatus {
    /// Still driving (or never started).
    #[default]
    Running,
    /// Hit a wall.
    Crashed,
    /// Used up the time budget.
    TimedOut,
}

/// Telemetry accumulated over one episode.
///
/// Updated after every simulation step, so a usable partial record exists at
/// any point of the episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitnessRecord {
    /// Forward distance travelled; reversing never counts.
    pub distance_travelled: f32,
    /// Checkpoint indices in the order they were hit, including out-of-order hits.
    pub checkpoints_reached: Vec<u32>,
    pub laps_completed: u32,
    pub time_alive: f32,
    /// Time spent beyond the stall grace period without checkpoint progress.
    pub time_wasted: f32,
    /// Nearest-wall distance after every step.
    pub min_wall_distance_samples: Vec<f32>,
    /// Integral of forward speed over time.
    pub velocity_sum: f32,
    pub steps: u32,
    pub final_velocity: f32,
    pub checkpoints_per_lap: u32,
    pub status: EvaluationStatus,
    #[serde(skip)]
    next_checkpoint: u32,
    #[serde(skip)]
    since_progress: f32,
}

fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

impl FitnessRecord {
    pub fn new(checkpoints_per_lap: u32) -> Self {
        Self {
            checkpoints_per_lap,
            ..Default::default()
        }
    }

    /// Fold one step of telemetry into the record.
    pub fn record_step(&mut self, report: &StepReport, dt: f32, stall_grace: f32) {
        let dt = finite_or_zero(dt).max(0.0);
        let velocity = finite_or_zero(report.velocity);

        self.steps += 1;
        self.time_alive += dt;
        self.distance_travelled += finite_or_zero(report.distance).max(0.0);
        self.velocity_sum += velocity.max(0.0) * dt;
        self.final_velocity = velocity;
        self.min_wall_distance_samples
            .push(finite_or_zero(report.min_wall_distance).max(0.0));

        self.since_progress += dt;
        if let Some(hit) = report.checkpoint_hit {
            self.checkpoints_reached.push(hit);
            if hit == self.next_checkpoint {
                self.next_checkpoint = (self.next_checkpoint + 1) % self.checkpoints_per_lap.max(1);
                self.since_progress = 0.0;
            }
        }
        if self.since_progress > stall_grace {
            self.time_wasted += dt;
        }

        // A lap only counts once every checkpoint of it was passed in order.
        if report.lap_completed {
            let needed = (self.laps_completed + 1) * self.checkpoints_per_lap;
            if self.ordered_checkpoints() >= needed {
                self.laps_completed += 1;
            }
        }

        if report.crashed {
            self.status = EvaluationStatus::Crashed;
        }
    }

    /// Number of checkpoint hits that followed the required order.
    ///
    /// A hit on checkpoint N counts only directly after N-1; the expected
    /// index wraps every `checkpoints_per_lap`.
    pub fn ordered_checkpoints(&self) -> u32 {
        let per_lap = self.checkpoints_per_lap.max(1);
        let mut expected = 0;
        let mut count = 0;
        for &hit in &self.checkpoints_reached {
            if hit == expected {
                count += 1;
                expected = (expected + 1) % per_lap;
            }
        }
        count
    }

    /// Mean nearest-wall distance, 0 without samples.
    pub fn mean_wall_distance(&self) -> f32 {
        if self.min_wall_distance_samples.is_empty() {
            return 0.0;
        }
        self.min_wall_distance_samples.iter().sum::<f32>()
            / self.min_wall_distance_samples.len() as f32
    }

    /// Average forward speed. `min_time_alive` floors the denominator so an
    /// instant crash stays finite.
    pub fn average_velocity(&self, min_time_alive: f32) -> f32 {
        self.velocity_sum / self.time_alive.max(min_time_alive)
    }

    pub fn is_finished(&self) -> bool {
        self.status != EvaluationStatus::Running
    }
}

/// Runs episodes and turns their telemetry into a score.
#[derive(Debug, Clone)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
    eval_config: EvaluationConfig,
}

impl FitnessEvaluator {
    /// Create a new fitness evaluator.
    pub fn new(config: FitnessConfig, eval_config: EvaluationConfig) -> Self {
        Self {
            config,
            eval_config,
        }
    }

    /// Drive one episode with `genome` and return its record.
    ///
    /// The episode ends on a crash or when the simulated time budget runs
    /// out, in which case the record is marked [`EvaluationStatus::TimedOut`].
    pub fn evaluate<S: Simulation>(&self, simulation: &S, genome: &Genome) -> FitnessRecord {
        let mut record = FitnessRecord::new(simulation.checkpoints_per_lap());

        let mut network = match Network::from_genome(genome) {
            Ok(network) => network,
            Err(e) => {
                debug!("Genome {} cannot be compiled: {}", genome.id(), e);
                record.status = EvaluationStatus::Crashed;
                return record;
            }
        };

        let dt = self.eval_config.fixed_dt;
        let max_steps = (self.eval_config.max_generation_time / dt).round() as usize;
        let mut episode = simulation.start();

        for _ in 0..max_steps {
            let outputs = match network.forward(&episode.sensors()) {
                Ok(outputs) => outputs,
                Err(e) => {
                    debug!("Genome {} rejected sensors: {}", genome.id(), e);
                    record.status = EvaluationStatus::Crashed;
                    return record;
                }
            };
            let controls = Controls::from_outputs(&outputs);
            let report = episode.step(&controls, dt);
            record.record_step(&report, dt, self.eval_config.stall_grace);
            if record.is_finished() {
                return record;
            }
        }

        debug!(
            "Genome {} timed out after {:.1}s",
            genome.id(),
            record.time_alive
        );
        record.status = EvaluationStatus::TimedOut;
        record
    }

    /// Reduce a record to one comparable, always finite score.
    pub fn score(&self, record: &FitnessRecord) -> f32 {
        let c = &self.config;
        let n = |x: f32, scale: f32| {
            let x = finite_or_zero(x).max(0.0);
            x / (x + scale)
        };

        let progress = record.laps_completed as f32 * c.lap_reward
            + record.ordered_checkpoints() as f32 * c.checkpoint_reward;
        let shaping = c.distance_weight * n(record.distance_travelled, c.distance_scale)
            + c.velocity_weight * n(record.average_velocity(c.min_time_alive), c.velocity_scale)
            + c.safety_weight * n(record.mean_wall_distance(), c.safety_scale)
            - c.time_wasted_weight * n(record.time_wasted, c.time_wasted_scale);

        finite_or_zero(progress + shaping)
    }
}
