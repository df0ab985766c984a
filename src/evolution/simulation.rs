//! Boundary between the engine and the driving simulation.
//!
//! The engine never sees physics or track geometry. It starts an episode,
//! reads a fixed-length sensor vector, feeds it through the network and hands
//! the decoded controls back for one fixed timestep.

use serde::{Deserialize, Serialize};

/// Decoded driving commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Controls {
    pub accelerate: bool,
    pub brake: bool,
    /// -1 turns left, 1 turns right, 0 keeps straight.
    pub turn: i8,
}

impl Controls {
    /// Decode network outputs `(accelerate, brake, turn_left, turn_right)`.
    ///
    /// Exactly one of accelerate and brake is set, brake winning ties. Missing
    /// outputs read as 0.
    pub fn from_outputs(outputs: &[f32]) -> Self {
        let at = |i: usize| outputs.get(i).copied().unwrap_or(0.0);
        let (accel, brake, left, right) = (at(0), at(1), at(2), at(3));
        Self {
            accelerate: accel > brake,
            brake: brake >= accel,
            turn: i8::from(right > 0.5) - i8::from(left > 0.5),
        }
    }
}

/// Telemetry for one simulated step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StepReport {
    /// Distance moved along the track this step; negative when reversing.
    pub distance: f32,
    /// Current speed along the heading.
    pub velocity: f32,
    /// Index of a checkpoint crossed this step.
    pub checkpoint_hit: Option<u32>,
    /// The finish line was crossed this step.
    pub lap_completed: bool,
    /// Distance from the vehicle to the nearest wall.
    pub min_wall_distance: f32,
    /// The vehicle hit a wall and is out of the episode.
    pub crashed: bool,
}

/// One running episode for one vehicle.
pub trait Episode {
    /// Current sensor readings. Length must match the network's input count.
    fn sensors(&self) -> Vec<f32>;

    /// Advance the episode by `dt` seconds under `controls`.
    fn step(&mut self, controls: &Controls, dt: f32) -> StepReport;
}

/// A track on which episodes can be run. Shared by all evaluation workers.
pub trait Simulation: Sync {
    type Episode: Episode;

    /// Start a fresh episode at the starting grid.
    fn start(&self) -> Self::Episode;

    /// Number of checkpoints in one lap, the finish line included.
    fn checkpoints_per_lap(&self) -> u32;

    /// Length of the sensor vector.
    fn sensor_count(&self) -> usize;
}
