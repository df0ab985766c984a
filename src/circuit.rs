//! A small kinematic test circuit.
//!
//! The track is a closed loop described only by its length, width and a
//! curvature profile, so it needs no geometry. A car keeps its arc position,
//! lateral offset, heading error and speed. Curvature pushes it outwards in
//! proportion to `v²`, and leaving the track width is a crash. Checkpoints sit at
//! even intervals with the last one on the finish line.

use serde::{Deserialize, Serialize};

use crate::evolution::{Controls, Episode, Simulation, StepReport};

/// Number of sensor readings a circuit episode produces.
pub const CIRCUIT_SENSORS: usize = 7;

/// Circuit layout and car handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    /// Centre-line length of one lap.
    #[serde(default = "default_length")]
    pub length: f32,
    /// Full track width.
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default = "default_checkpoints")]
    pub checkpoints: u32,
    /// Curvature by section; sections split the lap evenly.
    #[serde(default = "default_curvature")]
    pub curvature: Vec<f32>,
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    #[serde(default = "default_acceleration")]
    pub acceleration: f32,
    #[serde(default = "default_braking")]
    pub braking: f32,
    /// Heading change rate in radians per second while steering.
    #[serde(default = "default_steering")]
    pub steering: f32,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            length: default_length(),
            width: default_width(),
            checkpoints: default_checkpoints(),
            curvature: default_curvature(),
            max_speed: default_max_speed(),
            acceleration: default_acceleration(),
            braking: default_braking(),
            steering: default_steering(),
        }
    }
}

fn default_length() -> f32 {
    600.0
}
fn default_width() -> f32 {
    12.0
}
fn default_checkpoints() -> u32 {
    8
}
fn default_curvature() -> Vec<f32> {
    vec![0.0, 0.02, 0.0, -0.015, 0.0, 0.025, 0.0, 0.0]
}
fn default_max_speed() -> f32 {
    40.0
}
fn default_acceleration() -> f32 {
    12.0
}
fn default_braking() -> f32 {
    20.0
}
fn default_steering() -> f32 {
    1.5
}

impl Circuit {
    /// Curvature at arc position `s` (wrapped into the lap).
    pub fn curvature_at(&self, s: f32) -> f32 {
        if self.curvature.is_empty() || self.length <= 0.0 {
            return 0.0;
        }
        let s = s.rem_euclid(self.length);
        let section = ((s / self.length) * self.curvature.len() as f32) as usize;
        self.curvature[section.min(self.curvature.len() - 1)]
    }

    fn checkpoint_spacing(&self) -> f32 {
        self.length / self.checkpoints.max(1) as f32
    }
}

impl Simulation for Circuit {
    type Episode = CircuitEpisode;

    fn start(&self) -> CircuitEpisode {
        CircuitEpisode {
            circuit: self.clone(),
            position: 0.0,
            lateral: 0.0,
            heading: 0.0,
            speed: 0.0,
            next_checkpoint: 0,
        }
    }

    fn checkpoints_per_lap(&self) -> u32 {
        self.checkpoints
    }

    fn sensor_count(&self) -> usize {
        CIRCUIT_SENSORS
    }
}

/// A single car on a [`Circuit`].
#[derive(Debug, Clone)]
pub struct CircuitEpisode {
    circuit: Circuit,
    /// Arc position within the current lap.
    position: f32,
    /// Offset from the centre line, positive to the right.
    lateral: f32,
    /// Heading relative to the track direction.
    heading: f32,
    speed: f32,
    next_checkpoint: u32,
}

impl CircuitEpisode {
    fn wall_distances(&self) -> (f32, f32) {
        let half = self.circuit.width / 2.0;
        (half + self.lateral, half - self.lateral)
    }
}

impl Episode for CircuitEpisode {
    fn sensors(&self) -> Vec<f32> {
        let (left, right) = self.wall_distances();
        let half = self.circuit.width / 2.0;
        let lookahead = self.position + self.speed.max(5.0) * 1.5;
        vec![
            left / half,
            right / half,
            self.speed / self.circuit.max_speed,
            self.heading.sin(),
            self.heading.cos(),
            self.circuit.curvature_at(self.position) * 50.0,
            self.circuit.curvature_at(lookahead) * 50.0,
        ]
    }

    fn step(&mut self, controls: &Controls, dt: f32) -> StepReport {
        let c = &self.circuit;
        if controls.accelerate {
            self.speed += c.acceleration * dt;
        }
        if controls.brake {
            self.speed -= c.braking * dt;
        }
        self.speed = self.speed.clamp(0.0, c.max_speed);
        self.heading += f32::from(controls.turn) * c.steering * dt;

        let curvature = c.curvature_at(self.position);
        let forward = self.speed * self.heading.cos() * dt;
        self.lateral += self.speed * self.heading.sin() * dt;
        self.lateral += curvature * self.speed * self.speed * dt * dt;

        let before = self.position;
        self.position += forward;

        let mut checkpoint_hit = None;
        let mut lap_completed = false;
        let spacing = c.checkpoint_spacing();
        let next_mark = (self.next_checkpoint + 1) as f32 * spacing;
        if before < next_mark && self.position >= next_mark {
            checkpoint_hit = Some(self.next_checkpoint);
            self.next_checkpoint += 1;
            if self.next_checkpoint >= c.checkpoints {
                lap_completed = true;
                self.next_checkpoint = 0;
                self.position -= c.length;
            }
        }

        let (left, right) = self.wall_distances();
        StepReport {
            distance: forward,
            velocity: self.speed,
            checkpoint_hit,
            lap_completed,
            min_wall_distance: left.min(right).max(0.0),
            crashed: left < 0.0 || right < 0.0,
        }
    }
}
