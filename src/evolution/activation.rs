//! Activation functions available to network nodes.

use serde::{Deserialize, Serialize};

/// Closed set of activation functions a node may use.
///
/// Unknown tags are rejected by serde when a genome is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// `1 / (1 + e^-x)`, range (0, 1).
    Sigmoid,
    /// `tanh(x)`, range (-1, 1).
    Tanh,
    /// `max(0, x)`.
    Relu,
    /// 1 for positive input, 0 otherwise.
    Step,
    /// Passes the weighted sum through unchanged.
    Identity,
}

impl Activation {
    /// Every member of the enum, in a fixed order.
    pub const ALL: [Activation; 5] = [
        Activation::Sigmoid,
        Activation::Tanh,
        Activation::Relu,
        Activation::Step,
        Activation::Identity,
    ];

    /// Apply the activation to a pre-activation value.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Step => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => x,
        }
    }

    /// All activations except `self`.
    pub fn alternatives(self) -> impl Iterator<Item = Activation> {
        Self::ALL.into_iter().filter(move |a| *a != self)
    }
}
