// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Random throttle exploration.
//!
//! With a configured probability, an iteration's decision is replaced by a
//! uniformly random [`ThrottleDecision`]. This produces off-policy samples
//! for training; the model itself stays deterministic.

use model::ThrottleDecision;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws exploration overrides.
#[derive(Debug, Clone)]
pub struct RandomThrottle {
    probability: f64,
    rng: StdRng,
}

impl RandomThrottle {
    /// Creates an explorer seeded from the OS entropy source.
    pub fn new(probability: f64) -> Self {
        Self::from_rng(probability, StdRng::from_entropy())
    }

    /// Creates an explorer with a fixed seed, for reproducible runs.
    pub fn with_seed(probability: f64, seed: u64) -> Self {
        Self::from_rng(probability, StdRng::seed_from_u64(seed))
    }

    fn from_rng(probability: f64, rng: StdRng) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability, rng }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Returns a random decision if this iteration explores, `None` otherwise.
    pub fn draw(&mut self) -> Option<ThrottleDecision> {
        if self.probability == 0.0 || !self.rng.gen_bool(self.probability) {
            return None;
        }
        let index = self.rng.gen_range(0..ThrottleDecision::ALL.len());
        Some(ThrottleDecision::ALL[index])
    }
}
