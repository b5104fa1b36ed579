// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Constant-output artifact.

use crate::{History, Inference, ThrottleDecision};
use std::num::NonZeroUsize;

/// Always returns the same decision. Useful as a stub and as a safe
/// fallback when no trained artifact is available.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision {
    decision: ThrottleDecision,
    lookback: NonZeroUsize,
}

impl FixedDecision {
    pub fn new(decision: ThrottleDecision) -> Self {
        Self {
            decision,
            lookback: NonZeroUsize::MIN,
        }
    }

    /// Requests a longer history without using it.
    pub fn with_lookback(mut self, lookback: NonZeroUsize) -> Self {
        self.lookback = lookback;
        self
    }
}

impl Inference for FixedDecision {
    fn name(&self) -> &str {
        "fixed"
    }

    fn lookback(&self) -> NonZeroUsize {
        self.lookback
    }

    fn run(&self, _history: &History) -> ThrottleDecision {
        self.decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed() {
        let f = FixedDecision::new(ThrottleDecision::Throttle60)
            .with_lookback(NonZeroUsize::new(3).unwrap());
        assert_eq!(f.name(), "fixed");
        assert_eq!(f.lookback().get(), 3);
        let h = History::new(f.lookback());
        assert_eq!(f.run(&h), ThrottleDecision::Throttle60);
    }
}
