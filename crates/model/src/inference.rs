// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`Inference`] trait implemented by decision artifacts.

use crate::{History, ThrottleDecision};
use std::num::NonZeroUsize;

/// A decision artifact mapping a feature history to a throttle level.
///
/// Implementations must be:
/// - **pure**: no I/O, no interior state carried between calls;
/// - **total**: a valid decision for any history of length `1..=lookback()`;
/// - **deterministic**: identical histories yield identical decisions;
/// - **cheap**: far below one sampling period, CPU only.
///
/// The history is iterated oldest to newest. Behaviour for an empty history
/// is unspecified; callers push at least one vector first.
pub trait Inference: Send + Sync {
    /// Human-readable name of this artifact.
    fn name(&self) -> &str;

    /// Number of feature vectors the artifact conditions on. The caller
    /// sizes its [`History`] to this.
    fn lookback(&self) -> NonZeroUsize;

    /// Produces the decision for the current history.
    fn run(&self, history: &History) -> ThrottleDecision;
}
