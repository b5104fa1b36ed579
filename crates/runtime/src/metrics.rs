// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Iteration profiling metrics.
//!
//! [`IterationMetrics`] describes one pass of the pipeline; [`RunMetrics`]
//! aggregates a sequence of them for the CLI driver.

use model::ThrottleDecision;
use std::time::Duration;

/// Metrics for a single pipeline iteration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IterationMetrics {
    /// 1-based index of this iteration since `init`.
    pub iteration: u64,
    /// Time spent reading frequency and load counters.
    pub sample_duration: Duration,
    /// Time spent inside [`Inference::run`](model::Inference::run).
    pub inference_duration: Duration,
    /// Wall-clock time for the whole iteration.
    pub total_duration: Duration,
    /// Frames reported since the previous iteration.
    pub num_rendered_frames: u16,
    /// Frames that missed their own target.
    pub num_missed_deadlines: u32,
    /// Mean idle fraction over all cores.
    pub mean_idle_fraction: f64,
    /// What the model decided.
    pub model_decision: ThrottleDecision,
    /// Whether exploration replaced the model's decision.
    pub explored: bool,
}

impl IterationMetrics {
    /// Returns a one-line summary suitable for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Iteration {}: {:.3}ms total ({:.3}ms sampling, {:.3}ms inference), \
             {:.0}% idle, {} frames ({} missed), model {}{}",
            self.iteration,
            self.total_duration.as_secs_f64() * 1000.0,
            self.sample_duration.as_secs_f64() * 1000.0,
            self.inference_duration.as_secs_f64() * 1000.0,
            self.mean_idle_fraction * 100.0,
            self.num_rendered_frames,
            self.num_missed_deadlines,
            self.model_decision,
            if self.explored { " (explored)" } else { "" },
        )
    }
}

/// Aggregate metrics over a run of iterations.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunMetrics {
    pub iterations: u64,
    pub failures: u64,
    pub explored: u64,
    pub total_inference_duration: Duration,
    pub max_iteration_duration: Duration,
    /// Count of final decisions, indexed by [`ThrottleDecision::ordinal`].
    pub decisions: [u64; 6],
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful iteration and the decision it produced.
    pub fn record(&mut self, metrics: &IterationMetrics, decision: ThrottleDecision) {
        self.iterations += 1;
        if metrics.explored {
            self.explored += 1;
        }
        self.total_inference_duration += metrics.inference_duration;
        self.max_iteration_duration = self.max_iteration_duration.max(metrics.total_duration);
        self.decisions[decision.ordinal() as usize] += 1;
    }

    /// Records a failed iteration.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Mean inference time per successful iteration.
    pub fn mean_inference_duration(&self) -> Duration {
        match u32::try_from(self.iterations) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_inference_duration / n,
            Err(_) => Duration::ZERO,
        }
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let histogram: Vec<String> = ThrottleDecision::ALL
            .iter()
            .zip(self.decisions.iter())
            .filter(|(_, &count)| count > 0)
            .map(|(d, count)| format!("{d}={count}"))
            .collect();
        format!(
            "Run: {} iterations, {} failed, {} explored, {:.3}ms mean inference, \
             {:.3}ms slowest iteration, decisions [{}]",
            self.iterations,
            self.failures,
            self.explored,
            self.mean_inference_duration().as_secs_f64() * 1000.0,
            self.max_iteration_duration.as_secs_f64() * 1000.0,
            histogram.join(", "),
        )
    }
}
