// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Orchestrates one adaptive CPU iteration on top of `telemetry` and `model`.
//!
//! The runtime provides:
//! - [`AdaptiveCpuConfig`], loaded from any [`PropertySource`].
//! - The [`Pipeline`] that samples counters, builds the feature vector,
//!   runs inference and applies random exploration.
//! - Per-iteration and per-run metrics.
//! - A plain-text diagnostics dump of the reader baselines.
//!
//! # Type-State Pipeline
//! ```text
//! Pipeline<Idle> → Pipeline<Ready>
//! ```
//! Iterating an uninitialised pipeline is a compile error.

mod config;
pub mod dump;
mod error;
mod exploration;
mod metrics;
mod pipeline;

pub use config::{
    AdaptiveCpuConfig, EnvProperties, PropertySource, TomlProperties,
    ENABLED_HINT_TIMEOUT_PROPERTY, HINT_TIMEOUT_PROPERTY, ITERATION_SLEEP_DURATION_PROPERTY,
    MIN_ITERATION_SLEEP_DURATION, RANDOM_THROTTLE_DECISION_PERCENT_PROPERTY,
};
pub use error::PipelineError;
pub use exploration::RandomThrottle;
pub use metrics::{IterationMetrics, RunMetrics};
pub use pipeline::{Idle, IterationOutput, Pipeline, PipelineState, Ready};
