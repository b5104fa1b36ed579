// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model
//!
//! Turns one iteration's telemetry into a fixed-shape [`FeatureVector`] and
//! maps a short [`History`] of them to a [`ThrottleDecision`].
//!
//! # Artifacts
//! Anything implementing [`Inference`] can drive the decision:
//! - [`DecisionTree`]: a JSON-described binary tree validated against the
//!   device [`Topology`]. A default tree is compiled into the crate.
//! - [`FixedDecision`]: always returns the same level.
//!
//! # Example
//! ```
//! use model::{DecisionTree, FeatureVector, History, Inference, ThrottleDecision, Topology};
//! use std::time::Duration;
//! use telemetry::{CpuLoad, CpuPolicyFrequency};
//!
//! let topology = Topology::new(1, 1).unwrap();
//! let tree = DecisionTree::builtin(topology).unwrap();
//! let mut history = History::new(tree.lookback());
//! history.push(
//!     FeatureVector::build(
//!         topology,
//!         &[CpuPolicyFrequency { policy_id: 0, average_frequency_hz: 1.0e9 }],
//!         &[CpuLoad { cpu_id: 0, idle_time_fraction: 0.05 }],
//!         Duration::from_millis(10),
//!         60,
//!         ThrottleDecision::NoThrottle,
//!     )
//!     .unwrap(),
//! );
//! assert_eq!(tree.run(&history), ThrottleDecision::NoThrottle);
//! ```

pub mod artifact;
mod error;
mod history;
mod inference;
mod input;
mod throttle;

pub use artifact::fixed::FixedDecision;
pub use artifact::tree::{DecisionTree, Feature, Node};
pub use error::{FeatureError, ModelError};
pub use history::History;
pub use inference::Inference;
pub use input::{FeatureVector, Topology};
pub use throttle::ThrottleDecision;
