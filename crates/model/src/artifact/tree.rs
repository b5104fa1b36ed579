// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Binary decision tree loaded from a JSON artifact.
//!
//! # Artifact format
//! ```json
//! {
//!   "name": "my-tree",
//!   "window": 2,
//!   "nodes": [
//!     { "node": "split",
//!       "feature": { "kind": "mean_core_idle_fraction", "lookback": 0 },
//!       "threshold": 0.5, "le": 1, "gt": 2 },
//!     { "node": "leaf", "decision": "THROTTLE_50" },
//!     { "node": "leaf", "decision": "NO_THROTTLE" }
//!   ]
//! }
//! ```
//!
//! Evaluation starts at node 0. A split goes to `le` when the feature value
//! is `<= threshold` and to `gt` otherwise. Children must have a larger
//! index than their parent, so every walk terminates in at most
//! `nodes.len()` steps.
//!
//! Features are read relative to the newest vector (`lookback = 0`). A
//! lookback beyond the current history length reads the oldest vector, so
//! a tree with `window = 3` still answers after the first iteration.

use crate::{FeatureVector, History, Inference, ModelError, ThrottleDecision, Topology};
use std::num::NonZeroUsize;
use std::path::Path;

/// The tree baked into the binary.
const BUILTIN_TREE_JSON: &str = include_str!("../../artifacts/default_tree.json");

/// A scalar read from one vector in the history.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    /// Average frequency of the policy at `policy` position, in Hz.
    PolicyFrequencyHz { lookback: usize, policy: usize },
    /// Idle fraction of core `core`.
    CoreIdleFraction { lookback: usize, core: usize },
    /// Mean idle fraction over all cores.
    MeanCoreIdleFraction { lookback: usize },
    /// Idle fraction of the busiest core.
    MinCoreIdleFraction { lookback: usize },
    /// Average normalised frame time, in nanoseconds.
    AverageFrameTimeNs { lookback: usize },
    NumRenderedFrames { lookback: usize },
    /// Ordinal of the decision fed back from the previous iteration.
    PreviousThrottle { lookback: usize },
}

impl Feature {
    pub fn lookback(&self) -> usize {
        match *self {
            Feature::PolicyFrequencyHz { lookback, .. }
            | Feature::CoreIdleFraction { lookback, .. }
            | Feature::MeanCoreIdleFraction { lookback }
            | Feature::MinCoreIdleFraction { lookback }
            | Feature::AverageFrameTimeNs { lookback }
            | Feature::NumRenderedFrames { lookback }
            | Feature::PreviousThrottle { lookback } => lookback,
        }
    }

    /// Reads the feature from `history`; `NaN` if there is nothing to read.
    fn evaluate(&self, history: &History) -> f64 {
        let vector = history
            .from_newest(self.lookback())
            .or_else(|| history.oldest());
        match vector {
            Some(v) => self.read(v),
            None => f64::NAN,
        }
    }

    fn read(&self, v: &FeatureVector) -> f64 {
        match *self {
            Feature::PolicyFrequencyHz { policy, .. } => {
                v.policy_frequency_hz(policy).unwrap_or(f64::NAN)
            }
            Feature::CoreIdleFraction { core, .. } => {
                v.core_idle_fraction(core).unwrap_or(f64::NAN)
            }
            Feature::MeanCoreIdleFraction { .. } => {
                let idle = v.core_idle_fractions();
                idle.iter().sum::<f64>() / idle.len() as f64
            }
            Feature::MinCoreIdleFraction { .. } => v
                .core_idle_fractions()
                .iter()
                .copied()
                .fold(f64::INFINITY, f64::min),
            Feature::AverageFrameTimeNs { .. } => v.average_frame_time().as_nanos() as f64,
            Feature::NumRenderedFrames { .. } => f64::from(v.num_rendered_frames()),
            Feature::PreviousThrottle { .. } => f64::from(v.previous_throttle_decision().ordinal()),
        }
    }
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: Feature,
        threshold: f64,
        /// Child taken when `value <= threshold`.
        le: usize,
        /// Child taken otherwise, including when the value is `NaN`.
        gt: usize,
    },
    Leaf {
        decision: ThrottleDecision,
    },
}

#[derive(serde::Serialize, serde::Deserialize)]
struct TreeArtifact {
    name: String,
    window: usize,
    nodes: Vec<Node>,
}

/// A validated decision tree, compiled against one device [`Topology`].
#[derive(Debug, Clone)]
pub struct DecisionTree {
    name: String,
    window: NonZeroUsize,
    nodes: Vec<Node>,
    topology: Topology,
}

impl DecisionTree {
    /// Validates `nodes` against `topology` and builds the tree.
    ///
    /// # Checks
    /// - `window >= 1` and at least one node;
    /// - split children point forward and stay in bounds;
    /// - thresholds are finite;
    /// - policy and core indices fit the topology;
    /// - every lookback is inside the window.
    pub fn new(
        name: impl Into<String>,
        window: usize,
        nodes: Vec<Node>,
        topology: Topology,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let invalid = |detail: String| ModelError::InvalidArtifact {
            name: name.clone(),
            detail,
        };

        let window = NonZeroUsize::new(window).ok_or_else(|| invalid("window is 0".into()))?;
        if nodes.is_empty() {
            return Err(invalid("tree has no nodes".into()));
        }

        for (i, node) in nodes.iter().enumerate() {
            let Node::Split {
                feature,
                threshold,
                le,
                gt,
            } = node
            else {
                continue;
            };
            for child in [*le, *gt] {
                if child <= i || child >= nodes.len() {
                    return Err(invalid(format!(
                        "node {i} has child {child}; children must be in {}..{}",
                        i + 1,
                        nodes.len()
                    )));
                }
            }
            if !threshold.is_finite() {
                return Err(invalid(format!("node {i} has non-finite threshold")));
            }
            if feature.lookback() >= window.get() {
                return Err(invalid(format!(
                    "node {i} looks back {} vectors but the window is {window}",
                    feature.lookback()
                )));
            }
            match *feature {
                Feature::PolicyFrequencyHz { policy, .. } if policy >= topology.num_policies() => {
                    return Err(invalid(format!(
                        "node {i} reads policy {policy} of {}",
                        topology.num_policies()
                    )));
                }
                Feature::CoreIdleFraction { core, .. } if core >= topology.num_cores() => {
                    return Err(invalid(format!(
                        "node {i} reads core {core} of {}",
                        topology.num_cores()
                    )));
                }
                _ => {}
            }
        }

        Ok(Self {
            name,
            window,
            nodes,
            topology,
        })
    }

    /// Parses and validates a JSON artifact.
    pub fn from_json(json: &str, topology: Topology) -> Result<Self, ModelError> {
        let artifact: TreeArtifact = serde_json::from_str(json)?;
        Self::new(artifact.name, artifact.window, artifact.nodes, topology)
    }

    /// Reads, parses and validates a JSON artifact file.
    pub fn from_file(path: &Path, topology: Topology) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&json, topology)
    }

    /// The tree shipped with the binary.
    pub fn builtin(topology: Topology) -> Result<Self, ModelError> {
        Self::from_json(BUILTIN_TREE_JSON, topology)
    }

    /// Serialises the tree back to its artifact form.
    pub fn to_json(&self) -> Result<String, ModelError> {
        let artifact = TreeArtifact {
            name: self.name.clone(),
            window: self.window.get(),
            nodes: self.nodes.clone(),
        };
        Ok(serde_json::to_string_pretty(&artifact)?)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }
}

impl Inference for DecisionTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> NonZeroUsize {
        self.window
    }

    fn run(&self, history: &History) -> ThrottleDecision {
        // Children always point forward, so this visits each node at most once.
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { decision } => return *decision,
                Node::Split {
                    feature,
                    threshold,
                    le,
                    gt,
                } => {
                    let value = feature.evaluate(history);
                    index = if value <= *threshold { *le } else { *gt };
                }
            }
        }
    }
}
