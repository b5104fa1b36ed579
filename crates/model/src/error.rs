// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for feature construction and decision artifacts.

/// Errors raised while assembling a [`FeatureVector`](crate::FeatureVector).
///
/// These indicate that the supplied measurements do not match the device
/// topology the vector was declared with. That is a configuration bug, not a
/// transient condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureError {
    /// A measurement list has the wrong number of entries.
    #[error("expected {expected} {field}, received {actual}")]
    SchemaMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Policy frequencies were not strictly increasing by policy ID.
    #[error("cpu frequencies weren't sorted by policy id, found {previous} then {current}")]
    UnsortedPolicies { previous: u32, current: u32 },

    /// A load refers to a core outside the topology.
    #[error("unrecognised cpu id {cpu_id} (device has {num_cores} cores)")]
    IndexOutOfRange { cpu_id: u32, num_cores: usize },

    /// Two loads refer to the same core, leaving another core's slot empty.
    #[error("cpu id {cpu_id} appears more than once")]
    DuplicateCore { cpu_id: u32 },

    /// A topology with no policies or no cores.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

/// Errors raised while loading a decision artifact.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Failed to read the artifact from disk.
    #[error("failed to read artifact {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// The artifact is not valid JSON or does not match the schema.
    #[error("artifact parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The artifact parsed but cannot run against the device topology.
    #[error("invalid artifact '{name}': {detail}")]
    InvalidArtifact { name: String, detail: String },
}
