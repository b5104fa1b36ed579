// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the adaptive CPU pipeline.

/// Errors that can occur while initialising or iterating the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A counter reader failed. The reader's baseline is unchanged.
    #[error("sampling error: {0}")]
    SampleError(#[from] telemetry::SampleError),

    /// Measurements did not match the device topology.
    #[error("feature error: {0}")]
    FeatureError(#[from] model::FeatureError),

    /// The decision artifact could not be loaded.
    #[error("model error: {0}")]
    ModelError(#[from] model::ModelError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
