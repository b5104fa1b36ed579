// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared setup.

pub mod config;
pub mod dump;
pub mod run;

use model::{DecisionTree, FixedDecision, Inference, ModelError, ThrottleDecision, Topology};
use runtime::{AdaptiveCpuConfig, EnvProperties, TomlProperties};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v` when set.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the configuration from the environment and, if given, a
/// properties file. Environment values take precedence.
pub fn load_config(properties: Option<&Path>) -> anyhow::Result<AdaptiveCpuConfig> {
    let config = match properties {
        Some(path) => {
            let file = TomlProperties::from_file(path)?;
            tracing::info!("loaded {} properties from {}", file.len(), path.display());
            AdaptiveCpuConfig::load(&(EnvProperties, file))
        }
        None => AdaptiveCpuConfig::load(&EnvProperties),
    };
    tracing::debug!("{config}");
    Ok(config)
}

/// Builds the artifact loader passed to `Pipeline::init`.
pub fn model_loader(
    model: Option<PathBuf>,
    fixed: Option<ThrottleDecision>,
) -> impl FnOnce(Topology) -> Result<Box<dyn Inference>, ModelError> {
    move |topology| -> Result<Box<dyn Inference>, ModelError> {
        if let Some(decision) = fixed {
            return Ok(Box::new(FixedDecision::new(decision)));
        }
        let tree = match model {
            Some(path) => DecisionTree::from_file(&path, topology)?,
            None => DecisionTree::builtin(topology)?,
        };
        tracing::info!("decision tree '{}' with {} nodes", tree.name(), tree.num_nodes());
        Ok(Box::new(tree))
    }
}
