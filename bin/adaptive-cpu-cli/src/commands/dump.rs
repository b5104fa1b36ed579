// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `adaptive-cpu dump` command: print the reader baselines.
//!
//! On a machine without cpufreq statistics (containers, some VMs) the
//! pipeline cannot initialise; the dump is then printed in its disabled,
//! empty form together with the reason.

use runtime::{AdaptiveCpuConfig, Pipeline};
use std::sync::Arc;
use telemetry::RealFilesystem;

pub async fn execute(config: AdaptiveCpuConfig) -> anyhow::Result<()> {
    match Pipeline::new(config, Arc::new(RealFilesystem)).init(super::model_loader(None, None)) {
        Ok(pipeline) => print!("{}", pipeline.dump()),
        Err(e) => {
            tracing::warn!("pipeline initialisation failed: {e}");
            print!("{}", Pipeline::new(config, Arc::new(RealFilesystem)).dump());
            println!("Not enabled: {e}");
        }
    }
    Ok(())
}
