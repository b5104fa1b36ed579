// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `adaptive-cpu config` command: print the resolved configuration.

use runtime::{
    AdaptiveCpuConfig, EnvProperties, ENABLED_HINT_TIMEOUT_PROPERTY, HINT_TIMEOUT_PROPERTY,
    ITERATION_SLEEP_DURATION_PROPERTY, RANDOM_THROTTLE_DECISION_PERCENT_PROPERTY,
};

pub async fn execute(config: AdaptiveCpuConfig, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{config}");
    println!();
    println!("  Properties (environment variable):");
    for key in [
        ITERATION_SLEEP_DURATION_PROPERTY,
        HINT_TIMEOUT_PROPERTY,
        RANDOM_THROTTLE_DECISION_PERCENT_PROPERTY,
        ENABLED_HINT_TIMEOUT_PROPERTY,
    ] {
        println!("   {key}  ({})", EnvProperties::variable_name(key));
    }
    Ok(())
}
