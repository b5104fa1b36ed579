// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # adaptive-cpu
//!
//! Command-line interface for the adaptive CPU pipeline.
//!
//! ## Usage
//! ```bash
//! # Show the resolved configuration
//! adaptive-cpu --properties ./adaptivecpu.toml config
//!
//! # Run 50 iterations with the built-in tree and a simulated 60 FPS renderer
//! adaptive-cpu -vv run --iterations 50 --frame-ms 12
//!
//! # Print the counter baselines
//! adaptive-cpu dump
//! ```
//!
//! Properties come from the process environment
//! (`DEBUG_ADAPTIVECPU_ITERATION_SLEEP_DURATION_MS=25`) and, with lower
//! precedence, from the TOML file given by `--properties`.

mod commands;

use clap::{Parser, Subcommand};
use model::ThrottleDecision;

#[derive(Parser)]
#[command(
    name = "adaptive-cpu",
    about = "Adaptive CPU sampling and throttle-decision pipeline",
    version,
    author
)]
struct Cli {
    /// Path to a TOML properties file.
    #[arg(short, long, global = true)]
    properties: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configuration resolved from the property sources.
    Config {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the pipeline on a timer, printing one decision per iteration.
    Run {
        /// Number of iterations to attempt (0 runs until Ctrl-C).
        #[arg(short = 'n', long, default_value_t = 10)]
        iterations: u64,

        /// Decision-tree artifact (JSON). Defaults to the built-in tree.
        #[arg(short, long, conflicts_with = "fixed")]
        model: Option<std::path::PathBuf>,

        /// Always decide this level instead of running a tree (e.g. THROTTLE_60).
        #[arg(long)]
        fixed: Option<ThrottleDecision>,

        /// Stop after this many consecutive failed iterations.
        #[arg(long, default_value_t = 5)]
        max_failures: u32,

        /// Seed for random throttle exploration.
        #[arg(long)]
        seed: Option<u64>,

        /// Simulate a 60 FPS renderer whose frames take this many milliseconds.
        #[arg(long)]
        frame_ms: Option<u64>,

        /// Print one JSON object per iteration.
        #[arg(long)]
        json: bool,
    },

    /// Initialise the readers and print the baseline diagnostics.
    Dump,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let config = commands::load_config(cli.properties.as_deref())?;

    match cli.command {
        Commands::Config { json } => commands::config::execute(config, json).await,
        Commands::Run {
            iterations,
            model,
            fixed,
            max_failures,
            seed,
            frame_ms,
            json,
        } => {
            commands::run::execute(
                config,
                commands::run::RunOptions {
                    iterations,
                    model,
                    fixed,
                    max_failures,
                    seed,
                    frame_ms,
                    json,
                },
            )
            .await
        }
        Commands::Dump => commands::dump::execute(config).await,
    }
}
