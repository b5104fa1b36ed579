// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `adaptive-cpu run` command: drive the pipeline on a timer.
//!
//! Demonstrates the full type-state pipeline:
//! ```text
//! Pipeline<Idle> → init → Pipeline<Ready> → iterate (every sleep period)
//! ```
//!
//! Decisions are printed, not applied. A failed iteration is retried on the
//! next tick against the old baseline; the run stops once `max_failures`
//! iterations in a row have failed.

use model::ThrottleDecision;
use runtime::{AdaptiveCpuConfig, IterationOutput, Pipeline, RunMetrics};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{RealFilesystem, WorkDuration, NORMAL_TARGET_DURATION};
use tokio::time::MissedTickBehavior;

pub struct RunOptions {
    pub iterations: u64,
    pub model: Option<PathBuf>,
    pub fixed: Option<ThrottleDecision>,
    pub max_failures: u32,
    pub seed: Option<u64>,
    pub frame_ms: Option<u64>,
    pub json: bool,
}

pub async fn execute(config: AdaptiveCpuConfig, options: RunOptions) -> anyhow::Result<()> {
    if !options.json {
        println!("╔══════════════════════════════════════════════════════╗");
        println!("║            adaptive-cpu · Pipeline Runner            ║");
        println!("╚══════════════════════════════════════════════════════╝");
        println!();
        println!("  {config}");
        println!();
    }

    // ── Type-State Pipeline ────────────────────────────────────
    let mut idle = Pipeline::new(config, Arc::new(RealFilesystem));
    if let Some(seed) = options.seed {
        idle = idle.with_seed(seed);
    }
    let mut pipeline = idle.init(super::model_loader(options.model, options.fixed))?;
    if !options.json {
        println!(
            "  Ready: {}, model '{}', history of {}",
            pipeline.topology(),
            pipeline.model_name(),
            pipeline.history().capacity()
        );
        println!();
    }

    let renderer = options.frame_ms.map(|ms| {
        let work = pipeline.work_durations();
        tokio::spawn(simulate_renderer(work, Duration::from_millis(ms)))
    });

    let mut ticker = tokio::time::interval(config.iteration_sleep_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; counters need a full period.
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut metrics = RunMetrics::new();
    let mut consecutive_failures = 0u32;
    let mut outcome = Ok(());

    while options.iterations == 0 || metrics.iterations + metrics.failures < options.iterations {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }

        match pipeline.iterate() {
            Ok(output) => {
                consecutive_failures = 0;
                metrics.record(&output.metrics, output.decision);
                print_iteration(&output, options.json)?;
            }
            Err(e) => {
                metrics.record_failure();
                consecutive_failures += 1;
                tracing::warn!("iteration failed ({consecutive_failures} in a row): {e}");
                if consecutive_failures >= options.max_failures {
                    outcome = Err(anyhow::anyhow!(
                        "{consecutive_failures} consecutive iterations failed; last error: {e}"
                    ));
                    break;
                }
            }
        }
    }

    if let Some(handle) = renderer {
        handle.abort();
    }

    if options.json {
        eprintln!("{}", metrics.summary());
    } else {
        println!();
        println!("  {}", metrics.summary());
    }
    outcome
}

fn print_iteration(output: &IterationOutput, json: bool) -> anyhow::Result<()> {
    if json {
        let line = serde_json::json!({
            "decision": output.decision,
            "metrics": output.metrics,
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        println!("  {:<12} {}", output.decision, output.metrics.summary());
    }
    Ok(())
}

/// Reports one frame per 60 FPS period, each taking `frame`.
async fn simulate_renderer(work: Arc<telemetry::WorkDurationProcessor>, frame: Duration) {
    let mut ticker = tokio::time::interval(NORMAL_TARGET_DURATION);
    let mut frames: i64 = 0;
    let duration_nanos = i64::try_from(frame.as_nanos()).unwrap_or(i64::MAX);
    loop {
        ticker.tick().await;
        work.report(
            &[WorkDuration {
                timestamp_nanos: frames * NORMAL_TARGET_DURATION.as_nanos() as i64,
                duration_nanos,
            }],
            NORMAL_TARGET_DURATION,
        );
        frames += 1;
    }
}
