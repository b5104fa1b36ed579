// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end adaptive CPU pipeline.
//!
//! These tests script `/proc/stat` and cpufreq contents through an
//! in-memory filesystem and drive the full flow from properties →
//! config → pipeline init → repeated iterations, proving that the three
//! library crates compose correctly.

use model::{DecisionTree, FixedDecision, Inference, ThrottleDecision, Topology};
use runtime::{
    AdaptiveCpuConfig, Pipeline, PipelineError, Ready, RunMetrics, TomlProperties,
};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{
    CpuLoadReader, MemoryFilesystem, SampleError, WorkDuration, CPUFREQ_PATH,
    NORMAL_TARGET_DURATION, PROC_STAT_PATH,
};

// ── Helpers ────────────────────────────────────────────────────

const TICKS_PER_SECOND: u64 = 100;

fn time_in_state(policy: u32) -> String {
    format!("{CPUFREQ_PATH}/policy{policy}/stats/time_in_state")
}

/// Builds a scripted device with one policy and `num_cores` cores whose
/// idle fraction follows `idle_per_iteration`. Every core sees the same
/// load; each iteration covers 100 ticks.
fn scripted_device(num_cores: usize, idle_per_iteration: &[f64]) -> Arc<MemoryFilesystem> {
    let fs = MemoryFilesystem::new();
    let mut busy = 1000u64;
    let mut idle = 1000u64;

    for step in 0..=idle_per_iteration.len() {
        if step > 0 {
            let idle_ticks = (idle_per_iteration[step - 1] * 100.0).round() as u64;
            idle += idle_ticks;
            busy += 100 - idle_ticks;
        }
        let mut stat = String::from("cpu  1 2 3 4 5 6 7 8 9 10\n");
        for cpu in 0..num_cores {
            stat.push_str(&format!("cpu{cpu} {busy} 0 0 {idle} 0 0 0 0 0 0\n"));
        }
        stat.push_str("ctxt 987654\nbtime 1700000000\n");
        fs.push(PROC_STAT_PATH, stat);
        fs.push(time_in_state(0), format!("1000000 {}\n", 10 * step));
    }
    Arc::new(fs)
}

fn ready_pipeline(
    config: AdaptiveCpuConfig,
    fs: Arc<MemoryFilesystem>,
    load_model: impl FnOnce(Topology) -> Result<Box<dyn Inference>, model::ModelError>,
) -> Pipeline<Ready> {
    Pipeline::new(config, fs)
        .with_ticks_per_second(TICKS_PER_SECOND)
        .with_seed(0)
        .init(load_model)
        .unwrap()
}

fn report_frames(pipeline: &Pipeline<Ready>, frame: Duration, count: usize) {
    let durations: Vec<WorkDuration> = (0..count)
        .map(|i| WorkDuration {
            timestamp_nanos: i as i64 * 16_666_666,
            duration_nanos: frame.as_nanos() as i64,
        })
        .collect();
    pipeline.work_durations().report(&durations, NORMAL_TARGET_DURATION);
}

// ── Tests ──────────────────────────────────────────────────────

#[test]
fn test_proc_stat_delta_example() {
    let fs = MemoryFilesystem::new()
        .with_file(PROC_STAT_PATH, "cpu0 100 0 0 50 0 0 0 0 0 0\n")
        .with_file(PROC_STAT_PATH, "cpu0 190 0 0 60 0 0 0 0 0 0\n");
    let mut reader = CpuLoadReader::with_ticks_per_second(Arc::new(fs), TICKS_PER_SECOND);
    reader.init().unwrap();

    let loads = reader.sample().unwrap();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].cpu_id, 0);
    assert!((loads[0].idle_time_fraction - 0.1).abs() < 1e-12);
}

#[test]
fn test_identical_counters_give_zero_interval() {
    let fs = MemoryFilesystem::new().with_file(PROC_STAT_PATH, "cpu0 100 0 0 50 0 0 0 0 0 0\n");
    let mut reader = CpuLoadReader::with_ticks_per_second(Arc::new(fs), TICKS_PER_SECOND);
    reader.init().unwrap();
    let before = reader.previous_snapshot().clone();

    assert!(matches!(reader.sample(), Err(SampleError::ZeroInterval { cpu_id: 0 })));
    assert_eq!(reader.previous_snapshot(), &before);
}

#[test]
fn test_builtin_tree_walks_every_level() {
    let idle = [0.9, 0.9, 0.6, 0.4, 0.4, 0.1, 0.9];
    let fs = scripted_device(4, &idle);
    let mut pipeline = ready_pipeline(AdaptiveCpuConfig::default(), fs, |t| {
        Ok(Box::new(DecisionTree::builtin(t)?))
    });
    assert_eq!(pipeline.topology(), Topology::new(1, 4).unwrap());
    assert_eq!(pipeline.history().capacity().get(), 2);

    let mut decisions = Vec::new();
    for (i, _) in idle.iter().enumerate() {
        // The last iteration misses its frame deadlines.
        let frame = if i == idle.len() - 1 { 25 } else { 8 };
        report_frames(&pipeline, Duration::from_millis(frame), 3);
        let out = pipeline.iterate().unwrap();
        assert_eq!(out.metrics.num_rendered_frames, 3);
        decisions.push(out.decision);
    }

    assert_eq!(
        decisions,
        vec![
            ThrottleDecision::Throttle80,
            ThrottleDecision::Throttle90,
            ThrottleDecision::Throttle70,
            ThrottleDecision::Throttle60,
            ThrottleDecision::Throttle50,
            ThrottleDecision::NoThrottle,
            ThrottleDecision::NoThrottle,
        ]
    );
    assert_eq!(pipeline.iterations(), idle.len() as u64);
    assert!(pipeline.history().is_full());
}

#[test]
fn test_vector_carries_previous_decision() {
    let fs = scripted_device(2, &[0.5, 0.5, 0.5]);
    let mut pipeline = ready_pipeline(AdaptiveCpuConfig::default(), fs, |_| {
        Ok(Box::new(FixedDecision::new(ThrottleDecision::Throttle60)))
    });

    pipeline.iterate().unwrap();
    assert_eq!(
        pipeline.history().newest().unwrap().previous_throttle_decision(),
        ThrottleDecision::NoThrottle
    );
    pipeline.iterate().unwrap();
    assert_eq!(
        pipeline.history().newest().unwrap().previous_throttle_decision(),
        ThrottleDecision::Throttle60
    );
}

#[test]
fn test_properties_drive_exploration() {
    let props = TomlProperties::from_toml(
        r#"
[debug.adaptivecpu]
iteration_sleep_duration_ms = 25
random_throttle_decision_percent = 100
"#,
    )
    .unwrap();
    let config = AdaptiveCpuConfig::load(&props);
    assert_eq!(config.iteration_sleep_duration, Duration::from_millis(25));
    assert_eq!(config.random_throttle_decision_probability, 1.0);

    let fs = scripted_device(2, &[0.5; 20]);
    let mut pipeline = ready_pipeline(config, fs, |_| {
        Ok(Box::new(FixedDecision::new(ThrottleDecision::NoThrottle)))
    });

    let mut run = RunMetrics::new();
    for _ in 0..20 {
        let out = pipeline.iterate().unwrap();
        assert!(out.metrics.explored);
        run.record(&out.metrics, out.decision);
    }
    assert_eq!(run.explored, 20);
    // 20 uniform draws over six levels essentially never all hit NO_THROTTLE.
    assert!(run.decisions[1..].iter().sum::<u64>() > 0);
}

#[test]
fn test_frames_reported_from_another_thread() {
    let fs = scripted_device(2, &[0.5]);
    let mut pipeline = ready_pipeline(AdaptiveCpuConfig::default(), fs, |_| {
        Ok(Box::new(FixedDecision::new(ThrottleDecision::NoThrottle)))
    });

    let work = pipeline.work_durations();
    let renderer = std::thread::spawn(move || {
        for _ in 0..10 {
            work.report(
                &[WorkDuration {
                    timestamp_nanos: 0,
                    duration_nanos: 20_000_000,
                }],
                NORMAL_TARGET_DURATION,
            );
        }
    });
    renderer.join().unwrap();

    let out = pipeline.iterate().unwrap();
    assert_eq!(out.metrics.num_rendered_frames, 10);
    assert_eq!(out.metrics.num_missed_deadlines, 10);
    assert_eq!(
        pipeline.history().newest().unwrap().average_frame_time(),
        Duration::from_millis(20)
    );
}

#[test]
fn test_failed_iteration_then_recovery() {
    // Baseline, one good interval, a stalled read, then progress again.
    let fs = MemoryFilesystem::new();
    for (stat, units) in [
        ("cpu0 100 0 0 100 0 0 0 0 0 0\n", 0),
        ("cpu0 150 0 0 150 0 0 0 0 0 0\n", 10),
        ("cpu0 150 0 0 150 0 0 0 0 0 0\n", 20),
        ("cpu0 180 0 0 220 0 0 0 0 0 0\n", 30),
    ] {
        fs.push(PROC_STAT_PATH, stat);
        fs.push(time_in_state(0), format!("1000000 {units}\n"));
    }
    let mut pipeline = ready_pipeline(AdaptiveCpuConfig::default(), Arc::new(fs), |_| {
        Ok(Box::new(FixedDecision::new(ThrottleDecision::Throttle50)))
    });

    pipeline.iterate().unwrap();
    let err = pipeline.iterate().unwrap_err();
    assert!(matches!(err, PipelineError::SampleError(SampleError::ZeroInterval { .. })));
    assert_eq!(pipeline.history().len(), 1);

    let out = pipeline.iterate().unwrap();
    assert_eq!(out.metrics.iteration, 2);
    let idle = pipeline.history().newest().unwrap().core_idle_fraction(0).unwrap();
    assert!((idle - 0.7).abs() < 1e-9);
}

#[test]
fn test_dump_after_init() {
    let fs = scripted_device(2, &[0.5]);
    let pipeline = ready_pipeline(AdaptiveCpuConfig::default(), fs, |_| {
        Ok(Box::new(FixedDecision::new(ThrottleDecision::NoThrottle)))
    });
    let text = pipeline.dump();
    assert!(text.starts_with("========== Begin Adaptive CPU stats =========="));
    assert!(text.contains("Enabled: true"));
    assert!(text.contains("- Policy=0\n  - frequency=1000000000Hz, time=0ms"));
    assert!(text.contains("- CPU=1, idleTime=10000ms, totalTime=20000ms"));
    assert!(text.trim_end().ends_with("==========  End Adaptive CPU stats  =========="));
}
