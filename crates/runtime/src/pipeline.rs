// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The sample-build-infer pipeline with type-state enforced initialisation.
//!
//! ```text
//! Pipeline<Idle>
//!     │  .init(load_model)
//!     ▼
//! Pipeline<Ready>
//!     │  .iterate()   (repeatedly)
//!     ▼
//!   IterationOutput
//! ```
//!
//! `init` records the counter baselines, derives the device [`Topology`]
//! from them and loads the decision artifact for that topology. Only a
//! `Ready` pipeline can iterate.

use crate::{dump, AdaptiveCpuConfig, IterationMetrics, PipelineError, RandomThrottle};
use model::{
    FeatureError, FeatureVector, History, Inference, ModelError, ThrottleDecision, Topology,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use telemetry::{CpuFrequencyReader, CpuLoadReader, Filesystem, WorkDurationProcessor};

// ── Type-state markers ─────────────────────────────────────────

/// Readers constructed, no baseline recorded.
pub struct Idle {
    fs: Arc<dyn Filesystem>,
}

impl std::fmt::Debug for Idle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Idle")
    }
}

/// Baselines recorded and artifact loaded.
pub struct Ready {
    topology: Topology,
    inference: Box<dyn Inference>,
    history: History,
    previous_decision: ThrottleDecision,
    iterations: u64,
}

impl std::fmt::Debug for Ready {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ready")
            .field("topology", &self.topology)
            .field("model", &self.inference.name())
            .field("history_len", &self.history.len())
            .field("previous_decision", &self.previous_decision)
            .field("iterations", &self.iterations)
            .finish()
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Idle {}
    impl Sealed for super::Ready {}
}

/// Sealed trait for pipeline states.
pub trait PipelineState: sealed::Sealed + std::fmt::Debug {
    /// Whether the pipeline is producing decisions in this state.
    const ENABLED: bool;
}
impl PipelineState for Idle {
    const ENABLED: bool = false;
}
impl PipelineState for Ready {
    const ENABLED: bool = true;
}

// ── Iteration output ───────────────────────────────────────────

/// The result of one iteration.
#[derive(Debug, Clone)]
pub struct IterationOutput {
    /// The decision to apply, after exploration.
    pub decision: ThrottleDecision,
    pub metrics: IterationMetrics,
}

// ── Pipeline ───────────────────────────────────────────────────

/// The adaptive CPU pipeline.
///
/// # Example
/// ```no_run
/// use model::DecisionTree;
/// use runtime::{AdaptiveCpuConfig, Pipeline};
/// use std::sync::Arc;
/// use telemetry::RealFilesystem;
///
/// # fn example() -> Result<(), runtime::PipelineError> {
/// let mut pipeline = Pipeline::new(AdaptiveCpuConfig::default(), Arc::new(RealFilesystem))
///     .init(|topology| Ok(Box::new(DecisionTree::builtin(topology)?)))?;
/// let output = pipeline.iterate()?;
/// println!("{}: {}", output.decision, output.metrics.summary());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<S: PipelineState = Idle> {
    config: AdaptiveCpuConfig,
    load_reader: CpuLoadReader,
    frequency_reader: CpuFrequencyReader,
    work_durations: Arc<WorkDurationProcessor>,
    exploration: RandomThrottle,
    state: S,
}

// ── Idle → Ready ───────────────────────────────────────────────

impl Pipeline<Idle> {
    /// Creates a pipeline reading counters through `fs`.
    pub fn new(config: AdaptiveCpuConfig, fs: Arc<dyn Filesystem>) -> Self {
        tracing::info!("pipeline created: {config}");
        Self {
            load_reader: CpuLoadReader::new(Arc::clone(&fs)),
            frequency_reader: CpuFrequencyReader::new(Arc::clone(&fs)),
            work_durations: Arc::new(WorkDurationProcessor::new()),
            exploration: RandomThrottle::new(config.random_throttle_decision_probability),
            config,
            state: Idle { fs },
        }
    }

    /// Overrides the clock-tick rate used to convert `/proc/stat` counters.
    pub fn with_ticks_per_second(mut self, ticks_per_second: u64) -> Self {
        self.load_reader =
            CpuLoadReader::with_ticks_per_second(Arc::clone(&self.state.fs), ticks_per_second);
        self
    }

    /// Reads cpufreq policies from a directory other than the default.
    pub fn with_cpufreq_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.frequency_reader = CpuFrequencyReader::with_root(Arc::clone(&self.state.fs), root);
        self
    }

    /// Seeds exploration for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.exploration =
            RandomThrottle::with_seed(self.config.random_throttle_decision_probability, seed);
        self
    }

    /// Shares an existing work-duration processor with the renderer side.
    pub fn with_work_durations(mut self, work_durations: Arc<WorkDurationProcessor>) -> Self {
        self.work_durations = work_durations;
        self
    }

    /// Records the counter baselines, derives the topology and loads the
    /// decision artifact through `load_model`.
    ///
    /// The topology has one policy per cpufreq policy directory and
    /// `max core id + 1` cores. If a core below the highest id is missing
    /// (offline), `init` fails with `SchemaMismatch` and can be retried on a
    /// new pipeline once every core reports.
    pub fn init<F>(mut self, load_model: F) -> Result<Pipeline<Ready>, PipelineError>
    where
        F: FnOnce(Topology) -> Result<Box<dyn Inference>, ModelError>,
    {
        self.frequency_reader.init()?;
        self.load_reader.init()?;

        let num_policies = self.frequency_reader.policy_ids().len();
        let num_cores = self
            .load_reader
            .previous_snapshot()
            .max_cpu_id()
            .map_or(0, |id| id as usize + 1);
        let listed = self.load_reader.previous_snapshot().len();
        if listed != num_cores {
            tracing::warn!(
                "core ids are not contiguous ({listed} cores listed, {num_cores} expected)"
            );
            return Err(FeatureError::SchemaMismatch {
                field: "cpu loads",
                expected: num_cores,
                actual: listed,
            }
            .into());
        }
        let topology = Topology::new(num_policies, num_cores)?;

        let inference = load_model(topology)?;
        tracing::info!(
            "pipeline ready: {topology}, model '{}' with lookback {}",
            inference.name(),
            inference.lookback()
        );

        Ok(Pipeline {
            config: self.config,
            load_reader: self.load_reader,
            frequency_reader: self.frequency_reader,
            work_durations: self.work_durations,
            exploration: self.exploration,
            state: Ready {
                topology,
                history: History::new(inference.lookback()),
                inference,
                previous_decision: ThrottleDecision::NoThrottle,
                iterations: 0,
            },
        })
    }
}

// ── Ready: iterate ─────────────────────────────────────────────

impl Pipeline<Ready> {
    /// Runs one iteration: sample, build, infer, explore.
    ///
    /// On error the history and previous decision are untouched. A reader
    /// that failed keeps its old baseline; a reader that already succeeded
    /// this iteration has moved on.
    pub fn iterate(&mut self) -> Result<IterationOutput, PipelineError> {
        let started = Instant::now();

        let frequencies = self.frequency_reader.sample().map_err(|e| {
            tracing::warn!("failed to sample cpu frequencies: {e}");
            e
        })?;
        let loads = self.load_reader.sample().map_err(|e| {
            tracing::warn!("failed to sample cpu loads: {e}");
            e
        })?;
        let work = self.work_durations.take_features();
        let sample_duration = started.elapsed();

        for f in &frequencies {
            tracing::trace!("policy={}, freq={}", f.policy_id, f.average_frequency_hz);
        }
        for l in &loads {
            tracing::trace!("cpu={}, idle={}", l.cpu_id, l.idle_time_fraction);
        }

        let ready = &mut self.state;
        let vector = FeatureVector::build(
            ready.topology,
            &frequencies,
            &loads,
            work.average_duration,
            work.num_rendered_frames(),
            ready.previous_decision,
        )
        .map_err(|e| {
            tracing::error!("feature vector rejected: {e}");
            e
        })?;
        vector.trace_counters();

        let idle = vector.core_idle_fractions();
        let mean_idle_fraction = idle.iter().sum::<f64>() / idle.len() as f64;
        ready.history.push(vector);

        let inference_started = Instant::now();
        let model_decision = ready.inference.run(&ready.history);
        let inference_duration = inference_started.elapsed();

        let explored = self.exploration.draw();
        let decision = explored.unwrap_or(model_decision);
        ready.previous_decision = decision;
        ready.iterations += 1;

        let metrics = IterationMetrics {
            iteration: ready.iterations,
            sample_duration,
            inference_duration,
            total_duration: started.elapsed(),
            num_rendered_frames: work.num_rendered_frames(),
            num_missed_deadlines: work.num_missed_deadlines,
            mean_idle_fraction,
            model_decision,
            explored: explored.is_some(),
        };
        tracing::debug!("decision {decision}; {}", metrics.summary());

        Ok(IterationOutput { decision, metrics })
    }

    pub fn topology(&self) -> Topology {
        self.state.topology
    }

    pub fn history(&self) -> &History {
        &self.state.history
    }

    /// The decision fed into the next feature vector.
    pub fn previous_decision(&self) -> ThrottleDecision {
        self.state.previous_decision
    }

    /// Successful iterations since `init`.
    pub fn iterations(&self) -> u64 {
        self.state.iterations
    }

    pub fn model_name(&self) -> &str {
        self.state.inference.name()
    }
}

// ── Any state ──────────────────────────────────────────────────

impl<S: PipelineState> Pipeline<S> {
    pub fn config(&self) -> &AdaptiveCpuConfig {
        &self.config
    }

    /// Handle for reporting frame work durations from other threads.
    pub fn work_durations(&self) -> Arc<WorkDurationProcessor> {
        Arc::clone(&self.work_durations)
    }

    /// Renders the current baselines as a diagnostics block.
    pub fn dump(&self) -> String {
        dump::render(
            S::ENABLED,
            self.frequency_reader.previous_snapshot(),
            self.load_reader.previous_snapshot(),
        )
    }
}

impl<S: PipelineState> std::fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("load_reader", &self.load_reader)
            .field("frequency_reader", &self.frequency_reader)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{DecisionTree, FixedDecision};
    use std::num::NonZeroUsize;
    use telemetry::{MemoryFilesystem, SampleError, WorkDuration, CPUFREQ_PATH, PROC_STAT_PATH};

    fn stat(cores: &[(u64, u64)]) -> String {
        let mut s = String::from("cpu  0 0 0 0 0 0 0 0 0 0\n");
        for (i, (busy, idle)) in cores.iter().enumerate() {
            s.push_str(&format!("cpu{i} {busy} 0 0 {idle} 0 0 0 0 0 0\n"));
        }
        s.push_str("intr 12345\n");
        s
    }

    fn tis(policy: u32) -> String {
        format!("{CPUFREQ_PATH}/policy{policy}/stats/time_in_state")
    }

    /// Two policies (0 and 2), two cores.
    fn scripted_fs() -> Arc<MemoryFilesystem> {
        let fs = MemoryFilesystem::new();
        fs.push(tis(0), "300000 100\n600000 100\n");
        fs.push(tis(0), "300000 110\n600000 110\n");
        fs.push(tis(2), "1000000 0\n");
        fs.push(tis(2), "1000000 10\n");
        fs.push(PROC_STAT_PATH, stat(&[(100, 50), (100, 50)]));
        fs.push(PROC_STAT_PATH, stat(&[(190, 60), (150, 100)]));
        Arc::new(fs)
    }

    fn fixed(
        decision: ThrottleDecision,
    ) -> impl FnOnce(Topology) -> Result<Box<dyn Inference>, ModelError> {
        move |_| Ok(Box::new(FixedDecision::new(decision)) as Box<dyn Inference>)
    }

    fn pipeline(fs: Arc<MemoryFilesystem>) -> Pipeline<Idle> {
        Pipeline::new(AdaptiveCpuConfig::default(), fs)
            .with_ticks_per_second(100)
            .with_seed(1)
    }

    #[test]
    fn test_init_derives_topology() {
        let p = pipeline(scripted_fs()).init(fixed(ThrottleDecision::NoThrottle)).unwrap();
        assert_eq!(p.topology(), Topology::new(2, 2).unwrap());
        assert_eq!(p.previous_decision(), ThrottleDecision::NoThrottle);
        assert_eq!(p.iterations(), 0);
        assert!(p.history().is_empty());
        assert_eq!(p.model_name(), "fixed");
    }

    #[test]
    fn test_history_sized_from_lookback() {
        let p = pipeline(scripted_fs())
            .init(|_| {
                Ok(Box::new(
                    FixedDecision::new(ThrottleDecision::NoThrottle)
                        .with_lookback(NonZeroUsize::new(4).unwrap()),
                ))
            })
            .unwrap();
        assert_eq!(p.history().capacity().get(), 4);
    }

    #[test]
    fn test_iterate_builds_vector_and_feeds_back_decision() {
        let fs = scripted_fs();
        let mut p = pipeline(Arc::clone(&fs)).init(fixed(ThrottleDecision::Throttle70)).unwrap();
        let work = p.work_durations();
        work.report(
            &[WorkDuration {
                timestamp_nanos: 0,
                duration_nanos: 8_000_000,
            }],
            telemetry::NORMAL_TARGET_DURATION,
        );

        let out = p.iterate().unwrap();
        assert_eq!(out.decision, ThrottleDecision::Throttle70);
        assert_eq!(out.metrics.iteration, 1);
        assert_eq!(out.metrics.num_rendered_frames, 1);
        assert!(!out.metrics.explored);

        let v = p.history().newest().unwrap();
        assert_eq!(v.policy_frequencies_hz(), &[450_000_000.0, 1_000_000_000.0]);
        let idle = v.core_idle_fractions();
        assert!((idle[0] - 0.1).abs() < 1e-9);
        assert!((idle[1] - 0.5).abs() < 1e-9);
        assert_eq!(v.previous_throttle_decision(), ThrottleDecision::NoThrottle);
        assert_eq!(p.previous_decision(), ThrottleDecision::Throttle70);
    }

    #[test]
    fn test_builtin_tree_pipeline() {
        let mut p = pipeline(scripted_fs())
            .init(|t| Ok(Box::new(DecisionTree::builtin(t)?)))
            .unwrap();
        // Core 0 is 90 % busy.
        assert_eq!(p.iterate().unwrap().decision, ThrottleDecision::NoThrottle);
    }

    #[test]
    fn test_sample_error_leaves_history() {
        let fs = scripted_fs();
        let mut p = pipeline(Arc::clone(&fs)).init(fixed(ThrottleDecision::Throttle50)).unwrap();
        p.iterate().unwrap();

        // The scripted counters stop moving: the load reader sees a zero interval.
        let err = p.iterate().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SampleError(SampleError::ZeroInterval { .. })
        ));
        assert_eq!(p.history().len(), 1);
        assert_eq!(p.iterations(), 1);
        assert_eq!(p.previous_decision(), ThrottleDecision::Throttle50);
    }

    #[test]
    fn test_missing_core_is_feature_error() {
        let fs = MemoryFilesystem::new();
        for units in [100, 110, 120] {
            fs.push(tis(0), format!("300000 {units}\n"));
        }
        fs.push(PROC_STAT_PATH, stat(&[(100, 50), (100, 50)]));
        fs.push(PROC_STAT_PATH, stat(&[(190, 60), (150, 100)]));
        // cpu1 goes offline: one load for a two-core topology.
        fs.push(PROC_STAT_PATH, stat(&[(290, 70)]));

        let mut p = pipeline(Arc::new(fs)).init(fixed(ThrottleDecision::NoThrottle)).unwrap();
        p.iterate().unwrap();
        let err = p.iterate().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FeatureError(model::FeatureError::SchemaMismatch { .. })
        ));
        assert_eq!(p.history().len(), 1);
    }

    #[test]
    fn test_init_rejects_offline_core_then_retries() {
        let fs = Arc::new(MemoryFilesystem::new());
        fs.push(tis(0), "300000 100\n");
        fs.push(tis(0), "300000 110\n");
        fs.push(tis(0), "300000 120\n");
        // cpu1 is offline for the first read only.
        fs.push(
            PROC_STAT_PATH,
            "cpu  0 0 0 0 0 0 0 0 0 0\ncpu0 100 0 0 50 0 0 0 0 0 0\ncpu2 100 0 0 50 0 0 0 0 0 0\n",
        );
        fs.push(PROC_STAT_PATH, stat(&[(100, 50), (100, 50), (100, 50)]));
        fs.push(PROC_STAT_PATH, stat(&[(190, 60), (150, 100), (180, 70)]));

        let err = pipeline(Arc::clone(&fs))
            .init(fixed(ThrottleDecision::NoThrottle))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FeatureError(FeatureError::SchemaMismatch {
                field: "cpu loads",
                expected: 3,
                actual: 2,
            })
        ));

        let mut p = pipeline(fs).init(fixed(ThrottleDecision::NoThrottle)).unwrap();
        assert_eq!(p.topology(), Topology::new(1, 3).unwrap());
        let out = p.iterate().unwrap();
        assert_eq!(out.metrics.iteration, 1);
        assert_eq!(p.history().newest().unwrap().core_idle_fractions().len(), 3);
    }

    #[test]
    fn test_with_cpufreq_root_reads_same_filesystem() {
        let fs = MemoryFilesystem::new();
        fs.push("/alt/cpufreq/policy0/stats/time_in_state", "300000 100\n");
        fs.push(PROC_STAT_PATH, stat(&[(100, 50)]));
        let p = pipeline(Arc::new(fs))
            .with_cpufreq_root("/alt/cpufreq")
            .init(fixed(ThrottleDecision::NoThrottle))
            .unwrap();
        assert_eq!(p.topology(), Topology::new(1, 1).unwrap());
    }

    #[test]
    fn test_init_fails_without_cpufreq() {
        let fs = Arc::new(MemoryFilesystem::new().with_file(PROC_STAT_PATH, stat(&[(1, 1)])));
        let err = pipeline(fs).init(fixed(ThrottleDecision::NoThrottle)).unwrap_err();
        assert!(matches!(err, PipelineError::SampleError(_)));
    }

    #[test]
    fn test_init_propagates_model_error() {
        let err = pipeline(scripted_fs())
            .init(|t| Ok(Box::new(DecisionTree::from_json("[]", t)?)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelError(_)));
    }

    #[test]
    fn test_full_exploration_overrides_model() {
        let config = AdaptiveCpuConfig {
            random_throttle_decision_probability: 1.0,
            ..Default::default()
        };
        let mut p = Pipeline::new(config, scripted_fs())
            .with_ticks_per_second(100)
            .with_seed(9)
            .init(fixed(ThrottleDecision::Throttle90))
            .unwrap();
        let out = p.iterate().unwrap();
        assert!(out.metrics.explored);
        assert_eq!(out.metrics.model_decision, ThrottleDecision::Throttle90);
        assert_eq!(p.previous_decision(), out.decision);
    }

    #[test]
    fn test_dump_reflects_state() {
        let idle = pipeline(scripted_fs());
        assert!(idle.dump().contains("Enabled: false"));

        let ready = idle.init(fixed(ThrottleDecision::NoThrottle)).unwrap();
        let text = ready.dump();
        assert!(text.contains("Enabled: true"));
        assert!(text.contains("- Policy=2"));
        assert!(text.contains("- CPU=1, idleTime=500ms, totalTime=1500ms"));
    }
}
