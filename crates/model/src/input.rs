// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The fixed-shape feature vector consumed by inference.
//!
//! A [`FeatureVector`] can only be obtained through [`FeatureVector::build`],
//! which validates every input against the device [`Topology`] before the
//! first slot is written. A vector that exists is therefore fully populated.

use crate::{FeatureError, ThrottleDecision};
use std::time::Duration;
use telemetry::{CpuLoad, CpuPolicyFrequency};

/// Number of frequency policies and logical cores on the device.
///
/// Fixed for the lifetime of the process; every [`FeatureVector`] built for
/// the device has exactly these dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Topology {
    num_policies: usize,
    num_cores: usize,
}

impl Topology {
    /// Creates a topology. Both dimensions must be at least one.
    pub fn new(num_policies: usize, num_cores: usize) -> Result<Self, FeatureError> {
        if num_policies == 0 {
            return Err(FeatureError::InvalidTopology(
                "device has no frequency policies".into(),
            ));
        }
        if num_cores == 0 {
            return Err(FeatureError::InvalidTopology("device has no cores".into()));
        }
        Ok(Self {
            num_policies,
            num_cores,
        })
    }

    pub fn num_policies(&self) -> usize {
        self.num_policies
    }

    pub fn num_cores(&self) -> usize {
        self.num_cores
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} policies, {} cores", self.num_policies, self.num_cores)
    }
}

/// One iteration's measurements, laid out for the decision artifact.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FeatureVector {
    cpu_policy_average_frequency_hz: Box<[f64]>,
    cpu_core_idle_times_percentage: Box<[f64]>,
    average_frame_time: Duration,
    num_rendered_frames: u16,
    previous_throttle_decision: ThrottleDecision,
}

impl FeatureVector {
    /// Validates the measurements and assembles a vector.
    ///
    /// # Checks
    /// - exactly `P` frequencies and `C` loads;
    /// - policy IDs strictly increasing (sorted, no duplicates);
    /// - every core ID below `C` and seen once.
    ///
    /// Frequencies are stored by position (the i-th policy goes to slot i);
    /// loads are stored by core ID.
    ///
    /// # Example
    /// ```
    /// use model::{FeatureVector, ThrottleDecision, Topology};
    /// use std::time::Duration;
    /// use telemetry::{CpuLoad, CpuPolicyFrequency};
    ///
    /// let topology = Topology::new(1, 2).unwrap();
    /// let v = FeatureVector::build(
    ///     topology,
    ///     &[CpuPolicyFrequency { policy_id: 0, average_frequency_hz: 1.0e9 }],
    ///     &[
    ///         CpuLoad { cpu_id: 1, idle_time_fraction: 0.25 },
    ///         CpuLoad { cpu_id: 0, idle_time_fraction: 0.75 },
    ///     ],
    ///     Duration::from_millis(16),
    ///     60,
    ///     ThrottleDecision::NoThrottle,
    /// )
    /// .unwrap();
    /// assert_eq!(v.core_idle_fraction(0), Some(0.75));
    /// ```
    pub fn build(
        topology: Topology,
        frequencies: &[CpuPolicyFrequency],
        loads: &[CpuLoad],
        average_frame_time: Duration,
        num_rendered_frames: u16,
        previous_throttle_decision: ThrottleDecision,
    ) -> Result<Self, FeatureError> {
        let num_policies = topology.num_policies();
        let num_cores = topology.num_cores();

        if frequencies.len() != num_policies {
            return Err(FeatureError::SchemaMismatch {
                field: "cpu policy frequencies",
                expected: num_policies,
                actual: frequencies.len(),
            });
        }
        for pair in frequencies.windows(2) {
            if pair[0].policy_id >= pair[1].policy_id {
                return Err(FeatureError::UnsortedPolicies {
                    previous: pair[0].policy_id,
                    current: pair[1].policy_id,
                });
            }
        }

        if loads.len() != num_cores {
            return Err(FeatureError::SchemaMismatch {
                field: "cpu loads",
                expected: num_cores,
                actual: loads.len(),
            });
        }
        let mut seen = vec![false; num_cores];
        for load in loads {
            let slot = seen
                .get_mut(load.cpu_id as usize)
                .ok_or(FeatureError::IndexOutOfRange {
                    cpu_id: load.cpu_id,
                    num_cores,
                })?;
            if *slot {
                return Err(FeatureError::DuplicateCore {
                    cpu_id: load.cpu_id,
                });
            }
            *slot = true;
        }

        // Validation complete; every slot below is written exactly once.
        let cpu_policy_average_frequency_hz: Box<[f64]> =
            frequencies.iter().map(|f| f.average_frequency_hz).collect();
        let mut cpu_core_idle_times_percentage = vec![0.0; num_cores].into_boxed_slice();
        for load in loads {
            cpu_core_idle_times_percentage[load.cpu_id as usize] = load.idle_time_fraction;
        }

        Ok(Self {
            cpu_policy_average_frequency_hz,
            cpu_core_idle_times_percentage,
            average_frame_time,
            num_rendered_frames,
            previous_throttle_decision,
        })
    }

    /// The topology this vector was built for.
    pub fn topology(&self) -> Topology {
        Topology {
            num_policies: self.cpu_policy_average_frequency_hz.len(),
            num_cores: self.cpu_core_idle_times_percentage.len(),
        }
    }

    /// Average frequencies, indexed by policy position.
    pub fn policy_frequencies_hz(&self) -> &[f64] {
        &self.cpu_policy_average_frequency_hz
    }

    /// Idle fractions, indexed by core ID.
    pub fn core_idle_fractions(&self) -> &[f64] {
        &self.cpu_core_idle_times_percentage
    }

    pub fn policy_frequency_hz(&self, policy_index: usize) -> Option<f64> {
        self.cpu_policy_average_frequency_hz.get(policy_index).copied()
    }

    pub fn core_idle_fraction(&self, cpu_id: usize) -> Option<f64> {
        self.cpu_core_idle_times_percentage.get(cpu_id).copied()
    }

    pub fn average_frame_time(&self) -> Duration {
        self.average_frame_time
    }

    pub fn num_rendered_frames(&self) -> u16 {
        self.num_rendered_frames
    }

    pub fn previous_throttle_decision(&self) -> ThrottleDecision {
        self.previous_throttle_decision
    }

    /// Emits every slot as a named counter on the `adaptive_cpu::counters`
    /// target at TRACE level.
    ///
    /// Does nothing unless a subscriber has that level enabled.
    pub fn trace_counters(&self) {
        if !tracing::enabled!(target: "adaptive_cpu::counters", tracing::Level::TRACE) {
            return;
        }
        for (i, hz) in self.cpu_policy_average_frequency_hz.iter().enumerate() {
            counter(&format!("ModelInput_frequency_{i}"), *hz as i64);
        }
        for (i, idle) in self.cpu_core_idle_times_percentage.iter().enumerate() {
            counter(&format!("ModelInput_idle_{i}"), (*idle * 100.0) as i64);
        }
        counter(
            "ModelInput_frameTimeNs",
            i64::try_from(self.average_frame_time.as_nanos()).unwrap_or(i64::MAX),
        );
        counter("ModelInput_numFrames", i64::from(self.num_rendered_frames));
        counter(
            "ModelInput_prevThrottle",
            i64::from(self.previous_throttle_decision.ordinal()),
        );
    }
}

fn counter(name: &str, value: i64) {
    tracing::trace!(target: "adaptive_cpu::counters", counter = name, value);
}
