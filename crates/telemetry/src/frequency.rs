// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Average CPU frequency per cpufreq policy.
//!
//! Each policy (a cluster of cores sharing one clock) exposes
//! `/sys/devices/system/cpu/cpufreq/policy<N>/stats/time_in_state`, with one
//! `<frequency kHz> <time in 10 ms units>` line per frequency step. The
//! time-weighted average over the delta between two readings gives the
//! frequency the cluster actually ran at during the interval.

use crate::filesystem::{read_lines, Filesystem};
use crate::SampleError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Root of the cpufreq policy directories.
pub const CPUFREQ_PATH: &str = "/sys/devices/system/cpu/cpufreq";

/// Sanity bound on frequency steps per policy.
const MAX_FREQUENCIES_PER_POLICY: usize = 500;

/// Unit of the `time_in_state` counters.
const TIME_IN_STATE_UNIT_MS: u64 = 10;

/// Cumulative time spent at each frequency (kHz), per policy ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct PolicyFrequencySnapshot {
    policies: BTreeMap<u32, BTreeMap<u64, Duration>>,
}

impl PolicyFrequencySnapshot {
    /// Returns the frequency-to-time table of `policy_id`.
    pub fn get(&self, policy_id: u32) -> Option<&BTreeMap<u64, Duration>> {
        self.policies.get(&policy_id)
    }

    /// Iterates over policies in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &BTreeMap<u64, Duration>)> {
        self.policies.iter().map(|(&id, f)| (id, f))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Average frequency of one policy over the most recent sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CpuPolicyFrequency {
    pub policy_id: u32,
    pub average_frequency_hz: f64,
}

/// Converts cumulative `time_in_state` tables into per-interval averages.
pub struct CpuFrequencyReader {
    fs: Arc<dyn Filesystem>,
    root: PathBuf,
    policy_ids: Vec<u32>,
    previous: PolicyFrequencySnapshot,
    initialised: bool,
}

impl CpuFrequencyReader {
    /// Creates a reader for the standard cpufreq directory.
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self::with_root(fs, CPUFREQ_PATH)
    }

    /// Creates a reader rooted at a custom cpufreq directory.
    pub fn with_root(fs: Arc<dyn Filesystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            policy_ids: Vec::new(),
            previous: PolicyFrequencySnapshot::default(),
            initialised: false,
        }
    }

    /// Discovers the policies and records the baseline reading.
    pub fn init(&mut self) -> Result<(), SampleError> {
        let policy_ids = self.read_policy_ids()?;
        if policy_ids.is_empty() {
            return Err(SampleError::NoData {
                what: "cpufreq policies",
                path: self.root.display().to_string(),
            });
        }
        self.policy_ids = policy_ids;
        self.previous = self.read_policy_frequencies()?;
        self.initialised = true;
        tracing::debug!("cpufreq baseline: policies {:?}", self.policy_ids);
        Ok(())
    }

    /// Returns the average frequency of every policy since the previous
    /// successful call, sorted by policy ID.
    ///
    /// A policy with no elapsed time reports 0 Hz. The baseline is replaced
    /// only on success.
    pub fn sample(&mut self) -> Result<Vec<CpuPolicyFrequency>, SampleError> {
        if !self.initialised {
            return Err(SampleError::NotInitialised);
        }
        let current = self.read_policy_frequencies()?;

        let mut result = Vec::with_capacity(current.len());
        for (policy_id, frequencies) in current.iter() {
            let previous = self
                .previous
                .get(policy_id)
                .ok_or(SampleError::UnknownPolicy { policy_id })?;

            let mut weighted_sum_khz_ms: u128 = 0;
            let mut time_sum_ms: u128 = 0;
            for (&frequency_khz, &time) in frequencies {
                let before = previous.get(&frequency_khz).ok_or(SampleError::UnknownFrequency {
                    policy_id,
                    frequency_khz,
                })?;
                let recent = time.checked_sub(*before).ok_or_else(|| SampleError::Inconsistent {
                    entity: format!("policy{policy_id}"),
                    detail: format!("time at {frequency_khz} kHz went backwards"),
                })?;
                weighted_sum_khz_ms += u128::from(frequency_khz) * recent.as_millis();
                time_sum_ms += recent.as_millis();
            }

            let average_frequency_hz = if time_sum_ms == 0 {
                0.0
            } else {
                weighted_sum_khz_ms as f64 / time_sum_ms as f64 * 1000.0
            };
            result.push(CpuPolicyFrequency {
                policy_id,
                average_frequency_hz,
            });
        }

        self.previous = current;
        Ok(result)
    }

    /// Policy IDs discovered by [`init`](Self::init), ascending.
    pub fn policy_ids(&self) -> &[u32] {
        &self.policy_ids
    }

    /// The baseline the next [`sample`](Self::sample) will be compared against.
    pub fn previous_snapshot(&self) -> &PolicyFrequencySnapshot {
        &self.previous
    }

    fn read_policy_ids(&self) -> Result<Vec<u32>, SampleError> {
        let mut ids: Vec<u32> = self
            .fs
            .list_directory(&self.root)?
            .iter()
            .filter_map(|entry| entry.strip_prefix("policy"))
            .filter_map(|id| id.parse().ok())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn read_policy_frequencies(&self) -> Result<PolicyFrequencySnapshot, SampleError> {
        let mut policies = BTreeMap::new();
        for &policy_id in &self.policy_ids {
            let path = self
                .root
                .join(format!("policy{policy_id}"))
                .join("stats")
                .join("time_in_state");
            let frequencies = read_time_in_state(self.fs.as_ref(), &path)?;
            if frequencies.len() > MAX_FREQUENCIES_PER_POLICY {
                return Err(SampleError::TooManyFrequencies {
                    policy_id,
                    count: frequencies.len(),
                    limit: MAX_FREQUENCIES_PER_POLICY,
                });
            }
            policies.insert(policy_id, frequencies);
        }
        Ok(PolicyFrequencySnapshot { policies })
    }
}

impl std::fmt::Debug for CpuFrequencyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuFrequencyReader")
            .field("root", &self.root)
            .field("policy_ids", &self.policy_ids)
            .field("initialised", &self.initialised)
            .finish()
    }
}

fn read_time_in_state(
    fs: &dyn Filesystem,
    path: &Path,
) -> Result<BTreeMap<u64, Duration>, SampleError> {
    let mut frequencies = BTreeMap::new();
    for line in read_lines(fs, path)? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parse_error = || SampleError::ParseError {
            path: path.display().to_string(),
            detail: format!("expected '<kHz> <10ms units>', got '{line}'"),
        };
        let mut fields = line.split_whitespace();
        let frequency_khz: u64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(parse_error)?;
        let units: u64 = fields
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(parse_error)?;
        if fields.next().is_some() {
            return Err(parse_error());
        }
        frequencies.insert(
            frequency_khz,
            Duration::from_millis(units.saturating_mul(TIME_IN_STATE_UNIT_MS)),
        );
    }
    Ok(frequencies)
}
