// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-core CPU load from `/proc/stat` deltas.
//!
//! The kernel reports cumulative per-core times since boot:
//!
//! ```text
//! cpu0 user nice system idle iowait irq softirq steal guest guest_nice
//! ```
//!
//! [`CpuLoadReader`] keeps the previous reading as a baseline and turns the
//! difference between two readings into an idle fraction, so the result
//! reflects the last sampling interval rather than the whole uptime.

use crate::filesystem::{read_lines, Filesystem};
use crate::SampleError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Kernel per-CPU time accounting.
pub const PROC_STAT_PATH: &str = "/proc/stat";

/// Clock-tick rate assumed when the platform cannot report one.
const FALLBACK_TICKS_PER_SECOND: u64 = 100;

/// Cumulative idle and total time of one core, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CpuTime {
    /// Time spent idle or waiting on I/O.
    pub idle_time_ms: u64,
    /// Time spent in any state.
    pub total_time_ms: u64,
}

/// Cumulative [`CpuTime`]s of every present core, keyed by core ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CpuTimeSnapshot {
    times: BTreeMap<u32, CpuTime>,
}

impl CpuTimeSnapshot {
    /// Returns the times recorded for `cpu_id`.
    pub fn get(&self, cpu_id: u32) -> Option<&CpuTime> {
        self.times.get(&cpu_id)
    }

    /// Iterates over `(cpu_id, time)` pairs in ascending core order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &CpuTime)> {
        self.times.iter().map(|(&id, t)| (id, t))
    }

    /// Number of cores in the snapshot.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Highest core ID present, if any.
    pub fn max_cpu_id(&self) -> Option<u32> {
        self.times.keys().next_back().copied()
    }
}

impl FromIterator<(u32, CpuTime)> for CpuTimeSnapshot {
    fn from_iter<I: IntoIterator<Item = (u32, CpuTime)>>(iter: I) -> Self {
        Self {
            times: iter.into_iter().collect(),
        }
    }
}

/// Idle fraction of one core over the most recent sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CpuLoad {
    pub cpu_id: u32,
    /// Fraction of the interval the core was idle, in `[0.0, 1.0]`.
    pub idle_time_fraction: f64,
}

/// Converts cumulative `/proc/stat` counters into per-interval loads.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use telemetry::{CpuLoadReader, MemoryFilesystem, PROC_STAT_PATH};
///
/// let fs = MemoryFilesystem::new()
///     .with_file(PROC_STAT_PATH, "cpu0 100 0 0 50 0 0 0 0 0 0\n")
///     .with_file(PROC_STAT_PATH, "cpu0 190 0 0 60 0 0 0 0 0 0\n");
/// let mut reader = CpuLoadReader::with_ticks_per_second(Arc::new(fs), 100);
/// reader.init().unwrap();
///
/// let loads = reader.sample().unwrap();
/// assert_eq!(loads[0].cpu_id, 0);
/// assert!((loads[0].idle_time_fraction - 0.1).abs() < 1e-9);
/// ```
pub struct CpuLoadReader {
    fs: Arc<dyn Filesystem>,
    ticks_per_second: u64,
    previous: CpuTimeSnapshot,
    initialised: bool,
}

impl CpuLoadReader {
    /// Creates a reader using the platform's clock-tick rate.
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self::with_ticks_per_second(fs, clock_ticks_per_second())
    }

    /// Creates a reader with an explicit clock-tick rate.
    pub fn with_ticks_per_second(fs: Arc<dyn Filesystem>, ticks_per_second: u64) -> Self {
        Self {
            fs,
            ticks_per_second: ticks_per_second.max(1),
            previous: CpuTimeSnapshot::default(),
            initialised: false,
        }
    }

    /// Records the baseline reading. Must be called once before [`sample`](Self::sample).
    ///
    /// Work is not done in the constructor because it reads files.
    pub fn init(&mut self) -> Result<(), SampleError> {
        self.previous = self.read_cpu_times()?;
        self.initialised = true;
        tracing::debug!("cpu load baseline: {} cores", self.previous.len());
        Ok(())
    }

    /// Returns the idle fraction of every core since the previous successful call.
    ///
    /// The baseline is replaced only when every core produced a valid load;
    /// on error it is left as it was, so the next call retries against it.
    pub fn sample(&mut self) -> Result<Vec<CpuLoad>, SampleError> {
        if !self.initialised {
            return Err(SampleError::NotInitialised);
        }
        let current = self.read_cpu_times()?;
        if current.is_empty() {
            return Err(SampleError::NoData {
                what: "cpu times",
                path: PROC_STAT_PATH.to_string(),
            });
        }

        let loads = compute_loads(&self.previous, &current)?;
        self.previous = current;
        Ok(loads)
    }

    /// The baseline the next [`sample`](Self::sample) will be compared against.
    pub fn previous_snapshot(&self) -> &CpuTimeSnapshot {
        &self.previous
    }

    /// Whether [`init`](Self::init) has completed.
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    fn read_cpu_times(&self) -> Result<CpuTimeSnapshot, SampleError> {
        let lines = read_lines(self.fs.as_ref(), Path::new(PROC_STAT_PATH))?;
        Ok(lines
            .iter()
            .filter_map(|line| parse_stat_line(line))
            .map(|(cpu_id, idle_ticks, total_ticks)| {
                (
                    cpu_id,
                    CpuTime {
                        idle_time_ms: ticks_to_ms(idle_ticks, self.ticks_per_second),
                        total_time_ms: ticks_to_ms(total_ticks, self.ticks_per_second),
                    },
                )
            })
            .collect())
    }
}

impl std::fmt::Debug for CpuLoadReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuLoadReader")
            .field("ticks_per_second", &self.ticks_per_second)
            .field("initialised", &self.initialised)
            .field("cores", &self.previous.len())
            .finish()
    }
}

/// Differences two snapshots into per-core loads, failing on the first bad core.
fn compute_loads(
    previous: &CpuTimeSnapshot,
    current: &CpuTimeSnapshot,
) -> Result<Vec<CpuLoad>, SampleError> {
    let mut loads = Vec::with_capacity(current.len());
    for (cpu_id, now) in current.iter() {
        let before = previous
            .get(cpu_id)
            .ok_or(SampleError::UnknownCore { cpu_id })?;

        let (idle_delta, total_delta) = match (
            now.idle_time_ms.checked_sub(before.idle_time_ms),
            now.total_time_ms.checked_sub(before.total_time_ms),
        ) {
            (Some(idle), Some(total)) => (idle, total),
            _ => {
                return Err(SampleError::Inconsistent {
                    entity: format!("cpu{cpu_id}"),
                    detail: "cumulative counter went backwards".into(),
                })
            }
        };

        if idle_delta > total_delta {
            return Err(SampleError::Inconsistent {
                entity: format!("cpu{cpu_id}"),
                detail: format!(
                    "idle delta {idle_delta} ms exceeds total delta {total_delta} ms"
                ),
            });
        }
        if total_delta == 0 {
            return Err(SampleError::ZeroInterval { cpu_id });
        }

        loads.push(CpuLoad {
            cpu_id,
            idle_time_fraction: idle_delta as f64 / total_delta as f64,
        });
    }
    Ok(loads)
}

/// Parses a `cpu<N>` line into `(cpu_id, idle_ticks, total_ticks)`.
///
/// The aggregate `cpu ` line, lines of other counters and lines with fewer
/// than ten values are rejected. Extra trailing values are ignored.
fn parse_stat_line(line: &str) -> Option<(u32, u64, u64)> {
    let rest = line.strip_prefix("cpu")?;
    if !rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let mut fields = rest.split_whitespace();
    let cpu_id: u32 = fields.next()?.parse().ok()?;

    // user nice system idle iowait irq softirq steal guest guest_nice
    let mut values = [0u64; 10];
    for value in values.iter_mut() {
        *value = fields.next()?.parse().ok()?;
    }

    let idle = values[3].saturating_add(values[4]);
    let total = values.iter().fold(0u64, |acc, v| acc.saturating_add(*v));
    Some((cpu_id, idle, total))
}

fn ticks_to_ms(ticks: u64, ticks_per_second: u64) -> u64 {
    (u128::from(ticks) * 1000 / u128::from(ticks_per_second)) as u64
}

/// The kernel's `USER_HZ`, used for all `/proc/stat` times.
pub fn clock_ticks_per_second() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions and only reads a constant.
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if ticks > 0 {
            return ticks as u64;
        }
    }
    FALLBACK_TICKS_PER_SECOND
}
