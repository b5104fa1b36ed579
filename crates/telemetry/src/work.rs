// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Frame work-duration aggregation.
//!
//! The rendering side reports how long each frame's work took together
//! with the frame's target duration. Reports arrive from arbitrary threads;
//! the sampling loop drains them once per iteration into a
//! [`WorkDurationFeatures`] summary.
//!
//! Durations are normalised against a 60 FPS frame, so a frame that used
//! 80 % of its own target counts as 80 % of 16.67 ms regardless of the
//! refresh rate it was rendered at.

use std::sync::Mutex;
use std::time::Duration;

/// A 60 FPS frame.
pub const NORMAL_TARGET_DURATION: Duration = Duration::from_nanos(16_666_666);

/// Durations longer than this many normal frames are discarded as outliers.
const MAX_DURATION_IN_FRAMES: u32 = 600;

/// One frame's measured work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct WorkDuration {
    /// When the work started, in nanoseconds on the reporter's clock.
    pub timestamp_nanos: i64,
    /// How long the work took, in nanoseconds.
    pub duration_nanos: i64,
}

/// Summary of the work durations reported since the previous drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkDurationFeatures {
    /// Mean normalised duration (zero when nothing was reported).
    pub average_duration: Duration,
    /// Longest normalised duration.
    pub max_duration: Duration,
    /// Frames whose raw duration exceeded their own target.
    pub num_missed_deadlines: u32,
    /// Frames counted.
    pub num_durations: u32,
}

impl WorkDurationFeatures {
    /// Frame count as stored in a feature vector, saturating at `u16::MAX`.
    pub fn num_rendered_frames(&self) -> u16 {
        u16::try_from(self.num_durations).unwrap_or(u16::MAX)
    }
}

#[derive(Debug)]
struct WorkDurationBatch {
    durations: Vec<WorkDuration>,
    target: Duration,
}

/// Thread-safe collector of reported work durations.
#[derive(Debug, Default)]
pub struct WorkDurationProcessor {
    batches: Mutex<Vec<WorkDurationBatch>>,
}

impl WorkDurationProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a batch of durations rendered against `target`. Returns immediately.
    pub fn report(&self, durations: &[WorkDuration], target: Duration) {
        tracing::trace!(
            "received {} work durations with target {}ns",
            durations.len(),
            target.as_nanos()
        );
        let mut batches = self.batches.lock().unwrap_or_else(|p| p.into_inner());
        batches.push(WorkDurationBatch {
            durations: durations.to_vec(),
            target,
        });
    }

    /// Whether any batch is waiting to be drained.
    pub fn has_work_durations(&self) -> bool {
        let batches = self.batches.lock().unwrap_or_else(|p| p.into_inner());
        !batches.is_empty()
    }

    /// Atomically drains all queued batches and summarises them.
    pub fn take_features(&self) -> WorkDurationFeatures {
        let batches = {
            let mut guard = self.batches.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut *guard)
        };
        summarise(&batches)
    }
}

fn summarise(batches: &[WorkDurationBatch]) -> WorkDurationFeatures {
    let normal_ns = NORMAL_TARGET_DURATION.as_nanos();
    let max_ns = (NORMAL_TARGET_DURATION * MAX_DURATION_IN_FRAMES).as_nanos();

    let mut sum_ns: u128 = 0;
    let mut longest_ns: u128 = 0;
    let mut num_missed_deadlines = 0u32;
    let mut num_durations = 0u32;

    for batch in batches {
        let target_ns = batch.target.as_nanos();
        if target_ns == 0 {
            tracing::debug!("skipping work-duration batch with zero target");
            continue;
        }
        for work in &batch.durations {
            let Ok(duration_ns) = u128::try_from(work.duration_nanos) else {
                continue;
            };
            if duration_ns > max_ns {
                continue;
            }
            let normalised_ns = duration_ns * normal_ns / target_ns;
            sum_ns += normalised_ns;
            longest_ns = longest_ns.max(normalised_ns);
            if duration_ns > target_ns {
                num_missed_deadlines += 1;
            }
            num_durations += 1;
        }
    }

    let average_ns = if num_durations == 0 {
        0
    } else {
        sum_ns / u128::from(num_durations)
    };
    WorkDurationFeatures {
        average_duration: nanos(average_ns),
        max_duration: nanos(longest_ns),
        num_missed_deadlines,
        num_durations,
    }
}

fn nanos(ns: u128) -> Duration {
    Duration::from_nanos(u64::try_from(ns).unwrap_or(u64::MAX))
}
