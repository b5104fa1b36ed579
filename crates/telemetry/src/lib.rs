// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # telemetry
//!
//! Samples the raw signals the adaptive CPU model consumes.
//!
//! # Sources
//! - **CPU load**: per-core idle fraction from `/proc/stat` deltas.
//! - **CPU frequency**: per-policy average frequency from cpufreq
//!   `time_in_state` deltas.
//! - **Frame work durations**: reported by the renderer, aggregated per
//!   iteration.
//!
//! Both counter readers are stateful: `init()` records a baseline, every
//! successful `sample()` reports the interval since the previous one and
//! moves the baseline forward. A failed `sample()` never touches the
//! baseline.
//!
//! All file access goes through the [`Filesystem`] capability so tests can
//! script counter contents with [`MemoryFilesystem`].

mod error;
mod filesystem;
mod frequency;
mod load;
mod work;

pub use error::SampleError;
pub use filesystem::{Filesystem, MemoryFilesystem, RealFilesystem};
pub use frequency::{CpuFrequencyReader, CpuPolicyFrequency, PolicyFrequencySnapshot, CPUFREQ_PATH};
pub use load::{
    clock_ticks_per_second, CpuLoad, CpuLoadReader, CpuTime, CpuTimeSnapshot, PROC_STAT_PATH,
};
pub use work::{WorkDuration, WorkDurationFeatures, WorkDurationProcessor, NORMAL_TARGET_DURATION};
