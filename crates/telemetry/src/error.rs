// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for telemetry sampling.

/// Errors that can occur while reading or differencing kernel counters.
///
/// Every sampling failure leaves the reader's baseline untouched, so the
/// caller can simply retry on the next iteration.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Failed to open or read a sysfs or procfs file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// The expected path does not exist on this device.
    #[error("path not found: {path}")]
    NotAvailable { path: String },

    /// A line in a counter file could not be parsed.
    #[error("failed to parse value from {path}: {detail}")]
    ParseError { path: String, detail: String },

    /// `sample()` was called before `init()` recorded a baseline.
    #[error("reader used before init() recorded a baseline")]
    NotInitialised,

    /// The counter source contained no usable entries.
    #[error("no {what} found in {path}")]
    NoData { what: &'static str, path: String },

    /// A core is present now but was missing from the previous sample.
    #[error("cpu{cpu_id} is missing from the previous sample")]
    UnknownCore { cpu_id: u32 },

    /// Counters moved in an impossible direction between two samples.
    #[error("inconsistent counters for {entity}: {detail}")]
    Inconsistent { entity: String, detail: String },

    /// Two samples were taken within the same clock tick.
    #[error("no time elapsed on cpu{cpu_id} since the previous sample")]
    ZeroInterval { cpu_id: u32 },

    /// A frequency policy is present now but was missing from the previous sample.
    #[error("policy{policy_id} is missing from the previous sample")]
    UnknownPolicy { policy_id: u32 },

    /// A frequency step is present now but was missing from the previous sample.
    #[error("frequency {frequency_khz} kHz of policy{policy_id} is missing from the previous sample")]
    UnknownFrequency { policy_id: u32, frequency_khz: u64 },

    /// A policy reported more frequency steps than any real device has.
    #[error("policy{policy_id} reports {count} frequencies (limit {limit})")]
    TooManyFrequencies {
        policy_id: u32,
        count: usize,
        limit: usize,
    },
}
