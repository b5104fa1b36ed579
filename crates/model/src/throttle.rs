// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Discrete throttle levels produced by inference.

use std::fmt;

/// How aggressively the orchestrator should constrain CPU performance.
///
/// Ordered by severity: `NoThrottle < Throttle50 < … < Throttle90`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ThrottleDecision {
    #[default]
    #[serde(rename = "NO_THROTTLE")]
    NoThrottle = 0,
    #[serde(rename = "THROTTLE_50")]
    Throttle50 = 1,
    #[serde(rename = "THROTTLE_60")]
    Throttle60 = 2,
    #[serde(rename = "THROTTLE_70")]
    Throttle70 = 3,
    #[serde(rename = "THROTTLE_80")]
    Throttle80 = 4,
    #[serde(rename = "THROTTLE_90")]
    Throttle90 = 5,
}

impl ThrottleDecision {
    /// Every level, least to most severe.
    pub const ALL: [ThrottleDecision; 6] = [
        ThrottleDecision::NoThrottle,
        ThrottleDecision::Throttle50,
        ThrottleDecision::Throttle60,
        ThrottleDecision::Throttle70,
        ThrottleDecision::Throttle80,
        ThrottleDecision::Throttle90,
    ];

    /// Position in [`ALL`](Self::ALL).
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    /// The hint name this level maps to.
    pub fn as_str(self) -> &'static str {
        match self {
            ThrottleDecision::NoThrottle => "NO_THROTTLE",
            ThrottleDecision::Throttle50 => "THROTTLE_50",
            ThrottleDecision::Throttle60 => "THROTTLE_60",
            ThrottleDecision::Throttle70 => "THROTTLE_70",
            ThrottleDecision::Throttle80 => "THROTTLE_80",
            ThrottleDecision::Throttle90 => "THROTTLE_90",
        }
    }

    /// Performance cap in percent, or `None` when unthrottled.
    pub fn cap_percent(self) -> Option<u8> {
        match self {
            ThrottleDecision::NoThrottle => None,
            ThrottleDecision::Throttle50 => Some(50),
            ThrottleDecision::Throttle60 => Some(60),
            ThrottleDecision::Throttle70 => Some(70),
            ThrottleDecision::Throttle80 => Some(80),
            ThrottleDecision::Throttle90 => Some(90),
        }
    }
}

impl fmt::Display for ThrottleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ThrottleDecision {
    type Err = String;

    /// Parses a hint name (`THROTTLE_70`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown throttle decision '{s}'; \
                     expected one of NO_THROTTLE, THROTTLE_50..THROTTLE_90"
                )
            })
    }
}
