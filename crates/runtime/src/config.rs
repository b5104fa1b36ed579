// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Adaptive CPU tunables read from a key/value property source.
//!
//! # Properties
//! ```toml
//! "debug.adaptivecpu.iteration_sleep_duration_ms" = 25
//! "debug.adaptivecpu.hint_timeout_ms" = 2000
//! "debug.adaptivecpu.random_throttle_decision_percent" = 10
//! "debug.adaptivecpu.enabled_hint_timeout_ms" = 7200000
//! ```
//!
//! Loading never fails. A missing or malformed value falls back to the
//! field's default; a malformed one is also logged.

use crate::PipelineError;
use serde::Serializer;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const ITERATION_SLEEP_DURATION_PROPERTY: &str = "debug.adaptivecpu.iteration_sleep_duration_ms";
pub const HINT_TIMEOUT_PROPERTY: &str = "debug.adaptivecpu.hint_timeout_ms";
/// Percent on the property side (0..=100), probability in memory (0..=1).
pub const RANDOM_THROTTLE_DECISION_PERCENT_PROPERTY: &str =
    "debug.adaptivecpu.random_throttle_decision_percent";
pub const ENABLED_HINT_TIMEOUT_PROPERTY: &str = "debug.adaptivecpu.enabled_hint_timeout_ms";

/// Lower bound on the iteration sleep.
pub const MIN_ITERATION_SLEEP_DURATION: Duration = Duration::from_millis(20);

/// A read-only string key/value store.
pub trait PropertySource {
    /// Returns the raw value of `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

impl PropertySource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Properties from a TOML document.
///
/// Quoted top-level keys (`"debug.adaptivecpu.hint_timeout_ms" = 5`) and
/// dotted keys (`debug.adaptivecpu.hint_timeout_ms = 5`) are equivalent;
/// nested tables are flattened with `.` separators.
#[derive(Debug, Clone, Default)]
pub struct TomlProperties {
    values: HashMap<String, String>,
}

impl TomlProperties {
    /// Loads properties from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read properties '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses properties from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        let table: toml::Table = toml::from_str(toml_str)
            .map_err(|e| PipelineError::ConfigError(format!("TOML parse error: {e}")))?;
        let mut values = HashMap::new();
        flatten("", &table, &mut values);
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut HashMap<String, String>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(inner) => flatten(&key, inner, out),
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
}

impl PropertySource for TomlProperties {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Properties from the process environment.
///
/// `debug.adaptivecpu.hint_timeout_ms` is looked up as
/// `DEBUG_ADAPTIVECPU_HINT_TIMEOUT_MS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProperties;

impl EnvProperties {
    /// The environment variable a property key maps to.
    pub fn variable_name(key: &str) -> String {
        key.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

impl PropertySource for EnvProperties {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(Self::variable_name(key)).ok()
    }
}

/// Earlier sources take precedence; the first source that has a key wins.
impl<A: PropertySource, B: PropertySource> PropertySource for (A, B) {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).or_else(|| self.1.get(key))
    }
}

/// Immutable tunables for the adaptive CPU loop.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct AdaptiveCpuConfig {
    /// Sleep between iterations. Never below [`MIN_ITERATION_SLEEP_DURATION`].
    #[serde(rename = "iteration_sleep_duration_ms", serialize_with = "as_millis")]
    pub iteration_sleep_duration: Duration,
    /// Lifetime of an issued hint.
    #[serde(rename = "hint_timeout_ms", serialize_with = "as_millis")]
    pub hint_timeout: Duration,
    /// Chance in `[0, 1]` of replacing the model's decision with a random one.
    pub random_throttle_decision_probability: f64,
    /// How long adaptive CPU stays enabled after the enabling hint.
    #[serde(rename = "enabled_hint_timeout_ms", serialize_with = "as_millis")]
    pub enabled_hint_timeout: Duration,
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

impl Default for AdaptiveCpuConfig {
    fn default() -> Self {
        Self {
            iteration_sleep_duration: Duration::from_millis(1000),
            hint_timeout: Duration::from_millis(2000),
            random_throttle_decision_probability: 0.0,
            enabled_hint_timeout: Duration::from_secs(120 * 60),
        }
    }
}

impl AdaptiveCpuConfig {
    /// Reads every tunable from `properties`, substituting defaults for
    /// missing or invalid values.
    pub fn load(properties: &dyn PropertySource) -> Self {
        let default = Self::default();

        let iteration_sleep_duration = read_millis(
            properties,
            ITERATION_SLEEP_DURATION_PROPERTY,
            default.iteration_sleep_duration,
        )
        .max(MIN_ITERATION_SLEEP_DURATION);

        let hint_timeout = read_millis(properties, HINT_TIMEOUT_PROPERTY, default.hint_timeout);

        let mut random_throttle_decision_probability = read_u32(
            properties,
            RANDOM_THROTTLE_DECISION_PERCENT_PROPERTY,
        )
        .map_or(default.random_throttle_decision_probability, |percent| {
            f64::from(percent) / 100.0
        });
        if random_throttle_decision_probability > 1.0 {
            tracing::warn!(
                "received bad value for {}: {}",
                RANDOM_THROTTLE_DECISION_PERCENT_PROPERTY,
                random_throttle_decision_probability
            );
            random_throttle_decision_probability = default.random_throttle_decision_probability;
        }

        let enabled_hint_timeout = read_millis(
            properties,
            ENABLED_HINT_TIMEOUT_PROPERTY,
            default.enabled_hint_timeout,
        );

        Self {
            iteration_sleep_duration,
            hint_timeout,
            random_throttle_decision_probability,
            enabled_hint_timeout,
        }
    }
}

impl std::fmt::Display for AdaptiveCpuConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AdaptiveCpuConfig(iteration_sleep_duration={}ms, hint_timeout={}ms, \
             random_throttle_decision_probability={}, enabled_hint_timeout={}ms)",
            self.iteration_sleep_duration.as_millis(),
            self.hint_timeout.as_millis(),
            self.random_throttle_decision_probability,
            self.enabled_hint_timeout.as_millis(),
        )
    }
}

/// Parses `key` as an unsigned 32-bit integer. Empty counts as unset.
fn read_u32(properties: &dyn PropertySource, key: &str) -> Option<u32> {
    let raw = properties.get(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("ignoring {key}='{raw}': {e}");
            None
        }
    }
}

fn read_millis(properties: &dyn PropertySource, key: &str, default: Duration) -> Duration {
    read_u32(properties, key).map_or(default, |ms| Duration::from_millis(u64::from(ms)))
}
