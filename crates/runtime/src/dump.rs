// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Plain-text diagnostics of the reader baselines.

use std::fmt::Write;
use telemetry::{CpuTimeSnapshot, PolicyFrequencySnapshot};

/// Renders the baselines the next iteration will be compared against.
pub fn render(
    enabled: bool,
    frequencies: &PolicyFrequencySnapshot,
    cpu_times: &CpuTimeSnapshot,
) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_block(&mut out, enabled, frequencies, cpu_times);
    out
}

fn write_block(
    out: &mut String,
    enabled: bool,
    frequencies: &PolicyFrequencySnapshot,
    cpu_times: &CpuTimeSnapshot,
) -> std::fmt::Result {
    writeln!(out, "========== Begin Adaptive CPU stats ==========")?;
    writeln!(out, "Enabled: {enabled}")?;
    writeln!(out, "CPU frequencies per policy:")?;
    for (policy_id, table) in frequencies.iter() {
        writeln!(out, "- Policy={policy_id}")?;
        for (frequency_khz, time) in table {
            writeln!(
                out,
                "  - frequency={}Hz, time={}ms",
                u128::from(*frequency_khz) * 1000,
                time.as_millis()
            )?;
        }
    }
    writeln!(out, "CPU loads:")?;
    for (cpu_id, time) in cpu_times.iter() {
        writeln!(
            out,
            "- CPU={cpu_id}, idleTime={}ms, totalTime={}ms",
            time.idle_time_ms, time.total_time_ms
        )?;
    }
    writeln!(out, "==========  End Adaptive CPU stats  ==========")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use telemetry::{CpuFrequencyReader, CpuTime, MemoryFilesystem, CPUFREQ_PATH};

    #[test]
    fn test_empty_block() {
        let text = render(false, &PolicyFrequencySnapshot::default(), &CpuTimeSnapshot::default());
        assert_eq!(
            text,
            "========== Begin Adaptive CPU stats ==========\n\
             Enabled: false\n\
             CPU frequencies per policy:\n\
             CPU loads:\n\
             ==========  End Adaptive CPU stats  ==========\n"
        );
    }

    #[test]
    fn test_lists_policies_and_cores() {
        let fs = MemoryFilesystem::new().with_file(
            format!("{CPUFREQ_PATH}/policy4/stats/time_in_state"),
            "500000 3\n900000 7\n",
        );
        let mut reader = CpuFrequencyReader::new(Arc::new(fs));
        reader.init().unwrap();

        let times: CpuTimeSnapshot = [
            (1, CpuTime {
                idle_time_ms: 20,
                total_time_ms: 90,
            }),
            (0, CpuTime {
                idle_time_ms: 10,
                total_time_ms: 80,
            }),
        ]
        .into_iter()
        .collect();

        let text = render(true, reader.previous_snapshot(), &times);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[1..9],
            &[
                "Enabled: true",
                "CPU frequencies per policy:",
                "- Policy=4",
                "  - frequency=500000000Hz, time=30ms",
                "  - frequency=900000000Hz, time=70ms",
                "CPU loads:",
                "- CPU=0, idleTime=10ms, totalTime=80ms",
                "- CPU=1, idleTime=20ms, totalTime=90ms",
            ]
        );
    }
}
