//! Memory statistics derived from JVM unified GC logs.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResultParseError;

/// Sentinel for a statistic that could not be computed.
pub const UNAVAILABLE: f64 = -1.0;

/// Runtime and garbage-collection figures of one algorithm run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// JVM uptime at the last log entry, in seconds.
    pub total_runtime: f64,
    /// Percentage of runtime not spent in GC pauses.
    pub throughput: f64,
    /// Memory reclaimed by all collections, in KiB.
    pub total_allocated_bytes: i64,
    /// Sum of all pause durations, in seconds.
    pub total_pause_time: f64,
    /// Mean pause duration, in seconds.
    pub avg_pause_time: f64,
}

impl MemoryStats {
    pub fn unavailable() -> Self {
        Self {
            total_runtime: UNAVAILABLE,
            throughput: UNAVAILABLE,
            total_allocated_bytes: -1,
            total_pause_time: UNAVAILABLE,
            avg_pause_time: UNAVAILABLE,
        }
    }

    pub fn is_available(&self) -> bool {
        self.total_runtime >= 0.0
    }
}

impl Default for MemoryStats {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Parses `-Xlog:gc` output such as
/// `[0.512s][info][gc] GC(3) Pause Young (Normal) (G1 Evacuation Pause) 24M->3M(256M) 2.345ms`.
pub struct GcLogAnalyzer {
    uptime: Option<Regex>,
    pause: Option<Regex>,
}

impl GcLogAnalyzer {
    pub fn new() -> Self {
        Self {
            uptime: Regex::new(r"^\[(\d+(?:\.\d+)?)s\]").ok(),
            pause: Regex::new(r"Pause.*?(\d+)([KMG])->(\d+)([KMG])\(\d+[KMG]\)\s+(\d+(?:\.\d+)?)ms")
                .ok(),
        }
    }

    /// Reads and parses the log at `path`.
    pub async fn parse_file(&self, path: &Path) -> Result<MemoryStats, ResultParseError> {
        if !path.is_file() {
            return Err(ResultParseError::MissingOutput(path.to_path_buf()));
        }
        let text = tokio::fs::read_to_string(path).await?;
        self.parse(&text)
            .ok_or_else(|| ResultParseError::InsufficientData(path.to_path_buf()))
    }

    /// Parses log text. Returns `None` when there are three lines or fewer
    /// or no pause events.
    pub fn parse(&self, text: &str) -> Option<MemoryStats> {
        let (uptime, pause) = (self.uptime.as_ref()?, self.pause.as_ref()?);

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() <= 3 {
            return None;
        }

        let mut runtime = 0.0_f64;
        let mut pauses = 0usize;
        let mut pause_total = 0.0_f64;
        let mut freed_kib = 0i64;

        for line in &lines {
            if let Some(seconds) = uptime
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
            {
                runtime = runtime.max(seconds);
            }
            let Some(caps) = pause.captures(line) else {
                continue;
            };
            let before = to_kib(&caps[1], &caps[2]);
            let after = to_kib(&caps[3], &caps[4]);
            let millis = caps[5].parse::<f64>().unwrap_or(0.0);
            if let (Some(before), Some(after)) = (before, after) {
                freed_kib += (before - after).max(0);
            }
            pause_total += millis / 1000.0;
            pauses += 1;
        }

        if pauses == 0 {
            return None;
        }
        debug!("GC log: {} pauses over {:.3}s", pauses, runtime);

        let throughput = if runtime > 0.0 {
            100.0 * (runtime - pause_total) / runtime
        } else {
            UNAVAILABLE
        };
        Some(MemoryStats {
            total_runtime: runtime,
            throughput,
            total_allocated_bytes: freed_kib,
            total_pause_time: pause_total,
            avg_pause_time: pause_total / pauses as f64,
        })
    }
}

impl Default for GcLogAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_kib(amount: &str, unit: &str) -> Option<i64> {
    let amount: i64 = amount.parse().ok()?;
    let factor = match unit {
        "K" => 1,
        "M" => 1024,
        "G" => 1024 * 1024,
        _ => return None,
    };
    Some(amount * factor)
}
