// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! /proc filesystem parsing for host CPU and memory usage.
//!
//! Every function here degrades to "unknown" instead of failing: a counter
//! that cannot be read simply leaves its field out of the reported event.
//! Only Linux exposes these counters; on every other platform the sampler
//! returns unknown without touching the filesystem.
//!
//! # /proc/stat
//!
//! ```text
//! cpu  27133 0 33621 13668027 1459 0 508 10 100 100
//! cpu0 7260 0 7391 3420134 484 0 80 0 0 0
//! ```
//!
//! Only the aggregate `cpu` line is used. CPU usage over a window is
//! `1 - Δidle / Δtotal`, where idle includes iowait, the same way the kernel
//! accounts idle time in `kernel/sched/cputime.c`.
//!
//! # /proc/meminfo
//!
//! ```text
//! MemTotal:        4028788 kB
//! MemFree:          789940 kB
//! MemAvailable:    3281764 kB
//! ```
//!
//! Used memory is `MemTotal - MemAvailable`. `MemAvailable` only exists since
//! Linux 3.14, so the total may be known while the usage is not.

pub mod constants;

use std::fs::{self, File};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use constants::{CPU_TIME_COLUMNS, IDLE_COLUMN, IOWAIT_COLUMN, KIB};
use regex::Regex;
use tracing::debug;

use crate::config::Config;

/// Cumulative CPU time counters, in clock ticks.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CpuTimes {
    /// idle + iowait
    pub idle: u64,
    pub total: u64,
}

/// Host memory figures in bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: Option<u64>,
    pub total: Option<u64>,
}

/// Host resource usage attached to one event.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SystemMetrics {
    /// Ratio in `[0, 1]`
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<u64>,
    pub memory_total: Option<u64>,
}

/// Reads host CPU and memory usage from kernel counters.
#[derive(Clone, Debug)]
pub struct SystemSampler {
    stat_path: PathBuf,
    meminfo_path: PathBuf,
    cpu_window: Duration,
    platform_supported: bool,
}

impl SystemSampler {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stat_path: config.proc_stat_path.clone(),
            meminfo_path: config.proc_meminfo_path.clone(),
            cpu_window: config.cpu_sample_window,
            platform_supported: cfg!(target_os = "linux"),
        }
    }

    /// Samples memory, then CPU usage.
    ///
    /// Takes at least the configured CPU window to complete on Linux.
    pub async fn sample(&self) -> SystemMetrics {
        let memory = self.sample_memory_usage();
        let cpu_usage = self.sample_cpu_usage().await;

        SystemMetrics {
            cpu_usage,
            memory_usage: memory.used,
            memory_total: memory.total,
        }
    }

    /// CPU usage of the whole host over the sampling window, between 0 and 1.
    ///
    /// `None` on unsupported platforms or when `/proc/stat` can't be read.
    pub async fn sample_cpu_usage(&self) -> Option<f64> {
        if !self.platform_supported {
            return None;
        }

        let start = self.read_cpu_times()?;
        tokio::time::sleep(self.cpu_window).await;
        let end = self.read_cpu_times()?;

        Some(cpu_usage_between(start, end))
    }

    /// Used and total host memory in bytes.
    pub fn sample_memory_usage(&self) -> MemoryUsage {
        if !self.platform_supported {
            return MemoryUsage::default();
        }

        match fs::read_to_string(&self.meminfo_path) {
            Ok(meminfo) => parse_meminfo(&meminfo),
            Err(e) => {
                debug!("Could not read {}: {e}", self.meminfo_path.display());
                MemoryUsage::default()
            }
        }
    }

    fn read_cpu_times(&self) -> Option<CpuTimes> {
        read_cpu_times_from_path(&self.stat_path)
            .map_err(|e| debug!("Could not read CPU times from {}: {e}", self.stat_path.display()))
            .ok()
    }
}

/// Reads the aggregate CPU counters from the first line of a `/proc/stat` file.
///
/// # Errors
///
/// Fails when the file can't be read, is empty, has fewer than four CPU
/// columns or holds a non numeric column.
pub fn read_cpu_times_from_path(path: &Path) -> Result<CpuTimes, io::Error> {
    let file = File::open(path)?;
    let mut first_line = String::new();
    io::BufReader::new(file).read_line(&mut first_line)?;
    parse_cpu_times(&first_line)
}

fn parse_cpu_times(line: &str) -> Result<CpuTimes, io::Error> {
    let mut values = line.split_whitespace();

    // Skip the `cpu` label
    values.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "Missing aggregate CPU line")
    })?;

    let times = values
        .take(CPU_TIME_COLUMNS)
        .map(|value| {
            value.parse::<u64>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Failed to parse CPU time {value:?}: {e}"),
                )
            })
        })
        .collect::<Result<Vec<u64>, io::Error>>()?;

    let Some(&idle) = times.get(IDLE_COLUMN) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Expected at least {} CPU columns, got {}", IDLE_COLUMN + 1, times.len()),
        ));
    };
    let iowait = times.get(IOWAIT_COLUMN).copied().unwrap_or(0);

    Ok(CpuTimes {
        idle: idle + iowait,
        total: times.iter().sum(),
    })
}

/// CPU usage between two counter snapshots: `1 - Δidle / Δtotal`.
///
/// Counters that did not advance yield `0.0`.
pub fn cpu_usage_between(start: CpuTimes, end: CpuTimes) -> f64 {
    let total_delta = end.total.saturating_sub(start.total);
    if total_delta == 0 {
        return 0.0;
    }
    let idle_delta = end.idle.saturating_sub(start.idle);

    (1.0 - idle_delta as f64 / total_delta as f64).clamp(0.0, 1.0)
}

/// Extracts used and total memory, in bytes, from `/proc/meminfo` contents.
pub fn parse_meminfo(meminfo: &str) -> MemoryUsage {
    static MEM_TOTAL: OnceLock<Option<Regex>> = OnceLock::new();
    static MEM_AVAILABLE: OnceLock<Option<Regex>> = OnceLock::new();

    let total = find_kib(&MEM_TOTAL, r"MemTotal:\s*(\d+)", meminfo);
    let Some(total) = total else {
        return MemoryUsage::default();
    };

    let used = find_kib(&MEM_AVAILABLE, r"MemAvailable:\s*(\d+)", meminfo)
        .map(|available| total.saturating_sub(available));

    MemoryUsage {
        used,
        total: Some(total),
    }
}

fn find_kib(cell: &OnceLock<Option<Regex>>, pattern: &str, haystack: &str) -> Option<u64> {
    let regex = cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()?;
    regex
        .captures(haystack)?
        .get(1)?
        .as_str()
        .parse::<u64>()
        .ok()?
        .checked_mul(KIB)
}
