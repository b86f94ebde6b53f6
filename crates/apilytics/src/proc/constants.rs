// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Constants for /proc filesystem paths and sampling parameters.

use std::time::Duration;

/// Path to `/proc/stat` file containing CPU time statistics.
///
/// The first line holds the cumulative time, in clock ticks, that all CPUs
/// together spent in each state since boot.
pub const PROC_STAT_PATH: &str = "/proc/stat";

/// Path to `/proc/meminfo` file containing memory statistics in kB.
pub const PROC_MEMINFO_PATH: &str = "/proc/meminfo";

/// Interval between the two `/proc/stat` reads used to compute CPU usage.
///
/// CPU usage only exists over a window of time: at any single instant a core
/// is either fully busy or fully idle. One second gives consistent readings.
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Number of leading `/proc/stat` CPU columns that make up the total:
/// user, nice, system, idle, iowait, irq, softirq and steal.
///
/// The trailing guest and guest_nice columns are already accounted for in
/// user and nice.
pub(crate) const CPU_TIME_COLUMNS: usize = 8;

/// Index of the idle column within the CPU columns.
pub(crate) const IDLE_COLUMN: usize = 3;

/// Index of the iowait column, absent before Linux 2.5.41.
pub(crate) const IOWAIT_COLUMN: usize = 4;

/// `/proc/meminfo` reports kibibytes.
pub(crate) const KIB: u64 = 1024;
