//! Scheduler and coordination timing parameters.

use serde::Deserialize;

use super::units::Degrees;

/// Tick rates and timing-fault thresholds for the real-time scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period of the high-rate safety interrupt.
    pub safety_period_us: u32,

    /// Period of the control-loop interrupt.
    pub control_period_us: u32,

    /// Control-loop overruns tolerated before a timing fault is reported.
    pub overrun_fault_threshold: u32,

    /// Deadline misses (all tasks) tolerated before a timing fault is reported.
    pub deadline_miss_fault_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            safety_period_us: 100,
            control_period_us: 1_000,
            overrun_fault_threshold: 10,
            deadline_miss_fault_threshold: 100,
        }
    }
}

/// Thresholds used by the multi-motor coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Deviation from the group average that triggers a load-balance nudge.
    #[serde(rename = "load_balance_threshold_degrees")]
    pub load_balance_threshold: Degrees,

    /// Interval between load-balance passes.
    pub load_balance_interval_ms: u32,

    /// Allowed spread of progress fractions during a synchronized move.
    pub sync_tolerance: f32,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            load_balance_threshold: Degrees(1.0),
            load_balance_interval_ms: 10,
            sync_tolerance: 0.05,
        }
    }
}
