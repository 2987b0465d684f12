//! Task records and the task-body abstraction.

use heapless::String;

use crate::error::Result;

/// Maximum length of a task name.
pub const TASK_NAME_LEN: usize = 16;

/// Task identifier, assigned in creation order.
pub type TaskId = u8;

/// Priority tier. Each tier is driven by a fixed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskPriority {
    /// Safety timer.
    Critical,
    /// Control timer, first.
    High,
    /// Control timer, after the high tier.
    Normal,
    /// Background loop.
    Low,
}

impl TaskPriority {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
        }
    }
}

/// Body of a periodic task.
///
/// `ctx` is the shared state the scheduler was ticked with; the implementor's
/// own fields carry any per-task context. `dt_us` is the time since the
/// task's previous run (its period on the first run).
///
/// Bodies run to completion and must not block.
pub trait Runnable<C> {
    /// Run once.
    fn run(&mut self, ctx: &mut C, dt_us: u32) -> Result<()>;
}

impl<C, F> Runnable<C> for F
where
    F: FnMut(&mut C, u32) -> Result<()>,
{
    fn run(&mut self, ctx: &mut C, dt_us: u32) -> Result<()> {
        self(ctx, dt_us)
    }
}

/// Static description of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Identifier.
    pub id: TaskId,
    /// Human-readable name.
    pub name: String<TASK_NAME_LEN>,
    /// Priority tier.
    pub priority: TaskPriority,
    /// Nominal period in microseconds.
    pub period_us: u32,
    /// Maximum interval between runs before a deadline miss is counted.
    pub deadline_us: u32,
    /// Disabled tasks are skipped.
    pub enabled: bool,
}

/// Accumulated runtime statistics of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskStats {
    /// Completed runs.
    pub execution_count: u32,
    /// Start time of the latest run.
    pub last_run_us: Option<u64>,
    /// Execution time of the latest run.
    pub last_exec_us: u32,
    /// Longest execution time seen.
    pub max_exec_us: u32,
    /// Summed execution time.
    pub total_exec_us: u64,
    /// Runs that started later than the deadline after the previous one.
    pub missed_deadlines: u32,
    /// Runs whose body returned an error.
    pub error_count: u32,
    /// Largest deviation of the run interval from the period.
    pub max_jitter_us: u32,
}

impl TaskStats {
    /// Mean execution time in microseconds.
    pub fn average_exec_us(&self) -> u32 {
        if self.execution_count == 0 {
            0
        } else {
            (self.total_exec_us / u64::from(self.execution_count)) as u32
        }
    }
}

pub(crate) struct Task<'a, C> {
    pub(crate) info: TaskInfo,
    pub(crate) stats: TaskStats,
    pub(crate) failing: bool,
    pub(crate) body: &'a mut dyn Runnable<C>,
}

impl<'a, C> Task<'a, C> {
    /// Whether enough time has passed since the last run. `slack_us` absorbs
    /// timer jitter of the driving tick.
    pub(crate) fn is_due(&self, now_us: u64, slack_us: u32) -> bool {
        match self.stats.last_run_us {
            None => true,
            Some(last) => {
                let elapsed = now_us.saturating_sub(last);
                elapsed + u64::from(slack_us) >= u64::from(self.info.period_us)
            }
        }
    }
}
