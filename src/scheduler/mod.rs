//! Real-time task scheduling.

mod scheduler;
mod task;

pub use scheduler::{Scheduler, SchedulerStatus};
pub use task::{Runnable, TaskId, TaskInfo, TaskPriority, TaskStats, TASK_NAME_LEN};
