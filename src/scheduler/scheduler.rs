//! Priority-tiered periodic scheduler.
//!
//! Two timer sources and a background loop drive four tiers:
//!
//! | Entry point                                     | Tiers          |
//! |-------------------------------------------------|----------------|
//! | [`on_safety_tick`](Scheduler::on_safety_tick)   | Critical       |
//! | [`on_control_tick`](Scheduler::on_control_tick) | High, Normal   |
//! | [`run_background`](Scheduler::run_background)   | Low            |
//!
//! The entry points are meant to be called from the corresponding interrupt
//! handlers (or the idle loop). Overdue tasks are never skipped: a late run
//! is counted as a deadline miss and executed immediately.

use heapless::{String, Vec};

use super::task::{Runnable, Task, TaskId, TaskInfo, TaskPriority, TaskStats, TASK_NAME_LEN};
use crate::config::SchedulerConfig;
use crate::error::{ConfigError, Result, SchedulerError};
use crate::hal::{Clock, FaultKind, FaultReporter};

/// Health counters of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerStatus {
    /// Scheduler accepts ticks.
    pub running: bool,
    /// Registered tasks.
    pub task_count: u8,
    /// Safety ticks handled.
    pub safety_ticks: u32,
    /// Control ticks handled.
    pub cycle_count: u32,
    /// Control ticks whose handler outlasted the control period.
    pub overrun_count: u32,
    /// Deadline misses over all tasks.
    pub missed_deadlines: u32,
    /// Task runs that returned an error.
    pub task_errors: u32,
    /// Largest deviation of the control tick interval from its period.
    pub max_jitter_us: u32,
    /// Longest control handler execution.
    pub max_control_exec_us: u32,
    /// Time spent in task bodies over elapsed time since start, in `[0, 1]`.
    pub cpu_utilization: f32,
    /// Overrun threshold passed and reported.
    pub overrun_fault: bool,
    /// Deadline-miss threshold passed and reported.
    pub deadline_fault: bool,
}

impl SchedulerStatus {
    /// Merge the counters of two schedulers sharing one CPU, typically the
    /// critical-tier instance and the control-tier instance.
    pub fn combined(&self, other: &SchedulerStatus) -> SchedulerStatus {
        SchedulerStatus {
            running: self.running && other.running,
            task_count: self.task_count.saturating_add(other.task_count),
            safety_ticks: self.safety_ticks.wrapping_add(other.safety_ticks),
            cycle_count: self.cycle_count.wrapping_add(other.cycle_count),
            overrun_count: self.overrun_count.wrapping_add(other.overrun_count),
            missed_deadlines: self.missed_deadlines.wrapping_add(other.missed_deadlines),
            task_errors: self.task_errors.wrapping_add(other.task_errors),
            max_jitter_us: self.max_jitter_us.max(other.max_jitter_us),
            max_control_exec_us: self.max_control_exec_us.max(other.max_control_exec_us),
            cpu_utilization: (self.cpu_utilization + other.cpu_utilization).min(1.0),
            overrun_fault: self.overrun_fault || other.overrun_fault,
            deadline_fault: self.deadline_fault || other.deadline_fault,
        }
    }
}

/// Cooperative scheduler for up to `N` tasks.
///
/// Task bodies are borrowed for `'a` and receive `&mut C` on every run.
pub struct Scheduler<'a, C, const N: usize> {
    config: SchedulerConfig,
    tasks: Vec<Task<'a, C>, N>,
    status: SchedulerStatus,
    started_us: Option<u64>,
    last_control_us: Option<u64>,
    busy_us: u64,
}

impl<'a, C, const N: usize> Scheduler<'a, C, N>
where
    C: Clock + FaultReporter,
{
    /// Create a stopped scheduler with no tasks.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        if config.safety_period_us == 0 || config.control_period_us == 0 {
            return Err(ConfigError::InvalidSchedulerTiming {
                safety_period_us: config.safety_period_us,
                control_period_us: config.control_period_us,
            }
            .into());
        }
        Ok(Self {
            config,
            tasks: Vec::new(),
            status: SchedulerStatus::default(),
            started_us: None,
            last_control_us: None,
            busy_us: 0,
        })
    }

    /// Timing configuration.
    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a task. It starts enabled.
    pub fn create_task(
        &mut self,
        name: &str,
        priority: TaskPriority,
        period_us: u32,
        deadline_us: u32,
        body: &'a mut dyn Runnable<C>,
    ) -> Result<TaskId> {
        if period_us == 0 || deadline_us == 0 {
            return Err(SchedulerError::InvalidPeriod.into());
        }
        let name: String<TASK_NAME_LEN> = String::try_from(name).map_err(|_| SchedulerError::NameTooLong)?;
        let id = self.tasks.len() as TaskId;

        self.tasks
            .push(Task {
                info: TaskInfo {
                    id,
                    name,
                    priority,
                    period_us,
                    deadline_us,
                    enabled: true,
                },
                stats: TaskStats::default(),
                failing: false,
                body,
            })
            .map_err(|_| SchedulerError::TaskTableFull)?;

        self.status.task_count = self.tasks.len() as u8;
        debug!("task {=u8} created ({=str})", id, priority.name());
        Ok(id)
    }

    /// Enable or disable a task.
    pub fn enable_task(&mut self, id: TaskId, enabled: bool) -> Result<()> {
        let task = self.task_mut(id)?;
        task.info.enabled = enabled;
        if !enabled {
            // The next run after re-enabling starts a fresh interval.
            task.stats.last_run_us = None;
        }
        Ok(())
    }

    /// Snapshot of the scheduler health counters.
    pub fn get_status(&self) -> SchedulerStatus {
        self.status
    }

    /// Statistics of one task.
    pub fn get_task_stats(&self, id: TaskId) -> Result<TaskStats> {
        Ok(self.task(id)?.stats)
    }

    /// Description of one task.
    pub fn task_info(&self, id: TaskId) -> Result<&TaskInfo> {
        Ok(&self.task(id)?.info)
    }

    /// Start accepting ticks.
    pub fn start(&mut self, ctx: &C) {
        self.status.running = true;
        self.started_us = Some(ctx.now_us());
        self.last_control_us = None;
        info!("scheduler started with {=u8} tasks", self.status.task_count);
    }

    /// Stop accepting ticks. Statistics are kept.
    pub fn stop(&mut self) {
        self.status.running = false;
        info!("scheduler stopped");
    }

    /// Whether ticks are processed.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.status.running
    }

    /// Handler of the safety timer: runs the critical tier.
    pub fn on_safety_tick(&mut self, ctx: &mut C) {
        if !self.status.running {
            return;
        }
        self.status.safety_ticks = self.status.safety_ticks.wrapping_add(1);
        let slack = self.config.safety_period_us / 2;
        self.run_tier(ctx, TaskPriority::Critical, slack);
        self.check_thresholds(ctx);
    }

    /// Handler of the control timer: runs the high tier, then the normal tier.
    pub fn on_control_tick(&mut self, ctx: &mut C) {
        if !self.status.running {
            return;
        }
        let start = ctx.now_us();
        let period = self.config.control_period_us;

        if let Some(last) = self.last_control_us {
            let interval = start.saturating_sub(last);
            let jitter = interval.abs_diff(u64::from(period)).min(u64::from(u32::MAX)) as u32;
            self.status.max_jitter_us = self.status.max_jitter_us.max(jitter);
        }
        self.last_control_us = Some(start);
        self.status.cycle_count = self.status.cycle_count.wrapping_add(1);

        let slack = period / 2;
        self.run_tier(ctx, TaskPriority::High, slack);
        self.run_tier(ctx, TaskPriority::Normal, slack);

        let exec = elapsed_us(start, ctx.now_us());
        self.status.max_control_exec_us = self.status.max_control_exec_us.max(exec);
        if exec > period {
            self.status.overrun_count = self.status.overrun_count.wrapping_add(1);
            debug!("control overrun: {=u32} us", exec);
        }

        self.update_utilization(ctx.now_us());
        self.check_thresholds(ctx);
    }

    /// Idle-loop entry point: runs the low tier.
    pub fn run_background(&mut self, ctx: &mut C) {
        if !self.status.running {
            return;
        }
        self.run_tier(ctx, TaskPriority::Low, 0);
        self.update_utilization(ctx.now_us());
    }

    fn run_tier(&mut self, ctx: &mut C, priority: TaskPriority, slack_us: u32) {
        for task in self.tasks.iter_mut() {
            if !task.info.enabled || task.info.priority != priority {
                continue;
            }
            let now = ctx.now_us();
            if !task.is_due(now, slack_us) {
                continue;
            }

            let dt_us = match task.stats.last_run_us {
                Some(last) => {
                    let interval = elapsed_us(last, now);
                    if interval > task.info.deadline_us {
                        task.stats.missed_deadlines = task.stats.missed_deadlines.wrapping_add(1);
                        self.status.missed_deadlines = self.status.missed_deadlines.wrapping_add(1);
                        trace!("task {=u8} missed deadline: {=u32} us", task.info.id, interval);
                    }
                    let jitter = interval.abs_diff(task.info.period_us);
                    task.stats.max_jitter_us = task.stats.max_jitter_us.max(jitter);
                    interval
                }
                None => task.info.period_us,
            };

            let result = task.body.run(ctx, dt_us);
            let exec = elapsed_us(now, ctx.now_us());

            task.stats.execution_count = task.stats.execution_count.wrapping_add(1);
            task.stats.last_run_us = Some(now);
            task.stats.last_exec_us = exec;
            task.stats.max_exec_us = task.stats.max_exec_us.max(exec);
            task.stats.total_exec_us += u64::from(exec);
            self.busy_us += u64::from(exec);

            match result {
                Ok(()) => task.failing = false,
                Err(_) => {
                    task.stats.error_count = task.stats.error_count.wrapping_add(1);
                    self.status.task_errors = self.status.task_errors.wrapping_add(1);
                    if !task.failing {
                        task.failing = true;
                        warn!("task {=u8} failed", task.info.id);
                        ctx.report_fault(None, FaultKind::TaskFailure);
                    }
                }
            }
        }
    }

    fn check_thresholds(&mut self, ctx: &mut C) {
        if !self.status.overrun_fault && self.status.overrun_count >= self.config.overrun_fault_threshold {
            self.status.overrun_fault = true;
            error!("control overruns reached {=u32}", self.status.overrun_count);
            ctx.report_fault(None, FaultKind::ControlOverrun);
        }
        if !self.status.deadline_fault && self.status.missed_deadlines >= self.config.deadline_miss_fault_threshold {
            self.status.deadline_fault = true;
            error!("deadline misses reached {=u32}", self.status.missed_deadlines);
            ctx.report_fault(None, FaultKind::DeadlineMiss);
        }
    }

    fn update_utilization(&mut self, now_us: u64) {
        let Some(started) = self.started_us else {
            return;
        };
        let window = now_us.saturating_sub(started);
        if window > 0 {
            self.status.cpu_utilization = (self.busy_us as f32 / window as f32).min(1.0);
        }
    }

    fn task(&self, id: TaskId) -> Result<&Task<'a, C>> {
        self.tasks
            .get(id as usize)
            .ok_or(SchedulerError::InvalidTaskId(id).into())
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task<'a, C>> {
        self.tasks
            .get_mut(id as usize)
            .ok_or(SchedulerError::InvalidTaskId(id).into())
    }
}

fn elapsed_us(from: u64, to: u64) -> u32 {
    to.saturating_sub(from).min(u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hal::SimulatedPlatform;

    type Sched<'a> = Scheduler<'a, SimulatedPlatform, 8>;

    fn ok(_: &mut SimulatedPlatform, _: u32) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_deadline_miss_counted_once() {
        let mut sim = SimulatedPlatform::new();
        let mut body = ok;
        let mut sched = Sched::new(SchedulerConfig::default()).unwrap();
        let id = sched
            .create_task("ctl", TaskPriority::High, 1_000, 800, &mut body)
            .unwrap();
        sched.start(&sim);

        sched.on_control_tick(&mut sim);
        sim.advance_time(1_200);
        sched.on_control_tick(&mut sim);

        let stats = sched.get_task_stats(id).unwrap();
        assert_eq!(stats.execution_count, 2);
        assert_eq!(stats.missed_deadlines, 1);
        assert_eq!(stats.max_jitter_us, 200);
        assert_eq!(sched.get_status().missed_deadlines, 1);
    }

    #[test]
    fn test_on_time_runs_do_not_miss() {
        let mut sim = SimulatedPlatform::new();
        let mut body = ok;
        let mut sched = Sched::new(SchedulerConfig::default()).unwrap();
        let id = sched
            .create_task("ctl", TaskPriority::Normal, 1_000, 1_000, &mut body)
            .unwrap();
        sched.start(&sim);

        for _ in 0..10 {
            sched.on_control_tick(&mut sim);
            sim.advance_time(1_000);
        }
        let stats = sched.get_task_stats(id).unwrap();
        assert_eq!(stats.execution_count, 10);
        assert_eq!(stats.missed_deadlines, 0);
        assert_eq!(sched.get_status().cycle_count, 10);
        assert_eq!(sched.get_status().max_jitter_us, 0);
    }

    #[test]
    fn test_tiers_run_in_order() {
        let mut sim = SimulatedPlatform::new();
        let order = core::cell::RefCell::new(std::vec::Vec::new());
        let mut normal = |_: &mut SimulatedPlatform, _: u32| -> Result<()> {
            order.borrow_mut().push(TaskPriority::Normal);
            Ok(())
        };
        let mut high = |_: &mut SimulatedPlatform, _: u32| -> Result<()> {
            order.borrow_mut().push(TaskPriority::High);
            Ok(())
        };
        let mut critical = |_: &mut SimulatedPlatform, _: u32| -> Result<()> {
            order.borrow_mut().push(TaskPriority::Critical);
            Ok(())
        };

        let mut sched = Sched::new(SchedulerConfig::default()).unwrap();
        sched.create_task("normal", TaskPriority::Normal, 1_000, 1_000, &mut normal).unwrap();
        sched.create_task("high", TaskPriority::High, 1_000, 1_000, &mut high).unwrap();
        sched.create_task("safety", TaskPriority::Critical, 100, 100, &mut critical).unwrap();
        sched.start(&sim);

        sched.on_control_tick(&mut sim);
        sched.on_safety_tick(&mut sim);
        drop(sched);

        assert_eq!(
            *order.borrow(),
            [TaskPriority::High, TaskPriority::Normal, TaskPriority::Critical]
        );
    }

    #[test]
    fn test_overrun_escalates_at_threshold() {
        let mut sim = SimulatedPlatform::new();
        let mut slow = |ctx: &mut SimulatedPlatform, _: u32| -> Result<()> {
            ctx.advance_time(1_500);
            Ok(())
        };
        let config = SchedulerConfig {
            overrun_fault_threshold: 3,
            deadline_miss_fault_threshold: 1_000,
            ..SchedulerConfig::default()
        };
        let mut sched = Sched::new(config).unwrap();
        let id = sched.create_task("slow", TaskPriority::High, 1_000, 2_000, &mut slow).unwrap();
        sched.start(&sim);

        for _ in 0..2 {
            sched.on_control_tick(&mut sim);
        }
        assert_eq!(sched.get_status().overrun_count, 2);
        assert!(!sched.get_status().overrun_fault);

        sched.on_control_tick(&mut sim);
        let status = sched.get_status();
        assert_eq!(status.overrun_count, 3);
        assert!(status.overrun_fault);
        assert!(status.cpu_utilization > 0.9);
        assert_eq!(sched.get_task_stats(id).unwrap().max_exec_us, 1_500);
        drop(sched);
        assert_eq!(sim.fault_count(FaultKind::ControlOverrun), 1);
    }

    #[test]
    fn test_task_errors_counted_and_reported_once() {
        let mut sim = SimulatedPlatform::new();
        let mut failing = |_: &mut SimulatedPlatform, _: u32| -> Result<()> { Err(SchedulerError::InvalidPeriod.into()) };
        let mut sched = Sched::new(SchedulerConfig::default()).unwrap();
        let id = sched.create_task("bad", TaskPriority::Low, 10, 1_000, &mut failing).unwrap();
        sched.start(&sim);

        for _ in 0..3 {
            sched.run_background(&mut sim);
            sim.advance_time(10);
        }
        assert_eq!(sched.get_task_stats(id).unwrap().error_count, 3);
        assert_eq!(sched.get_status().task_errors, 3);
        drop(sched);
        assert_eq!(sim.fault_count(FaultKind::TaskFailure), 1);
    }

    #[test]
    fn test_disabled_and_stopped() {
        let mut sim = SimulatedPlatform::new();
        let mut body = ok;
        let mut sched = Sched::new(SchedulerConfig::default()).unwrap();
        let id = sched.create_task("ctl", TaskPriority::High, 1_000, 1_000, &mut body).unwrap();

        // Not started
        sched.on_control_tick(&mut sim);
        assert_eq!(sched.get_task_stats(id).unwrap().execution_count, 0);

        sched.start(&sim);
        sched.enable_task(id, false).unwrap();
        sched.on_control_tick(&mut sim);
        assert_eq!(sched.get_task_stats(id).unwrap().execution_count, 0);

        sched.enable_task(id, true).unwrap();
        sim.advance_time(5_000);
        sched.on_control_tick(&mut sim);
        let stats = sched.get_task_stats(id).unwrap();
        assert_eq!(stats.execution_count, 1);
        assert_eq!(stats.missed_deadlines, 0);
    }

    #[test]
    fn test_create_task_errors() {
        let mut a = ok;
        let mut e = ok;
        let mut b = ok;
        let mut c = ok;
        let mut d = ok;
        let mut sched: Scheduler<'_, SimulatedPlatform, 2> = Scheduler::new(SchedulerConfig::default()).unwrap();

        assert_eq!(
            sched.create_task("x", TaskPriority::High, 0, 1, &mut a),
            Err(Error::Scheduler(SchedulerError::InvalidPeriod))
        );
        assert_eq!(
            sched.create_task("a_very_long_task_name", TaskPriority::High, 1, 1, &mut e),
            Err(Error::Scheduler(SchedulerError::NameTooLong))
        );
        sched.create_task("a", TaskPriority::High, 1, 1, &mut b).unwrap();
        sched.create_task("b", TaskPriority::High, 1, 1, &mut c).unwrap();
        assert_eq!(
            sched.create_task("c", TaskPriority::High, 1, 1, &mut d),
            Err(Error::Scheduler(SchedulerError::TaskTableFull))
        );
        assert_eq!(
            sched.get_task_stats(7),
            Err(Error::Scheduler(SchedulerError::InvalidTaskId(7)))
        );
        assert!(Scheduler::<'_, SimulatedPlatform, 2>::new(SchedulerConfig {
            control_period_us: 0,
            ..SchedulerConfig::default()
        })
        .is_err());
    }

    #[test]
    fn test_combined_status() {
        let critical = SchedulerStatus {
            running: true,
            task_count: 1,
            safety_ticks: 100,
            missed_deadlines: 2,
            max_jitter_us: 3,
            cpu_utilization: 0.25,
            ..SchedulerStatus::default()
        };
        let control = SchedulerStatus {
            running: true,
            task_count: 2,
            cycle_count: 10,
            missed_deadlines: 1,
            max_jitter_us: 40,
            cpu_utilization: 0.5,
            overrun_fault: true,
            ..SchedulerStatus::default()
        };

        let both = control.combined(&critical);
        assert!(both.running);
        assert_eq!(both.task_count, 3);
        assert_eq!(both.safety_ticks, 100);
        assert_eq!(both.cycle_count, 10);
        assert_eq!(both.missed_deadlines, 3);
        assert_eq!(both.max_jitter_us, 40);
        assert!((both.cpu_utilization - 0.75).abs() < 1e-6);
        assert!(both.overrun_fault);
    }
}
