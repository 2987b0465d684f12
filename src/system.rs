//! Motion system facade.
//!
//! [`MotionSystem`] owns the platform, one position controller per configured
//! motor and the coordinator. The safety monitors live in a [`SafetyBand`]
//! the system borrows, so the critical-rate [`SafetyTask`] runs on its own
//! scheduler instance and may preempt a control tick. The system exposes the
//! command surface (moves, homing, stops, safety configuration, status) and
//! the control-rate entry points driven through [`ControlTask`] and
//! [`CoordinationTask`].
//!
//! Within one control tick the order is fixed: trajectory sampling, control
//! computation, safety check of the measured position and of the command,
//! then the driver write. The band is locked only around the safety check.

use heapless::{String, Vec};
use libm::fabsf;

use crate::config::{validate_config, Degrees, DegreesPerSec, PositionSafetyConfig, SystemConfig};
use crate::control::{HomingStatus, PositionController};
use crate::coordination::{CoordinatedMove, CoordinationMode, Coordinator, MoveTarget};
use crate::error::{ConfigError, ControlError, CoordinationError, Error, Result, SafetyError};
use crate::hal::{Clock, FaultKind, FaultReporter, MotorId, Platform, StopSource};
use crate::motion::{MotionPhase, ProfileKind};
use crate::safety::{
    PositionSafetyMonitor, PositionSafetyStatus, SafetyBand, SafetyContext, SafetyState, SafetyTask,
    TargetValidation, ViolationKind,
};
use crate::scheduler::{Runnable, Scheduler, SchedulerStatus, TaskPriority};
use crate::MAX_MOTORS;

/// Snapshot of one motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorStatus {
    /// Motor id.
    pub id: MotorId,
    /// Filtered position (degrees).
    pub position: f32,
    /// Filtered velocity (deg/s).
    pub velocity: f32,
    /// Current target position (degrees).
    pub target: f32,
    /// Position error (degrees).
    pub error: f32,
    /// Error and velocity within the settle tolerances.
    pub settled: bool,
    /// Loop closed.
    pub enabled: bool,
    /// Reference established.
    pub homed: bool,
    /// Homing running.
    pub homing: bool,
    /// Last encoder read succeeded.
    pub position_valid: bool,
    /// A trajectory is running.
    pub profile_active: bool,
    /// Phase of the running or last trajectory.
    pub phase: MotionPhase,
    /// Latched safety violation.
    pub violation: Option<ViolationKind>,
    /// Safety reaction state.
    pub safety_state: SafetyState,
    /// Near a soft limit.
    pub in_warning_zone: bool,
}

/// Snapshot of the whole system.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    /// Per-motor snapshots, in configuration order.
    pub motors: Vec<MotorStatus, MAX_MOTORS>,
    /// Coordination policy.
    pub mode: CoordinationMode,
    /// A coordinated move is running.
    pub coordinated_move_active: bool,
    /// Coordinated moves completed so far.
    pub completed_moves: u32,
    /// Coordinated moves ended by a fault or an emergency stop.
    pub aborted_moves: u32,
    /// Why the system is emergency-stopped, if it is.
    pub emergency: Option<StopSource>,
    /// Control ticks handled.
    pub control_ticks: u32,
    /// Safety ticks handled.
    pub safety_ticks: u32,
    /// Scheduler health, when attached with [`with_scheduler`](Self::with_scheduler).
    pub scheduler: Option<SchedulerStatus>,
}

impl SystemStatus {
    /// Attach scheduler health counters. With separate critical and control
    /// schedulers, pass [`SchedulerStatus::combined`].
    pub fn with_scheduler(mut self, status: SchedulerStatus) -> Self {
        self.scheduler = Some(status);
        self
    }

    /// Whether every enabled motor is settled and no move is running.
    pub fn all_settled(&self) -> bool {
        !self.coordinated_move_active
            && self
                .motors
                .iter()
                .filter(|m| m.enabled)
                .all(|m| m.settled && !m.profile_active)
    }
}

/// The motion-control core of one board.
///
/// `'s` is the lifetime of the [`SafetyBand`] holding the monitors.
pub struct MotionSystem<'s, P: Platform> {
    platform: P,
    band: &'s SafetyBand<'s>,
    names: Vec<String<32>, MAX_MOTORS>,
    controllers: Vec<PositionController, MAX_MOTORS>,
    coordinator: Coordinator,
    config: SystemConfig,
    /// Drivers stopped for the latched emergency.
    halted: bool,
    control_ticks: u32,
}

impl<'s, P: Platform> MotionSystem<'s, P> {
    /// Build the system from a validated configuration and install its
    /// monitors into `band`. Every motor starts disabled.
    ///
    /// One band serves one system; installing replaces whatever it held.
    pub fn new(platform: P, config: SystemConfig, band: &'s SafetyBand<'s>) -> Result<Self> {
        validate_config(&config)?;

        let mut names = Vec::new();
        let mut controllers = Vec::new();
        let mut monitors = Vec::new();
        for (name, motor) in config.motors.iter() {
            names
                .push(name.clone())
                .map_err(|_| ConfigError::TooManyMotors)?;
            controllers
                .push(PositionController::new(motor))
                .map_err(|_| ConfigError::TooManyMotors)?;
            monitors
                .push(PositionSafetyMonitor::new(motor.id, motor.safety))
                .map_err(|_| ConfigError::TooManyMotors)?;
        }

        band.install(monitors);

        info!("motion system ready with {=u8} motors", controllers.len() as u8);
        Ok(Self {
            platform,
            band,
            names,
            controllers,
            coordinator: Coordinator::new(config.coordination),
            config,
            halted: false,
            control_ticks: 0,
        })
    }

    /// The platform.
    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The platform, mutably.
    #[inline]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Consume the system and return the platform.
    pub fn into_platform(self) -> P {
        self.platform
    }

    /// The band holding the safety monitors.
    #[inline]
    pub fn safety_band(&self) -> &'s SafetyBand<'s> {
        self.band
    }

    /// Configuration the system was built from.
    #[inline]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// The coordinator.
    #[inline]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Controller of a motor.
    pub fn controller(&self, id: MotorId) -> Result<&PositionController> {
        Ok(&self.controllers[self.index(id)?])
    }

    /// Safety monitor status of a motor, read under the band lock.
    pub fn safety_status(&self, id: MotorId) -> Result<PositionSafetyStatus> {
        let idx = self.index(id)?;
        Ok(self.band.lock(|s| *s.monitors[idx].status()))
    }

    /// Look up a motor id by configured name.
    pub fn motor_id(&self, name: &str) -> Option<MotorId> {
        self.names
            .iter()
            .position(|n| n.as_str() == name)
            .map(|i| self.controllers[i].id())
    }

    /// Whether the system is emergency-stopped.
    #[inline]
    pub fn is_emergency_stopped(&self) -> bool {
        self.band.emergency().is_some()
    }

    // ---- commands ----

    /// Close or open the loop of a motor.
    ///
    /// Disabling drops the motor's trajectory and releases the windings.
    pub fn enable_motor(&mut self, id: MotorId, enabled: bool) -> Result<()> {
        let idx = self.index(id)?;
        self.controllers[idx].enable(&mut self.platform, enabled)?;
        let now = self.platform.now_us();
        let position = self.controllers[idx].state().current_position;
        self.band.lock(|s| {
            if enabled {
                s.monitors[idx].rebase(position, now);
            }
            s.watched[idx] = false;
        });
        if !enabled {
            self.coordinator.abort_motor(id);
            self.platform.set_high_impedance(id)?;
        }
        Ok(())
    }

    /// Move one motor.
    ///
    /// Targets the safety monitor would have to clamp are rejected with
    /// [`SafetyError::LimitExceeded`].
    pub fn move_to(&mut self, target: MoveTarget, profile: ProfileKind) -> Result<()> {
        self.check_motion_allowed()?;
        let idx = self.index(target.motor)?;
        self.check_target(idx, target.position)?;
        self.coordinator.start_single(&target, profile, &mut self.controllers)
    }

    /// Start a coordinated move under the current coordination mode.
    pub fn coordinated_move(&mut self, command: &CoordinatedMove) -> Result<()> {
        self.check_motion_allowed()?;
        for target in &command.targets {
            let idx = self.index(target.motor)?;
            self.check_target(idx, target.position)?;
        }
        self.coordinator.coordinated_move(command, &mut self.controllers)
    }

    /// Select the coordination policy.
    pub fn set_coordination_mode(&mut self, mode: CoordinationMode) -> Result<()> {
        self.coordinator.set_mode(mode)
    }

    /// Override a slave's master/slave offset.
    pub fn set_slave_offset(&mut self, id: MotorId, offset: Degrees) -> Result<()> {
        self.index(id)?;
        self.coordinator.set_slave_offset(id, offset)
    }

    /// Start homing a motor. Any running trajectory of the motor is dropped.
    pub fn home(&mut self, id: MotorId) -> Result<()> {
        self.check_motion_allowed()?;
        let idx = self.index(id)?;
        if self.coordinator.is_participant(id) {
            return Err(CoordinationError::MotionAlreadyActive.into());
        }
        let now = self.platform.now_us();
        self.controllers[idx].start_homing(now)?;
        self.coordinator.abort_motor(id);
        self.band.lock(|s| s.watched[idx] = false);
        Ok(())
    }

    /// Request a controlled stop of one motor.
    pub fn stop(&mut self, id: MotorId) -> Result<()> {
        self.index(id)?;
        self.coordinator.stop_motor(id)
    }

    /// Request a controlled stop of every motor.
    pub fn stop_all(&mut self) {
        self.coordinator.stop();
    }

    /// Stop everything now.
    pub fn emergency_stop(&mut self) {
        let source = StopSource::Command;
        self.band.lock(|s| s.latch_emergency(source));
        self.platform.trigger_emergency_stop(source);
        self.react_to_emergency();
    }

    /// Leave a commanded emergency stop.
    ///
    /// Rejected while a safety violation is latched; those are cleared with
    /// [`clear_violation`](Self::clear_violation).
    pub fn clear_emergency(&mut self) -> Result<()> {
        let cleared = self.band.lock(|s| match s.latched_motor() {
            Some(motor) => Err(SafetyError::ViolationLatched(motor)),
            None => Ok(s.emergency.take().is_some()),
        })?;
        if cleared {
            info!("emergency stop cleared");
        }
        self.halted = false;
        self.resume_feedback();
        Ok(())
    }

    /// Clear a latched safety violation.
    ///
    /// The motor holds its current position afterwards. Once no violation is
    /// latched, a safety-triggered emergency stop is released too.
    pub fn clear_violation(&mut self, id: MotorId) -> Result<()> {
        let idx = self.index(id)?;
        let released = self.band.lock(|s| {
            s.monitors[idx].clear_violation();
            let release = s.latched_motor().is_none() && matches!(s.emergency, Some(StopSource::Safety { .. }));
            if release {
                s.emergency = None;
            }
            release
        });
        self.controllers[idx].hold_position();

        if released {
            self.halted = false;
            info!("safety emergency stop released");
        }
        self.resume_feedback();
        Ok(())
    }

    /// Safety configuration of a motor.
    pub fn safety_config(&self, id: MotorId) -> Result<PositionSafetyConfig> {
        let idx = self.index(id)?;
        Ok(self.band.lock(|s| *s.monitors[idx].config()))
    }

    /// Replace the safety configuration of a motor.
    pub fn set_safety_config(&mut self, id: MotorId, config: PositionSafetyConfig) -> Result<()> {
        let idx = self.index(id)?;
        self.band.lock(|s| s.monitors[idx].configure(config))
    }

    /// Check a prospective target against a motor's safety limits.
    pub fn validate_target(&self, id: MotorId, position: Degrees) -> Result<TargetValidation> {
        let idx = self.index(id)?;
        Ok(self.band.lock(|s| s.monitors[idx].validate_target(position.0)))
    }

    /// Snapshot of one motor, taken under the band lock.
    pub fn motor_status(&self, id: MotorId) -> Result<MotorStatus> {
        let idx = self.index(id)?;
        Ok(self.band.lock(|s| self.snapshot(idx, s.monitors[idx].status())))
    }

    /// Snapshot of every motor and the coordinator, taken under one lock of
    /// the band.
    pub fn system_status(&self) -> SystemStatus {
        self.band.lock(|s| {
            let mut motors = Vec::new();
            for (idx, monitor) in s.monitors.iter().enumerate() {
                let _ = motors.push(self.snapshot(idx, monitor.status()));
            }
            SystemStatus {
                motors,
                mode: self.coordinator.mode(),
                coordinated_move_active: self.coordinator.is_active(),
                completed_moves: self.coordinator.completed_moves(),
                aborted_moves: self.coordinator.aborted_moves(),
                emergency: s.emergency,
                control_ticks: self.control_ticks,
                safety_ticks: s.ticks(),
                scheduler: None,
            }
        })
    }

    // ---- periodic entry points ----

    /// Critical-rate work. Shorthand for [`SafetyBand::tick`] on this
    /// system's band; takes `&self`, so it may run while a control tick is
    /// in progress.
    pub fn safety_tick(&self) {
        self.band.tick();
    }

    /// Control-rate work: sample trajectories, then close every loop.
    ///
    /// Safety violations are handled here and not returned. The first
    /// communication or control error is returned after every motor ran.
    /// An emergency latched by the critical band, even one raised while
    /// this tick runs, stops the loop and hard-stops every driver.
    pub fn control_tick(&mut self, dt_us: u32) -> Result<()> {
        self.control_ticks = self.control_ticks.wrapping_add(1);
        if self.band.emergency().is_some() {
            self.react_to_emergency();
            return Ok(());
        }
        let dt = dt_us as f32 * 1e-6;
        let now = self.platform.now_us();
        let mut first_error = None;

        if let Err(e) = self.coordinator.advance_profiles(dt, &mut self.controllers) {
            first_error.get_or_insert(e);
        }

        for idx in 0..self.controllers.len() {
            if let Err(e) = self.control_motor(idx, dt, now) {
                first_error.get_or_insert(e);
            }
            if self.band.emergency().is_some() {
                self.react_to_emergency();
                break;
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Coordination bookkeeping: load balancing, drift detection and
    /// completion. Returns `true` on the tick a coordinated move completes.
    pub fn coordination_tick(&mut self) -> bool {
        if self.band.emergency().is_some() {
            return false;
        }
        let now = self.platform.now_us();
        self.coordinator
            .update(now, &mut self.controllers, &mut self.platform)
    }

    /// Register the tasks at the configured rates: [`SafetyTask`] on the
    /// critical scheduler, control and coordination on the control
    /// scheduler.
    ///
    /// Tick the critical scheduler with [`SafetyBand::context`] from the
    /// safety timer and the control scheduler with the system from the
    /// control timer.
    pub fn register_tasks<'a, 'c, const M: usize, const N: usize>(
        &self,
        critical: &mut Scheduler<'a, SafetyContext<'c>, M>,
        control: &mut Scheduler<'a, Self, N>,
        tasks: &'a mut SystemTasks,
    ) -> Result<()> {
        let timing = self.config.scheduler;
        let safety = timing.safety_period_us;
        let period = timing.control_period_us;

        critical.create_task("safety", TaskPriority::Critical, safety, safety + safety / 4, &mut tasks.safety)?;
        control.create_task("control", TaskPriority::High, period, period + period / 4, &mut tasks.control)?;
        control.create_task(
            "coordination",
            TaskPriority::Normal,
            period,
            period + period / 4,
            &mut tasks.coordination,
        )?;
        Ok(())
    }

    // ---- internals ----

    fn index(&self, id: MotorId) -> Result<usize> {
        self.controllers
            .iter()
            .position(|c| c.id() == id)
            .ok_or(Error::Control(ControlError::InvalidMotorId(id)))
    }

    fn check_motion_allowed(&self) -> Result<()> {
        match self.band.emergency() {
            Some(StopSource::Safety { motor, .. }) => Err(SafetyError::ViolationLatched(motor).into()),
            Some(StopSource::Command) => Err(SafetyError::EmergencyStopActive.into()),
            None => Ok(()),
        }
    }

    fn check_target(&self, idx: usize, position: Degrees) -> Result<()> {
        self.band.lock(|s| {
            let monitor = &s.monitors[idx];
            if monitor.is_latched() {
                return Err(SafetyError::ViolationLatched(monitor.motor()).into());
            }
            monitor.enforce_limits(position.0).into_result(position.0)?;
            Ok(())
        })
    }

    fn is_moving(&self, idx: usize) -> bool {
        let controller = &self.controllers[idx];
        let profile = self
            .coordinator
            .executor(controller.id())
            .map(|e| e.is_active())
            .unwrap_or(false);
        profile || fabsf(controller.velocity()) > controller.config().settle_velocity_tolerance.0
    }

    fn control_motor(&mut self, idx: usize, dt: f32, now: u64) -> Result<()> {
        let id = self.controllers[idx].id();
        let band = self.band;
        if !self.controllers[idx].is_enabled() {
            return Ok(());
        }

        if self.controllers[idx].is_homing() {
            let result = self.controllers[idx].tick_homing(&mut self.platform, now);
            let position = self.controllers[idx].state().current_position;
            band.lock(|s| {
                s.monitors[idx].rebase(position, now);
                s.watched[idx] = false;
            });
            if let Ok(HomingStatus::Complete) = result {
                info!("motor {=u8} homed", id);
            }
            return result.map(|_| ());
        }

        let computed = match self.controllers[idx].compute(&mut self.platform, dt) {
            Err(e @ Error::Hardware(_)) => {
                let moving = self.is_moving(idx);
                let platform = &mut self.platform;
                let result = band.lock(|s| s.monitors[idx].encoder_fault(moving, platform));
                if let Err(Error::Safety(SafetyError::Violation { kind, .. })) = result {
                    self.on_violation(idx, kind);
                }
                return Err(e);
            }
            other => other,
        };

        // The shaft was read even when the error limit tripped: the monitor
        // sees that position before anything reacts to the error.
        let position = self.controllers[idx].state().current_position;
        let platform = &mut self.platform;
        let checked = band.lock(|s| -> Result<Option<f32>> {
            s.watched[idx] = true;
            let monitor = &mut s.monitors[idx];
            monitor.update_position(position, now, platform)?;
            match &computed {
                Ok(output) => monitor.check_command(output.velocity.0).map(Some),
                Err(_) => Ok(None),
            }
        });

        let velocity = match checked {
            Ok(velocity) => velocity,
            Err(Error::Safety(SafetyError::Violation { kind, .. })) => {
                self.on_violation(idx, kind);
                return computed.map(|_| ());
            }
            // Latched: the command stays blocked.
            Err(Error::Safety(SafetyError::ViolationLatched(_))) => return computed.map(|_| ()),
            Err(e) => return Err(e),
        };

        match (computed, velocity) {
            (Ok(_), Some(velocity)) => self.controllers[idx].apply(&mut self.platform, DegreesPerSec(velocity)),
            (Ok(_), None) => Ok(()),
            (Err(e @ Error::Control(ControlError::PositionErrorExceeded { .. })), _) => {
                if self.platform.soft_stop(id).is_err() {
                    self.hard_stop(id);
                }
                self.halt_motor(idx);
                Err(e)
            }
            (Err(e), _) => Err(e),
        }
    }

    fn on_violation(&mut self, idx: usize, kind: ViolationKind) {
        let motor = self.controllers[idx].id();
        let emergency = self.band.lock(|s| {
            let escalated = kind.is_emergency() || s.monitors[idx].status().state == SafetyState::EmergencyStop;
            if escalated {
                // The monitor already triggered the platform emergency stop.
                s.latch_emergency(StopSource::Safety { motor, violation: kind });
            }
            escalated
        });
        if emergency {
            self.react_to_emergency();
        } else {
            self.halt_motor(idx);
        }
    }

    fn halt_motor(&mut self, idx: usize) {
        let id = self.controllers[idx].id();
        if self.coordinator.is_participant(id) {
            self.coordinator.abort_move();
        }
        self.coordinator.abort_motor(id);
        self.controllers[idx].hold_position();
    }

    /// Drop every trajectory and hard-stop every driver, once per latched
    /// emergency.
    fn react_to_emergency(&mut self) {
        if self.halted {
            return;
        }
        self.halted = true;
        error!("emergency stop");
        self.coordinator.emergency_stop(&mut self.controllers);
        for idx in 0..self.controllers.len() {
            let id = self.controllers[idx].id();
            self.hard_stop(id);
        }
    }

    fn hard_stop(&mut self, id: MotorId) {
        if self.platform.hard_stop(id).is_err() {
            error!("motor {=u8}: hard stop failed", id);
            self.platform.report_fault(Some(id), FaultKind::DriverCommunication);
        }
    }

    fn resume_feedback(&mut self) {
        let now = self.platform.now_us();
        let controllers = &self.controllers;
        self.band.lock(|s| {
            for (idx, controller) in controllers.iter().enumerate() {
                if controller.is_enabled() {
                    s.monitors[idx].rebase(controller.state().current_position, now);
                }
            }
        });
    }

    fn snapshot(&self, idx: usize, safety: &PositionSafetyStatus) -> MotorStatus {
        let controller = &self.controllers[idx];
        let state = controller.state();
        let executor = self.coordinator.executor(controller.id());
        MotorStatus {
            id: controller.id(),
            position: state.filtered_position,
            velocity: state.velocity,
            target: state.target_position,
            error: state.position_error,
            settled: controller.is_settled(),
            enabled: state.enabled,
            homed: state.homed,
            homing: controller.is_homing(),
            position_valid: state.position_valid,
            profile_active: executor.map(|e| e.is_active()).unwrap_or(false),
            phase: executor.map(|e| e.phase()).unwrap_or(MotionPhase::Idle),
            violation: safety.violation,
            safety_state: safety.state,
            in_warning_zone: safety.in_warning_zone,
        }
    }
}

impl<P: Platform> Clock for MotionSystem<'_, P> {
    fn now_us(&self) -> u64 {
        self.platform.now_us()
    }
}

impl<P: Platform> FaultReporter for MotionSystem<'_, P> {
    fn report_fault(&self, motor: Option<MotorId>, fault: FaultKind) {
        self.platform.report_fault(motor, fault);
    }
}

/// High-tier task: [`MotionSystem::control_tick`].
#[derive(Debug, Default)]
pub struct ControlTask;

/// Normal-tier task: [`MotionSystem::coordination_tick`].
#[derive(Debug, Default)]
pub struct CoordinationTask {
    /// Coordinated moves seen completing.
    pub completed: u32,
}

/// The standard task set, registered by [`MotionSystem::register_tasks`].
#[derive(Debug, Default)]
pub struct SystemTasks {
    /// Critical-rate safety checks.
    pub safety: SafetyTask,
    /// Trajectory sampling and position control.
    pub control: ControlTask,
    /// Coordinator bookkeeping.
    pub coordination: CoordinationTask,
}

impl<'s, P: Platform> Runnable<MotionSystem<'s, P>> for ControlTask {
    fn run(&mut self, system: &mut MotionSystem<'s, P>, dt_us: u32) -> Result<()> {
        system.control_tick(dt_us)
    }
}

impl<'s, P: Platform> Runnable<MotionSystem<'s, P>> for CoordinationTask {
    fn run(&mut self, system: &mut MotionSystem<'s, P>, _dt_us: u32) -> Result<()> {
        if system.coordination_tick() {
            self.completed = self.completed.wrapping_add(1);
        }
        Ok(())
    }
}
