//! Multi-motor coordinator.
//!
//! Owns one [`MotionExecutor`] per motor and drives the position controllers
//! under one of four policies:
//!
//! - **Independent**: each motor runs its own trajectory unmodified.
//! - **Synchronized**: every trajectory is stretched to the longest duration.
//! - **Load sharing**: the summed displacement is split evenly, and motors
//!   that stray from the group average are pulled halfway back.
//! - **Master/slave**: the master runs its trajectory, slaves follow the
//!   master position plus an offset. The offset moves from the slave's
//!   starting offset to the target offset in proportion to the master's
//!   progress, so a move from rest never steps the slave target. Slaves of
//!   a master that does not move run their own trajectory.

use heapless::Vec;
use libm::fabsf;

use crate::config::{CoordinationConfig, Degrees, DegreesPerSec, DegreesPerSecSquared};
use crate::control::PositionController;
use crate::error::{ConfigError, ControlError, CoordinationError, Error, Result};
use crate::hal::{FaultKind, FaultReporter, MotorId};
use crate::motion::{MotionExecutor, MotionPhase, MotionRequest, ProfileKind, Sample, Trajectory};
use crate::MAX_MOTORS;

const SYNC_REFINE_STEPS: u32 = 32;

/// Master travel below which slaves get their own trajectory.
const MIN_MASTER_TRAVEL: f32 = 1e-3;

/// Coordination policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoordinationMode {
    /// Each motor follows its own trajectory.
    #[default]
    Independent,
    /// All trajectories finish together.
    Synchronized,
    /// Displacement split evenly, positions balanced.
    LoadSharing,
    /// Slaves follow the master at a fixed offset.
    MasterSlave {
        /// Motor whose trajectory drives the others.
        master: MotorId,
    },
}

/// Processing priority of a motor. Higher classes are updated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorPriority {
    /// Updated last.
    Low,
    /// Default class.
    #[default]
    Normal,
    /// Updated before normal motors.
    High,
    /// Updated first.
    Critical,
}

/// Coordinator's view of one motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorMotorState {
    /// Motor takes part in coordinated moves.
    pub enabled: bool,
    /// Time-scaled in synchronized mode.
    pub sync_participant: bool,
    /// Split and balanced in load-sharing mode.
    pub load_participant: bool,
    /// Processing priority.
    pub priority: MotorPriority,
    /// Position read from the controller on the last update.
    pub last_position: f32,
    /// Controller reported settled on the last update.
    pub settled: bool,
    /// A trajectory is running.
    pub profile_active: bool,
    /// Master/slave offset (degrees).
    pub offset: f32,
}

impl Default for CoordinatorMotorState {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_participant: true,
            load_participant: true,
            priority: MotorPriority::Normal,
            last_position: 0.0,
            settled: false,
            profile_active: false,
            offset: 0.0,
        }
    }
}

/// One motor's part of a move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveTarget {
    /// Motor to move.
    pub motor: MotorId,
    /// Absolute target position.
    pub position: Degrees,
    /// Cruise velocity; defaults to the motor maximum.
    pub velocity: Option<DegreesPerSec>,
    /// Acceleration; defaults to the motor maximum.
    pub acceleration: Option<DegreesPerSecSquared>,
}

impl MoveTarget {
    /// Move at the motor's maximum velocity and acceleration.
    pub fn new(motor: MotorId, position: Degrees) -> Self {
        Self {
            motor,
            position,
            velocity: None,
            acceleration: None,
        }
    }

    /// Use a specific cruise velocity.
    pub fn with_velocity(mut self, velocity: DegreesPerSec) -> Self {
        self.velocity = Some(velocity);
        self
    }

    /// Use a specific acceleration.
    pub fn with_acceleration(mut self, acceleration: DegreesPerSecSquared) -> Self {
        self.acceleration = Some(acceleration);
        self
    }
}

/// A move of several motors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordinatedMove {
    /// Per-motor targets.
    pub targets: Vec<MoveTarget, MAX_MOTORS>,
    /// Profile shape for every motor.
    pub profile: ProfileKind,
}

impl CoordinatedMove {
    /// Empty move with the given profile shape.
    pub fn new(profile: ProfileKind) -> Self {
        Self {
            targets: Vec::new(),
            profile,
        }
    }

    /// Add a target.
    pub fn push(&mut self, target: MoveTarget) -> Result<()> {
        self.targets
            .push(target)
            .map_err(|_| Error::Config(ConfigError::TooManyMotors))
    }

    /// Builder form of [`push`](Self::push) for fixed targets.
    pub fn with(mut self, motor: MotorId, position: f32) -> Result<Self> {
        self.push(MoveTarget::new(motor, Degrees(position)))?;
        Ok(self)
    }
}

/// Planned trajectory for one participant, before anything is started.
#[derive(Debug, Clone)]
struct Plan {
    slot: usize,
    request: MotionRequest,
    trajectory: Option<Trajectory>,
}

/// Multi-motor coordinator.
#[derive(Debug, Clone)]
pub struct Coordinator {
    mode: CoordinationMode,
    config: CoordinationConfig,
    motors: [CoordinatorMotorState; MAX_MOTORS],
    executors: [MotionExecutor; MAX_MOTORS],
    participants: [bool; MAX_MOTORS],
    balance_offset: [f32; MAX_MOTORS],
    distance: [f32; MAX_MOTORS],
    offset_from: [f32; MAX_MOTORS],
    master_span: (f32, f32),
    active: bool,
    drift_reported: bool,
    last_balance_us: Option<u64>,
    completed_moves: u32,
    aborted_moves: u32,
}

impl Coordinator {
    /// Create an idle coordinator in independent mode.
    pub fn new(config: CoordinationConfig) -> Self {
        Self {
            mode: CoordinationMode::Independent,
            config,
            motors: [CoordinatorMotorState::default(); MAX_MOTORS],
            executors: core::array::from_fn(|_| MotionExecutor::new()),
            participants: [false; MAX_MOTORS],
            balance_offset: [0.0; MAX_MOTORS],
            distance: [0.0; MAX_MOTORS],
            offset_from: [0.0; MAX_MOTORS],
            master_span: (0.0, 0.0),
            active: false,
            drift_reported: false,
            last_balance_us: None,
            completed_moves: 0,
            aborted_moves: 0,
        }
    }

    /// Current policy.
    #[inline]
    pub fn mode(&self) -> CoordinationMode {
        self.mode
    }

    /// Whether a coordinated move is running.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of coordinated moves completed.
    #[inline]
    pub fn completed_moves(&self) -> u32 {
        self.completed_moves
    }

    /// Number of coordinated moves ended by a fault or an emergency stop.
    #[inline]
    pub fn aborted_moves(&self) -> u32 {
        self.aborted_moves
    }

    /// Coordinator state of a motor.
    pub fn motor_state(&self, motor: MotorId) -> Option<&CoordinatorMotorState> {
        self.motors.get(motor as usize)
    }

    /// Whether a motor takes part in the running coordinated move.
    pub fn is_participant(&self, motor: MotorId) -> bool {
        self.active && self.participants.get(motor as usize).copied().unwrap_or(false)
    }

    /// Executor of a motor.
    pub fn executor(&self, motor: MotorId) -> Option<&MotionExecutor> {
        self.executors.get(motor as usize)
    }

    /// Whether any motor has a trajectory running.
    pub fn any_profile_active(&self) -> bool {
        self.executors.iter().any(|e| e.is_active())
    }

    /// Change the policy. Rejected while a coordinated move is running.
    pub fn set_mode(&mut self, mode: CoordinationMode) -> Result<()> {
        if self.active {
            return Err(CoordinationError::MotionAlreadyActive.into());
        }
        if let CoordinationMode::MasterSlave { master } = mode {
            if master as usize >= MAX_MOTORS {
                return Err(CoordinationError::InvalidMaster(master).into());
            }
        }
        info!("coordination mode changed");
        self.mode = mode;
        Ok(())
    }

    /// Include or exclude a motor from coordinated moves.
    pub fn set_motor_enabled(&mut self, motor: MotorId, enabled: bool) -> Result<()> {
        self.slot_mut(motor)?.enabled = enabled;
        Ok(())
    }

    /// Choose which policies a motor takes part in.
    pub fn set_participation(&mut self, motor: MotorId, sync: bool, load: bool) -> Result<()> {
        let state = self.slot_mut(motor)?;
        state.sync_participant = sync;
        state.load_participant = load;
        Ok(())
    }

    /// Set a motor's processing priority.
    pub fn set_priority(&mut self, motor: MotorId, priority: MotorPriority) -> Result<()> {
        self.slot_mut(motor)?.priority = priority;
        Ok(())
    }

    /// Override the master/slave offset of a slave.
    pub fn set_slave_offset(&mut self, motor: MotorId, offset: Degrees) -> Result<()> {
        self.slot_mut(motor)?.offset = offset.0;
        Ok(())
    }

    /// Start a coordinated move.
    ///
    /// Every check happens before anything is started: on error no executor
    /// or controller is touched. Motors disabled in the coordinator or in
    /// their controller are skipped.
    pub fn coordinated_move(&mut self, command: &CoordinatedMove, controllers: &mut [PositionController]) -> Result<()> {
        if self.active {
            return Err(CoordinationError::MotionAlreadyActive.into());
        }
        if command.targets.is_empty() {
            return Err(CoordinationError::EmptyCommand.into());
        }

        let mut seen = [false; MAX_MOTORS];
        let mut plans: Vec<Plan, MAX_MOTORS> = Vec::new();

        for target in &command.targets {
            let motor = target.motor as usize;
            if motor >= MAX_MOTORS {
                return Err(ControlError::InvalidMotorId(target.motor).into());
            }
            if seen[motor] {
                return Err(CoordinationError::DuplicateMotor(target.motor).into());
            }
            seen[motor] = true;

            let slot = find(controllers, target.motor)?;
            if !self.motors[motor].enabled || !controllers[slot].is_enabled() {
                debug!("motor {=u8} skipped: disabled", target.motor);
                continue;
            }
            controllers[slot].check_ready()?;

            let _ = plans.push(Plan {
                slot,
                request: self.request_for(target, &controllers[slot], command.profile),
                trajectory: None,
            });
        }

        if plans.is_empty() {
            return Err(CoordinationError::NoMotorsEnabled.into());
        }

        let mut offsets = [None; MAX_MOTORS];
        let mut master_span = (0.0, 0.0);
        match self.mode {
            CoordinationMode::Independent => {}
            CoordinationMode::Synchronized => {}
            CoordinationMode::LoadSharing => self.split_load(&mut plans, controllers),
            CoordinationMode::MasterSlave { master } => {
                let master_plan = plans
                    .iter()
                    .find(|p| controllers[p.slot].id() == master)
                    .ok_or(Error::Coordination(CoordinationError::InvalidMaster(master)))?;
                master_span = (master_plan.request.start, master_plan.request.end);
                for plan in plans.iter().filter(|p| controllers[p.slot].id() != master) {
                    let from = plan.request.start - master_span.0;
                    let to = plan.request.end - master_span.1;
                    offsets[controllers[plan.slot].id() as usize] = Some((from, to));
                }
            }
        }
        let master_moves = fabsf(master_span.1 - master_span.0) > MIN_MASTER_TRAVEL;

        for plan in plans.iter_mut() {
            let controller = &controllers[plan.slot];
            controller.check_in_travel(plan.request.end)?;
            let follows = offsets[controller.id() as usize].is_some() && master_moves;
            if !follows {
                plan.trajectory = Some(Trajectory::generate(&plan.request, controller.limits())?);
            }
        }

        if self.mode == CoordinationMode::Synchronized {
            self.synchronize(&mut plans, controllers)?;
        }

        // Everything validated: commit.
        self.participants = [false; MAX_MOTORS];
        self.balance_offset = [0.0; MAX_MOTORS];
        self.master_span = master_span;
        for plan in plans.iter_mut() {
            let id = controllers[plan.slot].id();
            let motor = id as usize;
            self.participants[motor] = true;
            self.distance[motor] = plan.request.distance();
            if let Some((from, to)) = offsets[motor] {
                self.offset_from[motor] = from;
                self.motors[motor].offset = to;
            }
            if let Some(trajectory) = plan.trajectory.take() {
                self.executors[motor].start(trajectory);
                self.motors[motor].profile_active = true;
            }
            self.motors[motor].settled = false;
        }
        self.active = true;
        self.drift_reported = false;
        self.last_balance_us = None;

        info!("coordinated move started with {=u8} motors", plans.len() as u8);
        Ok(())
    }

    /// Start a move on one motor outside any coordinated move.
    pub fn start_single(
        &mut self,
        target: &MoveTarget,
        profile: ProfileKind,
        controllers: &mut [PositionController],
    ) -> Result<()> {
        let motor = target.motor as usize;
        if motor >= MAX_MOTORS {
            return Err(ControlError::InvalidMotorId(target.motor).into());
        }
        if self.is_participant(target.motor) {
            return Err(CoordinationError::MotionAlreadyActive.into());
        }
        let slot = find(controllers, target.motor)?;
        let controller = &controllers[slot];
        controller.check_ready()?;
        controller.check_in_travel(target.position.0)?;

        let request = self.request_for(target, controller, profile);
        let trajectory = Trajectory::generate(&request, controller.limits())?;

        self.executors[motor].start(trajectory);
        self.motors[motor].profile_active = true;
        self.motors[motor].settled = false;
        self.balance_offset[motor] = 0.0;
        info!("motor {=u8} move to {=f32}", target.motor, target.position.0);
        Ok(())
    }

    /// Sample every running trajectory and hand the targets to the
    /// controllers. Slaves are pointed at the master position plus their
    /// offset, blended in over the master's travel.
    ///
    /// Must run before the controllers compute in the same tick.
    pub fn advance_profiles(&mut self, dt: f32, controllers: &mut [PositionController]) -> Result<()> {
        for motor in self.processing_order() {
            let Ok(slot) = find(controllers, motor as MotorId) else {
                continue;
            };
            if let Some(mut sample) = self.executors[motor].tick(dt)? {
                sample.position += self.balance_offset[motor];
                controllers[slot].track(&sample);
            }
            self.motors[motor].profile_active = self.executors[motor].is_active();
        }

        if let (true, CoordinationMode::MasterSlave { master }) = (self.active, self.mode) {
            let Ok(master_slot) = find(controllers, master) else {
                return Ok(());
            };
            let master_position = controllers[master_slot].position();
            let master_velocity = controllers[master_slot].state().target_velocity;
            let (start, end) = self.master_span;
            let span = end - start;
            let progress = if fabsf(span) > MIN_MASTER_TRAVEL {
                Some((controllers[master_slot].target() - start) / span)
            } else {
                None
            };

            for motor in self.processing_order() {
                if motor == master as usize || !self.participants[motor] || self.executors[motor].is_active() {
                    continue;
                }
                let Ok(slot) = find(controllers, motor as MotorId) else {
                    continue;
                };
                let to = self.motors[motor].offset;
                let shift = to - self.offset_from[motor];
                let (offset, velocity) = match progress {
                    Some(p) if p < 1.0 => {
                        let blend = p.max(0.0);
                        (self.offset_from[motor] + shift * blend, master_velocity * (1.0 + shift / span))
                    }
                    _ => (to, master_velocity),
                };
                let travel = *controllers[slot].travel();
                let position = travel.clamp(Degrees(master_position + offset)).0;
                controllers[slot].track(&Sample {
                    position,
                    velocity,
                    acceleration: 0.0,
                    phase: MotionPhase::ConstantVelocity,
                });
            }
        }
        Ok(())
    }

    /// Refresh cached state, apply mode-specific adjustment and detect
    /// completion.
    ///
    /// Returns `true` on the tick a coordinated move completes.
    pub fn update<F: FaultReporter>(&mut self, now_us: u64, controllers: &mut [PositionController], faults: &mut F) -> bool {
        for motor in 0..MAX_MOTORS {
            if let Ok(slot) = find(controllers, motor as MotorId) {
                let state = &mut self.motors[motor];
                state.last_position = controllers[slot].position();
                state.settled = controllers[slot].is_settled();
                state.profile_active = self.executors[motor].is_active();
            }
        }

        if !self.active {
            return false;
        }

        match self.mode {
            CoordinationMode::Synchronized => self.check_drift(controllers, faults),
            CoordinationMode::LoadSharing => self.balance_load(now_us, controllers, faults),
            CoordinationMode::Independent | CoordinationMode::MasterSlave { .. } => {}
        }

        let done = (0..MAX_MOTORS)
            .filter(|&m| self.participants[m])
            .all(|m| self.motors[m].settled && !self.motors[m].profile_active);
        if done {
            self.active = false;
            self.completed_moves = self.completed_moves.wrapping_add(1);
            info!("coordinated move complete");
        }
        done
    }

    /// Request a controlled stop of every running trajectory.
    ///
    /// Takes effect on the next [`advance_profiles`](Self::advance_profiles).
    pub fn stop(&mut self) {
        for executor in self.executors.iter_mut() {
            executor.request_stop();
        }
        info!("stop requested");
    }

    /// Request a controlled stop of one motor.
    pub fn stop_motor(&mut self, motor: MotorId) -> Result<()> {
        let executor = self
            .executors
            .get_mut(motor as usize)
            .ok_or(Error::Control(ControlError::InvalidMotorId(motor)))?;
        executor.request_stop();
        Ok(())
    }

    /// Drop every trajectory and hold the controllers where they are.
    pub fn emergency_stop(&mut self, controllers: &mut [PositionController]) {
        for executor in self.executors.iter_mut() {
            executor.emergency_stop();
        }
        for controller in controllers.iter_mut() {
            controller.hold_position();
        }
        for state in self.motors.iter_mut() {
            state.profile_active = false;
        }
        self.mark_aborted();
        warn!("coordinator emergency stop");
    }

    /// End the running coordinated move after a fault.
    ///
    /// Every participant gets a controlled stop. The move is counted as
    /// aborted and never as completed.
    pub fn abort_move(&mut self) {
        if !self.active {
            return;
        }
        for motor in 0..MAX_MOTORS {
            if self.participants[motor] {
                self.executors[motor].request_stop();
            }
        }
        self.mark_aborted();
        warn!("coordinated move aborted");
    }

    fn mark_aborted(&mut self) {
        if self.active {
            self.active = false;
            self.aborted_moves = self.aborted_moves.wrapping_add(1);
        }
    }

    /// Drop one motor's trajectory immediately.
    pub fn abort_motor(&mut self, motor: MotorId) {
        if let Some(executor) = self.executors.get_mut(motor as usize) {
            executor.emergency_stop();
            self.motors[motor as usize].profile_active = false;
        }
    }

    /// Mean progress of the running coordinated move, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        let mut sum = 0.0;
        let mut count = 0u32;
        for motor in 0..MAX_MOTORS {
            if self.participants[motor] && self.executors[motor].trajectory().is_some() {
                sum += self.executors[motor].progress();
                count += 1;
            }
        }
        if count == 0 {
            1.0
        } else {
            sum / count as f32
        }
    }

    fn slot_mut(&mut self, motor: MotorId) -> Result<&mut CoordinatorMotorState> {
        self.motors
            .get_mut(motor as usize)
            .ok_or(Error::Control(ControlError::InvalidMotorId(motor)))
    }

    fn request_for(&self, target: &MoveTarget, controller: &PositionController, profile: ProfileKind) -> MotionRequest {
        let limits = controller.limits();
        MotionRequest {
            kind: profile,
            start: controller.target(),
            end: target.position.0,
            max_velocity: target.velocity.map(|v| v.0).unwrap_or(limits.max_velocity),
            acceleration: target.acceleration.map(|a| a.0).unwrap_or(limits.max_acceleration),
            deceleration: None,
            jerk_time: None,
        }
    }

    fn processing_order(&self) -> [usize; MAX_MOTORS] {
        let mut order: [usize; MAX_MOTORS] = core::array::from_fn(|i| i);
        // Stable insertion sort, highest priority first.
        for i in 1..MAX_MOTORS {
            let mut j = i;
            while j > 0 && self.motors[order[j - 1]].priority < self.motors[order[j]].priority {
                order.swap(j - 1, j);
                j -= 1;
            }
        }
        order
    }

    fn split_load(&self, plans: &mut Vec<Plan, MAX_MOTORS>, controllers: &[PositionController]) {
        let mut total = 0.0;
        let mut count = 0u32;
        for plan in plans.iter() {
            if self.motors[controllers[plan.slot].id() as usize].load_participant {
                total += plan.request.end - plan.request.start;
                count += 1;
            }
        }
        if count == 0 {
            return;
        }
        let share = total / count as f32;
        for plan in plans.iter_mut() {
            if self.motors[controllers[plan.slot].id() as usize].load_participant {
                plan.request.end = plan.request.start + share;
            }
        }
    }

    fn synchronize(&self, plans: &mut Vec<Plan, MAX_MOTORS>, controllers: &[PositionController]) -> Result<()> {
        let mut t_max = 0.0_f32;
        for plan in plans.iter() {
            if let Some(t) = plan.trajectory.as_ref() {
                if self.motors[controllers[plan.slot].id() as usize].sync_participant {
                    t_max = t_max.max(t.total_time());
                }
            }
        }
        if t_max <= 0.0 {
            return Ok(());
        }

        for plan in plans.iter_mut() {
            let motor = controllers[plan.slot].id() as usize;
            if !self.motors[motor].sync_participant {
                continue;
            }
            let Some(current) = plan.trajectory.as_ref() else {
                continue;
            };
            let t = current.total_time();
            if current.is_zero() || t >= t_max {
                continue;
            }

            let limits = controllers[plan.slot].limits();
            let base = plan.request.max_velocity;

            // Proportional first guess narrows the bracket, bisection does the
            // rest: duration is non-increasing in cruise velocity.
            let mut request = plan.request;
            request.max_velocity = base * t / t_max;
            let guess = Trajectory::generate(&request, limits)?;

            let (mut low, mut high) = (base * 1e-4, base);
            let mut best = current.clone();
            if guess.total_time() > t_max {
                low = request.max_velocity;
            } else {
                high = request.max_velocity;
                best = guess;
            }
            for _ in 0..SYNC_REFINE_STEPS {
                let mid = 0.5 * (low + high);
                request.max_velocity = mid;
                let candidate = Trajectory::generate(&request, limits)?;
                if candidate.total_time() > t_max {
                    low = mid;
                } else {
                    high = mid;
                    best = candidate;
                }
            }

            plan.request.max_velocity = best.max_velocity();
            plan.trajectory = Some(best);
        }
        Ok(())
    }

    fn check_drift<F: FaultReporter>(&mut self, controllers: &[PositionController], faults: &mut F) {
        if self.drift_reported {
            return;
        }
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for motor in 0..MAX_MOTORS {
            if !self.participants[motor] || !self.motors[motor].sync_participant || self.distance[motor] <= 0.0 {
                continue;
            }
            let Ok(slot) = find(controllers, motor as MotorId) else {
                continue;
            };
            let lag = fabsf(controllers[slot].error()) / self.distance[motor];
            lo = lo.min(lag);
            hi = hi.max(lag);
        }
        if hi > lo && hi - lo > self.config.sync_tolerance {
            warn!("synchronization drift {=f32}", hi - lo);
            faults.report_fault(None, FaultKind::SynchronizationDrift);
            self.drift_reported = true;
        }
    }

    fn balance_load<F: FaultReporter>(&mut self, now_us: u64, controllers: &mut [PositionController], faults: &mut F) {
        let interval_us = u64::from(self.config.load_balance_interval_ms) * 1_000;
        match self.last_balance_us {
            Some(last) if now_us.saturating_sub(last) < interval_us => return,
            _ => self.last_balance_us = Some(now_us),
        }

        let mut sum = 0.0;
        let mut count = 0u32;
        for motor in 0..MAX_MOTORS {
            if self.participants[motor] && self.motors[motor].load_participant {
                sum += self.motors[motor].last_position;
                count += 1;
            }
        }
        if count < 2 {
            return;
        }
        let average = sum / count as f32;

        for motor in 0..MAX_MOTORS {
            if !self.participants[motor] || !self.motors[motor].load_participant {
                continue;
            }
            if fabsf(self.motors[motor].last_position - average) <= self.config.load_balance_threshold.0 {
                continue;
            }
            let Ok(slot) = find(controllers, motor as MotorId) else {
                continue;
            };
            let target = controllers[slot].target();
            let nudge = 0.5 * (average - target);
            if self.executors[motor].is_active() {
                self.balance_offset[motor] += nudge;
            } else {
                controllers[slot].track(&Sample {
                    position: target + nudge,
                    velocity: 0.0,
                    acceleration: 0.0,
                    phase: MotionPhase::Complete,
                });
            }
            debug!("motor {=u8} load balance nudge {=f32}", motor as u8, nudge);
            faults.report_fault(Some(motor as MotorId), FaultKind::LoadImbalance);
        }
    }
}

fn find(controllers: &[PositionController], motor: MotorId) -> Result<usize> {
    controllers
        .iter()
        .position(|c| c.id() == motor)
        .ok_or(Error::Control(ControlError::InvalidMotorId(motor)))
}
