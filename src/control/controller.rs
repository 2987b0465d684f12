//! Closed-loop position controller for one motor.
//!
//! Each control tick reads the encoder, low-pass filters the position,
//! computes PID plus feedforward and produces a velocity command. The
//! computation ([`PositionController::compute`]) is separate from sending
//! ([`PositionController::apply`]) so a safety check can sit in between.

use libm::fabsf;

use super::feedforward::{feedforward_compute, FeedforwardGains};
use super::filter::LowPass;
use super::homing::{HomingInputs, HomingSequence, HomingStep};
use super::pid::{pid_compute, PidGains, PidState};
use crate::config::{ControlConfig, Degrees, DegreesPerSec, HomingConfig, MotorConfig, TravelRange};
use crate::error::{ControlError, Error, Result};
use crate::hal::{FaultKind, FaultReporter, HomeSensors, MotorDriver, MotorId, PositionEncoder};
use crate::motion::{MotionLimits, Sample};

/// Snapshot of a controller's state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionControllerState {
    /// Last measured position (degrees, after re-zeroing).
    pub current_position: f32,
    /// Commanded position.
    pub target_position: f32,
    /// Low-pass filtered position.
    pub filtered_position: f32,
    /// `target_position - filtered_position`.
    pub position_error: f32,
    /// Filtered velocity estimate (deg/s).
    pub velocity: f32,
    /// Target velocity from the trajectory (deg/s).
    pub target_velocity: f32,
    /// Loop closed.
    pub enabled: bool,
    /// Reference established.
    pub homed: bool,
    /// Last encoder read succeeded.
    pub position_valid: bool,
    /// Filtered position on the previous cycle.
    pub prev_position: f32,
    /// Error on the previous cycle.
    pub prev_error: f32,
    /// Velocity command issued on the previous cycle.
    pub prev_output: f32,
    /// Target velocity on the previous cycle.
    pub prev_target_velocity: f32,
    /// Raw encoder reading that maps to zero.
    pub zero_offset: f32,
}

/// Result of one control computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
    /// Velocity command, clamped to the output limit.
    pub velocity: DegreesPerSec,
    /// Filtered position used for the error.
    pub position: f32,
    /// Position error.
    pub error: f32,
    /// Filtered velocity estimate.
    pub measured_velocity: f32,
}

/// Progress of a homing run, see [`PositionController::tick_homing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingStatus {
    /// Still searching.
    InProgress,
    /// Reference established; the loop is closed at the new zero.
    Complete,
}

/// Position controller for one motor.
#[derive(Debug, Clone)]
pub struct PositionController {
    id: MotorId,
    config: ControlConfig,
    travel: TravelRange,
    limits: MotionLimits,
    homing_config: Option<HomingConfig>,
    requires_homing: bool,
    state: PositionControllerState,
    pid: PidState,
    position_filter: LowPass,
    velocity_filter: LowPass,
    homing: Option<HomingSequence>,
}

impl PositionController {
    /// Create a disabled controller from a motor configuration.
    pub fn new(config: &MotorConfig) -> Self {
        Self {
            id: config.id,
            config: config.control,
            travel: config.travel,
            limits: config.motion_limits(),
            homing_config: config.homing,
            requires_homing: config.requires_homing(),
            state: PositionControllerState::default(),
            pid: PidState::default(),
            position_filter: LowPass::new(config.control.position_filter),
            velocity_filter: LowPass::new(config.control.velocity_filter),
            homing: None,
        }
    }

    /// Motor id.
    #[inline]
    pub fn id(&self) -> MotorId {
        self.id
    }

    /// Current state snapshot.
    #[inline]
    pub fn state(&self) -> &PositionControllerState {
        &self.state
    }

    /// Tuning in use.
    #[inline]
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Motor maxima for trajectory requests.
    #[inline]
    pub fn limits(&self) -> &MotionLimits {
        &self.limits
    }

    /// Absolute travel range.
    #[inline]
    pub fn travel(&self) -> &TravelRange {
        &self.travel
    }

    /// Check if the loop is closed.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    /// Check if a reference has been established.
    #[inline]
    pub fn is_homed(&self) -> bool {
        self.state.homed
    }

    /// Check if a homing run is active.
    #[inline]
    pub fn is_homing(&self) -> bool {
        self.homing.as_ref().map(|h| h.is_running()).unwrap_or(false)
    }

    /// Filtered position.
    #[inline]
    pub fn position(&self) -> f32 {
        self.state.filtered_position
    }

    /// Filtered velocity estimate.
    #[inline]
    pub fn velocity(&self) -> f32 {
        self.state.velocity
    }

    /// Commanded position.
    #[inline]
    pub fn target(&self) -> f32 {
        self.state.target_position
    }

    /// Position error of the last computation.
    #[inline]
    pub fn error(&self) -> f32 {
        self.state.position_error
    }

    /// Check if moves must wait for homing.
    #[inline]
    pub fn homing_required(&self) -> bool {
        self.requires_homing && !self.state.homed
    }

    /// Whether position error and velocity are inside the settle tolerances.
    pub fn is_settled(&self) -> bool {
        self.state.enabled
            && self.state.position_valid
            && fabsf(self.state.position_error) <= self.config.settle_position_tolerance.0
            && fabsf(self.state.velocity) <= self.config.settle_velocity_tolerance.0
    }

    /// Check that the motor may accept a new move.
    pub fn check_ready(&self) -> Result<()> {
        if !self.state.enabled {
            return Err(ControlError::MotorDisabled(self.id).into());
        }
        if self.is_homing() {
            return Err(ControlError::HomingInProgress(self.id).into());
        }
        if self.homing_required() {
            return Err(ControlError::NotHomed(self.id).into());
        }
        Ok(())
    }

    /// Check that a position lies inside the travel range.
    pub fn check_in_travel(&self, position: f32) -> Result<()> {
        if !position.is_finite() || !self.travel.contains(Degrees(position)) {
            return Err(ControlError::TargetOutOfRange {
                target: position,
                min: self.travel.min.0,
                max: self.travel.max.0,
            }
            .into());
        }
        Ok(())
    }

    /// Enable or disable the loop.
    ///
    /// Enabling a disabled controller clears the integral and re-seeds the
    /// position (and target) from the encoder, so closing the loop does not
    /// produce a step.
    pub fn enable<E: PositionEncoder>(&mut self, encoder: &mut E, enabled: bool) -> Result<()> {
        if enabled == self.state.enabled {
            return Ok(());
        }

        if !enabled {
            self.state.enabled = false;
            self.state.prev_output = 0.0;
            if let Some(homing) = self.homing.as_mut() {
                homing.abort();
            }
            info!("motor {=u8} disabled", self.id);
            return Ok(());
        }

        let position = self.read(encoder)?;
        self.pid.reset();
        self.position_filter.seed(position);
        self.velocity_filter.seed(0.0);
        self.state.current_position = position;
        self.state.filtered_position = position;
        self.state.prev_position = position;
        self.state.target_position = position;
        self.state.target_velocity = 0.0;
        self.state.prev_target_velocity = 0.0;
        self.state.position_error = 0.0;
        self.state.prev_error = 0.0;
        self.state.velocity = 0.0;
        self.state.enabled = true;

        info!("motor {=u8} enabled at {=f32}", self.id, position);
        Ok(())
    }

    /// Set a fixed target position.
    ///
    /// Rejected (without changing state) if the motor is disabled, needs
    /// homing, or the position is outside the travel range.
    pub fn set_target(&mut self, position: Degrees) -> Result<()> {
        self.check_ready()?;
        self.check_in_travel(position.0)?;

        self.state.target_position = position.0;
        self.state.target_velocity = 0.0;
        Ok(())
    }

    /// Follow a trajectory sample.
    pub fn track(&mut self, sample: &Sample) {
        self.state.target_position = sample.position;
        self.state.target_velocity = sample.velocity;
    }

    /// Drop the current target and hold the filtered position.
    pub fn hold_position(&mut self) {
        self.state.target_position = self.state.filtered_position;
        self.state.target_velocity = 0.0;
        self.state.prev_target_velocity = 0.0;
        self.state.position_error = 0.0;
        self.pid.reset();
    }

    /// Compute a velocity command without sending it.
    ///
    /// An encoder failure marks the position invalid until the next good
    /// read. An error beyond `max_position_error` is reported through the
    /// fault sink and returned; no command is produced for that cycle.
    pub fn compute<H>(&mut self, hw: &mut H, dt: f32) -> Result<ControlOutput>
    where
        H: PositionEncoder + FaultReporter,
    {
        if !self.state.enabled {
            return Err(ControlError::MotorDisabled(self.id).into());
        }
        if dt <= 0.0 {
            return Ok(self.idle_output());
        }

        let position = match self.read(hw) {
            Ok(p) => p,
            Err(e) => {
                hw.report_fault(Some(self.id), FaultKind::EncoderCommunication);
                return Err(e);
            }
        };

        let filtered = self.position_filter.update(position);
        let raw_velocity = (filtered - self.state.prev_position) / dt;
        let velocity = self.velocity_filter.update(raw_velocity);
        let error = self.state.target_position - filtered;

        self.state.current_position = position;
        self.state.filtered_position = filtered;
        self.state.velocity = velocity;
        self.state.position_error = error;
        self.state.prev_position = filtered;

        let max_error = self.config.max_position_error.0;
        if fabsf(error) > max_error {
            warn!("motor {=u8} position error {=f32} exceeds {=f32}", self.id, error, max_error);
            hw.report_fault(Some(self.id), FaultKind::PositionErrorExceeded);
            return Err(ControlError::PositionErrorExceeded {
                motor: self.id,
                error,
                max: max_error,
            }
            .into());
        }

        let gains = self.pid_gains();
        let pid = pid_compute(&mut self.pid, &gains, error, dt);

        let target_acceleration = (self.state.target_velocity - self.state.prev_target_velocity) / dt;
        let ff = feedforward_compute(&self.ff_gains(), self.state.target_velocity, target_acceleration);
        self.state.prev_target_velocity = self.state.target_velocity;

        let limit = fabsf(self.config.output_limit.0);
        let output = (pid + ff).clamp(-limit, limit);

        self.state.prev_error = error;

        Ok(ControlOutput {
            velocity: DegreesPerSec(output),
            position: filtered,
            error,
            measured_velocity: velocity,
        })
    }

    /// Send a velocity command to the driver.
    pub fn apply<D: MotorDriver + FaultReporter>(&mut self, driver: &mut D, velocity: DegreesPerSec) -> Result<()> {
        if let Err(e) = driver.send_velocity(self.id, velocity) {
            driver.report_fault(Some(self.id), FaultKind::DriverCommunication);
            return Err(e.into());
        }
        self.state.prev_output = velocity.0;
        Ok(())
    }

    /// Compute and immediately send. Use [`compute`](Self::compute) and
    /// [`apply`](Self::apply) when a safety check must sit in between.
    pub fn update<H>(&mut self, hw: &mut H, dt: f32) -> Result<ControlOutput>
    where
        H: PositionEncoder + MotorDriver + FaultReporter,
    {
        let output = self.compute(hw, dt)?;
        self.apply(hw, output.velocity)?;
        Ok(output)
    }

    /// Start the configured homing sequence.
    pub fn start_homing(&mut self, now_us: u64) -> Result<()> {
        let config = self
            .homing_config
            .ok_or(Error::Control(ControlError::HomingNotConfigured(self.id)))?;
        if !self.state.enabled {
            return Err(ControlError::MotorDisabled(self.id).into());
        }
        if self.is_homing() {
            return Err(ControlError::HomingInProgress(self.id).into());
        }

        let mut sequence = HomingSequence::new(config);
        sequence.start(now_us);
        self.homing = Some(sequence);
        self.state.homed = false;
        Ok(())
    }

    /// Run one homing tick.
    ///
    /// While searching, the loop is open and the search velocity goes
    /// straight to the driver. On completion the position is re-zeroed so
    /// the reference reads `home_offset`, `homed` is set and the loop closes
    /// at the new reference. On timeout the driver is soft-stopped (hard
    /// stop if that fails) and [`ControlError::HomingTimeout`] is returned.
    pub fn tick_homing<H>(&mut self, hw: &mut H, now_us: u64) -> Result<HomingStatus>
    where
        H: PositionEncoder + MotorDriver + HomeSensors + FaultReporter,
    {
        let Some(sequence) = self.homing.as_mut() else {
            return Err(ControlError::HomingNotConfigured(self.id).into());
        };
        if !sequence.is_running() {
            return Ok(HomingStatus::Complete);
        }

        let raw = hw.read_position(self.id).map_err(|e| {
            self.state.position_valid = false;
            Error::from(e)
        })?;
        self.state.position_valid = true;
        let position = raw.0 - self.state.zero_offset;

        let switch_active = if sequence.needs_switch() {
            hw.limit_switch_active(self.id)?
        } else {
            false
        };
        let index_detected = if sequence.needs_index() {
            hw.index_detected(self.id)?
        } else {
            false
        };

        let step = sequence.tick(HomingInputs {
            now_us,
            position,
            switch_active,
            index_detected,
        });
        let home_offset = sequence.config().home_offset.0;

        match step {
            HomingStep::Drive(velocity) => {
                self.state.current_position = position;
                self.apply(hw, DegreesPerSec(velocity))?;
                Ok(HomingStatus::InProgress)
            }
            HomingStep::Done { reference } => {
                self.homing = None;
                self.apply(hw, DegreesPerSec(0.0))?;

                let shift = reference - home_offset;
                self.state.zero_offset += shift;
                let position = position - shift;
                self.position_filter.seed(position);
                self.velocity_filter.seed(0.0);
                self.pid.reset();
                self.state.current_position = position;
                self.state.filtered_position = position;
                self.state.prev_position = position;
                self.state.target_position = position;
                self.state.target_velocity = 0.0;
                self.state.prev_target_velocity = 0.0;
                self.state.position_error = 0.0;
                self.state.homed = true;
                Ok(HomingStatus::Complete)
            }
            HomingStep::TimedOut => {
                self.homing = None;
                if hw.soft_stop(self.id).is_err() && hw.hard_stop(self.id).is_err() {
                    hw.report_fault(Some(self.id), FaultKind::DriverCommunication);
                }
                hw.report_fault(Some(self.id), FaultKind::HomingTimeout);
                self.hold_position();
                Err(ControlError::HomingTimeout(self.id).into())
            }
            HomingStep::Idle => Ok(HomingStatus::Complete),
        }
    }

    /// Abort a running homing sequence.
    pub fn abort_homing(&mut self) {
        if let Some(mut sequence) = self.homing.take() {
            sequence.abort();
        }
    }

    fn read<E: PositionEncoder>(&mut self, encoder: &mut E) -> Result<f32> {
        match encoder.read_position(self.id) {
            Ok(raw) => {
                self.state.position_valid = true;
                Ok(raw.0 - self.state.zero_offset)
            }
            Err(e) => {
                self.state.position_valid = false;
                warn!("motor {=u8} encoder read failed", self.id);
                Err(e.into())
            }
        }
    }

    fn idle_output(&self) -> ControlOutput {
        ControlOutput {
            velocity: DegreesPerSec(self.state.prev_output),
            position: self.state.filtered_position,
            error: self.state.position_error,
            measured_velocity: self.state.velocity,
        }
    }

    fn pid_gains(&self) -> PidGains {
        PidGains {
            kp: self.config.kp,
            ki: self.config.ki,
            kd: self.config.kd,
            integral_limit: self.config.integral_limit,
        }
    }

    fn ff_gains(&self) -> FeedforwardGains {
        FeedforwardGains {
            kv: self.config.velocity_feedforward,
            ka: self.config.acceleration_feedforward,
            friction: self.config.static_friction,
        }
    }
}
