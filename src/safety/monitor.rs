//! Per-motor position safety monitor.
//!
//! ```text
//! Nominal ──soft / velocity / encoder──▶ ControlledStop ──hard / runaway──▶ EmergencyStop
//!    ▲                                         │                                 │
//!    └────────────── clear_violation ◀─────────┴─────────────────────────────────┘
//! ```
//!
//! Hard-limit and runaway violations always escalate to the system-wide
//! emergency stop. The remaining kinds use the driver's controlled stop and
//! fall back to the emergency stop only if that command fails. Violations
//! latch until [`PositionSafetyMonitor::clear_violation`].
//!
//! The hard-limit check runs even when the monitor is disabled; `enabled`
//! only gates the soft-limit, velocity, runaway and encoder checks.

use libm::fabsf;

use crate::config::PositionSafetyConfig;
use crate::error::{Result, SafetyError};
use crate::hal::{EmergencyStop, FaultKind, FaultReporter, MotorDriver, MotorId, StopSource};

/// Clamping by less than this does not count as exceeding a limit.
pub const LIMIT_TOLERANCE: f32 = 1e-3;

/// Kind of safety violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ViolationKind {
    /// Position beyond an enforced soft limit.
    SoftLimit,
    /// Position beyond a hard limit.
    HardLimit,
    /// Measured speed above the configured maximum.
    Velocity,
    /// Position jumped, or feedback stalled.
    Runaway,
    /// Encoder failed while the motor was moving.
    EncoderFault,
}

impl ViolationKind {
    /// Short name for messages.
    pub fn name(self) -> &'static str {
        match self {
            ViolationKind::SoftLimit => "soft limit",
            ViolationKind::HardLimit => "hard limit",
            ViolationKind::Velocity => "velocity",
            ViolationKind::Runaway => "runaway",
            ViolationKind::EncoderFault => "encoder fault",
        }
    }

    /// Whether this kind always escalates to an emergency stop.
    #[inline]
    pub fn is_emergency(self) -> bool {
        matches!(self, ViolationKind::HardLimit | ViolationKind::Runaway)
    }
}

/// Reaction state of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SafetyState {
    /// No violation latched.
    #[default]
    Nominal,
    /// A controlled stop was issued.
    ControlledStop,
    /// The emergency stop was triggered.
    EmergencyStop,
}

/// Which limit a position is nearest to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitSide {
    /// Lower soft limit.
    SoftMin,
    /// Upper soft limit.
    SoftMax,
    /// Lower hard limit.
    HardMin,
    /// Upper hard limit.
    HardMax,
}

/// Answer of [`PositionSafetyMonitor::validate_target`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetValidation {
    /// Target within the soft limits.
    pub soft_limit_ok: bool,
    /// Target within the hard limits.
    pub hard_limit_ok: bool,
    /// Signed distance to the nearest limit; negative when beyond it.
    pub distance_to_limit: f32,
    /// The nearest limit.
    pub nearest: LimitSide,
}

/// Answer of [`PositionSafetyMonitor::enforce_limits`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnforcedTarget {
    /// Safe position.
    pub position: f32,
    /// Clamping changed the request by more than [`LIMIT_TOLERANCE`].
    pub limit_exceeded: bool,
}

impl EnforcedTarget {
    /// Turn a clamped request into an error.
    pub fn into_result(self, requested: f32) -> core::result::Result<f32, SafetyError> {
        if self.limit_exceeded {
            Err(SafetyError::LimitExceeded {
                requested,
                clamped: self.position,
            })
        } else {
            Ok(self.position)
        }
    }
}

/// Cumulative violation counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ViolationCounters {
    /// Soft-limit violations.
    pub soft_limit: u32,
    /// Hard-limit violations.
    pub hard_limit: u32,
    /// Velocity violations.
    pub velocity: u32,
    /// Runaway detections.
    pub runaway: u32,
    /// Encoder faults while moving.
    pub encoder_fault: u32,
}

impl ViolationCounters {
    fn record(&mut self, kind: ViolationKind) {
        let counter = match kind {
            ViolationKind::SoftLimit => &mut self.soft_limit,
            ViolationKind::HardLimit => &mut self.hard_limit,
            ViolationKind::Velocity => &mut self.velocity,
            ViolationKind::Runaway => &mut self.runaway,
            ViolationKind::EncoderFault => &mut self.encoder_fault,
        };
        *counter = counter.saturating_add(1);
    }

    /// Sum over all categories.
    pub fn total(&self) -> u32 {
        self.soft_limit
            .saturating_add(self.hard_limit)
            .saturating_add(self.velocity)
            .saturating_add(self.runaway)
            .saturating_add(self.encoder_fault)
    }
}

/// Live status of one monitor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionSafetyStatus {
    /// Most recent position.
    pub current_position: f32,
    /// Position before that.
    pub last_position: f32,
    /// Speed computed from the last two samples (deg/s, signed).
    pub velocity: f32,
    /// Time of the most recent update.
    pub last_update_us: Option<u64>,
    /// Latched violation.
    pub violation: Option<ViolationKind>,
    /// Reaction state.
    pub state: SafetyState,
    /// Cumulative counts.
    pub counters: ViolationCounters,
    /// A runaway has been detected since the last clear.
    pub runaway_detected: bool,
    /// Position within the warning margin of a soft limit.
    pub in_warning_zone: bool,
}

/// Safety monitor for one motor.
#[derive(Debug, Clone)]
pub struct PositionSafetyMonitor {
    motor: MotorId,
    config: PositionSafetyConfig,
    status: PositionSafetyStatus,
    // Cleared outside the soft range: soft detection waits until the axis
    // is back inside.
    recovering: bool,
}

impl PositionSafetyMonitor {
    /// Create a monitor. The configuration must already be valid.
    pub fn new(motor: MotorId, config: PositionSafetyConfig) -> Self {
        if !config.enforce_hard_limits {
            warn!("motor {=u8}: hard limits cannot be disabled", motor);
        }
        Self {
            motor,
            config,
            status: PositionSafetyStatus::default(),
            recovering: false,
        }
    }

    /// Motor id.
    #[inline]
    pub fn motor(&self) -> MotorId {
        self.motor
    }

    /// Current configuration.
    #[inline]
    pub fn config(&self) -> &PositionSafetyConfig {
        &self.config
    }

    /// Current status.
    #[inline]
    pub fn status(&self) -> &PositionSafetyStatus {
        &self.status
    }

    /// Whether a violation is latched.
    #[inline]
    pub fn is_latched(&self) -> bool {
        self.status.violation.is_some()
    }

    /// Replace the configuration after validating it.
    pub fn configure(&mut self, config: PositionSafetyConfig) -> Result<()> {
        config.validate()?;
        if !config.enforce_hard_limits {
            warn!("motor {=u8}: hard limits cannot be disabled", self.motor);
        }
        self.config = config;
        Ok(())
    }

    /// Clear a latched violation and forget the feedback history.
    pub fn clear_violation(&mut self) {
        if let Some(kind) = self.status.violation.take() {
            info!("motor {=u8}: {=str} violation cleared", self.motor, kind.name());
        }
        self.status.state = SafetyState::Nominal;
        self.status.runaway_detected = false;
        self.recovering = !self.config.within_soft(self.status.current_position);
        self.status.last_update_us = None;
        self.status.velocity = 0.0;
    }

    /// Restart the feedback history at `position` without any check.
    ///
    /// Used when the position jumps legitimately: closing the loop, or
    /// re-zeroing after homing.
    pub fn rebase(&mut self, position: f32, now_us: u64) {
        self.status.current_position = position;
        self.status.last_position = position;
        self.status.velocity = 0.0;
        self.status.last_update_us = Some(now_us);
    }

    /// Check a prospective target without side effects.
    pub fn validate_target(&self, position: f32) -> TargetValidation {
        let c = &self.config;
        let candidates = [
            (LimitSide::SoftMin, position - c.soft_min.0),
            (LimitSide::SoftMax, c.soft_max.0 - position),
            (LimitSide::HardMin, position - c.hard_min.0),
            (LimitSide::HardMax, c.hard_max.0 - position),
        ];

        let mut nearest = candidates[0];
        for candidate in &candidates[1..] {
            if fabsf(candidate.1) < fabsf(nearest.1) {
                nearest = *candidate;
            }
        }

        TargetValidation {
            soft_limit_ok: c.within_soft(position),
            hard_limit_ok: c.within_hard(position),
            distance_to_limit: nearest.1,
            nearest: nearest.0,
        }
    }

    /// Clamp a requested position to the limits.
    ///
    /// Hard limits always apply; soft limits apply when soft enforcement is
    /// on.
    pub fn enforce_limits(&self, requested: f32) -> EnforcedTarget {
        let c = &self.config;
        let mut position = requested.clamp(c.hard_min.0, c.hard_max.0);
        if c.enforce_soft_limits {
            position = position.clamp(c.soft_min.0, c.soft_max.0);
        }

        let limit_exceeded = fabsf(position - requested) > LIMIT_TOLERANCE;
        if limit_exceeded {
            debug!("motor {=u8}: target {=f32} clamped to {=f32}", self.motor, requested, position);
        }
        EnforcedTarget {
            position,
            limit_exceeded,
        }
    }

    /// Filter a velocity command before it reaches the driver.
    ///
    /// Blocks everything while a violation is latched, clamps to the
    /// configured maximum, and drops motion further outward at an enforced
    /// soft limit.
    pub fn check_command(&self, velocity: f32) -> Result<f32> {
        if self.is_latched() {
            return Err(SafetyError::ViolationLatched(self.motor).into());
        }
        if !self.config.enabled {
            return Ok(velocity);
        }

        let max = fabsf(self.config.max_velocity.0);
        let mut velocity = velocity.clamp(-max, max);

        if self.config.enforce_soft_limits {
            let p = self.status.current_position;
            if (p >= self.config.soft_max.0 && velocity > 0.0) || (p <= self.config.soft_min.0 && velocity < 0.0) {
                velocity = 0.0;
            }
        }
        Ok(velocity)
    }

    /// Feed a measured position.
    ///
    /// Recomputes velocity from the previous sample, checks limits, velocity
    /// and runaway, and reacts to any new or escalated violation. Returns
    /// [`SafetyError::Violation`] when this update triggered a stop, and
    /// [`SafetyError::ViolationLatched`] while an earlier one is latched.
    pub fn update_position<H>(&mut self, position: f32, now_us: u64, hw: &mut H) -> Result<()>
    where
        H: MotorDriver + EmergencyStop + FaultReporter,
    {
        let mut runaway = false;
        let mut velocity = 0.0;

        if let Some(last_us) = self.status.last_update_us {
            let dt_us = now_us.saturating_sub(last_us);
            let delta = position - self.status.current_position;
            if dt_us > self.timeout_us() {
                runaway = true;
            }
            if fabsf(delta) > self.config.runaway_threshold.0 {
                runaway = true;
            }
            if dt_us > 0 {
                velocity = delta / (dt_us as f32 * 1e-6);
            }
        }

        self.status.last_position = self.status.current_position;
        self.status.current_position = position;
        self.status.velocity = velocity;
        self.status.last_update_us = Some(now_us);

        let c = &self.config;
        self.status.in_warning_zone = position >= c.soft_max.0 - c.warning_margin.0
            || position <= c.soft_min.0 + c.warning_margin.0;
        if self.recovering && c.within_soft(position) {
            self.recovering = false;
        }

        let detected = if !c.within_hard(position) {
            Some(ViolationKind::HardLimit)
        } else if !c.enabled {
            None
        } else if runaway {
            Some(ViolationKind::Runaway)
        } else if c.enforce_soft_limits && !self.recovering && !c.within_soft(position) {
            Some(ViolationKind::SoftLimit)
        } else if fabsf(velocity) > c.max_velocity.0 {
            Some(ViolationKind::Velocity)
        } else {
            None
        };

        match detected {
            Some(kind) => self.raise(kind, hw),
            None if self.is_latched() => Err(SafetyError::ViolationLatched(self.motor).into()),
            None => Ok(()),
        }
    }

    /// Check for stalled feedback.
    ///
    /// Runs at the critical rate, so it only needs the emergency-stop line
    /// and the fault sink; both kinds it can raise are emergencies.
    pub fn check_timeout<L>(&mut self, now_us: u64, line: &L) -> Result<()>
    where
        L: EmergencyStop + FaultReporter + ?Sized,
    {
        if !self.config.enabled {
            return Ok(());
        }
        match self.status.last_update_us {
            Some(last_us) if now_us.saturating_sub(last_us) > self.timeout_us() => {
                self.raise_emergency(ViolationKind::Runaway, line)
            }
            _ => Ok(()),
        }
    }

    /// Re-check the last position against the hard limits. Runs whatever
    /// the configuration says.
    pub fn check_hard_limits<L>(&mut self, line: &L) -> Result<()>
    where
        L: EmergencyStop + FaultReporter + ?Sized,
    {
        if self.status.last_update_us.is_none() || self.config.within_hard(self.status.current_position) {
            return Ok(());
        }
        self.raise_emergency(ViolationKind::HardLimit, line)
    }

    /// Report an encoder failure. Only a moving motor is stopped.
    pub fn encoder_fault<H>(&mut self, moving: bool, hw: &mut H) -> Result<()>
    where
        H: MotorDriver + EmergencyStop + FaultReporter,
    {
        if !self.config.enabled || !moving {
            return Ok(());
        }
        self.raise(ViolationKind::EncoderFault, hw)
    }

    fn timeout_us(&self) -> u64 {
        u64::from(self.config.runaway_timeout_ms) * 1_000
    }

    /// Latch `kind` if it is new or escalates the current state.
    fn latch<F: FaultReporter + ?Sized>(&mut self, kind: ViolationKind, faults: &F) -> bool {
        if kind == ViolationKind::Runaway {
            self.status.runaway_detected = true;
        }

        let escalates = match self.status.state {
            SafetyState::Nominal => true,
            SafetyState::ControlledStop => kind.is_emergency(),
            SafetyState::EmergencyStop => false,
        };
        if escalates {
            self.status.counters.record(kind);
            self.status.violation = Some(kind);
            faults.report_fault(Some(self.motor), FaultKind::SafetyViolation(kind));
        }
        escalates
    }

    fn raise<H>(&mut self, kind: ViolationKind, hw: &mut H) -> Result<()>
    where
        H: MotorDriver + EmergencyStop + FaultReporter,
    {
        if !self.latch(kind, &*hw) {
            return Err(SafetyError::ViolationLatched(self.motor).into());
        }

        if kind.is_emergency() {
            error!("motor {=u8}: {=str} violation, emergency stop", self.motor, kind.name());
            self.hard_stop(hw);
            self.emergency(kind, &*hw);
        } else {
            warn!("motor {=u8}: {=str} violation, controlled stop", self.motor, kind.name());
            match hw.soft_stop(self.motor) {
                Ok(()) => self.status.state = SafetyState::ControlledStop,
                Err(_) => {
                    error!("motor {=u8}: controlled stop failed, escalating", self.motor);
                    hw.report_fault(Some(self.motor), FaultKind::DriverCommunication);
                    self.hard_stop(hw);
                    self.emergency(kind, &*hw);
                }
            }
        }

        Err(self.violation_error(kind))
    }

    fn raise_emergency<L>(&mut self, kind: ViolationKind, line: &L) -> Result<()>
    where
        L: EmergencyStop + FaultReporter + ?Sized,
    {
        if !self.latch(kind, line) {
            return Err(SafetyError::ViolationLatched(self.motor).into());
        }
        error!("motor {=u8}: {=str} violation, emergency stop", self.motor, kind.name());
        self.emergency(kind, line);
        Err(self.violation_error(kind))
    }

    fn hard_stop<H: MotorDriver + FaultReporter>(&self, hw: &mut H) {
        if hw.hard_stop(self.motor).is_err() {
            hw.report_fault(Some(self.motor), FaultKind::DriverCommunication);
        }
    }

    fn emergency<L: EmergencyStop + ?Sized>(&mut self, kind: ViolationKind, line: &L) {
        line.trigger_emergency_stop(StopSource::Safety {
            motor: self.motor,
            violation: kind,
        });
        self.status.state = SafetyState::EmergencyStop;
    }

    fn violation_error(&self, kind: ViolationKind) -> crate::error::Error {
        SafetyError::Violation {
            motor: self.motor,
            kind,
        }
        .into()
    }
}
