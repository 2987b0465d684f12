//! Critical-rate safety band.
//!
//! The per-motor safety monitors live here, outside the motion system, in an
//! [`IrqCell`] masked by the board's [`SafetyLine`]. The safety timer runs
//! [`SafetyBand::tick`] through a shared reference, so it can fire in the
//! middle of a control tick: the control band only holds the lock while it
//! feeds a measured position to a monitor, never across a driver write.
//!
//! The critical band only latches. It triggers the emergency-stop line and
//! records the cause; the control band sees the latch on its next motor and
//! hard-stops the drivers.

use heapless::Vec;

use crate::error::{Error, Result, SafetyError};
use crate::hal::{Clock, FaultKind, FaultReporter, IrqCell, MotorId, SafetyLine, StopSource};
use crate::safety::{PositionSafetyMonitor, SafetyState};
use crate::scheduler::Runnable;
use crate::MAX_MOTORS;

/// Safety state shared between the critical and the control band.
#[derive(Debug, Default)]
pub(crate) struct BandState {
    pub(crate) monitors: Vec<PositionSafetyMonitor, MAX_MOTORS>,
    /// Motors whose loop is closed. Only these are checked at the critical rate.
    pub(crate) watched: [bool; MAX_MOTORS],
    pub(crate) emergency: Option<StopSource>,
    ticks: u32,
}

impl BandState {
    /// Record `source` unless an emergency is already latched.
    pub(crate) fn latch_emergency(&mut self, source: StopSource) {
        if self.emergency.is_none() {
            self.emergency = Some(source);
        }
    }

    pub(crate) fn latched_motor(&self) -> Option<MotorId> {
        self.monitors.iter().find(|m| m.is_latched()).map(|m| m.motor())
    }

    pub(crate) fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// Safety monitors and emergency latch, shared by reference between the
/// critical-tier and control-tier handlers.
pub struct SafetyBand<'l> {
    line: &'l dyn SafetyLine,
    state: IrqCell<BandState>,
}

impl<'l> SafetyBand<'l> {
    /// Empty band on `line`. The motion system installs its monitors.
    pub fn new(line: &'l dyn SafetyLine) -> Self {
        Self {
            line,
            state: IrqCell::new(BandState::default()),
        }
    }

    /// The emergency-stop line, clock and fault sink of the band.
    #[inline]
    pub fn line(&self) -> &'l dyn SafetyLine {
        self.line
    }

    /// Critical-rate work: feedback timeout and hard-limit re-check for
    /// every watched motor.
    ///
    /// Stops at the first emergency; nothing is checked while one is latched.
    pub fn tick(&self) {
        let line = self.line;
        let now = line.now_us();
        self.lock(|s| {
            s.ticks = s.ticks.wrapping_add(1);
            if s.emergency.is_some() {
                return;
            }
            for (idx, monitor) in s.monitors.iter_mut().enumerate() {
                if !s.watched[idx] {
                    continue;
                }
                let mut result = monitor.check_timeout(now, line);
                if result.is_ok() {
                    result = monitor.check_hard_limits(line);
                }
                if let Err(Error::Safety(SafetyError::Violation { motor, kind })) = result {
                    if monitor.status().state == SafetyState::EmergencyStop {
                        s.emergency = Some(StopSource::Safety { motor, violation: kind });
                        break;
                    }
                }
            }
        });
    }

    /// Why the system is emergency-stopped, if it is.
    pub fn emergency(&self) -> Option<StopSource> {
        self.lock(|s| s.emergency)
    }

    /// Critical ticks handled.
    pub fn safety_ticks(&self) -> u32 {
        self.lock(|s| s.ticks)
    }

    /// Scheduler context for the critical tier.
    pub fn context(&self) -> SafetyContext<'_> {
        SafetyContext { band: self }
    }

    /// Replace the monitors and reset the latch. Nothing is watched until
    /// the control band closes a loop.
    pub(crate) fn install(&self, monitors: Vec<PositionSafetyMonitor, MAX_MOTORS>) {
        self.lock(|s| {
            *s = BandState {
                monitors,
                ..BandState::default()
            };
        });
    }

    pub(crate) fn lock<R>(&self, f: impl FnOnce(&mut BandState) -> R) -> R {
        self.state.lock(self.line, f)
    }
}

/// Context the critical-tier scheduler runs [`SafetyTask`] with.
#[derive(Clone, Copy)]
pub struct SafetyContext<'b> {
    band: &'b SafetyBand<'b>,
}

impl<'b> SafetyContext<'b> {
    /// The band this context drives.
    #[inline]
    pub fn band(&self) -> &'b SafetyBand<'b> {
        self.band
    }
}

impl Clock for SafetyContext<'_> {
    fn now_us(&self) -> u64 {
        self.band.line.now_us()
    }
}

impl FaultReporter for SafetyContext<'_> {
    fn report_fault(&self, motor: Option<MotorId>, fault: FaultKind) {
        self.band.line.report_fault(motor, fault);
    }
}

/// Critical-tier task: [`SafetyBand::tick`].
#[derive(Debug, Default)]
pub struct SafetyTask;

impl<'b> Runnable<SafetyContext<'b>> for SafetyTask {
    fn run(&mut self, ctx: &mut SafetyContext<'b>, _dt_us: u32) -> Result<()> {
        ctx.band.tick();
        Ok(())
    }
}
