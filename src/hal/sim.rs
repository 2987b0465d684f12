//! Simulated board for tests and demos (std only).
//!
//! Motors are ideal velocity sources: whatever velocity is commanded is the
//! velocity the shaft turns at until the next command or stop.
//!
//! The timer, emergency-stop line, fault log and interrupt mask live behind
//! an `Rc`, so [`SimSafetyLine`] handles see the same board as the
//! [`SimulatedPlatform`] they came from.

use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use super::{
    Clock, EmergencyStop, FaultKind, FaultReporter, HomeSensors, InterruptControl, MotorDriver,
    MotorId, PositionEncoder, StopSource,
};
use crate::config::units::{Degrees, DegreesPerSec};
use crate::error::HardwareError;
use crate::MAX_MOTORS;

/// State of one simulated axis.
#[derive(Debug, Clone, Default)]
pub struct SimMotor {
    /// Shaft angle in degrees.
    pub position: f32,
    /// Current shaft velocity in degrees per second.
    pub velocity: f32,
    /// Encoder reads fail while set.
    pub encoder_fault: bool,
    /// Driver commands fail while set.
    pub driver_fault: bool,
    /// Hard stops fail while set.
    pub hard_stop_fault: bool,
    /// Limit switch trips at or below this angle.
    pub switch_below: Option<f32>,
    /// Limit switch trips at or above this angle.
    pub switch_above: Option<f32>,
    /// Angle of the encoder index mark.
    pub index_at: Option<f32>,
    /// Number of accepted velocity commands.
    pub velocity_commands: u32,
    /// Number of soft stops received.
    pub soft_stops: u32,
    /// Number of hard stops received.
    pub hard_stops: u32,
    /// Windings released.
    pub high_impedance: bool,
    index_checked_at: f32,
}

#[derive(Debug, Default)]
struct SimLine {
    time_us: Cell<u64>,
    faults: RefCell<Vec<(Option<MotorId>, FaultKind)>>,
    emergency_stops: RefCell<Vec<StopSource>>,
    irq_depth: Cell<u32>,
    critical_entries: Cell<u32>,
}

impl SimLine {
    fn critical_enter(&self) -> u32 {
        let prev = self.irq_depth.get();
        self.irq_depth.set(prev + 1);
        self.critical_entries.set(self.critical_entries.get() + 1);
        prev
    }
}

/// Handle on the simulated timer, emergency-stop line, fault log and
/// interrupt mask. Implements [`SafetyLine`](super::SafetyLine).
#[derive(Debug, Clone)]
pub struct SimSafetyLine {
    line: Rc<SimLine>,
}

impl SimSafetyLine {
    /// Current critical-section nesting depth.
    pub fn irq_depth(&self) -> u32 {
        self.line.irq_depth.get()
    }
}

/// In-memory [`Platform`](super::Platform) implementation.
#[derive(Debug)]
pub struct SimulatedPlatform {
    line: Rc<SimLine>,
    motors: Vec<SimMotor>,
    stops_applied: usize,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlatform {
    /// Create a platform with [`MAX_MOTORS`] motors at rest at zero.
    pub fn new() -> Self {
        Self {
            line: Rc::new(SimLine::default()),
            motors: (0..MAX_MOTORS).map(|_| SimMotor::default()).collect(),
            stops_applied: 0,
        }
    }

    /// A handle for the safety interrupt, sharing this board's lines.
    pub fn safety_line(&self) -> SimSafetyLine {
        SimSafetyLine {
            line: Rc::clone(&self.line),
        }
    }

    /// Borrow a simulated motor.
    pub fn motor(&self, id: MotorId) -> &SimMotor {
        &self.motors[id as usize]
    }

    /// Mutably borrow a simulated motor.
    pub fn motor_mut(&mut self, id: MotorId) -> &mut SimMotor {
        &mut self.motors[id as usize]
    }

    /// Place a motor at an angle without moving through the intermediate positions.
    pub fn set_position(&mut self, id: MotorId, position: f32) {
        let motor = self.motor_mut(id);
        motor.position = position;
        motor.index_checked_at = position;
    }

    /// Advance simulated time and integrate shaft positions.
    ///
    /// An emergency stop triggered since the last call cuts every motor
    /// before integrating.
    pub fn advance(&mut self, dt_us: u64) {
        self.apply_emergency_stops();
        let dt = dt_us as f32 * 1e-6;
        for motor in self.motors.iter_mut() {
            motor.position += motor.velocity * dt;
        }
        self.line.time_us.set(self.line.time_us.get() + dt_us);
    }

    /// Advance time without moving any motor.
    pub fn advance_time(&self, dt_us: u64) {
        self.line.time_us.set(self.line.time_us.get() + dt_us);
    }

    /// Current critical-section nesting depth.
    pub fn irq_depth(&self) -> u32 {
        self.line.irq_depth.get()
    }

    /// Number of critical sections entered so far.
    pub fn critical_entries(&self) -> u32 {
        self.line.critical_entries.get()
    }

    /// Emergency stops triggered so far.
    pub fn emergency_stops(&self) -> Vec<StopSource> {
        self.line.emergency_stops.borrow().clone()
    }

    /// Faults reported so far.
    pub fn faults(&self) -> Vec<(Option<MotorId>, FaultKind)> {
        self.line.faults.borrow().clone()
    }

    /// Number of reported faults of one kind.
    pub fn fault_count(&self, kind: FaultKind) -> usize {
        self.line.faults.borrow().iter().filter(|(_, k)| *k == kind).count()
    }

    fn apply_emergency_stops(&mut self) {
        let triggered = self.line.emergency_stops.borrow().len();
        if triggered != self.stops_applied {
            self.stops_applied = triggered;
            for m in self.motors.iter_mut() {
                m.velocity = 0.0;
            }
        }
    }

    fn check_driver(&self, motor: MotorId) -> Result<(), HardwareError> {
        if self.motors[motor as usize].driver_fault {
            Err(HardwareError::DriverFault)
        } else {
            Ok(())
        }
    }
}

impl Clock for SimulatedPlatform {
    fn now_us(&self) -> u64 {
        self.line.time_us.get()
    }
}

impl PositionEncoder for SimulatedPlatform {
    fn read_position(&mut self, motor: MotorId) -> Result<Degrees, HardwareError> {
        let m = &self.motors[motor as usize];
        if m.encoder_fault {
            return Err(HardwareError::Communication);
        }
        Ok(Degrees(m.position))
    }

    fn index_detected(&mut self, motor: MotorId) -> Result<bool, HardwareError> {
        let m = &mut self.motors[motor as usize];
        if m.encoder_fault {
            return Err(HardwareError::Communication);
        }
        let from = m.index_checked_at;
        let to = m.position;
        m.index_checked_at = to;
        Ok(match m.index_at {
            Some(mark) => from != to && (from - mark) * (to - mark) <= 0.0,
            None => false,
        })
    }
}

impl MotorDriver for SimulatedPlatform {
    fn send_velocity(&mut self, motor: MotorId, velocity: DegreesPerSec) -> Result<(), HardwareError> {
        self.apply_emergency_stops();
        self.check_driver(motor)?;
        let m = &mut self.motors[motor as usize];
        m.velocity = velocity.0;
        m.high_impedance = false;
        m.velocity_commands += 1;
        Ok(())
    }

    fn soft_stop(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        self.check_driver(motor)?;
        let m = &mut self.motors[motor as usize];
        m.velocity = 0.0;
        m.soft_stops += 1;
        Ok(())
    }

    fn hard_stop(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        let m = &mut self.motors[motor as usize];
        if m.hard_stop_fault {
            return Err(HardwareError::DriverFault);
        }
        m.velocity = 0.0;
        m.hard_stops += 1;
        Ok(())
    }

    fn set_high_impedance(&mut self, motor: MotorId) -> Result<(), HardwareError> {
        let m = &mut self.motors[motor as usize];
        m.velocity = 0.0;
        m.high_impedance = true;
        Ok(())
    }
}

impl HomeSensors for SimulatedPlatform {
    fn limit_switch_active(&mut self, motor: MotorId) -> Result<bool, HardwareError> {
        let m = &self.motors[motor as usize];
        let below = m.switch_below.map(|s| m.position <= s).unwrap_or(false);
        let above = m.switch_above.map(|s| m.position >= s).unwrap_or(false);
        Ok(below || above)
    }
}

impl EmergencyStop for SimulatedPlatform {
    fn trigger_emergency_stop(&self, source: StopSource) {
        self.line.emergency_stops.borrow_mut().push(source);
    }
}

impl FaultReporter for SimulatedPlatform {
    fn report_fault(&self, motor: Option<MotorId>, fault: FaultKind) {
        self.line.faults.borrow_mut().push((motor, fault));
    }
}

impl InterruptControl for SimulatedPlatform {
    fn critical_enter(&self) -> u32 {
        self.line.critical_enter()
    }

    fn critical_exit(&self, state: u32) {
        self.line.irq_depth.set(state);
    }
}

impl Clock for SimSafetyLine {
    fn now_us(&self) -> u64 {
        self.line.time_us.get()
    }
}

impl EmergencyStop for SimSafetyLine {
    fn trigger_emergency_stop(&self, source: StopSource) {
        self.line.emergency_stops.borrow_mut().push(source);
    }
}

impl FaultReporter for SimSafetyLine {
    fn report_fault(&self, motor: Option<MotorId>, fault: FaultKind) {
        self.line.faults.borrow_mut().push((motor, fault));
    }
}

impl InterruptControl for SimSafetyLine {
    fn critical_enter(&self) -> u32 {
        self.line.critical_enter()
    }

    fn critical_exit(&self, state: u32) {
        self.line.irq_depth.set(state);
    }
}
