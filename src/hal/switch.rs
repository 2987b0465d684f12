//! GPIO limit switch adapter.

use embedded_hal::digital::InputPin;

use crate::error::HardwareError;

/// A homing limit switch wired to an input pin.
///
/// Board support code keeps one per motor and forwards
/// [`HomeSensors::limit_switch_active`](super::HomeSensors::limit_switch_active)
/// to [`is_active`](Self::is_active).
pub struct LimitSwitch<P: InputPin> {
    pin: P,
    active_low: bool,
}

impl<P: InputPin> LimitSwitch<P> {
    /// Switch that reads high when tripped.
    pub fn active_high(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
        }
    }

    /// Switch that pulls the line low when tripped.
    pub fn active_low(pin: P) -> Self {
        Self {
            pin,
            active_low: true,
        }
    }

    /// Whether the switch is tripped.
    pub fn is_active(&mut self) -> Result<bool, HardwareError> {
        let high = self.pin.is_high().map_err(|_| HardwareError::Communication)?;
        Ok(high != self.active_low)
    }

    /// Give back the pin.
    pub fn release(self) -> P {
        self.pin
    }
}
