//! Closed-loop position control.
//!
//! One [`PositionController`] per motor: IIR position filter, PID with
//! integral clamp, trajectory feedforward, output clamp, and the homing
//! state machine.

mod controller;
mod feedforward;
mod filter;
mod homing;
mod pid;

pub use controller::{ControlOutput, HomingStatus, PositionController, PositionControllerState};
pub use feedforward::{feedforward_compute, FeedforwardGains};
pub use filter::LowPass;
pub use homing::{HomingInputs, HomingPhase, HomingSequence, HomingStep};
pub use pid::{pid_compute, PidGains, PidState};
