//! Position safety: soft and hard limits, velocity limit, runaway detection,
//! and the critical-rate band that shares the monitors across priorities.

mod band;
mod monitor;

pub use band::{SafetyBand, SafetyContext, SafetyTask};
pub use monitor::{
    EnforcedTarget, LimitSide, PositionSafetyMonitor, PositionSafetyStatus, SafetyState,
    TargetValidation, ViolationCounters, ViolationKind, LIMIT_TOLERANCE,
};
