//! Multi-motor coordination.

mod coordinator;

pub use coordinator::{
    CoordinatedMove, CoordinationMode, Coordinator, CoordinatorMotorState, MotorPriority, MoveTarget,
};
