//! Homing state machine.
//!
//! Three strategies share one sequence type:
//!
//! | Method            | Search                         | Reference             |
//! |-------------------|--------------------------------|-----------------------|
//! | `LimitSwitch`     | Run toward switch, then back off | Switch trip position |
//! | `IndexPulse`      | Run until the index mark passes | Index position        |
//! | `CurrentPosition` | None                           | Current position      |
//!
//! The sequence never blocks. Each control tick feeds it the latest inputs and
//! it answers with the velocity to command, completion, or a timeout.

use libm::fabsf;

use crate::config::{HomingConfig, HomingMethod};

/// Phase of a homing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingPhase {
    /// Not started.
    Idle,
    /// Moving toward the switch or index mark.
    Search,
    /// Switch found, moving off it.
    Backoff,
    /// Reference found.
    Complete,
    /// Timed out.
    Failed,
}

/// Sensor inputs for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomingInputs {
    /// Current time in microseconds.
    pub now_us: u64,
    /// Current position (degrees, before re-zeroing).
    pub position: f32,
    /// Homing switch state.
    pub switch_active: bool,
    /// Index mark passed since the previous tick.
    pub index_detected: bool,
}

/// What the sequence wants after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HomingStep {
    /// Keep running at this velocity (deg/s).
    Drive(f32),
    /// Reference found at this position (degrees, before re-zeroing).
    Done {
        /// Position that becomes `home_offset`.
        reference: f32,
    },
    /// The timeout elapsed before a reference was found.
    TimedOut,
    /// The sequence is not running.
    Idle,
}

/// One homing run.
#[derive(Debug, Clone)]
pub struct HomingSequence {
    config: HomingConfig,
    phase: HomingPhase,
    started_us: u64,
    trip_position: f32,
}

impl HomingSequence {
    /// Create an idle sequence.
    pub fn new(config: HomingConfig) -> Self {
        Self {
            config,
            phase: HomingPhase::Idle,
            started_us: 0,
            trip_position: 0.0,
        }
    }

    /// Start searching. The timeout counts from `now_us`.
    pub fn start(&mut self, now_us: u64) {
        self.phase = HomingPhase::Search;
        self.started_us = now_us;
        self.trip_position = 0.0;
        info!("homing started");
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> HomingPhase {
        self.phase
    }

    /// Whether the sequence is searching or backing off.
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self.phase, HomingPhase::Search | HomingPhase::Backoff)
    }

    /// Whether the switch must be sampled this tick.
    #[inline]
    pub fn needs_switch(&self) -> bool {
        self.config.method == HomingMethod::LimitSwitch && self.phase == HomingPhase::Search
    }

    /// Whether the index mark must be sampled this tick.
    #[inline]
    pub fn needs_index(&self) -> bool {
        self.config.method == HomingMethod::IndexPulse && self.phase == HomingPhase::Search
    }

    /// Configuration of this run.
    #[inline]
    pub fn config(&self) -> &HomingConfig {
        &self.config
    }

    /// Advance the sequence.
    pub fn tick(&mut self, inputs: HomingInputs) -> HomingStep {
        if !self.is_running() {
            return HomingStep::Idle;
        }

        let timeout_us = u64::from(self.config.timeout_ms) * 1_000;
        if inputs.now_us.saturating_sub(self.started_us) >= timeout_us {
            self.phase = HomingPhase::Failed;
            warn!("homing timed out after {=u32} ms", self.config.timeout_ms);
            return HomingStep::TimedOut;
        }

        let toward = self.config.direction.sign() * fabsf(self.config.search_velocity.0);

        match (self.config.method, self.phase) {
            (HomingMethod::CurrentPosition, _) => self.finish(inputs.position),
            (HomingMethod::IndexPulse, _) => {
                if inputs.index_detected {
                    self.finish(inputs.position)
                } else {
                    HomingStep::Drive(toward)
                }
            }
            (HomingMethod::LimitSwitch, HomingPhase::Search) => {
                if inputs.switch_active {
                    self.trip_position = inputs.position;
                    debug!("homing switch tripped at {=f32}", inputs.position);
                    if self.config.backoff.0 <= 0.0 {
                        return self.finish(self.trip_position);
                    }
                    self.phase = HomingPhase::Backoff;
                    HomingStep::Drive(-toward)
                } else {
                    HomingStep::Drive(toward)
                }
            }
            (HomingMethod::LimitSwitch, _) => {
                if fabsf(inputs.position - self.trip_position) >= self.config.backoff.0 {
                    self.finish(self.trip_position)
                } else {
                    HomingStep::Drive(-toward)
                }
            }
        }
    }

    /// Abort without completing.
    pub fn abort(&mut self) {
        if self.is_running() {
            info!("homing aborted");
        }
        self.phase = HomingPhase::Idle;
    }

    fn finish(&mut self, reference: f32) -> HomingStep {
        self.phase = HomingPhase::Complete;
        info!("homing complete, reference {=f32}", reference);
        HomingStep::Done { reference }
    }
}
