//! Motion execution - time-stepped trajectory playback.

use super::profile::{MotionPhase, Sample, Trajectory};
use crate::error::Result;

/// Runtime state of one motor's trajectory.
///
/// The executor owns the active [`Trajectory`] and the elapsed time. A stop
/// request is latched and applied on the next [`tick`](Self::tick), which
/// replaces the trajectory by a deceleration from the last issued sample.
#[derive(Debug, Clone, Default)]
pub struct MotionExecutor {
    /// The trajectory being executed.
    trajectory: Option<Trajectory>,

    /// Seconds since the trajectory started.
    elapsed: f32,

    /// Stop requested, applied on the next tick.
    stop_requested: bool,

    /// Last sample handed out.
    last: Option<Sample>,
}

impl MotionExecutor {
    /// Create an idle executor.
    pub const fn new() -> Self {
        Self {
            trajectory: None,
            elapsed: 0.0,
            stop_requested: false,
            last: None,
        }
    }

    /// Start executing a trajectory, replacing any previous one.
    pub fn start(&mut self, trajectory: Trajectory) {
        self.trajectory = Some(trajectory);
        self.elapsed = 0.0;
        self.stop_requested = false;
        self.last = None;
    }

    /// Check if a trajectory is being executed.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.trajectory.is_some()
    }

    /// Check if a stop is pending.
    #[inline]
    pub fn stop_pending(&self) -> bool {
        self.stop_requested
    }

    /// Get the current phase.
    pub fn phase(&self) -> MotionPhase {
        match (&self.trajectory, &self.last) {
            (Some(t), _) => t.phase(),
            (None, Some(s)) => s.phase,
            (None, None) => MotionPhase::Idle,
        }
    }

    /// Get the active trajectory.
    #[inline]
    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    /// Last sample handed out by [`tick`](Self::tick).
    #[inline]
    pub fn last_sample(&self) -> Option<Sample> {
        self.last
    }

    /// Get progress (0.0 to 1.0). Idle executors report 1.0.
    pub fn progress(&self) -> f32 {
        self.trajectory
            .as_ref()
            .map(|t| t.progress(self.elapsed))
            .unwrap_or(1.0)
    }

    /// Seconds left on the active trajectory.
    pub fn remaining_time(&self) -> f32 {
        self.trajectory
            .as_ref()
            .map(|t| (t.total_time() - self.elapsed).max(0.0))
            .unwrap_or(0.0)
    }

    /// Request a controlled stop. Takes effect on the next tick.
    ///
    /// Returns `false` if nothing was moving.
    pub fn request_stop(&mut self) -> bool {
        if self.trajectory.is_some() {
            self.stop_requested = true;
        }
        self.stop_requested
    }

    /// Drop the trajectory immediately, bypassing phase logic.
    pub fn emergency_stop(&mut self) {
        self.trajectory = None;
        self.stop_requested = false;
    }

    /// Advance by `dt` seconds and return the new target sample.
    ///
    /// Returns `None` when idle. The sample that completes a trajectory is
    /// returned once, after which the executor is idle.
    pub fn tick(&mut self, dt: f32) -> Result<Option<Sample>> {
        if self.stop_requested {
            self.stop_requested = false;
            self.begin_deceleration()?;
        }

        let Some(trajectory) = self.trajectory.as_mut() else {
            return Ok(None);
        };

        self.elapsed += dt;
        let sample = trajectory.advance(self.elapsed);
        self.last = Some(sample);

        if sample.phase == MotionPhase::Complete {
            self.trajectory = None;
        }

        Ok(Some(sample))
    }

    fn begin_deceleration(&mut self) -> Result<()> {
        let Some(current) = self.trajectory.as_ref() else {
            return Ok(());
        };
        let from = self.last.unwrap_or_else(|| current.sample(self.elapsed));

        let jerk_time = if current.jerk_time() > 0.0 {
            Some(current.jerk_time())
        } else {
            None
        };
        let stop = Trajectory::decelerate_from(
            current.kind(),
            from.position,
            from.velocity,
            current.deceleration(),
            jerk_time,
        )?;

        debug!("stop requested: decelerating over {=f32}s", stop.total_time());

        self.trajectory = Some(stop);
        self.elapsed = 0.0;
        Ok(())
    }
}
