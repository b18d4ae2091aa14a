//! Per-axis PID feedback controller

use crate::config_store::PidGains;
use tokio::time::Instant;

/// Integrator/derivative history of one axis
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidState {
    pub accumulated_error: f64,
    pub previous_error: f64,
    /// Time of the previous sample; `None` until primed
    pub previous_sample: Option<Instant>,
}

impl PidState {
    pub fn is_primed(&self) -> bool {
        self.previous_sample.is_some()
    }
}

/// PID loop smoothing aim corrections on one axis
#[derive(Debug, Clone)]
pub struct FeedbackController {
    gains: PidGains,
    state: PidState,
}

impl FeedbackController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            state: PidState::default(),
        }
    }

    /// Evaluate the controller for `error` at the current instant
    pub fn calc(&mut self, error: f64) -> f64 {
        self.calc_at(error, Instant::now())
    }

    /// Evaluate the controller for `error` sampled at `now`
    ///
    /// The first call after construction or [`reset`](Self::reset) only
    /// seeds the history and returns 0.
    pub fn calc_at(&mut self, error: f64, now: Instant) -> f64 {
        let output = match self.state.previous_sample {
            None => 0.0,
            Some(previous) => {
                self.state.accumulated_error += error;
                let mut output =
                    self.gains.p * error + self.gains.i * self.state.accumulated_error;

                let dt = now.saturating_duration_since(previous).as_secs_f64();
                if dt > 0.0 {
                    output += self.gains.d * (error - self.state.previous_error) / dt;
                }
                output
            }
        };

        self.state.previous_error = error;
        self.state.previous_sample = Some(now);
        output
    }

    /// Zero the integrator and re-arm the first-call behaviour; gains are kept
    pub fn reset(&mut self) {
        self.state = PidState::default();
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }
}
