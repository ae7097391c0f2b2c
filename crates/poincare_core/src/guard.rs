//! Per-step boundedness check.

use crate::rossler::State;

/// Magnitude beyond which a coordinate counts as divergent.
pub const DEFAULT_DIVERGENCE_BOUND: f64 = 1e10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStatus {
    Bounded,
    Diverged,
}

/// Trips when a state leaves the box `|x|, |y|, |z| <= bound` or stops being finite.
/// Once tripped it stays tripped for the rest of the run.
#[derive(Debug, Clone)]
pub struct DivergenceGuard {
    bound: f64,
    tripped: bool,
}

impl DivergenceGuard {
    pub fn new(bound: f64) -> Self {
        Self {
            bound,
            tripped: false,
        }
    }

    pub fn inspect(&mut self, state: &State) -> GuardStatus {
        if self.tripped {
            return GuardStatus::Diverged;
        }
        let out_of_bounds = state
            .to_array()
            .iter()
            .any(|v| !v.is_finite() || v.abs() > self.bound);
        if out_of_bounds {
            self.tripped = true;
            GuardStatus::Diverged
        } else {
            GuardStatus::Bounded
        }
    }

    pub fn has_diverged(&self) -> bool {
        self.tripped
    }
}

impl Default for DivergenceGuard {
    fn default() -> Self {
        Self::new(DEFAULT_DIVERGENCE_BOUND)
    }
}
