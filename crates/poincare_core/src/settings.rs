//! Run configuration. `Default` yields the canonical setup used by [`crate::compute`].

use crate::guard::DEFAULT_DIVERGENCE_BOUND;
use crate::section::CrossingDirection;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Integration strategy and its budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IntegratorSettings {
    /// Classical RK4 with a constant step, for at most `max_steps` steps.
    FixedStep { dt: f64, max_steps: usize },
    /// Adaptive Dormand-Prince over [0, t_end], resampled onto `samples`
    /// uniformly spaced times.
    Sampled {
        t_end: f64,
        samples: usize,
        rtol: f64,
        atol: f64,
    },
}

impl IntegratorSettings {
    pub fn fixed_step() -> Self {
        IntegratorSettings::FixedStep {
            dt: 0.01,
            max_steps: 200_000,
        }
    }

    pub fn sampled() -> Self {
        IntegratorSettings::Sampled {
            t_end: 100.0,
            samples: 5000,
            rtol: 1e-9,
            atol: 1e-6,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            IntegratorSettings::FixedStep { dt, max_steps } => {
                if !(dt.is_finite() && dt > 0.0) {
                    bail!("Step size dt must be positive and finite.");
                }
                if max_steps == 0 {
                    bail!("max_steps must be greater than zero.");
                }
            }
            IntegratorSettings::Sampled {
                t_end,
                samples,
                rtol,
                atol,
            } => {
                if !(t_end.is_finite() && t_end > 0.0) {
                    bail!("t_end must be positive and finite.");
                }
                if samples < 2 {
                    bail!("Sampled integration needs at least 2 samples.");
                }
                if !(rtol.is_finite() && rtol > 0.0) {
                    bail!("rtol must be positive.");
                }
                if !(atol.is_finite() && atol > 0.0) {
                    bail!("atol must be positive.");
                }
            }
        }
        Ok(())
    }
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self::fixed_step()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionSettings {
    pub threshold: f64,
    pub direction: CrossingDirection,
}

impl Default for SectionSettings {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            direction: CrossingDirection::Upward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoincareSettings {
    #[serde(default)]
    pub integrator: IntegratorSettings,
    #[serde(default)]
    pub section: SectionSettings,
    #[serde(default = "default_divergence_bound")]
    pub divergence_bound: f64,
}

fn default_divergence_bound() -> f64 {
    DEFAULT_DIVERGENCE_BOUND
}

impl Default for PoincareSettings {
    fn default() -> Self {
        Self {
            integrator: IntegratorSettings::default(),
            section: SectionSettings::default(),
            divergence_bound: DEFAULT_DIVERGENCE_BOUND,
        }
    }
}

impl PoincareSettings {
    pub fn with_integrator(integrator: IntegratorSettings) -> Self {
        Self {
            integrator,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.integrator.validate()?;
        if !self.section.threshold.is_finite() {
            bail!("Section threshold must be finite.");
        }
        if self.divergence_bound.is_nan() || self.divergence_bound <= 0.0 {
            bail!("divergence_bound must be positive.");
        }
        Ok(())
    }
}
