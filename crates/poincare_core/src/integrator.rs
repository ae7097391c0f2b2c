//! Trajectory streams.
//!
//! Both integration strategies are exposed as a lazy [`Trajectory`] iterator that
//! yields the initial state followed by successive samples. Only the current state
//! lives inside the stream, so arbitrarily long runs use constant memory. A consumer
//! halts integration simply by no longer pulling from the iterator.

use crate::rossler::State;
use crate::settings::IntegratorSettings;
use crate::solvers::{DormandPrince, RK4};
use crate::traits::{DynamicalSystem, Steppable};
use tracing::warn;

/// Upper bound on adaptive step attempts for one run.
const MAX_ADAPTIVE_STEPS: u64 = 10_000_000;

/// A state together with the simulated time it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub t: f64,
    pub state: State,
}

/// Fixed-step RK4 stream.
pub struct FixedStepTrajectory<S: DynamicalSystem<f64>> {
    system: S,
    stepper: RK4<f64>,
    t: f64,
    state: Vec<f64>,
    dt: f64,
    steps_done: usize,
    max_steps: usize,
    primed: bool,
}

impl<S: DynamicalSystem<f64>> FixedStepTrajectory<S> {
    pub fn new(system: S, initial: State, dt: f64, max_steps: usize) -> Self {
        let dim = system.dimension();
        Self {
            system,
            stepper: RK4::new(dim),
            t: 0.0,
            state: initial.to_array().to_vec(),
            dt,
            steps_done: 0,
            max_steps,
            primed: false,
        }
    }

    pub fn steps_done(&self) -> usize {
        self.steps_done
    }
}

impl<S: DynamicalSystem<f64>> Iterator for FixedStepTrajectory<S> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if !self.primed {
            self.primed = true;
        } else {
            if self.steps_done >= self.max_steps {
                return None;
            }
            self.stepper
                .step(&self.system, &mut self.t, &mut self.state, self.dt);
            self.steps_done += 1;
        }
        Some(Sample {
            t: self.t,
            state: State::from_slice(&self.state),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.max_steps - self.steps_done + usize::from(!self.primed);
        (remaining, Some(remaining))
    }
}

/// Adaptive Dormand-Prince stream resampled onto `linspace(0, t_end, samples)`.
///
/// If the step size collapses or the step cap is reached before the grid is
/// exhausted, the stream yields one non-finite sample and then ends.
pub struct SampledTrajectory<S: DynamicalSystem<f64>> {
    system: S,
    stepper: DormandPrince,
    t: f64,
    y: Vec<f64>,
    h: f64,
    t_end: f64,
    samples: usize,
    index: usize,
    attempts: u64,
    exhausted: bool,
    buf: Vec<f64>,
}

impl<S: DynamicalSystem<f64>> SampledTrajectory<S> {
    pub fn new(
        system: S,
        initial: State,
        t_end: f64,
        samples: usize,
        rtol: f64,
        atol: f64,
    ) -> Self {
        let dim = system.dimension();
        let y = initial.to_array().to_vec();
        let mut stepper = DormandPrince::new(dim, rtol, atol);
        let h = stepper.initial_step(&system, 0.0, &y);
        Self {
            system,
            stepper,
            t: 0.0,
            y,
            h,
            t_end,
            samples,
            index: 0,
            attempts: 0,
            exhausted: false,
            buf: vec![0.0; dim],
        }
    }

    fn grid_time(&self, index: usize) -> f64 {
        if index + 1 == self.samples {
            self.t_end
        } else {
            self.t_end * index as f64 / (self.samples - 1) as f64
        }
    }

    /// Steps until the integrator has reached `target`. Returns false if it cannot.
    fn advance_to(&mut self, target: f64) -> bool {
        while self.t < target {
            if self.attempts >= MAX_ADAPTIVE_STEPS {
                warn!(
                    t = self.t,
                    rejected = self.stepper.stats.rejected,
                    "adaptive step budget exhausted"
                );
                return false;
            }
            let remaining = self.t_end - self.t;
            let last = self.h >= remaining;
            let h = if last { remaining } else { self.h };
            let min_h = 1e-12 * self.t.abs().max(1.0);
            if h.is_nan() || h < min_h {
                warn!(
                    t = self.t,
                    h,
                    accepted = self.stepper.stats.accepted,
                    rejected = self.stepper.stats.rejected,
                    "adaptive step size collapsed"
                );
                return false;
            }
            let outcome = self.stepper.attempt(&self.system, self.t, &mut self.y, h);
            self.attempts += 1;
            if outcome.accepted {
                self.t = if last { self.t_end } else { self.t + h };
            }
            self.h = outcome.h_next;
        }
        true
    }
}

impl<S: DynamicalSystem<f64>> Iterator for SampledTrajectory<S> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.exhausted || self.index >= self.samples {
            return None;
        }
        let target = self.grid_time(self.index);
        self.index += 1;

        if !self.advance_to(target) {
            self.exhausted = true;
            return Some(Sample {
                t: target,
                state: State::new(f64::NAN, f64::NAN, f64::NAN),
            });
        }

        let state = if target == self.t {
            State::from_slice(&self.y)
        } else {
            self.stepper.dense().interpolate(target, &mut self.buf);
            State::from_slice(&self.buf)
        };
        Some(Sample { t: target, state })
    }
}

/// One trajectory stream, whichever strategy produced it.
pub enum Trajectory<S: DynamicalSystem<f64>> {
    Fixed(FixedStepTrajectory<S>),
    Sampled(SampledTrajectory<S>),
}

impl<S: DynamicalSystem<f64>> Iterator for Trajectory<S> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        match self {
            Trajectory::Fixed(inner) => inner.next(),
            Trajectory::Sampled(inner) => inner.next(),
        }
    }
}

impl IntegratorSettings {
    /// Builds the trajectory stream for `system` starting at `initial` at t = 0.
    pub fn trajectory<S: DynamicalSystem<f64>>(&self, system: S, initial: State) -> Trajectory<S> {
        match *self {
            IntegratorSettings::FixedStep { dt, max_steps } => {
                Trajectory::Fixed(FixedStepTrajectory::new(system, initial, dt, max_steps))
            }
            IntegratorSettings::Sampled {
                t_end,
                samples,
                rtol,
                atol,
            } => Trajectory::Sampled(SampledTrajectory::new(
                system, initial, t_end, samples, rtol, atol,
            )),
        }
    }
}
