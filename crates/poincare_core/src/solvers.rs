use crate::traits::{lit, DynamicalSystem, Scalar, Steppable};

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half: T = lit(0.5);
        let sixth: T = lit(1.0 / 6.0);
        let two: T = lit(2.0);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

// Dormand-Prince 5(4) tableau, stages 2..=6.
const C: [f64; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];
const A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
];

// 5th order weights (also the last row of A, FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between the 5th and 4th order solutions.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Continuous extension (Hairer, Norsett & Wanner, DOPRI5 `contd5`).
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Counters for the adaptive stepper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub accepted: u64,
    pub rejected: u64,
    pub evaluations: u64,
}

/// Outcome of a single adaptive step attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub accepted: bool,
    /// RMS of the scaled local error; accepted when <= 1.
    pub error: f64,
    /// Suggested size for the next attempt.
    pub h_next: f64,
}

/// Dense output of the last accepted step. Valid on [t0, t0 + h].
#[derive(Debug, Clone)]
pub struct DenseSegment {
    pub t0: f64,
    pub h: f64,
    rcont: [Vec<f64>; 5],
}

impl DenseSegment {
    fn new(dim: usize) -> Self {
        Self {
            t0: 0.0,
            h: 0.0,
            rcont: std::array::from_fn(|_| vec![0.0; dim]),
        }
    }

    pub fn t1(&self) -> f64 {
        self.t0 + self.h
    }

    /// Evaluates the 4th order interpolant at time t.
    pub fn interpolate(&self, t: f64, out: &mut [f64]) {
        let theta = if self.h == 0.0 {
            0.0
        } else {
            (t - self.t0) / self.h
        };
        let theta1 = 1.0 - theta;
        let [r1, r2, r3, r4, r5] = &self.rcont;
        for i in 0..out.len() {
            out[i] = r1[i] + theta * (r2[i] + theta1 * (r3[i] + theta * (r4[i] + theta1 * r5[i])));
        }
    }
}

/// Dormand-Prince 5(4) with step size control and dense output.
///
/// Works on f64 only. The first stage of each attempt reuses the last stage of the
/// previous accepted step (FSAL), so callers must go through `attempt` in sequence
/// for a given trajectory.
pub struct DormandPrince {
    pub rtol: f64,
    pub atol: f64,
    k: [Vec<f64>; 7],
    tmp: Vec<f64>,
    y_new: Vec<f64>,
    k1_ready: bool,
    rejected_last: bool,
    dense: DenseSegment,
    pub stats: StepStats,
}

impl DormandPrince {
    pub fn new(dim: usize, rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            k: std::array::from_fn(|_| vec![0.0; dim]),
            tmp: vec![0.0; dim],
            y_new: vec![0.0; dim],
            k1_ready: false,
            rejected_last: false,
            dense: DenseSegment::new(dim),
            stats: StepStats::default(),
        }
    }

    pub fn dense(&self) -> &DenseSegment {
        &self.dense
    }

    fn rms_norm(values: impl Iterator<Item = f64>, dim: usize) -> f64 {
        let sum: f64 = values.map(|v| v * v).sum();
        (sum / dim as f64).sqrt()
    }

    /// Picks a starting step size from the local scale of the solution and its derivative.
    pub fn initial_step(&mut self, system: &impl DynamicalSystem<f64>, t0: f64, y0: &[f64]) -> f64 {
        let dim = y0.len();
        system.apply(t0, y0, &mut self.k[0]);
        self.stats.evaluations += 1;
        self.k1_ready = true;

        let scale: Vec<f64> = y0.iter().map(|y| self.atol + y.abs() * self.rtol).collect();
        let d0 = Self::rms_norm(y0.iter().zip(&scale).map(|(y, s)| y / s), dim);
        let d1 = Self::rms_norm(self.k[0].iter().zip(&scale).map(|(f, s)| f / s), dim);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };

        for i in 0..dim {
            self.tmp[i] = y0[i] + h0 * self.k[0][i];
        }
        system.apply(t0 + h0, &self.tmp, &mut self.k[1]);
        self.stats.evaluations += 1;
        let d2 = Self::rms_norm(
            (0..dim).map(|i| (self.k[1][i] - self.k[0][i]) / scale[i]),
            dim,
        ) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(-ERROR_EXPONENT)
        };
        let h = (100.0 * h0).min(h1);
        if h.is_finite() && h > 0.0 {
            h
        } else {
            1e-6
        }
    }

    /// Attempts one step of size h from (t, y). On acceptance `y` is advanced in place
    /// and the dense segment covers [t, t + h]; on rejection `y` is untouched.
    pub fn attempt(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: f64,
        y: &mut [f64],
        h: f64,
    ) -> StepOutcome {
        let dim = y.len();
        if !self.k1_ready {
            system.apply(t, y, &mut self.k[0]);
            self.stats.evaluations += 1;
            self.k1_ready = true;
        }

        for stage in 1..6 {
            for i in 0..dim {
                let mut acc = 0.0;
                for j in 0..stage {
                    acc += A[stage][j] * self.k[j][i];
                }
                self.tmp[i] = y[i] + h * acc;
            }
            system.apply(t + C[stage] * h, &self.tmp, &mut self.k[stage]);
        }

        for i in 0..dim {
            self.y_new[i] = y[i]
                + h * (B1 * self.k[0][i]
                    + B3 * self.k[2][i]
                    + B4 * self.k[3][i]
                    + B5 * self.k[4][i]
                    + B6 * self.k[5][i]);
        }
        system.apply(t + h, &self.y_new, &mut self.k[6]);
        self.stats.evaluations += 6;

        let mut sum = 0.0;
        for i in 0..dim {
            let err = h
                * (E1 * self.k[0][i]
                    + E3 * self.k[2][i]
                    + E4 * self.k[3][i]
                    + E5 * self.k[4][i]
                    + E6 * self.k[5][i]
                    + E7 * self.k[6][i]);
            let scale = self.atol + y[i].abs().max(self.y_new[i].abs()) * self.rtol;
            sum += (err / scale) * (err / scale);
        }
        let error = (sum / dim as f64).sqrt();

        if !error.is_finite() {
            self.stats.rejected += 1;
            self.rejected_last = true;
            return StepOutcome {
                accepted: false,
                error,
                h_next: h * MIN_FACTOR,
            };
        }

        if error > 1.0 {
            self.stats.rejected += 1;
            self.rejected_last = true;
            let factor = (SAFETY * error.powf(ERROR_EXPONENT)).max(MIN_FACTOR);
            return StepOutcome {
                accepted: false,
                error,
                h_next: h * factor,
            };
        }

        let mut factor = if error == 0.0 {
            MAX_FACTOR
        } else {
            (SAFETY * error.powf(ERROR_EXPONENT)).min(MAX_FACTOR)
        };
        if self.rejected_last {
            factor = factor.min(1.0);
        }
        self.rejected_last = false;
        self.stats.accepted += 1;

        self.store_dense(t, h, y);
        y.copy_from_slice(&self.y_new);
        self.k.swap(0, 6);

        StepOutcome {
            accepted: true,
            error,
            h_next: h * factor,
        }
    }

    fn store_dense(&mut self, t: f64, h: f64, y: &[f64]) {
        self.dense.t0 = t;
        self.dense.h = h;
        let k = &self.k;
        let [r1, r2, r3, r4, r5] = &mut self.dense.rcont;
        for i in 0..y.len() {
            let ydiff = self.y_new[i] - y[i];
            let bspl = h * k[0][i] - ydiff;
            r1[i] = y[i];
            r2[i] = ydiff;
            r3[i] = bspl;
            r4[i] = ydiff - h * k[6][i] - bspl;
            r5[i] = h
                * (D1 * k[0][i]
                    + D3 * k[2][i]
                    + D4 * k[3][i]
                    + D5 * k[4][i]
                    + D6 * k[5][i]
                    + D7 * k[6][i]);
        }
    }
}
