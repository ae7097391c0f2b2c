//! The Rössler vector field and the phase-space types it acts on.

use crate::error::PoincareError;
use crate::traits::{lit, DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};

/// Every run starts from this state.
pub const INITIAL_STATE: State = State {
    x: 1.0,
    y: 1.0,
    z: 1.0,
};

/// Phase-space coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl State {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn component(&self, axis: Axis) -> f64 {
        self.to_array()[axis.index()]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// The (a, b, c) parameter triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Parameters {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Rejects NaN and infinite values; any finite triple is accepted.
    pub fn validate(&self) -> Result<(), PoincareError> {
        for (name, value) in [("a", self.a), ("b", self.b), ("c", self.c)] {
            if !value.is_finite() {
                return Err(PoincareError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// dx/dt = -y - z, dy/dt = x + a*y, dz/dt = b + z*(x - c)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rossler {
    pub params: Parameters,
}

impl Rossler {
    pub fn new(params: Parameters) -> Self {
        Self { params }
    }

    /// Derivative at a single state, without the slice plumbing.
    pub fn derivative(&self, state: &State) -> State {
        let mut out = [0.0; 3];
        DynamicalSystem::<f64>::apply(self, 0.0, &state.to_array(), &mut out);
        State::from_slice(&out)
    }
}

impl<T: Scalar> DynamicalSystem<T> for Rossler {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let a: T = lit(self.params.a);
        let b: T = lit(self.params.b);
        let c: T = lit(self.params.c);
        out[0] = -x[1] - x[2];
        out[1] = x[0] + a * x[1];
        out[2] = b + x[2] * (x[0] - c);
    }
}
