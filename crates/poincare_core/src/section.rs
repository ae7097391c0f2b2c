//! Poincaré section crossing detection.
//!
//! A section is the plane `coordinate == threshold` for one normal axis. The axis is
//! chosen at the type level through [`Section`], which also fixes the shape of the
//! emitted points: a y-section yields `{x, z}` pairs, a z-section `{x, y}` pairs and an
//! x-section `{y, z}` pairs.

use crate::rossler::{Axis, State};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;

/// A point on the section, holding the two coordinates off the normal axis.
pub trait CrossingPoint: Copy + Debug + PartialEq + Serialize + Send + Sync + 'static {
    fn coordinates(&self) -> [f64; 2];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XyPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XzPoint {
    pub x: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YzPoint {
    pub y: f64,
    pub z: f64,
}

impl CrossingPoint for XyPoint {
    fn coordinates(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl CrossingPoint for XzPoint {
    fn coordinates(&self) -> [f64; 2] {
        [self.x, self.z]
    }
}

impl CrossingPoint for YzPoint {
    fn coordinates(&self) -> [f64; 2] {
        [self.y, self.z]
    }
}

/// Pairs a normal axis with the point type it produces.
pub trait Section: Send + Sync + 'static {
    const NORMAL: Axis;
    type Point: CrossingPoint;

    fn project(state: &State) -> Self::Point;
}

/// The plane x = threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct XSection;

/// The plane y = threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct YSection;

/// The plane z = threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZSection;

impl Section for XSection {
    const NORMAL: Axis = Axis::X;
    type Point = YzPoint;

    fn project(state: &State) -> YzPoint {
        YzPoint {
            y: state.y,
            z: state.z,
        }
    }
}

impl Section for YSection {
    const NORMAL: Axis = Axis::Y;
    type Point = XzPoint;

    fn project(state: &State) -> XzPoint {
        XzPoint {
            x: state.x,
            z: state.z,
        }
    }
}

impl Section for ZSection {
    const NORMAL: Axis = Axis::Z;
    type Point = XyPoint;

    fn project(state: &State) -> XyPoint {
        XyPoint {
            x: state.x,
            y: state.y,
        }
    }
}

/// Which way the trajectory must pass through the plane to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingDirection {
    /// `prev < threshold && cur >= threshold`
    #[default]
    Upward,
    /// `prev > threshold && cur <= threshold`
    Downward,
}

impl CrossingDirection {
    pub fn crosses(self, prev: f64, cur: f64, threshold: f64) -> bool {
        match self {
            CrossingDirection::Upward => prev < threshold && cur >= threshold,
            CrossingDirection::Downward => prev > threshold && cur <= threshold,
        }
    }
}

/// Fraction of the way from `prev` to `cur` at which `threshold` is reached.
/// Returns 0 when the two values coincide.
pub fn interpolation_fraction(prev: f64, cur: f64, threshold: f64) -> f64 {
    let denom = cur - prev;
    if denom == 0.0 {
        return 0.0;
    }
    (threshold - prev) / denom
}

/// Linear interpolation between two states at fraction `alpha`.
pub fn lerp_state(prev: &State, cur: &State, alpha: f64) -> State {
    State::new(
        prev.x + alpha * (cur.x - prev.x),
        prev.y + alpha * (cur.y - prev.y),
        prev.z + alpha * (cur.z - prev.z),
    )
}

/// Watches consecutive states and emits a point each time the section is crossed.
#[derive(Debug, Clone)]
pub struct CrossingDetector<S: Section> {
    threshold: f64,
    direction: CrossingDirection,
    previous: Option<State>,
    _section: PhantomData<S>,
}

impl<S: Section> CrossingDetector<S> {
    pub fn new(threshold: f64, direction: CrossingDirection) -> Self {
        Self {
            threshold,
            direction,
            previous: None,
            _section: PhantomData,
        }
    }

    /// Feeds the next state. The first call only primes the detector.
    pub fn observe(&mut self, state: State) -> Option<S::Point> {
        let previous = self.previous.replace(state)?;
        let prev = previous.component(S::NORMAL);
        let cur = state.component(S::NORMAL);
        if !self.direction.crosses(prev, cur, self.threshold) {
            return None;
        }
        let alpha = interpolation_fraction(prev, cur, self.threshold);
        Some(S::project(&lerp_state(&previous, &state, alpha)))
    }
}
