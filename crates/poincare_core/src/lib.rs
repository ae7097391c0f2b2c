pub mod cache;
pub mod error;
pub mod guard;
pub mod integrator;
pub mod poincare;
pub mod rossler;
pub mod section;
pub mod settings;
pub mod solvers;
/// The `poincare_core` crate computes Poincaré sections of the Rössler attractor.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (vector fields), `Steppable` (fixed-step solvers).
/// - **Rossler**: the vector field, phase-space `State` and the `Parameters` triple.
/// - **Solvers**: RK4 and an adaptive Dormand-Prince 5(4) stepper with dense output.
/// - **Integrator**: lazy trajectory streams for the fixed-step and sampled strategies.
/// - **Guard / Section**: divergence detection and typed section crossing detection.
/// - **Poincare**: `PoincareMap` and the canonical `compute(a, b, c)`.
/// - **Cache**: per-parameter memoization with single-flight computation.
pub mod traits;

pub use error::PoincareError;
pub use poincare::{compute, CanonicalSection, PoincareMap, PoincareResult};
pub use rossler::{Parameters, State, INITIAL_STATE};
pub use settings::{IntegratorSettings, PoincareSettings, SectionSettings};
