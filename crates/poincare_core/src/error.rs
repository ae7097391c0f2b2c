use thiserror::Error;

/// Errors surfaced to callers of the Poincaré map.
///
/// Divergence is not an error: it is reported through `PoincareResult::diverged`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoincareError {
    #[error("Parameter {name} must be finite, got {value}.")]
    InvalidParameter { name: &'static str, value: f64 },
}
