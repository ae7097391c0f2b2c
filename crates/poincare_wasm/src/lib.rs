//! WASM bindings exposing the Rössler Poincaré map to JavaScript.
//!
//! `WasmPoincareMap` owns a result cache for the lifetime of the page; the free
//! function `compute_poincare_map` runs the canonical configuration uncached.

mod map;

pub use map::{compute_poincare_map, WasmPoincareMap};
