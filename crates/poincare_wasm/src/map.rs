use js_sys::Float64Array;
use poincare_core::cache::{CacheStats, CachedPoincareMap, LruStore, SharedResult, UnboundedStore};
use poincare_core::section::{CrossingPoint, XzPoint};
use poincare_core::{
    compute, CanonicalSection, Parameters, PoincareError, PoincareMap, PoincareSettings,
};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub(crate) enum CacheKind {
    Unbounded(CachedPoincareMap<CanonicalSection, UnboundedStore<SharedResult<XzPoint>>>),
    Lru(CachedPoincareMap<CanonicalSection, LruStore<SharedResult<XzPoint>>>),
}

#[derive(Serialize)]
pub(crate) struct CacheStatsPayload {
    entries: usize,
    hits: u64,
    computations: u64,
}

/// Poincaré map handle with a per-instance result cache.
#[wasm_bindgen]
pub struct WasmPoincareMap {
    pub(crate) cache: CacheKind,
}

impl WasmPoincareMap {
    /// A `capacity` of 0 keeps every result; anything else bounds the cache with LRU eviction.
    pub(crate) fn from_settings(settings: PoincareSettings, capacity: usize) -> anyhow::Result<Self> {
        let map = PoincareMap::new(settings)?;
        let cache = if capacity == 0 {
            CacheKind::Unbounded(CachedPoincareMap::unbounded(map))
        } else {
            CacheKind::Lru(CachedPoincareMap::lru(map, capacity))
        };
        Ok(Self { cache })
    }

    pub(crate) fn compute_result(
        &self,
        a: f64,
        b: f64,
        c: f64,
    ) -> Result<SharedResult<XzPoint>, PoincareError> {
        let params = Parameters::new(a, b, c);
        match &self.cache {
            CacheKind::Unbounded(cache) => cache.get_or_compute(params),
            CacheKind::Lru(cache) => cache.get_or_compute(params),
        }
    }

    pub(crate) fn stats_payload(&self) -> CacheStatsPayload {
        let (entries, CacheStats { hits, computations }) = match &self.cache {
            CacheKind::Unbounded(cache) => (cache.len(), cache.stats()),
            CacheKind::Lru(cache) => (cache.len(), cache.stats()),
        };
        CacheStatsPayload {
            entries,
            hits,
            computations,
        }
    }
}

#[wasm_bindgen]
impl WasmPoincareMap {
    /// `settings_val` may be `undefined` or `null` for the canonical configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(settings_val: JsValue, capacity: u32) -> Result<WasmPoincareMap, JsValue> {
        console_error_panic_hook::set_once();

        let settings: PoincareSettings = if settings_val.is_undefined() || settings_val.is_null() {
            PoincareSettings::default()
        } else {
            from_value(settings_val)
                .map_err(|e| JsValue::from_str(&format!("Invalid Poincaré settings: {}", e)))?
        };

        WasmPoincareMap::from_settings(settings, capacity as usize)
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
    }

    /// Returns `{ points: [{x, z}, ...], diverged, count }`.
    pub fn compute(&self, a: f64, b: f64, c: f64) -> Result<JsValue, JsValue> {
        let result = self
            .compute_result(a, b, c)
            .map_err(|e| JsValue::from_str(&format!("Poincaré computation failed: {}", e)))?;
        to_value(&*result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Crossing points packed as `[x0, z0, x1, z1, ...]` for plotting.
    pub fn compute_flat(&self, a: f64, b: f64, c: f64) -> Result<Float64Array, JsValue> {
        let result = self
            .compute_result(a, b, c)
            .map_err(|e| JsValue::from_str(&format!("Poincaré computation failed: {}", e)))?;
        Ok(Float64Array::from(flatten_points(&result.points).as_slice()))
    }

    pub fn cached_entries(&self) -> u32 {
        self.stats_payload().entries as u32
    }

    pub fn cache_stats(&self) -> Result<JsValue, JsValue> {
        to_value(&self.stats_payload())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn clear_cache(&self) {
        match &self.cache {
            CacheKind::Unbounded(cache) => cache.clear(),
            CacheKind::Lru(cache) => cache.clear(),
        }
    }
}

/// Canonical Poincaré section for (a, b, c), computed without caching.
#[wasm_bindgen]
pub fn compute_poincare_map(a: f64, b: f64, c: f64) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let result = compute(a, b, c)
        .map_err(|e| JsValue::from_str(&format!("Poincaré computation failed: {}", e)))?;
    to_value(&result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

pub(crate) fn flatten_points(points: &[XzPoint]) -> Vec<f64> {
    points.iter().flat_map(CrossingPoint::coordinates).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use poincare_core::IntegratorSettings;

    fn short_settings() -> PoincareSettings {
        PoincareSettings::with_integrator(IntegratorSettings::FixedStep {
            dt: 0.01,
            max_steps: 5_000,
        })
    }

    #[test]
    fn zero_capacity_uses_unbounded_cache() {
        let map = WasmPoincareMap::from_settings(short_settings(), 0).expect("map");
        assert!(matches!(map.cache, CacheKind::Unbounded(_)));
        let map = WasmPoincareMap::from_settings(short_settings(), 4).expect("map");
        assert!(matches!(map.cache, CacheKind::Lru(_)));
    }

    #[test]
    fn invalid_settings_are_reported() {
        let mut settings = short_settings();
        settings.divergence_bound = -1.0;
        let err = WasmPoincareMap::from_settings(settings, 0)
            .err()
            .expect("expected settings error");
        assert!(format!("{err:#}").contains("divergence_bound"));
    }

    #[test]
    fn repeated_compute_hits_cache() {
        let map = WasmPoincareMap::from_settings(short_settings(), 0).expect("map");
        let first = map.compute_result(0.2, 0.2, 5.7).expect("first");
        let second = map.compute_result(0.2, 0.2, 5.7).expect("second");
        assert_eq!(first, second);

        let stats = map.stats_payload();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.computations, 1);
        assert_eq!(map.cached_entries(), 1);

        map.clear_cache();
        assert_eq!(map.cached_entries(), 0);
    }

    #[test]
    fn lru_cache_is_bounded() {
        let map = WasmPoincareMap::from_settings(short_settings(), 2).expect("map");
        for c in [4.0, 5.0, 5.7] {
            map.compute_result(0.2, 0.2, c).expect("result");
        }
        assert_eq!(map.cached_entries(), 2);
    }

    #[test]
    fn non_finite_parameter_is_an_error() {
        let map = WasmPoincareMap::from_settings(short_settings(), 0).expect("map");
        let err = map
            .compute_result(0.2, 0.2, f64::NAN)
            .expect_err("NaN should be rejected");
        assert!(matches!(err, PoincareError::InvalidParameter { name: "c", .. }));
        assert_eq!(map.cached_entries(), 0);
    }

    #[test]
    fn flatten_points_interleaves_coordinates() {
        let flat = flatten_points(&[XzPoint { x: 1.0, z: 2.0 }, XzPoint { x: 3.0, z: 4.0 }]);
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
