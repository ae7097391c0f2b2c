use poincare_core::cache::CachedPoincareMap;
use poincare_core::section::{XzPoint, YSection};
use poincare_core::{
    compute, IntegratorSettings, Parameters, PoincareError, PoincareMap, PoincareSettings,
};

fn fixed_map(max_steps: usize) -> PoincareMap<YSection> {
    PoincareMap::new(PoincareSettings::with_integrator(
        IntegratorSettings::FixedStep {
            dt: 0.01,
            max_steps,
        },
    ))
    .expect("valid settings")
}

const CLASSIC: Parameters = Parameters {
    a: 0.2,
    b: 0.2,
    c: 5.7,
};

#[test]
fn classic_parameters_stay_bounded() {
    let result = compute(0.2, 0.2, 5.7).expect("finite parameters");
    assert!(!result.diverged);
    assert!(result.count > 100, "count = {}", result.count);
    assert_eq!(result.count, result.points.len());
    // Upward y-crossings require dy/dt = x > 0 on the plane.
    assert!(result.points.iter().all(|p| p.x > 0.0 && p.z.is_finite()));
}

#[test]
fn large_c_diverges_and_keeps_earlier_points() {
    let result = compute(0.2, 0.2, 1000.0).expect("finite parameters");
    assert!(result.diverged);
    assert!(result.points.iter().all(|p| p.x.is_finite() && p.z.is_finite()));
}

#[test]
fn non_finite_parameters_are_rejected() {
    for (a, b, c, name) in [
        (f64::NAN, 0.2, 5.7, "a"),
        (0.2, f64::INFINITY, 5.7, "b"),
        (0.2, 0.2, f64::NEG_INFINITY, "c"),
    ] {
        match compute(a, b, c) {
            Err(PoincareError::InvalidParameter { name: got, .. }) => assert_eq!(got, name),
            other => panic!("expected InvalidParameter for {name}, got {other:?}"),
        }
    }
}

#[test]
fn compute_is_deterministic() {
    let map = fixed_map(30_000);
    let first = map.compute(CLASSIC).expect("first");
    let second = map.compute(CLASSIC).expect("second");
    assert_eq!(first, second);
}

#[test]
fn longer_span_never_loses_crossings() {
    let mut previous: Vec<XzPoint> = Vec::new();
    for max_steps in [5_000, 10_000, 20_000, 40_000] {
        let result = fixed_map(max_steps).compute(CLASSIC).expect("result");
        assert!(result.count >= previous.len());
        assert_eq!(&result.points[..previous.len()], previous.as_slice());
        previous = result.points;
    }
}

#[test]
fn sampled_mode_finds_bounded_attractor() {
    let map: PoincareMap<YSection> =
        PoincareMap::new(PoincareSettings::with_integrator(IntegratorSettings::sampled()))
            .expect("valid settings");
    let result = map.compute(CLASSIC).expect("result");
    assert!(!result.diverged);
    assert!(result.count > 5, "count = {}", result.count);
}

#[test]
fn sampled_and_fixed_modes_agree_on_early_crossings() {
    let sampled: PoincareMap<YSection> = PoincareMap::new(PoincareSettings::with_integrator(
        IntegratorSettings::Sampled {
            t_end: 30.0,
            samples: 3001,
            rtol: 1e-10,
            atol: 1e-10,
        },
    ))
    .expect("valid settings");
    let sampled = sampled.compute(CLASSIC).expect("sampled");
    let fixed = fixed_map(3_000).compute(CLASSIC).expect("fixed");

    assert!(sampled.count >= 3 && fixed.count >= 3);
    for (s, f) in sampled.points.iter().zip(&fixed.points).take(3) {
        assert!((s.x - f.x).abs() < 1e-2, "{s:?} vs {f:?}");
        assert!((s.z - f.z).abs() < 1e-2, "{s:?} vs {f:?}");
    }
}

#[test]
fn cached_results_equal_direct_results() {
    let cache = CachedPoincareMap::unbounded(fixed_map(10_000));
    let direct = fixed_map(10_000).compute(CLASSIC).expect("direct");
    let first = cache.get_or_compute(CLASSIC).expect("first");
    let second = cache.get_or_compute(CLASSIC).expect("second");
    assert_eq!(*first, direct);
    assert_eq!(first, second);
    assert_eq!(cache.stats().computations, 1);
}
