use crate::error::PoincareError;
use crate::guard::{DivergenceGuard, GuardStatus};
use crate::integrator::Sample;
use crate::rossler::{Parameters, Rossler, INITIAL_STATE};
use crate::section::{CrossingDetector, Section, YSection};
use crate::settings::PoincareSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// The section convention used by [`compute`]: y = 0 crossed upward, reported as `{x, z}`.
pub type CanonicalSection = YSection;

/// Crossings collected for one parameter triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoincareResult<P> {
    pub points: Vec<P>,
    pub diverged: bool,
    pub count: usize,
}

impl<P> PoincareResult<P> {
    fn new(points: Vec<P>, diverged: bool) -> Self {
        let count = points.len();
        Self {
            points,
            diverged,
            count,
        }
    }
}

/// Computes the Poincaré section for the section type `S` under fixed settings.
#[derive(Debug, Clone)]
pub struct PoincareMap<S: Section = CanonicalSection> {
    settings: PoincareSettings,
    _section: PhantomData<S>,
}

impl<S: Section> PoincareMap<S> {
    pub fn new(settings: PoincareSettings) -> Result<Self> {
        settings
            .validate()
            .context("Invalid Poincaré map settings.")?;
        Ok(Self {
            settings,
            _section: PhantomData,
        })
    }

    /// Integrates from the fixed initial state and collects every section crossing.
    pub fn compute(&self, params: Parameters) -> Result<PoincareResult<S::Point>, PoincareError> {
        params.validate()?;
        debug!(a = params.a, b = params.b, c = params.c, "computing Poincaré section");

        let system = Rossler::new(params);
        let trajectory = self.settings.integrator.trajectory(system, INITIAL_STATE);
        let result = self.scan(trajectory);
        debug!(
            count = result.count,
            diverged = result.diverged,
            "Poincaré section complete"
        );
        Ok(result)
    }

    /// Runs each sample through the divergence guard before the crossing detector.
    /// The sample that trips the guard is discarded and the scan stops there.
    fn scan(&self, trajectory: impl Iterator<Item = Sample>) -> PoincareResult<S::Point> {
        let mut guard = DivergenceGuard::new(self.settings.divergence_bound);
        let mut detector = CrossingDetector::<S>::new(
            self.settings.section.threshold,
            self.settings.section.direction,
        );

        let mut points = Vec::new();
        for sample in trajectory {
            if guard.inspect(&sample.state) == GuardStatus::Diverged {
                debug!(t = sample.t, "trajectory diverged");
                break;
            }
            if let Some(point) = detector.observe(sample.state) {
                points.push(point);
            }
        }
        PoincareResult::new(points, guard.has_diverged())
    }
}

impl Default for PoincareMap<CanonicalSection> {
    fn default() -> Self {
        Self {
            settings: PoincareSettings::default(),
            _section: PhantomData,
        }
    }
}

/// Poincaré section of the Rössler attractor for (a, b, c) with the canonical settings:
/// fixed-step RK4 (dt = 0.01, 200 000 steps), y = 0 crossed upward, divergence bound 1e10.
pub fn compute(
    a: f64,
    b: f64,
    c: f64,
) -> Result<PoincareResult<<CanonicalSection as Section>::Point>, PoincareError> {
    PoincareMap::<CanonicalSection>::default().compute(Parameters::new(a, b, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rossler::State;
    use crate::section::{CrossingDirection, XzPoint, ZSection};
    use crate::settings::{IntegratorSettings, SectionSettings};

    fn short_fixed(max_steps: usize) -> PoincareSettings {
        PoincareSettings::with_integrator(IntegratorSettings::FixedStep {
            dt: 0.01,
            max_steps,
        })
    }

    #[test]
    fn new_rejects_invalid_settings() {
        let err = PoincareMap::<YSection>::new(short_fixed(0)).expect_err("expected error");
        let message = format!("{err:#}");
        assert!(message.contains("Invalid Poincaré map settings"), "{message}");
        assert!(message.contains("max_steps"), "{message}");
    }

    #[test]
    fn non_finite_parameter_is_rejected_before_integration() {
        let err = compute(0.2, f64::NAN, 5.7).expect_err("NaN must be rejected");
        assert!(matches!(err, PoincareError::InvalidParameter { name: "b", .. }));
    }

    #[test]
    fn count_matches_points() {
        let map = PoincareMap::<YSection>::new(short_fixed(20_000)).expect("map");
        let result = map.compute(Parameters::new(0.2, 0.2, 5.7)).expect("result");
        assert_eq!(result.count, result.points.len());
        assert!(result.count > 0);
        assert!(!result.diverged);
    }

    fn samples(ys: &[f64]) -> Vec<Sample> {
        ys.iter()
            .enumerate()
            .map(|(i, &y)| Sample {
                t: i as f64,
                state: State::new(1.0, y, 2.0),
            })
            .collect()
    }

    #[test]
    fn diverging_sample_never_reaches_detector() {
        // -1 -> 1e11 would be an upward crossing if the guard let it through.
        let map = PoincareMap::<YSection>::default();
        let result = map.scan(samples(&[-1.0, 1e11, -1.0, 1.0]).into_iter());
        assert!(result.diverged);
        assert_eq!(result.count, 0);
        assert!(result.points.is_empty());
    }

    #[test]
    fn crossings_before_divergence_are_kept() {
        let map = PoincareMap::<YSection>::default();
        let result = map.scan(samples(&[-1.0, 1.0, -1.0, f64::NAN, -1.0, 1.0]).into_iter());
        assert!(result.diverged);
        assert_eq!(result.points, vec![XzPoint { x: 1.0, z: 2.0 }]);
    }

    #[test]
    fn bounded_scan_reports_every_crossing() {
        let map = PoincareMap::<YSection>::default();
        let result = map.scan(samples(&[-1.0, 1.0, -1.0, 3.0]).into_iter());
        assert!(!result.diverged);
        assert_eq!(result.count, 2);
    }

    #[test]
    fn stiff_blow_up_sets_diverged_and_stops() {
        // |dt * (x - c)| far outside the RK4 stability region.
        let result = compute(0.2, 0.2, 1000.0).expect("result");
        assert!(result.diverged);
        assert_eq!(result.count, result.points.len());
    }

    #[test]
    fn downward_direction_can_be_configured() {
        let mut settings = short_fixed(20_000);
        settings.section = SectionSettings {
            threshold: 0.0,
            direction: CrossingDirection::Downward,
        };
        let map = PoincareMap::<YSection>::new(settings).expect("map");
        let result = map.compute(Parameters::new(0.2, 0.2, 5.7)).expect("result");
        assert!(result.count > 0);
        // Downward y-crossings of the Rössler flow happen where x < 0.
        assert!(result.points.iter().all(|p: &XzPoint| p.x < 0.0));
    }

    #[test]
    fn z_section_at_zero_never_fires_for_positive_b() {
        // z' = b > 0 on the plane z = 0, so a trajectory starting at z = 1 never reaches it.
        let map = PoincareMap::<ZSection>::new(short_fixed(20_000)).expect("map");
        let result = map.compute(Parameters::new(0.2, 0.2, 5.7)).expect("result");
        assert_eq!(result.count, 0);
        assert!(!result.diverged);
    }

    #[test]
    fn result_serializes_with_named_axes() {
        let result = PoincareResult::new(vec![XzPoint { x: 1.5, z: -0.25 }], false);
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "points": [{"x": 1.5, "z": -0.25}],
                "diverged": false,
                "count": 1
            })
        );
    }
}
