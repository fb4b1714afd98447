//! Order reduction.
//!
//! Reduction replaces the smallest generators with the axis-aligned box
//! that encloses them. The result always contains the input and has at
//! most `order · n` generators. The reduction policy is an explicit
//! [`ReductionConfig`] passed to every call.

use crate::zonotope::{box_generators, Zonotope};
use ndarray::{s, Array2, Axis};
use reach_core::{ReachError, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Generator-selection strategy for order reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReductionMethod {
    /// Rank generators by `‖g‖₁ − ‖g‖∞`; flat, axis-aligned generators go first.
    #[default]
    Girard,
    /// Rank generators by `‖g‖₂`.
    Combastel,
    /// Replace all generators by their interval hull.
    Box,
}

/// Reduction policy: method and target order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    pub method: ReductionMethod,
    /// Maximum generators per dimension after reduction.
    pub order: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            method: ReductionMethod::Girard,
            order: 50,
        }
    }
}

impl ReductionConfig {
    pub fn new(method: ReductionMethod, order: usize) -> Result<Self> {
        let config = Self { method, order };
        config.validate()?;
        Ok(config)
    }

    pub fn girard(order: usize) -> Result<Self> {
        Self::new(ReductionMethod::Girard, order)
    }

    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(ReachError::Configuration(
                "reduction order must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl ReductionMethod {
    fn metric(&self, g: ndarray::ArrayView1<f64>) -> f64 {
        match self {
            ReductionMethod::Girard => {
                let l1: f64 = g.iter().map(|v| v.abs()).sum();
                let linf = g.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()));
                l1 - linf
            }
            ReductionMethod::Combastel => g.iter().map(|v| v * v).sum::<f64>().sqrt(),
            ReductionMethod::Box => 0.0,
        }
    }
}

impl Zonotope {
    /// Reduce the generator count to at most `config.order · n`.
    ///
    /// Zero generators are dropped first. Nothing else changes when the
    /// count is already within the target. Otherwise the
    /// `(order − 1) · n` generators with the largest metric are kept (in
    /// their original relative order) and the rest are replaced by their
    /// interval hull. Ranking is a stable sort by descending metric, so
    /// ties keep their original index order.
    pub fn reduce(&self, config: &ReductionConfig) -> Zonotope {
        let z = self.remove_zero_generators();
        let n = z.dim();
        let m = z.generator_count();
        let order = config.order.max(1);
        if n == 0 || m <= order.saturating_mul(n) {
            return z;
        }

        let g = z.generators();
        let keep_count = match config.method {
            ReductionMethod::Box => 0,
            _ => (order - 1).saturating_mul(n),
        };

        let mut ranked: Vec<(usize, f64)> = (0..m)
            .map(|j| (j, config.method.metric(g.column(j))))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut kept: Vec<usize> = ranked[..keep_count].iter().map(|&(j, _)| j).collect();
        kept.sort_unstable();
        let reduced: Vec<usize> = ranked[keep_count..].iter().map(|&(j, _)| j).collect();

        let boxed = box_generators(
            &g.select(Axis(1), &reduced)
                .mapv(f64::abs)
                .sum_axis(Axis(1)),
        );
        let mut generators = Array2::zeros((n, kept.len() + boxed.ncols()));
        generators
            .slice_mut(s![.., ..kept.len()])
            .assign(&g.select(Axis(1), &kept));
        generators
            .slice_mut(s![.., kept.len()..])
            .assign(&boxed);

        trace!(
            "Reduced zonotope: {} -> {} generators ({:?}, order {})",
            m,
            generators.ncols(),
            config.method,
            order
        );

        Zonotope {
            center: z.center,
            generators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halfspace::HalfSpace;
    use ndarray::{arr1, arr2, Array1};
    use proptest::prelude::*;

    fn many_generators() -> Zonotope {
        Zonotope::new(
            arr1(&[0.0, 0.0]),
            arr2(&[
                [1.0, 0.1, 0.0, 0.05, 2.0, -0.02, 0.3],
                [0.0, 0.1, 1.0, -0.05, 1.0, 0.01, -0.3],
            ]),
        )
        .unwrap()
    }

    #[test]
    fn test_no_reduction_within_order() {
        let z = many_generators();
        let config = ReductionConfig::girard(4).unwrap();
        assert_eq!(z.reduce(&config), z);
    }

    #[test]
    fn test_reduction_bounds_generator_count() {
        let z = many_generators();
        for method in [
            ReductionMethod::Girard,
            ReductionMethod::Combastel,
            ReductionMethod::Box,
        ] {
            for order in 1..=3 {
                let config = ReductionConfig::new(method, order).unwrap();
                let r = z.reduce(&config);
                assert!(r.generator_count() <= order * z.dim(), "{method:?} order {order}");
                assert_eq!(r.center(), z.center());
            }
        }
    }

    #[test]
    fn test_girard_keeps_largest_generators() {
        let z = many_generators();
        let r = z.reduce(&ReductionConfig::girard(2).unwrap());
        // The generator [2, 1] has the largest Girard metric and survives unchanged
        let survives = (0..r.generator_count())
            .any(|j| r.generators().column(j).to_owned() == arr1(&[2.0, 1.0]));
        assert!(survives);
    }

    #[test]
    fn test_box_reduction_is_interval_hull() {
        let z = many_generators();
        let r = z.reduce(&ReductionConfig::new(ReductionMethod::Box, 1).unwrap());
        assert_eq!(r.interval_hull(), z.interval_hull());
        assert_eq!(r.generator_count(), 2);
    }

    #[test]
    fn test_reduction_is_deterministic() {
        // Equal metrics everywhere: the tie-break by index decides
        let z = Zonotope::new(
            arr1(&[0.0, 0.0]),
            arr2(&[[1.0, -1.0, 1.0, 1.0, -1.0], [1.0, 1.0, -1.0, 1.0, 1.0]]),
        )
        .unwrap();
        let config = ReductionConfig::girard(2).unwrap();
        let a = z.reduce(&config);
        let b = z.reduce(&config);
        assert_eq!(a, b);
        assert_eq!(a.generators().column(0).to_owned(), arr1(&[1.0, 1.0]));
        assert_eq!(a.generators().column(1).to_owned(), arr1(&[-1.0, 1.0]));
    }

    #[test]
    fn test_zero_order_rejected() {
        assert!(ReductionConfig::girard(0).is_err());
    }

    #[test]
    fn test_unbounded_order_keeps_everything() {
        let z = many_generators();
        for method in [ReductionMethod::Girard, ReductionMethod::Combastel] {
            let config = ReductionConfig::new(method, usize::MAX).unwrap();
            assert_eq!(z.reduce(&config), z);
        }
        let boxed = z.reduce(&ReductionConfig::new(ReductionMethod::Box, usize::MAX).unwrap());
        assert_eq!(boxed, z);
    }

    fn zonotope_strategy() -> impl Strategy<Value = (Zonotope, usize)> {
        (2usize..=3).prop_flat_map(|n| {
            (
                proptest::collection::vec(-5.0f64..5.0, n),
                proptest::collection::vec(-2.0f64..2.0, n * (n + 1)..=n * 8),
                1usize..=2,
            )
                .prop_map(move |(c, g, order)| {
                    let m = g.len() / n;
                    let gens = Array2::from_shape_vec((n, m), g[..n * m].to_vec()).unwrap();
                    (Zonotope::new(Array1::from(c), gens).unwrap(), order)
                })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// reduce(Z, k) ⊇ Z and has at most k·n generators.
        #[test]
        fn reduction_contains_original((z, order) in zonotope_strategy(), method_idx in 0usize..3) {
            let method = [ReductionMethod::Girard, ReductionMethod::Combastel, ReductionMethod::Box][method_idx];
            let config = ReductionConfig::new(method, order).unwrap();
            let r = z.reduce(&config);
            prop_assert!(r.generator_count() <= order * z.dim());

            // Vertex-like points of Z lie in the half-space form of the reduced set
            let hs = HalfSpace::from_zonotope(&r).unwrap();
            let m = z.generator_count();
            for mask in 0..(1usize << m.min(10)) {
                let beta = Array1::from_shape_fn(m, |j| if j < 10 && mask & (1 << j) != 0 { 1.0 } else { -1.0 });
                let p = z.point_at(&beta).unwrap();
                prop_assert!(hs.contains(&p, 1e-9), "point {p} escapes reduced set");
            }
        }
    }
}
