//! Taylor-series enclosure of the matrix exponential.
//!
//! The cache is built in two stages. [`ExponentialStage`] holds the
//! powers `Aᵏ`, the factors `dtᵏ/k!`, the truncated series `T` and the
//! remainder enclosure `E`. [`TaylorCache`] adds the time-interval
//! correction `F` and the constant-input correction `G`. Both are
//! immutable once built; a different `dt` or term count means a new cache.

use crate::expm::expm;
use ndarray::Array2;
use reach_core::{ReachError, Result};
use reach_interval::IntervalMatrix;
use tracing::trace;

/// Truncated series and its rigorous remainder.
#[derive(Debug, Clone)]
pub struct ExponentialStage {
    step: f64,
    terms: usize,
    /// `powers[k - 1] = Aᵏ` for `k = 1..=terms + 1`.
    powers: Vec<Array2<f64>>,
    /// `factors[i] = dt^(i+1) / (i+1)!` for `i = 0..=terms`.
    factors: Vec<f64>,
    /// `T = Σ_{k=0}^{terms} Aᵏ·dtᵏ/k!`.
    propagator: Array2<f64>,
    /// `E = [−W, W]` with `W = |exp(|A|·dt) − Σ_{k=0}^{terms} |A|ᵏ·dtᵏ/k!|`.
    remainder: IntervalMatrix,
}

/// `dt^(i+1) / (i+1)!` for `i = 0..=terms`.
pub fn taylor_factors(step: f64, terms: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(terms + 1);
    let mut acc = 1.0;
    for i in 1..=terms + 1 {
        acc *= step / i as f64;
        out.push(acc);
    }
    out
}

impl ExponentialStage {
    pub fn compute(a: &Array2<f64>, step: f64, terms: usize) -> Result<Self> {
        Self::with_factors(a, step, terms, taylor_factors(step, terms))
    }

    /// Build from caller-supplied factors; there must be `terms + 1` of them.
    pub fn with_factors(
        a: &Array2<f64>,
        step: f64,
        terms: usize,
        factors: Vec<f64>,
    ) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(ReachError::Configuration(format!(
                "system matrix must be square, got {}x{}",
                n,
                a.ncols()
            )));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(ReachError::Configuration(format!(
                "time step must be positive, got {step}"
            )));
        }
        if terms == 0 {
            return Err(ReachError::Configuration(
                "taylor_terms must be at least 1".to_string(),
            ));
        }
        if factors.len() != terms + 1 {
            return Err(ReachError::Configuration(format!(
                "expected {} Taylor factors for {} terms, got {}",
                terms + 1,
                terms,
                factors.len()
            )));
        }

        let mut powers = Vec::with_capacity(terms + 1);
        powers.push(a.clone());
        for k in 1..=terms {
            let next = powers[k - 1].dot(a);
            powers.push(next);
        }

        let abs_a = a.mapv(f64::abs);
        let mut propagator = Array2::eye(n);
        let mut abs_series = Array2::eye(n);
        let mut abs_power = Array2::eye(n);
        for k in 1..=terms {
            propagator.scaled_add(factors[k - 1], &powers[k - 1]);
            abs_power = abs_power.dot(&abs_a);
            abs_series.scaled_add(factors[k - 1], &abs_power);
        }

        let full = expm(&(&abs_a * step))?;
        let w = (full - abs_series).mapv(f64::abs);
        let remainder = IntervalMatrix::symmetric(&w);
        if !remainder.is_finite() || propagator.iter().any(|v| !v.is_finite()) {
            return Err(ReachError::degenerate(
                "Taylor remainder",
                abs_a.rows().into_iter().map(|r| r.sum()).fold(0.0, f64::max),
            ));
        }
        trace!(
            "Exponential stage: dt={}, terms={}, remainder norm {:e}",
            step,
            terms,
            remainder.norm_inf()
        );

        Ok(Self {
            step,
            terms,
            powers,
            factors,
            propagator,
            remainder,
        })
    }
}

/// Sign-split accumulation of `Σ fᵢ·Mᵢ` with negative scalars `fᵢ`.
///
/// Positive entries of `Mᵢ` extend the lower bound, negative ones the upper.
fn curvature_enclosure<'a>(
    n: usize,
    terms: impl Iterator<Item = (f64, &'a Array2<f64>)>,
) -> IntervalMatrix {
    let mut lower = Array2::zeros((n, n));
    let mut upper = Array2::zeros((n, n));
    for (f, m) in terms {
        lower.scaled_add(f, &m.mapv(|v| v.max(0.0)));
        upper.scaled_add(f, &m.mapv(|v| v.min(0.0)));
    }
    IntervalMatrix { lower, upper }
}

/// Coefficient `i^(−i/(i−1)) − i^(−1/(i−1))` of the time-interval error (negative for i ≥ 2).
fn interval_coefficient(i: usize) -> f64 {
    let i_f = i as f64;
    let denom = (i - 1) as f64;
    i_f.powf(-i_f / denom) - i_f.powf(-1.0 / denom)
}

/// Complete per-step cache for one `(A, dt, taylor_terms)`.
#[derive(Debug, Clone)]
pub struct TaylorCache {
    exponential: ExponentialStage,
    /// `F`: time-interval error for the homogeneous solution, including `E`.
    curvature: IntervalMatrix,
    /// `G`: time-interval error for the constant input, including `E·dt`.
    input_correction: IntervalMatrix,
    /// `dt·I + Σ_{k=1}^{terms} Aᵏ·dt^(k+1)/(k+1)!`.
    input_sum: Array2<f64>,
}

impl TaylorCache {
    pub fn compute(a: &Array2<f64>, step: f64, terms: usize) -> Result<Self> {
        Self::from_stage(ExponentialStage::compute(a, step, terms)?)
    }

    pub fn with_factors(
        a: &Array2<f64>,
        step: f64,
        terms: usize,
        factors: Vec<f64>,
    ) -> Result<Self> {
        Self::from_stage(ExponentialStage::with_factors(a, step, terms, factors)?)
    }

    pub fn from_stage(exponential: ExponentialStage) -> Result<Self> {
        let n = exponential.propagator.nrows();
        let terms = exponential.terms;
        let step = exponential.step;
        let e = &exponential.remainder;

        let f = curvature_enclosure(
            n,
            (2..=terms).map(|i| {
                (
                    interval_coefficient(i) * exponential.factors[i - 1],
                    &exponential.powers[i - 1],
                )
            }),
        );
        let curvature = f.checked_add(e)?;

        let g = curvature_enclosure(
            n,
            (2..=terms + 1).map(|i| {
                (
                    interval_coefficient(i) * exponential.factors[i - 1],
                    &exponential.powers[i - 2],
                )
            }),
        );
        let input_correction = g.checked_add(&e.scale(step))?;

        let mut input_sum = Array2::eye(n) * step;
        for k in 1..=terms {
            input_sum.scaled_add(exponential.factors[k], &exponential.powers[k - 1]);
        }

        Ok(Self {
            exponential,
            curvature,
            input_correction,
            input_sum,
        })
    }

    /// True if this cache was built for `step` and `terms`.
    pub fn matches(&self, step: f64, terms: usize) -> bool {
        self.exponential.step == step && self.exponential.terms == terms
    }

    #[inline]
    pub fn step(&self) -> f64 {
        self.exponential.step
    }

    #[inline]
    pub fn terms(&self) -> usize {
        self.exponential.terms
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.exponential.propagator.nrows()
    }

    /// `Aᵏ` for `k = 1..=terms + 1`.
    pub fn power(&self, k: usize) -> Option<&Array2<f64>> {
        k.checked_sub(1).and_then(|i| self.exponential.powers.get(i))
    }

    pub fn factors(&self) -> &[f64] {
        &self.exponential.factors
    }

    pub fn propagator(&self) -> &Array2<f64> {
        &self.exponential.propagator
    }

    pub fn remainder(&self) -> &IntervalMatrix {
        &self.exponential.remainder
    }

    pub fn curvature(&self) -> &IntervalMatrix {
        &self.curvature
    }

    pub fn input_correction(&self) -> &IntervalMatrix {
        &self.input_correction
    }

    pub fn input_sum(&self) -> &Array2<f64> {
        &self.input_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn rotation() -> Array2<f64> {
        arr2(&[[-1.0, -4.0], [4.0, -1.0]])
    }

    #[test]
    fn test_factors() {
        let f = taylor_factors(0.5, 3);
        assert_eq!(f.len(), 4);
        assert!((f[0] - 0.5).abs() < 1e-15);
        assert!((f[1] - 0.125).abs() < 1e-15);
        assert!((f[3] - 0.0625 / 24.0).abs() < 1e-15);
    }

    #[test]
    fn test_propagator_encloses_exponential() {
        let a = rotation();
        let dt = 0.04;
        let cache = TaylorCache::compute(&a, dt, 4).unwrap();
        let exact = expm(&(&a * dt)).unwrap();
        let lower = cache.propagator() + &cache.remainder().lower;
        let upper = cache.propagator() + &cache.remainder().upper;
        for ((l, u), x) in lower.iter().zip(upper.iter()).zip(exact.iter()) {
            assert!(*l <= *x + 1e-15 && *x <= *u + 1e-15);
        }
    }

    #[test]
    fn test_remainder_shrinks_with_more_terms() {
        let a = rotation();
        let coarse = TaylorCache::compute(&a, 0.04, 2).unwrap();
        let fine = TaylorCache::compute(&a, 0.04, 6).unwrap();
        assert!(fine.remainder().norm_inf() < coarse.remainder().norm_inf());
    }

    #[test]
    fn test_curvature_contains_remainder_and_is_signed() {
        let cache = TaylorCache::compute(&rotation(), 0.04, 4).unwrap();
        let f = cache.curvature();
        let e = cache.remainder();
        for (fl, el) in f.lower.iter().zip(e.lower.iter()) {
            assert!(fl <= el);
        }
        for (fu, eu) in f.upper.iter().zip(e.upper.iter()) {
            assert!(fu >= eu);
        }
        assert!(cache.input_correction().norm_inf() > 0.0);
    }

    #[test]
    fn test_single_term_has_only_remainder_curvature() {
        let cache = TaylorCache::compute(&rotation(), 0.1, 1).unwrap();
        assert_eq!(cache.curvature(), cache.remainder());
        assert_eq!(cache.power(2).unwrap(), &rotation().dot(&rotation()));
        assert!(cache.power(3).is_none());
        assert!(cache.power(0).is_none());
    }

    #[test]
    fn test_interval_coefficient_negative() {
        for i in 2..10 {
            assert!(interval_coefficient(i) < 0.0);
        }
        assert!((interval_coefficient(2) - (0.25 - 0.5)).abs() < 1e-15);
    }

    #[test]
    fn test_input_sum_matches_integral_of_exponential() {
        // For a scalar system ∫₀^dt e^{as} ds = (e^{a dt} − 1)/a
        let a = arr2(&[[-2.0]]);
        let dt = 0.1;
        let cache = TaylorCache::compute(&a, dt, 8).unwrap();
        let exact = ((-2.0f64 * dt).exp() - 1.0) / -2.0;
        assert!((cache.input_sum()[[0, 0]] - exact).abs() < 1e-12);
    }

    #[test]
    fn test_with_factors_checks_length() {
        let a = rotation();
        let err = TaylorCache::with_factors(&a, 0.1, 4, vec![0.1; 3]).unwrap_err();
        assert!(matches!(err, ReachError::Configuration(_)));
        assert!(TaylorCache::with_factors(&a, 0.1, 4, taylor_factors(0.1, 4)).is_ok());
    }

    #[test]
    fn test_non_square_rejected() {
        let err = TaylorCache::compute(&Array2::zeros((2, 3)), 0.1, 4).unwrap_err();
        assert!(matches!(err, ReachError::Configuration(_)));
    }

    #[test]
    fn test_matches() {
        let cache = TaylorCache::compute(&rotation(), 0.04, 4).unwrap();
        assert!(cache.matches(0.04, 4));
        assert!(!cache.matches(0.05, 4));
        assert!(!cache.matches(0.04, 5));
        assert_eq!(cache.dim(), 2);
        assert_eq!(cache.step(), 0.04);
        assert_eq!(cache.terms(), 4);
        assert_eq!(cache.factors().len(), 5);
    }

    #[test]
    fn test_overflowing_system_is_degenerate() {
        let a = arr2(&[[1000.0, 0.0], [0.0, 0.0]]);
        let err = TaylorCache::compute(&a, 1.0, 4).unwrap_err();
        assert!(matches!(err, ReachError::NumericDegeneracy { .. }));
    }
}
