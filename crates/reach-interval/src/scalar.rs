//! Scalar intervals and the [`Scalar`] abstraction over point and interval values.

use reach_core::{ReachError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// A closed interval `[lower, upper]` of reals.
///
/// Every arithmetic operation returns an interval containing the image of
/// the operation over all point combinations drawn from the operands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

/// Multiply two bounds with `0 * inf = 0`.
#[inline]
pub(crate) fn safe_mul(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

/// True if `phase + k·2π` lies in `[lo, hi]` for some integer `k`.
#[inline]
fn contains_phase(lo: f64, hi: f64, phase: f64) -> bool {
    let k = ((lo - phase) / TAU).ceil();
    phase + k * TAU <= hi
}

impl Interval {
    /// Create a new interval.
    #[inline]
    pub fn new(lower: f64, upper: f64) -> Self {
        debug_assert!(lower <= upper, "Invalid interval: {lower} > {upper}");
        Self { lower, upper }
    }

    /// Create an interval, rejecting `lower > upper` and NaN bounds.
    pub fn try_new(lower: f64, upper: f64) -> Result<Self> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(ReachError::InvalidBounds(format!(
                "[{lower}, {upper}]"
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Degenerate interval `[v, v]`.
    #[inline]
    pub fn point(value: f64) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    /// `[-|r|, |r|]`.
    #[inline]
    pub fn symmetric(radius: f64) -> Self {
        let r = radius.abs();
        Self {
            lower: -r,
            upper: r,
        }
    }

    #[inline]
    pub fn zero() -> Self {
        Self::point(0.0)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    #[inline]
    pub fn mid(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    #[inline]
    pub fn rad(&self) -> f64 {
        0.5 * (self.upper - self.lower)
    }

    /// Magnitude: `max(|lower|, |upper|)`.
    #[inline]
    pub fn mag(&self) -> f64 {
        self.lower.abs().max(self.upper.abs())
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    #[inline]
    pub fn contains_interval(&self, other: &Interval) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }

    #[inline]
    pub fn contains_zero(&self) -> bool {
        self.contains(0.0)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    /// Smallest interval containing both operands.
    #[inline]
    pub fn hull(&self, other: &Interval) -> Interval {
        Interval {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    #[inline]
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        (lower <= upper).then_some(Interval { lower, upper })
    }

    /// Range of `|x|` over the interval.
    pub fn abs(&self) -> Interval {
        if self.lower >= 0.0 {
            *self
        } else if self.upper <= 0.0 {
            Interval::new(-self.upper, -self.lower)
        } else {
            Interval::new(0.0, self.mag())
        }
    }

    /// Range of `x²`; tighter than `x * x` when the interval straddles zero.
    pub fn sqr(&self) -> Interval {
        let a = self.abs();
        Interval::new(a.lower * a.lower, a.upper * a.upper)
    }

    pub fn powi(&self, n: i32) -> Interval {
        match n {
            0 => Interval::point(1.0),
            1 => *self,
            n if n < 0 => self.powi(-n).recip(),
            n if n % 2 == 0 => {
                let a = self.abs();
                Interval::new(a.lower.powi(n), a.upper.powi(n))
            }
            n => Interval::new(self.lower.powi(n), self.upper.powi(n)),
        }
    }

    /// Square root over the non-negative part; NaN bounds when the interval
    /// is entirely negative, so callers detect the failure through
    /// [`Interval::is_finite`].
    pub fn sqrt(&self) -> Interval {
        if self.upper < 0.0 {
            return Interval {
                lower: f64::NAN,
                upper: f64::NAN,
            };
        }
        Interval::new(self.lower.max(0.0).sqrt(), self.upper.sqrt())
    }

    pub fn exp(&self) -> Interval {
        Interval::new(self.lower.exp(), self.upper.exp())
    }

    /// `1/x`; the whole real line when the interval contains zero.
    pub fn recip(&self) -> Interval {
        if self.contains_zero() {
            Interval::new(f64::NEG_INFINITY, f64::INFINITY)
        } else {
            Interval::new(1.0 / self.upper, 1.0 / self.lower)
        }
    }

    pub fn sin(&self) -> Interval {
        self.periodic(f64::sin, FRAC_PI_2, -FRAC_PI_2)
    }

    pub fn cos(&self) -> Interval {
        self.periodic(f64::cos, 0.0, PI)
    }

    /// Range of a 2π-periodic function with its maximum at `max_phase`
    /// and minimum at `min_phase`.
    fn periodic(&self, f: fn(f64) -> f64, max_phase: f64, min_phase: f64) -> Interval {
        if !self.is_finite() || self.width() >= TAU {
            return Interval::new(-1.0, 1.0);
        }
        let (a, b) = (f(self.lower), f(self.upper));
        let upper = if contains_phase(self.lower, self.upper, max_phase) {
            1.0
        } else {
            a.max(b)
        };
        let lower = if contains_phase(self.lower, self.upper, min_phase) {
            -1.0
        } else {
            a.min(b)
        };
        Interval::new(lower, upper)
    }
}

impl From<f64> for Interval {
    fn from(value: f64) -> Self {
        Interval::point(value)
    }
}

impl Add for Interval {
    type Output = Interval;

    #[inline]
    fn add(self, rhs: Interval) -> Interval {
        Interval::new(self.lower + rhs.lower, self.upper + rhs.upper)
    }
}

impl Sub for Interval {
    type Output = Interval;

    #[inline]
    fn sub(self, rhs: Interval) -> Interval {
        Interval::new(self.lower - rhs.upper, self.upper - rhs.lower)
    }
}

impl Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Interval) -> Interval {
        let corners = [
            safe_mul(self.lower, rhs.lower),
            safe_mul(self.lower, rhs.upper),
            safe_mul(self.upper, rhs.lower),
            safe_mul(self.upper, rhs.upper),
        ];
        let lower = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let upper = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Interval::new(lower, upper)
    }
}

impl Mul<f64> for Interval {
    type Output = Interval;

    #[inline]
    fn mul(self, rhs: f64) -> Interval {
        let (a, b) = (safe_mul(self.lower, rhs), safe_mul(self.upper, rhs));
        Interval::new(a.min(b), a.max(b))
    }
}

impl Neg for Interval {
    type Output = Interval;

    #[inline]
    fn neg(self) -> Interval {
        Interval::new(-self.upper, -self.lower)
    }
}

/// Values a vector field can be evaluated on.
///
/// Implemented for `f64` (point evaluation) and [`Interval`] (enclosure
/// evaluation). A field written once against this trait yields both the
/// linearization data and the remainder enclosures.
pub trait Scalar:
    Clone
    + Debug
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
{
    fn constant(value: f64) -> Self;

    fn sin(&self) -> Self;

    fn cos(&self) -> Self;

    fn exp(&self) -> Self;

    fn sqrt(&self) -> Self;

    fn recip(&self) -> Self;

    fn powi(&self, n: i32) -> Self;

    /// Multiply by a constant.
    fn scale(&self, factor: f64) -> Self {
        self.clone() * Self::constant(factor)
    }
}

impl Scalar for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }

    #[inline]
    fn sin(&self) -> Self {
        f64::sin(*self)
    }

    #[inline]
    fn cos(&self) -> Self {
        f64::cos(*self)
    }

    #[inline]
    fn exp(&self) -> Self {
        f64::exp(*self)
    }

    #[inline]
    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }

    #[inline]
    fn recip(&self) -> Self {
        f64::recip(*self)
    }

    #[inline]
    fn powi(&self, n: i32) -> Self {
        f64::powi(*self, n)
    }

    #[inline]
    fn scale(&self, factor: f64) -> Self {
        self * factor
    }
}

impl Scalar for Interval {
    #[inline]
    fn constant(value: f64) -> Self {
        Interval::point(value)
    }

    fn sin(&self) -> Self {
        Interval::sin(self)
    }

    fn cos(&self) -> Self {
        Interval::cos(self)
    }

    fn exp(&self) -> Self {
        Interval::exp(self)
    }

    fn sqrt(&self) -> Self {
        Interval::sqrt(self)
    }

    fn recip(&self) -> Self {
        Interval::recip(self)
    }

    fn powi(&self, n: i32) -> Self {
        Interval::powi(self, n)
    }

    #[inline]
    fn scale(&self, factor: f64) -> Self {
        *self * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FP_TOLERANCE: f64 = 1e-12;

    fn valid_interval(range: f64) -> impl Strategy<Value = Interval> {
        (-range..range, -range..range).prop_map(|(a, b)| Interval::new(a.min(b), a.max(b)))
    }

    fn sample_points(iv: Interval, num_samples: usize) -> Vec<f64> {
        if iv.width() == 0.0 {
            return vec![iv.lower];
        }
        (0..=num_samples)
            .map(|i| {
                let t = i as f64 / num_samples as f64;
                (iv.lower + iv.width() * t).clamp(iv.lower, iv.upper)
            })
            .collect()
    }

    fn encloses(iv: Interval, value: f64) -> bool {
        iv.lower - FP_TOLERANCE <= value && value <= iv.upper + FP_TOLERANCE
    }

    #[test]
    fn test_basic_arithmetic() {
        let a = Interval::new(1.0, 2.0);
        let b = Interval::new(-3.0, 4.0);

        assert_eq!(a + b, Interval::new(-2.0, 6.0));
        assert_eq!(a - b, Interval::new(-3.0, 5.0));
        assert_eq!(a * b, Interval::new(-6.0, 8.0));
        assert_eq!(-a, Interval::new(-2.0, -1.0));
        assert_eq!(a * -2.0, Interval::new(-4.0, -2.0));
    }

    #[test]
    fn test_try_new_rejects_inverted_bounds() {
        assert!(Interval::try_new(1.0, 0.0).is_err());
        assert!(Interval::try_new(f64::NAN, 0.0).is_err());
        assert!(Interval::try_new(0.0, 0.0).is_ok());
    }

    #[test]
    fn test_abs_and_sqr_straddling_zero() {
        let x = Interval::new(-2.0, 1.0);
        assert_eq!(x.abs(), Interval::new(0.0, 2.0));
        assert_eq!(x.sqr(), Interval::new(0.0, 4.0));
        // x * x overestimates because the operands are treated as independent
        assert_eq!(x * x, Interval::new(-2.0, 4.0));
    }

    #[test]
    fn test_powi_odd_even_negative() {
        let x = Interval::new(-2.0, 3.0);
        assert_eq!(x.powi(2), Interval::new(0.0, 9.0));
        assert_eq!(x.powi(3), Interval::new(-8.0, 27.0));
        assert_eq!(x.powi(0), Interval::point(1.0));
        let pos = Interval::new(2.0, 4.0);
        assert_eq!(pos.powi(-1), Interval::new(0.25, 0.5));
    }

    #[test]
    fn test_recip_straddling_zero_is_unbounded() {
        let r = Interval::new(-1.0, 1.0).recip();
        assert!(!r.is_finite());
    }

    #[test]
    fn test_sqrt_negative_is_not_finite() {
        assert!(!Interval::new(-2.0, -1.0).sqrt().is_finite());
        assert_eq!(Interval::new(-1.0, 4.0).sqrt(), Interval::new(0.0, 2.0));
    }

    #[test]
    fn test_sin_cos_extrema() {
        let s = Interval::new(0.0, PI).sin();
        assert_eq!(s.upper, 1.0);
        assert!(s.lower.abs() < 1e-15);

        let c = Interval::new(-0.5, 0.5).cos();
        assert_eq!(c.upper, 1.0);

        let wide = Interval::new(0.0, 7.0).sin();
        assert_eq!(wide, Interval::new(-1.0, 1.0));
    }

    #[test]
    fn test_hull_intersect() {
        let a = Interval::new(0.0, 1.0);
        let b = Interval::new(2.0, 3.0);
        assert_eq!(a.hull(&b), Interval::new(0.0, 3.0));
        assert!(a.intersect(&b).is_none());
        assert_eq!(
            a.intersect(&Interval::new(0.5, 2.0)),
            Some(Interval::new(0.5, 1.0))
        );
    }

    #[test]
    fn test_mul_zero_times_infinity() {
        let a = Interval::point(0.0);
        let b = Interval::new(f64::NEG_INFINITY, f64::INFINITY);
        assert_eq!(a * b, Interval::point(0.0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn soundness_mul(a in valid_interval(50.0), b in valid_interval(50.0)) {
            let out = a * b;
            for x in sample_points(a, 8) {
                for y in sample_points(b, 8) {
                    prop_assert!(encloses(out, x * y), "{x}*{y} not in {out:?}");
                }
            }
        }

        #[test]
        fn soundness_sin_cos(a in valid_interval(20.0)) {
            let (s, c) = (a.sin(), a.cos());
            for x in sample_points(a, 64) {
                prop_assert!(encloses(s, x.sin()));
                prop_assert!(encloses(c, x.cos()));
            }
        }

        #[test]
        fn soundness_powi(a in valid_interval(5.0), n in 0i32..6) {
            let out = a.powi(n);
            for x in sample_points(a, 32) {
                let v = x.powi(n);
                prop_assert!(out.lower - 1e-9 * v.abs().max(1.0) <= v);
                prop_assert!(v <= out.upper + 1e-9 * v.abs().max(1.0));
            }
        }
    }
}
