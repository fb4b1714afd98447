//! Interval matrices.
//!
//! Products follow two rules:
//! - interval × interval uses the elementwise four-corner rule, giving the
//!   hull of every entry of the product;
//! - point × interval splits the point operand into its positive and
//!   negative parts, `A⁺·L + A⁻·U ≤ A·X ≤ A⁺·U + A⁻·L`, which is exact for
//!   each entry because the product is monotone in every interval operand.

use crate::scalar::{safe_mul, Interval};
use crate::vector::IntervalVector;
use ndarray::{Array1, Array2, Zip};
use reach_core::{ensure_shape, ReachError, Result};
use serde::{Deserialize, Serialize};

/// Matrix with interval entries `[lower, upper]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalMatrix {
    pub lower: Array2<f64>,
    pub upper: Array2<f64>,
}

#[inline]
fn positive_part(m: &Array2<f64>) -> Array2<f64> {
    m.mapv(|v| v.max(0.0))
}

#[inline]
fn negative_part(m: &Array2<f64>) -> Array2<f64> {
    m.mapv(|v| v.min(0.0))
}

impl IntervalMatrix {
    /// Create an interval matrix, validating shapes and `lower <= upper`.
    pub fn new(lower: Array2<f64>, upper: Array2<f64>) -> Result<Self> {
        ensure_shape(lower.shape(), upper.shape())?;
        let bad = Zip::indexed(&lower)
            .and(&upper)
            .fold(None, |acc, idx, l, u| {
                acc.or_else(|| (!(l <= u)).then_some(idx))
            });
        if let Some((i, j)) = bad {
            return Err(ReachError::InvalidBounds(format!(
                "entry ({i}, {j}): [{}, {}]",
                lower[[i, j]],
                upper[[i, j]]
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn from_point(m: &Array2<f64>) -> Self {
        Self {
            lower: m.clone(),
            upper: m.clone(),
        }
    }

    /// `[-|w|, |w|]` entrywise.
    pub fn symmetric(w: &Array2<f64>) -> Self {
        let r = w.mapv(f64::abs);
        Self {
            lower: -&r,
            upper: r,
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            lower: Array2::zeros((rows, cols)),
            upper: Array2::zeros((rows, cols)),
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.lower.dim()
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.lower.nrows()
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.lower.ncols()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Interval {
        Interval::new(self.lower[[i, j]], self.upper[[i, j]])
    }

    pub fn mid(&self) -> Array2<f64> {
        (&self.lower + &self.upper) * 0.5
    }

    pub fn rad(&self) -> Array2<f64> {
        (&self.upper - &self.lower) * 0.5
    }

    /// Entrywise magnitude `max(|lower|, |upper|)`.
    pub fn mag(&self) -> Array2<f64> {
        Zip::from(&self.lower)
            .and(&self.upper)
            .map_collect(|l, u| l.abs().max(u.abs()))
    }

    /// Range of `|x|` for every entry.
    pub fn abs(&self) -> IntervalMatrix {
        let mut out = IntervalMatrix::zeros(self.nrows(), self.ncols());
        Zip::from(&mut out.lower)
            .and(&mut out.upper)
            .and(&self.lower)
            .and(&self.upper)
            .for_each(|ol, ou, &l, &u| {
                let a = Interval::new(l, u).abs();
                *ol = a.lower;
                *ou = a.upper;
            });
        out
    }

    /// Infinity norm of the magnitude matrix (max row sum).
    pub fn norm_inf(&self) -> f64 {
        self.mag()
            .rows()
            .into_iter()
            .map(|row| row.sum())
            .fold(0.0, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).all(|v| v.is_finite())
    }

    pub fn contains_point(&self, m: &Array2<f64>) -> bool {
        m.dim() == self.shape()
            && Zip::from(&self.lower)
                .and(&self.upper)
                .and(m)
                .all(|&l, &u, &v| l <= v && v <= u)
    }

    pub fn hull(&self, other: &IntervalMatrix) -> Result<IntervalMatrix> {
        ensure_shape(self.lower.shape(), other.lower.shape())?;
        Ok(Self {
            lower: Zip::from(&self.lower)
                .and(&other.lower)
                .map_collect(|a, b| a.min(*b)),
            upper: Zip::from(&self.upper)
                .and(&other.upper)
                .map_collect(|a, b| a.max(*b)),
        })
    }

    pub fn checked_add(&self, other: &IntervalMatrix) -> Result<IntervalMatrix> {
        ensure_shape(self.lower.shape(), other.lower.shape())?;
        Ok(Self {
            lower: &self.lower + &other.lower,
            upper: &self.upper + &other.upper,
        })
    }

    pub fn checked_sub(&self, other: &IntervalMatrix) -> Result<IntervalMatrix> {
        ensure_shape(self.lower.shape(), other.lower.shape())?;
        Ok(Self {
            lower: &self.lower - &other.upper,
            upper: &self.upper - &other.lower,
        })
    }

    /// Subtract a point matrix.
    pub fn sub_point(&self, m: &Array2<f64>) -> Result<IntervalMatrix> {
        ensure_shape(self.lower.shape(), m.shape())?;
        Ok(Self {
            lower: &self.lower - m,
            upper: &self.upper - m,
        })
    }

    pub fn scale(&self, factor: f64) -> IntervalMatrix {
        let a = &self.lower * factor;
        let b = &self.upper * factor;
        if factor >= 0.0 {
            Self { lower: a, upper: b }
        } else {
            Self { lower: b, upper: a }
        }
    }

    /// Interval × interval product by the elementwise four-corner rule.
    pub fn matmul(&self, other: &IntervalMatrix) -> Result<IntervalMatrix> {
        if self.ncols() != other.nrows() {
            return Err(ReachError::shape_mismatch(
                vec![self.ncols(), other.ncols()],
                vec![other.nrows(), other.ncols()],
            ));
        }
        let (m, k) = self.shape();
        let n = other.ncols();
        let mut out = IntervalMatrix::zeros(m, n);
        for i in 0..m {
            for j in 0..n {
                let mut lo = 0.0;
                let mut hi = 0.0;
                for p in 0..k {
                    let corners = [
                        safe_mul(self.lower[[i, p]], other.lower[[p, j]]),
                        safe_mul(self.lower[[i, p]], other.upper[[p, j]]),
                        safe_mul(self.upper[[i, p]], other.lower[[p, j]]),
                        safe_mul(self.upper[[i, p]], other.upper[[p, j]]),
                    ];
                    lo += corners.iter().copied().fold(f64::INFINITY, f64::min);
                    hi += corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                }
                out.lower[[i, j]] = lo;
                out.upper[[i, j]] = hi;
            }
        }
        Ok(out)
    }

    /// Point × interval product `A·X`.
    pub fn left_mul_point(&self, a: &Array2<f64>) -> Result<IntervalMatrix> {
        if a.ncols() != self.nrows() {
            return Err(ReachError::shape_mismatch(
                vec![a.nrows(), self.nrows()],
                vec![a.nrows(), a.ncols()],
            ));
        }
        let (pos, neg) = (positive_part(a), negative_part(a));
        Ok(Self {
            lower: pos.dot(&self.lower) + neg.dot(&self.upper),
            upper: pos.dot(&self.upper) + neg.dot(&self.lower),
        })
    }

    /// Interval × point product `X·A`.
    pub fn right_mul_point(&self, a: &Array2<f64>) -> Result<IntervalMatrix> {
        if self.ncols() != a.nrows() {
            return Err(ReachError::shape_mismatch(
                vec![self.ncols(), a.ncols()],
                vec![a.nrows(), a.ncols()],
            ));
        }
        let (pos, neg) = (positive_part(a), negative_part(a));
        Ok(Self {
            lower: self.lower.dot(&pos) + self.upper.dot(&neg),
            upper: self.upper.dot(&pos) + self.lower.dot(&neg),
        })
    }

    /// Interval matrix × point vector.
    pub fn mul_point_vector(&self, x: &Array1<f64>) -> Result<IntervalVector> {
        ensure_shape(&[self.ncols()], &[x.len()])?;
        let pos = x.mapv(|v| v.max(0.0));
        let neg = x.mapv(|v| v.min(0.0));
        Ok(IntervalVector {
            lower: self.lower.dot(&pos) + self.upper.dot(&neg),
            upper: self.upper.dot(&pos) + self.lower.dot(&neg),
        })
    }

    /// Interval matrix × interval vector by the four-corner rule.
    pub fn mul_vector(&self, x: &IntervalVector) -> Result<IntervalVector> {
        ensure_shape(&[self.ncols()], &[x.len()])?;
        let mut lower = Array1::zeros(self.nrows());
        let mut upper = Array1::zeros(self.nrows());
        for i in 0..self.nrows() {
            let mut acc = Interval::zero();
            for j in 0..self.ncols() {
                acc = acc + self.get(i, j) * x.get(j);
            }
            lower[i] = acc.lower;
            upper[i] = acc.upper;
        }
        Ok(IntervalVector { lower, upper })
    }
}

/// Point matrix × interval vector by sign splitting.
pub fn point_mul_vector(a: &Array2<f64>, x: &IntervalVector) -> Result<IntervalVector> {
    ensure_shape(&[a.ncols()], &[x.len()])?;
    let (pos, neg) = (positive_part(a), negative_part(a));
    Ok(IntervalVector {
        lower: pos.dot(&x.lower) + neg.dot(&x.upper),
        upper: pos.dot(&x.upper) + neg.dot(&x.lower),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use proptest::prelude::*;

    fn corner_points(m: &IntervalMatrix) -> Vec<Array2<f64>> {
        // All 2^(r*c) corner matrices; only used on tiny operands
        let (r, c) = m.shape();
        let count = r * c;
        (0..(1usize << count))
            .map(|mask| {
                Array2::from_shape_fn((r, c), |(i, j)| {
                    if mask & (1 << (i * c + j)) != 0 {
                        m.upper[[i, j]]
                    } else {
                        m.lower[[i, j]]
                    }
                })
            })
            .collect()
    }

    #[test]
    fn test_new_rejects_inverted_entry() {
        let err = IntervalMatrix::new(arr2(&[[0.0, 2.0]]), arr2(&[[1.0, 1.0]])).unwrap_err();
        assert!(matches!(err, ReachError::InvalidBounds(_)));
        let err = IntervalMatrix::new(arr2(&[[0.0, 2.0]]), arr2(&[[1.0], [2.0]])).unwrap_err();
        assert!(matches!(err, ReachError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_matmul_four_corner() {
        let a = IntervalMatrix::new(arr2(&[[1.0, -1.0]]), arr2(&[[2.0, 1.0]])).unwrap();
        let b = IntervalMatrix::new(arr2(&[[-1.0], [2.0]]), arr2(&[[1.0], [3.0]])).unwrap();
        let c = a.matmul(&b).unwrap();
        // [1,2]*[-1,1] + [-1,1]*[2,3] = [-2,2] + [-3,3]
        assert_eq!(c.get(0, 0), Interval::new(-5.0, 5.0));
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let a = IntervalMatrix::zeros(2, 3);
        let b = IntervalMatrix::zeros(2, 2);
        assert!(matches!(
            a.matmul(&b),
            Err(ReachError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_point_products_match_interval_products() {
        let a = arr2(&[[1.0, -2.0], [0.5, 3.0]]);
        let x = IntervalMatrix::new(arr2(&[[0.0, -1.0], [1.0, 2.0]]), arr2(&[[1.0, 1.0], [2.0, 2.5]]))
            .unwrap();
        let by_split = x.left_mul_point(&a).unwrap();
        let by_corner = IntervalMatrix::from_point(&a).matmul(&x).unwrap();
        assert_eq!(by_split, by_corner);

        let by_split = x.right_mul_point(&a).unwrap();
        let by_corner = x.matmul(&IntervalMatrix::from_point(&a)).unwrap();
        assert_eq!(by_split, by_corner);
    }

    #[test]
    fn test_mul_point_vector() {
        let m = IntervalMatrix::new(arr2(&[[1.0, -1.0]]), arr2(&[[2.0, 0.0]])).unwrap();
        let v = m.mul_point_vector(&arr1(&[1.0, -2.0])).unwrap();
        assert_eq!(v.get(0), Interval::new(1.0, 4.0));
    }

    #[test]
    fn test_abs_and_norm() {
        let m = IntervalMatrix::new(arr2(&[[-2.0, 1.0]]), arr2(&[[1.0, 3.0]])).unwrap();
        assert_eq!(m.abs().get(0, 0), Interval::new(0.0, 2.0));
        assert_eq!(m.norm_inf(), 5.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Every corner product of the operands lies in the interval product.
        #[test]
        fn soundness_matmul(
            vals in proptest::collection::vec(-10.0f64..10.0, 16),
        ) {
            let pair = |a: f64, b: f64| (a.min(b), a.max(b));
            let mk = |offset: usize| {
                let mut lo = Array2::zeros((2, 2));
                let mut hi = Array2::zeros((2, 2));
                for k in 0..4 {
                    let (l, h) = pair(vals[offset + 2 * k], vals[offset + 2 * k + 1]);
                    lo[[k / 2, k % 2]] = l;
                    hi[[k / 2, k % 2]] = h;
                }
                IntervalMatrix::new(lo, hi).unwrap()
            };
            let (a, b) = (mk(0), mk(8));
            let c = a.matmul(&b).unwrap();
            for pa in corner_points(&a) {
                for pb in corner_points(&b) {
                    let p = pa.dot(&pb);
                    for ((i, j), v) in p.indexed_iter() {
                        prop_assert!(c.lower[[i, j]] - 1e-9 <= *v && *v <= c.upper[[i, j]] + 1e-9);
                    }
                }
            }
        }
    }
}
