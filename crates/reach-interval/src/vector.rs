//! Interval vectors (axis-aligned boxes).

use crate::scalar::Interval;
use ndarray::{Array1, Zip};
use reach_core::{ensure_shape, ReachError, Result};
use serde::{Deserialize, Serialize};

/// An axis-aligned box `[lower, upper]` stored as two bound vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalVector {
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
}

impl IntervalVector {
    /// Create a box, validating lengths and `lower <= upper`.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Result<Self> {
        ensure_shape(&[lower.len()], &[upper.len()])?;
        if let Some(i) = (0..lower.len()).find(|&i| !(lower[i] <= upper[i])) {
            return Err(ReachError::InvalidBounds(format!(
                "component {i}: [{}, {}]",
                lower[i], upper[i]
            )));
        }
        Ok(Self { lower, upper })
    }

    /// Degenerate box around a point.
    pub fn from_point(point: &Array1<f64>) -> Self {
        Self {
            lower: point.clone(),
            upper: point.clone(),
        }
    }

    /// `[-|r|, |r|]` componentwise.
    pub fn symmetric(radius: &Array1<f64>) -> Self {
        let r = radius.mapv(f64::abs);
        Self {
            lower: -&r,
            upper: r,
        }
    }

    /// Box from center and non-negative radius.
    pub fn from_center_radius(center: &Array1<f64>, radius: &Array1<f64>) -> Result<Self> {
        ensure_shape(&[center.len()], &[radius.len()])?;
        let r = radius.mapv(f64::abs);
        Ok(Self {
            lower: center - &r,
            upper: center + &r,
        })
    }

    pub fn from_intervals(intervals: &[Interval]) -> Self {
        Self {
            lower: intervals.iter().map(|iv| iv.lower).collect(),
            upper: intervals.iter().map(|iv| iv.upper).collect(),
        }
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            lower: Array1::zeros(dim),
            upper: Array1::zeros(dim),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Interval {
        Interval::new(self.lower[i], self.upper[i])
    }

    pub fn to_intervals(&self) -> Vec<Interval> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    pub fn mid(&self) -> Array1<f64> {
        (&self.lower + &self.upper) * 0.5
    }

    pub fn rad(&self) -> Array1<f64> {
        (&self.upper - &self.lower) * 0.5
    }

    pub fn width(&self) -> Array1<f64> {
        &self.upper - &self.lower
    }

    /// Largest component width.
    pub fn max_width(&self) -> f64 {
        self.width().iter().copied().fold(0.0, f64::max)
    }

    /// Componentwise magnitude `max(|lower|, |upper|)`.
    pub fn mag(&self) -> Array1<f64> {
        Zip::from(&self.lower)
            .and(&self.upper)
            .map_collect(|l, u| l.abs().max(u.abs()))
    }

    pub fn is_finite(&self) -> bool {
        self.lower.iter().chain(self.upper.iter()).all(|v| v.is_finite())
    }

    pub fn contains_point(&self, point: &Array1<f64>) -> bool {
        point.len() == self.len()
            && Zip::from(&self.lower)
                .and(&self.upper)
                .and(point)
                .all(|&l, &u, &p| l <= p && p <= u)
    }

    pub fn contains(&self, other: &IntervalVector) -> bool {
        other.len() == self.len()
            && Zip::from(&self.lower)
                .and(&self.upper)
                .and(&other.lower)
                .and(&other.upper)
                .all(|&l, &u, &ol, &ou| l <= ol && ou <= u)
    }

    /// Smallest box containing both operands.
    pub fn hull(&self, other: &IntervalVector) -> Result<IntervalVector> {
        ensure_shape(&[self.len()], &[other.len()])?;
        Ok(Self {
            lower: Zip::from(&self.lower)
                .and(&other.lower)
                .map_collect(|a, b| a.min(*b)),
            upper: Zip::from(&self.upper)
                .and(&other.upper)
                .map_collect(|a, b| a.max(*b)),
        })
    }

    pub fn checked_add(&self, other: &IntervalVector) -> Result<IntervalVector> {
        ensure_shape(&[self.len()], &[other.len()])?;
        Ok(Self {
            lower: &self.lower + &other.lower,
            upper: &self.upper + &other.upper,
        })
    }

    pub fn checked_sub(&self, other: &IntervalVector) -> Result<IntervalVector> {
        ensure_shape(&[self.len()], &[other.len()])?;
        Ok(Self {
            lower: &self.lower - &other.upper,
            upper: &self.upper - &other.lower,
        })
    }

    /// Shift the box by a point.
    pub fn translate(&self, offset: &Array1<f64>) -> Result<IntervalVector> {
        ensure_shape(&[self.len()], &[offset.len()])?;
        Ok(Self {
            lower: &self.lower + offset,
            upper: &self.upper + offset,
        })
    }

    pub fn scale(&self, factor: f64) -> IntervalVector {
        let a = &self.lower * factor;
        let b = &self.upper * factor;
        if factor >= 0.0 {
            Self { lower: a, upper: b }
        } else {
            Self { lower: b, upper: a }
        }
    }

    /// Stack two boxes: `[self; other]`.
    pub fn concat(&self, other: &IntervalVector) -> IntervalVector {
        let join = |a: &Array1<f64>, b: &Array1<f64>| -> Array1<f64> {
            a.iter().chain(b.iter()).copied().collect()
        };
        Self {
            lower: join(&self.lower, &other.lower),
            upper: join(&self.upper, &other.upper),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_new_validates() {
        assert!(IntervalVector::new(arr1(&[0.0, 1.0]), arr1(&[1.0, 0.5])).is_err());
        assert!(IntervalVector::new(arr1(&[0.0]), arr1(&[1.0, 2.0])).is_err());
        let b = IntervalVector::new(arr1(&[0.0, 1.0]), arr1(&[1.0, 3.0])).unwrap();
        assert_eq!(b.mid(), arr1(&[0.5, 2.0]));
        assert_eq!(b.rad(), arr1(&[0.5, 1.0]));
        assert_eq!(b.max_width(), 2.0);
    }

    #[test]
    fn test_containment() {
        let b = IntervalVector::new(arr1(&[-1.0, -1.0]), arr1(&[1.0, 1.0])).unwrap();
        assert!(b.contains_point(&arr1(&[1.0, -1.0])));
        assert!(!b.contains_point(&arr1(&[1.01, 0.0])));
        let inner = IntervalVector::symmetric(&arr1(&[0.5, 0.5]));
        assert!(b.contains(&inner));
        assert!(!inner.contains(&b));
    }

    #[test]
    fn test_sub_is_outward() {
        let a = IntervalVector::new(arr1(&[1.0]), arr1(&[2.0])).unwrap();
        let d = a.checked_sub(&a).unwrap();
        // x - y over independent operands, not zero
        assert_eq!(d, IntervalVector::new(arr1(&[-1.0]), arr1(&[1.0])).unwrap());
    }

    #[test]
    fn test_concat_and_scale() {
        let a = IntervalVector::new(arr1(&[0.0]), arr1(&[1.0])).unwrap();
        let b = IntervalVector::new(arr1(&[2.0]), arr1(&[3.0])).unwrap();
        let c = a.concat(&b);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(1), Interval::new(2.0, 3.0));
        assert_eq!(c.scale(-1.0).get(1), Interval::new(-3.0, -2.0));
    }
}
