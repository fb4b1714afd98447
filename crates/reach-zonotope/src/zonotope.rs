//! The zonotope set representation.

use ndarray::{concatenate, s, Array1, Array2, Axis};
use reach_core::{ensure_shape, ReachError, Result};
use reach_interval::{IntervalMatrix, IntervalVector};
use serde::{Deserialize, Serialize};

/// A zonotope `{ c + Σ gᵢ·βᵢ : βᵢ ∈ [-1, 1] }`.
///
/// The center has length `n` and the generator matrix is `n × m`, one
/// generator per column. Values are immutable: every operation returns a
/// new zonotope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zonotope {
    pub(crate) center: Array1<f64>,
    pub(crate) generators: Array2<f64>,
}

/// Columns of `g` whose entries are not all zero.
fn nonzero_columns(g: &Array2<f64>) -> Vec<usize> {
    (0..g.ncols())
        .filter(|&j| g.column(j).iter().any(|&v| v != 0.0))
        .collect()
}

/// Diagonal generator matrix from a radius vector, dropping zero entries.
pub(crate) fn box_generators(radius: &Array1<f64>) -> Array2<f64> {
    let rows: Vec<usize> = (0..radius.len()).filter(|&i| radius[i] != 0.0).collect();
    let mut g = Array2::zeros((radius.len(), rows.len()));
    for (col, &i) in rows.iter().enumerate() {
        g[[i, col]] = radius[i].abs();
    }
    g
}

fn hstack(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    concatenate(Axis(1), &[a.view(), b.view()])
        .map_err(|_| ReachError::shape_mismatch(vec![a.nrows()], vec![b.nrows()]))
}

impl Zonotope {
    /// Create a zonotope, checking that center and generators share a dimension.
    pub fn new(center: Array1<f64>, generators: Array2<f64>) -> Result<Self> {
        ensure_shape(&[center.len()], &[generators.nrows()])?;
        Ok(Self { center, generators })
    }

    /// A single point: no generators.
    pub fn point(center: Array1<f64>) -> Self {
        let n = center.len();
        Self {
            center,
            generators: Array2::zeros((n, 0)),
        }
    }

    /// The origin of `R^dim` with no generators.
    pub fn zero(dim: usize) -> Self {
        Self::point(Array1::zeros(dim))
    }

    /// Box zonotope from an interval vector (zero-width components add no generator).
    pub fn from_interval(iv: &IntervalVector) -> Self {
        Self {
            center: iv.mid(),
            generators: box_generators(&iv.rad()),
        }
    }

    pub fn from_bounds(lower: Array1<f64>, upper: Array1<f64>) -> Result<Self> {
        Ok(Self::from_interval(&IntervalVector::new(lower, upper)?))
    }

    #[inline]
    pub fn center(&self) -> &Array1<f64> {
        &self.center
    }

    #[inline]
    pub fn generators(&self) -> &Array2<f64> {
        &self.generators
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.center.len()
    }

    #[inline]
    pub fn generator_count(&self) -> usize {
        self.generators.ncols()
    }

    /// Generators per dimension.
    pub fn order(&self) -> f64 {
        if self.dim() == 0 {
            0.0
        } else {
            self.generator_count() as f64 / self.dim() as f64
        }
    }

    /// True if the set is a single point.
    pub fn is_point(&self) -> bool {
        self.generators.iter().all(|&v| v == 0.0)
    }

    /// True if the set is exactly the origin.
    pub fn is_origin(&self) -> bool {
        self.is_point() && self.center.iter().all(|&v| v == 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.center
            .iter()
            .chain(self.generators.iter())
            .all(|v| v.is_finite())
    }

    /// Largest absolute entry of center and generators, for diagnostics.
    pub fn max_abs(&self) -> f64 {
        self.center
            .iter()
            .chain(self.generators.iter())
            .fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }

    /// Componentwise radius of the interval hull: `Σ |gᵢ|`.
    pub fn radius(&self) -> Array1<f64> {
        self.generators.mapv(f64::abs).sum_axis(Axis(1))
    }

    /// Smallest axis-aligned box containing the zonotope.
    pub fn interval_hull(&self) -> IntervalVector {
        let r = self.radius();
        IntervalVector {
            lower: &self.center - &r,
            upper: &self.center + &r,
        }
    }

    /// Drop generators whose entries are all zero.
    pub fn remove_zero_generators(&self) -> Zonotope {
        let keep = nonzero_columns(&self.generators);
        if keep.len() == self.generator_count() {
            return self.clone();
        }
        Self {
            center: self.center.clone(),
            generators: self.generators.select(Axis(1), &keep),
        }
    }

    /// `M·Z` for any `k × n` matrix `M`. Exact.
    pub fn linear_map(&self, m: &Array2<f64>) -> Result<Zonotope> {
        if m.ncols() != self.dim() {
            return Err(ReachError::shape_mismatch(
                vec![m.nrows(), self.dim()],
                vec![m.nrows(), m.ncols()],
            ));
        }
        Ok(Self {
            center: m.dot(&self.center),
            generators: m.dot(&self.generators),
        })
    }

    /// `M·Z + offset`. Exact.
    pub fn affine_map(&self, m: &Array2<f64>, offset: &Array1<f64>) -> Result<Zonotope> {
        self.linear_map(m)?.translate(offset)
    }

    pub fn translate(&self, offset: &Array1<f64>) -> Result<Zonotope> {
        ensure_shape(&[self.dim()], &[offset.len()])?;
        Ok(Self {
            center: &self.center + offset,
            generators: self.generators.clone(),
        })
    }

    pub fn scale(&self, factor: f64) -> Zonotope {
        Self {
            center: &self.center * factor,
            generators: &self.generators * factor,
        }
    }

    /// Minkowski sum: centers add, generator lists concatenate. Exact.
    pub fn minkowski_sum(&self, other: &Zonotope) -> Result<Zonotope> {
        ensure_shape(&[self.dim()], &[other.dim()])?;
        Ok(Self {
            center: &self.center + &other.center,
            generators: hstack(&self.generators, &other.generators)?,
        })
    }

    /// Minkowski sum with an axis-aligned box.
    pub fn add_interval(&self, iv: &IntervalVector) -> Result<Zonotope> {
        self.minkowski_sum(&Zonotope::from_interval(iv))
    }

    /// Enclosure of `{ M·z : M ∈ [M], z ∈ Z }`.
    ///
    /// `[M]·Z ⊆ mid(M)·Z ⊕ box(rad(M)·(|c| + Σ|gᵢ|))`.
    pub fn interval_matrix_map(&self, im: &IntervalMatrix) -> Result<Zonotope> {
        let mid = self.linear_map(&im.mid())?;
        let spread = &self.center.mapv(f64::abs) + &self.radius();
        let bloat = im.rad().dot(&spread);
        Ok(Self {
            center: mid.center,
            generators: hstack(&mid.generators, &box_generators(&bloat))?,
        })
    }

    /// Zonotope containing the convex hull of `self` and `other`.
    ///
    /// Generators are paired by position, so the result is tight when the
    /// second operand is an image of the first under a map close to identity.
    pub fn enclose(&self, other: &Zonotope) -> Result<Zonotope> {
        ensure_shape(&[self.dim()], &[other.dim()])?;
        let (big, small) = if self.generator_count() >= other.generator_count() {
            (self, other)
        } else {
            (other, self)
        };
        let k = small.generator_count();
        let big_cut = big.generators.slice(s![.., ..k]);
        let big_rest = big.generators.slice(s![.., k..]);
        let half_diff = (&big.center - &small.center) * 0.5;

        let sum = (&big_cut + &small.generators) * 0.5;
        let diff = (&big_cut - &small.generators) * 0.5;
        let diff_center = half_diff.clone().insert_axis(Axis(1));
        let generators = concatenate(
            Axis(1),
            &[sum.view(), diff_center.view(), diff.view(), big_rest],
        )
        .map_err(|_| ReachError::shape_mismatch(vec![self.dim()], vec![other.dim()]))?;

        Ok(Self {
            center: (&big.center + &small.center) * 0.5,
            generators,
        }
        .remove_zero_generators())
    }

    /// Support function `h(d) = d·c + Σ |d·gᵢ|`.
    pub fn support(&self, direction: &Array1<f64>) -> Result<f64> {
        ensure_shape(&[self.dim()], &[direction.len()])?;
        let projections = self.generators.t().dot(direction);
        Ok(direction.dot(&self.center) + projections.mapv(f64::abs).sum())
    }

    /// The point `c + G·β` for factors `β ∈ [-1, 1]^m`.
    pub fn point_at(&self, factors: &Array1<f64>) -> Result<Array1<f64>> {
        ensure_shape(&[self.generator_count()], &[factors.len()])?;
        Ok(&self.center + &self.generators.dot(factors))
    }

    /// Project onto a subset of coordinates.
    pub fn project(&self, dims: &[usize]) -> Result<Zonotope> {
        if let Some(&bad) = dims.iter().find(|&&d| d >= self.dim()) {
            return Err(ReachError::Configuration(format!(
                "projection dimension {bad} out of range for a {}-dimensional zonotope",
                self.dim()
            )));
        }
        Ok(Self {
            center: self.center.select(Axis(0), dims),
            generators: self.generators.select(Axis(0), dims),
        })
    }
}

impl From<&IntervalVector> for Zonotope {
    fn from(iv: &IntervalVector) -> Self {
        Zonotope::from_interval(iv)
    }
}
