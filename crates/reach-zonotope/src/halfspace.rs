//! Half-space (H-) representation of polytopes and conversion from zonotopes.

use crate::zonotope::Zonotope;
use ndarray::{Array1, Array2, Axis};
use reach_core::{ensure_shape, ReachError, Result};
use serde::{Deserialize, Serialize};

/// Upper bound on the number of candidate facets enumerated during conversion.
const MAX_FACET_CANDIDATES: usize = 1_000_000;

/// Relative threshold below which a candidate facet normal is treated as zero.
const NORMAL_EPSILON: f64 = 1e-12;

/// Polytope `{ x : normals · x <= offsets }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfSpace {
    pub normals: Array2<f64>,
    pub offsets: Array1<f64>,
}

impl HalfSpace {
    pub fn new(normals: Array2<f64>, offsets: Array1<f64>) -> Result<Self> {
        ensure_shape(&[normals.nrows()], &[offsets.len()])?;
        Ok(Self { normals, offsets })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.normals.ncols()
    }

    /// Number of constraints.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// True if `x` satisfies every constraint up to `tolerance`.
    pub fn contains(&self, x: &Array1<f64>, tolerance: f64) -> bool {
        x.len() == self.dim()
            && self
                .normals
                .dot(x)
                .iter()
                .zip(self.offsets.iter())
                .all(|(lhs, rhs)| *lhs <= rhs + tolerance)
    }

    /// Facets of a full-dimensional zonotope.
    ///
    /// Every facet normal is orthogonal to some `n − 1` generators; it is
    /// obtained as the generalized cross product of those generators. The
    /// offset along a unit normal `d` is the support value `d·c + Σ|d·gᵢ|`.
    pub fn from_zonotope(z: &Zonotope) -> Result<Self> {
        let z = z.remove_zero_generators();
        let n = z.dim();
        let g = z.generators();
        let m = g.ncols();

        if n == 0 {
            return Ok(Self {
                normals: Array2::zeros((0, 0)),
                offsets: Array1::zeros(0),
            });
        }
        if n == 1 {
            let r = z.radius()[0];
            let c = z.center()[0];
            return Ok(Self {
                normals: Array2::from_shape_vec((2, 1), vec![1.0, -1.0])
                    .map_err(|e| ReachError::Configuration(e.to_string()))?,
                offsets: Array1::from(vec![c + r, -c + r]),
            });
        }
        if m < n {
            return Err(ReachError::UnsupportedConfiguration(format!(
                "half-space form needs a full-dimensional zonotope ({m} generators in dimension {n})"
            )));
        }
        let candidates = binomial(m, n - 1);
        if candidates > MAX_FACET_CANDIDATES {
            return Err(ReachError::UnsupportedConfiguration(format!(
                "half-space conversion would enumerate {candidates} facet candidates"
            )));
        }

        let scale = g.iter().fold(0.0, |acc: f64, v| acc.max(v.abs())).max(1.0);
        let mut normals: Vec<Array1<f64>> = Vec::new();
        for combo in Combinations::new(m, n - 1) {
            let normal = cross_product(&g.select(Axis(1), &combo));
            let norm = normal.dot(&normal).sqrt();
            if norm <= NORMAL_EPSILON * scale.powi((n - 1) as i32) {
                continue;
            }
            normals.push(normal / norm);
        }
        if normals.is_empty() {
            return Err(ReachError::UnsupportedConfiguration(
                "half-space form needs a full-dimensional zonotope".to_string(),
            ));
        }

        let mut a = Array2::zeros((2 * normals.len(), n));
        let mut b = Array1::zeros(2 * normals.len());
        for (k, d) in normals.iter().enumerate() {
            let spread = g.t().dot(d).mapv(f64::abs).sum();
            let along = d.dot(z.center());
            a.row_mut(2 * k).assign(d);
            b[2 * k] = along + spread;
            a.row_mut(2 * k + 1).assign(&(-d));
            b[2 * k + 1] = -along + spread;
        }
        Ok(Self {
            normals: a,
            offsets: b,
        })
    }
}

impl Zonotope {
    /// Half-space representation (full-dimensional zonotopes only).
    pub fn to_halfspace(&self) -> Result<HalfSpace> {
        HalfSpace::from_zonotope(self)
    }

    /// Point membership up to `tolerance`.
    pub fn contains_point(&self, x: &Array1<f64>, tolerance: f64) -> Result<bool> {
        ensure_shape(&[self.dim()], &[x.len()])?;
        Ok(self.to_halfspace()?.contains(x, tolerance))
    }
}

/// Generalized cross product of the `n − 1` columns of an `n × (n − 1)` matrix.
fn cross_product(v: &Array2<f64>) -> Array1<f64> {
    let n = v.nrows();
    let mut normal = Array1::zeros(n);
    for i in 0..n {
        let rows: Vec<usize> = (0..n).filter(|&r| r != i).collect();
        let minor = v.select(Axis(0), &rows);
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        normal[i] = sign * determinant(minor);
    }
    normal
}

/// Determinant by Gaussian elimination with partial pivoting.
fn determinant(mut m: Array2<f64>) -> f64 {
    let n = m.nrows();
    let mut det = 1.0;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| m[[a, col]].abs().total_cmp(&m[[b, col]].abs()))
            .unwrap_or(col);
        if m[[pivot, col]] == 0.0 {
            return 0.0;
        }
        if pivot != col {
            for k in 0..n {
                m.swap([pivot, k], [col, k]);
            }
            det = -det;
        }
        let p = m[[col, col]];
        det *= p;
        for r in (col + 1)..n {
            let factor = m[[r, col]] / p;
            if factor != 0.0 {
                for k in col..n {
                    m[[r, k]] -= factor * m[[col, k]];
                }
            }
        }
    }
    det
}

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: usize = 1;
    for i in 0..k {
        acc = acc.saturating_mul(n - i) / (i + 1);
    }
    acc
}

/// Lexicographic `k`-subsets of `0..n`.
pub(crate) struct Combinations {
    n: usize,
    current: Option<Vec<usize>>,
}

impl Combinations {
    pub(crate) fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            current: (k <= n).then(|| (0..k).collect()),
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let out = self.current.clone()?;
        let k = out.len();
        let mut next = out.clone();
        let mut i = k;
        loop {
            if i == 0 {
                self.current = None;
                break;
            }
            i -= 1;
            if next[i] < self.n - k + i {
                next[i] += 1;
                for j in (i + 1)..k {
                    next[j] = next[j - 1] + 1;
                }
                self.current = Some(next);
                break;
            }
        }
        Some(out)
    }
}
