//! Boundary decomposition.
//!
//! Every boundary point of a full-dimensional zonotope maximizes some
//! direction `d`, so it lies on a face `c + s·gᵢ + Σ_{j≠i} βⱼ·gⱼ` with
//! `s = sign(d·gᵢ)`. The `2m` faces therefore cover the boundary; each
//! face is a zonotope with one generator fewer.

use crate::zonotope::Zonotope;
use ndarray::{Array1, Axis};
use reach_core::{ReachError, Result};
use tracing::debug;

/// Largest number of pieces a decomposition may produce.
pub const MAX_BOUNDARY_PIECES: usize = 100_000;

/// Zonotopes whose union covers the boundary of `z`.
///
/// `segments` (at least 1) splits each face generator into that many
/// equal parts, so every face contributes `segments^(m − 1)` pieces.
/// All pieces lie inside `z`. A zonotope with fewer nonzero generators
/// than dimensions has no interior and is returned whole.
pub fn boundary(z: &Zonotope, segments: usize) -> Result<Vec<Zonotope>> {
    if segments == 0 {
        return Err(ReachError::Configuration(
            "boundary decomposition needs at least one segment per generator".to_string(),
        ));
    }
    let z = z.remove_zero_generators();
    let n = z.dim();
    let m = z.generator_count();
    if m < n || m == 0 {
        return Ok(vec![z]);
    }

    let total = piece_count(m, segments)
        .filter(|&total| total <= MAX_BOUNDARY_PIECES)
        .ok_or_else(|| {
            ReachError::Configuration(format!(
                "boundary decomposition of {m} generators into {segments} segments exceeds {MAX_BOUNDARY_PIECES} pieces"
            ))
        })?;

    let g = z.generators();
    let mut pieces = Vec::with_capacity(total);
    for i in 0..m {
        let others: Vec<usize> = (0..m).filter(|&j| j != i).collect();
        let face_gens = g.select(Axis(1), &others);
        let piece_gens = &face_gens / segments as f64;
        for sign in [1.0, -1.0] {
            let face_center = z.center() + &(&g.column(i) * sign);
            for offsets in segment_offsets(m - 1, segments) {
                let center = &face_center + &face_gens.dot(&offsets);
                pieces.push(Zonotope::new(center, piece_gens.clone())?);
            }
        }
    }

    debug!(
        "Boundary decomposition: {} generators, {} segments -> {} pieces",
        m,
        segments,
        pieces.len()
    );
    Ok(pieces)
}

/// `2m · segments^(m − 1)`, or `None` on overflow.
fn piece_count(m: usize, segments: usize) -> Option<usize> {
    let exponent = u32::try_from(m - 1).ok()?;
    segments.checked_pow(exponent)?.checked_mul(m.checked_mul(2)?)
}

/// Factor offsets of the segment centers: every tuple in
/// `{ −1 + (2t + 1)/k : t = 0..k }^count`.
fn segment_offsets(count: usize, segments: usize) -> Vec<Array1<f64>> {
    let mids: Vec<f64> = (0..segments)
        .map(|t| -1.0 + (2 * t + 1) as f64 / segments as f64)
        .collect();
    let mut out = vec![Array1::zeros(count)];
    for axis in 0..count {
        out = out
            .into_iter()
            .flat_map(|base| {
                mids.iter().map(move |&mid| {
                    let mut next = base.clone();
                    next[axis] = mid;
                    next
                })
            })
            .collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halfspace::Combinations;
    use ndarray::{arr1, arr2, Array2};
    use proptest::prelude::*;

    /// Vertices of `z` (up to duplicates): `c + G·β` for `β ∈ {−1, 1}^m`.
    ///
    /// Fails when there are more than 20 nonzero generators.
    fn vertex_candidates(z: &Zonotope) -> Result<Vec<Array1<f64>>> {
        let z = z.remove_zero_generators();
        let m = z.generator_count();
        if m > 20 {
            return Err(ReachError::UnsupportedConfiguration(format!(
                "vertex enumeration over {m} generators"
            )));
        }
        let g: &Array2<f64> = z.generators();
        let mut out = Vec::with_capacity(1 << m);
        for flips in 0..=m {
            for combo in Combinations::new(m, flips) {
                let mut beta = Array1::from_elem(m, 1.0);
                for j in combo {
                    beta[j] = -1.0;
                }
                out.push(z.center() + &g.dot(&beta));
            }
        }
        Ok(out)
    }

    #[test]
    fn test_square_faces() {
        let z = Zonotope::from_bounds(arr1(&[-1.0, -1.0]), arr1(&[1.0, 1.0])).unwrap();
        let faces = boundary(&z, 1).unwrap();
        assert_eq!(faces.len(), 4);
        for f in &faces {
            assert_eq!(f.generator_count(), 1);
            let hull = f.interval_hull();
            let on_edge = (0..2).any(|d| hull.lower[d] == hull.upper[d] && hull.lower[d].abs() == 1.0);
            assert!(on_edge);
        }
    }

    #[test]
    fn test_segments_multiply_pieces() {
        let z = Zonotope::new(
            arr1(&[0.0, 0.0]),
            arr2(&[[1.0, 0.0, 0.5], [0.0, 1.0, 0.5]]),
        )
        .unwrap();
        assert_eq!(boundary(&z, 1).unwrap().len(), 6);
        assert_eq!(boundary(&z, 3).unwrap().len(), 6 * 9);
    }

    #[test]
    fn test_degenerate_returned_whole() {
        let z = Zonotope::new(arr1(&[0.0, 0.0]), arr2(&[[1.0], [2.0]])).unwrap();
        let pieces = boundary(&z, 2).unwrap();
        assert_eq!(pieces, vec![z]);
        let p = Zonotope::point(arr1(&[3.0]));
        assert_eq!(boundary(&p, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_segments() {
        let z = Zonotope::from_bounds(arr1(&[0.0]), arr1(&[1.0])).unwrap();
        assert!(matches!(boundary(&z, 0), Err(ReachError::Configuration(_))));
        let wide = Zonotope::new(Array1::zeros(2), Array2::from_elem((2, 30), 1.0)).unwrap();
        assert!(matches!(boundary(&wide, 2), Err(ReachError::Configuration(_))));
    }

    #[test]
    fn test_huge_piece_count_is_configuration_error() {
        let z = Zonotope::new(
            Array1::zeros(2),
            Array2::from_shape_fn((2, 30), |(i, j)| if i == j % 2 { 1.0 } else { 0.5 }),
        )
        .unwrap();
        assert!(matches!(boundary(&z, 100_000), Err(ReachError::Configuration(_))));
        assert!(matches!(boundary(&z, usize::MAX), Err(ReachError::Configuration(_))));
        assert_eq!(piece_count(30, 100_000), None);
        assert_eq!(piece_count(3, 2), Some(24));
    }

    #[test]
    fn test_segment_offsets() {
        let offsets = segment_offsets(2, 2);
        assert_eq!(offsets.len(), 4);
        assert!(offsets.contains(&arr1(&[-0.5, 0.5])));
        assert_eq!(segment_offsets(0, 3), vec![Array1::<f64>::zeros(0)]);
    }

    #[test]
    fn test_vertex_candidates() {
        let z = Zonotope::from_bounds(arr1(&[0.0, 0.0]), arr1(&[2.0, 4.0])).unwrap();
        let vs = vertex_candidates(&z).unwrap();
        assert_eq!(vs.len(), 4);
        assert!(vs.contains(&arr1(&[0.0, 4.0])));
    }

    fn full_dim_zonotope() -> impl Strategy<Value = Zonotope> {
        (
            proptest::collection::vec(-3.0f64..3.0, 2),
            proptest::collection::vec(-2.0f64..2.0, 0..=4),
        )
            .prop_map(|(c, extra)| {
                let m = 2 + extra.len() / 2;
                let mut g = Array2::zeros((2, m));
                g[[0, 0]] = 1.0;
                g[[1, 1]] = 1.0;
                for (k, v) in extra.iter().take(2 * (m - 2)).enumerate() {
                    g[[k % 2, 2 + k / 2]] = *v;
                }
                Zonotope::new(Array1::from(c), g).unwrap()
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Every piece lies inside the zonotope and every vertex is reached by some piece.
        #[test]
        fn boundary_pieces_cover_vertices(z in full_dim_zonotope(), segments in 1usize..=2) {
            let pieces = boundary(&z, segments).unwrap();
            let hs = z.to_halfspace().unwrap();
            for piece in &pieces {
                for v in vertex_candidates(piece).unwrap() {
                    prop_assert!(hs.contains(&v, 1e-9));
                }
            }
            let piece_vertices: Vec<Array1<f64>> = pieces
                .iter()
                .flat_map(|p| vertex_candidates(p).unwrap())
                .collect();
            for v in vertex_candidates(&z).unwrap() {
                let reached = piece_vertices
                    .iter()
                    .any(|w| (w - &v).iter().all(|d| d.abs() < 1e-9));
                prop_assert!(reached, "vertex {v} not covered");
            }
        }
    }
}
