//! Zonotope set representation for reachability analysis.
//!
//! A [`Zonotope`] is a center plus a generator matrix. Affine maps and
//! Minkowski sums are exact; interval-matrix maps, convex enclosure and
//! order reduction over-approximate. [`boundary`] splits a zonotope into
//! pieces covering its boundary, and [`HalfSpace`] gives the facet form
//! used for containment checks.

pub mod boundary;
pub mod halfspace;
pub mod reduce;
pub mod zonotope;

pub use boundary::{boundary, MAX_BOUNDARY_PIECES};
pub use halfspace::HalfSpace;
pub use reduce::{ReductionConfig, ReductionMethod};
pub use zonotope::Zonotope;
