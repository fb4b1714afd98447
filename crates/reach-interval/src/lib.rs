//! Interval arithmetic for sound enclosures.
//!
//! Provides scalar [`Interval`]s, boxes ([`IntervalVector`]) and interval
//! matrices ([`IntervalMatrix`]). Every operation over interval operands
//! returns an interval containing the result of the same operation over
//! all point combinations within the operand bounds. Tightness is best
//! effort; soundness is the contract.
//!
//! The [`Scalar`] trait abstracts over `f64` and [`Interval`] so a vector
//! field can be written once and evaluated both at points and over boxes.

pub mod matrix;
pub mod scalar;
pub mod vector;

pub use matrix::{point_mul_vector, IntervalMatrix};
pub use scalar::{Interval, Scalar};
pub use vector::IntervalVector;
