//! Squared Euclidean distance calculations for t-SNE.
//!
//! This module provides the distance engine used on both sides of the
//! embedding problem:
//!
//! - The fixed input space, where distances are computed once per transform
//! - The moving embedding space, where distances are recomputed every
//!   iteration into a reused buffer
//!
//! Distances are squared Euclidean throughout. The per-pair kernel uses SIMD
//! instructions where possible.

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2};
use tracing::warn;
use wide::f32x8;

/// Computes the squared Euclidean distance between two vectors.
///
/// The vectors must have the same length. This is the sum of squared
/// per-dimension differences; no square root is taken.
///
/// # Arguments
/// * `a` - First vector
/// * `b` - Second vector
///
/// # Examples
/// ```
/// use tsne::squared_euclidean_distance;
///
/// let d = squared_euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]);
/// assert!((d - 25.0).abs() < f32::EPSILON);
/// ```
pub fn squared_euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    // Chunks of 8 go through SIMD, the remainder is summed sequentially
    debug_assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    let a_chunks = a.chunks_exact(8);
    let a_remainder = a_chunks.remainder();

    let b_chunks = b.chunks_exact(8);
    let b_remainder = b_chunks.remainder();

    let mut sum_sq = f32x8::splat(0.0);
    for (a_chunk, b_chunk) in a_chunks.zip(b_chunks) {
        let diff = f32x8::from(a_chunk) - f32x8::from(b_chunk);
        sum_sq += diff * diff;
    }

    let mut total_sum_sq: f32 = sum_sq.as_array_ref().iter().sum();

    for (a, b) in a_remainder.iter().zip(b_remainder) {
        let diff = a - b;
        total_sum_sq += diff * diff;
    }

    total_sum_sq
}

/// Computes squared Euclidean distance between array views, using the SIMD
/// kernel directly on contiguous data.
///
/// Non-contiguous views are copied first, with a warning.
pub fn array_squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    match (a.as_slice(), b.as_slice()) {
        (Some(a), Some(b)) => squared_euclidean_distance(a, b),
        (Some(a), None) => {
            warn!("b is non-contiguous, requiring allocation to compute distance");
            squared_euclidean_distance(a, &b.to_vec())
        }
        (None, Some(b)) => {
            warn!("a is non-contiguous, requiring allocation to compute distance");
            squared_euclidean_distance(&a.to_vec(), b)
        }
        (None, None) => {
            warn!("both a and b are non-contiguous, requiring allocation to compute distance");
            squared_euclidean_distance(&a.to_vec(), &b.to_vec())
        }
    }
}

/// Computes the full matrix of pairwise squared distances between the rows
/// of `x`.
///
/// # Returns
/// An n × n symmetric matrix with a zero diagonal
pub fn pairwise_squared_distances(x: ArrayView2<f32>) -> Array2<f32> {
    let n = x.nrows();
    let mut out = Array2::zeros((n, n));
    pairwise_squared_distances_into(x, out.view_mut());
    out
}

/// Fills `out` with pairwise squared distances between the rows of `x`.
///
/// Only the upper triangle is computed; each value is mirrored into the
/// lower triangle and the diagonal is set to zero. A non-contiguous `x` is
/// copied into standard layout once up front. Distances that overflow `f32`
/// are stored as `f32::MAX`.
///
/// # Panics
/// * If `out` is not n × n for n rows of `x` (debug builds only)
pub fn pairwise_squared_distances_into(x: ArrayView2<f32>, mut out: ArrayViewMut2<f32>) {
    let n = x.nrows();
    debug_assert_eq!(out.dim(), (n, n), "Output must be n × n");
    let x = x.as_standard_layout();

    for i in 0..n {
        out[[i, i]] = 0.0;
        let row_i = x.row(i);
        for j in (i + 1)..n {
            let d = array_squared_distance(row_i, x.row(j)).min(f32::MAX);
            out[[i, j]] = d;
            out[[j, i]] = d;
        }
    }
}
