//! Affinity matrices for t-SNE.
//!
//! Two distributions over point pairs are compared during optimization:
//! - P, built once from the input distances with per-point Gaussian kernels
//!   and symmetrized so the whole matrix sums to 1
//! - Q, rebuilt every iteration from the embedding distances with the
//!   heavy-tailed Student-t kernel `1 / (1 + d)`

use crate::perplexity::gaussian_row;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2, Zip};

/// Computes the conditional Gaussian affinities `p_j|i` for every point,
/// one row per point, using the calibrated bandwidths.
///
/// Each row sums to 1 and has a zero self entry.
pub fn conditional_probabilities(
    distances: ArrayView2<f32>,
    sigmas: ArrayView1<f32>,
) -> Array2<f32> {
    let mut conditional = Array2::zeros(distances.raw_dim());
    for (i, (row, &sigma)) in conditional.rows_mut().into_iter().zip(sigmas).enumerate() {
        gaussian_row(distances.row(i), i, sigma, row);
    }
    conditional
}

/// Builds the symmetric high-dimensional affinity matrix P.
///
/// `p_ij = (p_j|i + p_i|j) / 2n`, so P is symmetric, has a zero diagonal and
/// sums to 1.
///
/// # Arguments
/// * `distances` - Squared distances between input points
/// * `sigmas` - Calibrated Gaussian bandwidth for each point
#[allow(clippy::cast_precision_loss)]
pub fn joint_probabilities(distances: ArrayView2<f32>, sigmas: ArrayView1<f32>) -> Array2<f32> {
    let conditional = conditional_probabilities(distances, sigmas);
    let scale = 2.0 * conditional.nrows() as f32;

    let mut p = &conditional + &conditional.t();
    p.mapv_inplace(|v| v / scale);
    p
}

/// Computes the Student-t kernel and the normalized low-dimensional
/// affinities Q from embedding distances.
///
/// `kernel` receives `1 / (1 + d_ij)` off the diagonal and 0 on it; `q`
/// receives the kernel divided by its total so that Q sums to 1. Both
/// buffers are overwritten.
pub fn student_t_affinities(
    distances: ArrayView2<f32>,
    mut kernel: ArrayViewMut2<f32>,
    mut q: ArrayViewMut2<f32>,
) {
    Zip::indexed(&mut kernel)
        .and(distances)
        .for_each(|(i, j), w, &d| {
            *w = if i == j { 0.0 } else { 1.0 / (1.0 + d) };
        });

    let sum = kernel.sum();
    if sum > 0.0 {
        Zip::from(&mut q).and(&kernel).for_each(|q, &w| *q = w / sum);
    } else {
        q.fill(0.0);
    }
}

/// Kullback-Leibler divergence `KL(P || Q)` between the two affinity
/// distributions.
pub fn kl_divergence(p: ArrayView2<f32>, q: ArrayView2<f32>) -> f32 {
    Zip::from(p).and(q).fold(0.0, |acc, &p, &q| {
        acc + p * ((p + 1e-10) / (q + 1e-10)).ln()
    })
}
