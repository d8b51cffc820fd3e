//! Per-point Gaussian bandwidth calibration.
//!
//! Each point gets its own sigma, chosen by binary search so that the
//! conditional affinity distribution it induces over the other points has a
//! perplexity (2 raised to the Shannon entropy in bits) close to the
//! configured target. Points in dense regions end up with narrow kernels and
//! points in sparse regions with wide ones.
//!
//! The search for each point is independent of every other point.

use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut1};
use tracing::debug;

/// Lower end of the initial sigma search interval.
pub const SIGMA_LOWER_BOUND: f32 = 1e-3;

/// Maximum number of bisection steps per point.
pub const MAX_SEARCH_STEPS: usize = 50;

/// Outcome of the bandwidth search for a single point.
#[derive(Debug, Clone, Copy)]
pub struct SigmaSearch {
    /// Bandwidth in use when the search stopped
    pub sigma: f32,

    /// Perplexity induced by `sigma`
    pub perplexity: f32,

    /// Number of bisection steps taken, at most [`MAX_SEARCH_STEPS`]
    pub steps: usize,
}

/// Upper end of the initial sigma search interval, derived from the largest
/// distance in the matrix.
pub fn sigma_upper_bound(distances: ArrayView2<f32>) -> f32 {
    let max_distance = distances.iter().copied().fold(0.0, f32::max);
    (max_distance + 1e-6).ln() + 10.0
}

/// Calibrates one Gaussian bandwidth per point so that each point's
/// conditional affinity row matches `target_perplexity`.
///
/// Running out of bisection steps is not an error: the sigma reached at that
/// point is kept.
///
/// # Arguments
/// * `distances` - Symmetric n × n squared distance matrix
/// * `target_perplexity` - Desired effective neighborhood size
/// * `tolerance` - Accepted absolute deviation from the target perplexity
///
/// # Returns
/// The calibrated sigma for each point
pub fn calibrate_sigmas(
    distances: ArrayView2<f32>,
    target_perplexity: f32,
    tolerance: f32,
) -> Array1<f32> {
    let n = distances.nrows();
    let upper = sigma_upper_bound(distances);
    let mut row = Array1::zeros(n);
    let mut exhausted = 0_usize;

    let sigmas: Array1<f32> = (0..n)
        .map(|i| {
            let search = search_sigma(
                distances.row(i),
                i,
                target_perplexity,
                tolerance,
                upper,
                row.view_mut(),
            );
            if search.steps == MAX_SEARCH_STEPS
                && (search.perplexity - target_perplexity).abs() > tolerance
            {
                exhausted += 1;
            }
            search.sigma
        })
        .collect();

    debug!(
        "Calibrated sigmas, mean sigma: {}, searches exhausted: {exhausted}",
        sigmas.mean().unwrap_or_default()
    );

    sigmas
}

/// Bisects the bandwidth for point `i` between [`SIGMA_LOWER_BOUND`] and
/// `upper`.
///
/// `row` is scratch space of length n; on return it holds the conditional
/// affinities for the returned sigma.
pub fn search_sigma(
    distances: ArrayView1<f32>,
    i: usize,
    target_perplexity: f32,
    tolerance: f32,
    upper: f32,
    mut row: ArrayViewMut1<f32>,
) -> SigmaSearch {
    let mut lower = SIGMA_LOWER_BOUND;
    // Collapses to the lower bound when every distance is zero
    let mut upper = upper.max(SIGMA_LOWER_BOUND);
    let mut search = SigmaSearch {
        sigma: lower,
        perplexity: 0.0,
        steps: 0,
    };

    while search.steps < MAX_SEARCH_STEPS {
        let sigma = (lower + upper) / 2.0;
        gaussian_row(distances, i, sigma, row.view_mut());
        let perplexity = row_perplexity(row.view());

        search = SigmaSearch {
            sigma,
            perplexity,
            steps: search.steps + 1,
        };

        if (perplexity - target_perplexity).abs() <= tolerance {
            break;
        }

        if perplexity < target_perplexity {
            // Kernel too narrow
            lower = sigma;
        } else {
            upper = sigma;
        }
    }

    search
}

/// Computes the normalized conditional Gaussian affinities of point `i` to
/// every other point, writing them into `out`.
///
/// The kernel is `exp(-d_ij / (2 sigma^2))`. Exponents are taken relative to
/// the row's smallest off-diagonal distance, which leaves the normalized row
/// unchanged and keeps the normalizer at least 1. The self entry is 0.
pub fn gaussian_row(
    distances: ArrayView1<f32>,
    i: usize,
    sigma: f32,
    mut out: ArrayViewMut1<f32>,
) {
    let min_distance = distances
        .indexed_iter()
        .filter(|&(j, _)| j != i)
        .map(|(_, &d)| d)
        .fold(f32::INFINITY, f32::min);
    let two_sigma_sq = (2.0 * sigma * sigma).max(f32::MIN_POSITIVE);

    let mut sum = 0.0;
    for (j, (p, &d)) in out.iter_mut().zip(distances.iter()).enumerate() {
        *p = if j == i {
            0.0
        } else {
            (-(d - min_distance) / two_sigma_sq).exp()
        };
        sum += *p;
    }

    if sum > 0.0 {
        out.mapv_inplace(|p| p / sum);
    }
}

/// Perplexity of a probability row: `2^H` with `H` the Shannon entropy in
/// bits.
pub fn row_perplexity(row: ArrayView1<f32>) -> f32 {
    let entropy: f32 = row.iter().map(|&p| -p * (p + 1e-10).log2()).sum();
    entropy.exp2()
}
