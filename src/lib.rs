#![allow(clippy::multiple_crate_versions)]

//! # t-SNE: t-distributed Stochastic Neighbor Embedding
//!
//! This crate provides a Rust implementation of exact t-SNE, a dimensionality
//! reduction technique that places similar high-dimensional points close
//! together in a low-dimensional embedding.
//!
//! t-SNE converts pairwise distances into two probability distributions over
//! point pairs and moves the embedding until they agree:
//! - In the input space, each point gets a Gaussian kernel whose width is
//!   calibrated so its neighborhood has a target perplexity
//! - In the embedding, a heavy-tailed Student-t kernel lets dissimilar points
//!   spread out without crowding
//!
//! The implementation provides:
//! - Per-point bandwidth calibration by binary search on perplexity
//! - Gradient descent with a linearly increasing momentum term
//! - Seeded or unseeded uniform random initialization, or caller-supplied
//!   starting coordinates
//!
//! This is the exact formulation: every iteration costs O(n²) time and
//! memory, which suits hundreds to low thousands of points.
//!
//! ## Examples
//!
//! Basic usage with default parameters:
//! ```rust,no_run
//! use ndarray::Array2;
//! use tsne::{Configuration, Tsne};
//!
//! let data: Array2<f32> = // ... load your high-dimensional data
//! # Array2::zeros((100, 50));
//! let tsne = Tsne::new(Configuration::default());
//! let embedding = tsne.transform(data.view()).unwrap();
//! ```
//!
//! Customized, reproducible embedding:
//! ```rust
//! use ndarray::array;
//! use tsne::{Configuration, Initialization, Tsne};
//!
//! let config = Configuration::builder()
//!     .embedding_dimensions(3)
//!     .perplexity(2.0)
//!     .learning_rate(0.5)
//!     .num_iters(200)
//!     .initialization(Initialization::Random(Some(42)))
//!     .build();
//!
//! let x = array![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]];
//! let embedding = Tsne::new(config).transform(x.view()).unwrap();
//! assert_eq!(embedding.dim(), (4, 3));
//! ```
//!
//! ## Configuration
//!
//! - `embedding_dimensions`: Output dimensionality (default: 2)
//! - `perplexity`: Target effective neighborhood size, below the number of
//!   points (default: 30)
//! - `learning_rate`: Gradient step scale (default: 1.0)
//! - `num_iters`: Number of optimization iterations, always run in full
//!   (default: 100)
//! - `perplexity_tolerance`: Accepted deviation from the target perplexity
//!   during calibration (default: 1e-4)
//! - `initialization`: How to initialize coordinates:
//!   - `Random(seed)` - Uniform in [-0.5, 0.5), seeded or not (default:
//!     unseeded)
//!   - `Value(array)` - Use provided coordinates
//!
//! ## References
//!
//! [Visualizing Data using t-SNE](https://jmlr.org/papers/v9/vandermaaten08a.html).
//! van der Maaten, L., & Hinton, G. (2008).
//! Journal of Machine Learning Research, 9(86), 2579-2605.

mod affinity;
mod distance;
mod gradient;
mod momentum;
mod perplexity;
mod validate;


use bon::Builder;
use ndarray::{Array2, ArrayView2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, enabled, Level};

pub use crate::distance::squared_euclidean_distance;

use crate::affinity::{joint_probabilities, kl_divergence, student_t_affinities};
use crate::distance::{pairwise_squared_distances, pairwise_squared_distances_into};
use crate::gradient::tsne_grad;
use crate::momentum::{momentum_at, update_embedding_momentum};
use crate::perplexity::calibrate_sigmas;
use crate::validate::{validate_configuration, validate_matrix, validate_rows};

/// Configuration options for the t-SNE embedding process.
///
/// Controls the perplexity calibration, optimization parameters, and
/// initialization.
#[derive(Builder, Clone, Debug)]
pub struct Configuration {
    /// Number of dimensions in the output embedding space, typically 2 or 3
    #[builder(default = 2)]
    pub embedding_dimensions: usize,

    /// Target perplexity, roughly the number of effective neighbors per point
    #[builder(default = 30.0)]
    pub perplexity: f32,

    /// Scale of each gradient step
    #[builder(default = 1.0)]
    pub learning_rate: f32,

    /// Number of optimization iterations
    #[builder(default = 100)]
    pub num_iters: usize,

    /// Absolute perplexity deviation at which a bandwidth search stops early
    #[builder(default = 1e-4)]
    pub perplexity_tolerance: f32,

    /// Method for initializing the embedding coordinates
    #[builder(default)]
    pub initialization: Initialization,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            embedding_dimensions: 2,
            perplexity: 30.0,
            learning_rate: 1.0,
            num_iters: 100,
            perplexity_tolerance: 1e-4,
            initialization: Initialization::default(),
        }
    }
}

/// Methods for initializing the embedding coordinates.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Initialization {
    /// Uniform random coordinates in [-0.5, 0.5) with an optional seed.
    /// Without a seed, every call starts from a different layout.
    Random(Option<u64>),

    /// Use provided coordinate values, one row per point
    Value(Array2<f32>),
}

impl Default for Initialization {
    fn default() -> Self {
        Self::Random(None)
    }
}

/// Computes t-SNE embeddings.
///
/// Holds only configuration; all scratch space belongs to a single
/// [`Tsne::transform`] call, so one instance can serve concurrent calls.
#[derive(Clone, Debug, Default)]
pub struct Tsne {
    config: Configuration,
}

impl Tsne {
    /// Creates an embedder with the given configuration.
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    /// Reduces dimensionality of input data using t-SNE.
    ///
    /// # Arguments
    /// * `x` - Input data matrix where each row is a sample
    ///
    /// # Returns
    /// The embedding, one row per sample and `embedding_dimensions` columns
    ///
    /// # Errors
    /// * `TsneError::SampleSize` - Input has fewer than two samples
    /// * `TsneError::NonFinite` - Input or provided initial coordinates contain
    ///   a NaN or infinite value
    /// * `TsneError::InvalidEmbeddingDimensions` - Zero output dimensions
    /// * `TsneError::InvalidPerplexity` - Perplexity is not a positive number
    /// * `TsneError::InvalidInitialShape` - Provided initial coordinates have
    ///   the wrong shape
    pub fn transform(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, TsneError> {
        validate_matrix(x)?;
        let n = x.nrows();
        validate_configuration(&self.config, n)?;

        let y = initial_embedding(
            &self.config.initialization,
            n,
            self.config.embedding_dimensions,
        );

        // Fixed target distribution
        let distances = pairwise_squared_distances(x);
        let sigmas = calibrate_sigmas(
            distances.view(),
            self.config.perplexity,
            self.config.perplexity_tolerance,
        );
        let p = joint_probabilities(distances.view(), sigmas.view());
        debug!("Computed joint probabilities for {n} points");

        Ok(tsne(
            p.view(),
            y,
            self.config.learning_rate,
            self.config.num_iters,
        ))
    }

    /// Reduces dimensionality of data given as a sequence of rows.
    ///
    /// Rows are checked for equal length before anything else is computed.
    ///
    /// # Errors
    /// * `TsneError::RaggedRows` - Rows have different lengths
    /// * Any error returned by [`Tsne::transform`]
    pub fn transform_rows<R: AsRef<[f32]>>(&self, rows: &[R]) -> Result<Array2<f32>, TsneError> {
        let x = validate_rows(rows)?;
        self.transform(x.view())
    }
}

/// Builds the starting coordinates. Provided values are assumed validated.
fn initial_embedding(init: &Initialization, n: usize, n_dims: usize) -> Array2<f32> {
    match init {
        Initialization::Random(maybe_seed) => {
            let uniform = Uniform::new(-0.5_f32, 0.5);
            match maybe_seed {
                None => Array2::random((n, n_dims), uniform),
                Some(seed) => {
                    Array2::random_using((n, n_dims), uniform, &mut SmallRng::seed_from_u64(*seed))
                }
            }
        }
        Initialization::Value(value) => value.clone(),
    }
}

/// Scratch buffers owned by one optimization run and reused every
/// iteration.
struct Workspace {
    /// Coordinates from one iteration back
    y_prev: Array2<f32>,

    /// Squared distances between embedding points
    distances: Array2<f32>,

    /// Student-t kernel `1 / (1 + d)`
    kernel: Array2<f32>,

    /// Normalized low-dimensional affinities
    q: Array2<f32>,

    /// Gradient of the cost
    grad: Array2<f32>,
}

impl Workspace {
    /// Allocates buffers sized for `y`, with `y_prev` equal to `y` so the
    /// first momentum term is zero.
    fn new(y: &Array2<f32>) -> Self {
        let n = y.nrows();
        Self {
            y_prev: y.clone(),
            distances: Array2::zeros((n, n)),
            kernel: Array2::zeros((n, n)),
            q: Array2::zeros((n, n)),
            grad: Array2::zeros(y.raw_dim()),
        }
    }
}

/// Core t-SNE optimization loop.
///
/// Runs exactly `num_iters` momentum gradient-descent steps on `y`; there is
/// no convergence check.
///
/// # Arguments
/// * `p` - Fixed high-dimensional affinities
/// * `y` - Initial embedding coordinates
/// * `lr` - Learning rate
/// * `num_iters` - Number of iterations
///
/// # Returns
/// Final embedding coordinates
fn tsne(p: ArrayView2<f32>, mut y: Array2<f32>, lr: f32, num_iters: usize) -> Array2<f32> {
    let start_time = Instant::now();
    let mut ws = Workspace::new(&y);

    for itr in 0..num_iters {
        let momentum = momentum_at(itr, num_iters);

        pairwise_squared_distances_into(y.view(), ws.distances.view_mut());
        student_t_affinities(ws.distances.view(), ws.kernel.view_mut(), ws.q.view_mut());

        if enabled!(Level::DEBUG) && (itr == 0 || (itr + 1) % 10 == 0) {
            let cost = kl_divergence(p, ws.q.view());
            if itr == 0 {
                debug!("Initial KL divergence: {}", cost);
            } else {
                debug!("Iteration: {:4}, KL divergence: {}", itr + 1, cost);
            }
        }

        tsne_grad(
            y.view(),
            p,
            ws.q.view(),
            ws.kernel.view(),
            ws.grad.view_mut(),
        );

        update_embedding_momentum(
            y.view_mut(),
            ws.y_prev.view_mut(),
            ws.grad.view(),
            lr,
            momentum,
        );
    }

    let elapsed = start_time.elapsed();
    debug!("Elapsed time: {:.2?}", elapsed);

    y
}

/// Errors that can occur during t-SNE embedding.
///
/// All of them are raised before any numeric work starts.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TsneError {
    /// Input data has fewer than two samples
    #[error("Sample size must be at least two, got {rows}")]
    SampleSize {
        /// Number of rows provided
        rows: usize,
    },

    /// Input rows have different lengths
    #[error("Row {row} has length {actual}, expected {expected}")]
    RaggedRows {
        /// Index of the first mismatched row
        row: usize,
        /// Length of the first row
        expected: usize,
        /// Length of the mismatched row
        actual: usize,
    },

    /// An entry is NaN or infinite
    #[error("Entry at row {row}, column {column} is not a finite number")]
    NonFinite {
        /// Row of the offending entry
        row: usize,
        /// Column of the offending entry
        column: usize,
    },

    /// Requested embedding has no dimensions
    #[error("The number of embedding dimensions can't be less than 1")]
    InvalidEmbeddingDimensions,

    /// Perplexity is not a positive finite number
    #[error("Perplexity must be a positive finite number, got {0}")]
    InvalidPerplexity(f32),

    /// Provided initial coordinates have incorrect dimensions
    #[error("Invalid shape for initial coordinates. Expected {expected:?}, got {actual:?}")]
    InvalidInitialShape {
        /// Expected shape: [`n_samples`, `embedding_dimensions`]
        expected: [usize; 2],
        /// Actual shape of provided matrix
        actual: Vec<usize>,
    },
}
