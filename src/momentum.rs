//! Momentum gradient-descent updates for t-SNE embeddings
//!
//! Each step moves the embedding against the gradient and adds a fraction of
//! the previous step's displacement. The fraction ramps up linearly over the
//! run so late iterations keep moving in consistent directions.

use ndarray::{ArrayView2, ArrayViewMut2, Zip};

/// Momentum coefficient for iteration `itr` of `num_iters`.
///
/// Ramps linearly from 0.5 at the first iteration towards 0.8 at the end.
#[allow(clippy::cast_precision_loss)]
pub fn momentum_at(itr: usize, num_iters: usize) -> f32 {
    0.5 + 0.3 * itr as f32 / num_iters.max(1) as f32
}

/// Updates embedding coordinates with one momentum gradient-descent step.
///
/// `y_new = y - lr * grad + momentum * (y - y_prev)`, after which `y_prev`
/// holds the coordinates from before the step.
///
/// # Arguments
/// * `y` - Current embedding coordinates to update
/// * `y_prev` - Coordinates from one step back, updated to the pre-step `y`
/// * `grad` - Gradient for this iteration
/// * `lr` - Learning rate
/// * `momentum` - Weight of the previous displacement
///
/// # Panics
/// * If `y_prev` or `grad` have a different shape than `y`
pub fn update_embedding_momentum(
    y: ArrayViewMut2<f32>,
    y_prev: ArrayViewMut2<f32>,
    grad: ArrayView2<f32>,
    lr: f32,
    momentum: f32,
) {
    Zip::from(y)
        .and(y_prev)
        .and(grad)
        .for_each(|y, y_prev, &grad| {
            let current = *y;
            *y = current - lr * grad + momentum * (current - *y_prev);
            *y_prev = current;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_momentum_schedule() {
        assert_abs_diff_eq!(momentum_at(0, 100), 0.5);
        assert_abs_diff_eq!(momentum_at(50, 100), 0.65, epsilon = 1e-6);
        assert_abs_diff_eq!(momentum_at(99, 100), 0.797, epsilon = 1e-6);

        for itr in 1..100 {
            assert!(momentum_at(itr, 100) > momentum_at(itr - 1, 100));
        }
    }

    #[test]
    fn test_update_embedding_momentum() {
        let mut y = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let mut y_prev = y.clone();
        let grad = array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]];

        // No displacement yet, so only the gradient step applies
        update_embedding_momentum(y.view_mut(), y_prev.view_mut(), grad.view(), 1.0, 0.5);

        let y_expected = array![[0.9, 1.8], [2.7, 3.6], [4.5, 5.4]];
        let prev_expected = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        for (&a, &b) in y.iter().zip(y_expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
        assert_eq!(y_prev, prev_expected);

        // Second step carries half of the first displacement
        update_embedding_momentum(y.view_mut(), y_prev.view_mut(), grad.view(), 1.0, 0.5);

        let y_expected = array![[0.75, 1.5], [2.25, 3.0], [3.75, 4.5]];
        for (&a, &b) in y.iter().zip(y_expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
        for (&a, &b) in y_prev.iter().zip(array![[0.9, 1.8], [2.7, 3.6], [4.5, 5.4]].iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }
}
