//! t-SNE gradient calculation.
//!
//! The gradient of `KL(P || Q)` with respect to the embedding coordinates
//! pulls together pairs whose low-dimensional affinity falls short of the
//! input affinity (`p_ij > q_ij`) and pushes apart pairs where it exceeds it.
//! Each contribution is weighted by the Student-t kernel of the pair.

use ndarray::{ArrayView2, ArrayViewMut2};

/// Calculates the gradient of the t-SNE cost for the current embedding.
///
/// For point `i` and dimension `k`:
/// `grad[i, k] = 4 * sum_j (p_ij - q_ij) * kernel_ij * (y[i, k] - y[j, k])`
///
/// # Arguments
/// * `y` - Current embedding coordinates as an n × d matrix
/// * `p` - Fixed high-dimensional affinities (n × n)
/// * `q` - Low-dimensional affinities for `y` (n × n)
/// * `kernel` - Unnormalized Student-t kernel `1 / (1 + d_ij)` for `y`
/// * `grad` - Output buffer of shape n × d, overwritten
pub fn tsne_grad(
    y: ArrayView2<f32>,
    p: ArrayView2<f32>,
    q: ArrayView2<f32>,
    kernel: ArrayView2<f32>,
    mut grad: ArrayViewMut2<f32>,
) {
    let (n, dim) = y.dim();
    grad.fill(0.0);

    for (i, mut grad_i) in grad.rows_mut().into_iter().enumerate() {
        for j in 0..n {
            if i == j {
                continue;
            }

            let w = 4.0 * (p[[i, j]] - q[[i, j]]) * kernel[[i, j]];
            for d in 0..dim {
                grad_i[d] += w * (y[[i, d]] - y[[j, d]]);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::tsne_grad;
    use crate::affinity::student_t_affinities;
    use crate::distance::pairwise_squared_distances;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Axis};

    #[test]
    fn test_tsne_grad_two_points() {
        let y = array![[0.0], [1.0]];
        let p = array![[0.0, 0.4], [0.4, 0.0]];
        let distances = pairwise_squared_distances(y.view());
        let mut kernel = Array2::zeros((2, 2));
        let mut q = Array2::zeros((2, 2));
        student_t_affinities(distances.view(), kernel.view_mut(), q.view_mut());

        let mut grad = Array2::from_elem((2, 1), 7.0);
        tsne_grad(y.view(), p.view(), q.view(), kernel.view(), grad.view_mut());

        // q_01 = 0.5 exceeds p_01 = 0.4, so the points repel
        assert_abs_diff_eq!(grad[[0, 0]], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(grad[[1, 0]], -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_tsne_grad_matches_direct_evaluation() {
        let y = array![
            [-0.70575494, 0.4136191],
            [-0.5127779, 1.060248],
            [-1.0165913, -1.1657093],
            [-0.8206925, 0.9737984],
        ];
        let p = array![
            [0.0, 0.2, 0.05, 0.0],
            [0.2, 0.0, 0.0, 0.05],
            [0.05, 0.0, 0.0, 0.2],
            [0.0, 0.05, 0.2, 0.0],
        ];
        let distances = pairwise_squared_distances(y.view());
        let mut kernel = Array2::zeros((4, 4));
        let mut q = Array2::zeros((4, 4));
        student_t_affinities(distances.view(), kernel.view_mut(), q.view_mut());

        let mut grad = Array2::zeros((4, 2));
        tsne_grad(y.view(), p.view(), q.view(), kernel.view(), grad.view_mut());

        // Reference gradient from a direct, unvectorized evaluation
        let mut expected = Array2::<f32>::zeros((4, 2));
        for i in 0..4 {
            for j in 0..4 {
                if i == j {
                    continue;
                }
                let d: f32 = (0..2).map(|k| (y[[i, k]] - y[[j, k]]).powi(2)).sum();
                for k in 0..2 {
                    expected[[i, k]] +=
                        4.0 * (p[[i, j]] - q[[i, j]]) / (1.0 + d) * (y[[i, k]] - y[[j, k]]);
                }
            }
        }

        for (&a, &b) in grad.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }

        // Pairwise forces are equal and opposite
        for total in grad.sum_axis(Axis(0)) {
            assert_abs_diff_eq!(total, 0.0, epsilon = 1e-6);
        }
    }
}
