//! Input and configuration checks run before any numeric work.

use crate::{Configuration, Initialization, TsneError};
use ndarray::{Array2, ArrayView2};
use tracing::warn;

/// Checks that `x` has at least two rows and only finite entries.
///
/// # Errors
/// * `TsneError::SampleSize` - Fewer than two rows
/// * `TsneError::NonFinite` - A NaN or infinite entry, reported by position
pub fn validate_matrix(x: ArrayView2<f32>) -> Result<(), TsneError> {
    let rows = x.nrows();
    if rows < 2 {
        return Err(TsneError::SampleSize { rows });
    }

    check_finite(x)
}

/// Checks a sequence of rows and copies it into a matrix.
///
/// Rows are checked in order: row count first, then row lengths against the
/// first row, then element values.
///
/// # Errors
/// * `TsneError::SampleSize` - Fewer than two rows
/// * `TsneError::RaggedRows` - A row whose length differs from the first row
/// * `TsneError::NonFinite` - A NaN or infinite entry
pub fn validate_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Array2<f32>, TsneError> {
    let n = rows.len();
    if n < 2 {
        return Err(TsneError::SampleSize { rows: n });
    }

    let expected = rows.first().map_or(0, |r| r.as_ref().len());
    if let Some((row, actual)) = rows
        .iter()
        .map(|r| r.as_ref().len())
        .enumerate()
        .find(|&(_, len)| len != expected)
    {
        return Err(TsneError::RaggedRows {
            row,
            expected,
            actual,
        });
    }

    let x = Array2::from_shape_fn((n, expected), |(i, j)| rows[i].as_ref()[j]);
    check_finite(x.view())?;
    Ok(x)
}

/// Checks configuration values that do not depend on the data, and warns
/// about a perplexity the data cannot reach.
///
/// # Errors
/// * `TsneError::InvalidEmbeddingDimensions` - Zero output dimensions
/// * `TsneError::InvalidPerplexity` - Perplexity not finite or not positive
/// * `TsneError::InvalidInitialShape` - Provided coordinates have the wrong
///   shape
/// * `TsneError::NonFinite` - Provided coordinates contain a NaN or infinite
///   value
pub fn validate_configuration(config: &Configuration, n: usize) -> Result<(), TsneError> {
    if config.embedding_dimensions == 0 {
        return Err(TsneError::InvalidEmbeddingDimensions);
    }

    if !config.perplexity.is_finite() || config.perplexity <= 0.0 {
        return Err(TsneError::InvalidPerplexity(config.perplexity));
    }

    if perplexity_saturates(config.perplexity, n) {
        warn!(
            "Perplexity {} reaches the {} available neighbors; bandwidths will saturate.",
            config.perplexity,
            n - 1
        );
    }

    if let Initialization::Value(y) = &config.initialization {
        let expected = [n, config.embedding_dimensions];
        if y.shape() != expected {
            return Err(TsneError::InvalidInitialShape {
                expected,
                actual: y.shape().to_vec(),
            });
        }
        check_finite(y.view())?;
    }

    Ok(())
}

/// Whether a perplexity is out of reach for `n` points, whose rows offer at
/// most `n - 1` neighbors.
#[allow(clippy::cast_precision_loss)]
fn perplexity_saturates(perplexity: f32, n: usize) -> bool {
    perplexity >= n.saturating_sub(1) as f32
}

fn check_finite(x: ArrayView2<f32>) -> Result<(), TsneError> {
    match x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, column), _)) => Err(TsneError::NonFinite { row, column }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_too_few_rows() {
        let empty = Array2::<f32>::zeros((0, 3));
        assert!(matches!(
            validate_matrix(empty.view()),
            Err(TsneError::SampleSize { rows: 0 })
        ));

        let single = array![[1.0, 2.0]];
        assert!(matches!(
            validate_matrix(single.view()),
            Err(TsneError::SampleSize { rows: 1 })
        ));

        let rows: Vec<Vec<f32>> = vec![];
        assert!(matches!(
            validate_rows(&rows),
            Err(TsneError::SampleSize { rows: 0 })
        ));
        assert!(matches!(
            validate_rows(&[[1.0_f32, 2.0]]),
            Err(TsneError::SampleSize { rows: 1 })
        ));
    }

    #[test]
    fn test_ragged_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0]];
        let err = validate_rows(&rows).unwrap_err();
        assert!(matches!(
            err,
            TsneError::RaggedRows {
                row: 2,
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(err.to_string(), "Row 2 has length 1, expected 2");
    }

    #[test]
    fn test_non_finite_entries() {
        let x = array![[1.0, 2.0], [3.0, f32::NAN]];
        assert!(matches!(
            validate_matrix(x.view()),
            Err(TsneError::NonFinite { row: 1, column: 1 })
        ));

        let rows = vec![vec![f32::INFINITY, 0.0], vec![1.0, 1.0]];
        assert!(matches!(
            validate_rows(&rows),
            Err(TsneError::NonFinite { row: 0, column: 0 })
        ));
    }

    #[test]
    fn test_valid_rows_copied() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let x = validate_rows(&rows).unwrap();
        assert_eq!(x, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_configuration_checks() {
        let config = Configuration::builder().embedding_dimensions(0).build();
        assert!(matches!(
            validate_configuration(&config, 10),
            Err(TsneError::InvalidEmbeddingDimensions)
        ));

        for perplexity in [0.0, -1.0, f32::NAN] {
            let config = Configuration::builder().perplexity(perplexity).build();
            assert!(matches!(
                validate_configuration(&config, 10),
                Err(TsneError::InvalidPerplexity(_))
            ));
        }

        // Unreachable perplexity only warns
        let config = Configuration::default();
        assert!(validate_configuration(&config, 5).is_ok());
        let config = Configuration::builder().perplexity(4.0).build();
        assert!(validate_configuration(&config, 5).is_ok());
    }

    #[test]
    fn test_perplexity_saturation_threshold() {
        assert!(!perplexity_saturates(3.9, 5));
        assert!(perplexity_saturates(4.0, 5));
        assert!(perplexity_saturates(30.0, 5));
        assert!(!perplexity_saturates(30.0, 100));
    }

    #[test]
    fn test_initial_value_checks() {
        let config = Configuration::builder()
            .initialization(Initialization::Value(Array2::zeros((3, 3))))
            .build();
        let err = validate_configuration(&config, 3).unwrap_err();
        assert!(matches!(
            err,
            TsneError::InvalidInitialShape {
                expected: [3, 2],
                ..
            }
        ));

        let config = Configuration::builder()
            .initialization(Initialization::Value(array![[0.0, 0.0], [f32::NAN, 1.0]]))
            .build();
        assert!(matches!(
            validate_configuration(&config, 2),
            Err(TsneError::NonFinite { row: 1, column: 0 })
        ));
    }
}
