use super::distance::{Distance, DistanceMatrix};
use crate::cluster::NOISE;
use crate::error::{Error, Result};
use crate::{Labels, Matrix};
use std::collections::HashMap;

/// Score given to partitions that silhouette cannot rank: fewer than two
/// clusters, or every sample in a cluster of its own.
pub const DEGENERATE_SCORE: f64 = -1.0;

/// Mean silhouette coefficient of `labels` over `x`.
///
/// Samples labeled [`NOISE`] are left out. Degenerate partitions score
/// [`DEGENERATE_SCORE`] instead of failing; a label count that differs
/// from the sample count is an error.
pub fn silhouette_score(x: &Matrix, labels: &Labels, metric: Distance) -> Result<f64> {
    check_lengths(x.nrows(), labels)?;
    if is_degenerate(labels) {
        return Ok(DEGENERATE_SCORE);
    }
    let distances = DistanceMatrix::new(x, metric);
    silhouette_precomputed(&distances, labels)
}

/// Same as [`silhouette_score`] over a precomputed distance matrix.
pub fn silhouette_precomputed(distances: &DistanceMatrix, labels: &Labels) -> Result<f64> {
    check_lengths(distances.len(), labels)?;
    if is_degenerate(labels) {
        return Ok(DEGENERATE_SCORE);
    }

    // Dense cluster indices
    let mut index: HashMap<usize, usize> = HashMap::new();
    for &label in labels.iter().filter(|&&l| l != NOISE) {
        let next = index.len();
        index.entry(label).or_insert(next);
    }
    let k = index.len();
    let dense: Vec<Option<usize>> = labels
        .iter()
        .map(|l| index.get(l).copied())
        .collect();

    let mut sizes = vec![0usize; k];
    for c in dense.iter().flatten() {
        sizes[*c] += 1;
    }

    let mut total = 0.0;
    let mut counted = 0usize;
    let mut sums = vec![0.0; k];

    for (i, own) in dense.iter().enumerate() {
        let Some(own) = *own else { continue };
        counted += 1;
        if sizes[own] == 1 {
            // Singleton clusters contribute 0
            continue;
        }

        sums.iter_mut().for_each(|s| *s = 0.0);
        for (j, &d) in distances.row(i).iter().enumerate() {
            if let Some(c) = dense[j] {
                sums[c] += d;
            }
        }

        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    if counted == 0 {
        return Ok(DEGENERATE_SCORE);
    }
    Ok(total / counted as f64)
}

fn check_lengths(n_samples: usize, labels: &Labels) -> Result<()> {
    if n_samples != labels.len() {
        return Err(Error::DimensionMismatch {
            expected: n_samples,
            found: labels.len(),
        });
    }
    Ok(())
}

fn is_degenerate(labels: &Labels) -> bool {
    let clustered: Vec<usize> = labels.iter().copied().filter(|&l| l != NOISE).collect();
    let mut distinct = clustered.clone();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len() < 2 || distinct.len() == clustered.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_single_cluster_is_sentinel() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let labels = array![0, 0, 0];
        for metric in Distance::ALL {
            assert_eq!(silhouette_score(&x, &labels, metric).unwrap(), DEGENERATE_SCORE);
        }
    }

    #[test]
    fn test_all_singletons_is_sentinel() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let labels = array![0, 1, 2];
        assert_eq!(silhouette_score(&x, &labels, Distance::Euclidean).unwrap(), DEGENERATE_SCORE);
    }

    #[test]
    fn test_known_value() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let labels = array![0, 0, 1, 1];
        let score = silhouette_score(&x, &labels, Distance::Euclidean).unwrap();
        // s(0) = (10.5 - 1) / 10.5, s(1) = (9.5 - 1) / 9.5, symmetric for cluster 1
        let expected = ((9.5 / 10.5) + (8.5 / 9.5)) / 2.0;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_noise_excluded() {
        let x = array![[0.0], [1.0], [10.0], [11.0], [100.0]];
        let with_noise = array![0, 0, 1, 1, NOISE];
        let without = array![0, 0, 1, 1];
        let x_clean = array![[0.0], [1.0], [10.0], [11.0]];
        let a = silhouette_score(&x, &with_noise, Distance::Euclidean).unwrap();
        let b = silhouette_score(&x_clean, &without, Distance::Euclidean).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_bad_partition_negative() {
        let x = array![[0.0], [10.0], [1.0], [11.0]];
        let labels = array![0, 0, 1, 1];
        assert!(silhouette_score(&x, &labels, Distance::Euclidean).unwrap() < 0.0);
    }

    #[test]
    fn test_label_count_mismatch() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let labels = array![0, 0, 1];
        assert!(matches!(
            silhouette_score(&x, &labels, Distance::Euclidean),
            Err(Error::DimensionMismatch { expected: 4, found: 3 })
        ));

        let distances = DistanceMatrix::new(&x, Distance::Euclidean);
        assert!(matches!(
            silhouette_precomputed(&distances, &array![0, 1]),
            Err(Error::DimensionMismatch { expected: 4, found: 2 })
        ));
    }
}
