//! Clustering algorithms compared by the pipeline.
//!
//! This module provides:
//! - `KMeans`: partitional clustering using centroids, k-means++ seeding and restarts
//! - `AgglomerativeClustering`: bottom-up hierarchical merging with a choice of linkage
//! - `SpectralClustering`: k-way partitioning of a normalized affinity graph
//!
//! All three implement [`Clusterer`], which is what the hyperparameter
//! sweeps in [`crate::comparison`] operate on.
//!
//! # Examples
//!
//! ## K-Means Clustering
//! ```rust
//! use signclust::KMeans;
//! use ndarray::array;
//!
//! let x = array![
//!     [1.0, 1.0],
//!     [1.5, 2.0],
//!     [3.0, 4.0],
//!     [5.0, 7.0],
//!     [3.5, 5.0],
//!     [4.5, 5.0]
//! ];
//!
//! let mut kmeans = KMeans::new(2).max_iter(100).random_state(42);
//! let labels = kmeans.fit_predict(&x).unwrap();
//! assert_eq!(labels.len(), 6);
//!
//! let inertia = kmeans.inertia.unwrap();
//! println!("Inertia: {:.4}", inertia);
//! ```
//!
//! ## Agglomerative Clustering
//! ```rust
//! use signclust::{AgglomerativeClustering, Linkage};
//! use signclust::metrics::Distance;
//! use ndarray::array;
//!
//! let x = array![[0.0, 0.0], [0.1, 0.1], [5.0, 5.0], [5.1, 5.0]];
//!
//! let mut agglo = AgglomerativeClustering::new(2)
//!     .linkage(Linkage::Complete)
//!     .distance(Distance::Manhattan);
//! let labels = agglo.fit_predict(&x).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//! ```
//!
//! ## Spectral Clustering
//! ```rust
//! use signclust::{SpectralClustering, Affinity, AssignLabels};
//! use ndarray::array;
//!
//! let x = array![[0.0, 0.0], [0.1, 0.1], [5.0, 5.0], [5.1, 5.0]];
//!
//! let mut spectral = SpectralClustering::new(2)
//!     .affinity(Affinity::Laplacian)
//!     .assign_labels(AssignLabels::Discretize)
//!     .random_state(1337);
//! let labels = spectral.fit_predict(&x).unwrap();
//! assert_eq!(labels.len(), 4);
//! ```

mod agglomerative;
mod kmeans;
mod spectral;

pub use agglomerative::{AgglomerativeClustering, Linkage, Merge};
pub use kmeans::{KMeans, KMeansInit};
pub use spectral::{Affinity, AssignLabels, SpectralClustering};

use crate::error::Result;
use crate::{Labels, Matrix};

/// Label for samples that belong to no cluster.
pub const NOISE: usize = usize::MAX;

/// Common interface for hard clustering algorithms (one label per sample).
pub trait Clusterer {
    /// Fit on `x` and return one cluster label per row.
    fn fit_predict(&mut self, x: &Matrix) -> Result<Labels>;

    /// The configured number of clusters.
    fn n_clusters(&self) -> usize;
}

impl Clusterer for KMeans {
    fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        KMeans::fit_predict(self, x)
    }

    fn n_clusters(&self) -> usize {
        KMeans::n_clusters(self)
    }
}

impl Clusterer for AgglomerativeClustering {
    fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        AgglomerativeClustering::fit_predict(self, x)
    }

    fn n_clusters(&self) -> usize {
        AgglomerativeClustering::n_clusters(self)
    }
}

impl Clusterer for SpectralClustering {
    fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        SpectralClustering::fit_predict(self, x)
    }

    fn n_clusters(&self) -> usize {
        SpectralClustering::n_clusters(self)
    }
}

/// Number of distinct non-noise labels.
pub fn count_clusters(labels: &Labels) -> usize {
    let mut distinct: Vec<usize> = labels.iter().copied().filter(|&l| l != NOISE).collect();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len()
}

/// Squared Euclidean distance between two equally long rows.
#[inline]
pub(crate) fn squared_euclidean(a: &ndarray::ArrayView1<f64>, b: &ndarray::ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
