use super::squared_euclidean;
use crate::error::{Error, Result};
use crate::{Labels, Matrix, Vector};
use ndarray::Axis;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Centroid seeding strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KMeansInit {
    /// D²-weighted sampling of successive centroids.
    #[default]
    KMeansPlusPlus,
    /// Distinct samples chosen uniformly at random.
    Random,
}

#[derive(Clone, Debug)]
pub struct KMeans {
    pub cluster_centers: Option<Matrix>,
    pub labels: Option<Labels>,
    pub inertia: Option<f64>,
    /// Lloyd iterations used by the best restart.
    pub n_iter: Option<usize>,
    n_clusters: usize,
    n_init: usize,
    max_iter: usize,
    tolerance: f64,
    random_state: u64,
    init: KMeansInit,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            cluster_centers: None,
            labels: None,
            inertia: None,
            n_iter: None,
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            random_state: 0,
            init: KMeansInit::KMeansPlusPlus,
        }
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Convergence threshold on the total squared centroid shift, relative
    /// to the mean per-feature variance of the data.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn init(mut self, init: KMeansInit) -> Self {
        self.init = init;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Runs `n_init` seeded restarts and keeps the one with the lowest inertia.
    ///
    /// Fails with [`Error::Convergence`] if any restart exhausts `max_iter`.
    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::DataFormat(
                "input matrix must have at least one sample and one feature".to_string(),
            ));
        }
        if self.n_clusters == 0 {
            return Err(Error::invalid("n_clusters", "must be > 0"));
        }
        if self.n_init == 0 {
            return Err(Error::invalid("n_init", "must be > 0"));
        }
        if x.nrows() < self.n_clusters {
            return Err(Error::invalid(
                "n_clusters",
                format!("n_samples={} should be >= n_clusters={}", x.nrows(), self.n_clusters),
            ));
        }

        let variance = x.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);
        let tol = self.tolerance * variance;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let mut best: Option<Run> = None;
        for restart in 0..self.n_init {
            let centroids = self.initialize_centroids(x, &mut rng);
            let run = self.lloyd(x, centroids, tol)?;
            trace!(restart, inertia = run.inertia, n_iter = run.n_iter, "k-means restart");
            if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        if let Some(run) = best {
            self.cluster_centers = Some(run.centroids);
            self.labels = Some(run.labels);
            self.inertia = Some(run.inertia);
            self.n_iter = Some(run.n_iter);
        }
        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Labels> {
        let centroids = self.cluster_centers.as_ref().ok_or(Error::NotFitted)?;

        if x.ncols() != centroids.ncols() {
            return Err(Error::DimensionMismatch {
                expected: centroids.ncols(),
                found: x.ncols(),
            });
        }

        Ok(assign(x, centroids).0)
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels.clone().ok_or(Error::NotFitted)
    }

    /// Distance from every sample to every centroid.
    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let centroids = self.cluster_centers.as_ref().ok_or(Error::NotFitted)?;

        if x.ncols() != centroids.ncols() {
            return Err(Error::DimensionMismatch {
                expected: centroids.ncols(),
                found: x.ncols(),
            });
        }

        let mut distances = Matrix::zeros((x.nrows(), centroids.nrows()));
        for i in 0..x.nrows() {
            for k in 0..centroids.nrows() {
                distances[[i, k]] = squared_euclidean(&x.row(i), &centroids.row(k)).sqrt();
            }
        }

        Ok(distances)
    }

    fn lloyd(&self, x: &Matrix, mut centroids: Matrix, tol: f64) -> Result<Run> {
        let (mut labels, mut distances) = assign(x, &centroids);

        for iteration in 1..=self.max_iter {
            let new_centroids = self.update_centroids(x, &labels, &distances);
            let shift: f64 = (&new_centroids - &centroids).mapv(|d| d * d).sum();
            centroids = new_centroids;

            let (new_labels, new_distances) = assign(x, &centroids);
            let unchanged = new_labels == labels;
            labels = new_labels;
            distances = new_distances;

            if unchanged || shift <= tol {
                let inertia = distances.sum();
                return Ok(Run {
                    centroids,
                    labels,
                    inertia,
                    n_iter: iteration,
                });
            }
        }

        Err(Error::Convergence {
            solver: "k-means",
            iterations: self.max_iter,
        })
    }

    /// Cluster means; an empty cluster takes the sample farthest from its
    /// own centroid.
    fn update_centroids(&self, x: &Matrix, labels: &Labels, distances: &Vector) -> Matrix {
        let mut centroids = Matrix::zeros((self.n_clusters, x.ncols()));
        let mut counts = vec![0usize; self.n_clusters];

        for (row, &label) in x.outer_iter().zip(labels.iter()) {
            let mut centroid = centroids.row_mut(label);
            centroid += &row;
            counts[label] += 1;
        }

        let mut taken = vec![false; x.nrows()];
        for k in 0..self.n_clusters {
            if counts[k] > 0 {
                let mut centroid = centroids.row_mut(k);
                centroid /= counts[k] as f64;
                continue;
            }
            let farthest = distances
                .iter()
                .enumerate()
                .filter(|(i, _)| !taken[*i])
                .fold((0, f64::NEG_INFINITY), |acc, (i, &d)| if d > acc.1 { (i, d) } else { acc })
                .0;
            taken[farthest] = true;
            centroids.row_mut(k).assign(&x.row(farthest));
        }

        centroids
    }

    fn initialize_centroids(&self, x: &Matrix, rng: &mut ChaCha8Rng) -> Matrix {
        let n = x.nrows();
        let mut centroids = Matrix::zeros((self.n_clusters, x.ncols()));

        match self.init {
            KMeansInit::Random => {
                for (k, idx) in sample(rng, n, self.n_clusters).into_iter().enumerate() {
                    centroids.row_mut(k).assign(&x.row(idx));
                }
            }
            KMeansInit::KMeansPlusPlus => {
                let first = rng.gen_range(0..n);
                centroids.row_mut(0).assign(&x.row(first));

                let mut closest: Vec<f64> = (0..n)
                    .map(|i| squared_euclidean(&x.row(i), &centroids.row(0)))
                    .collect();

                for k in 1..self.n_clusters {
                    let total: f64 = closest.iter().sum();
                    let chosen = if total > 0.0 {
                        let target = rng.gen_range(0.0..total);
                        let mut cumulative = 0.0;
                        let mut chosen = n - 1;
                        for (i, &d) in closest.iter().enumerate() {
                            cumulative += d;
                            if cumulative > target {
                                chosen = i;
                                break;
                            }
                        }
                        chosen
                    } else {
                        // Every sample sits on a centroid already
                        rng.gen_range(0..n)
                    };

                    centroids.row_mut(k).assign(&x.row(chosen));
                    for (i, d) in closest.iter_mut().enumerate() {
                        *d = d.min(squared_euclidean(&x.row(i), &centroids.row(k)));
                    }
                }
            }
        }

        centroids
    }
}

struct Run {
    centroids: Matrix,
    labels: Labels,
    inertia: f64,
    n_iter: usize,
}

/// Nearest centroid per sample and the squared distance to it.
fn assign(x: &Matrix, centroids: &Matrix) -> (Labels, Vector) {
    let mut labels = Labels::zeros(x.nrows());
    let mut distances = Vector::zeros(x.nrows());

    for (i, row) in x.outer_iter().enumerate() {
        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;
        for (k, centroid) in centroids.outer_iter().enumerate() {
            let distance = squared_euclidean(&row, &centroid);
            if distance < min_distance {
                min_distance = distance;
                closest_cluster = k;
            }
        }
        labels[i] = closest_cluster;
        distances[i] = min_distance;
    }

    (labels, distances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::count_clusters;
    use ndarray::array;

    #[test]
    fn test_kmeans_basic() {
        let x = array![
            [1.0, 1.0],
            [1.5, 2.0],
            [3.0, 4.0],
            [5.0, 7.0],
            [3.5, 5.0],
            [4.5, 5.0],
            [3.5, 4.5]
        ];

        let mut kmeans = KMeans::new(2);
        let labels = kmeans.fit_predict(&x).unwrap();

        assert_eq!(labels.len(), x.nrows());
        assert!(kmeans.cluster_centers.is_some());
        assert!(kmeans.inertia.is_some());
        assert_eq!(count_clusters(&labels), 2);
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [10.0, 10.0],
            [10.2, 10.1],
            [10.1, 10.3]
        ];

        let mut kmeans = KMeans::new(2).random_state(3);
        let labels = kmeans.fit_predict(&x).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_kmeans_deterministic_for_seed() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [5.0, 5.0], [6.0, 5.0], [9.0, 0.0], [9.0, 1.0]];
        let a = KMeans::new(3).random_state(11).fit_predict(&x).unwrap();
        let b = KMeans::new(3).random_state(11).fit_predict(&x).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kmeans_predict() {
        let x_train = array![[0.0, 0.0], [1.0, 1.0], [10.0, 10.0], [11.0, 11.0]];
        let x_test = array![[0.5, 0.5], [10.5, 10.5]];

        let mut kmeans = KMeans::new(2);
        kmeans.fit(&x_train).unwrap();

        let labels = kmeans.predict(&x_test).unwrap();
        assert_eq!(labels.len(), 2);
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn test_kmeans_transform() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [10.0, 10.0]];

        let mut kmeans = KMeans::new(2);
        kmeans.fit(&x).unwrap();

        let distances = kmeans.transform(&x).unwrap();
        assert_eq!(distances.shape(), &[3, 2]);
        for distance in distances.iter() {
            assert!(*distance >= 0.0);
        }
    }

    #[test]
    fn test_kmeans_random_init() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [8.0, 8.0], [8.1, 8.0]];
        let mut kmeans = KMeans::new(2).init(KMeansInit::Random).n_init(5);
        let labels = kmeans.fit_predict(&x).unwrap();
        assert_eq!(count_clusters(&labels), 2);
    }

    #[test]
    fn test_kmeans_invalid_clusters() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            KMeans::new(0).fit(&x),
            Err(Error::InvalidParameter { name: "n_clusters", .. })
        ));
    }

    #[test]
    fn test_kmeans_insufficient_samples() {
        let x = array![[1.0, 2.0]];
        let mut kmeans = KMeans::new(2);

        assert!(kmeans.fit(&x).is_err());
    }

    #[test]
    fn test_kmeans_predict_without_fit() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let kmeans = KMeans::new(2);

        assert!(matches!(kmeans.predict(&x), Err(Error::NotFitted)));
    }

    #[test]
    fn test_kmeans_dimension_mismatch() {
        let x_train = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let x_test = array![[1.0, 2.0], [3.0, 4.0]];

        let mut kmeans = KMeans::new(2);
        kmeans.fit(&x_train).unwrap();

        assert!(kmeans.predict(&x_test).is_err());
    }

    #[test]
    fn test_kmeans_iteration_budget_exhausted() {
        // A zero budget can never reach convergence
        let x = array![[0.0], [1.0], [2.0], [3.0], [10.0], [11.0], [12.0], [13.0], [5.0], [7.0]];
        let mut kmeans = KMeans::new(3).max_iter(0);
        assert!(matches!(
            kmeans.fit(&x),
            Err(Error::Convergence { solver: "k-means", iterations: 0 })
        ));
    }
}
