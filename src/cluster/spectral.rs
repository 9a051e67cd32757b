use super::kmeans::KMeans;
use crate::error::{Error, Result};
use crate::linalg::{svd, symmetric_eigen};
use crate::metrics::{Distance, DistanceMatrix};
use crate::{Labels, Matrix, Vector};
use ndarray::{s, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

const MAX_SVD_RESTARTS: usize = 30;

/// Kernel used to build the affinity graph. `gamma` defaults to
/// `1 / n_features`; negative kernel values are clipped to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Affinity {
    /// `exp(-gamma * ||x - y||²)`
    Rbf,
    /// `exp(-gamma * ||x - y||₁)`
    Laplacian,
    /// `tanh(gamma * <x, y> + 1)`
    Sigmoid,
    /// `(gamma * <x, y> + 1)³`
    Polynomial,
    /// `<x, y>`
    Linear,
}

impl Affinity {
    pub const ALL: [Affinity; 5] = [
        Affinity::Rbf,
        Affinity::Laplacian,
        Affinity::Sigmoid,
        Affinity::Polynomial,
        Affinity::Linear,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Affinity::Rbf => "rbf",
            Affinity::Laplacian => "laplacian",
            Affinity::Sigmoid => "sigmoid",
            Affinity::Polynomial => "polynomial",
            Affinity::Linear => "linear",
        }
    }

    fn matrix(&self, x: &Matrix, gamma: f64) -> Matrix {
        let mut a = match self {
            Affinity::Rbf => {
                let d = DistanceMatrix::new(x, Distance::Euclidean);
                Matrix::from_shape_fn((x.nrows(), x.nrows()), |(i, j)| {
                    (-gamma * d.get(i, j) * d.get(i, j)).exp()
                })
            }
            Affinity::Laplacian => {
                let d = DistanceMatrix::new(x, Distance::Manhattan);
                Matrix::from_shape_fn((x.nrows(), x.nrows()), |(i, j)| (-gamma * d.get(i, j)).exp())
            }
            Affinity::Sigmoid => x.dot(&x.t()).mapv(|v| (gamma * v + 1.0).tanh()),
            Affinity::Polynomial => x.dot(&x.t()).mapv(|v| (gamma * v + 1.0).powi(3)),
            Affinity::Linear => x.dot(&x.t()),
        };
        a.mapv_inplace(|v| v.max(0.0));
        a
    }
}

/// How labels are read off the spectral embedding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AssignLabels {
    /// k-means on the embedding rows.
    #[default]
    KMeans,
    /// Iterative rotation of the embedding onto the nearest discrete partition.
    Discretize,
}

impl AssignLabels {
    pub const ALL: [AssignLabels; 2] = [AssignLabels::KMeans, AssignLabels::Discretize];

    pub fn name(&self) -> &'static str {
        match self {
            AssignLabels::KMeans => "kmeans",
            AssignLabels::Discretize => "discretize",
        }
    }
}

/// Partitions the normalized affinity graph using its leading eigenvectors.
#[derive(Clone, Debug)]
pub struct SpectralClustering {
    pub labels: Option<Labels>,
    /// Row `i` is the spectral embedding of sample `i`.
    pub embedding: Option<Matrix>,
    n_clusters: usize,
    affinity: Affinity,
    gamma: Option<f64>,
    assign_labels: AssignLabels,
    n_init: usize,
    discretize_max_iter: usize,
    random_state: u64,
}

impl SpectralClustering {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            labels: None,
            embedding: None,
            n_clusters,
            affinity: Affinity::Rbf,
            gamma: None,
            assign_labels: AssignLabels::KMeans,
            n_init: 10,
            discretize_max_iter: 20,
            random_state: 0,
        }
    }

    pub fn affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn assign_labels(mut self, assign_labels: AssignLabels) -> Self {
        self.assign_labels = assign_labels;
        self
    }

    /// Restarts of the k-means label assignment.
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Rotation updates allowed per discretization restart before failing
    /// with [`Error::Convergence`].
    pub fn discretize_max_iter(mut self, max_iter: usize) -> Self {
        self.discretize_max_iter = max_iter;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(Error::DataFormat(
                "input matrix must have at least one sample and one feature".to_string(),
            ));
        }
        if self.n_clusters == 0 || self.n_clusters > n {
            return Err(Error::invalid(
                "n_clusters",
                format!("must be in 1..={}, got {}", n, self.n_clusters),
            ));
        }

        let gamma = self.gamma.unwrap_or(1.0 / x.ncols() as f64);
        let affinity = self.affinity.matrix(x, gamma);
        let embedding = spectral_embedding(affinity, self.n_clusters)?;

        let labels = match self.assign_labels {
            AssignLabels::KMeans => KMeans::new(self.n_clusters)
                .n_init(self.n_init)
                .random_state(self.random_state)
                .fit_predict(&embedding)?,
            AssignLabels::Discretize => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
                discretize(&embedding, &mut rng, self.discretize_max_iter)?
            }
        };

        debug!(
            affinity = self.affinity.name(),
            assign_labels = self.assign_labels.name(),
            n_clusters = self.n_clusters,
            "spectral clustering fitted"
        );

        self.labels = Some(labels);
        self.embedding = Some(embedding);
        Ok(())
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Labels> {
        self.fit(x)?;
        self.labels.clone().ok_or(Error::NotFitted)
    }
}

/// Leading `k` eigenvectors of `D^-1/2 A D^-1/2`, rescaled by `D^-1/2`.
///
/// Self-loops are ignored and isolated vertices get unit degree. Each
/// column's sign is fixed so its largest-magnitude entry is positive.
fn spectral_embedding(mut affinity: Matrix, k: usize) -> Result<Matrix> {
    let n = affinity.nrows();
    affinity.diag_mut().fill(0.0);

    let inv_sqrt_degree: Vector = affinity
        .sum_axis(Axis(1))
        .mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 1.0 });

    for i in 0..n {
        for j in 0..n {
            affinity[[i, j]] *= inv_sqrt_degree[i] * inv_sqrt_degree[j];
        }
    }

    let (_, vectors) = symmetric_eigen(&affinity)?;
    let mut embedding = vectors.slice(s![.., ..k]).to_owned();

    for mut column in embedding.columns_mut() {
        column *= &inv_sqrt_degree;
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            column.mapv_inplace(|v| -v);
        }
    }

    Ok(embedding)
}

/// Finds the discrete partition closest to the embedding (Yu & Shi).
fn discretize(embedding: &Matrix, rng: &mut ChaCha8Rng, max_iter: usize) -> Result<Labels> {
    let (n, k) = embedding.dim();
    let eps = f64::EPSILON;

    let mut vectors = embedding.clone();
    let norm_ones = (n as f64).sqrt();
    for mut column in vectors.columns_mut() {
        let norm = column.dot(&column).sqrt().max(eps);
        column *= norm_ones / norm;
        if column[0] != 0.0 {
            let sign = column[0].signum();
            column *= -sign;
        }
    }
    for mut row in vectors.rows_mut() {
        let norm = row.dot(&row).sqrt().max(eps);
        row /= norm;
    }

    for restart in 0..MAX_SVD_RESTARTS {
        // Initial rotation: a random sample, then the samples most
        // orthogonal to those already chosen.
        let mut rotation = Matrix::zeros((k, k));
        rotation.column_mut(0).assign(&vectors.row(rng.gen_range(0..n)));
        let mut c = Vector::zeros(n);
        for j in 1..k {
            c += &vectors.dot(&rotation.column(j - 1)).mapv(f64::abs);
            let argmin = c
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |acc, (i, &v)| if v < acc.1 { (i, v) } else { acc })
                .0;
            rotation.column_mut(j).assign(&vectors.row(argmin));
        }

        let mut last_objective = 0.0;
        let mut iteration = 0;
        loop {
            if iteration == max_iter {
                return Err(Error::Convergence {
                    solver: "spectral discretization",
                    iterations: max_iter,
                });
            }
            iteration += 1;
            let projected = vectors.dot(&rotation);
            let labels: Labels = projected
                .rows()
                .into_iter()
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |acc, (j, &v)| if v > acc.1 { (j, v) } else { acc })
                        .0
                })
                .collect();

            let mut t_svd = Matrix::zeros((k, k));
            for (row, &label) in vectors.rows().into_iter().zip(labels.iter()) {
                let mut target = t_svd.row_mut(label);
                target += &row;
            }

            let Ok((u, singular, v)) = svd(&t_svd) else {
                debug!(restart, "discretization SVD failed, restarting");
                break;
            };

            let ncut = 2.0 * (n as f64 - singular.sum());
            if (ncut - last_objective).abs() < eps {
                return Ok(labels);
            }
            last_objective = ncut;
            rotation = v.dot(&u.t());
        }
    }

    Err(Error::Convergence {
        solver: "spectral discretization",
        iterations: MAX_SVD_RESTARTS,
    })
}
