use crate::error::{Error, Result};
use crate::linalg::symmetric_eigen;
use crate::{Matrix, Vector};
use ndarray::Axis;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct PCA {
    /// One principal axis per row, sorted by descending variance.
    pub components: Option<Matrix>,
    pub explained_variance: Option<Vector>,
    pub explained_variance_ratio: Option<Vector>,
    pub mean: Option<Vector>,
    n_components: Option<usize>,
}

impl PCA {
    pub fn new() -> Self {
        Self {
            components: None,
            explained_variance: None,
            explained_variance_ratio: None,
            mean: None,
            n_components: None,
        }
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = Some(n_components);
        self
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::DataFormat(
                "input matrix must have at least one sample and one feature".to_string(),
            ));
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let available = n_features.min(n_samples);
        let n_components = self.n_components.unwrap_or(available);

        if n_components == 0 {
            return Err(Error::invalid("n_components", "must be at least 1"));
        }
        if n_components > available {
            return Err(Error::InsufficientRank {
                requested: n_components,
                available,
            });
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::DataFormat("cannot average an empty matrix".to_string()))?;
        let x_centered = x - &mean.view().insert_axis(Axis(0));
        let dof = (n_samples.saturating_sub(1)).max(1) as f64;

        let (mut components, explained_variance) = if n_features < n_samples {
            fit_covariance(&x_centered, n_components, dof)?
        } else {
            fit_gram(&x_centered, n_components, dof)?
        };

        for mut row in components.rows_mut() {
            let pivot = row
                .iter()
                .copied()
                .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                row.mapv_inplace(|v| -v);
            }
        }

        let total_variance = x_centered.mapv(|v| v * v).sum() / dof;
        let explained_variance_ratio = if total_variance > 0.0 {
            &explained_variance / total_variance
        } else {
            Vector::zeros(explained_variance.len())
        };

        debug!(
            n_samples,
            n_features,
            n_components,
            retained = explained_variance_ratio.sum(),
            "PCA fitted"
        );

        self.components = Some(components);
        self.explained_variance = Some(explained_variance);
        self.explained_variance_ratio = Some(explained_variance_ratio);
        self.mean = Some(mean);

        Ok(())
    }

    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let components = self.components.as_ref().ok_or(Error::NotFitted)?;
        let mean = self.mean.as_ref().ok_or(Error::NotFitted)?;

        if x.ncols() != mean.len() {
            return Err(Error::DimensionMismatch {
                expected: mean.len(),
                found: x.ncols(),
            });
        }

        let x_centered = x - &mean.view().insert_axis(Axis(0));
        Ok(x_centered.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: &Matrix) -> Result<Matrix> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Maps projected rows back into feature space.
    pub fn inverse_transform(&self, x: &Matrix) -> Result<Matrix> {
        let components = self.components.as_ref().ok_or(Error::NotFitted)?;
        let mean = self.mean.as_ref().ok_or(Error::NotFitted)?;

        if x.ncols() != components.nrows() {
            return Err(Error::DimensionMismatch {
                expected: components.nrows(),
                found: x.ncols(),
            });
        }

        Ok(x.dot(components) + &mean.view().insert_axis(Axis(0)))
    }

    /// Running sum of `explained_variance_ratio`.
    pub fn cumulative_variance_ratio(&self) -> Option<Vector> {
        let ratio = self.explained_variance_ratio.as_ref()?;
        let mut running = 0.0;
        Some(ratio.mapv(|r| {
            running += r;
            running
        }))
    }

    /// Smallest number of components whose cumulative ratio reaches
    /// `threshold`, or `None` if the fitted components never do.
    pub fn components_for_variance(&self, threshold: f64) -> Option<usize> {
        self.cumulative_variance_ratio()?
            .iter()
            .position(|&c| c >= threshold)
            .map(|i| i + 1)
    }
}

impl Default for PCA {
    fn default() -> Self {
        Self::new()
    }
}

fn fit_covariance(x_centered: &Matrix, n_components: usize, dof: f64) -> Result<(Matrix, Vector)> {
    let cov = x_centered.t().dot(x_centered) / dof;
    let (eigenvalues, eigenvectors) = symmetric_eigen(&cov)?;

    let explained_variance = eigenvalues.slice(ndarray::s![..n_components]).mapv(|l| l.max(0.0));
    let components = eigenvectors
        .slice(ndarray::s![.., ..n_components])
        .t()
        .to_owned();
    Ok((components, explained_variance))
}

/// Wide data: eigendecompose `X Xᵀ` and map its eigenvectors back
/// through `Xᵀ`. Directions with no variance are completed to an
/// orthonormal set.
fn fit_gram(x_centered: &Matrix, n_components: usize, dof: f64) -> Result<(Matrix, Vector)> {
    let n_features = x_centered.ncols();
    let gram = x_centered.dot(&x_centered.t());
    let (eigenvalues, eigenvectors) = symmetric_eigen(&gram)?;

    let tolerance = eigenvalues.first().copied().unwrap_or(0.0).max(0.0) * 1e-10;
    let mut components = Matrix::zeros((n_components, n_features));
    let mut explained_variance = Vector::zeros(n_components);
    let mut missing = Vec::new();

    for i in 0..n_components {
        let lambda = eigenvalues[i];
        if lambda > tolerance && lambda > 0.0 {
            let axis = x_centered.t().dot(&eigenvectors.column(i)) / lambda.sqrt();
            components.row_mut(i).assign(&axis);
            explained_variance[i] = lambda / dof;
        } else {
            missing.push(i);
        }
    }

    let mut basis = 0;
    for i in missing {
        while basis < n_features {
            let mut candidate = Vector::zeros(n_features);
            candidate[basis] = 1.0;
            basis += 1;
            for row in components.rows() {
                let proj = candidate.dot(&row);
                candidate.scaled_add(-proj, &row);
            }
            let norm = candidate.dot(&candidate).sqrt();
            if norm > 1e-8 {
                components.row_mut(i).assign(&(candidate / norm));
                break;
            }
        }
    }

    Ok((components, explained_variance))
}
