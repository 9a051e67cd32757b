//! End-to-end analysis: flatten → PCA → clustering comparison.

use crate::comparison::{compare, ComparisonReport};
use crate::config::PipelineConfig;
use crate::dataset::{flatten, DatasetBundle};
use crate::decomposition::PCA;
use crate::error::{Error, Result};
use crate::{Labels, Matrix, Vector};
use ndarray::s;
use tracing::{info, info_span};

/// First two projected coordinates of every sample and the label used to
/// color it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterData {
    /// N x 2
    pub coordinates: Matrix,
    pub colors: Labels,
}

impl ScatterData {
    pub fn from_projection(x: &Matrix, labels: &Labels) -> Result<Self> {
        if x.ncols() < 2 {
            return Err(Error::DimensionMismatch {
                expected: 2,
                found: x.ncols(),
            });
        }
        if x.nrows() != labels.len() {
            return Err(Error::DimensionMismatch {
                expected: x.nrows(),
                found: labels.len(),
            });
        }
        Ok(Self {
            coordinates: x.slice(s![.., ..2]).to_owned(),
            colors: labels.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub n_samples: usize,
    pub n_features: usize,
    /// Cumulative explained variance ratio of the full-rank fit.
    pub cumulative_variance: Vector,
    /// Training samples projected onto the retained components.
    pub projection: Matrix,
    pub labels_true: Labels,
    pub comparison: ComparisonReport,
}

impl PipelineReport {
    /// Scatter plots of the projection colored by ground truth and by each
    /// strategy's final assignment.
    pub fn scatter_plots(&self) -> Result<Vec<(&'static str, ScatterData)>> {
        Ok(vec![
            ("ground_truth", ScatterData::from_projection(&self.projection, &self.labels_true)?),
            (
                "agglomerative",
                ScatterData::from_projection(&self.projection, &self.comparison.agglomerative.labels)?,
            ),
            (
                "spectral",
                ScatterData::from_projection(&self.projection, &self.comparison.spectral.labels)?,
            ),
            (
                "kmeans",
                ScatterData::from_projection(&self.projection, &self.comparison.kmeans.labels)?,
            ),
        ])
    }
}

/// Runs the analysis on the training split of `bundle`.
pub fn run_pipeline(bundle: &DatasetBundle, config: &PipelineConfig) -> Result<PipelineReport> {
    let _span = info_span!("pipeline", seed = config.seed).entered();

    let x = flatten(&bundle.train.images)?;
    let labels_true = bundle.train.labels.clone();
    let (n_samples, n_features) = x.dim();
    info!(n_samples, n_features, "flattened training images");

    let mut full = PCA::new();
    full.fit(&x)?;
    let cumulative_variance = full.cumulative_variance_ratio().ok_or(Error::NotFitted)?;
    for threshold in [0.8, 0.9, 0.95] {
        if let Some(k) = full.components_for_variance(threshold) {
            info!(threshold, components = k, "explained variance reached");
        }
    }

    let mut pca = PCA::new().n_components(config.n_components);
    let projection = pca.fit_transform(&x)?;
    if let Some(ratio) = &pca.explained_variance_ratio {
        info!(
            n_components = config.n_components,
            retained = ratio.sum(),
            "projected onto principal components"
        );
    }

    let comparison = compare(&projection, &labels_true, &config.comparison, config.seed)?;

    Ok(PipelineReport {
        n_samples,
        n_features,
        cumulative_variance,
        projection,
        labels_true,
        comparison,
    })
}
