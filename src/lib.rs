//! Dimensionality reduction and clustering comparison for labeled image sets.
//!
//! The pipeline loads a bundle of traffic-sign images, rescales and flattens
//! them, projects the samples onto their leading principal components, and
//! compares agglomerative, spectral, and k-means clustering by silhouette
//! score and ground-truth agreement.

pub use ndarray::{Array1, Array2, Array4, ArrayView1, ArrayView2};

pub mod cluster;
pub mod comparison;
pub mod config;
pub mod dataset;
pub mod decomposition;
pub mod error;
mod linalg;
pub mod metrics;
pub mod pipeline;
pub mod preprocessing;

pub use cluster::{
    Affinity, AgglomerativeClustering, AssignLabels, Clusterer, KMeans, Linkage,
    SpectralClustering, NOISE,
};
pub use comparison::{grid_search, sweep, Candidate, SweepOutcome};
pub use config::{ComparisonConfig, LoaderConfig, NormalizationReference, PipelineConfig, SweepRange};
pub use dataset::{flatten, DatasetBundle, RawBundle, Split};
pub use decomposition::PCA;
pub use error::{Error, Result};
pub use metrics::{Distance, QualityReport};
pub use pipeline::{run_pipeline, PipelineReport, ScatterData};
pub use preprocessing::MinMaxScaler;

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;
/// One cluster id (or ground-truth class) per sample.
pub type Labels = Array1<usize>;
