//! Silhouette-scored hyperparameter selection and the three strategy
//! comparisons run by the pipeline.
//!
//! Every candidate is fitted on the whole dataset and scored with the
//! Euclidean silhouette. The pairwise distances are computed once per
//! sweep and shared by all candidates.

use crate::cluster::{
    Affinity, AgglomerativeClustering, AssignLabels, Clusterer, KMeans, Linkage,
    SpectralClustering,
};
use crate::config::{ComparisonConfig, SweepRange};
use crate::error::{Error, Result};
use crate::metrics::{silhouette_precomputed, Distance, DistanceMatrix, QualityReport};
use crate::{Labels, Matrix};
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, info_span};

/// Linkages searched by the agglomerative grid. Ward is left out because
/// it only accepts Euclidean distances.
const GRID_LINKAGES: [Linkage; 3] = [Linkage::Complete, Linkage::Average, Linkage::Single];

/// One scored hyperparameter setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<P> {
    pub params: P,
    /// Cluster count the fitted model was asked for.
    pub n_clusters: usize,
    pub score: f64,
}

/// Every candidate of a sweep in enumeration order, plus the winner.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome<P> {
    pub candidates: Vec<Candidate<P>>,
    /// Index into `candidates` of the selected setting.
    pub best: usize,
}

impl<P> SweepOutcome<P> {
    pub fn best(&self) -> &Candidate<P> {
        &self.candidates[self.best]
    }

    pub fn best_params(&self) -> &P {
        &self.best().params
    }

    pub fn scores(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.score).collect()
    }
}

/// Scores every setting in `grid` (a flattened Cartesian product, in
/// enumeration order) and keeps the first one with the highest score.
pub fn grid_search<P, C, F>(
    grid: Vec<P>,
    build: F,
    x: &Matrix,
    config: &ComparisonConfig,
) -> Result<SweepOutcome<P>>
where
    P: Send + Sync,
    C: Clusterer,
    F: Fn(&P) -> C + Sync,
{
    evaluate(grid, 0, build, x, config.parallel)
}

/// Scores every value of `range`. The first `range.skip_leading` values
/// are scored and reported but never selected.
pub fn sweep<C, F>(
    range: SweepRange,
    build: F,
    x: &Matrix,
    config: &ComparisonConfig,
) -> Result<SweepOutcome<usize>>
where
    C: Clusterer,
    F: Fn(usize) -> C + Sync,
{
    evaluate(range.values(), range.skip_leading, |&v| build(v), x, config.parallel)
}

fn evaluate<P, C, F>(
    params: Vec<P>,
    skip_leading: usize,
    build: F,
    x: &Matrix,
    parallel: bool,
) -> Result<SweepOutcome<P>>
where
    P: Send + Sync,
    C: Clusterer,
    F: Fn(&P) -> C + Sync,
{
    if skip_leading >= params.len() {
        return Err(Error::invalid(
            "skip_leading",
            format!(
                "{} leading candidates skipped out of {}, nothing left to select",
                skip_leading,
                params.len()
            ),
        ));
    }

    let distances = DistanceMatrix::new(x, Distance::Euclidean);
    let score = |index: usize, p: &P| -> Result<(usize, f64)> {
        let mut model = build(p);
        let n_clusters = model.n_clusters();
        let labels = model.fit_predict(x)?;
        let score = silhouette_precomputed(&distances, &labels)?;
        debug!(candidate = index, n_clusters, score, "scored candidate");
        Ok((n_clusters, score))
    };

    let scored: Vec<(usize, f64)> = if parallel {
        params
            .par_iter()
            .enumerate()
            .map(|(i, p)| score(i, p))
            .collect::<Result<_>>()?
    } else {
        params
            .iter()
            .enumerate()
            .map(|(i, p)| score(i, p))
            .collect::<Result<_>>()?
    };

    let mut best = skip_leading;
    for (i, &(_, s)) in scored.iter().enumerate().skip(skip_leading + 1) {
        if s > scored[best].1 {
            best = i;
        }
    }

    let candidates = params
        .into_iter()
        .zip(scored)
        .map(|(params, (n_clusters, score))| Candidate {
            params,
            n_clusters,
            score,
        })
        .collect();

    Ok(SweepOutcome { candidates, best })
}

/// Agglomerative grid over distance × linkage and the final evaluation.
#[derive(Debug, Clone)]
pub struct AgglomerativeComparison {
    pub n_clusters: usize,
    pub grid: SweepOutcome<(Distance, Linkage)>,
    pub labels: Labels,
    pub report: QualityReport,
}

/// Spectral grid over affinity × label assignment, the cluster-count
/// sweep, and the final evaluation at the swept count.
#[derive(Debug, Clone)]
pub struct SpectralComparison {
    pub grid: SweepOutcome<(Affinity, AssignLabels)>,
    pub affinity: Affinity,
    pub cluster_sweep: SweepOutcome<usize>,
    pub labels: Labels,
    pub report: QualityReport,
}

/// The two independent k-means sweeps and the final evaluation.
#[derive(Debug, Clone)]
pub struct KMeansComparison {
    pub cluster_sweep: SweepOutcome<usize>,
    pub n_clusters: usize,
    pub n_init_sweep: SweepOutcome<usize>,
    pub labels: Labels,
    pub report: QualityReport,
}

#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub agglomerative: AgglomerativeComparison,
    pub spectral: SpectralComparison,
    pub kmeans: KMeansComparison,
}

/// Cluster count for the fixed-count grids.
fn fixed_clusters(labels_true: &Labels, config: &ComparisonConfig) -> usize {
    config
        .fixed_clusters
        .unwrap_or_else(|| crate::cluster::count_clusters(labels_true))
}

fn check_inputs(x: &Matrix, labels_true: &Labels) -> Result<()> {
    if x.nrows() != labels_true.len() {
        return Err(Error::DimensionMismatch {
            expected: x.nrows(),
            found: labels_true.len(),
        });
    }
    Ok(())
}

pub fn compare_agglomerative(
    x: &Matrix,
    labels_true: &Labels,
    config: &ComparisonConfig,
) -> Result<AgglomerativeComparison> {
    check_inputs(x, labels_true)?;
    let _span = info_span!("agglomerative").entered();
    let n_clusters = fixed_clusters(labels_true, config);

    let grid: Vec<(Distance, Linkage)> = Distance::ALL
        .iter()
        .flat_map(|&d| GRID_LINKAGES.iter().map(move |&l| (d, l)))
        .collect();
    let grid = grid_search(
        grid,
        |&(distance, linkage)| {
            AgglomerativeClustering::new(n_clusters)
                .distance(distance)
                .linkage(linkage)
        },
        x,
        config,
    )?;

    let &(distance, linkage) = grid.best_params();
    info!(
        distance = distance.name(),
        linkage = linkage.name(),
        score = grid.best().score,
        "best agglomerative parameters"
    );

    let labels = AgglomerativeClustering::new(n_clusters)
        .distance(distance)
        .linkage(linkage)
        .fit_predict(x)?;
    let report = QualityReport::evaluate(x, labels_true, &labels)?;

    Ok(AgglomerativeComparison {
        n_clusters,
        grid,
        labels,
        report,
    })
}

pub fn compare_spectral(
    x: &Matrix,
    labels_true: &Labels,
    config: &ComparisonConfig,
    seed: u64,
) -> Result<SpectralComparison> {
    check_inputs(x, labels_true)?;
    let _span = info_span!("spectral").entered();
    let n_clusters = fixed_clusters(labels_true, config);

    let grid: Vec<(Affinity, AssignLabels)> = Affinity::ALL
        .iter()
        .flat_map(|&a| AssignLabels::ALL.iter().map(move |&l| (a, l)))
        .collect();
    let grid = grid_search(
        grid,
        |&(affinity, assign)| {
            SpectralClustering::new(n_clusters)
                .affinity(affinity)
                .assign_labels(assign)
                .random_state(seed)
        },
        x,
        config,
    )?;
    let &(best_affinity, best_assign) = grid.best_params();
    info!(
        affinity = best_affinity.name(),
        assign_labels = best_assign.name(),
        score = grid.best().score,
        "best spectral parameters"
    );

    let affinity = config.spectral_affinity;
    let cluster_sweep = sweep(
        config.spectral_clusters,
        |k| {
            SpectralClustering::new(k)
                .affinity(affinity)
                .random_state(seed)
        },
        x,
        config,
    )?;
    let k = *cluster_sweep.best_params();
    info!(
        affinity = affinity.name(),
        n_clusters = k,
        score = cluster_sweep.best().score,
        "best spectral cluster count"
    );

    let labels = SpectralClustering::new(k)
        .affinity(affinity)
        .random_state(seed)
        .fit_predict(x)?;
    let report = QualityReport::evaluate(x, labels_true, &labels)?;

    Ok(SpectralComparison {
        grid,
        affinity,
        cluster_sweep,
        labels,
        report,
    })
}

pub fn compare_kmeans(
    x: &Matrix,
    labels_true: &Labels,
    config: &ComparisonConfig,
    seed: u64,
) -> Result<KMeansComparison> {
    check_inputs(x, labels_true)?;
    let _span = info_span!("kmeans").entered();

    let default_n_init = config.kmeans_default_n_init;
    let cluster_sweep = sweep(
        config.kmeans_clusters,
        |k| KMeans::new(k).n_init(default_n_init).random_state(seed),
        x,
        config,
    )?;
    info!(
        n_clusters = *cluster_sweep.best_params(),
        score = cluster_sweep.best().score,
        "best k-means cluster count"
    );

    let n_clusters = config
        .kmeans_fixed_clusters
        .unwrap_or(*cluster_sweep.best_params());
    let n_init_sweep = sweep(
        config.kmeans_n_init,
        |n_init| KMeans::new(n_clusters).n_init(n_init).random_state(seed),
        x,
        config,
    )?;
    let n_init = *n_init_sweep.best_params();
    info!(
        n_clusters,
        n_init,
        score = n_init_sweep.best().score,
        "best k-means restart count"
    );

    let labels = KMeans::new(n_clusters)
        .n_init(n_init)
        .random_state(seed)
        .fit_predict(x)?;
    let report = QualityReport::evaluate_extended(x, labels_true, &labels)?;

    Ok(KMeansComparison {
        cluster_sweep,
        n_clusters,
        n_init_sweep,
        labels,
        report,
    })
}

/// Runs the three strategies one after another on the same projection.
pub fn compare(
    x: &Matrix,
    labels_true: &Labels,
    config: &ComparisonConfig,
    seed: u64,
) -> Result<ComparisonReport> {
    Ok(ComparisonReport {
        agglomerative: compare_agglomerative(x, labels_true, config)?,
        spectral: compare_spectral(x, labels_true, config, seed)?,
        kmeans: compare_kmeans(x, labels_true, config, seed)?,
    })
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (distance, linkage) = self.agglomerative.grid.best_params();
        writeln!(
            f,
            "Agglomerative ({} clusters, {} distance, {} linkage)",
            self.agglomerative.n_clusters,
            distance.name(),
            linkage.name()
        )?;
        writeln!(f, "{}", self.agglomerative.report)?;

        let (affinity, assign) = self.spectral.grid.best_params();
        writeln!(
            f,
            "Spectral grid winner: {} affinity, {} labels",
            affinity.name(),
            assign.name()
        )?;
        writeln!(
            f,
            "Spectral ({} clusters, {} affinity)",
            self.spectral.cluster_sweep.best_params(),
            self.spectral.affinity.name()
        )?;
        writeln!(f, "{}", self.spectral.report)?;

        writeln!(
            f,
            "K-Means ({} clusters, n_init {})",
            self.kmeans.n_clusters,
            self.kmeans.n_init_sweep.best_params()
        )?;
        write!(f, "{}", self.kmeans.report)
    }
}
