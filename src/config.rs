use crate::cluster::Affinity;

/// Which split supplies the min/max statistics used to rescale pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationReference {
    /// Fit on the training split and apply the same statistics to every split.
    #[default]
    TrainOnly,
    /// Fit each split on its own min/max.
    PerSplit,
}

/// Configuration for turning a raw bundle into a normalized dataset.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Min/max reference used for scaling to [0, 1].
    pub normalization: NormalizationReference,

    /// Keep only the first `n` training samples. `None` keeps all of them.
    pub sample_limit: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            normalization: NormalizationReference::TrainOnly,
            sample_limit: Some(1000),
        }
    }
}

impl LoaderConfig {
    pub fn with_normalization(mut self, normalization: NormalizationReference) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_sample_limit(mut self, sample_limit: Option<usize>) -> Self {
        self.sample_limit = sample_limit;
        self
    }
}

/// Inclusive integer range swept for a single hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRange {
    pub start: usize,
    pub end: usize,

    /// Number of leading candidates that are scored but excluded from the
    /// maximum search.
    pub skip_leading: usize,
}

impl SweepRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            skip_leading: 0,
        }
    }

    pub fn with_skip_leading(mut self, skip_leading: usize) -> Self {
        self.skip_leading = skip_leading;
        self
    }

    pub fn values(&self) -> Vec<usize> {
        (self.start..=self.end).collect()
    }
}

/// Hyperparameters of the three clustering comparisons.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    /// Cluster count for the agglomerative and spectral grids.
    /// `None` uses the number of distinct ground-truth labels.
    pub fixed_clusters: Option<usize>,

    /// Affinity used by the spectral cluster-count sweep.
    pub spectral_affinity: Affinity,

    /// Cluster counts tried by the spectral sweep.
    pub spectral_clusters: SweepRange,

    /// Cluster counts tried by the first k-means sweep.
    pub kmeans_clusters: SweepRange,

    /// Restart counts tried by the second k-means sweep.
    pub kmeans_n_init: SweepRange,

    /// Restarts used while sweeping the k-means cluster count.
    pub kmeans_default_n_init: usize,

    /// Cluster count held fixed during the restart sweep.
    /// `None` uses the winner of the cluster-count sweep.
    pub kmeans_fixed_clusters: Option<usize>,

    /// Evaluate sweep candidates on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            fixed_clusters: None,
            spectral_affinity: Affinity::Laplacian,
            spectral_clusters: SweepRange::new(2, 42).with_skip_leading(4),
            kmeans_clusters: SweepRange::new(2, 42),
            kmeans_n_init: SweepRange::new(10, 99).with_skip_leading(4),
            kmeans_default_n_init: 10,
            kmeans_fixed_clusters: None,
            parallel: false,
        }
    }
}

impl ComparisonConfig {
    pub fn with_fixed_clusters(mut self, n_clusters: usize) -> Self {
        self.fixed_clusters = Some(n_clusters);
        self
    }

    pub fn with_spectral_affinity(mut self, affinity: Affinity) -> Self {
        self.spectral_affinity = affinity;
        self
    }

    pub fn with_spectral_clusters(mut self, range: SweepRange) -> Self {
        self.spectral_clusters = range;
        self
    }

    pub fn with_kmeans_clusters(mut self, range: SweepRange) -> Self {
        self.kmeans_clusters = range;
        self
    }

    pub fn with_kmeans_n_init(mut self, range: SweepRange) -> Self {
        self.kmeans_n_init = range;
        self
    }

    pub fn with_kmeans_default_n_init(mut self, n_init: usize) -> Self {
        self.kmeans_default_n_init = n_init;
        self
    }

    pub fn with_kmeans_fixed_clusters(mut self, n_clusters: usize) -> Self {
        self.kmeans_fixed_clusters = Some(n_clusters);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Top-level configuration for a full analysis run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub loader: LoaderConfig,

    /// Principal components kept for clustering.
    pub n_components: usize,

    pub comparison: ComparisonConfig,

    /// Seed for every randomized step (k-means++ seeding, discretization).
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            n_components: 25,
            comparison: ComparisonConfig::default(),
            seed: 1337,
        }
    }
}

impl PipelineConfig {
    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_n_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }

    pub fn with_comparison(mut self, comparison: ComparisonConfig) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
