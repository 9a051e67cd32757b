use ndarray::{array, Array2, ArrayD, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use signclust::comparison::compare_kmeans;
use signclust::dataset::make_blobs;
use signclust::metrics::{silhouette_score, Distance};
use signclust::{
    flatten, run_pipeline, ComparisonConfig, DatasetBundle, Error, KMeans, LoaderConfig,
    PipelineConfig, QualityReport, RawBundle, SweepRange, PCA,
};

/// `n_per_class` noisy copies of `n_classes` random images, channel-first.
fn synthetic_split(
    n_classes: usize,
    n_per_class: usize,
    (channels, height, width): (usize, usize, usize),
    rng: &mut ChaCha8Rng,
) -> (ArrayD<f64>, ArrayD<i64>) {
    let features = channels * height * width;
    let centers = Array2::random_using((n_classes, features), Uniform::new(0.0, 255.0), rng);
    let (samples, labels) = make_blobs(n_per_class, &centers, 5.0, rng).unwrap();
    let images = samples
        .into_shape_with_order(IxDyn(&[n_classes * n_per_class, channels, height, width]))
        .unwrap();
    let labels = labels.mapv(|l| l as i64).into_dyn();
    (images, labels)
}

fn synthetic_bundle(n_classes: usize, n_per_class: usize, shape: (usize, usize, usize)) -> RawBundle {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let (x_train, y_train) = synthetic_split(n_classes, n_per_class, shape, &mut rng);
    let (x_test, y_test) = synthetic_split(n_classes, 2, shape, &mut rng);
    let (x_validation, y_validation) = synthetic_split(n_classes, 2, shape, &mut rng);
    RawBundle {
        x_train: Some(x_train),
        y_train: Some(y_train),
        x_test: Some(x_test),
        y_test: Some(y_test),
        x_validation: Some(x_validation),
        y_validation: Some(y_validation),
        label_names: Vec::new(),
    }
}

#[test]
fn test_two_blobs_kmeans_quality() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let centers = array![[0.0, 0.0], [20.0, 20.0]];
    let (x, y) = make_blobs(50, &centers, 1.0, &mut rng).unwrap();

    let labels = KMeans::new(2).random_state(1337).fit_predict(&x).unwrap();
    let report = QualityReport::evaluate(&x, &y, &labels).unwrap();

    assert!(report.silhouette > 0.9, "silhouette {}", report.silhouette);
    assert!((report.adjusted_rand - 1.0).abs() < 1e-12);
    assert!((report.v_measure - 1.0).abs() < 1e-12);
}

#[test]
fn test_single_cluster_scores_sentinel() {
    let x = array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]];
    let labels = array![0, 0, 0];
    for distance in Distance::ALL {
        assert_eq!(silhouette_score(&x, &labels, distance).unwrap(), -1.0);
    }
}

#[test]
fn test_kmeans_sweep_finds_ten_classes() {
    let raw = synthetic_bundle(10, 100, (3, 8, 8));
    let bundle = DatasetBundle::from_raw(raw, &LoaderConfig::default()).unwrap();
    assert_eq!(bundle.train.n_samples(), 1000);
    assert_eq!(bundle.train.image_shape(), (8, 8, 3));

    let x = flatten(&bundle.train.images).unwrap();
    let projection = PCA::new().n_components(25).fit_transform(&x).unwrap();
    assert_eq!(projection.shape(), &[1000, 25]);

    let config = ComparisonConfig::default()
        .with_kmeans_default_n_init(3)
        .with_kmeans_n_init(SweepRange::new(1, 2));
    let result = compare_kmeans(&projection, &bundle.train.labels, &config, 1337).unwrap();

    let chosen = *result.cluster_sweep.best_params();
    assert!((9..=11).contains(&chosen), "selected {} clusters", chosen);
    assert_eq!(result.cluster_sweep.candidates.len(), 41);
}

#[test]
fn test_full_pipeline_small() {
    let raw = synthetic_bundle(3, 20, (3, 4, 4));
    let config = PipelineConfig::default()
        .with_n_components(5)
        .with_comparison(
            ComparisonConfig::default()
                .with_spectral_clusters(SweepRange::new(2, 6).with_skip_leading(1))
                .with_kmeans_clusters(SweepRange::new(2, 6))
                .with_kmeans_n_init(SweepRange::new(1, 3))
                .with_kmeans_default_n_init(2),
        );
    let bundle = DatasetBundle::from_raw(raw, &config.loader).unwrap();

    let report = run_pipeline(&bundle, &config).unwrap();

    assert_eq!(report.n_samples, 60);
    assert_eq!(report.n_features, 48);
    assert_eq!(report.projection.shape(), &[60, 5]);
    let last = report.cumulative_variance[report.cumulative_variance.len() - 1];
    assert!((last - 1.0).abs() < 1e-8);

    let comparison = &report.comparison;
    assert_eq!(comparison.agglomerative.n_clusters, 3);
    assert!((comparison.agglomerative.report.adjusted_rand - 1.0).abs() < 1e-12);
    assert_eq!(comparison.spectral.grid.candidates.len(), 10);
    assert_eq!(comparison.spectral.cluster_sweep.candidates.len(), 5);
    assert_eq!(comparison.kmeans.n_clusters, 3);
    assert!(comparison.kmeans.report.extended.is_some());

    let plots = report.scatter_plots().unwrap();
    assert_eq!(plots.len(), 4);
    assert_eq!(plots[0].1.coordinates.shape(), &[60, 2]);
}

#[test]
fn test_pipeline_is_deterministic() {
    let config = PipelineConfig::default()
        .with_n_components(4)
        .with_comparison(
            ComparisonConfig::default()
                .with_spectral_clusters(SweepRange::new(2, 4))
                .with_kmeans_clusters(SweepRange::new(2, 4))
                .with_kmeans_n_init(SweepRange::new(1, 2)),
        );
    let a = DatasetBundle::from_raw(synthetic_bundle(3, 10, (3, 2, 2)), &config.loader).unwrap();
    let b = DatasetBundle::from_raw(synthetic_bundle(3, 10, (3, 2, 2)), &config.loader).unwrap();

    let first = run_pipeline(&a, &config).unwrap();
    let second = run_pipeline(&b, &config).unwrap();
    assert_eq!(first.projection, second.projection);
    assert_eq!(first.comparison.kmeans.labels, second.comparison.kmeans.labels);
    assert_eq!(first.comparison.spectral.labels, second.comparison.spectral.labels);
}

#[test]
fn test_missing_split_is_data_format_error() {
    let mut raw = synthetic_bundle(2, 5, (3, 2, 2));
    raw.x_validation = None;
    assert!(matches!(
        DatasetBundle::from_raw(raw, &LoaderConfig::default()),
        Err(Error::DataFormat(_))
    ));
}

#[test]
fn test_wrong_rank_is_data_format_error() {
    let mut raw = synthetic_bundle(2, 5, (3, 2, 2));
    raw.x_train = Some(ArrayD::zeros(IxDyn(&[10, 12])));
    assert!(matches!(
        DatasetBundle::from_raw(raw, &LoaderConfig::default()),
        Err(Error::DataFormat(_))
    ));
}

#[test]
fn test_too_many_components() {
    let raw = synthetic_bundle(2, 5, (3, 2, 2));
    let config = PipelineConfig::default().with_n_components(50);
    let bundle = DatasetBundle::from_raw(raw, &config.loader).unwrap();
    assert!(matches!(
        run_pipeline(&bundle, &config),
        Err(Error::InsufficientRank { requested: 50, available: 10 })
    ));
}

#[test]
fn test_exhausted_iterations_are_reported() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let centers = array![[0.0, 0.0], [5.0, 5.0]];
    let (x, _) = make_blobs(10, &centers, 1.0, &mut rng).unwrap();
    assert!(matches!(
        KMeans::new(2).max_iter(0).fit(&x),
        Err(Error::Convergence { .. })
    ));
}
