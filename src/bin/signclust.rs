use ndarray_npy::WriteNpyExt;
use signclust::{run_pipeline, DatasetBundle, PipelineConfig, RawBundle};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let Some(bundle_path) = args.next() else {
        eprintln!("usage: signclust <bundle.npz> [output_dir]");
        std::process::exit(2);
    };
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let config = PipelineConfig::default();

    println!("=== Traffic Sign Clustering ===\n");
    let raw = RawBundle::from_npz(&bundle_path)?;
    let bundle = DatasetBundle::from_raw(raw, &config.loader)?;

    let (height, width, channels) = bundle.train.image_shape();
    println!(
        "Train: {} images of {}x{}x{}, {} classes",
        bundle.train.n_samples(),
        height,
        width,
        channels,
        bundle.train.n_classes()
    );
    for (id, name) in bundle.label_names.iter().enumerate() {
        if !name.is_empty() {
            println!("  {:>3}: {}", id, name);
        }
    }

    let report = run_pipeline(&bundle, &config)?;

    println!("\n=== Explained Variance ===");
    for (i, c) in report.cumulative_variance.iter().enumerate().take(config.n_components) {
        println!("  {:>3} components: {:.4}", i + 1, c);
    }

    println!("\n=== Results ===");
    println!("{}", report.comparison);

    println!("\n=== Silhouette Sweeps ===");
    print_sweep("Spectral cluster count", &report.comparison.spectral.cluster_sweep);
    print_sweep("K-Means cluster count", &report.comparison.kmeans.cluster_sweep);
    print_sweep("K-Means n_init", &report.comparison.kmeans.n_init_sweep);

    fs::create_dir_all(&output_dir)?;
    for (name, scatter) in report.scatter_plots()? {
        let coordinates = output_dir.join(format!("{name}_coordinates.npy"));
        scatter
            .coordinates
            .write_npy(BufWriter::new(File::create(&coordinates)?))?;
        let colors = output_dir.join(format!("{name}_colors.npy"));
        scatter
            .colors
            .mapv(|c| c as u64)
            .write_npy(BufWriter::new(File::create(&colors)?))?;
    }
    println!("\nScatter data written to {}", output_dir.display());

    Ok(())
}

fn print_sweep(title: &str, outcome: &signclust::SweepOutcome<usize>) {
    println!("{} (best = {}):", title, outcome.best_params());
    for candidate in &outcome.candidates {
        println!("  {:>3}: {:.4}", candidate.params, candidate.score);
    }
}
