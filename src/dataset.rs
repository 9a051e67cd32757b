use crate::config::{LoaderConfig, NormalizationReference};
use crate::error::{Error, Result};
use crate::preprocessing::MinMaxScaler;
use crate::{Labels, Matrix};
use ndarray::{s, Array1, Array4, ArrayD, Ix4};
use ndarray_npy::NpzReader;
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

const SPLITS: [&str; 3] = ["train", "test", "validation"];

/// Arrays as they come out of the archive: images channel-first
/// (N x C x H x W), any element type already widened to f64/i64.
#[derive(Clone, Debug, Default)]
pub struct RawBundle {
    pub x_train: Option<ArrayD<f64>>,
    pub y_train: Option<ArrayD<i64>>,
    pub x_test: Option<ArrayD<f64>>,
    pub y_test: Option<ArrayD<i64>>,
    pub x_validation: Option<ArrayD<f64>>,
    pub y_validation: Option<ArrayD<i64>>,
    pub label_names: Vec<String>,
}

impl RawBundle {
    /// Reads `x_train`, `y_train`, `x_test`, `y_test`, `x_validation` and
    /// `y_validation` from an `.npz` archive. Missing members are left as
    /// `None` and reported by [`DatasetBundle::from_raw`].
    ///
    /// Label names are read from `label_names.csv` next to the archive when
    /// it exists.
    pub fn from_npz(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut npz = NpzReader::new(File::open(path)?)?;
        let names = npz.names()?;
        debug!(?names, "opened dataset archive");

        let mut raw = RawBundle::default();
        for split in SPLITS {
            let images = match member(&names, &format!("x_{split}")) {
                Some(name) => Some(read_images(&mut npz, &name)?),
                None => None,
            };
            let labels = match member(&names, &format!("y_{split}")) {
                Some(name) => Some(read_labels(&mut npz, &name)?),
                None => None,
            };
            match split {
                "train" => (raw.x_train, raw.y_train) = (images, labels),
                "test" => (raw.x_test, raw.y_test) = (images, labels),
                _ => (raw.x_validation, raw.y_validation) = (images, labels),
            }
        }

        let sidecar = path.with_file_name("label_names.csv");
        if sidecar.exists() {
            raw.label_names = parse_label_names(&fs::read_to_string(&sidecar)?)?;
        }

        Ok(raw)
    }
}

fn member(names: &[String], key: &str) -> Option<String> {
    names
        .iter()
        .find(|name| name.as_str() == key || name.strip_suffix(".npy") == Some(key))
        .cloned()
}

fn read_images(npz: &mut NpzReader<File>, name: &str) -> Result<ArrayD<f64>> {
    let wide: std::result::Result<ArrayD<f64>, _> = npz.by_name(name);
    if let Ok(images) = wide {
        return Ok(images);
    }
    let images: ArrayD<f32> = npz.by_name(name)?;
    Ok(images.mapv(f64::from))
}

fn read_labels(npz: &mut NpzReader<File>, name: &str) -> Result<ArrayD<i64>> {
    let wide: std::result::Result<ArrayD<i64>, _> = npz.by_name(name);
    if let Ok(labels) = wide {
        return Ok(labels);
    }
    let narrow: std::result::Result<ArrayD<i32>, _> = npz.by_name(name);
    if let Ok(labels) = narrow {
        return Ok(labels.mapv(i64::from));
    }
    let labels: ArrayD<u8> = npz.by_name(name)?;
    Ok(labels.mapv(i64::from))
}

/// Parses `id,name` lines; a non-numeric first line is taken as a header.
fn parse_label_names(text: &str) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (id, name) = line.split_once(',').ok_or_else(|| {
            Error::DataFormat(format!("label_names.csv line {}: expected `id,name`", lineno + 1))
        })?;
        let id: usize = match id.trim().parse() {
            Ok(id) => id,
            Err(_) if lineno == 0 => continue,
            Err(_) => {
                return Err(Error::DataFormat(format!(
                    "label_names.csv line {}: invalid class id {:?}",
                    lineno + 1,
                    id
                )));
            }
        };
        if names.len() <= id {
            names.resize(id + 1, String::new());
        }
        names[id] = name.trim().to_string();
    }
    Ok(names)
}

/// One split of the dataset: channel-last images and their class ids.
#[derive(Clone, Debug)]
pub struct Split {
    /// N x H x W x C, standard layout.
    pub images: Array4<f64>,
    pub labels: Labels,
}

impl Split {
    pub fn new(images: Array4<f64>, labels: Labels) -> Result<Self> {
        if images.shape()[0] != labels.len() {
            return Err(Error::DataFormat(format!(
                "{} images but {} labels",
                images.shape()[0],
                labels.len()
            )));
        }
        Ok(Self { images, labels })
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// `(height, width, channels)`
    pub fn image_shape(&self) -> (usize, usize, usize) {
        let shape = self.images.shape();
        (shape[1], shape[2], shape[3])
    }

    /// The first `n` samples (all of them if there are fewer).
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.n_samples());
        Self {
            images: self.images.slice(s![..n, .., .., ..]).to_owned(),
            labels: self.labels.slice(s![..n]).to_owned(),
        }
    }

    /// Number of distinct class ids.
    pub fn n_classes(&self) -> usize {
        let mut classes = self.labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        classes.len()
    }
}

/// Normalized train/test/validation splits plus the class-name table.
#[derive(Clone, Debug)]
pub struct DatasetBundle {
    pub train: Split,
    pub test: Split,
    pub validation: Split,
    pub label_names: Vec<String>,
}

impl DatasetBundle {
    /// Validates, reorders to channel-last and rescales a raw bundle.
    pub fn from_raw(raw: RawBundle, config: &LoaderConfig) -> Result<Self> {
        let RawBundle {
            x_train,
            y_train,
            x_test,
            y_test,
            x_validation,
            y_validation,
            label_names,
        } = raw;

        let mut train = to_split("train", x_train, y_train)?;
        let mut test = to_split("test", x_test, y_test)?;
        let mut validation = to_split("validation", x_validation, y_validation)?;

        let mut scaler = MinMaxScaler::new();
        scaler.fit(&train.images)?;
        if let Some((min, max)) = scaler.statistics() {
            info!(min, max, "training split pixel range");
        }

        match config.normalization {
            NormalizationReference::TrainOnly => {
                scaler.transform_inplace(&mut train.images)?;
                scaler.transform_inplace(&mut test.images)?;
                scaler.transform_inplace(&mut validation.images)?;
            }
            NormalizationReference::PerSplit => {
                scaler.transform_inplace(&mut train.images)?;
                MinMaxScaler::new().fit_transform_inplace(&mut test.images)?;
                MinMaxScaler::new().fit_transform_inplace(&mut validation.images)?;
            }
        }

        // Statistics come from the whole training split, not the retained head
        if let Some(limit) = config.sample_limit {
            train = train.head(limit);
        }

        info!(
            train = train.n_samples(),
            test = test.n_samples(),
            validation = validation.n_samples(),
            image_shape = ?train.image_shape(),
            "loaded dataset"
        );

        Ok(Self {
            train,
            test,
            validation,
            label_names,
        })
    }
}

fn to_split(name: &str, images: Option<ArrayD<f64>>, labels: Option<ArrayD<i64>>) -> Result<Split> {
    let images = images.ok_or_else(|| Error::DataFormat(format!("missing x_{name}")))?;
    let labels = labels.ok_or_else(|| Error::DataFormat(format!("missing y_{name}")))?;

    if images.ndim() != 4 {
        return Err(Error::DataFormat(format!(
            "x_{name} must have rank 4 (sample, channel, height, width), got shape {:?}",
            images.shape()
        )));
    }
    if labels.ndim() != 1 {
        return Err(Error::DataFormat(format!(
            "y_{name} must have rank 1, got shape {:?}",
            labels.shape()
        )));
    }

    let images = images
        .into_dimensionality::<Ix4>()
        .map_err(|e| Error::DataFormat(e.to_string()))?
        .permuted_axes([0, 2, 3, 1])
        .as_standard_layout()
        .into_owned();

    let labels = labels
        .iter()
        .map(|&l| {
            usize::try_from(l)
                .map_err(|_| Error::DataFormat(format!("y_{name} contains negative label {l}")))
        })
        .collect::<Result<Vec<usize>>>()?;

    Split::new(images, Array1::from(labels))
}

/// Reshapes N images into an N x (H*W*C) matrix, row `i` being the
/// row-major flattening of image `i`.
pub fn flatten(images: &Array4<f64>) -> Result<Matrix> {
    let n = images.shape()[0];
    let features: usize = images.shape()[1..].iter().product();
    images
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((n, features))
        .map_err(|e| Error::DataFormat(e.to_string()))
}

/// Gaussian blobs of `n_per_blob` samples around each row of `centers`.
///
/// Samples are grouped by blob; the returned labels are the row index of
/// the generating center.
pub fn make_blobs<R: Rng + ?Sized>(
    n_per_blob: usize,
    centers: &Matrix,
    std_dev: f64,
    rng: &mut R,
) -> Result<(Matrix, Labels)> {
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| Error::invalid("std_dev", e.to_string()))?;
    let n_blobs = centers.nrows();
    let n_features = centers.ncols();

    let mut samples = Matrix::random_using((n_blobs * n_per_blob, n_features), normal, rng);
    let mut labels = Labels::zeros(n_blobs * n_per_blob);
    for (blob, center) in centers.outer_iter().enumerate() {
        let rows = blob * n_per_blob..(blob + 1) * n_per_blob;
        let mut block = samples.slice_mut(s![rows.clone(), ..]);
        block += &center;
        labels.slice_mut(s![rows]).fill(blob);
    }

    Ok((samples, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn channel_first(n: usize) -> ArrayD<f64> {
        // N x C x H x W = n x 3 x 2 x 2
        Array::from_shape_fn(IxDyn(&[n, 3, 2, 2]), |idx| {
            (idx[0] * 100 + idx[1] * 10 + idx[2] * 2 + idx[3]) as f64
        })
    }

    fn raw_bundle(n: usize) -> RawBundle {
        let labels = ArrayD::from_shape_fn(IxDyn(&[n]), |idx| (idx[0] % 3) as i64);
        RawBundle {
            x_train: Some(channel_first(n)),
            y_train: Some(labels.clone()),
            x_test: Some(channel_first(n)),
            y_test: Some(labels.clone()),
            x_validation: Some(channel_first(n)),
            y_validation: Some(labels),
            label_names: vec!["stop".into(), "yield".into(), "speed".into()],
        }
    }

    #[test]
    fn test_channel_last_and_scaled() {
        let bundle = DatasetBundle::from_raw(raw_bundle(4), &LoaderConfig::default()).unwrap();
        assert_eq!(bundle.train.images.shape(), &[4, 2, 2, 3]);

        let min = bundle.train.images.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = bundle.train.images.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);

        // Pixel (h=1, w=0) of channel 2 in sample 0 was 10*2 + 2*1 = 22
        let raw_max = 3.0 * 100.0 + 2.0 * 10.0 + 2.0 + 1.0;
        assert!((bundle.train.images[[0, 1, 0, 2]] - 22.0 / raw_max).abs() < 1e-12);
    }

    #[test]
    fn test_train_statistics_applied_to_other_splits() {
        let mut raw = raw_bundle(4);
        raw.x_test = Some(channel_first(8));
        raw.y_test = Some(ArrayD::zeros(IxDyn(&[8])));

        let bundle = DatasetBundle::from_raw(raw.clone(), &LoaderConfig::default()).unwrap();
        let test_max = bundle.test.images.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(test_max > 1.0);

        let config = LoaderConfig::default().with_normalization(NormalizationReference::PerSplit);
        let bundle = DatasetBundle::from_raw(raw, &config).unwrap();
        let test_max = bundle.test.images.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(test_max, 1.0);
    }

    #[test]
    fn test_missing_split() {
        let mut raw = raw_bundle(4);
        raw.y_validation = None;
        let err = DatasetBundle::from_raw(raw, &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DataFormat(msg) if msg.contains("y_validation")));
    }

    #[test]
    fn test_wrong_rank() {
        let mut raw = raw_bundle(4);
        raw.x_train = Some(ArrayD::zeros(IxDyn(&[4, 12])));
        assert!(matches!(
            DatasetBundle::from_raw(raw, &LoaderConfig::default()),
            Err(Error::DataFormat(_))
        ));
    }

    #[test]
    fn test_label_count_mismatch() {
        let mut raw = raw_bundle(4);
        raw.y_train = Some(ArrayD::zeros(IxDyn(&[3])));
        assert!(DatasetBundle::from_raw(raw, &LoaderConfig::default()).is_err());
    }

    #[test]
    fn test_sample_limit() {
        let config = LoaderConfig::default().with_sample_limit(Some(2));
        let bundle = DatasetBundle::from_raw(raw_bundle(5), &config).unwrap();
        assert_eq!(bundle.train.n_samples(), 2);
        assert_eq!(bundle.test.n_samples(), 5);
    }

    #[test]
    fn test_sample_limit_keeps_full_split_statistics() {
        // The largest raw pixel belongs to sample 4, past the limit
        let config = LoaderConfig::default().with_sample_limit(Some(2));
        let bundle = DatasetBundle::from_raw(raw_bundle(5), &config).unwrap();

        let raw_max = 4.0 * 100.0 + 2.0 * 10.0 + 2.0 + 1.0;
        let kept_max = 1.0 * 100.0 + 2.0 * 10.0 + 2.0 + 1.0;
        let train_max = bundle.train.images.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((train_max - kept_max / raw_max).abs() < 1e-12);

        let test_max = bundle.test.images.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((test_max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_flatten_row_major() {
        let images = Array4::from_shape_fn((2, 2, 2, 3), |(n, h, w, c)| {
            (n * 1000 + h * 100 + w * 10 + c) as f64
        });
        let flat = flatten(&images).unwrap();
        assert_eq!(flat.shape(), &[2, 12]);
        assert_eq!(flat[[1, 0]], 1000.0);
        assert_eq!(flat[[0, 3]], 10.0);
        assert_eq!(flat[[0, 11]], 112.0);
    }

    #[test]
    fn test_flatten_permuted_view() {
        let images = Array4::from_shape_fn((2, 3, 2, 2), |(n, c, h, w)| {
            (n * 1000 + c * 100 + h * 10 + w) as f64
        });
        let permuted = images.permuted_axes([0, 2, 3, 1]);
        let flat = flatten(&permuted).unwrap();
        // First row: (h=0, w=0, c=0..3), then (h=0, w=1, ...)
        assert_eq!(flat.row(0).to_vec()[..4], [0.0, 100.0, 200.0, 1.0]);
    }

    #[test]
    fn test_label_names() {
        let names = parse_label_names("ClassId,SignName\n0,Speed limit\n2,Stop\n").unwrap();
        assert_eq!(names, vec!["Speed limit".to_string(), String::new(), "Stop".to_string()]);
        assert!(parse_label_names("0,ok\nx,bad\n").is_err());
    }

    #[test]
    fn test_make_blobs() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let centers = ndarray::array![[0.0, 0.0], [100.0, 100.0]];
        let (x, y) = make_blobs(10, &centers, 0.1, &mut rng).unwrap();
        assert_eq!(x.shape(), &[20, 2]);
        assert_eq!(y[0], 0);
        assert_eq!(y[19], 1);
        assert!(x[[15, 0]] > 90.0);
    }
}
