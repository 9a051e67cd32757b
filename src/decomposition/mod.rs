//! Dimensionality reduction.
//!
//! `PCA` projects flattened images onto their leading principal axes. The
//! pipeline fits it twice: once at full rank to inspect the cumulative
//! explained variance, then truncated to the chosen number of components.
//!
//! # Examples
//!
//! ```rust
//! use signclust::PCA;
//! use ndarray::array;
//!
//! let x = array![
//!     [1.0, 2.0, 3.0],
//!     [4.0, 5.0, 6.5],
//!     [7.0, 8.0, 9.0],
//!     [2.0, 1.0, 0.0]
//! ];
//!
//! let mut pca = PCA::new().n_components(2);
//! let transformed = pca.fit_transform(&x).unwrap();
//! assert_eq!(transformed.ncols(), 2);
//!
//! let cumulative = pca.cumulative_variance_ratio().unwrap();
//! println!("Cumulative explained variance: {:?}", cumulative);
//! ```

mod pca;

pub use pca::PCA;
