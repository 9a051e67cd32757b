use thiserror::Error;

/// Errors produced while loading, reducing, or clustering a dataset.
#[derive(Debug, Error)]
pub enum Error {
    /// The dataset bundle is missing a split or an array has the wrong shape.
    #[error("data format error: {0}")]
    DataFormat(String),

    /// More components were requested than the data can support.
    #[error("insufficient rank: requested {requested} components, but at most {available} are available")]
    InsufficientRank {
        /// Requested number of components.
        requested: usize,
        /// `min(n_samples, n_features)` of the input.
        available: usize,
    },

    /// An iterative solver ran out of iterations before converging.
    #[error("{solver} did not converge within {iterations} iterations")]
    Convergence {
        /// Name of the solver that failed.
        solver: &'static str,
        /// Iteration budget that was exhausted.
        iterations: usize,
    },

    /// Invalid hyperparameter value or combination.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// A model was used before `fit`.
    #[error("model has not been fitted, call fit() first")]
    NotFitted,

    /// Feature count differs from the data the model was fitted on.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Npz(#[from] ndarray_npy::ReadNpzError),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
