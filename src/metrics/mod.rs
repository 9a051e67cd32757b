//! Cluster quality metrics.
//!
//! - Internal: [`silhouette_score`], computed from the data and the assignment only.
//! - External: agreement with ground-truth classes, see [`agreement`].
//!
//! # Example
//! ```rust
//! use signclust::metrics::{silhouette_score, adjusted_rand_score, Distance};
//! use ndarray::array;
//!
//! let x = array![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]];
//! let truth = array![0, 0, 1, 1];
//! let pred = array![1, 1, 0, 0];
//!
//! let silhouette = silhouette_score(&x, &pred, Distance::Euclidean).unwrap();
//! assert!(silhouette > 0.9);
//! assert_eq!(adjusted_rand_score(&truth, &pred).unwrap(), 1.0);
//! ```

pub mod agreement;
mod distance;
mod silhouette;

pub use agreement::{
    adjusted_mutual_info_score, adjusted_rand_score, completeness_score, fowlkes_mallows_score,
    homogeneity_completeness_v_measure,
};
pub use distance::{Distance, DistanceMatrix};
pub use silhouette::{silhouette_precomputed, silhouette_score, DEGENERATE_SCORE};

use crate::error::Result;
use crate::{Labels, Matrix};
use std::fmt;

/// Scores reported only for the partition-based strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendedScores {
    pub fowlkes_mallows: f64,
    pub completeness: f64,
    pub adjusted_mutual_info: f64,
}

/// Internal and external quality of one cluster assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    pub silhouette: f64,
    pub adjusted_rand: f64,
    pub homogeneity: f64,
    pub completeness: f64,
    pub v_measure: f64,
    pub extended: Option<ExtendedScores>,
}

impl QualityReport {
    pub fn evaluate(x: &Matrix, labels_true: &Labels, labels_pred: &Labels) -> Result<Self> {
        let silhouette = silhouette_score(x, labels_pred, Distance::Euclidean)?;
        let adjusted_rand = adjusted_rand_score(labels_true, labels_pred)?;
        let (homogeneity, completeness, v_measure) =
            homogeneity_completeness_v_measure(labels_true, labels_pred)?;

        Ok(Self {
            silhouette,
            adjusted_rand,
            homogeneity,
            completeness,
            v_measure,
            extended: None,
        })
    }

    /// [`evaluate`](Self::evaluate) plus Fowlkes-Mallows, completeness and AMI.
    pub fn evaluate_extended(x: &Matrix, labels_true: &Labels, labels_pred: &Labels) -> Result<Self> {
        let mut report = Self::evaluate(x, labels_true, labels_pred)?;
        report.extended = Some(ExtendedScores {
            fowlkes_mallows: fowlkes_mallows_score(labels_true, labels_pred)?,
            completeness: completeness_score(labels_true, labels_pred)?,
            adjusted_mutual_info: adjusted_mutual_info_score(labels_true, labels_pred)?,
        });
        Ok(report)
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "silhouette={:.4} ari={:.4} homogeneity={:.4} completeness={:.4} v_measure={:.4}",
            self.silhouette, self.adjusted_rand, self.homogeneity, self.completeness, self.v_measure
        )?;
        if let Some(ext) = &self.extended {
            write!(
                f,
                " fowlkes_mallows={:.4} ami={:.4}",
                ext.fowlkes_mallows, ext.adjusted_mutual_info
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_report_perfect_clustering() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [9.0, 9.0], [9.1, 9.1]];
        let truth = array![0, 0, 1, 1];
        let pred = array![1, 1, 0, 0];

        let report = QualityReport::evaluate_extended(&x, &truth, &pred).unwrap();
        assert!(report.silhouette > 0.9);
        assert!((report.adjusted_rand - 1.0).abs() < 1e-12);
        assert!((report.v_measure - 1.0).abs() < 1e-12);
        let ext = report.extended.unwrap();
        assert!((ext.fowlkes_mallows - 1.0).abs() < 1e-12);
        assert!((ext.adjusted_mutual_info - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_basic_report_has_no_extended_scores() {
        let x = array![[0.0], [1.0], [10.0], [11.0]];
        let truth = array![0, 0, 1, 1];
        let pred = array![0, 0, 1, 1];
        let report = QualityReport::evaluate(&x, &truth, &pred).unwrap();
        assert!(report.extended.is_none());
        assert!(report.to_string().contains("ari=1.0000"));
    }
}
