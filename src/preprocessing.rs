use crate::error::{Error, Result};
use ndarray::{Array, Dimension};

/// Rescales values to [0, 1] using a single global minimum and maximum.
///
/// Unlike per-feature scalers, one pair of statistics covers the whole
/// array, so pixel intensities keep their relative scale across channels.
#[derive(Clone, Debug, Default)]
pub struct MinMaxScaler {
    min: Option<f64>,
    max: Option<f64>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub fn fit<D: Dimension>(&mut self, data: &Array<f64, D>) -> Result<()> {
        if data.is_empty() {
            return Err(Error::DataFormat("cannot fit scaler on an empty array".to_string()));
        }

        let (min, max) = data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        if !(max > min) {
            return Err(Error::DataFormat(format!(
                "cannot rescale constant data (min = max = {})",
                min
            )));
        }

        self.min = Some(min);
        self.max = Some(max);
        Ok(())
    }

    /// Applies the fitted statistics in place.
    pub fn transform_inplace<D: Dimension>(&self, data: &mut Array<f64, D>) -> Result<()> {
        let (min, max) = self.statistics().ok_or(Error::NotFitted)?;
        let range = max - min;
        data.mapv_inplace(|v| (v - min) / range);
        Ok(())
    }

    pub fn transform<D: Dimension>(&self, data: &Array<f64, D>) -> Result<Array<f64, D>> {
        let mut result = data.clone();
        self.transform_inplace(&mut result)?;
        Ok(result)
    }

    pub fn fit_transform_inplace<D: Dimension>(&mut self, data: &mut Array<f64, D>) -> Result<()> {
        self.fit(data)?;
        self.transform_inplace(data)
    }

    /// Fitted `(min, max)`, if any.
    pub fn statistics(&self) -> Option<(f64, f64)> {
        self.min.zip(self.max)
    }
}
