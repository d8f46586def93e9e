//! Mean and scale regression for Gaussian forecasts.

use super::linear::LinearRegression;
use super::{check_fit_input, Capabilities, OutputKind, Regressor, Target};
use crate::error::{ForecastError, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Least squares mean with a constant residual standard deviation.
///
/// Emits `(mean, scale)` per row, the two-valued output consumed by
/// Gaussian sampling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanScaleRegression {
    mean: LinearRegression,
    #[serde(skip)]
    scale: Option<f64>,
}

impl MeanScaleRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.mean = self.mean.with_alpha(alpha);
        self
    }

    /// Residual standard deviation after fit.
    pub fn scale(&self) -> Option<f64> {
        self.scale
    }
}

impl Regressor for MeanScaleRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: Target<'_>) -> Result<()> {
        check_fit_input(x, &y)?;
        let y = y.single(self.name())?;
        self.mean.fit(x, Target::Univariate(y))?;

        let fitted = self.mean.predict(x)?;
        let sse: f64 = y
            .iter()
            .zip(fitted.column(0).iter())
            .map(|(obs, fit)| (obs - fit).powi(2))
            .sum();
        let dof = y.len().saturating_sub(x.ncols() + 1).max(1);
        self.scale = Some((sse / dof as f64).sqrt());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let scale = self.scale.ok_or(ForecastError::FitRequired)?;
        let mean = self.mean.predict(x)?;
        let mut out = Array2::from_elem((x.nrows(), 2), scale);
        out.column_mut(0).assign(&mean.index_axis(Axis(1), 0));
        Ok(out)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            multi_output: false,
            output: OutputKind::MeanScale,
        }
    }

    fn name(&self) -> &str {
        "MeanScaleRegression"
    }

    fn is_fitted(&self) -> bool {
        self.scale.is_some()
    }
}
