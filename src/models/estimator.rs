//! Fitted estimator as stored by a regression model.

use crate::error::Result;
use crate::regressors::{MultiOutputRegressor, Regressor, Target};
use ndarray::{Array2, ArrayView2, Axis};
use tracing::{debug, warn};

/// A regressor fitted on the lagged label matrix, either directly or through
/// a per-column [`MultiOutputRegressor`].
#[derive(Debug, Clone)]
pub enum Estimator<R> {
    Native(R),
    PerColumn(MultiOutputRegressor<R>),
}

impl<R: Regressor + Clone> Estimator<R> {
    /// Whether `regressor` must be wrapped to fit `n_labels` label columns.
    pub fn needs_wrapping(regressor: &R, n_labels: usize) -> bool {
        let caps = regressor.capabilities();
        n_labels > 1 && (!caps.multi_output || caps.output.width() > 1)
    }

    /// Fit `regressor` on `(x, labels)`, wrapping it when needed.
    ///
    /// A single label column is handed over flattened.
    pub fn fit(
        regressor: R,
        x: ArrayView2<'_, f64>,
        labels: ArrayView2<'_, f64>,
        n_jobs_multioutput: Option<usize>,
    ) -> Result<Self> {
        let target = if labels.ncols() == 1 {
            Target::Univariate(labels.index_axis_move(Axis(1), 0))
        } else {
            Target::Multivariate(labels)
        };

        if Self::needs_wrapping(&regressor, labels.ncols()) {
            debug!(
                regressor = regressor.name(),
                outputs = labels.ncols(),
                "wrapping regressor per output column"
            );
            let mut wrapped = MultiOutputRegressor::new(regressor).with_n_jobs(n_jobs_multioutput);
            wrapped.fit(x, target)?;
            return Ok(Estimator::PerColumn(wrapped));
        }

        if n_jobs_multioutput.is_some() {
            warn!(
                regressor = regressor.name(),
                "n_jobs_multioutput is ignored: the regressor fits all outputs natively"
            );
        }
        let mut regressor = regressor;
        regressor.fit(x, target)?;
        Ok(Estimator::Native(regressor))
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        match self {
            Estimator::Native(r) => r.predict(x),
            Estimator::PerColumn(r) => r.predict(x),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Estimator::Native(r) => r.name(),
            Estimator::PerColumn(r) => r.name(),
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, Estimator::PerColumn(_))
    }
}
