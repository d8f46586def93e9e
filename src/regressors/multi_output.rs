//! Per-column multi-output composite.

use super::{check_fit_input, Capabilities, Regressor, Target};
use crate::error::{ForecastError, Result};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::debug;

/// Fits one clone of a single-output regressor per label column.
///
/// Predictions are concatenated in column order, so a regressor emitting
/// `(mean, scale)` pairs yields interleaved pairs per label column.
/// With `n_jobs` the per-column fits run on a dedicated rayon pool.
#[derive(Debug, Clone)]
pub struct MultiOutputRegressor<R> {
    template: R,
    estimators: Vec<R>,
    n_jobs: Option<usize>,
}

impl<R: Regressor + Clone> MultiOutputRegressor<R> {
    pub fn new(template: R) -> Self {
        Self {
            template,
            estimators: Vec::new(),
            n_jobs: None,
        }
    }

    /// Number of threads for the per-column fits.
    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Fitted sub-regressors, one per label column.
    pub fn estimators(&self) -> &[R] {
        &self.estimators
    }

    fn fit_column(&self, x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>, j: usize) -> Result<R> {
        let mut estimator = self.template.clone();
        estimator.fit(x, Target::Univariate(y.column(j)))?;
        Ok(estimator)
    }
}

impl<R: Regressor + Clone> Regressor for MultiOutputRegressor<R> {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: Target<'_>) -> Result<()> {
        check_fit_input(x, &y)?;
        let y = y.as_matrix();
        let n_outputs = y.ncols();

        let estimators = match self.n_jobs {
            Some(n_jobs) if n_jobs > 1 && n_outputs > 1 => {
                debug!(n_jobs, n_outputs, "fitting output columns in parallel");
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n_jobs)
                    .build()
                    .map_err(|e| ForecastError::ComputationError(e.to_string()))?;
                let this = &*self;
                pool.install(|| {
                    (0..n_outputs)
                        .into_par_iter()
                        .map(|j| this.fit_column(x, y, j))
                        .collect::<Result<Vec<_>>>()
                })?
            }
            _ => (0..n_outputs)
                .map(|j| self.fit_column(x, y, j))
                .collect::<Result<Vec<_>>>()?,
        };

        self.estimators = estimators;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if self.estimators.is_empty() {
            return Err(ForecastError::FitRequired);
        }
        let columns = self
            .estimators
            .iter()
            .map(|e| e.predict(x))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<_> = columns.iter().map(|c| c.view()).collect();
        concatenate(Axis(1), &views).map_err(|e| ForecastError::ComputationError(e.to_string()))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            multi_output: true,
            output: self.template.capabilities().output,
        }
    }

    fn name(&self) -> &str {
        self.template.name()
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }
}
