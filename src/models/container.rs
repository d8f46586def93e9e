//! Ordered per-quantile estimators.

use super::estimator::Estimator;
use crate::error::{ForecastError, Result};
use crate::regressors::Regressor;
use ndarray::{Array2, ArrayView2};
use std::fmt;

const LEVEL_TOLERANCE: f64 = 1e-12;

/// Estimators keyed by quantile level, kept in ascending level order.
#[derive(Debug, Clone)]
pub struct QuantileModelContainer<R> {
    models: Vec<(f64, Estimator<R>)>,
}

impl<R> Default for QuantileModelContainer<R> {
    fn default() -> Self {
        Self { models: Vec::new() }
    }
}

impl<R: Regressor + Clone> QuantileModelContainer<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit one estimator per `(level, unfitted regressor)` pair.
    pub fn fit(
        templates: &[(f64, R)],
        x: ArrayView2<'_, f64>,
        labels: ArrayView2<'_, f64>,
        n_jobs_multioutput: Option<usize>,
    ) -> Result<Self> {
        let mut container = Self::new();
        for (level, regressor) in templates {
            let estimator = Estimator::fit(regressor.clone(), x, labels, n_jobs_multioutput)?;
            container.push(*level, estimator)?;
        }
        Ok(container)
    }

    /// Append an estimator; levels must arrive in strictly ascending order.
    pub fn push(&mut self, level: f64, estimator: Estimator<R>) -> Result<()> {
        if let Some((last, _)) = self.models.last() {
            if level <= *last {
                return Err(ForecastError::InvalidParameter(format!(
                    "quantile {} added after {}; levels must be strictly ascending",
                    level, last
                )));
            }
        }
        self.models.push((level, estimator));
        Ok(())
    }

    pub fn get(&self, level: f64) -> Option<&Estimator<R>> {
        self.models
            .iter()
            .find(|(q, _)| (q - level).abs() < LEVEL_TOLERANCE)
            .map(|(_, e)| e)
    }

    /// The estimator fitted at level 0.5.
    pub fn median(&self) -> Result<&Estimator<R>> {
        self.get(0.5).ok_or_else(|| {
            ForecastError::InvalidParameter("no estimator fitted at quantile 0.5".to_string())
        })
    }

    pub fn levels(&self) -> Vec<f64> {
        self.models.iter().map(|(q, _)| *q).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &Estimator<R>)> {
        self.models.iter().map(|(q, e)| (*q, e))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Predictions of every estimator, in level order.
    pub fn predict_all(&self, x: ArrayView2<'_, f64>) -> Result<Vec<Array2<f64>>> {
        self.models.iter().map(|(_, e)| e.predict(x)).collect()
    }
}

impl<R> fmt::Display for QuantileModelContainer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels: Vec<String> = self.models.iter().map(|(q, _)| q.to_string()).collect();
        write!(f, "QuantileModelContainer(quantiles=[{}])", levels.join(", "))
    }
}
