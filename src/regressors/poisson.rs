//! Poisson regression for count targets.

use super::solve::{weighted_least_squares, with_intercept};
use super::{check_fit_input, check_predict_input, Regressor, Target};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Linear predictor bound before exponentiation.
const MAX_ETA: f64 = 30.0;

/// Poisson GLM with log link: `rate = exp(intercept + X @ coefficients)`.
///
/// Fitted by iteratively reweighted least squares with a small ridge penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoissonRegression {
    alpha: f64,
    max_iter: usize,
    tolerance: f64,
    #[serde(skip)]
    beta: Option<Array1<f64>>,
}

impl Default for PoissonRegression {
    fn default() -> Self {
        Self {
            alpha: 1e-6,
            max_iter: 100,
            tolerance: 1e-8,
            beta: None,
        }
    }
}

impl PoissonRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha.max(0.0);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Fitted `[intercept, coefficients...]` on the log scale.
    pub fn beta(&self) -> Option<&Array1<f64>> {
        self.beta.as_ref()
    }
}

impl Regressor for PoissonRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: Target<'_>) -> Result<()> {
        check_fit_input(x, &y)?;
        let y = y.single(self.name())?;
        if let Some(bad) = y.iter().find(|v| **v < 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Poisson regression requires non-negative targets, got {}",
                bad
            )));
        }

        let design = with_intercept(x);
        let mean = y.mean().unwrap_or(0.0).max(1e-8);
        let mut beta = Array1::zeros(design.ncols());
        beta[0] = mean.ln();

        for _ in 0..self.max_iter {
            let eta = design.dot(&beta).mapv(|v| v.clamp(-MAX_ETA, MAX_ETA));
            let mu = eta.mapv(f64::exp);
            // working response z = eta + (y - mu) / mu, weights = mu
            let z = &eta + &((&y - &mu) / &mu);
            let next = weighted_least_squares(&design, z.view(), mu.view(), self.alpha)?;
            let change = (&next - &beta).iter().map(|d| d.abs()).fold(0.0, f64::max);
            beta = next;
            if change < self.tolerance {
                break;
            }
        }

        if beta.iter().any(|b| !b.is_finite()) {
            return Err(ForecastError::ComputationError(
                "Poisson regression diverged".to_string(),
            ));
        }
        self.beta = Some(beta);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_predict_input(x, self.beta.as_ref().map(|b| b.len() - 1))?;
        let beta = self.beta.as_ref().ok_or(ForecastError::FitRequired)?;
        let rate = with_intercept(x)
            .dot(beta)
            .mapv(|v| v.clamp(-MAX_ETA, MAX_ETA).exp());
        Ok(rate.insert_axis(Axis(1)))
    }

    fn name(&self) -> &str {
        "PoissonRegression"
    }

    fn is_fitted(&self) -> bool {
        self.beta.is_some()
    }
}
