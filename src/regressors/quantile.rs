//! Linear quantile regression.

use super::solve::{weighted_least_squares, with_intercept};
use super::{check_fit_input, check_predict_input, Regressor, Target};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Linear model minimizing the pinball loss at level `quantile`.
///
/// Fitted by iteratively reweighted least squares: each pass weights a
/// residual `r` by `tau / |r|` above the fit and `(1 - tau) / |r|` below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileRegression {
    quantile: f64,
    alpha: f64,
    max_iter: usize,
    tolerance: f64,
    #[serde(skip)]
    beta: Option<Array1<f64>>,
}

impl QuantileRegression {
    pub fn new(quantile: f64) -> Self {
        Self {
            quantile,
            alpha: 0.0,
            max_iter: 200,
            tolerance: 1e-8,
            beta: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha.max(0.0);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn quantile(&self) -> f64 {
        self.quantile
    }

    /// Fitted `[intercept, coefficients...]`.
    pub fn beta(&self) -> Option<&Array1<f64>> {
        self.beta.as_ref()
    }
}

impl Regressor for QuantileRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: Target<'_>) -> Result<()> {
        check_fit_input(x, &y)?;
        if !(self.quantile > 0.0 && self.quantile < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "quantile must lie in (0, 1), got {}",
                self.quantile
            )));
        }
        let y = y.single(self.name())?;
        let tau = self.quantile;
        let design = with_intercept(x);
        let eps = 1e-6 * (y.iter().map(|v| v.abs()).sum::<f64>() / y.len() as f64).max(1.0);

        let mut weights = Array1::ones(y.len());
        let mut beta = weighted_least_squares(&design, y, weights.view(), self.alpha)?;

        for _ in 0..self.max_iter {
            let residuals = &y - &design.dot(&beta);
            for (w, r) in weights.iter_mut().zip(residuals.iter()) {
                let side = if *r >= 0.0 { tau } else { 1.0 - tau };
                *w = side / r.abs().max(eps);
            }
            let next = weighted_least_squares(&design, y, weights.view(), self.alpha)?;
            let change = (&next - &beta).iter().map(|d| d.abs()).fold(0.0, f64::max);
            beta = next;
            if change < self.tolerance {
                break;
            }
        }

        self.beta = Some(beta);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_predict_input(x, self.beta.as_ref().map(|b| b.len() - 1))?;
        let beta = self.beta.as_ref().ok_or(ForecastError::FitRequired)?;
        Ok(with_intercept(x).dot(beta).insert_axis(Axis(1)))
    }

    fn name(&self) -> &str {
        "QuantileRegression"
    }

    fn is_fitted(&self) -> bool {
        self.beta.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn noisy_line(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array::from_shape_fn((n, 1), |(i, _)| i as f64);
        // deterministic spread of +-5 around y = 2x
        let y = Array::from_shape_fn(n, |i| 2.0 * i as f64 + ((i * 7) % 11) as f64 - 5.0);
        (x, y)
    }

    #[test]
    fn higher_levels_sit_above_lower_ones() {
        let (x, y) = noisy_line(60);
        let probe = ndarray::array![[30.0]];
        let mut preds = Vec::new();
        for q in [0.1, 0.5, 0.9] {
            let mut model = QuantileRegression::new(q);
            model.fit(x.view(), Target::Univariate(y.view())).unwrap();
            preds.push(model.predict(probe.view()).unwrap()[[0, 0]]);
        }
        assert!(preds[0] < preds[1]);
        assert!(preds[1] < preds[2]);
    }

    #[test]
    fn fraction_below_tracks_level() {
        let (x, y) = noisy_line(110);
        let mut model = QuantileRegression::new(0.8);
        model.fit(x.view(), Target::Univariate(y.view())).unwrap();
        let fitted = model.predict(x.view()).unwrap();
        let below = y
            .iter()
            .zip(fitted.column(0).iter())
            .filter(|(obs, fit)| obs <= fit)
            .count() as f64
            / y.len() as f64;
        assert!((below - 0.8).abs() < 0.15, "fraction below {}", below);
    }

    #[test]
    fn rejects_invalid_level_and_multi_output() {
        let (x, y) = noisy_line(10);
        let mut model = QuantileRegression::new(1.0);
        assert!(model.fit(x.view(), Target::Univariate(y.view())).is_err());

        let y2 = ndarray::stack(Axis(1), &[y.view(), y.view()]).unwrap();
        let mut model = QuantileRegression::new(0.5);
        assert!(model.fit(x.view(), Target::Multivariate(y2.view())).is_err());
    }
}
