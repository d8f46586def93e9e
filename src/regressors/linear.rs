//! Ordinary least squares regression.

use super::solve::ordinary_least_squares;
use super::{check_fit_input, check_predict_input, Capabilities, OutputKind, Regressor, Target};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Linear regression `y = intercept + X @ coefficients`, one coefficient
/// column per output.
///
/// Solved through the normal equations with a Cholesky factorization. An
/// optional ridge penalty `alpha` stabilizes collinear lag features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    alpha: f64,
    #[serde(skip)]
    intercepts: Option<Array1<f64>>,
    #[serde(skip)]
    coefficients: Option<Array2<f64>>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ridge penalty (0 for plain least squares).
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha.max(0.0);
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fitted intercepts, one per output.
    pub fn intercepts(&self) -> Option<&Array1<f64>> {
        self.intercepts.as_ref()
    }

    /// Fitted coefficients shaped `(features, outputs)`.
    pub fn coefficients(&self) -> Option<&Array2<f64>> {
        self.coefficients.as_ref()
    }
}

impl Regressor for LinearRegression {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: Target<'_>) -> Result<()> {
        check_fit_input(x, &y)?;
        let (intercepts, coefficients) = ordinary_least_squares(x, y.as_matrix(), self.alpha)?;
        self.intercepts = Some(intercepts);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_predict_input(x, self.coefficients.as_ref().map(|c| c.nrows()))?;
        let (Some(coefficients), Some(intercepts)) = (&self.coefficients, &self.intercepts) else {
            return Err(ForecastError::FitRequired);
        };
        Ok(x.dot(coefficients) + &intercepts.view().insert_axis(Axis(0)))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            multi_output: true,
            output: OutputKind::Point,
        }
    }

    fn name(&self) -> &str {
        "LinearRegression"
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn fits_simple_line() {
        // y = 2 + 3*x
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![5.0, 8.0, 11.0, 14.0, 17.0];
        let mut model = LinearRegression::new();
        model.fit(x.view(), Target::Univariate(y.view())).unwrap();

        assert_relative_eq!(model.intercepts().unwrap()[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(model.coefficients().unwrap()[[0, 0]], 3.0, epsilon = 1e-6);

        let pred = model.predict(array![[6.0], [7.0]].view()).unwrap();
        assert_eq!(pred.shape(), &[2, 1]);
        assert_relative_eq!(pred[[0, 0]], 20.0, epsilon = 1e-6);
        assert_relative_eq!(pred[[1, 0]], 23.0, epsilon = 1e-6);
    }

    #[test]
    fn fits_each_output_column() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        // columns: y = x, y = 10 - 2x
        let y = array![[0.0, 10.0], [1.0, 8.0], [2.0, 6.0], [3.0, 4.0]];
        let mut model = LinearRegression::new();
        model.fit(x.view(), Target::Multivariate(y.view())).unwrap();

        let pred = model.predict(array![[4.0]].view()).unwrap();
        assert_relative_eq!(pred[[0, 0]], 4.0, epsilon = 1e-6);
        assert_relative_eq!(pred[[0, 1]], 2.0, epsilon = 1e-6);
        assert!(model.capabilities().multi_output);
    }

    #[test]
    fn predict_checks_state_and_shape() {
        let model = LinearRegression::new();
        assert_eq!(
            model.predict(array![[1.0]].view()).unwrap_err(),
            ForecastError::FitRequired
        );

        let mut model = LinearRegression::new();
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0]];
        model
            .fit(x.view(), Target::Univariate(array![1.0, 2.0, 3.0].view()))
            .unwrap();
        assert!(matches!(
            model.predict(array![[1.0]].view()),
            Err(ForecastError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn fit_rejects_row_mismatch() {
        let mut model = LinearRegression::new();
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0, 3.0];
        assert!(model.fit(x.view(), Target::Univariate(y.view())).is_err());
    }
}
