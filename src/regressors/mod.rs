//! Tabular regressors.
//!
//! The forecasting engine only needs a regressor to fit `(X, Y)` and to
//! predict rows of `X`. The [`Regressor`] trait captures exactly that, plus a
//! [`Capabilities`] descriptor telling the fit orchestrator whether the
//! regressor handles several output columns natively and what each output
//! column means.
//!
//! Reference implementations:
//! - [`LinearRegression`]: ordinary least squares, natively multi-output
//! - [`QuantileRegression`]: linear quantile regression
//! - [`PoissonRegression`]: log-link Poisson GLM for count targets
//! - [`MeanScaleRegression`]: mean plus residual scale, for Gaussian sampling
//! - [`MultiOutputRegressor`]: one clone of a single-output regressor per column

mod linear;
mod mean_scale;
mod multi_output;
mod poisson;
mod quantile;
pub(crate) mod solve;

pub use linear::LinearRegression;
pub use mean_scale::MeanScaleRegression;
pub use multi_output::MultiOutputRegressor;
pub use poisson::PoissonRegression;
pub use quantile::QuantileRegression;

use crate::error::{ForecastError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Labels handed to [`Regressor::fit`].
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A single label column, flattened.
    Univariate(ArrayView1<'a, f64>),
    /// One column per output.
    Multivariate(ArrayView2<'a, f64>),
}

impl<'a> Target<'a> {
    pub fn n_rows(&self) -> usize {
        match self {
            Target::Univariate(y) => y.len(),
            Target::Multivariate(y) => y.nrows(),
        }
    }

    pub fn n_outputs(&self) -> usize {
        match self {
            Target::Univariate(_) => 1,
            Target::Multivariate(y) => y.ncols(),
        }
    }

    /// The labels as a matrix, one column per output.
    pub fn as_matrix(&self) -> ArrayView2<'a, f64> {
        match *self {
            Target::Univariate(y) => y.insert_axis(Axis(1)),
            Target::Multivariate(y) => y,
        }
    }

    /// The single label column; errors for more than one output.
    pub fn single(&self, regressor: &str) -> Result<ArrayView1<'a, f64>> {
        match *self {
            Target::Univariate(y) => Ok(y),
            Target::Multivariate(y) if y.ncols() == 1 => Ok(y.index_axis_move(Axis(1), 0)),
            Target::Multivariate(y) => Err(ForecastError::InvalidParameter(format!(
                "{} supports a single output, got {} label columns",
                regressor,
                y.ncols()
            ))),
        }
    }
}

/// Meaning of the values a regressor emits for one label column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// One point estimate per label column.
    #[default]
    Point,
    /// An interleaved `(mean, scale)` pair per label column.
    MeanScale,
}

impl OutputKind {
    /// Prediction columns emitted per label column.
    pub fn width(&self) -> usize {
        match self {
            OutputKind::Point => 1,
            OutputKind::MeanScale => 2,
        }
    }
}

/// What a regressor can do, queried by the fit orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Fits several label columns in one call.
    pub multi_output: bool,
    pub output: OutputKind,
}

/// A tabular regressor.
pub trait Regressor: Send + Sync {
    /// Fit on features `x` (rows × features) and labels `y`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: Target<'_>) -> Result<()>;

    /// Predict every row of `x`; one column per output, or two per output for
    /// [`OutputKind::MeanScale`].
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool;
}

/// Shared shape checks for [`Regressor::fit`].
pub(crate) fn check_fit_input(x: ArrayView2<'_, f64>, y: &Target<'_>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(ForecastError::EmptyData);
    }
    if x.nrows() != y.n_rows() {
        return Err(ForecastError::DimensionMismatch {
            expected: x.nrows(),
            got: y.n_rows(),
        });
    }
    Ok(())
}

/// Shared shape checks for [`Regressor::predict`].
pub(crate) fn check_predict_input(
    x: ArrayView2<'_, f64>,
    n_features: Option<usize>,
) -> Result<usize> {
    let n_features = n_features.ok_or(ForecastError::FitRequired)?;
    if x.ncols() != n_features {
        return Err(ForecastError::DimensionMismatch {
            expected: n_features,
            got: x.ncols(),
        });
    }
    Ok(n_features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn target_views_agree() {
        let y = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let multi = Target::Multivariate(y.view());
        assert_eq!(multi.n_rows(), 3);
        assert_eq!(multi.n_outputs(), 2);
        assert!(multi.single("test").is_err());

        let flat = Target::Univariate(y.column(1));
        assert_eq!(flat.n_outputs(), 1);
        assert_eq!(flat.as_matrix().shape(), &[3, 1]);
        assert_eq!(flat.single("test").unwrap().to_vec(), vec![2.0, 4.0, 6.0]);

        let one_column = Target::Multivariate(y.slice(ndarray::s![.., 1..2]));
        assert_eq!(one_column.single("test").unwrap().to_vec(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn default_capabilities_are_single_point_output() {
        let caps = Capabilities::default();
        assert!(!caps.multi_output);
        assert_eq!(caps.output, OutputKind::Point);
        assert_eq!(OutputKind::MeanScale.width(), 2);
    }
}
