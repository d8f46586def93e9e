//! Forecasting models.
//!
//! [`RegressionModel`] turns any tabular [`Regressor`](crate::regressors::Regressor)
//! into a global forecaster over lagged targets and covariates.

mod container;
mod estimator;
mod likelihood;
mod prediction;
mod regression;
mod traits;

pub use container::QuantileModelContainer;
pub use estimator::Estimator;
pub use likelihood::{
    check_quantiles, normal_sampling, pair_means, poisson_sampling, quantile_sampling, Likelihood,
    DEFAULT_QUANTILES,
};
pub use regression::{RegressionConfig, RegressionModel};
pub use traits::{BoxedForecaster, FitOptions, Forecaster};
