//! # anofox-regression
//!
//! Regression-based time series forecasting.
//!
//! Lagged values of a target series and of optional past and future
//! covariates are tabularized into feature/label matrices, fitted with any
//! tabular regressor, and forecast autoregressively in blocks of
//! `output_chunk_length` steps. Probabilistic forecasts come from quantile,
//! Gaussian or Poisson sampling.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod error;
pub mod lags;
pub mod models;
pub mod regressors;
pub mod tabularization;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::core::{Forecast, TimeSeries};
    pub use crate::error::{ForecastError, Result};
    pub use crate::lags::{FutureLags, Lags};
    pub use crate::models::{FitOptions, Forecaster, Likelihood, RegressionConfig, RegressionModel};
    pub use crate::regressors::{
        LinearRegression, MeanScaleRegression, PoissonRegression, QuantileRegression, Regressor,
    };
    pub use crate::tabularization::Episode;
}
