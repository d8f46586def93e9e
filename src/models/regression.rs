//! Regression forecasting model.
//!
//! Wraps any tabular [`Regressor`] into a global forecasting model: the
//! target's own lags, lagged past covariates and lagged future covariates
//! become the feature row, and the next `output_chunk_length` target values
//! the labels.
//!
//! # Example
//!
//! ```
//! use anofox_regression::prelude::*;
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let values: Vec<f64> = (0..30).map(|i| 2.0 * i as f64 + 1.0).collect();
//! let series = TimeSeries::regular(start, Duration::days(1), vec![values]).unwrap();
//!
//! let config = RegressionConfig::default().with_lags(Lags::Count(3));
//! let mut model = RegressionModel::linear(config).unwrap();
//! model.fit_series(&series).unwrap();
//!
//! let forecast = model.predict(5, 1).unwrap();
//! assert_eq!(forecast.horizon(), 5);
//! assert!((forecast.primary()[0] - 61.0).abs() < 1e-3);
//! ```

use super::container::QuantileModelContainer;
use super::estimator::Estimator;
use super::likelihood::{check_quantiles, Likelihood, DEFAULT_QUANTILES};
use super::traits::{FitOptions, Forecaster};
use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use crate::lags::{EncoderSettings, FutureLags, LagSet, Lags};
use crate::regressors::{LinearRegression, OutputKind, Regressor};
use crate::tabularization::{create_lagged_data, Episode, InputDims, OwnedEpisode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Construction-time configuration of a [`RegressionModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Lags of the target series.
    pub lags: Option<Lags>,
    /// Lags of the past covariates.
    pub lags_past_covariates: Option<Lags>,
    /// Lags of the future covariates.
    pub lags_future_covariates: Option<FutureLags>,
    /// Target steps predicted per regressor call.
    pub output_chunk_length: usize,
    /// Seed of the sampling RNG; drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            lags: None,
            lags_past_covariates: None,
            lags_future_covariates: None,
            output_chunk_length: 1,
            seed: None,
        }
    }
}

impl RegressionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lags(mut self, lags: Lags) -> Self {
        self.lags = Some(lags);
        self
    }

    pub fn with_lags_past_covariates(mut self, lags: Lags) -> Self {
        self.lags_past_covariates = Some(lags);
        self
    }

    pub fn with_lags_future_covariates(mut self, lags: FutureLags) -> Self {
        self.lags_future_covariates = Some(lags);
        self
    }

    pub fn with_output_chunk_length(mut self, output_chunk_length: usize) -> Self {
        self.output_chunk_length = output_chunk_length;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration and resolve its lags.
    pub fn resolve(&self) -> Result<LagSet> {
        if self.output_chunk_length == 0 {
            return Err(ForecastError::InvalidParameter(
                "output_chunk_length must be an integer greater than 0. Given: 0".to_string(),
            ));
        }
        LagSet::new(
            self.lags.as_ref(),
            self.lags_past_covariates.as_ref(),
            self.lags_future_covariates.as_ref(),
        )
    }
}

/// Unfitted regressors, cloned at every fit.
#[derive(Debug, Clone)]
pub(super) enum Blueprint<R> {
    Single(R),
    Quantiles(Vec<(f64, R)>),
}

/// Estimators produced by the last fit.
#[derive(Debug, Clone)]
pub(super) enum Fitted<R> {
    Single(Estimator<R>),
    Quantiles(QuantileModelContainer<R>),
}

/// Global forecasting model built on a tabular regressor.
///
/// Deterministic with [`RegressionModel::new`]; probabilistic with
/// [`RegressionModel::quantile`], [`RegressionModel::gaussian`] or
/// [`RegressionModel::poisson`].
#[derive(Debug, Clone)]
pub struct RegressionModel<R = LinearRegression> {
    pub(super) config: RegressionConfig,
    pub(super) lags: LagSet,
    pub(super) likelihood: Option<Likelihood>,
    pub(super) blueprint: Blueprint<R>,
    pub(super) fitted: Option<Fitted<R>>,
    pub(super) input_dims: Option<InputDims>,
    pub(super) training_episode: Option<OwnedEpisode>,
    pub(super) rng: StdRng,
    name: String,
}

impl RegressionModel<LinearRegression> {
    /// Deterministic model on ordinary least squares.
    pub fn linear(config: RegressionConfig) -> Result<Self> {
        Self::new(config, LinearRegression::new())
    }
}

impl<R: Regressor + Clone> RegressionModel<R> {
    /// Deterministic model on `regressor`.
    pub fn new(config: RegressionConfig, regressor: R) -> Result<Self> {
        Self::build(config, None, Blueprint::Single(regressor))
    }

    /// Probabilistic model with one regressor per quantile level.
    ///
    /// `factory` builds the unfitted regressor for a level. Levels default to
    /// [`DEFAULT_QUANTILES`] and must include 0.5.
    pub fn quantile<F>(config: RegressionConfig, quantiles: Option<Vec<f64>>, factory: F) -> Result<Self>
    where
        F: Fn(f64) -> R,
    {
        let quantiles = quantiles.unwrap_or_else(|| DEFAULT_QUANTILES.to_vec());
        check_quantiles(&quantiles)?;
        let templates = quantiles.iter().map(|&q| (q, factory(q))).collect();
        Self::build(
            config,
            Some(Likelihood::Quantile(quantiles)),
            Blueprint::Quantiles(templates),
        )
    }

    /// Probabilistic model sampling `Normal(mean, scale)` from a regressor
    /// emitting `(mean, scale)` pairs.
    pub fn gaussian(config: RegressionConfig, regressor: R) -> Result<Self> {
        if regressor.capabilities().output != OutputKind::MeanScale {
            return Err(ForecastError::InvalidParameter(format!(
                "Gaussian likelihood needs a regressor emitting (mean, scale) pairs; {} does not",
                regressor.name()
            )));
        }
        Self::build(config, Some(Likelihood::Gaussian), Blueprint::Single(regressor))
    }

    /// Probabilistic model sampling `Poisson(rate)` from a rate regressor.
    pub fn poisson(config: RegressionConfig, regressor: R) -> Result<Self> {
        Self::build(config, Some(Likelihood::Poisson), Blueprint::Single(regressor))
    }

    fn build(
        config: RegressionConfig,
        likelihood: Option<Likelihood>,
        blueprint: Blueprint<R>,
    ) -> Result<Self> {
        let lags = config.resolve()?;

        let (regressor_name, output) = match &blueprint {
            Blueprint::Single(r) => (r.name().to_string(), r.capabilities().output),
            Blueprint::Quantiles(templates) => match templates.first() {
                Some((_, r)) => (r.name().to_string(), r.capabilities().output),
                None => {
                    return Err(ForecastError::InvalidParameter(
                        "quantile likelihood needs at least one level".to_string(),
                    ))
                }
            },
        };
        if output == OutputKind::MeanScale && likelihood != Some(Likelihood::Gaussian) {
            return Err(ForecastError::InvalidParameter(format!(
                "{} emits (mean, scale) pairs and can only back a Gaussian likelihood",
                regressor_name
            )));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let name = match &likelihood {
            Some(l) => format!("RegressionModel({}, {})", regressor_name, l.name()),
            None => format!("RegressionModel({})", regressor_name),
        };

        Ok(Self {
            config,
            lags,
            likelihood,
            blueprint,
            fitted: None,
            input_dims: None,
            training_episode: None,
            rng,
            name,
        })
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    pub fn lags(&self) -> &LagSet {
        &self.lags
    }

    pub fn output_chunk_length(&self) -> usize {
        self.config.output_chunk_length
    }

    pub fn likelihood(&self) -> Option<&Likelihood> {
        self.likelihood.as_ref()
    }

    /// Quantile levels of a quantile model.
    pub fn quantiles(&self) -> Option<&[f64]> {
        match &self.likelihood {
            Some(Likelihood::Quantile(levels)) => Some(levels),
            _ => None,
        }
    }

    /// Component counts recorded at fit.
    pub fn input_dims(&self) -> Option<InputDims> {
        self.input_dims
    }

    /// The fitted estimator of a deterministic, Gaussian or Poisson model.
    pub fn estimator(&self) -> Option<&Estimator<R>> {
        match &self.fitted {
            Some(Fitted::Single(estimator)) => Some(estimator),
            _ => None,
        }
    }

    /// The fitted per-quantile estimators of a quantile model.
    pub fn quantile_models(&self) -> Option<&QuantileModelContainer<R>> {
        match &self.fitted {
            Some(Fitted::Quantiles(container)) => Some(container),
            _ => None,
        }
    }

    /// Shortest target series that can produce a training sample.
    pub fn min_train_series_length(&self) -> usize {
        self.lags
            .min_train_series_length(self.config.output_chunk_length)
    }

    /// Window sizes a calendar encoder must cover for this model.
    pub fn encoder_settings(&self) -> EncoderSettings {
        self.lags.encoder_settings()
    }

    /// Reseed the sampling RNG.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl<R: Regressor + Clone> Forecaster for RegressionModel<R> {
    fn fit(&mut self, episodes: &[Episode<'_>], options: &FitOptions) -> Result<()> {
        let first = episodes.first().ok_or(ForecastError::EmptyData)?;

        let data = create_lagged_data(
            episodes,
            &self.lags,
            self.config.output_chunk_length,
            options.max_samples_per_episode,
        )?;
        debug!(
            rows = data.features.nrows(),
            features = data.features.ncols(),
            labels = data.labels.ncols(),
            "built training matrices"
        );

        let x = data.features.view();
        let y = data.labels.view();
        let fitted = match &self.blueprint {
            Blueprint::Single(regressor) => Fitted::Single(Estimator::fit(
                regressor.clone(),
                x,
                y,
                options.n_jobs_multioutput,
            )?),
            Blueprint::Quantiles(templates) => Fitted::Quantiles(QuantileModelContainer::fit(
                templates,
                x,
                y,
                options.n_jobs_multioutput,
            )?),
        };

        self.fitted = Some(fitted);
        self.input_dims = Some(first.input_dims());
        self.training_episode = (episodes.len() == 1).then(|| OwnedEpisode::from(first));

        info!(
            model = %self.name,
            episodes = episodes.len(),
            samples = data.features.nrows(),
            "fitted regression model"
        );
        Ok(())
    }

    fn predict_episodes(
        &mut self,
        n: usize,
        episodes: &[Episode<'_>],
        num_samples: usize,
    ) -> Result<Vec<Forecast>> {
        self.predict_autoregressive(n, episodes, num_samples)
    }

    fn training_episode(&self) -> Option<&OwnedEpisode> {
        self.training_episode.as_ref()
    }

    fn is_probabilistic(&self) -> bool {
        self.likelihood.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

impl<R> fmt::Display for RegressionModel<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |lags: Option<&[i64]>| lags.map_or_else(|| "none".to_string(), |l| format!("{:?}", l));
        write!(
            f,
            "{}(lags={}, lags_past_covariates={}, lags_future_covariates={}, output_chunk_length={})",
            self.name,
            show(self.lags.target()),
            show(self.lags.past()),
            show(self.lags.future()),
            self.config.output_chunk_length
        )
    }
}
