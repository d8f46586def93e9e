//! Forecaster trait defining the common interface for regression models.

use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::tabularization::{Episode, OwnedEpisode};
use serde::{Deserialize, Serialize};

/// Options applied to a single fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Keep only the most recent rows of each episode.
    pub max_samples_per_episode: Option<usize>,
    /// Threads for per-column fits when the regressor gets wrapped.
    pub n_jobs_multioutput: Option<usize>,
}

impl FitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_samples_per_episode(mut self, max_samples: usize) -> Self {
        self.max_samples_per_episode = Some(max_samples);
        self
    }

    pub fn with_n_jobs_multioutput(mut self, n_jobs: usize) -> Self {
        self.n_jobs_multioutput = Some(n_jobs);
        self
    }
}

/// Common interface for global forecasting models.
///
/// A global model is fitted on one or more episodes and forecasts any number
/// of episodes sharing their component counts. This trait is object-safe and
/// can be used with `Box<dyn Forecaster>`.
pub trait Forecaster {
    /// Fit the model on the given episodes.
    fn fit(&mut self, episodes: &[Episode<'_>], options: &FitOptions) -> Result<()>;

    /// Forecast `n` steps after the end of every episode's target.
    ///
    /// Returns one forecast per episode, each holding `num_samples` draws.
    fn predict_episodes(
        &mut self,
        n: usize,
        episodes: &[Episode<'_>],
        num_samples: usize,
    ) -> Result<Vec<Forecast>>;

    /// The episode the model was fitted on, when it was fitted on exactly one.
    fn training_episode(&self) -> Option<&OwnedEpisode>;

    /// Whether `num_samples > 1` is supported.
    fn is_probabilistic(&self) -> bool;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool;

    /// Fit on a single target series without covariates.
    fn fit_series(&mut self, series: &TimeSeries) -> Result<()> {
        self.fit(&[Episode::new(series)], &FitOptions::default())
    }

    /// Forecast `n` steps after the series the model was fitted on.
    fn predict(&mut self, n: usize, num_samples: usize) -> Result<Forecast> {
        if !self.is_fitted() {
            return Err(ForecastError::FitRequired);
        }
        let episode = self.training_episode().cloned().ok_or_else(|| {
            ForecastError::InvalidParameter(
                "the model was fitted on several series; pass the series to forecast \
                 with `predict_episodes`"
                    .to_string(),
            )
        })?;
        let mut forecasts = self.predict_episodes(n, &[episode.as_episode()], num_samples)?;
        forecasts.pop().ok_or(ForecastError::EmptyData)
    }
}

/// Type alias for boxed forecaster trait objects.
pub type BoxedForecaster = Box<dyn Forecaster + Send>;
