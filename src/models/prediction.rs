//! Autoregressive multi-step prediction.
//!
//! A horizon of `n` steps is predicted in blocks of `output_chunk_length`
//! steps. Each block assembles one feature row per (episode, draw) from
//!
//! - the trailing target window followed by every value predicted so far,
//! - the covariate windows cut out once up front,
//!
//! asks the fitted estimator (and the sampler, for probabilistic models) for
//! the block, and appends it to the predictions read by later blocks.

use super::regression::{Fitted, RegressionModel};
use super::likelihood::{normal_sampling, pair_means, poisson_sampling, quantile_sampling, Likelihood};
use crate::core::{Forecast, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::lags::{LagGroup, LagSet};
use crate::regressors::Regressor;
use crate::tabularization::{check_covariates, Episode, InputDims};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rand::rngs::StdRng;
use tracing::debug;

/// Everything one episode contributes to the prediction loop.
struct PreparedEpisode {
    timestamps: Vec<DateTime<Utc>>,
    labels: Vec<String>,
    /// Trailing target rows, `(window, components)`.
    window: Array2<f64>,
    /// Covariates from the first to the last lagged step, `(span, width)`.
    past: Option<Array2<f64>>,
    future: Option<Array2<f64>>,
}

impl PreparedEpisode {
    fn covariates(&self, group: LagGroup) -> Option<&Array2<f64>> {
        match group {
            LagGroup::Target => None,
            LagGroup::Past => self.past.as_ref(),
            LagGroup::Future => self.future.as_ref(),
        }
    }
}

/// Shape of one prediction call.
#[derive(Clone, Copy)]
struct Horizon {
    n: usize,
    output_chunk_length: usize,
    n_pred_steps: usize,
}

impl<R: Regressor + Clone> RegressionModel<R> {
    pub(super) fn predict_autoregressive(
        &mut self,
        n: usize,
        episodes: &[Episode<'_>],
        num_samples: usize,
    ) -> Result<Vec<Forecast>> {
        if num_samples == 0 {
            return Err(ForecastError::InvalidParameter(
                "num_samples must be at least 1".to_string(),
            ));
        }
        if num_samples > 1 && self.likelihood.is_none() {
            return Err(ForecastError::InvalidParameter(
                "`num_samples > 1` is only supported for probabilistic models".to_string(),
            ));
        }
        let fitted = self.fitted.as_ref().ok_or(ForecastError::FitRequired)?;
        let dims = self.input_dims.ok_or(ForecastError::FitRequired)?;
        if n == 0 {
            return Err(ForecastError::InvalidParameter(
                "forecast horizon n must be at least 1".to_string(),
            ));
        }
        if episodes.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        let output_chunk_length = self.config.output_chunk_length;
        let horizon = Horizon {
            n,
            output_chunk_length,
            n_pred_steps: n.div_ceil(output_chunk_length),
        };

        let prepared = episodes
            .iter()
            .enumerate()
            .map(|(idx, episode)| prepare_episode(idx, episode, &self.lags, &dims, horizon))
            .collect::<Result<Vec<_>>>()?;

        let components = dims.target;
        let total_rows = episodes.len() * num_samples;
        let n_features = self.lags.n_features(&dims);
        let block_width = output_chunk_length * components;
        let mut predictions =
            Array3::<f64>::zeros((total_rows, horizon.n_pred_steps * output_chunk_length, components));

        debug!(
            n,
            episodes = episodes.len(),
            num_samples,
            n_pred_steps = horizon.n_pred_steps,
            "autoregressive prediction"
        );

        for t_pred in (0..n).step_by(output_chunk_length) {
            let x = assemble_features(&self.lags, &prepared, &predictions, t_pred, num_samples, n_features);
            let block = predict_block(
                fitted,
                self.likelihood.as_ref(),
                x.view(),
                block_width,
                num_samples,
                &mut self.rng,
            )?;
            if block.dim() != (total_rows, block_width) {
                return Err(ForecastError::DimensionMismatch {
                    expected: block_width,
                    got: block.ncols(),
                });
            }

            for r in 0..total_rows {
                for step in 0..output_chunk_length {
                    for c in 0..components {
                        predictions[[r, t_pred + step, c]] = block[[r, step * components + c]];
                    }
                }
            }
        }

        prepared
            .into_iter()
            .enumerate()
            .map(|(e, episode)| {
                let values = Array3::from_shape_fn((n, components, num_samples), |(h, c, s)| {
                    predictions[[e * num_samples + s, h, c]]
                });
                Forecast::new(episode.timestamps, values)?.with_labels(episode.labels)
            })
            .collect()
    }

    /// Latest start of a historical forecast of `forecast_horizon` steps on
    /// `series`.
    ///
    /// With `overlap_end` the forecast may run past the series end; otherwise
    /// it must end inside it. Positive lags push the start back by the largest
    /// lag, since their covariates must exist after the forecast start.
    pub fn last_prediction_time(
        &self,
        series: &TimeSeries,
        forecast_horizon: usize,
        overlap_end: bool,
    ) -> Result<DateTime<Utc>> {
        if forecast_horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "forecast_horizon must be at least 1".to_string(),
            ));
        }
        let extra_shift = self.lags.max_lag().unwrap_or(0).max(0) as usize;
        let back = if overlap_end {
            1 + extra_shift
        } else {
            forecast_horizon + extra_shift
        };
        if back > series.len() {
            return Err(ForecastError::InsufficientData {
                needed: back,
                got: series.len(),
            });
        }
        Ok(series.timestamps()[series.len() - back])
    }
}

fn prepare_episode(
    idx: usize,
    episode: &Episode<'_>,
    lags: &LagSet,
    dims: &InputDims,
    horizon: Horizon,
) -> Result<PreparedEpisode> {
    check_covariates(episode, lags, "prediction")?;
    let provided = episode.input_dims();
    if provided != *dims {
        return Err(ForecastError::InputDimsMismatch {
            trained: *dims,
            provided,
        });
    }

    let target = episode.target;
    if target.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if !target.is_regular()? {
        return Err(ForecastError::TimestampError(format!(
            "target series at index {} is not regularly spaced",
            idx
        )));
    }

    let first_pred = target.shift_time(target.end_time()?, 1)?;
    let timestamps = (0..horizon.n as i64)
        .map(|h| target.shift_time(first_pred, h))
        .collect::<Result<Vec<_>>>()?;

    let window_len = lags.target_window();
    if target.len() < window_len {
        return Err(ForecastError::InsufficientData {
            needed: window_len,
            got: target.len(),
        });
    }
    let offset = target.len() - window_len;
    let window = Array2::from_shape_fn((window_len, dims.target), |(i, c)| {
        target.value(offset + i, c).unwrap_or(f64::NAN)
    });

    Ok(PreparedEpisode {
        timestamps,
        labels: target.labels().to_vec(),
        window,
        past: covariate_window(idx, episode, lags, LagGroup::Past, first_pred, horizon)?,
        future: covariate_window(idx, episode, lags, LagGroup::Future, first_pred, horizon)?,
    })
}

/// Cut the covariate rows read by any block out of the covariate series.
///
/// Row 0 is the step `first_pred + lags[0]`; the last row is the step read by
/// the largest lag of the last block.
fn covariate_window(
    idx: usize,
    episode: &Episode<'_>,
    lags: &LagSet,
    group: LagGroup,
    first_pred: DateTime<Utc>,
    horizon: Horizon,
) -> Result<Option<Array2<f64>>> {
    let (Some(series), Some(group_lags)) = (episode.series(group), lags.group(group)) else {
        return Ok(None);
    };
    let target = episode.target;
    let (min_lag, max_lag) = (group_lags[0], group_lags[group_lags.len() - 1]);
    let last_block = ((horizon.n_pred_steps - 1) * horizon.output_chunk_length) as i64;

    let required_start = target.shift_time(first_pred, min_lag)?;
    let required_end = target.shift_time(first_pred, last_block + max_lag)?;

    if series.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if series.len() > 1 && (series.freq()? != target.freq()? || !series.is_regular()?) {
        return Err(ForecastError::TimestampError(format!(
            "{} covariates of the series at index {} do not share the target's regular frequency",
            group, idx
        )));
    }

    let (actual_start, actual_end) = (series.start_time()?, series.end_time()?);
    if actual_start > required_start || actual_end < required_end {
        return Err(ForecastError::InsufficientCovariates {
            group,
            series_index: idx,
            n: horizon.n,
            min_lag,
            max_lag,
            output_chunk_length: horizon.output_chunk_length,
            required_start,
            required_end,
            actual_start,
            actual_end,
        });
    }

    let offset = target.steps_between(actual_start, required_start)? as usize;
    let span = (last_block + max_lag - min_lag + 1) as usize;
    let width = series.dimensions();
    Ok(Some(Array2::from_shape_fn((span, width), |(i, c)| {
        series.value(offset + i, c).unwrap_or(f64::NAN)
    })))
}

/// Feature rows for the block starting at `t_pred`, in lagged-matrix layout.
///
/// Rows are episode-major: row `r` belongs to episode `r / num_samples`.
fn assemble_features(
    lags: &LagSet,
    prepared: &[PreparedEpisode],
    predictions: &Array3<f64>,
    t_pred: usize,
    num_samples: usize,
    n_features: usize,
) -> Array2<f64> {
    let total_rows = predictions.len_of(Axis(0));
    let mut x = Array2::zeros((total_rows, n_features));

    for (r, mut row) in x.axis_iter_mut(Axis(0)).enumerate() {
        let episode = &prepared[r / num_samples];
        let mut col = 0;
        for (group, group_lags) in lags.iter() {
            if group == LagGroup::Target {
                let window_len = episode.window.nrows() as i64;
                for &lag in group_lags {
                    // lag >= -window_len, so pos >= t_pred
                    let pos = window_len + t_pred as i64 + lag;
                    for c in 0..episode.window.ncols() {
                        row[col] = if pos < window_len {
                            episode.window[[pos as usize, c]]
                        } else {
                            predictions[[r, (pos - window_len) as usize, c]]
                        };
                        col += 1;
                    }
                }
            } else if let Some(covariates) = episode.covariates(group) {
                for &lag in group_lags {
                    let i = (lag - group_lags[0]) as usize + t_pred;
                    for c in 0..covariates.ncols() {
                        row[col] = covariates[[i, c]];
                        col += 1;
                    }
                }
            }
        }
    }
    x
}

/// One block of `(rows, output_chunk_length * components)` values.
fn predict_block<R: Regressor + Clone>(
    fitted: &Fitted<R>,
    likelihood: Option<&Likelihood>,
    x: ArrayView2<'_, f64>,
    block_width: usize,
    num_samples: usize,
    rng: &mut StdRng,
) -> Result<Array2<f64>> {
    match (fitted, likelihood) {
        (Fitted::Quantiles(container), _) => {
            if num_samples == 1 {
                container.median()?.predict(x)
            } else {
                let outputs = container.predict_all(x)?;
                quantile_sampling(&container.levels(), &outputs, rng)
            }
        }
        (Fitted::Single(estimator), likelihood) => {
            let raw = estimator.predict(x)?;
            let expected = block_width * likelihood.map_or(1, Likelihood::outputs_per_label);
            if raw.ncols() != expected {
                return Err(ForecastError::DimensionMismatch {
                    expected,
                    got: raw.ncols(),
                });
            }
            match likelihood {
                Some(Likelihood::Gaussian) if num_samples == 1 => pair_means(&raw),
                Some(Likelihood::Gaussian) => normal_sampling(&raw, rng),
                Some(Likelihood::Poisson) if num_samples > 1 => poisson_sampling(&raw, rng),
                _ => Ok(raw),
            }
        }
    }
}
