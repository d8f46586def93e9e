//! Integration tests for lagged regression forecasting.
//!
//! Covers tabularization layout, covariate handling at prediction time,
//! multi-episode fitting and the probabilistic sampling strategies.

use anofox_regression::core::TimeSeries;
use anofox_regression::lags::{FutureLags, LagGroup, LagSet, Lags};
use anofox_regression::models::{FitOptions, Forecaster, RegressionConfig, RegressionModel};
use anofox_regression::regressors::{
    LinearRegression, MeanScaleRegression, PoissonRegression, QuantileRegression,
};
use anofox_regression::tabularization::{create_lagged_data, Episode, InputDims};
use anofox_regression::ForecastError;
use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ndarray::Array2;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn day(offset: i64) -> DateTime<Utc> {
    base() + Duration::days(offset)
}

fn series_at(offset: i64, columns: Vec<Vec<f64>>) -> TimeSeries {
    TimeSeries::regular(day(offset), Duration::days(1), columns).unwrap()
}

/// Trend plus a weekly-ish wave and a deterministic wobble.
fn wavy(n: usize) -> Vec<f64> {
    (0..n)
        .map(|t| {
            let t_f = t as f64;
            10.0 + 0.3 * t_f + 2.0 * (t_f / 3.0).sin() + ((t * 37) % 11) as f64 / 10.0
        })
        .collect()
}

fn counts(n: usize) -> Vec<f64> {
    (0..n)
        .map(|t| (5.0 + 3.0 * (t as f64 / 4.0).sin()).round())
        .collect()
}

// =============================================================================
// Tabularization layout
// =============================================================================

#[test]
fn count_lags_yield_rows_in_ascending_lag_order() {
    let target = series_at(0, vec![(0..10).map(|v| v as f64).collect()]);
    let lags = LagSet::new(Some(&Lags::Count(2)), None, None).unwrap();
    assert_eq!(lags.target(), Some(&[-2, -1][..]));

    let data = create_lagged_data(&[Episode::new(&target)], &lags, 1, None).unwrap();
    assert_eq!(data.features.nrows(), 8);
    for (row, t) in (2..10).enumerate() {
        assert_eq!(
            data.features.row(row).to_vec(),
            vec![(t - 2) as f64, (t - 1) as f64]
        );
        assert_eq!(data.labels[[row, 0]], t as f64);
    }
}

#[test]
fn prediction_rebuilds_training_column_layout() {
    let n = 40;
    let target = series_at(0, vec![wavy(n)]);
    let past = series_at(0, vec![(0..n).map(|t| (t as f64 * 0.7).cos()).collect()]);
    let future = series_at(0, vec![(0..n + 2).map(|t| (t % 7) as f64).collect()]);

    let config = RegressionConfig::default()
        .with_lags(Lags::Count(2))
        .with_lags_past_covariates(Lags::Count(1))
        .with_lags_future_covariates(FutureLags::List(vec![0, 1]))
        .with_output_chunk_length(2);
    let mut model = RegressionModel::linear(config).unwrap();
    let episode = Episode::new(&target)
        .with_past_covariates(&past)
        .with_future_covariates(&future);
    model.fit(&[episode], &FitOptions::default()).unwrap();

    let forecast = model.predict_episodes(2, &[episode], 1).unwrap().remove(0);

    // target lags, then past lags, then future lags
    let y = target.values(0).unwrap();
    let p = past.values(0).unwrap();
    let f = future.values(0).unwrap();
    let row = Array2::from_shape_vec(
        (1, 5),
        vec![y[n - 2], y[n - 1], p[n - 1], f[n], f[n + 1]],
    )
    .unwrap();
    let expected = model.estimator().unwrap().predict(row.view()).unwrap();

    let point = forecast.primary();
    assert_relative_eq!(point[0], expected[[0, 0]], epsilon = 1e-10);
    assert_relative_eq!(point[1], expected[[0, 1]], epsilon = 1e-10);
}

// =============================================================================
// Covariate windows at prediction time
// =============================================================================

#[test]
fn future_span_requires_window_around_predictions() {
    let target = series_at(0, vec![wavy(10)]);
    let future = series_at(0, vec![(0..20).map(|t| t as f64).collect()]);
    let config = RegressionConfig::default()
        .with_lags(Lags::Count(1))
        .with_lags_future_covariates(FutureLags::Span { past: 1, future: 2 });
    let mut model = RegressionModel::linear(config).unwrap();
    assert_eq!(model.lags().future(), Some(&[-1, 0, 1][..]));

    model
        .fit(
            &[Episode::new(&target).with_future_covariates(&future)],
            &FitOptions::default(),
        )
        .unwrap();

    // first prediction at day 10, last at day 12: needs days 9..=13
    let exact = future.slice_time(day(9), day(13)).unwrap();
    let ok = model.predict_episodes(3, &[Episode::new(&target).with_future_covariates(&exact)], 1);
    assert_eq!(ok.unwrap()[0].horizon(), 3);

    let late_start = future.slice_time(day(10), day(13)).unwrap();
    let early_end = future.slice_time(day(9), day(12)).unwrap();
    for short in [&late_start, &early_end] {
        let err = model
            .predict_episodes(3, &[Episode::new(&target).with_future_covariates(short)], 1)
            .unwrap_err();
        match err {
            ForecastError::InsufficientCovariates {
                group,
                required_start,
                required_end,
                ..
            } => {
                assert_eq!(group, LagGroup::Future);
                assert_eq!(required_start, day(9));
                assert_eq!(required_end, day(13));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}

#[test]
fn missing_training_rows_name_the_episode() {
    let long = series_at(0, vec![wavy(30)]);
    let short = series_at(0, vec![wavy(4)]);
    let config = RegressionConfig::default().with_lags(Lags::Count(5));
    let mut model = RegressionModel::linear(config).unwrap();

    let err = model
        .fit(
            &[Episode::new(&long), Episode::new(&short)],
            &FitOptions::default(),
        )
        .unwrap_err();
    assert_eq!(
        err,
        ForecastError::NoTrainingSamples {
            series_index: Some(1)
        }
    );
    assert!(err.to_string().contains("at index 1"));
    assert!(!model.is_fitted());
}

#[test]
fn covariate_width_must_match_fit() {
    let n = 30;
    let target = series_at(0, vec![wavy(n)]);
    let wave = |k: f64| (0..n).map(|t| (t as f64 / k).sin()).collect::<Vec<_>>();
    let past_2 = series_at(0, vec![wave(2.0), wave(3.0)]);
    let past_3 = series_at(0, vec![wave(2.0), wave(3.0), wave(5.0)]);

    let config = RegressionConfig::default()
        .with_lags(Lags::Count(2))
        .with_lags_past_covariates(Lags::Count(2));
    let mut model = RegressionModel::linear(config).unwrap();
    model
        .fit(
            &[Episode::new(&target).with_past_covariates(&past_2)],
            &FitOptions::default(),
        )
        .unwrap();

    let err = model
        .predict_episodes(1, &[Episode::new(&target).with_past_covariates(&past_3)], 1)
        .unwrap_err();
    assert_eq!(
        err,
        ForecastError::InputDimsMismatch {
            trained: InputDims::new(1, Some(2), None),
            provided: InputDims::new(1, Some(3), None),
        }
    );

    // and covariates cannot be dropped either
    assert!(matches!(
        model.predict_episodes(1, &[Episode::new(&target)], 1),
        Err(ForecastError::InvalidParameter(_))
    ));
}

// =============================================================================
// Global models
// =============================================================================

#[test]
fn multi_episode_forecasts_anchor_to_each_series() {
    let a = series_at(0, vec![wavy(30)]);
    let b = series_at(5, vec![wavy(20)]);
    let config = RegressionConfig::default()
        .with_lags(Lags::Count(3))
        .with_output_chunk_length(2);
    let mut model = RegressionModel::linear(config).unwrap();
    let episodes = [Episode::new(&a), Episode::new(&b)];
    model.fit(&episodes, &FitOptions::default()).unwrap();

    let forecasts = model.predict_episodes(5, &episodes, 1).unwrap();
    assert_eq!(forecasts.len(), 2);
    assert_eq!(forecasts[0].timestamps()[0], day(30));
    assert_eq!(forecasts[1].timestamps()[0], day(25));
    assert!(forecasts.iter().all(|f| f.horizon() == 5));
}

#[test]
fn multivariate_target_forecasts_every_component() {
    let n = 40;
    let first = wavy(n);
    let second: Vec<f64> = first.iter().map(|v| 100.0 - v).collect();
    let target = series_at(0, vec![first, second]);

    let config = RegressionConfig::default()
        .with_lags(Lags::Count(2))
        .with_output_chunk_length(3);
    let mut model = RegressionModel::linear(config).unwrap();
    model.fit_series(&target).unwrap();

    let forecast = model.predict(4, 1).unwrap();
    assert_eq!(forecast.dimensions(), 2);
    let a = forecast.point(0).unwrap();
    let b = forecast.point(1).unwrap();
    for h in 0..4 {
        assert_relative_eq!(a[h] + b[h], 100.0, epsilon = 1e-4);
    }
}

#[test]
fn parallel_per_column_fit_matches_sequential() {
    let target = series_at(0, vec![wavy(50)]);
    let config = RegressionConfig::default()
        .with_lags(Lags::Count(3))
        .with_output_chunk_length(3);

    let mut sequential =
        RegressionModel::new(config.clone(), QuantileRegression::new(0.5)).unwrap();
    sequential.fit_series(&target).unwrap();

    let mut parallel = RegressionModel::new(config, QuantileRegression::new(0.5)).unwrap();
    parallel
        .fit(
            &[Episode::new(&target)],
            &FitOptions::new().with_n_jobs_multioutput(3),
        )
        .unwrap();

    assert!(parallel.estimator().unwrap().is_wrapped());
    assert_eq!(
        sequential.predict(6, 1).unwrap().primary(),
        parallel.predict(6, 1).unwrap().primary()
    );
}

#[test]
fn sample_cap_limits_training_rows() {
    let target = series_at(0, vec![wavy(60)]);
    let lags = LagSet::new(Some(&Lags::Count(2)), None, None).unwrap();
    let data = create_lagged_data(&[Episode::new(&target)], &lags, 1, Some(10)).unwrap();
    assert_eq!(data.features.nrows(), 10);

    let config = RegressionConfig::default().with_lags(Lags::Count(2));
    let mut model = RegressionModel::linear(config).unwrap();
    model
        .fit(
            &[Episode::new(&target)],
            &FitOptions::new().with_max_samples_per_episode(10),
        )
        .unwrap();
    assert!(model.is_fitted());
}

// =============================================================================
// Probabilistic forecasts
// =============================================================================

#[test]
fn quantile_samples_stay_within_fitted_levels() {
    let n = 80;
    let target = series_at(0, vec![wavy(n)]);
    let config = RegressionConfig::default()
        .with_lags(Lags::Count(2))
        .with_seed(42);
    let mut model = RegressionModel::quantile(
        config,
        Some(vec![0.1, 0.25, 0.5, 0.75, 0.9]),
        QuantileRegression::new,
    )
    .unwrap();
    model.fit_series(&target).unwrap();

    let y = target.values(0).unwrap();
    let row = Array2::from_shape_vec((1, 2), vec![y[n - 2], y[n - 1]]).unwrap();
    let container = model.quantile_models().unwrap();
    let outputs = container.predict_all(row.view()).unwrap();
    let median = container.median().unwrap().predict(row.view()).unwrap()[[0, 0]];
    let lo = outputs.iter().map(|o| o[[0, 0]]).fold(f64::INFINITY, f64::min);
    let hi = outputs.iter().map(|o| o[[0, 0]]).fold(f64::NEG_INFINITY, f64::max);

    let forecast = model.predict(3, 200).unwrap();
    assert_eq!(forecast.num_samples(), 200);
    for s in 0..200 {
        let draw = forecast.sample(0, s).unwrap()[0];
        assert!(draw >= lo - 1e-9 && draw <= hi + 1e-9, "{draw} outside [{lo}, {hi}]");
    }

    // a single sample is the median model's output, whatever the RNG state
    let first = model.predict(3, 1).unwrap();
    let second = model.predict(3, 1).unwrap();
    assert_relative_eq!(first.primary()[0], median, epsilon = 1e-12);
    assert_eq!(first.primary(), second.primary());
}

#[test]
fn gaussian_forecast_centres_on_mean() {
    let n = 60;
    let target = series_at(0, vec![wavy(n)]);
    let config = RegressionConfig::default()
        .with_lags(Lags::Count(3))
        .with_seed(7);
    let mut model = RegressionModel::gaussian(config.clone(), MeanScaleRegression::new()).unwrap();
    model.fit_series(&target).unwrap();

    let point = model.predict(1, 1).unwrap().primary()[0];
    let sampled = model.predict(1, 2000).unwrap();
    let mean_draw = sampled.point(0).unwrap()[0];
    assert!((mean_draw - point).abs() < 0.2, "{mean_draw} vs {point}");

    // same seed, same draws
    let mut again = RegressionModel::gaussian(config, MeanScaleRegression::new()).unwrap();
    again.fit_series(&target).unwrap();
    again.predict(1, 1).unwrap();
    assert_eq!(
        again.predict(1, 2000).unwrap().values(),
        sampled.values()
    );
}

#[test]
fn gaussian_chunks_use_interleaved_pairs() {
    let target = series_at(0, vec![wavy(60)]);
    let config = RegressionConfig::default()
        .with_lags(Lags::Count(2))
        .with_output_chunk_length(3)
        .with_seed(1);
    let mut model = RegressionModel::gaussian(config, MeanScaleRegression::new()).unwrap();
    model.fit_series(&target).unwrap();

    assert!(model.estimator().unwrap().is_wrapped());
    let forecast = model.predict(5, 10).unwrap();
    assert_eq!(forecast.values().shape(), &[5, 1, 10]);
}

#[test]
fn poisson_forecast_draws_counts() {
    let target = series_at(0, vec![counts(60)]);
    let config = RegressionConfig::default()
        .with_lags(Lags::Count(2))
        .with_seed(3);
    let mut model = RegressionModel::poisson(config, PoissonRegression::new()).unwrap();
    model.fit_series(&target).unwrap();

    let rates = model.predict(4, 1).unwrap();
    assert!(rates.primary().iter().all(|r| *r > 0.0));

    let draws = model.predict(4, 50).unwrap();
    assert!(draws
        .values()
        .iter()
        .all(|v| *v >= 0.0 && v.fract() == 0.0));
}

#[test]
fn deterministic_models_reject_multiple_samples() {
    let target = series_at(0, vec![wavy(30)]);
    let config = RegressionConfig::default().with_lags(Lags::Count(2));
    let mut model = RegressionModel::new(config, LinearRegression::new()).unwrap();
    model.fit_series(&target).unwrap();

    assert!(!model.is_probabilistic());
    assert!(matches!(
        model.predict(3, 5),
        Err(ForecastError::InvalidParameter(_))
    ));
}
