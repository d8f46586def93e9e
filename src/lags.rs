//! Lag specification.
//!
//! Resolves user supplied lag configuration (counts or explicit offsets) into
//! the validated [`LagSet`] shared by tabularization and prediction.
//!
//! A lag is a signed step offset relative to the step being predicted:
//! negative values look into the past, zero and positive values (future
//! covariates only) refer to values known at or after prediction time.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lag configuration for the target and past covariates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lags {
    /// The last `k` steps: `{-k, ..., -1}`.
    Count(usize),
    /// Explicit strictly negative offsets.
    List(Vec<i64>),
}

/// Lag configuration for future covariates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FutureLags {
    /// `past` steps before the prediction step and `future` steps from it on:
    /// `{-past, ..., future - 1}`.
    Span { past: usize, future: usize },
    /// Explicit offsets of any sign.
    List(Vec<i64>),
}

/// The three lag groups, in feature column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LagGroup {
    Target,
    Past,
    Future,
}

impl LagGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            LagGroup::Target => "target",
            LagGroup::Past => "past",
            LagGroup::Future => "future",
        }
    }
}

impl fmt::Display for LagGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings used to size calendar encoder windows around a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderSettings {
    /// Steps needed before (and including) the last target step.
    pub n_steps_back_inclusive: usize,
    /// Steps needed after the last target step, exclusive.
    pub n_steps_ahead_exclusive: usize,
    pub takes_past_covariates: bool,
    pub takes_future_covariates: bool,
}

/// Validated lag groups. Each present group is non-empty, unique and sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagSet {
    target: Option<Vec<i64>>,
    past: Option<Vec<i64>>,
    future: Option<Vec<i64>>,
}

impl LagSet {
    /// Build a lag set from the three optional group configurations.
    pub fn new(
        target: Option<&Lags>,
        past: Option<&Lags>,
        future: Option<&FutureLags>,
    ) -> Result<Self> {
        if target.is_none() && past.is_none() && future.is_none() {
            return Err(ForecastError::InvalidParameter(
                "at least one of `lags`, `lags_past_covariates` or `lags_future_covariates` \
                 must be given"
                    .to_string(),
            ));
        }

        let lag_set = Self {
            target: target
                .map(|l| resolve_past_lags(l, "lags"))
                .transpose()?
                .flatten(),
            past: past
                .map(|l| resolve_past_lags(l, "lags_past_covariates"))
                .transpose()?
                .flatten(),
            future: future.and_then(resolve_future_lags),
        };
        if lag_set.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "every given lag group is empty; at least one lag is required".to_string(),
            ));
        }
        Ok(lag_set)
    }

    /// Lags of the given group, if present.
    pub fn group(&self, group: LagGroup) -> Option<&[i64]> {
        match group {
            LagGroup::Target => self.target.as_deref(),
            LagGroup::Past => self.past.as_deref(),
            LagGroup::Future => self.future.as_deref(),
        }
    }

    pub fn target(&self) -> Option<&[i64]> {
        self.target.as_deref()
    }

    pub fn past(&self) -> Option<&[i64]> {
        self.past.as_deref()
    }

    pub fn future(&self) -> Option<&[i64]> {
        self.future.as_deref()
    }

    pub fn has(&self, group: LagGroup) -> bool {
        self.group(group).is_some()
    }

    /// True when no group is present, e.g. every list was empty.
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.past.is_none() && self.future.is_none()
    }

    /// Present groups with their lags, in feature column order.
    pub fn iter(&self) -> impl Iterator<Item = (LagGroup, &[i64])> {
        [LagGroup::Target, LagGroup::Past, LagGroup::Future]
            .into_iter()
            .filter_map(move |g| self.group(g).map(|lags| (g, lags)))
    }

    /// Smallest lag over all groups.
    pub fn min_lag(&self) -> Option<i64> {
        self.iter().map(|(_, lags)| lags[0]).min()
    }

    /// Largest lag over all groups.
    pub fn max_lag(&self) -> Option<i64> {
        self.iter().map(|(_, lags)| lags[lags.len() - 1]).max()
    }

    /// Number of trailing target steps needed to seed the autoregressive window.
    pub fn target_window(&self) -> usize {
        self.target
            .as_ref()
            .map(|lags| lags[0].unsigned_abs() as usize)
            .unwrap_or(0)
    }

    /// Number of feature columns for the given component counts.
    pub fn n_features(&self, dims: &crate::tabularization::InputDims) -> usize {
        self.iter()
            .map(|(group, lags)| lags.len() * dims.width(group).unwrap_or(0))
            .sum()
    }

    /// Window sizes a calendar encoder must generate covariates for.
    pub fn encoder_settings(&self) -> EncoderSettings {
        let covariate_lags: Vec<i64> = [&self.past, &self.future]
            .into_iter()
            .flatten()
            .flat_map(|lags| lags.iter().copied())
            .collect();

        let (Some(&min), Some(&max)) = (covariate_lags.iter().min(), covariate_lags.iter().max())
        else {
            return EncoderSettings::default();
        };

        EncoderSettings {
            n_steps_back_inclusive: min.min(0).unsigned_abs() as usize,
            n_steps_ahead_exclusive: max.max(0) as usize + 1,
            takes_past_covariates: self.past.is_some(),
            takes_future_covariates: self.future.is_some(),
        }
    }

    /// Number of prediction steps an encoder must cover for horizon `n`.
    ///
    /// Future lags reach `max_lag` steps past the last prediction, so the
    /// encoded window grows accordingly.
    pub fn encoder_prediction_steps(&self, n: usize) -> usize {
        let settings = self.encoder_settings();
        if settings.takes_future_covariates {
            n + settings.n_steps_ahead_exclusive - 1
        } else {
            n
        }
    }

    /// Minimum target length that can yield a training sample.
    pub fn min_train_series_length(&self, output_chunk_length: usize) -> usize {
        let needed = match &self.target {
            Some(lags) => lags[0].unsigned_abs() as usize + output_chunk_length,
            None => output_chunk_length,
        };
        needed.max(3)
    }
}

fn resolve_past_lags(lags: &Lags, name: &str) -> Result<Option<Vec<i64>>> {
    match lags {
        Lags::Count(0) => Err(ForecastError::InvalidParameter(format!(
            "`{}` must be strictly positive. Given: 0",
            name
        ))),
        Lags::Count(k) => {
            let k = *k as i64;
            Ok(Some((-k..0).collect()))
        }
        Lags::List(list) => {
            if let Some(bad) = list.iter().find(|&&lag| lag >= 0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "every element of `{}` must be a strictly negative integer. Given: {:?} \
                     (offending lag {})",
                    name, list, bad
                )));
            }
            Ok(sorted_unique(list))
        }
    }
}

fn resolve_future_lags(lags: &FutureLags) -> Option<Vec<i64>> {
    match lags {
        FutureLags::Span { past: 0, future: 0 } => None,
        FutureLags::Span { past, future } => Some((-(*past as i64)..*future as i64).collect()),
        FutureLags::List(list) => sorted_unique(list),
    }
}

fn sorted_unique(list: &[i64]) -> Option<Vec<i64>> {
    let mut lags = list.to_vec();
    lags.sort_unstable();
    lags.dedup();
    if lags.is_empty() {
        None
    } else {
        Some(lags)
    }
}
