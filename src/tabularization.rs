//! Lagged-matrix builder.
//!
//! Turns episodes of (target, past covariates, future covariates) into the
//! feature matrix `X` and label matrix `Y` consumed by tabular regressors.
//!
//! `X` has the column layout
//!
//! ```text
//! lags_target | lags_past_covariates | lags_future_covariates
//! ```
//!
//! where each block is ordered by ascending lag, then component. For lags
//! `[-2, -1]` on a two component series:
//!
//! ```text
//! lag-2_comp0 | lag-2_comp1 | lag-1_comp0 | lag-1_comp1
//! ```
//!
//! `Y` holds `output_chunk_length` blocks, step 0 first, each block holding
//! every target component. The predictor rebuilds exactly this layout at
//! inference time.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::lags::{LagGroup, LagSet};
use ndarray::Array2;
use std::fmt;
use tracing::debug;

/// Component counts of the target and covariate series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDims {
    pub target: usize,
    pub past: Option<usize>,
    pub future: Option<usize>,
}

impl InputDims {
    pub fn new(target: usize, past: Option<usize>, future: Option<usize>) -> Self {
        Self {
            target,
            past,
            future,
        }
    }

    /// Width of the series feeding `group`, if that series is present.
    pub fn width(&self, group: LagGroup) -> Option<usize> {
        match group {
            LagGroup::Target => Some(self.target),
            LagGroup::Past => self.past,
            LagGroup::Future => self.future,
        }
    }
}

impl fmt::Display for InputDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |w: Option<usize>| w.map_or_else(|| "none".to_string(), |w| w.to_string());
        write!(
            f,
            "{{target: {}, past: {}, future: {}}}",
            self.target,
            show(self.past),
            show(self.future)
        )
    }
}

/// One aligned (target, past covariates, future covariates) triple.
#[derive(Debug, Clone, Copy)]
pub struct Episode<'a> {
    pub target: &'a TimeSeries,
    pub past_covariates: Option<&'a TimeSeries>,
    pub future_covariates: Option<&'a TimeSeries>,
}

impl<'a> Episode<'a> {
    pub fn new(target: &'a TimeSeries) -> Self {
        Self {
            target,
            past_covariates: None,
            future_covariates: None,
        }
    }

    pub fn with_past_covariates(mut self, covariates: &'a TimeSeries) -> Self {
        self.past_covariates = Some(covariates);
        self
    }

    pub fn with_future_covariates(mut self, covariates: &'a TimeSeries) -> Self {
        self.future_covariates = Some(covariates);
        self
    }

    /// Series feeding the given lag group.
    pub fn series(&self, group: LagGroup) -> Option<&'a TimeSeries> {
        match group {
            LagGroup::Target => Some(self.target),
            LagGroup::Past => self.past_covariates,
            LagGroup::Future => self.future_covariates,
        }
    }

    pub fn input_dims(&self) -> InputDims {
        InputDims::new(
            self.target.dimensions(),
            self.past_covariates.map(|s| s.dimensions()),
            self.future_covariates.map(|s| s.dimensions()),
        )
    }
}

/// Owned copy of an episode, kept by a model fitted on a single series.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedEpisode {
    pub target: TimeSeries,
    pub past_covariates: Option<TimeSeries>,
    pub future_covariates: Option<TimeSeries>,
}

impl OwnedEpisode {
    pub fn as_episode(&self) -> Episode<'_> {
        Episode {
            target: &self.target,
            past_covariates: self.past_covariates.as_ref(),
            future_covariates: self.future_covariates.as_ref(),
        }
    }
}

impl From<&Episode<'_>> for OwnedEpisode {
    fn from(episode: &Episode<'_>) -> Self {
        Self {
            target: episode.target.clone(),
            past_covariates: episode.past_covariates.cloned(),
            future_covariates: episode.future_covariates.cloned(),
        }
    }
}

/// Training matrices stacked over all episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct LaggedData {
    /// `X`, one row per usable time step.
    pub features: Array2<f64>,
    /// `Y`, aligned row by row with `features`.
    pub labels: Array2<f64>,
    /// Rows contributed by each episode, in episode order.
    pub samples_per_episode: Vec<usize>,
}

/// Check that covariates are given exactly for the groups that have lags.
pub fn check_covariates(episode: &Episode<'_>, lags: &LagSet, context: &str) -> Result<()> {
    for group in [LagGroup::Past, LagGroup::Future] {
        match (episode.series(group).is_some(), lags.has(group)) {
            (true, false) => {
                return Err(ForecastError::InvalidParameter(format!(
                    "`{group}_covariates` given in {context}, but the model has no \
                     `lags_{group}_covariates`"
                )))
            }
            (false, true) => {
                return Err(ForecastError::InvalidParameter(format!(
                    "`{group}_covariates` missing in {context}, but the model has \
                     `lags_{group}_covariates`"
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Build `X` and `Y` from every episode and stack them in episode order.
///
/// Rows where any required lag or label is outside its series or not finite
/// are dropped. With `max_samples_per_episode` only the most recent rows of
/// each episode are kept.
pub fn create_lagged_data(
    episodes: &[Episode<'_>],
    lags: &LagSet,
    output_chunk_length: usize,
    max_samples_per_episode: Option<usize>,
) -> Result<LaggedData> {
    if episodes.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if output_chunk_length == 0 {
        return Err(ForecastError::InvalidParameter(
            "output_chunk_length must be an integer greater than 0. Given: 0".to_string(),
        ));
    }
    if max_samples_per_episode == Some(0) {
        return Err(ForecastError::InvalidParameter(
            "max_samples_per_episode must be positive when given".to_string(),
        ));
    }

    let dims = episodes[0].input_dims();
    if dims.target == 0 {
        return Err(ForecastError::EmptyData);
    }
    let n_features = lags.n_features(&dims);
    let n_labels = output_chunk_length * dims.target;

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut samples_per_episode = Vec::with_capacity(episodes.len());

    for (idx, episode) in episodes.iter().enumerate() {
        check_covariates(episode, lags, "the training data")?;
        if episode.input_dims() != dims {
            return Err(ForecastError::InvalidParameter(format!(
                "all episodes must share component counts; episode 0 has {}, episode {} has {}",
                dims,
                idx,
                episode.input_dims()
            )));
        }

        let (x, y) = episode_rows(episode, lags, output_chunk_length)?;
        let mut rows = y.len() / n_labels;
        let mut skip = 0;
        if let Some(cap) = max_samples_per_episode {
            if rows > cap {
                skip = rows - cap;
                rows = cap;
            }
        }

        if rows == 0 {
            let series_index = (episodes.len() > 1).then_some(idx);
            return Err(ForecastError::NoTrainingSamples { series_index });
        }

        features.extend_from_slice(&x[skip * n_features..]);
        labels.extend_from_slice(&y[skip * n_labels..]);
        samples_per_episode.push(rows);
        debug!(episode = idx, samples = rows, dropped = skip, "built lagged samples");
    }

    let total: usize = samples_per_episode.iter().sum();
    let features = Array2::from_shape_vec((total, n_features), features)
        .map_err(|e| ForecastError::ComputationError(e.to_string()))?;
    let labels = Array2::from_shape_vec((total, n_labels), labels)
        .map_err(|e| ForecastError::ComputationError(e.to_string()))?;

    Ok(LaggedData {
        features,
        labels,
        samples_per_episode,
    })
}

/// Names of the feature columns, in column order.
pub fn lagged_feature_names(lags: &LagSet, dims: &InputDims) -> Vec<String> {
    let mut names = Vec::with_capacity(lags.n_features(dims));
    for (group, group_lags) in lags.iter() {
        let width = dims.width(group).unwrap_or(0);
        for &lag in group_lags {
            for comp in 0..width {
                names.push(format!("{}_lag{}_c{}", group, lag, comp));
            }
        }
    }
    names
}

/// Names of the label columns, in column order.
pub fn lagged_label_names(output_chunk_length: usize, target_width: usize) -> Vec<String> {
    (0..output_chunk_length)
        .flat_map(|step| (0..target_width).map(move |comp| format!("target_step{}_c{}", step, comp)))
        .collect()
}

/// A series positioned on the target's step grid.
struct Aligned<'a> {
    series: &'a TimeSeries,
    /// Step of the series' first observation relative to the target start.
    offset: i64,
}

impl Aligned<'_> {
    fn get(&self, step: i64, dimension: usize) -> Option<f64> {
        let idx = step - self.offset;
        if idx < 0 {
            return None;
        }
        self.series
            .value(idx as usize, dimension)
            .filter(|v| v.is_finite())
    }

    /// Append every component at `step`; false if any is missing.
    fn push_row(&self, row: &mut Vec<f64>, step: i64) -> bool {
        for dim in 0..self.series.dimensions() {
            match self.get(step, dim) {
                Some(v) => row.push(v),
                None => return false,
            }
        }
        true
    }
}

fn align<'a>(target: &TimeSeries, series: &'a TimeSeries, group: LagGroup) -> Result<Aligned<'a>> {
    if series.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    let freq = target.freq()?;
    if series.len() > 1 && series.freq()? != freq {
        return Err(ForecastError::TimestampError(format!(
            "{} covariates have frequency {}, the target has {}",
            group,
            series.freq()?,
            freq
        )));
    }
    if !series.is_regular()? {
        return Err(ForecastError::TimestampError(format!(
            "{} covariates are not regularly spaced",
            group
        )));
    }
    let offset = target.steps_between(target.start_time()?, series.start_time()?)?;
    Ok(Aligned { series, offset })
}

/// Flat row-major features and labels of one episode, chronological, complete rows only.
fn episode_rows(
    episode: &Episode<'_>,
    lags: &LagSet,
    output_chunk_length: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let target = episode.target;
    if target.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if !target.is_regular()? {
        return Err(ForecastError::TimestampError(
            "target series is not regularly spaced".to_string(),
        ));
    }

    let mut sources = Vec::new();
    for (group, group_lags) in lags.iter() {
        let aligned = match group {
            LagGroup::Target => Aligned {
                series: target,
                offset: 0,
            },
            _ => {
                let series = episode.series(group).ok_or_else(|| {
                    ForecastError::InvalidParameter(format!("`{}_covariates` missing", group))
                })?;
                align(target, series, group)?
            }
        };
        sources.push((aligned, group_lags));
    }
    let target_source = Aligned {
        series: target,
        offset: 0,
    };

    let mut features = Vec::new();
    let mut labels = Vec::new();
    let mut x_row = Vec::new();
    let mut y_row = Vec::new();

    'rows: for t in 0..target.len() as i64 {
        y_row.clear();
        for step in 0..output_chunk_length as i64 {
            if !target_source.push_row(&mut y_row, t + step) {
                continue 'rows;
            }
        }

        x_row.clear();
        for (source, group_lags) in &sources {
            for &lag in group_lags.iter() {
                if !source.push_row(&mut x_row, t + lag) {
                    continue 'rows;
                }
            }
        }

        features.extend_from_slice(&x_row);
        labels.extend_from_slice(&y_row);
    }

    Ok((features, labels))
}
