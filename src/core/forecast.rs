//! Forecast result structure for holding predictions.

use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::utils::stats::{mean, quantile_sorted};
use chrono::{DateTime, Utc};
use ndarray::{s, Array3, Axis};

/// A forecast holding one or more sampled trajectories per component.
///
/// Values are shaped `(horizon, components, samples)`. A deterministic
/// forecast has exactly one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    timestamps: Vec<DateTime<Utc>>,
    values: Array3<f64>,
    labels: Vec<String>,
}

impl Forecast {
    /// Create a forecast from timestamps and `(horizon, components, samples)` values.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Array3<f64>) -> Result<Self> {
        if values.len_of(Axis(0)) != timestamps.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: timestamps.len(),
                got: values.len_of(Axis(0)),
            });
        }
        if values.len_of(Axis(2)) == 0 {
            return Err(ForecastError::InvalidParameter(
                "a forecast needs at least one sample".to_string(),
            ));
        }
        Ok(Self {
            timestamps,
            values,
            labels: Vec::new(),
        })
    }

    /// Attach component labels.
    pub fn with_labels(mut self, labels: Vec<String>) -> Result<Self> {
        if !labels.is_empty() && labels.len() != self.dimensions() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.dimensions(),
                got: labels.len(),
            });
        }
        self.labels = labels;
        Ok(self)
    }

    /// Get the forecast horizon (number of steps).
    pub fn horizon(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    /// Get the number of components.
    pub fn dimensions(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    /// Number of sampled trajectories.
    pub fn num_samples(&self) -> usize {
        self.values.len_of(Axis(2))
    }

    pub fn is_deterministic(&self) -> bool {
        self.num_samples() == 1
    }

    /// Check if forecast is empty.
    pub fn is_empty(&self) -> bool {
        self.horizon() == 0
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// All values, `(horizon, components, samples)`.
    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    fn check_dimension(&self, dimension: usize) -> Result<()> {
        if dimension >= self.dimensions() {
            return Err(ForecastError::IndexOutOfBounds {
                index: dimension,
                size: self.dimensions(),
            });
        }
        Ok(())
    }

    /// Point forecast of one component: the mean over samples.
    pub fn point(&self, dimension: usize) -> Result<Vec<f64>> {
        self.check_dimension(dimension)?;
        Ok((0..self.horizon())
            .map(|h| {
                let draws: Vec<f64> = self.values.slice(s![h, dimension, ..]).to_vec();
                mean(&draws)
            })
            .collect())
    }

    /// Point forecast of the first component.
    pub fn primary(&self) -> Vec<f64> {
        self.point(0).unwrap_or_default()
    }

    /// One sampled trajectory of one component.
    pub fn sample(&self, dimension: usize, sample: usize) -> Result<Vec<f64>> {
        self.check_dimension(dimension)?;
        if sample >= self.num_samples() {
            return Err(ForecastError::IndexOutOfBounds {
                index: sample,
                size: self.num_samples(),
            });
        }
        Ok(self.values.slice(s![.., dimension, sample]).to_vec())
    }

    /// Empirical quantile over samples for every step of one component.
    pub fn quantile(&self, dimension: usize, q: f64) -> Result<Vec<f64>> {
        self.check_dimension(dimension)?;
        if !(0.0..=1.0).contains(&q) {
            return Err(ForecastError::InvalidParameter(format!(
                "quantile must lie in [0, 1], got {}",
                q
            )));
        }
        Ok((0..self.horizon())
            .map(|h| {
                let mut draws: Vec<f64> =
                    self.values.slice(s![h, dimension, ..]).to_vec();
                draws.sort_by(|a, b| a.total_cmp(b));
                quantile_sorted(&draws, q)
            })
            .collect())
    }

    /// Central prediction interval at `level`, e.g. 0.9 for the 5%-95% band.
    pub fn interval(&self, dimension: usize, level: f64) -> Result<(Vec<f64>, Vec<f64>)> {
        if !(0.0..1.0).contains(&level) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval level must lie in [0, 1), got {}",
                level
            )));
        }
        let tail = (1.0 - level) / 2.0;
        Ok((
            self.quantile(dimension, tail)?,
            self.quantile(dimension, 1.0 - tail)?,
        ))
    }

    /// Convert a deterministic forecast into a time series.
    pub fn to_time_series(&self) -> Result<TimeSeries> {
        if !self.is_deterministic() {
            return Err(ForecastError::InvalidParameter(format!(
                "only deterministic forecasts convert to a time series, this one has {} samples",
                self.num_samples()
            )));
        }
        let values = (0..self.dimensions())
            .map(|d| self.values.slice(s![.., d, 0]).to_vec())
            .collect();
        crate::core::TimeSeriesBuilder::new()
            .timestamps(self.timestamps.clone())
            .multivariate_values(values, crate::core::ValueLayout::Column)
            .labels(self.labels.clone())
            .build()
    }
}
