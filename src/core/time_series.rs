//! TimeSeries data structure for representing regularly sampled temporal data.

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Utc};
use ndarray::Array2;
use std::collections::HashMap;

/// Layout of multivariate data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueLayout {
    /// Each inner vector is a dimension (column-major).
    #[default]
    Column,
    /// Each inner vector is an observation across dimensions (row-major).
    Row,
}

/// A time series with timestamps and values.
///
/// Missing observations are encoded as `NaN`; tabularization skips any sample
/// touching one.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    /// Values stored in column-major format: values[dimension][observation]
    values: Vec<Vec<f64>>,
    labels: Vec<String>,
    frequency: Option<Duration>,
}

/// Builder for constructing TimeSeries.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesBuilder {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<Vec<f64>>,
    layout: ValueLayout,
    labels: Vec<String>,
    frequency: Option<Duration>,
}

impl TimeSeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamps(mut self, timestamps: Vec<DateTime<Utc>>) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Generate `len` timestamps starting at `start`, spaced by `freq`.
    pub fn regular_index(mut self, start: DateTime<Utc>, freq: Duration, len: usize) -> Self {
        self.timestamps = (0..len)
            .map_while(|i| step_time(start, freq, i as i64))
            .collect();
        self.frequency = Some(freq);
        self
    }

    /// Set univariate values.
    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.values = vec![values];
        self.layout = ValueLayout::Column;
        self
    }

    /// Set multivariate values with specified layout.
    pub fn multivariate_values(mut self, values: Vec<Vec<f64>>, layout: ValueLayout) -> Self {
        self.values = values;
        self.layout = layout;
        self
    }

    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn frequency(mut self, freq: Duration) -> Self {
        self.frequency = Some(freq);
        self
    }

    pub fn build(self) -> Result<TimeSeries> {
        TimeSeries::new(
            self.timestamps,
            self.values,
            self.layout,
            self.labels,
            self.frequency,
        )
    }
}

impl TimeSeries {
    /// Create a new TimeSeries with full configuration.
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<Vec<f64>>,
        layout: ValueLayout,
        labels: Vec<String>,
        frequency: Option<Duration>,
    ) -> Result<Self> {
        for i in 1..timestamps.len() {
            if timestamps[i] <= timestamps[i - 1] {
                return Err(ForecastError::TimestampError(
                    "timestamps must be strictly increasing".to_string(),
                ));
            }
        }

        if let Some(freq) = frequency {
            if freq <= Duration::zero() {
                return Err(ForecastError::InvalidParameter(format!(
                    "frequency must be positive, got {}",
                    freq
                )));
            }
        }

        let values = match layout {
            ValueLayout::Column => {
                for series in &values {
                    if series.len() != timestamps.len() {
                        return Err(ForecastError::DimensionMismatch {
                            expected: timestamps.len(),
                            got: series.len(),
                        });
                    }
                }
                values
            }
            ValueLayout::Row => {
                if values.len() != timestamps.len() {
                    return Err(ForecastError::DimensionMismatch {
                        expected: timestamps.len(),
                        got: values.len(),
                    });
                }

                let dims = values.first().map(|row| row.len()).unwrap_or(0);
                for row in &values {
                    if row.len() != dims {
                        return Err(ForecastError::DimensionMismatch {
                            expected: dims,
                            got: row.len(),
                        });
                    }
                }

                (0..dims)
                    .map(|d| values.iter().map(|row| row[d]).collect())
                    .collect()
            }
        };

        if !labels.is_empty() && labels.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: values.len(),
                got: labels.len(),
            });
        }

        Ok(Self {
            timestamps,
            values,
            labels,
            frequency,
        })
    }

    /// Create a simple univariate time series.
    pub fn univariate(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        Self::new(timestamps, vec![values], ValueLayout::Column, vec![], None)
    }

    /// Create a regularly spaced series from column-major values.
    pub fn regular(start: DateTime<Utc>, freq: Duration, values: Vec<Vec<f64>>) -> Result<Self> {
        let len = values.first().map(|v| v.len()).unwrap_or(0);
        TimeSeriesBuilder::new()
            .regular_index(start, freq, len)
            .multivariate_values(values, ValueLayout::Column)
            .build()
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Get the number of dimensions (components).
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    /// Check if the series is multivariate.
    pub fn is_multivariate(&self) -> bool {
        self.values.len() > 1
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// First timestamp.
    pub fn start_time(&self) -> Result<DateTime<Utc>> {
        self.timestamps.first().copied().ok_or(ForecastError::EmptyData)
    }

    /// Last timestamp.
    pub fn end_time(&self) -> Result<DateTime<Utc>> {
        self.timestamps.last().copied().ok_or(ForecastError::EmptyData)
    }

    /// Get values for a specific dimension.
    pub fn values(&self, dimension: usize) -> Result<&[f64]> {
        self.values
            .get(dimension)
            .map(|v| v.as_slice())
            .ok_or(ForecastError::IndexOutOfBounds {
                index: dimension,
                size: self.values.len(),
            })
    }

    /// Get primary (first dimension) values.
    pub fn primary_values(&self) -> &[f64] {
        self.values.first().map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Value at observation `index` of `dimension`, without bounds errors.
    pub fn value(&self, index: usize, dimension: usize) -> Option<f64> {
        self.values.get(dimension).and_then(|dim| dim.get(index)).copied()
    }

    /// Get a row (observation at index across all dimensions).
    pub fn row(&self, index: usize) -> Result<Vec<f64>> {
        if index >= self.len() {
            return Err(ForecastError::IndexOutOfBounds {
                index,
                size: self.len(),
            });
        }
        Ok(self.values.iter().map(|dim| dim[index]).collect())
    }

    /// Values as a `[time, component]` matrix.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.len(), self.dimensions()), |(t, d)| self.values[d][t])
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Get the explicitly set frequency.
    pub fn frequency(&self) -> Option<Duration> {
        self.frequency
    }

    pub fn set_frequency(&mut self, freq: Duration) -> Result<()> {
        if freq <= Duration::zero() {
            return Err(ForecastError::InvalidParameter(format!(
                "frequency must be positive, got {}",
                freq
            )));
        }
        self.frequency = Some(freq);
        Ok(())
    }

    /// Frequency of the series: the explicit one, or the inferred modal spacing.
    pub fn freq(&self) -> Result<Duration> {
        match self.frequency {
            Some(freq) => Ok(freq),
            None => self.infer_frequency(0.5),
        }
    }

    /// Check if every timestamp sits on `start + i * freq`.
    pub fn is_regular(&self) -> Result<bool> {
        if self.len() < 2 {
            return Ok(true);
        }
        let freq = self.freq()?;
        let start = self.timestamps[0];
        Ok(self
            .timestamps
            .iter()
            .enumerate()
            .all(|(i, &t)| step_time(start, freq, i as i64) == Some(t)))
    }

    /// Timestamp `steps` frequency steps away from `from` (may be negative).
    pub fn shift_time(&self, from: DateTime<Utc>, steps: i64) -> Result<DateTime<Utc>> {
        let freq = self.freq()?;
        step_time(from, freq, steps).ok_or_else(|| {
            ForecastError::TimestampError(format!(
                "{} shifted by {} steps of {} is out of range",
                from, steps, freq
            ))
        })
    }

    /// Number of whole frequency steps from `from` to `to`.
    pub fn steps_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<i64> {
        let freq = self.freq()?;
        let out_of_range = || {
            ForecastError::TimestampError(format!(
                "steps of {} between {} and {} exceed nanosecond range",
                freq, from, to
            ))
        };
        let freq_ns = freq.num_nanoseconds().ok_or_else(out_of_range)?;
        let diff_ns = (to - from).num_nanoseconds().ok_or_else(out_of_range)?;
        if freq_ns <= 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "frequency must be positive, got {}",
                freq
            )));
        }
        if diff_ns % freq_ns != 0 {
            return Err(ForecastError::TimestampError(format!(
                "{} and {} are not an integral number of steps of {} apart",
                from, to, freq
            )));
        }
        Ok(diff_ns / freq_ns)
    }

    /// Extract a slice of the time series by position.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end {
            return Err(ForecastError::InvalidParameter(
                "start must be <= end".to_string(),
            ));
        }
        if end > self.len() {
            return Err(ForecastError::IndexOutOfBounds {
                index: end,
                size: self.len(),
            });
        }

        Ok(TimeSeries {
            timestamps: self.timestamps[start..end].to_vec(),
            values: self
                .values
                .iter()
                .map(|dim| dim[start..end].to_vec())
                .collect(),
            labels: self.labels.clone(),
            frequency: self.frequency,
        })
    }

    /// Extract the observations with `start <= t <= end`.
    pub fn slice_time(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<TimeSeries> {
        let from = self.timestamps.partition_point(|&t| t < start);
        let to = self.timestamps.partition_point(|&t| t <= end);
        self.slice(from, to.max(from))
    }

    /// The last `n` observations.
    pub fn tail(&self, n: usize) -> Result<TimeSeries> {
        if n > self.len() {
            return Err(ForecastError::InsufficientData {
                needed: n,
                got: self.len(),
            });
        }
        self.slice(self.len() - n, self.len())
    }

    /// Check if series has missing values (NaN or Inf).
    pub fn has_missing_values(&self) -> bool {
        self.values
            .iter()
            .any(|dim| dim.iter().any(|v| !v.is_finite()))
    }

    /// Infer frequency from timestamps.
    pub fn infer_frequency(&self, tolerance: f64) -> Result<Duration> {
        if self.len() < 2 {
            return Err(ForecastError::FrequencyInference(format!(
                "need at least 2 timestamps, got {}",
                self.len()
            )));
        }

        let diffs: Vec<i64> = self
            .timestamps
            .windows(2)
            .map(|w| {
                (w[1] - w[0]).num_nanoseconds().ok_or_else(|| {
                    ForecastError::FrequencyInference(format!(
                        "spacing between {} and {} exceeds nanosecond range",
                        w[0], w[1]
                    ))
                })
            })
            .collect::<Result<_>>()?;

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for &diff in &diffs {
            *counts.entry(diff).or_insert(0) += 1;
        }

        let (modal_diff, modal_count) = counts
            .iter()
            .max_by_key(|(&diff, &count)| (count, -diff))
            .map(|(&diff, &count)| (diff, count))
            .ok_or(ForecastError::FrequencyInference(
                "empty spacing data".to_string(),
            ))?;

        let modal_ratio = modal_count as f64 / diffs.len() as f64;
        if modal_ratio < tolerance {
            return Err(ForecastError::FrequencyInference(
                "no unique modal spacing found".to_string(),
            ));
        }

        Ok(Duration::nanoseconds(modal_diff))
    }
}

/// `start + steps * freq` in nanoseconds; `None` on overflow.
fn step_time(start: DateTime<Utc>, freq: Duration, steps: i64) -> Option<DateTime<Utc>> {
    let offset = freq.num_nanoseconds()?.checked_mul(steps)?;
    start.checked_add_signed(Duration::nanoseconds(offset))
}
