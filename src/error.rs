//! Error types for the anofox-regression library.

use crate::lags::LagGroup;
use crate::tabularization::InputDims;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur during tabularization, fitting and prediction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid configuration or parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between matrices.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// No row of an episode had every required lag observed.
    #[error(
        "unable to build any training samples of the target series {}and the corresponding \
         covariate series; there is no time step for which all required lags are available \
         and are not missing values",
        episode_label(.series_index)
    )]
    NoTrainingSamples { series_index: Option<usize> },

    /// Component counts at prediction time differ from the ones seen at fit time.
    #[error(
        "the number of components of the series provided for prediction doesn't match the \
         number of components the model has been trained on; provided for prediction: \
         {provided}, provided for training: {trained}"
    )]
    InputDimsMismatch {
        trained: InputDims,
        provided: InputDims,
    },

    /// A covariate series does not span the window required by the horizon and lags.
    #[error(
        "the {group} covariate of the series at index {series_index} isn't sufficiently long; \
         given horizon n={n}, min lag={min_lag}, max lag={max_lag} and \
         output_chunk_length={output_chunk_length} it has to range from {required_start} until \
         {required_end} (inclusive), but it ranges only from {actual_start} until {actual_end}"
    )]
    InsufficientCovariates {
        group: LagGroup,
        series_index: usize,
        n: usize,
        min_lag: i64,
        max_lag: i64,
        output_chunk_length: usize,
        required_start: DateTime<Utc>,
        required_end: DateTime<Utc>,
        actual_start: DateTime<Utc>,
        actual_end: DateTime<Utc>,
    },

    /// Timestamp-related error.
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Frequency inference failed.
    #[error("could not infer frequency: {0}")]
    FrequencyInference(String),

    /// Index out of bounds.
    #[error("index out of bounds: {index} (size: {size})")]
    IndexOutOfBounds { index: usize, size: usize },

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

fn episode_label(series_index: &Option<usize>) -> String {
    match series_index {
        Some(idx) => format!("at index {} ", idx),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn error_messages_are_descriptive() {
        let err = ForecastError::InsufficientData { needed: 10, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 10, got 5"
        );

        let err = ForecastError::InvalidParameter("output_chunk_length must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "invalid parameter: output_chunk_length must be > 0"
        );

        let err = ForecastError::FitRequired;
        assert_eq!(err.to_string(), "model must be fitted before prediction");
    }

    #[test]
    fn no_training_samples_names_episode_only_when_given() {
        let single = ForecastError::NoTrainingSamples { series_index: None };
        assert!(single
            .to_string()
            .starts_with("unable to build any training samples of the target series and"));

        let multi = ForecastError::NoTrainingSamples {
            series_index: Some(3),
        };
        assert!(multi.to_string().contains("target series at index 3 and"));
    }

    #[test]
    fn input_dims_mismatch_prints_both_signatures() {
        let err = ForecastError::InputDimsMismatch {
            trained: InputDims::new(1, Some(2), None),
            provided: InputDims::new(1, Some(3), None),
        };
        let msg = err.to_string();
        assert!(msg.contains("target: 1, past: 2, future: none"));
        assert!(msg.contains("target: 1, past: 3, future: none"));
    }

    #[test]
    fn coverage_error_reports_required_and_actual_bounds() {
        let t = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let err = ForecastError::InsufficientCovariates {
            group: LagGroup::Future,
            series_index: 0,
            n: 3,
            min_lag: -1,
            max_lag: 1,
            output_chunk_length: 1,
            required_start: t(10),
            required_end: t(14),
            actual_start: t(1),
            actual_end: t(12),
        };
        let msg = err.to_string();
        assert!(msg.contains("future covariate of the series at index 0"));
        assert!(msg.contains("2024-01-10"));
        assert!(msg.contains("2024-01-14"));
        assert!(msg.contains("2024-01-12"));
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = ForecastError::NoTrainingSamples {
            series_index: Some(1),
        };
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
