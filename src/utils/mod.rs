//! Utility functions shared by regressors and forecast summaries.

pub mod stats;

pub use stats::{mean, median, quantile_sorted, std_dev, variance};
