//! Probabilistic sampling strategies.
//!
//! Every row handed to a sampler is already one draw: the predictor replicates
//! each episode `num_samples` times before predicting. Samplers therefore map
//! one regressor output to one sampled value per `(row, column)`.

use crate::error::{ForecastError, Result};
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantile levels fitted when none are given.
pub const DEFAULT_QUANTILES: [f64; 9] = [0.01, 0.05, 0.1, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99];

/// Output distribution of a probabilistic regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    /// One model per quantile level, sampled by interpolation.
    Quantile(Vec<f64>),
    /// Regressor emits `(mean, scale)` pairs.
    Gaussian,
    /// Regressor emits a non-negative rate.
    Poisson,
}

impl Likelihood {
    /// Quantile likelihood over the default levels.
    pub fn quantile() -> Self {
        Likelihood::Quantile(DEFAULT_QUANTILES.to_vec())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Likelihood::Quantile(_) => "quantile",
            Likelihood::Gaussian => "gaussian",
            Likelihood::Poisson => "poisson",
        }
    }

    /// Regressor output columns per label column.
    pub fn outputs_per_label(&self) -> usize {
        match self {
            Likelihood::Gaussian => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Likelihood::Quantile(levels) => write!(f, "quantile{:?}", levels),
            other => f.write_str(other.name()),
        }
    }
}

/// Validate quantile levels: strictly ascending, inside (0, 1), containing 0.5.
pub fn check_quantiles(quantiles: &[f64]) -> Result<()> {
    if quantiles.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "quantile likelihood needs at least one level".to_string(),
        ));
    }
    if let Some(bad) = quantiles.iter().find(|q| !(**q > 0.0 && **q < 1.0)) {
        return Err(ForecastError::InvalidParameter(format!(
            "quantiles must lie in (0, 1), got {}",
            bad
        )));
    }
    if quantiles.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ForecastError::InvalidParameter(format!(
            "quantiles must be strictly ascending, got {:?}",
            quantiles
        )));
    }
    if !quantiles.iter().any(|q| (q - 0.5).abs() < 1e-12) {
        return Err(ForecastError::InvalidParameter(format!(
            "quantiles must include 0.5, got {:?}",
            quantiles
        )));
    }
    Ok(())
}

/// Draw by inverse transform over the fitted quantile outputs.
///
/// `outputs[i]` holds the predictions of the model fitted at `levels[i]`.
/// The level grid is extended with 0 and 1, reusing the outermost outputs,
/// and a uniform draw is interpolated linearly between the bracketing levels.
pub fn quantile_sampling(
    levels: &[f64],
    outputs: &[Array2<f64>],
    rng: &mut StdRng,
) -> Result<Array2<f64>> {
    let (Some(first), Some(last)) = (outputs.first(), outputs.last()) else {
        return Err(ForecastError::EmptyData);
    };
    if levels.len() != outputs.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: levels.len(),
            got: outputs.len(),
        });
    }
    if let Some(bad) = outputs.iter().find(|o| o.dim() != first.dim()) {
        return Err(ForecastError::DimensionMismatch {
            expected: first.len(),
            got: bad.len(),
        });
    }

    let mut grid = Vec::with_capacity(levels.len() + 2);
    grid.push(0.0);
    grid.extend_from_slice(levels);
    grid.push(1.0);

    let mut views: Vec<ArrayView2<'_, f64>> = Vec::with_capacity(outputs.len() + 2);
    views.push(first.view());
    views.extend(outputs.iter().map(|o| o.view()));
    views.push(last.view());

    let (rows, cols) = first.dim();
    let mut sampled = Array2::zeros((rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            let u: f64 = rng.gen();
            // first grid index strictly above u; grid[0] = 0 <= u < 1 = grid[last]
            let upper = grid.partition_point(|level| *level <= u).clamp(1, grid.len() - 1);
            let lower = upper - 1;
            let (q_lo, q_hi) = (grid[lower], grid[upper]);
            let (v_lo, v_hi) = (views[lower][[r, c]], views[upper][[r, c]]);
            let weight = if q_hi > q_lo { (u - q_lo) / (q_hi - q_lo) } else { 0.0 };
            sampled[[r, c]] = v_lo + weight * (v_hi - v_lo);
        }
    }
    Ok(sampled)
}

/// Means of interleaved `(mean, scale)` pairs.
pub fn pair_means(pairs: &Array2<f64>) -> Result<Array2<f64>> {
    check_pairs(pairs)?;
    Ok(pairs.slice(ndarray::s![.., ..;2]).to_owned())
}

/// One Gaussian draw per interleaved `(mean, scale)` pair.
pub fn normal_sampling(pairs: &Array2<f64>, rng: &mut StdRng) -> Result<Array2<f64>> {
    check_pairs(pairs)?;
    let (rows, cols) = pairs.dim();
    let mut sampled = Array2::zeros((rows, cols / 2));
    for ((r, c), out) in sampled.indexed_iter_mut() {
        let mean = pairs[[r, 2 * c]];
        let scale = pairs[[r, 2 * c + 1]];
        let normal = Normal::new(mean, scale).map_err(|e| {
            ForecastError::ComputationError(format!(
                "invalid Gaussian parameters (mean {}, scale {}): {}",
                mean, scale, e
            ))
        })?;
        *out = normal.sample(rng);
    }
    Ok(sampled)
}

/// One Poisson draw per rate; non-positive rates yield 0.
pub fn poisson_sampling(rates: &Array2<f64>, rng: &mut StdRng) -> Result<Array2<f64>> {
    let mut sampled = Array2::zeros(rates.raw_dim());
    for (out, &rate) in sampled.iter_mut().zip(rates.iter()) {
        if rate <= 0.0 {
            *out = 0.0;
            continue;
        }
        let poisson = Poisson::new(rate).map_err(|e| {
            ForecastError::ComputationError(format!("invalid Poisson rate {}: {}", rate, e))
        })?;
        *out = poisson.sample(rng);
    }
    Ok(sampled)
}

fn check_pairs(pairs: &Array2<f64>) -> Result<()> {
    if pairs.len_of(Axis(1)) % 2 != 0 {
        return Err(ForecastError::InvalidParameter(format!(
            "Gaussian likelihood expects (mean, scale) pairs, got {} output columns",
            pairs.ncols()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn quantile_levels_are_validated() {
        assert!(check_quantiles(&DEFAULT_QUANTILES).is_ok());
        assert!(check_quantiles(&[0.5]).is_ok());
        assert!(check_quantiles(&[]).is_err());
        assert!(check_quantiles(&[0.1, 0.9]).is_err());
        assert!(check_quantiles(&[0.5, 0.1]).is_err());
        assert!(check_quantiles(&[0.0, 0.5]).is_err());
        assert!(check_quantiles(&[0.5, 0.5]).is_err());
    }

    #[test]
    fn quantile_draws_stay_within_fitted_range() {
        let levels = [0.1, 0.5, 0.9];
        let outputs = vec![
            Array2::from_elem((50, 2), -1.0),
            Array2::from_elem((50, 2), 0.0),
            Array2::from_elem((50, 2), 2.0),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let sampled = quantile_sampling(&levels, &outputs, &mut rng).unwrap();

        assert_eq!(sampled.dim(), (50, 2));
        assert!(sampled.iter().all(|v| (-1.0..=2.0).contains(v)));
        // both halves of the distribution are hit
        assert!(sampled.iter().any(|v| *v < 0.0));
        assert!(sampled.iter().any(|v| *v > 0.0));
    }

    #[test]
    fn identical_quantile_outputs_give_that_value() {
        let outputs = vec![array![[3.0]], array![[3.0]]];
        let mut rng = StdRng::seed_from_u64(1);
        let sampled = quantile_sampling(&[0.25, 0.5], &outputs, &mut rng).unwrap();
        assert_relative_eq!(sampled[[0, 0]], 3.0);
    }

    #[test]
    fn gaussian_pairs_are_split() {
        let pairs = array![[1.0, 0.0, 5.0, 0.0]];
        assert_eq!(pair_means(&pairs).unwrap(), array![[1.0, 5.0]]);

        let mut rng = StdRng::seed_from_u64(3);
        // zero scale collapses to the mean
        let sampled = normal_sampling(&pairs, &mut rng).unwrap();
        assert_eq!(sampled, array![[1.0, 5.0]]);

        assert!(pair_means(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn gaussian_draws_follow_scale() {
        let pairs = Array2::from_shape_fn((2000, 2), |(_, c)| if c == 0 { 10.0 } else { 2.0 });
        let mut rng = StdRng::seed_from_u64(11);
        let sampled = normal_sampling(&pairs, &mut rng).unwrap();
        let draws: Vec<f64> = sampled.iter().copied().collect();
        assert_relative_eq!(crate::utils::mean(&draws), 10.0, epsilon = 0.2);
        assert_relative_eq!(crate::utils::std_dev(&draws), 2.0, epsilon = 0.2);
    }

    #[test]
    fn poisson_draws_are_counts() {
        let rates = array![[0.0, 4.0], [-1.0, 4.0]];
        let mut rng = StdRng::seed_from_u64(5);
        let sampled = poisson_sampling(&rates, &mut rng).unwrap();
        assert_eq!(sampled[[0, 0]], 0.0);
        assert_eq!(sampled[[1, 0]], 0.0);
        assert!(sampled.iter().all(|v| *v >= 0.0 && v.fract() == 0.0));
    }

    #[test]
    fn likelihood_round_trips_through_json() {
        let likelihood = Likelihood::Quantile(vec![0.1, 0.5, 0.9]);
        let json = serde_json::to_string(&likelihood).unwrap();
        assert_eq!(serde_json::from_str::<Likelihood>(&json).unwrap(), likelihood);
        assert_eq!(Likelihood::Gaussian.outputs_per_label(), 2);
    }
}
