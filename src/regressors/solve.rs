//! Dense least-squares solvers shared by the reference regressors.

use crate::error::{ForecastError, Result};
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Diagonal jitter added to every normal-equation system.
const JITTER: f64 = 1e-8;

/// Prepend a column of ones to `x`.
pub(crate) fn with_intercept(x: ArrayView2<'_, f64>) -> Array2<f64> {
    let ones = Array2::ones((x.nrows(), 1));
    // shapes agree on axis 0 by construction
    concatenate(Axis(1), &[ones.view(), x.view()]).unwrap_or_else(|_| x.to_owned())
}

/// Cholesky factor `L` of a symmetric positive definite matrix, `A = L L'`.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n == 0 || a.ncols() != n {
        return None;
    }
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }

            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L L' x = b` given the factor `L`.
fn solve_factored(l: &Array2<f64>, b: ArrayView1<'_, f64>) -> Array1<f64> {
    let n = b.len();

    // Forward substitution: L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * y[j];
        }
        y[i] = sum / l[[i, i]];
    }

    // Backward substitution: L' x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[[j, i]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Factor `a`, retrying once with a ridge scaled to its diagonal.
fn factor(a: &Array2<f64>) -> Result<Array2<f64>> {
    if let Some(l) = cholesky(a) {
        return Ok(l);
    }
    let n = a.nrows().max(1);
    let ridge = 1e-6 * (a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64).max(1.0);
    let mut a_reg = a.clone();
    for k in 0..a.nrows() {
        a_reg[[k, k]] += ridge;
    }
    cholesky(&a_reg).ok_or_else(|| {
        ForecastError::ComputationError(
            "least squares failed: normal equations are not positive definite".to_string(),
        )
    })
}

/// Solve the symmetric system `A X = B` column by column.
pub(crate) fn solve_symmetric(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    if a.nrows() != b.nrows() {
        return Err(ForecastError::DimensionMismatch {
            expected: a.nrows(),
            got: b.nrows(),
        });
    }
    let l = factor(a)?;
    let mut x = Array2::zeros(b.raw_dim());
    for (j, column) in b.axis_iter(Axis(1)).enumerate() {
        x.column_mut(j).assign(&solve_factored(&l, column));
    }
    Ok(x)
}

/// Weighted ridge least squares on a design that already holds its intercept
/// column at index 0. The intercept is not penalized.
pub(crate) fn weighted_least_squares(
    design: &Array2<f64>,
    y: ArrayView1<'_, f64>,
    weights: ArrayView1<'_, f64>,
    alpha: f64,
) -> Result<Array1<f64>> {
    let weighted = design * &weights.insert_axis(Axis(1));
    let mut xtwx = weighted.t().dot(design);
    for i in 0..xtwx.nrows() {
        xtwx[[i, i]] += if i == 0 { JITTER } else { alpha + JITTER };
    }
    let xtwy = weighted.t().dot(&y).insert_axis(Axis(1));
    let beta = solve_symmetric(&xtwx, &xtwy)?;
    Ok(beta.column(0).to_owned())
}

/// Ordinary least squares for every column of `y` at once.
///
/// Returns `(intercepts, coefficients)` with coefficients shaped
/// `(features, outputs)`.
pub(crate) fn ordinary_least_squares(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    alpha: f64,
) -> Result<(Array1<f64>, Array2<f64>)> {
    let design = with_intercept(x);
    let mut xtx = design.t().dot(&design);
    for i in 0..xtx.nrows() {
        xtx[[i, i]] += if i == 0 { JITTER } else { alpha + JITTER };
    }
    let xty = design.t().dot(&y);
    let beta = solve_symmetric(&xtx, &xty)?;
    let intercepts = beta.row(0).to_owned();
    let coefficients = beta.slice(ndarray::s![1.., ..]).to_owned();
    Ok((intercepts, coefficients))
}
