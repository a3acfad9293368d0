//! Cholesky factorization with bounded ridge regularization.
//!
//! Gram matrices built from rank-deficient or collinear data are routinely
//! singular or ill-conditioned, so a plain factorization is not enough: the
//! retry loop here adds a geometrically growing scalar to the diagonal until
//! the factorization is numerically positive-definite or the attempt budget
//! runs out. Well-conditioned inputs never see any regularization.

use crate::error::LinalgError;
use ndarray::Array2;

/// First ridge value tried, multiplied by 10 on every further attempt.
const INITIAL_RIDGE: f64 = 1e-5;

/// Default attempt budget for [`regularized_cholesky`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Lower-triangular Cholesky factor together with its validity flag and a
/// record of the regularization that produced it.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    lower: Array2<f64>,
    spd: bool,
    ridge: f64,
    attempts: u32,
}

impl CholeskyFactor {
    /// The lower-triangular factor `L` with `G + ridge·I = L·L'`.
    pub fn lower(&self) -> &Array2<f64> {
        &self.lower
    }

    pub fn into_lower(self) -> Array2<f64> {
        self.lower
    }

    /// Whether the factorization met every positivity check. Must be
    /// consulted after each attempt; a factor with `spd == false` contains
    /// clamped pivots and does not reproduce the input.
    pub fn is_spd(&self) -> bool {
        self.spd
    }

    /// Total scalar added to the diagonal before this factor was accepted.
    /// Zero for inputs that factored on the first attempt.
    pub fn ridge(&self) -> f64 {
        self.ridge
    }

    /// Number of regularization retries performed.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Factors a symmetric matrix, retrying with an increasing diagonal ridge
/// until the result is positive-definite.
///
/// The input is never mutated: each retry factors a fresh copy with the ridge
/// applied, so the caller's matrix survives the call unchanged even when every
/// attempt fails. Fails with [`LinalgError::NonPositiveDefinite`] once the
/// budget is exhausted.
pub fn regularized_cholesky(
    gram: &Array2<f64>,
    max_attempts: u32,
) -> Result<CholeskyFactor, LinalgError> {
    let factor = regularized_cholesky_lenient(gram, max_attempts);
    if factor.spd {
        Ok(factor)
    } else {
        Err(LinalgError::NonPositiveDefinite {
            attempts: factor.attempts,
            ridge: factor.ridge,
        })
    }
}

/// Like [`regularized_cholesky`] but returns the best-effort factor instead
/// of failing, for callers with their own fallback strategy. Check
/// [`CholeskyFactor::is_spd`] before trusting the result.
pub fn regularized_cholesky_lenient(gram: &Array2<f64>, max_attempts: u32) -> CholeskyFactor {
    assert!(gram.is_square(), "gram matrix must be square");
    let (mut lower, mut spd) = factor(gram);
    let mut ridge = 0.0;
    let mut attempts = 0;
    while !spd && attempts < max_attempts {
        ridge = if ridge == 0.0 {
            INITIAL_RIDGE
        } else {
            ridge * 10.0
        };
        attempts += 1;
        let mut ridged = gram.clone();
        ridged.diag_mut().mapv_inplace(|d| d + ridge);
        log::info!("added ridge regularization {ridge:e} to the gram diagonal (attempt {attempts})");
        (lower, spd) = factor(&ridged);
    }
    CholeskyFactor {
        lower,
        spd,
        ridge,
        attempts,
    }
}

/// One Cholesky–Crout pass over the lower triangle. A non-positive or
/// non-finite pivot marks the factorization invalid and is clamped to zero so
/// the sweep can finish and report the full factor.
fn factor(a: &Array2<f64>) -> (Array2<f64>, bool) {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));
    let mut spd = true;
    for j in 0..n {
        let mut d = 0.0;
        for k in 0..j {
            let mut s = a[(j, k)];
            for i in 0..k {
                s -= l[(j, i)] * l[(k, i)];
            }
            s /= l[(k, k)];
            l[(j, k)] = s;
            d += s * s;
        }
        d = a[(j, j)] - d;
        spd &= d > 0.0 && d.is_finite();
        l[(j, j)] = d.max(0.0).sqrt();
    }
    (l, spd)
}
