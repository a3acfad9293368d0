use thiserror::Error;

/// Recoverable failures of the numeric kernels.
///
/// Shape mismatches and other caller bugs are not represented here. They are
/// checked eagerly with `assert!` before any numeric work begins, because no
/// caller can meaningfully recover from passing a mis-sized matrix. Non-finite
/// values produced by a near-zero pivot are likewise not an error variant;
/// they propagate through the arithmetic and surface via the
/// positive-definiteness check or the caller's convergence accumulator.
#[derive(Error, Debug)]
pub enum LinalgError {
    #[error(
        "matrix is not positive-definite after {attempts} regularization attempts (total ridge added: {ridge:e})"
    )]
    NonPositiveDefinite { attempts: u32, ridge: f64 },
}
