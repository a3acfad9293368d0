//! Direct triangular solves by forward and backward substitution.
//!
//! A zero or near-zero diagonal entry is not special-cased: the division
//! produces a non-finite value that propagates to the caller, where the
//! positive-definiteness check or a convergence accumulator will catch it.

use ndarray::{Array1, Array2};

/// Solves `L x = b` for lower-triangular `L`.
pub fn forward_solve(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    assert!(l.is_square(), "L must be square");
    assert_eq!(l.nrows(), b.len(), "L and b dimensions must agree");
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in 0..n {
        let mut acc = b[i];
        for j in 0..i {
            acc -= l[(i, j)] * x[j];
        }
        x[i] = acc / l[(i, i)];
    }
    x
}

/// Solves `U x = b` for upper-triangular `U`.
pub fn backward_solve(u: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    assert!(u.is_square(), "U must be square");
    assert_eq!(u.nrows(), b.len(), "U and b dimensions must agree");
    let n = b.len();
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut acc = b[i];
        for j in i + 1..n {
            acc -= u[(i, j)] * x[j];
        }
        x[i] = acc / u[(i, i)];
    }
    x
}

/// Allocation-free forward substitution for per-row hot loops: solves
/// `L out = b` writing into a caller-owned buffer.
pub(crate) fn forward_solve_into(l: &Array2<f64>, b: &[f64], out: &mut [f64]) {
    assert!(l.is_square(), "L must be square");
    assert_eq!(l.nrows(), b.len(), "L and b dimensions must agree");
    assert_eq!(out.len(), b.len(), "output buffer length");
    for i in 0..b.len() {
        let mut acc = b[i];
        for j in 0..i {
            acc -= l[(i, j)] * out[j];
        }
        out[i] = acc / l[(i, i)];
    }
}
