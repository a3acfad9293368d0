//! Distributed QR factorization via the Cholesky of the Gram matrix.
//!
//! `R` comes from factoring `Y'Y/n`: if `Y'Y = L·L'` then `R = L'` is the
//! triangular factor of `Y = Q·R`. `Q` then falls out row by row: each row of
//! `Y` is forward-substituted against `L` (`L·q = y_row`, i.e. `Q·L' = Y`),
//! which parallelizes perfectly across partitions since rows are independent.

use crate::cholesky::{DEFAULT_MAX_ATTEMPTS, regularized_cholesky};
use crate::error::LinalgError;
use crate::expand::expand_row;
use crate::frame::{PartitionedMatrix, ScanEngine};
use crate::layout::ColumnLayout;
use crate::solve::forward_solve_into;
use ndarray::Array2;

/// Distributed Gram pass: returns `Y'Y/n` over the expanded rows of `y`,
/// together with `n`, the number of rows that entered the sum (rows excluded
/// by the missing policy count toward neither).
///
/// Only the leading `layout.n_raw()` columns of `y` are read; trailing
/// companion columns, if any, do not influence the Gram. Panics if no row
/// survives the missing policy, since a Gram over zero observations has no
/// meaning.
pub fn gram<E: ScanEngine>(
    engine: &E,
    y: &PartitionedMatrix,
    layout: &ColumnLayout,
) -> (Array2<f64>, usize) {
    assert!(y.n_cols() >= layout.n_raw(), "Y narrower than the layout");
    let p_exp = layout.expanded_width();
    let (mut sum, nobs) = engine.scan_reduce(
        y,
        || (Array2::zeros((p_exp, p_exp)), 0usize),
        |partition| {
            let mut acc = Array2::zeros((p_exp, p_exp));
            let mut count = 0usize;
            let mut record = vec![0.0; layout.n_raw()];
            let mut expanded = vec![0.0; p_exp];
            for row in 0..partition.n_rows() {
                partition.read_record(row, &mut record);
                if !layout.row_is_valid(&record) {
                    continue;
                }
                expanded.fill(0.0);
                expand_row(&record, layout, &mut expanded);
                // Sum of outer products, lower triangle only.
                for i in 0..p_exp {
                    let xi = expanded[i];
                    if xi == 0.0 {
                        continue;
                    }
                    for j in 0..=i {
                        acc[(i, j)] += xi * expanded[j];
                    }
                }
                count += 1;
            }
            (acc, count)
        },
        |(a, na), (b, nb)| (a + b, na + nb),
    );
    assert!(nobs > 0, "gram matrix over zero valid rows");
    sum /= nobs as f64;
    // Mirror the lower triangle.
    for i in 0..p_exp {
        for j in 0..i {
            sum[(j, i)] = sum[(i, j)];
        }
    }
    (sum, nobs)
}

/// Computes the triangular factor of `Y = Q·R` from the regularized Cholesky
/// of the Gram matrix, rescaled by `sqrt(n)` to undo the Gram normalization.
///
/// Returns the lower-triangular `L` when `transposed` is set (callers about
/// to forward-substitute want `L` directly) and `R = L'` otherwise.
pub fn compute_r<E: ScanEngine>(
    engine: &E,
    y: &PartitionedMatrix,
    layout: &ColumnLayout,
    transposed: bool,
) -> Result<Array2<f64>, LinalgError> {
    let (gram_matrix, nobs) = gram(engine, y, layout);
    log::debug!(
        "gram pass complete: {nobs} observations, {} expanded columns",
        gram_matrix.nrows()
    );
    let factor = regularized_cholesky(&gram_matrix, DEFAULT_MAX_ATTEMPTS)?;
    let mut l = factor.into_lower();
    l *= (nobs as f64).sqrt();
    Ok(if transposed { l } else { l.t().to_owned() })
}

/// Solves for `Q` in `Y = Q·R`, writing each row of `Q` into the trailing
/// companion columns of `yw` (`[Y, W]` in shared partitions, the leading
/// `layout.n_raw()` columns being `Y`).
///
/// Returns the total squared difference between the solved `Q` and the
/// previous contents of the companion columns, so iterative callers get their
/// convergence measure without a second pass.
pub fn compute_q<E: ScanEngine>(
    engine: &E,
    yw: &mut PartitionedMatrix,
    layout: &ColumnLayout,
) -> Result<f64, LinalgError> {
    let p_exp = layout.expanded_width();
    assert_eq!(
        yw.n_cols(),
        layout.n_raw() + p_exp,
        "[Y,W] must carry one trailing column per expanded column"
    );
    let l = compute_r(engine, yw, layout, true)?;
    let n_raw = layout.n_raw();
    let sse = engine.scan_mut_reduce(
        yw,
        || 0.0,
        |partition| {
            let mut record = vec![0.0; n_raw];
            let mut expanded = vec![0.0; p_exp];
            let mut q_row = vec![0.0; p_exp];
            let mut local_sse = 0.0;
            for row in 0..partition.n_rows() {
                partition.read_record(row, &mut record);
                if !layout.row_is_valid(&record) {
                    continue;
                }
                expanded.fill(0.0);
                expand_row(&record, layout, &mut expanded);
                forward_solve_into(&l, &expanded, &mut q_row);
                for (d, &q_new) in q_row.iter().enumerate() {
                    let q_old = partition.value(row, n_raw + d);
                    let diff = q_new - q_old;
                    local_sse += diff * diff;
                    partition.set(row, n_raw + d, q_new);
                }
            }
            local_sse
        },
        |a, b| a + b,
    );
    Ok(sse)
}

/// Solves for `Q` in `Y = Q·R`, overwriting each row of `y` with its row of
/// `Q`. Only possible when the expanded width equals the raw width (no
/// categorical expansion), since the solved row replaces the raw row.
pub fn compute_q_in_place<E: ScanEngine>(
    engine: &E,
    y: &mut PartitionedMatrix,
    layout: &ColumnLayout,
) -> Result<(), LinalgError> {
    let p_exp = layout.expanded_width();
    assert_eq!(
        p_exp,
        layout.n_raw(),
        "in-place solve requires an expansion-free layout"
    );
    assert_eq!(y.n_cols(), layout.n_raw(), "Y width must match the layout");
    let l = compute_r(engine, y, layout, true)?;
    engine.scan_mut(y, |partition| {
        let mut record = vec![0.0; p_exp];
        let mut expanded = vec![0.0; p_exp];
        let mut q_row = vec![0.0; p_exp];
        for row in 0..partition.n_rows() {
            partition.read_record(row, &mut record);
            if !layout.row_is_valid(&record) {
                continue;
            }
            expanded.fill(0.0);
            expand_row(&record, layout, &mut expanded);
            forward_solve_into(&l, &expanded, &mut q_row);
            for (d, &q_new) in q_row.iter().enumerate() {
                partition.set(row, d, q_new);
            }
        }
    });
    Ok(())
}
