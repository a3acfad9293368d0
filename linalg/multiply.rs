//! Partition-parallel dense multiplication kernels.
//!
//! `multiply_into_new` and `multiply_in_place` compute `B = X·Y` for a large
//! row-partitioned `X` and a small broadcast `Y`; `transpose_aggregate`
//! computes the small matrix `A'·Q` from two row-aligned large matrices. The
//! small operand is always supplied pre-transposed (`yt`, one row per output
//! column), so every output scalar is a plain inner product with an expanded
//! row.

use crate::expand::{expand_row, one_hot_index};
use crate::frame::{Partition, PartitionedMatrix, ScanEngine};
use crate::layout::ColumnLayout;
use ndarray::Array2;

/// Computes `B = X·Y` into a brand-new partitioned matrix with the same
/// partition boundaries as `x` and one column per row of `yt`.
///
/// Rows excluded by the layout's missing policy keep their output at zero.
pub fn multiply_into_new<E: ScanEngine>(
    engine: &E,
    x: &PartitionedMatrix,
    layout: &ColumnLayout,
    yt: &Array2<f64>,
) -> PartitionedMatrix {
    assert_eq!(x.n_cols(), layout.n_raw(), "X width must match the layout");
    assert_eq!(
        yt.ncols(),
        layout.expanded_width(),
        "Y' must be as wide as the expanded row"
    );
    let partitions = engine.scan_map(x, |partition| {
        let mut out = Partition::zeros(partition.n_rows(), yt.nrows());
        let mut record = vec![0.0; layout.n_raw()];
        let mut expanded = vec![0.0; layout.expanded_width()];
        for row in 0..partition.n_rows() {
            partition.read_record(row, &mut record);
            if !layout.row_is_valid(&record) {
                continue;
            }
            expanded.fill(0.0);
            expand_row(&record, layout, &mut expanded);
            for (p, y_row) in yt.rows().into_iter().enumerate() {
                out.set(row, p, inner_product(&expanded, y_row));
            }
        }
        out
    });
    PartitionedMatrix::from_partitions(partitions)
}

/// Computes `B = X·Y` writing into the trailing columns of `xb`, which holds
/// `[X, B]` in shared partitions: the leading `layout.n_raw()` columns are
/// the inputs and the last `yt.nrows()` columns receive the product.
///
/// Each row is fully read (expanded) before any of its output cells is
/// written, since inputs and outputs live in the same partition buffer. Rows
/// excluded by the missing policy are skipped with their outputs untouched.
pub fn multiply_in_place<E: ScanEngine>(
    engine: &E,
    xb: &mut PartitionedMatrix,
    layout: &ColumnLayout,
    yt: &Array2<f64>,
) {
    assert_eq!(
        yt.ncols(),
        layout.expanded_width(),
        "Y' must be as wide as the expanded row"
    );
    assert_eq!(
        xb.n_cols(),
        layout.n_raw() + yt.nrows(),
        "[X,B] must carry one trailing column per output"
    );
    let n_raw = layout.n_raw();
    engine.scan_mut(xb, |partition| {
        let mut record = vec![0.0; n_raw];
        let mut expanded = vec![0.0; layout.expanded_width()];
        for row in 0..partition.n_rows() {
            // Read phase: the entire input row, before any write below.
            partition.read_record(row, &mut record);
            if !layout.row_is_valid(&record) {
                continue;
            }
            expanded.fill(0.0);
            expand_row(&record, layout, &mut expanded);
            // Write phase.
            for (p, y_row) in yt.rows().into_iter().enumerate() {
                partition.set(row, n_raw + p, inner_product(&expanded, y_row));
            }
        }
    });
}

/// Computes the small matrix `A'·Q` (`expanded width of A` × `columns of Q`)
/// from two row-aligned partitioned matrices.
///
/// Per-partition partial products are combined by element-wise summation;
/// partition order only affects floating-point summation order in the low
/// bits. The missing policy is applied cell by cell: a missing input cell is
/// imputed or bucketed exactly as the row expander would, and under the
/// skip-missing policy it is excluded from that cell's sum entirely.
pub fn transpose_aggregate<E: ScanEngine>(
    engine: &E,
    a: &PartitionedMatrix,
    layout: &ColumnLayout,
    q: &PartitionedMatrix,
) -> Array2<f64> {
    assert_eq!(a.n_cols(), layout.n_raw(), "A width must match the layout");
    let p_exp = layout.expanded_width();
    let n_q = q.n_cols();
    engine.scan_zip_reduce(
        a,
        q,
        || Array2::zeros((p_exp, n_q)),
        |pa, pq| {
            let mut atq = Array2::zeros((p_exp, n_q));
            for k in 0..n_q {
                let q_col = pq.col(k);

                for col in 0..layout.n_cats() {
                    let a_col = pa.col(col);
                    for (&a_cell, &q_cell) in a_col.iter().zip(q_col) {
                        if a_cell.is_nan() && layout.skip_missing() {
                            continue;
                        }
                        if let Some(cidx) = one_hot_index(a_cell, layout, col) {
                            atq[(cidx, k)] += q_cell;
                        }
                    }
                }

                for col in 0..layout.n_nums() {
                    let a_col = pa.col(layout.n_cats() + col);
                    let mut acc = 0.0;
                    for (&a_cell, &q_cell) in a_col.iter().zip(q_col) {
                        if a_cell.is_nan() && layout.skip_missing() {
                            continue;
                        }
                        acc += q_cell * layout.modify_numeric(a_cell, col);
                    }
                    atq[(layout.num_start() + col, k)] += acc;
                }
            }
            atq
        },
        |left, right| left + right,
    )
}

#[inline]
fn inner_product(expanded: &[f64], y_row: ndarray::ArrayView1<'_, f64>) -> f64 {
    expanded.iter().zip(y_row).map(|(x, y)| x * y).sum()
}
