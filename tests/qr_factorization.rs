use approx::assert_abs_diff_eq;
use lowrank_linalg::{
    ColumnLayout, PartitionedMatrix, RayonEngine, SerialEngine, compute_q, compute_q_in_place,
    compute_r, multiply_into_new, transpose_aggregate,
};
use lowrank_linalg::expand::expand_row;
use lowrank_linalg::layout::{CategoricalColumn, NumericColumn};
use ndarray::{Array2, array, s};

fn assert_matrix_eq(got: &Array2<f64>, expected: &Array2<f64>, epsilon: f64) {
    assert_eq!(got.dim(), expected.dim());
    for ((i, j), &v) in expected.indexed_iter() {
        assert_abs_diff_eq!(got[(i, j)], v, epsilon = epsilon);
    }
}

#[test]
fn multiply_then_aggregate_matches_direct_computation() {
    // X'(XY) computed through the distributed kernels must match ndarray.
    let x = array![
        [1.0, 2.0, 0.5],
        [3.0, -1.0, 1.0],
        [0.0, 4.0, 2.0],
        [2.0, 2.0, -2.0],
        [1.0, 0.0, 3.0]
    ];
    let y = array![[1.0, 0.0], [0.5, 2.0], [-1.0, 1.0]];
    let layout = ColumnLayout::dense(3);
    let x_frame = PartitionedMatrix::from_dense(&x, 2);

    let xy = multiply_into_new(&RayonEngine, &x_frame, &layout, &y.t().to_owned());
    assert_matrix_eq(&xy.to_dense(), &x.dot(&y), 1e-12);

    let xtxy = transpose_aggregate(&RayonEngine, &x_frame, &layout, &xy);
    assert_matrix_eq(&xtxy, &x.t().dot(&x.dot(&y)), 1e-10);
}

#[test]
fn qr_of_the_three_row_example_recovers_y() {
    // Y = [[1,0],[0,1],[1,1]]: Y'Y = [[2,1],[1,2]].
    let y = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    let layout = ColumnLayout::dense(2);
    let frame = PartitionedMatrix::from_dense(&y, 2);

    let r = compute_r(&RayonEngine, &frame, &layout, false).unwrap();
    assert_matrix_eq(&r.t().dot(&r), &array![[2.0, 1.0], [1.0, 2.0]], 1e-9);

    let mut yw = frame.clone();
    yw.append_zero_columns(2);
    let sse = compute_q(&RayonEngine, &mut yw, &layout).unwrap();

    let full = yw.to_dense();
    let q = full.slice(s![.., 2..]).to_owned();
    assert_matrix_eq(&q.dot(&r), &y, 1e-9);

    // The companion columns started at zero, so the returned sum of squares
    // is exactly the squared Frobenius norm of Q.
    assert!(sse.is_finite() && sse >= 0.0);
    assert_abs_diff_eq!(sse, q.iter().map(|v| v * v).sum(), epsilon = 1e-9);
}

#[test]
fn orthonormal_columns_are_their_own_q() {
    let h = 1.0 / 2.0_f64.sqrt();
    let y = array![[h, h], [h, -h], [0.0, 0.0]];
    let layout = ColumnLayout::dense(2);
    let mut frame = PartitionedMatrix::from_dense(&y, 2);

    // Y'Y = I, so after the sqrt(n) rescale L is the identity.
    let l = compute_r(&RayonEngine, &frame, &layout, true).unwrap();
    assert_matrix_eq(&l, &Array2::eye(2), 1e-9);

    compute_q_in_place(&RayonEngine, &mut frame, &layout).unwrap();
    assert_matrix_eq(&frame.to_dense(), &y, 1e-9);
}

#[test]
fn qr_with_categorical_expansion_solves_against_the_expanded_rows() {
    // One 2-level categorical and one numeric column: expanded width 3.
    let layout = ColumnLayout::new(
        vec![CategoricalColumn {
            cardinality: 2,
            missing_bucket: false,
            mode: 0,
        }],
        vec![NumericColumn { mean: 0.0 }],
        false,
        false,
    );
    let y = array![[0.0, 1.0], [1.0, 2.0], [0.0, 3.0], [1.0, 4.0], [0.0, 5.0]];
    let mut yw = PartitionedMatrix::from_dense(&y, 2);
    yw.append_zero_columns(layout.expanded_width());

    let r = compute_r(&SerialEngine, &yw, &layout, false).unwrap();
    let sse = compute_q(&SerialEngine, &mut yw, &layout).unwrap();
    assert!(sse.is_finite() && sse > 0.0);

    let full = yw.to_dense();
    let q = full.slice(s![.., 2..]).to_owned();

    let mut expanded = Array2::zeros((y.nrows(), layout.expanded_width()));
    let mut buffer = vec![0.0; layout.expanded_width()];
    for (row, record) in y.rows().into_iter().enumerate() {
        buffer.fill(0.0);
        expand_row(record.as_slice().unwrap(), &layout, &mut buffer);
        for (col, &v) in buffer.iter().enumerate() {
            expanded[(row, col)] = v;
        }
    }
    assert_matrix_eq(&q.dot(&r), &expanded, 1e-8);
}

#[test]
fn repeated_compute_q_converges_to_zero_delta() {
    let y = array![[1.0, 0.5], [2.0, -1.0], [0.0, 1.0], [1.0, 1.0]];
    let layout = ColumnLayout::dense(2);
    let mut yw = PartitionedMatrix::from_dense(&y, 3);
    yw.append_zero_columns(2);

    let first = compute_q(&SerialEngine, &mut yw, &layout).unwrap();
    assert!(first > 0.0);
    // Second solve against the same Y rewrites identical values.
    let second = compute_q(&SerialEngine, &mut yw, &layout).unwrap();
    assert_eq!(second, 0.0);
}
