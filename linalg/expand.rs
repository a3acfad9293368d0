//! Row expansion: raw records into dense numeric vectors.
//!
//! Every kernel in this crate consumes rows through this encoding, so the
//! missing-value policy lives in exactly one place ([`ColumnLayout`]) and the
//! expansion functions here apply it mechanically. The destination buffer is
//! caller-owned and reused across rows; only positions belonging to the
//! encoding are written, so the caller must re-zero it between rows.
//!
//! Out-of-domain categorical levels are silently dropped from the encoding
//! (their one-hot block stays all zero). This is deliberate: a level never
//! seen when the layout was built carries no information the downstream
//! factorization could use, and failing the whole pass for it would make
//! scoring on fresh data impossible.

use crate::layout::ColumnLayout;

/// Expands `record` into `dest` with imputation and normalization applied to
/// numeric cells.
pub fn expand_row(record: &[f64], layout: &ColumnLayout, dest: &mut [f64]) {
    expand_categoricals(record, layout, dest);
    let num_start = layout.num_start();
    for col in 0..layout.n_nums() {
        dest[num_start + col] = layout.modify_numeric(record[layout.n_cats() + col], col);
    }
}

/// Expands `record` into `dest` passing numeric cells through untouched.
pub fn expand_row_raw(record: &[f64], layout: &ColumnLayout, dest: &mut [f64]) {
    expand_categoricals(record, layout, dest);
    let num_start = layout.num_start();
    for col in 0..layout.n_nums() {
        dest[num_start + col] = record[layout.n_cats() + col];
    }
}

/// Variance-normalized expansion: after the usual missing-value handling,
/// every expanded position is centered and scaled.
///
/// `centers` holds one vector per raw column: a per-level centering vector
/// for each categorical (length = the column's domain size) and a
/// single-entry vector for each numeric. `scales` holds one factor per raw
/// column. Centering and scaling touch the domain levels only; the reserved
/// missing bucket, when present, keeps its raw indicator. Either table may be
/// `None` (center 0, scale 1); when both are, this is [`expand_row_raw`].
pub fn expand_row_normalized(
    record: &[f64],
    layout: &ColumnLayout,
    dest: &mut [f64],
    centers: Option<&[Vec<f64>]>,
    scales: Option<&[f64]>,
) {
    if centers.is_none() && scales.is_none() {
        expand_row_raw(record, layout, dest);
        return;
    }
    assert_eq!(record.len(), layout.n_raw(), "record width");
    assert_eq!(dest.len(), layout.expanded_width(), "destination width");
    if let Some(centers) = centers {
        assert_eq!(centers.len(), layout.n_raw(), "centers width");
    }
    if let Some(scales) = scales {
        assert_eq!(scales.len(), layout.n_raw(), "scales width");
    }
    let center = |raw_col: usize, level: usize| -> f64 {
        centers.map_or(0.0, |c| c[raw_col][level])
    };
    let scale = |raw_col: usize| -> f64 { scales.map_or(1.0, |s| s[raw_col]) };

    for col in 0..layout.n_cats() {
        if let Some(idx) = one_hot_index(record[col], layout, col) {
            dest[idx] = 1.0;
        }
        // Center and scale the domain levels, zeros included; the missing
        // bucket has no centering constant and stays as encoded.
        let offset = layout.categorical_offset(col);
        for level in 0..layout.categorical(col).domain_size() {
            dest[offset + level] = (dest[offset + level] - center(col, level)) * scale(col);
        }
    }

    let num_start = layout.num_start();
    for col in 0..layout.n_nums() {
        let raw_col = layout.n_cats() + col;
        dest[num_start + col] = (record[raw_col] - center(raw_col, 0)) * scale(raw_col);
    }
}

/// Resolves one categorical cell to the expanded index that should be set to
/// one, or `None` when the encoding leaves the block at zero.
pub(crate) fn one_hot_index(cell: f64, layout: &ColumnLayout, col: usize) -> Option<usize> {
    if cell.is_nan() {
        layout.missing_target(col)
    } else {
        layout.categorical_index(col, cell as usize)
    }
}

fn expand_categoricals(record: &[f64], layout: &ColumnLayout, dest: &mut [f64]) {
    assert_eq!(record.len(), layout.n_raw(), "record width");
    assert_eq!(dest.len(), layout.expanded_width(), "destination width");
    for col in 0..layout.n_cats() {
        if let Some(idx) = one_hot_index(record[col], layout, col) {
            dest[idx] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{CategoricalColumn, ColumnLayout, NumericColumn};

    fn layout(impute: bool, bucket: bool) -> ColumnLayout {
        ColumnLayout::new(
            vec![CategoricalColumn {
                cardinality: if bucket { 4 } else { 3 },
                missing_bucket: bucket,
                mode: 1,
            }],
            vec![NumericColumn { mean: 5.0 }],
            impute,
            false,
        )
    }

    #[test]
    fn known_level_sets_exactly_one_indicator() {
        let layout = layout(false, false);
        let mut dest = vec![0.0; layout.expanded_width()];
        expand_row(&[2.0, 7.0], &layout, &mut dest);
        assert_eq!(dest, vec![0.0, 0.0, 1.0, 7.0]);
    }

    #[test]
    fn missing_with_imputation_reproduces_the_mode_one_hot() {
        let layout = layout(true, false);
        let mut dest = vec![0.0; layout.expanded_width()];
        expand_row(&[f64::NAN, 7.0], &layout, &mut dest);
        assert_eq!(&dest[..3], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_without_imputation_or_bucket_leaves_block_zero() {
        let layout = layout(false, false);
        let mut dest = vec![0.0; layout.expanded_width()];
        expand_row(&[f64::NAN, 7.0], &layout, &mut dest);
        assert_eq!(&dest[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_routes_to_the_trailing_bucket_when_present() {
        let layout = layout(false, true);
        let mut dest = vec![0.0; layout.expanded_width()];
        expand_row(&[f64::NAN, 7.0], &layout, &mut dest);
        assert_eq!(&dest[..4], &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn out_of_domain_level_is_dropped() {
        let layout = layout(false, false);
        let mut dest = vec![0.0; layout.expanded_width()];
        expand_row(&[9.0, 7.0], &layout, &mut dest);
        assert_eq!(&dest[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn numeric_missing_is_imputed_to_the_mean() {
        let layout = layout(true, false);
        let mut dest = vec![0.0; layout.expanded_width()];
        expand_row(&[0.0, f64::NAN], &layout, &mut dest);
        assert_eq!(dest[3], 5.0);
    }

    #[test]
    fn raw_variant_passes_numerics_through() {
        let layout = layout(true, false);
        let mut dest = vec![0.0; layout.expanded_width()];
        expand_row_raw(&[0.0, f64::NAN], &layout, &mut dest);
        assert!(dest[3].is_nan());
    }

    #[test]
    fn normalized_variant_centers_and_scales_the_domain_positions() {
        let layout = layout(false, false);
        let mut dest = vec![0.0; layout.expanded_width()];
        let centers = vec![vec![0.25, 0.5, 0.25], vec![5.0]];
        let scales = vec![2.0, 0.5];
        expand_row_normalized(&[1.0, 9.0], &layout, &mut dest, Some(&centers), Some(&scales));
        assert_eq!(&dest[..3], &[-0.5, 1.0, -0.5]);
        assert_eq!(dest[3], 2.0);
    }

    #[test]
    fn normalized_variant_leaves_the_missing_bucket_untouched() {
        let layout = layout(false, true);
        let mut dest = vec![0.0; layout.expanded_width()];
        // Centers cover the three domain levels only.
        let centers = vec![vec![0.5, 0.25, 0.25], vec![1.0]];
        let scales = vec![2.0, 1.0];
        expand_row_normalized(
            &[f64::NAN, 3.0],
            &layout,
            &mut dest,
            Some(&centers),
            Some(&scales),
        );
        assert_eq!(&dest[..3], &[-1.0, -0.5, -0.5]);
        // The missing value routed to the bucket, which keeps its indicator.
        assert_eq!(dest[3], 1.0);
        assert_eq!(dest[4], 2.0);
    }

    #[test]
    fn normalized_variant_without_tables_is_the_raw_expansion() {
        let layout = layout(false, false);
        let mut a = vec![0.0; layout.expanded_width()];
        let mut b = vec![0.0; layout.expanded_width()];
        expand_row_normalized(&[1.0, 3.0], &layout, &mut a, None, None);
        expand_row_raw(&[1.0, 3.0], &layout, &mut b);
        assert_eq!(a, b);
    }
}
