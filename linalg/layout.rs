//! Column layout of a partitioned matrix: how raw records map onto the
//! expanded numeric vector every kernel operates on.
//!
//! A raw record holds one cell per source column. Categorical cells carry a
//! small non-negative level (stored as `f64`, `NaN` when missing); numeric
//! cells carry a real or `NaN`. The layout fixes, per categorical column, the
//! width and offset of its one-hot block in the expanded vector, and carries
//! the dataset's missing-value policy: skip rows, impute (mode for
//! categoricals, mean for numerics), or route missing categoricals to a
//! reserved trailing bucket. The policy is a property of the dataset, not of
//! any kernel, so every kernel consults the layout instead of hardcoding a
//! branch.

/// Descriptor for one categorical source column.
#[derive(Debug, Clone)]
pub struct CategoricalColumn {
    /// Width of the one-hot block, including the missing bucket if present.
    pub cardinality: usize,
    /// Whether the last level of the block is reserved for missing values.
    pub missing_bucket: bool,
    /// Most frequent level, used when imputation is enabled.
    pub mode: usize,
}

/// Descriptor for one numeric source column.
#[derive(Debug, Clone)]
pub struct NumericColumn {
    /// Column mean, used when imputation is enabled.
    pub mean: f64,
}

/// Optional centering/scaling constants for the numeric columns.
#[derive(Debug, Clone)]
pub struct Normalization {
    /// Subtracted from each numeric value (typically the column mean).
    pub sub: Vec<f64>,
    /// Multiplied after subtraction (typically 1/sd).
    pub mul: Vec<f64>,
}

/// Read-only description of a matrix's columns, consumed by every kernel.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    cats: Vec<CategoricalColumn>,
    nums: Vec<NumericColumn>,
    /// `offsets[c]` is the expanded index where categorical `c`'s one-hot
    /// block starts; `offsets[cats.len()]` is where the numerics start.
    offsets: Vec<usize>,
    norm: Option<Normalization>,
    impute_missing: bool,
    skip_missing: bool,
}

impl ColumnLayout {
    /// Builds a layout with categorical blocks laid out first, numerics after.
    ///
    /// Panics if a categorical column has zero cardinality or a mode outside
    /// its domain.
    pub fn new(
        cats: Vec<CategoricalColumn>,
        nums: Vec<NumericColumn>,
        impute_missing: bool,
        skip_missing: bool,
    ) -> Self {
        let mut offsets = Vec::with_capacity(cats.len() + 1);
        let mut next = 0;
        for (c, cat) in cats.iter().enumerate() {
            assert!(cat.cardinality > 0, "categorical column {c} has no levels");
            assert!(
                cat.mode < cat.domain_size(),
                "categorical column {c}: mode {} outside domain of size {}",
                cat.mode,
                cat.domain_size()
            );
            offsets.push(next);
            next += cat.cardinality;
        }
        offsets.push(next);
        Self {
            cats,
            nums,
            offsets,
            norm: None,
            impute_missing,
            skip_missing,
        }
    }

    /// Layout for an all-numeric matrix with no missing-value handling, the
    /// common case for the Q and factor matrices of an iterative solver.
    pub fn dense(ncols: usize) -> Self {
        let nums = (0..ncols).map(|_| NumericColumn { mean: 0.0 }).collect();
        Self::new(Vec::new(), nums, false, false)
    }

    /// Attaches centering/scaling constants for the numeric columns.
    pub fn with_normalization(mut self, sub: Vec<f64>, mul: Vec<f64>) -> Self {
        assert_eq!(sub.len(), self.nums.len(), "normalization sub length");
        assert_eq!(mul.len(), self.nums.len(), "normalization mul length");
        self.norm = Some(Normalization { sub, mul });
        self
    }

    pub fn n_cats(&self) -> usize {
        self.cats.len()
    }

    pub fn n_nums(&self) -> usize {
        self.nums.len()
    }

    /// Number of raw columns in a record.
    pub fn n_raw(&self) -> usize {
        self.cats.len() + self.nums.len()
    }

    /// Length of the expanded vector.
    pub fn expanded_width(&self) -> usize {
        self.num_start() + self.nums.len()
    }

    /// Expanded index of the first numeric column.
    pub fn num_start(&self) -> usize {
        self.offsets[self.cats.len()]
    }

    pub fn categorical(&self, col: usize) -> &CategoricalColumn {
        &self.cats[col]
    }

    /// Expanded index where categorical `col`'s one-hot block starts.
    pub fn categorical_offset(&self, col: usize) -> usize {
        self.offsets[col]
    }

    pub fn skip_missing(&self) -> bool {
        self.skip_missing
    }

    pub fn impute_missing(&self) -> bool {
        self.impute_missing
    }

    /// Maps a raw categorical level to its expanded index. Levels outside the
    /// known domain yield `None`; callers drop them from the encoding.
    pub fn categorical_index(&self, col: usize, level: usize) -> Option<usize> {
        if level < self.cats[col].domain_size() {
            Some(self.offsets[col] + level)
        } else {
            None
        }
    }

    /// Expanded index to light up for a missing cell of categorical `col`:
    /// the mode level under imputation, the reserved trailing bucket when one
    /// exists, or `None` (leave the whole block at zero).
    pub fn missing_target(&self, col: usize) -> Option<usize> {
        let cat = &self.cats[col];
        if self.impute_missing {
            Some(self.offsets[col] + cat.mode)
        } else if cat.missing_bucket {
            Some(self.offsets[col + 1] - 1)
        } else {
            None
        }
    }

    /// Imputes and normalizes one numeric cell (`col` indexes numerics only).
    pub fn modify_numeric(&self, x: f64, col: usize) -> f64 {
        let mut y = x;
        if x.is_nan() && self.impute_missing {
            y = self.nums[col].mean;
        }
        if let Some(norm) = &self.norm {
            y = (y - norm.sub[col]) * norm.mul[col];
        }
        y
    }

    /// Whether a record participates in a pass at all. Under the skip-missing
    /// policy a record with any missing cell is excluded entirely.
    pub fn row_is_valid(&self, record: &[f64]) -> bool {
        debug_assert_eq!(record.len(), self.n_raw());
        !(self.skip_missing && record.iter().any(|v| v.is_nan()))
    }
}

impl CategoricalColumn {
    /// Number of levels a raw cell may legally hold (the missing bucket is
    /// reachable only through the missing-value path, never as a raw level).
    pub fn domain_size(&self) -> usize {
        self.cardinality - usize::from(self.missing_bucket)
    }
}
