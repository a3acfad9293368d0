//! Row-partitioned matrix storage and the scan/reduce execution capability.
//!
//! A [`PartitionedMatrix`] is one logical matrix split into row-contiguous
//! partitions, each holding its rows as columnar blocks. Partitions are the
//! unit of parallelism: during a pass each partition is owned by exactly one
//! worker, and the only synchronization point is the associative combine of
//! per-partition accumulators after every worker finishes.
//!
//! The kernels never talk to a scheduler directly. They run through the
//! [`ScanEngine`] trait, which a distributed execution engine implements on
//! its own substrate; this crate bundles [`RayonEngine`] (thread-pool
//! parallelism, the default) and [`SerialEngine`] (deterministic summation
//! order, for tests and debugging). Scheduling, retries, fault tolerance and
//! cancellation all live behind the trait.

use ndarray::Array2;
use rayon::prelude::*;

/// One row-contiguous slice of a partitioned matrix, stored as columnar
/// blocks of equal length.
#[derive(Debug, Clone)]
pub struct Partition {
    cols: Vec<Vec<f64>>,
    len: usize,
}

impl Partition {
    /// Panics if the columns differ in length.
    pub fn new(cols: Vec<Vec<f64>>) -> Self {
        let len = cols.first().map_or(0, Vec::len);
        assert!(
            cols.iter().all(|c| c.len() == len),
            "partition columns must have equal lengths"
        );
        Self { cols, len }
    }

    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            cols: vec![vec![0.0; n_rows]; n_cols],
            len: n_rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.len
    }

    pub fn n_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn col(&self, col: usize) -> &[f64] {
        &self.cols[col]
    }

    #[inline]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.cols[col][row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.cols[col][row] = value;
    }

    /// Copies the leading `dest.len()` cells of one row into `dest`. Kernels
    /// that share a partition between input and output columns use this to
    /// finish reading a row before writing any of its output cells.
    pub fn read_record(&self, row: usize, dest: &mut [f64]) {
        assert!(dest.len() <= self.cols.len(), "record wider than partition");
        for (cell, col) in dest.iter_mut().zip(&self.cols) {
            *cell = col[row];
        }
    }

    fn append_zero_columns(&mut self, extra: usize) {
        self.cols
            .extend(std::iter::repeat_with(|| vec![0.0; self.len]).take(extra));
    }
}

/// One logical matrix physically split into row-contiguous partitions.
///
/// Holds at least one partition at all times, so a scan over it always has
/// a partition to visit even for an empty matrix.
#[derive(Debug, Clone)]
pub struct PartitionedMatrix {
    partitions: Vec<Partition>,
    n_cols: usize,
}

impl PartitionedMatrix {
    /// Panics if the partitions disagree on column count or none are given.
    pub fn from_partitions(partitions: Vec<Partition>) -> Self {
        assert!(!partitions.is_empty(), "at least one partition required");
        let n_cols = partitions[0].n_cols();
        assert!(
            partitions.iter().all(|p| p.n_cols() == n_cols),
            "partitions must agree on column count"
        );
        Self { partitions, n_cols }
    }

    /// Splits a dense matrix into partitions of at most `rows_per_partition`
    /// rows, preserving row order.
    pub fn from_dense(dense: &Array2<f64>, rows_per_partition: usize) -> Self {
        assert!(rows_per_partition > 0, "partitions must hold at least one row");
        let (n_rows, n_cols) = dense.dim();
        let mut partitions = Vec::new();
        let mut start = 0;
        while start < n_rows {
            let end = (start + rows_per_partition).min(n_rows);
            let cols = (0..n_cols)
                .map(|c| (start..end).map(|r| dense[(r, c)]).collect())
                .collect();
            partitions.push(Partition::new(cols));
            start = end;
        }
        if partitions.is_empty() {
            partitions.push(Partition::zeros(0, n_cols));
        }
        Self { partitions, n_cols }
    }

    pub fn n_rows(&self) -> usize {
        self.partitions.iter().map(Partition::n_rows).sum()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn n_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Appends zero-filled trailing columns to every partition, the storage
    /// for in-place kernels that write outputs alongside their inputs.
    pub fn append_zero_columns(&mut self, extra: usize) {
        for partition in &mut self.partitions {
            partition.append_zero_columns(extra);
        }
        self.n_cols += extra;
    }

    /// Materializes the whole matrix in memory. Small matrices and tests
    /// only; the point of this type is that the large matrices never need it.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_rows(), self.n_cols));
        let mut base = 0;
        for partition in &self.partitions {
            for row in 0..partition.n_rows() {
                for col in 0..self.n_cols {
                    dense[(base + row, col)] = partition.value(row, col);
                }
            }
            base += partition.n_rows();
        }
        dense
    }

    /// Row counts per partition, for asserting that two matrices are aligned.
    fn boundaries(&self) -> Vec<usize> {
        self.partitions.iter().map(Partition::n_rows).collect()
    }
}

/// The distributed execution capability the kernels are written against:
/// run a closure once per partition, then combine the per-partition results
/// with an associative, commutative operation.
///
/// Implementations decide where and in which order partitions run; the
/// associativity contract is what makes that freedom safe (up to
/// floating-point summation order in the low bits).
pub trait ScanEngine {
    /// Maps every partition and reduces the results.
    fn scan_reduce<A, I, M, C>(&self, frame: &PartitionedMatrix, identity: I, map: M, combine: C) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync;

    /// Maps every partition to a new partition, preserving partition order
    /// and boundaries. Used by kernels that materialize a new matrix.
    fn scan_map<M>(&self, frame: &PartitionedMatrix, map: M) -> Vec<Partition>
    where
        M: Fn(&Partition) -> Partition + Send + Sync;

    /// Mutates every partition in place, reducing a per-partition accumulator.
    fn scan_mut_reduce<A, I, M, C>(
        &self,
        frame: &mut PartitionedMatrix,
        identity: I,
        map: M,
        combine: C,
    ) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&mut Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync;

    /// Maps over two row-aligned matrices (equal partition boundaries) and
    /// reduces the results.
    fn scan_zip_reduce<A, I, M, C>(
        &self,
        left: &PartitionedMatrix,
        right: &PartitionedMatrix,
        identity: I,
        map: M,
        combine: C,
    ) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&Partition, &Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync;

    /// Mutates every partition in place with no accumulator.
    fn scan_mut<M>(&self, frame: &mut PartitionedMatrix, map: M)
    where
        M: Fn(&mut Partition) + Send + Sync,
    {
        self.scan_mut_reduce(frame, || (), |partition| map(partition), |(), ()| ());
    }
}

fn assert_aligned(left: &PartitionedMatrix, right: &PartitionedMatrix) {
    assert_eq!(
        left.boundaries(),
        right.boundaries(),
        "matrices must share partition boundaries"
    );
}

/// Thread-pool execution: partitions run concurrently on the global rayon
/// pool, combined with a parallel reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonEngine;

impl ScanEngine for RayonEngine {
    fn scan_reduce<A, I, M, C>(&self, frame: &PartitionedMatrix, identity: I, map: M, combine: C) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync,
    {
        frame.partitions.par_iter().map(map).reduce(identity, combine)
    }

    fn scan_map<M>(&self, frame: &PartitionedMatrix, map: M) -> Vec<Partition>
    where
        M: Fn(&Partition) -> Partition + Send + Sync,
    {
        frame.partitions.par_iter().map(map).collect()
    }

    fn scan_mut_reduce<A, I, M, C>(
        &self,
        frame: &mut PartitionedMatrix,
        identity: I,
        map: M,
        combine: C,
    ) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&mut Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync,
    {
        frame
            .partitions
            .par_iter_mut()
            .map(|partition| map(partition))
            .reduce(identity, combine)
    }

    fn scan_zip_reduce<A, I, M, C>(
        &self,
        left: &PartitionedMatrix,
        right: &PartitionedMatrix,
        identity: I,
        map: M,
        combine: C,
    ) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&Partition, &Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync,
    {
        assert_aligned(left, right);
        left.partitions
            .par_iter()
            .zip(right.partitions.par_iter())
            .map(|(a, b)| map(a, b))
            .reduce(identity, combine)
    }
}

/// Sequential execution with left-to-right combining. Bitwise-deterministic,
/// which makes it the right engine for tests that compare against a direct
/// computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialEngine;

impl ScanEngine for SerialEngine {
    fn scan_reduce<A, I, M, C>(&self, frame: &PartitionedMatrix, identity: I, map: M, combine: C) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync,
    {
        frame
            .partitions
            .iter()
            .map(map)
            .fold(identity(), &combine)
    }

    fn scan_map<M>(&self, frame: &PartitionedMatrix, map: M) -> Vec<Partition>
    where
        M: Fn(&Partition) -> Partition + Send + Sync,
    {
        frame.partitions.iter().map(map).collect()
    }

    fn scan_mut_reduce<A, I, M, C>(
        &self,
        frame: &mut PartitionedMatrix,
        identity: I,
        map: M,
        combine: C,
    ) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&mut Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync,
    {
        frame
            .partitions
            .iter_mut()
            .map(|partition| map(partition))
            .fold(identity(), &combine)
    }

    fn scan_zip_reduce<A, I, M, C>(
        &self,
        left: &PartitionedMatrix,
        right: &PartitionedMatrix,
        identity: I,
        map: M,
        combine: C,
    ) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        M: Fn(&Partition, &Partition) -> A + Send + Sync,
        C: Fn(A, A) -> A + Send + Sync,
    {
        assert_aligned(left, right);
        left.partitions
            .iter()
            .zip(right.partitions.iter())
            .map(|(a, b)| map(a, b))
            .fold(identity(), &combine)
    }
}
