//! Distributed dense linear algebra kernels for low-rank matrix factorization.
//!
//! This crate provides the numeric layer used by iterative factorization
//! algorithms (PCA-style and low-rank models) over data that is split into
//! row-wise partitions: regularized Cholesky factorization of small Gram
//! matrices, triangular solves, partition-parallel matrix multiplication, and
//! a distributed QR built from the two. The large matrix never has to fit in
//! one place; the small factors (Y, L, R) are broadcast and read-only during a
//! pass.
//!
//! Execution is abstracted behind [`frame::ScanEngine`]: kernels only ask for
//! "run this per-partition closure, combine the results associatively". The
//! bundled [`frame::RayonEngine`] runs partitions on a thread pool; a real
//! cluster scheduler can implement the same trait.

#![deny(dead_code)]
#![deny(unused_imports)]

pub mod cholesky;
pub mod error;
pub mod expand;
pub mod frame;
pub mod layout;
pub mod multiply;
pub mod qr;
pub mod solve;

pub use cholesky::{CholeskyFactor, regularized_cholesky, regularized_cholesky_lenient};
pub use error::LinalgError;
pub use frame::{Partition, PartitionedMatrix, RayonEngine, ScanEngine, SerialEngine};
pub use layout::ColumnLayout;
pub use multiply::{multiply_in_place, multiply_into_new, transpose_aggregate};
pub use qr::{compute_q, compute_q_in_place, compute_r, gram};
pub use solve::{backward_solve, forward_solve};
