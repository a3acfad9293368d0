use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use lowrank_linalg::{
    ColumnLayout, PartitionedMatrix, RayonEngine, SerialEngine, compute_q_in_place, gram,
};
use ndarray::Array2;
use rand::distributions::Standard;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_frame(n_rows: usize, n_cols: usize, rows_per_partition: usize) -> PartitionedMatrix {
    let mut rng = StdRng::seed_from_u64(0x10_44_A7 + n_rows as u64);
    let dense = Array2::from_shape_fn((n_rows, n_cols), |_| rng.sample::<f64, _>(Standard) + 0.1);
    PartitionedMatrix::from_dense(&dense, rows_per_partition)
}

fn benchmark_gram(c: &mut Criterion) {
    let n_cols = 16;
    let layout = ColumnLayout::dense(n_cols);
    let sizes = [1_000_usize, 10_000, 50_000];

    let mut group = c.benchmark_group("gram_pass");
    for &n_rows in &sizes {
        let frame = random_frame(n_rows, n_cols, 1024);
        group.throughput(Throughput::Elements((n_rows * n_cols) as u64));

        group.bench_with_input(BenchmarkId::new("serial", n_rows), &frame, |b, input| {
            b.iter(|| black_box(gram(&SerialEngine, black_box(input), &layout)));
        });
        group.bench_with_input(BenchmarkId::new("rayon", n_rows), &frame, |b, input| {
            b.iter(|| black_box(gram(&RayonEngine, black_box(input), &layout)));
        });
    }
    group.finish();
}

fn benchmark_qr_in_place(c: &mut Criterion) {
    let n_cols = 16;
    let layout = ColumnLayout::dense(n_cols);

    let mut group = c.benchmark_group("qr_in_place");
    for &n_rows in &[1_000_usize, 10_000] {
        let frame = random_frame(n_rows, n_cols, 1024);
        group.throughput(Throughput::Elements((n_rows * n_cols) as u64));
        group.bench_with_input(BenchmarkId::new("rayon", n_rows), &frame, |b, input| {
            b.iter(|| {
                let mut work = input.clone();
                compute_q_in_place(&RayonEngine, &mut work, &layout).unwrap();
                black_box(work);
            });
        });
    }
    group.finish();
}

criterion_group!(qr_kernels, benchmark_gram, benchmark_qr_in_place);
criterion_main!(qr_kernels);
