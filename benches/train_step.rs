//! Training step benchmarks.
//!
//! Run with: cargo bench --bench train_step
//! GPU: cargo bench --bench train_step --features gpu -- --gpu
//!
//! Without the `--gpu` flag the GPU group is skipped (CI-safe default).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array2;
use nettrain::{Activation, CpuDevice, Device, NetTrainer, Network, TrainConfig};
use rand::{rngs::StdRng, Rng, SeedableRng};

const LAYERS: [usize; 3] = [8, 32, 2];
const ACTS: [Activation; 2] = [Activation::Tanh, Activation::Sigmoid];
const BATCHES: [usize; 3] = [64, 512, 4096];

fn make_batch(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(-1.0..1.0))
}

fn trainer<D: Device>(device: D, examples: usize) -> NetTrainer<D> {
    let network = Network::new(&LAYERS, &ACTS, Some(7)).unwrap();
    let x = make_batch(LAYERS[0], examples, 11);
    let y = make_batch(LAYERS[2], examples, 13).mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
    NetTrainer::new(device, &network, &x, &y, &TrainConfig::default()).unwrap()
}

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_step_cpu");

    for &examples in &BATCHES {
        // Weights change every iteration; criterion measures the steady state.
        let mut trainer = trainer(CpuDevice::new(), examples);
        group.throughput(Throughput::Elements(examples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(examples), &examples, |b, _| {
            b.iter(|| trainer.update_single_step());
        });
    }

    group.finish();
}

#[cfg(feature = "gpu")]
fn bench_gpu_step(c: &mut Criterion) {
    use nettrain::gpu::{WgpuDevice, WgpuOptions};

    if !std::env::args().any(|arg| arg == "--gpu") {
        eprintln!("GPU benchmarks skipped (--gpu flag not provided).");
        return;
    }

    let mut group = c.benchmark_group("train_step_gpu");
    for &examples in &BATCHES {
        let device = match WgpuDevice::new(WgpuOptions::default()) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("GPU not available: {e}");
                return;
            }
        };
        let mut trainer = trainer(device, examples);
        group.throughput(Throughput::Elements(examples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(examples), &examples, |b, _| {
            b.iter(|| trainer.update_single_step());
        });
    }
    group.finish();
}

#[cfg(not(feature = "gpu"))]
fn bench_gpu_step(_c: &mut Criterion) {}

criterion_group!(benches, bench_cpu_step, bench_gpu_step);
criterion_main!(benches);
