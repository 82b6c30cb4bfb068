//! GPU vs host parity tests.
//!
//! Every kernel of [`WgpuDevice`] must reproduce the host reference device
//! within f32 tolerance, and a full training run must follow the same path.
//!
//! Run with: cargo test --features gpu --test gpu_parity -- --ignored

#![cfg(feature = "gpu")]

use ndarray::{array, Array2};
use nettrain::gpu::{WgpuDevice, WgpuOptions};
use nettrain::{Activation, CpuDevice, Device, NetTrainer, Network, TrainConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Tolerance for GPU vs host comparison.
const TOL: f32 = 1e-4;

fn gpu() -> WgpuDevice {
    WgpuDevice::new(WgpuOptions::default()).expect("Failed to open GPU device")
}

fn random(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((rows, cols), || rng.gen_range(-1.0..1.0))
}

fn assert_close(gpu: &Array2<f32>, cpu: &Array2<f32>, what: &str) {
    assert_eq!(gpu.dim(), cpu.dim(), "{what}: shape");
    for ((idx, g), c) in gpu.indexed_iter().zip(cpu.iter()) {
        assert!((g - c).abs() < TOL, "{what}{:?}: gpu {g}, cpu {c}", idx);
    }
}

fn trainers(
    network: &Network,
    x: &Array2<f32>,
    y: &Array2<f32>,
    config: &TrainConfig,
) -> (NetTrainer<WgpuDevice>, NetTrainer<CpuDevice>) {
    (
        NetTrainer::new(gpu(), network, x, y, config).unwrap(),
        NetTrainer::new(CpuDevice::new(), network, x, y, config).unwrap(),
    )
}

#[test]
#[ignore = "Requires GPU"]
fn test_transfer_roundtrip() {
    let device = gpu();
    let host = random(37, 129, 1);
    let m = nettrain::DeviceMatrix::to_device(&device, &host).unwrap();
    assert_eq!(m.to_host(&device).unwrap(), host);

    let zeros = nettrain::DeviceMatrix::zeros(&device, 5, 3).unwrap();
    assert_eq!(zeros.to_host(&device).unwrap(), Array2::<f32>::zeros((5, 3)));
}

#[test]
#[ignore = "Requires GPU"]
fn test_forward_and_backward_parity_all_activations() {
    for (i, hidden) in Activation::ALL.into_iter().enumerate() {
        let network = Network::new(&[4, 7, 3], &[hidden, Activation::Sigmoid], Some(i as u64)).unwrap();
        let x = random(4, 300, 10 + i as u64);
        let y = random(3, 300, 20 + i as u64).mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let (mut g, mut c) = trainers(&network, &x, &y, &TrainConfig::with_reg(0.1, 0.5));

        g.forward_train();
        c.forward_train();
        let (ga, ca) = (
            g.cache().activations_to_host(g.device()).unwrap(),
            c.cache().activations_to_host(c.device()).unwrap(),
        );
        for (l, (ga, ca)) in ga.iter().zip(&ca).enumerate() {
            assert_close(ga, ca, &format!("{hidden} A{l}"));
        }

        g.backward_propagation();
        c.backward_propagation();
        let (gw, gb) = g.gradients().to_host(g.device()).unwrap();
        let (cw, cb) = c.gradients().to_host(c.device()).unwrap();
        for l in 0..network.depth() {
            assert_close(&gw[l], &cw[l], &format!("{hidden} dW{l}"));
            assert_close(&gb[l], &cb[l], &format!("{hidden} db{l}"));
        }

        let (gc, cc) = (g.calc_cost(), c.calc_cost());
        assert!((gc - cc).abs() < TOL, "{hidden}: gpu cost {gc}, cpu cost {cc}");
    }
}

#[test]
#[ignore = "Requires GPU"]
fn test_training_run_parity() {
    let network = Network::new(&[2, 8, 1], &[Activation::Tanh, Activation::Sigmoid], Some(5)).unwrap();
    let x = array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
    let y = array![[0.0, 1.0, 1.0, 0.0]];
    let (mut g, mut c) = trainers(&network, &x, &y, &TrainConfig::with_learn_rate(0.5));

    for step in 0..50 {
        let (gc, cc) = (g.update_single_step(), c.update_single_step());
        assert!((gc - cc).abs() < 1e-3, "step {step}: gpu {gc}, cpu {cc}");
    }

    let mut gn = network.clone();
    let mut cn = network.clone();
    g.update_host_network(&mut gn).unwrap();
    c.update_host_network(&mut cn).unwrap();
    for (gw, cw) in gn.weights.iter().zip(&cn.weights) {
        for (a, b) in gw.iter().zip(cw.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}

#[test]
#[ignore = "Requires GPU"]
fn test_large_batch_dispatch() {
    // More than 65535 * 64 output elements forces a 2D grid.
    let network = Network::new(&[2, 2], &[Activation::Linear], Some(1)).unwrap();
    let examples = 64 * 65_535 / 2 + 100;
    let x = random(2, examples, 3);
    let y = Array2::zeros((2, examples));
    let (mut g, mut c) = trainers(&network, &x, &y, &TrainConfig::default());

    g.forward_train();
    c.forward_train();
    let ga = g.cache().output().to_host(g.device()).unwrap();
    let ca = c.cache().output().to_host(c.device()).unwrap();
    assert_close(&ga, &ca, "A1");
}

#[test]
#[ignore = "Requires GPU"]
fn test_visualization_parity() {
    let network = Network::new(&[2, 6, 3], &[Activation::ReLU, Activation::Sigmoid], Some(9)).unwrap();
    let x = random(2, 10, 4);
    let y = random(3, 10, 5).mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
    let (mut g, mut c) = trainers(&network, &x, &y, &TrainConfig::default());

    let screen = random(2, 32 * 24, 6);
    g.build_visualization(&screen, 32, 24).unwrap();
    c.build_visualization(&screen, 32, 24).unwrap();

    // Discrete mode avoids rounding ties in the blended colors.
    let mut gp = vec![0i32; 32 * 24];
    let mut cp = vec![0i32; 32 * 24];
    g.visualization(&mut gp, true).unwrap();
    c.visualization(&mut cp, true).unwrap();

    let mismatches = gp.iter().zip(&cp).filter(|(a, b)| a != b).count();
    assert!(mismatches <= 2, "{mismatches} pixels differ");
    assert!(g.device().name().len() > 0);
}
