//! Numerical gradient checking for the backward pass.
//!
//! For each parameter `w` the analytical gradient from
//! `backward_propagation()` is compared against the central difference
//!
//! `grad_num = (C(w + ε) - C(w - ε)) / (2ε)`
//!
//! where `C` is the trainer's own cost. The output layer is a sigmoid over
//! binary labels, for which the error-signal cost is exactly binary
//! cross-entropy, so the two must agree for every hidden activation.
//!
//! Run with: cargo test --test gradient_check

use ndarray::Array2;
use nettrain::{Activation, CpuDevice, NetTrainer, Network, TrainConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Step for the central difference. f32 needs a large step.
const EPSILON: f32 = 1e-2;

/// Allowed error: `ABS_TOL + REL_TOL * |grad_num|`.
const ABS_TOL: f32 = 2e-4;
const REL_TOL: f32 = 5e-2;

/// Minimum fraction of checks that must pass (kinks in ReLU variants).
const MIN_PASS_RATE: f32 = 0.9;

const EXAMPLES: usize = 6;

fn batch(seed: u64) -> (Array2<f32>, Array2<f32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let x = Array2::from_shape_simple_fn((3, EXAMPLES), || rng.gen_range(-1.0..1.0));
    let y = Array2::from_shape_fn((2, EXAMPLES), |(r, c)| ((r + c) % 2) as f32);
    (x, y)
}

fn config(reg_term: f32) -> TrainConfig {
    TrainConfig {
        weight_scale: 1.0,
        learn_rate: 0.1,
        reg_term,
    }
}

/// Cost of `network` as reduced by the trainer.
fn cost_of(network: &Network, x: &Array2<f32>, y: &Array2<f32>, reg_term: f32) -> f32 {
    let mut trainer = NetTrainer::new(CpuDevice::new(), network, x, y, &config(reg_term)).unwrap();
    trainer.forward_train();
    trainer.backward_propagation();
    trainer.calc_cost()
}

fn check_network(network: &Network, reg_term: f32, seed: u64) {
    let (x, y) = batch(seed);

    let mut trainer = NetTrainer::new(CpuDevice::new(), network, &x, &y, &config(reg_term)).unwrap();
    trainer.forward_train();
    trainer.backward_propagation();
    let (dw, db) = trainer.gradients().to_host(trainer.device()).unwrap();

    let mut checks = 0usize;
    let mut passed = 0usize;
    let mut worst = (0.0f32, String::new());

    for layer in 0..network.depth() {
        for is_bias in [false, true] {
            let analytical = if is_bias { &db[layer] } else { &dw[layer] };
            for ((r, c), &grad_ana) in analytical.indexed_iter() {
                let mut plus = network.clone();
                let mut minus = network.clone();
                if is_bias {
                    plus.biases[layer][[r, c]] += EPSILON;
                    minus.biases[layer][[r, c]] -= EPSILON;
                } else {
                    plus.weights[layer][[r, c]] += EPSILON;
                    minus.weights[layer][[r, c]] -= EPSILON;
                }
                let grad_num = (cost_of(&plus, &x, &y, reg_term) - cost_of(&minus, &x, &y, reg_term))
                    / (2.0 * EPSILON);

                let err = (grad_ana - grad_num).abs();
                checks += 1;
                if err <= ABS_TOL + REL_TOL * grad_num.abs() {
                    passed += 1;
                } else if err > worst.0 {
                    let kind = if is_bias { "b" } else { "W" };
                    worst = (err, format!("{kind}{layer}[{r},{c}]: ana {grad_ana}, num {grad_num}"));
                }
            }
        }
    }

    let rate = passed as f32 / checks as f32;
    assert!(
        rate >= MIN_PASS_RATE,
        "{:?}: {passed}/{checks} gradients matched; worst {}",
        network.activations,
        worst.1
    );
}

/// Small weights keep `sin` on its monotonic branch.
fn small_network(hidden: Activation, seed: u64) -> Network {
    let mut network = Network::new(&[3, 4, 2], &[hidden, Activation::Sigmoid], Some(seed)).unwrap();
    for w in &mut network.weights {
        w.mapv_inplace(|v| v * 0.5);
    }
    for b in &mut network.biases {
        b.fill(0.05);
    }
    network
}

#[test]
fn test_gradients_sigmoid_hidden() {
    check_network(&small_network(Activation::Sigmoid, 1), 0.0, 11);
}

#[test]
fn test_gradients_tanh_hidden() {
    check_network(&small_network(Activation::Tanh, 2), 0.0, 12);
}

#[test]
fn test_gradients_relu_hidden() {
    check_network(&small_network(Activation::ReLU, 3), 0.0, 13);
}

#[test]
fn test_gradients_leaky_relu_hidden() {
    check_network(&small_network(Activation::LeakyReLU, 4), 0.0, 14);
}

#[test]
fn test_gradients_sine_hidden() {
    check_network(&small_network(Activation::Sine, 5), 0.0, 15);
}

#[test]
fn test_gradients_linear_hidden() {
    check_network(&small_network(Activation::Linear, 6), 0.0, 16);
}

#[test]
fn test_gradients_with_regularization() {
    check_network(&small_network(Activation::Tanh, 7), 2.0, 17);
}

#[test]
fn test_gradients_deep_network() {
    let mut network = Network::new(
        &[3, 5, 4, 2],
        &[Activation::Tanh, Activation::Sigmoid, Activation::Sigmoid],
        Some(8),
    )
    .unwrap();
    for w in &mut network.weights {
        w.mapv_inplace(|v| v * 0.8);
    }
    check_network(&network, 0.0, 18);
}
