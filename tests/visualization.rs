//! Visualization tests.
//!
//! Rendering must reproduce the host forward pass over the screen points and
//! must leave every piece of training state untouched.
//!
//! Run with: cargo test --test visualization

use ndarray::{array, Array2};
use nettrain::color::shade;
use nettrain::{Activation, CpuDevice, NetTrainer, Network, TrainConfig, TrainError};

/// Screen of `m × k` points spread over `[-1, 1]²`, one point per column.
fn screen(m: usize, k: usize) -> Array2<f32> {
    Array2::from_shape_fn((2, m * k), |(axis, p)| {
        let (row, col) = (p / k, p % k);
        let t = if axis == 0 { col as f32 / (k - 1) as f32 } else { row as f32 / (m - 1) as f32 };
        2.0 * t - 1.0
    })
}

fn trainer(output: usize, seed: u64) -> (NetTrainer<CpuDevice>, Network) {
    let network = Network::new(
        &[2, 5, output],
        &[Activation::Tanh, Activation::Sigmoid],
        Some(seed),
    )
    .unwrap();
    let x = array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
    let y = Array2::from_shape_fn((output, 4), |(r, c)| ((r + c) % 2) as f32);
    let trainer = NetTrainer::new(CpuDevice::new(), &network, &x, &y, &TrainConfig::default()).unwrap();
    (trainer, network)
}

fn expected_pixels(network: &Network, screen: &Array2<f32>, discrete: bool) -> Vec<i32> {
    let out = network.forward(screen);
    out.columns()
        .into_iter()
        .map(|col| shade(&col.to_vec(), discrete))
        .collect()
}

#[test]
fn test_render_matches_host_forward() {
    let (mut trainer, network) = trainer(1, 3);
    let (m, k) = (4, 5);
    let points = screen(m, k);
    trainer.build_visualization(&points, m, k).unwrap();

    for discrete in [false, true] {
        let mut out = vec![0i32; m * k];
        trainer.visualization(&mut out, discrete).unwrap();
        assert_eq!(out, expected_pixels(&network, &points, discrete), "discrete={discrete}");
    }
}

#[test]
fn test_render_multiclass_discrete() {
    let (mut trainer, network) = trainer(3, 9);
    let (m, k) = (3, 3);
    let points = screen(m, k);
    trainer.build_visualization(&points, m, k).unwrap();

    let mut out = vec![0i32; m * k];
    trainer.visualization(&mut out, true).unwrap();
    assert_eq!(out, expected_pixels(&network, &points, true));
}

#[test]
fn test_render_leaves_training_state() {
    let (mut trainer, _) = trainer(1, 5);
    trainer.update_single_step();
    trainer.forward_train();

    let device = CpuDevice::new();
    let acts_before = trainer.cache().activations_to_host(&device).unwrap();
    let errors_before = trainer.cache().errors_to_host(&device).unwrap();
    let cost_before = trainer.cost();
    let t_before = trainer.momentum().t;
    let grads_before = trainer.gradients().to_host(&device).unwrap();
    let first_before = trainer.momentum().first.to_host(&device).unwrap();
    let second_before = trainer.momentum().second.to_host(&device).unwrap();
    let mut net_before = Network::new(&[2, 5, 1], &[Activation::Tanh, Activation::Sigmoid], None).unwrap();
    trainer.update_host_network(&mut net_before).unwrap();

    let points = screen(6, 6);
    trainer.build_visualization(&points, 6, 6).unwrap();
    let mut out = vec![0i32; 36];
    trainer.visualization(&mut out, false).unwrap();

    assert_eq!(trainer.cache().activations_to_host(&device).unwrap(), acts_before);
    assert_eq!(trainer.cache().errors_to_host(&device).unwrap(), errors_before);
    assert_eq!(trainer.cost(), cost_before);
    assert_eq!(trainer.momentum().t, t_before);
    assert_eq!(trainer.gradients().to_host(&device).unwrap(), grads_before);
    assert_eq!(trainer.momentum().first.to_host(&device).unwrap(), first_before);
    assert_eq!(trainer.momentum().second.to_host(&device).unwrap(), second_before);

    let mut net_after = net_before.clone();
    trainer.update_host_network(&mut net_after).unwrap();
    assert_eq!(net_after, net_before);
}

#[test]
fn test_render_follows_training() {
    let (mut trainer, _) = trainer(1, 7);
    let points = screen(4, 4);
    trainer.build_visualization(&points, 4, 4).unwrap();

    for _ in 0..20 {
        trainer.update_single_step();
    }
    let mut trained = Network::new(&[2, 5, 1], &[Activation::Tanh, Activation::Sigmoid], None).unwrap();
    trainer.update_host_network(&mut trained).unwrap();

    let mut out = vec![0i32; 16];
    trainer.visualization(&mut out, false).unwrap();
    assert_eq!(out, expected_pixels(&trained, &points, false));
}

#[test]
fn test_wrong_output_length() {
    let (mut trainer, _) = trainer(1, 1);
    trainer.build_visualization(&screen(2, 3), 2, 3).unwrap();

    let mut out = vec![0i32; 5];
    assert!(matches!(
        trainer.visualization(&mut out, false),
        Err(TrainError::VisualizationTarget { m: 2, k: 3, pixels: 5 })
    ));
}

#[test]
fn test_rebuild_replaces_target() {
    let (mut trainer, network) = trainer(1, 2);
    trainer.build_visualization(&screen(2, 2), 2, 2).unwrap();
    let points = screen(3, 4);
    trainer.build_visualization(&points, 3, 4).unwrap();

    let mut out = vec![0i32; 12];
    trainer.visualization(&mut out, true).unwrap();
    assert_eq!(out, expected_pixels(&network, &points, true));
}
