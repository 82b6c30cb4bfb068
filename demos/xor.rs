//! Train a small network on XOR (or a CSV dataset) and render its decision
//! surface as text.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example xor -- --steps 2000
//! cargo run --release --example xor -- --data points.csv --hidden 16
//! cargo run --release --example xor --features gpu -- --gpu
//! ```
//!
//! A CSV dataset holds one example per line; the last column is the label.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{array, Array2};
use nettrain::{
    read_csv, split_labels, write_binary, Activation, CpuDevice, Device, NetTrainer,
    Network, TrainConfig, PALETTE,
};

#[derive(Parser, Debug)]
#[command(name = "xor")]
#[command(about = "Train a dense network on the device and plot its decision surface")]
struct Args {
    /// Training steps
    #[arg(long, default_value = "2000")]
    steps: usize,

    /// Hidden layer width
    #[arg(long, default_value = "8")]
    hidden: usize,

    /// Base learning rate (divided by the node count)
    #[arg(long, default_value = "1.0")]
    learn_rate: f32,

    /// L2 regularization term
    #[arg(long, default_value = "0.0")]
    reg: f32,

    /// CSV dataset with two inputs and a trailing label column
    #[arg(long)]
    data: Option<PathBuf>,

    /// Write the trained first-layer weights here (binary format)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Raster size of the printed decision surface
    #[arg(long, default_value = "24")]
    size: usize,

    /// Seed for weight initialization
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Train on the GPU (requires the `gpu` feature)
    #[arg(long, default_value = "false")]
    gpu: bool,
}

fn load(args: &Args) -> Result<(Array2<f32>, Array2<f32>), Box<dyn std::error::Error>> {
    let Some(path) = &args.data else {
        let x = array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
        let y = array![[0.0, 1.0, 1.0, 0.0]];
        return Ok((x, y));
    };
    Ok(split_labels(read_csv(path)?)?)
}

/// Screen spanning the bounding box of the inputs, one point per column.
fn screen(x: &Array2<f32>, size: usize) -> Array2<f32> {
    let bounds: Vec<(f32, f32)> = x
        .rows()
        .into_iter()
        .map(|r| r.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v))))
        .collect();
    Array2::from_shape_fn((2, size * size), |(axis, p)| {
        let t = if axis == 0 { p % size } else { p / size } as f32 / (size - 1).max(1) as f32;
        let (lo, hi) = bounds[axis];
        lo + t * (hi - lo)
    })
}

fn print_surface(pixels: &[i32], size: usize) {
    const GLYPHS: [char; 6] = ['.', '#', 'o', '+', 'x', '*'];
    for row in pixels.chunks(size).rev() {
        let line: String = row
            .iter()
            .map(|&p| {
                PALETTE
                    .iter()
                    .position(|c| c.to_bits() == p)
                    .map_or('?', |i| GLYPHS[i])
            })
            .collect();
        println!("  {}", line);
    }
}

fn run<D: Device>(device: D, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let (x, y) = load(args)?;
    println!("  Device:   {}", device.name());
    println!("  Examples: {}", x.ncols());

    let mut network = Network::new(
        &[x.nrows(), args.hidden, y.nrows()],
        &[Activation::Tanh, Activation::Sigmoid],
        Some(args.seed),
    )?;
    let config = TrainConfig::with_reg(args.learn_rate, args.reg);
    let mut trainer = NetTrainer::new(device, &network, &x, &y, &config)?;

    let pb = ProgressBar::new(args.steps as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );

    let start = Instant::now();
    let mut cost = 0.0;
    for step in 0..args.steps {
        cost = trainer.update_single_step();
        if step % 50 == 0 {
            pb.set_message(format!("cost {:.5}", cost));
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("cost {:.5}", cost));

    let p = trainer.profiler();
    println!();
    println!("  Trained in {:.2?}", start.elapsed());
    println!(
        "  Last step: forward {:.3}ms, backprop {:.3}ms, update {:.3}ms, cost {:.3}ms",
        p.forward_time, p.backprop_time, p.update_time, p.calc_cost_time
    );

    if x.nrows() == 2 {
        let size = args.size.max(2);
        trainer.build_visualization(&screen(&x, size), size, size)?;
        let mut pixels = vec![0i32; size * size];
        trainer.visualization(&mut pixels, true)?;
        println!();
        print_surface(&pixels, size);
    }

    trainer.update_host_network(&mut network)?;
    let predictions = network.forward(&x);
    println!();
    for (c, (p, t)) in predictions.iter().zip(y.iter()).enumerate().take(8) {
        println!("  example {:>3}: predicted {:.3}, label {}", c, p, t);
    }

    if let Some(path) = &args.save {
        write_binary(path, &network.weights[0])?;
        println!("  Saved first-layer weights to {}", path.display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.gpu {
        #[cfg(feature = "gpu")]
        {
            let device = nettrain::gpu::WgpuDevice::new(nettrain::gpu::WgpuOptions::default())?;
            return run(device, &args);
        }
        #[cfg(not(feature = "gpu"))]
        return Err("rebuild with --features gpu to train on the GPU".into());
    }
    run(CpuDevice::new(), &args)
}
