//! Feed-forward multi-layer network trainer: backpropagation with online,
//! batch and Rprop weight updates, plus an inference-only evaluation path.

mod activation;
mod config;
mod error;
mod layer;
mod loader;
mod network;
mod neuron;
mod sample;
mod trace;
mod trainer;
mod weights;

pub use {
    activation::*,
    config::*,
    error::*,
    layer::*,
    loader::*,
    network::*,
    neuron::*,
    sample::*,
    trace::*,
    trainer::*,
    weights::*
};


/// Scalar functions the activation table is built from.
pub mod normalizers {

    pub fn sigmoid(x: f64) -> f64 {
        1. / (1. + (-x).exp())
    }

    pub fn sigmoid_derivative(_: f64, y: f64) -> f64 { y * (1. - y) }

    pub fn tanh(x: f64) -> f64 { x.tanh() }

    pub fn tanh_derivative(_: f64, y: f64) -> f64 { 1. - y * y }

    pub fn exact(x: f64) -> f64 { x }

    pub fn exact_derivative(_: f64, _: f64) -> f64 { 1. }

    pub fn step(x: f64) -> f64 { if x > 0. { 1. } else { 0. } }

    pub fn sign_step(x: f64) -> f64 { if x > 0. { 1. } else { -1. } }

    pub fn saturate(x: f64) -> f64 { x.clamp(0., 1.) }

    pub fn saturate_symmetric(x: f64) -> f64 { x.clamp(-1., 1.) }

}

/// Space separated outputs, coloured by sign the way weights are shown.
pub fn format_outputs(values: &[f64]) -> String {
    use colored::Colorize;

    values
        .iter()
        .map(|v| {
            let text = format!("{: >8.4}", v);
            if *v < 0. { text.red().to_string() } else { text.green().to_string() }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
