use std::io::{self, Write};

use colored::Colorize;
use log::trace;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{Activation, Source};

/// Starting Rprop step for every weight.
pub const INITIAL_UPDATE_VALUE: f64 = 0.1;
pub const MAX_UPDATE_VALUE: f64 = 50.;
pub const MIN_UPDATE_VALUE: f64 = 1e-6;

#[inline(always)]
fn sign(x: f64) -> f64 {
    if x > 0. { 1. } else if x < 0. { -1. } else { 0. }
}

/// A single unit. `weights` has one slot per input plus a trailing bias, and
/// the accumulation and Rprop buffers always have the same length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neuron {
    layer_index: usize,
    neuron_index: usize,
    activation: Activation,
    weights: Vec<f64>,
    accumulated: Vec<f64>,
    old_accumulated: Vec<f64>,
    update_values: Vec<f64>,
    sensitivity: f64,
    #[serde(skip)]
    net: f64,
    #[serde(skip)]
    output: f64,
    #[serde(skip)]
    deriv: f64,
}

impl Neuron {
    /// New neuron with weights drawn uniformly from `[-0.5, 0.5)`.
    pub fn new<R: Rng>(
        rng: &mut R,
        layer_index: usize,
        neuron_index: usize,
        activation: Activation,
        number_of_inputs: usize,
    ) -> Self {
        let weights = (0..=number_of_inputs).map(|_| rng.gen_range(-0.5..0.5)).collect();
        Self::with_weights(layer_index, neuron_index, activation, weights)
    }

    /// Neuron with explicit weights, bias last.
    pub fn with_weights(layer_index: usize, neuron_index: usize, activation: Activation, weights: Vec<f64>) -> Self {
        assert!(!weights.is_empty(), "a neuron needs at least its bias weight");
        let len = weights.len();
        Self {
            layer_index,
            neuron_index,
            activation,
            weights,
            accumulated: vec![0.; len],
            old_accumulated: vec![0.; len],
            update_values: vec![INITIAL_UPDATE_VALUE; len],
            sensitivity: 0.,
            net: 0.,
            output: 0.,
            deriv: 0.,
        }
    }

    #[inline(always)]
    pub fn number_of_inputs(&self) -> usize { self.weights.len() - 1 }
    #[inline(always)]
    pub fn weights(&self) -> &[f64] { &self.weights }
    #[inline(always)]
    pub fn weight(&self, j: usize) -> f64 { self.weights[j] }
    #[inline(always)]
    pub fn bias(&self) -> f64 { self.weights[self.number_of_inputs()] }
    #[inline(always)]
    pub fn net(&self) -> f64 { self.net }
    #[inline(always)]
    pub fn output(&self) -> f64 { self.output }
    #[inline(always)]
    pub fn derivative(&self) -> f64 { self.deriv }
    #[inline(always)]
    pub fn sensitivity(&self) -> f64 { self.sensitivity }
    pub fn accumulated(&self) -> &[f64] { &self.accumulated }
    pub fn update_values(&self) -> &[f64] { &self.update_values }
    pub fn activation(&self) -> Activation { self.activation }
    pub fn layer_index(&self) -> usize { self.layer_index }
    pub fn neuron_index(&self) -> usize { self.neuron_index }

    pub fn set_weight(&mut self, j: usize, weight: f64) {
        assert!(j <= self.number_of_inputs(), "weight index {} out of range", j);
        self.weights[j] = weight;
    }

    #[inline(always)]
    fn compute_net<S: Source + ?Sized>(&self, source: &S) -> f64 {
        let n = self.number_of_inputs();
        let mut net = self.weights[n];
        for j in 0..n {
            net += self.weights[j] * source.get(j);
        }
        net
    }

    /// Training forward step: remembers net, output and derivative.
    pub fn fire<S: Source + ?Sized>(&mut self, source: &S) {
        self.net = self.compute_net(source);
        self.output = self.activation.act(self.net);
        self.deriv = self.activation.deriv(self.net, self.output);
    }

    /// Inference forward step. The derivative is left untouched.
    pub fn infer<S: Source + ?Sized>(&mut self, source: &S) {
        self.net = self.compute_net(source);
        self.output = self.activation.infer(self.net);
    }

    /// Chain rule through this neuron's own activation.
    #[inline(always)]
    pub fn set_sensitivity(&mut self, factor: f64) {
        self.sensitivity = self.deriv * factor;
    }

    /// Sets the sensitivity verbatim, e.g. when restoring a saved network.
    pub fn set_fixed_sensitivity(&mut self, sensitivity: f64) {
        self.sensitivity = sensitivity;
    }

    #[inline(always)]
    pub fn weighted_sensitivity(&self, j: usize) -> f64 {
        self.sensitivity * self.weights[j]
    }

    fn add_weight(&mut self, j: usize, factor: f64, input: f64) {
        let delta = factor * input;
        let new_weight = self.weights[j] + delta;
        trace!(
            "backward layer {} neuron {} input: {: >7.4} add {: >7.4} (from {: >7.4} to {: >7.4})",
            self.layer_index, self.neuron_index, input, delta, self.weights[j], new_weight
        );
        self.weights[j] = new_weight;
    }

    /// Online update, applied immediately.
    pub fn adjust_weights<S: Source + ?Sized>(&mut self, source: &S, rate: f64) {
        let factor = -rate * self.sensitivity;
        let n = self.number_of_inputs();
        for j in 0..n {
            self.add_weight(j, factor, source.get(j));
        }
        self.add_weight(n, factor, 1.);
    }

    /// Same delta as [`Neuron::adjust_weights`], deferred into the accumulator.
    pub fn accumulate_weights<S: Source + ?Sized>(&mut self, source: &S, rate: f64) {
        let factor = -rate * self.sensitivity;
        let n = self.number_of_inputs();
        for j in 0..n {
            self.accumulated[j] += factor * source.get(j);
        }
        self.accumulated[n] += factor;
    }

    /// Raw gradient, no learning rate.
    pub fn accumulate_gradient<S: Source + ?Sized>(&mut self, source: &S) {
        let n = self.number_of_inputs();
        for j in 0..n {
            self.accumulated[j] += self.sensitivity * source.get(j);
        }
        self.accumulated[n] += self.sensitivity;
    }

    pub fn clear_accumulation(&mut self) {
        self.accumulated.iter_mut().for_each(|a| *a = 0.);
    }

    /// Adds the accumulator into the weights. The accumulator keeps its value.
    pub fn install_accumulation(&mut self) {
        for (w, a) in self.weights.iter_mut().zip(&self.accumulated) {
            *w += a;
        }
    }

    pub fn adjust_by_rprop(&mut self, eta_plus: f64, eta_minus: f64) {
        for j in 0..self.weights.len() {
            let product = self.old_accumulated[j] * self.accumulated[j];

            if product > 0. {
                self.update_values[j] = (eta_plus * self.update_values[j]).min(MAX_UPDATE_VALUE);
                self.weights[j] -= self.update_values[j] * sign(self.accumulated[j]);
                self.old_accumulated[j] = self.accumulated[j];
            } else if product < 0. {
                // the gradient changed sign: we overshot, shrink the step and skip the update
                self.update_values[j] = (eta_minus * self.update_values[j]).max(MIN_UPDATE_VALUE);
                self.old_accumulated[j] = 0.;
            } else {
                self.weights[j] -= self.update_values[j] * sign(self.accumulated[j]);
                self.old_accumulated[j] = self.accumulated[j];
            }

            self.accumulated[j] = 0.;
        }
    }

    pub fn show_weights(&self, title: &str) {
        println!("layer {} neuron {} {} weights: ", self.layer_index, self.neuron_index, title);
        for w in &self.weights {
            let text = format!("{: >9.4} ", w);
            print!("{}", if *w < 0. { text.red() } else { text.green() });
        }
        println!("(bias) sensitivity: {: >7.4} ", self.sensitivity);
    }

    /// Writes `layerIndex, neuronIndex, numberOfInputs, weights.., sensitivity`,
    /// one value per line.
    pub fn save_weights<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "{}", self.layer_index)?;
        writeln!(w, "{}", self.neuron_index)?;
        writeln!(w, "{}", self.number_of_inputs())?;
        for weight in &self.weights {
            writeln!(w, "{}", weight)?;
        }
        writeln!(w, "{}", self.sensitivity)
    }
}
