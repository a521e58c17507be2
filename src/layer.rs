use std::io::{self, Write};

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{format_outputs, Activation, Neuron, Sample, Source};

/// What a layer's outputs, sensitivities and errors mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Every neuron output is a layer output, trained against a real target.
    Standard,
    /// Classification by arg-max: the single logical output is the index of
    /// the neuron with the largest activation.
    OneHot { max_index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    index: usize,
    activation: Activation,
    kind: LayerKind,
    neurons: Vec<Neuron>,
}

impl Layer {
    /// Randomly initialised layer. `onehot` layers get tansig neurons no
    /// matter what, their decision needs a symmetric output range.
    pub fn new<R: Rng>(rng: &mut R, index: usize, size: usize, activation: Activation, number_of_inputs: usize) -> Self {
        let neuron_activation = activation.neuron_activation();
        let neurons = (0..size)
            .map(|i| Neuron::new(rng, index, i, neuron_activation, number_of_inputs))
            .collect();
        Self::from_neurons(index, activation, neurons)
    }

    /// Layer with explicit weights, one row per neuron (bias last).
    pub fn with_weights(index: usize, activation: Activation, weights: Vec<Vec<f64>>) -> Self {
        let neuron_activation = activation.neuron_activation();
        let neurons = weights
            .into_iter()
            .enumerate()
            .map(|(i, w)| Neuron::with_weights(index, i, neuron_activation, w))
            .collect();
        Self::from_neurons(index, activation, neurons)
    }

    fn from_neurons(index: usize, activation: Activation, neurons: Vec<Neuron>) -> Self {
        assert!(!neurons.is_empty(), "layer {} has no neurons", index);
        let kind = if activation.is_onehot() { LayerKind::OneHot { max_index: 0 } } else { LayerKind::Standard };
        Self { index, activation, kind, neurons }
    }

    pub fn index(&self) -> usize { self.index }
    /// Number of neurons (categories, for a one-hot layer).
    pub fn size(&self) -> usize { self.neurons.len() }
    /// The configured activation; `onehot` for a one-hot layer.
    pub fn activation(&self) -> Activation { self.activation }
    pub fn kind(&self) -> LayerKind { self.kind }
    pub fn neurons(&self) -> &[Neuron] { &self.neurons }
    pub fn neuron(&self, i: usize) -> &Neuron { &self.neurons[i] }
    pub fn number_of_inputs(&self) -> usize { self.neurons[0].number_of_inputs() }

    pub fn is_onehot(&self) -> bool { matches!(self.kind, LayerKind::OneHot { .. }) }

    /// Arg-max category of the last forward pass, for one-hot layers.
    pub fn max_index(&self) -> Option<usize> {
        match self.kind {
            LayerKind::OneHot { max_index } => Some(max_index),
            LayerKind::Standard => None,
        }
    }

    pub fn fire<S: Source + ?Sized>(&mut self, source: &S) {
        for neuron in &mut self.neurons {
            neuron.fire(source);
        }
        self.record_max_index();
    }

    /// Inference pass. A one-hot layer behaves exactly like [`Layer::fire`].
    pub fn infer<S: Source + ?Sized>(&mut self, source: &S) {
        if self.is_onehot() {
            return self.fire(source);
        }
        for neuron in &mut self.neurons {
            neuron.infer(source);
        }
    }

    fn record_max_index(&mut self) {
        if let LayerKind::OneHot { max_index } = &mut self.kind {
            let mut best = 0;
            for (i, neuron) in self.neurons.iter().enumerate().skip(1) {
                if neuron.output() > self.neurons[best].output() {
                    best = i;
                }
            }
            *max_index = best;
        }
    }

    /// Backward signal for input `i` of the previous layer.
    pub fn sum_weighted_sensitivity(&self, i: usize) -> f64 {
        self.neurons.iter().map(|n| n.weighted_sensitivity(i)).sum()
    }

    /// Hidden layer sensitivities, pulled from the layer ahead.
    pub fn set_sensitivity_from_layer(&mut self, next: &Layer) {
        for (i, neuron) in self.neurons.iter_mut().enumerate() {
            neuron.set_sensitivity(next.sum_weighted_sensitivity(i));
        }
    }

    /// Output layer sensitivities, from the derivative of the squared error.
    ///
    /// A one-hot layer reads the desired category from `sample.output(0)` and
    /// trains every neuron towards `+1` for that category and `-1` otherwise.
    pub fn set_sensitivity_from_sample(&mut self, sample: &Sample) {
        match self.kind {
            LayerKind::Standard => {
                for (i, neuron) in self.neurons.iter_mut().enumerate() {
                    let error = sample.output(i) - neuron.output();
                    neuron.set_sensitivity(-2. * error);
                }
            }
            LayerKind::OneHot { .. } => {
                let desired = self.desired_category(sample);
                for (i, neuron) in self.neurons.iter_mut().enumerate() {
                    let target = if i == desired { 1. } else { -1. };
                    let error = target - neuron.output();
                    neuron.set_sensitivity(-2. * error);
                }
            }
        }
    }

    fn desired_category(&self, sample: &Sample) -> usize {
        let desired = sample.output(0);
        assert!(
            desired >= 0. && (desired as usize) < self.size(),
            "category {} out of range for {} categories", desired, self.size()
        );
        desired as usize
    }

    /// Whether `sample` carries a usable category for this one-hot layer.
    pub fn accepts_category(&self, sample: &Sample) -> bool {
        let desired = sample.output(0);
        desired >= 0. && desired.fract() == 0. && (desired as usize) < self.size()
    }

    /// Sum squared error for a standard layer, 0/1 misclassification for a
    /// one-hot layer.
    pub fn compute_error(&self, sample: &Sample) -> f64 {
        match self.kind {
            LayerKind::Standard => self
                .neurons
                .iter()
                .enumerate()
                .map(|(i, n)| (sample.output(i) - n.output()).powi(2))
                .sum(),
            LayerKind::OneHot { max_index } => {
                if max_index as f64 == sample.output(0) { 0. } else { 1. }
            }
        }
    }

    pub fn set_weight(&mut self, i: usize, j: usize, weight: f64) {
        assert!(i < self.size(), "neuron index {} out of range", i);
        self.neurons[i].set_weight(j, weight);
    }

    pub fn set_fixed_sensitivity(&mut self, i: usize, sensitivity: f64) {
        assert!(i < self.size(), "neuron index {} out of range", i);
        self.neurons[i].set_fixed_sensitivity(sensitivity);
    }

    pub fn adjust_weights<S: Source + ?Sized>(&mut self, source: &S, rate: f64) {
        self.neurons.iter_mut().for_each(|n| n.adjust_weights(source, rate));
    }

    pub fn accumulate_weights<S: Source + ?Sized>(&mut self, source: &S, rate: f64) {
        self.neurons.iter_mut().for_each(|n| n.accumulate_weights(source, rate));
    }

    pub fn accumulate_gradient<S: Source + ?Sized>(&mut self, source: &S) {
        self.neurons.iter_mut().for_each(|n| n.accumulate_gradient(source));
    }

    pub fn clear_accumulation(&mut self) {
        self.neurons.iter_mut().for_each(Neuron::clear_accumulation);
    }

    pub fn install_accumulation(&mut self) {
        self.neurons.iter_mut().for_each(Neuron::install_accumulation);
    }

    pub fn adjust_by_rprop(&mut self, eta_plus: f64, eta_minus: f64) {
        self.neurons.iter_mut().for_each(|n| n.adjust_by_rprop(eta_plus, eta_minus));
    }

    /// Logical outputs: one per neuron, or the chosen category.
    pub fn outputs(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    pub fn show_weights(&self, title: &str) {
        self.neurons.iter().for_each(|n| n.show_weights(title));
    }

    /// Prints the logical outputs on the current line, coloured by sign.
    pub fn show_output(&self) {
        print!("{}", format_outputs(&self.outputs()));
    }

    pub fn save_weights<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        self.neurons.iter().try_for_each(|n| n.save_weights(w))
    }

    /// One line with the logical outputs, space separated.
    pub fn save_output<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        let line = self.outputs().iter().map(f64::to_string).collect::<Vec<_>>().join(" ");
        writeln!(w, "{}", line)
    }
}

impl Source for Layer {
    #[inline(always)]
    fn get(&self, i: usize) -> f64 {
        match self.kind {
            LayerKind::Standard => self.neurons[i].output(),
            LayerKind::OneHot { max_index } => {
                debug_assert_eq!(i, 0, "a one-hot layer has a single output");
                max_index as f64
            }
        }
    }

    fn len(&self) -> usize {
        match self.kind {
            LayerKind::Standard => self.neurons.len(),
            LayerKind::OneHot { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn three_categories() -> Layer {
        // biases chosen so that tanh gives (0.2, 0.9, -0.3) with a zero input
        Layer::with_weights(1, Activation::Onehot, vec![
            vec![0., 0.2f64.atanh()],
            vec![0., 0.9f64.atanh()],
            vec![0., (-0.3f64).atanh()],
        ])
    }

    #[test]
    fn new_layer_has_uniform_width() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Layer::new(&mut rng, 2, 4, Activation::Logsig, 3);
        assert_eq!(layer.size(), 4);
        assert!(layer.neurons().iter().all(|n| n.weights().len() == 4));
        assert!(layer.neurons().iter().enumerate().all(|(i, n)| n.neuron_index() == i && n.layer_index() == 2));
    }

    #[test]
    fn onehot_layer_forces_tansig() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Layer::new(&mut rng, 1, 3, Activation::Onehot, 2);
        assert_eq!(layer.activation(), Activation::Onehot);
        assert!(layer.neurons().iter().all(|n| n.activation() == Activation::Tansig));
        assert_eq!(Source::len(&layer), 1);
    }

    #[test]
    fn onehot_picks_the_largest_output() {
        let mut layer = three_categories();
        layer.fire(&Sample::from_parts(vec![1.], vec![0.]));
        assert_relative_eq!(layer.neuron(0).output(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(layer.neuron(1).output(), 0.9, epsilon = 1e-12);
        assert_relative_eq!(layer.neuron(2).output(), -0.3, epsilon = 1e-12);
        assert_eq!(layer.get(0), 1.);
        assert_eq!(layer.max_index(), Some(1));

        assert_eq!(layer.compute_error(&Sample::from_parts(vec![1.], vec![0.])), 0.);
        assert_eq!(layer.compute_error(&Sample::from_parts(vec![0.], vec![0.])), 1.);
        assert_eq!(layer.compute_error(&Sample::from_parts(vec![2.], vec![0.])), 1.);
    }

    #[test]
    fn onehot_ties_go_to_the_first_index() {
        let mut layer = Layer::with_weights(0, Activation::Onehot, vec![vec![0.1], vec![0.5], vec![0.5]]);
        layer.fire(&Sample::from_parts(vec![0.], vec![]));
        assert_eq!(layer.max_index(), Some(1));
    }

    #[test]
    fn onehot_sensitivity_is_one_versus_rest() {
        let mut layer = three_categories();
        let sample = Sample::from_parts(vec![2.], vec![0.]);
        layer.fire(&sample);
        layer.set_sensitivity_from_sample(&sample);
        for (i, out) in [0.2f64, 0.9, -0.3].into_iter().enumerate() {
            let target = if i == 2 { 1. } else { -1. };
            let expected = (1. - out * out) * -2. * (target - out);
            assert_relative_eq!(layer.neuron(i).sensitivity(), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn standard_sensitivity_and_error_follow_squared_error() {
        let mut layer = Layer::with_weights(0, Activation::Purelin, vec![vec![1., 0.], vec![0., 0.5]]);
        let sample = Sample::from_parts(vec![2., 0.5], vec![3.]);
        layer.fire(&sample);
        assert_eq!(layer.outputs(), vec![3., 0.5]);
        layer.set_sensitivity_from_sample(&sample);
        assert_eq!(layer.neuron(0).sensitivity(), 2.);
        assert_eq!(layer.neuron(1).sensitivity(), 0.);
        assert_eq!(layer.compute_error(&sample), 1.);
        assert_eq!(layer.compute_error(&Sample::from_parts(vec![3., 0.5], vec![3.])), 0.);
    }

    #[test]
    fn hidden_sensitivity_pulls_weighted_sum_from_next_layer() {
        let sample = Sample::from_parts(vec![0.], vec![1.]);
        let mut hidden = Layer::with_weights(0, Activation::Purelin, vec![vec![1., 0.], vec![2., 0.]]);
        let mut next = Layer::with_weights(1, Activation::Purelin, vec![vec![3., -1., 0.], vec![0.5, 2., 0.]]);
        hidden.fire(&sample);
        next.fire(&hidden);
        next.set_fixed_sensitivity(0, 1.);
        next.set_fixed_sensitivity(1, -2.);

        assert_eq!(next.sum_weighted_sensitivity(0), 3. - 1.);
        assert_eq!(next.sum_weighted_sensitivity(1), -1. - 4.);

        hidden.set_sensitivity_from_layer(&next);
        assert_eq!(hidden.neuron(0).sensitivity(), 2.);
        assert_eq!(hidden.neuron(1).sensitivity(), -5.);
    }

    #[test]
    fn saved_output_is_one_line() {
        let mut layer = Layer::with_weights(0, Activation::Purelin, vec![vec![0.25], vec![-1.]]);
        layer.fire(&Sample::from_parts(vec![0.], vec![]));
        let mut out = Vec::new();
        layer.save_output(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0.25 -1\n");
    }
}
