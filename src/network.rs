use std::io::{self, Write};

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{Activation, Error, Layer, Result, Sample, Source};

/// Size and activation of one layer, input side first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub activation: Activation,
    pub size: usize,
}

impl LayerSpec {
    pub fn new(activation: Activation, size: usize) -> Self {
        Self { activation, size }
    }
}

/// A linear stack of fully connected layers. Layer 0 reads the sample,
/// every later layer reads the one before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    input_dimension: usize,
    layers: Vec<Layer>,
}

impl Network {
    pub fn new<R: Rng>(rng: &mut R, input_dimension: usize, specs: &[LayerSpec]) -> Result<Self> {
        Self::check_specs(specs)?;
        let mut inputs = input_dimension;
        let layers = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let layer = Layer::new(rng, i, spec.size, spec.activation, inputs);
                inputs = spec.size;
                layer
            })
            .collect();
        Ok(Self { input_dimension, layers })
    }

    /// Builds a network from already constructed layers, checking that the
    /// widths line up.
    pub fn from_layers(input_dimension: usize, layers: Vec<Layer>) -> Result<Self> {
        let specs: Vec<_> = layers.iter().map(|l| LayerSpec::new(l.activation(), l.size())).collect();
        Self::check_specs(&specs)?;
        let mut inputs = input_dimension;
        for layer in &layers {
            if layer.number_of_inputs() != inputs {
                return Err(Error::DimensionMismatch(format!(
                    "layer {} expects {} inputs but is fed {}", layer.index(), layer.number_of_inputs(), inputs
                )));
            }
            inputs = layer.size();
        }
        Ok(Self { input_dimension, layers })
    }

    fn check_specs(specs: &[LayerSpec]) -> Result<()> {
        if specs.len() < 2 {
            return Err(Error::InvalidArgument("currently, at least two layers must be specified".into()));
        }
        if let Some(i) = specs.iter().position(|s| s.size == 0) {
            return Err(Error::InvalidArgument(format!("layer {} must have at least one neuron", i)));
        }
        if let Some(i) = specs[..specs.len() - 1].iter().position(|s| s.activation.is_onehot()) {
            return Err(Error::InvalidArgument(format!("only the last layer can be onehot, not layer {}", i)));
        }
        Ok(())
    }

    pub fn input_dimension(&self) -> usize { self.input_dimension }
    pub fn layers(&self) -> &[Layer] { &self.layers }
    pub fn layer(&self, i: usize) -> &Layer { &self.layers[i] }
    pub fn number_of_layers(&self) -> usize { self.layers.len() }

    #[inline(always)]
    fn last(&self) -> usize { self.layers.len() - 1 }

    pub fn output_layer(&self) -> &Layer { &self.layers[self.last()] }

    pub fn is_onehot(&self) -> bool { self.output_layer().is_onehot() }

    pub fn specs(&self) -> Vec<LayerSpec> {
        self.layers.iter().map(|l| LayerSpec::new(l.activation(), l.size())).collect()
    }

    /// A one-hot network produces a single category, any other network one
    /// value per output neuron.
    pub fn check_output_dimension(&self, output_dimension: usize) -> Result<()> {
        let last = self.output_layer();
        if last.is_onehot() && output_dimension != 1 {
            return Err(Error::DimensionMismatch(format!(
                "a onehot output layer needs output dimension 1, not {}", output_dimension
            )));
        }
        if !last.is_onehot() && output_dimension != last.size() {
            return Err(Error::DimensionMismatch(format!(
                "the number of neurons in the last layer {} must agree with the output dimension {}",
                last.size(), output_dimension
            )));
        }
        Ok(())
    }

    /// Checks a sample against the network's dimensions, and against the
    /// category count for a one-hot network.
    pub fn check_sample(&self, sample: &Sample) -> Result<()> {
        if sample.input_dimension() != self.input_dimension {
            return Err(Error::DimensionMismatch(format!(
                "sample has {} inputs, network expects {}", sample.input_dimension(), self.input_dimension
            )));
        }
        self.check_output_dimension(sample.output_dimension())?;
        let last = self.output_layer();
        if last.is_onehot() && !last.accepts_category(sample) {
            return Err(Error::MalformedData(format!(
                "category {} is not one of the {} categories", sample.output(0), last.size()
            )));
        }
        Ok(())
    }

    pub fn fire(&mut self, sample: &Sample) {
        self.layers[0].fire(sample);
        for i in 1..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            rest[0].fire(&done[i - 1]);
        }
    }

    pub fn infer(&mut self, sample: &Sample) {
        self.layers[0].infer(sample);
        for i in 1..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            rest[0].infer(&done[i - 1]);
        }
    }

    /// Output layer from the sample, then every hidden layer from the one
    /// ahead of it, back to front.
    pub fn set_sensitivity(&mut self, sample: &Sample) {
        let last = self.last();
        self.layers[last].set_sensitivity_from_sample(sample);
        for i in (0..last).rev() {
            let (head, tail) = self.layers.split_at_mut(i + 1);
            head[i].set_sensitivity_from_layer(&tail[0]);
        }
    }

    pub fn set_fixed_sensitivity(&mut self, layer: usize, neuron: usize, sensitivity: f64) {
        self.layers[layer].set_fixed_sensitivity(neuron, sensitivity);
    }

    pub fn set_weight(&mut self, layer: usize, neuron: usize, j: usize, weight: f64) {
        self.layers[layer].set_weight(neuron, j, weight);
    }

    // Walks from the output layer down, handing each layer its source.
    fn backward_each<F>(&mut self, sample: &Sample, mut f: F)
    where F: FnMut(&mut Layer, &dyn Source) {
        for i in (1..self.layers.len()).rev() {
            let (head, tail) = self.layers.split_at_mut(i);
            f(&mut tail[0], &head[i - 1]);
        }
        f(&mut self.layers[0], sample);
    }

    pub fn adjust_weights(&mut self, sample: &Sample, rate: f64) {
        self.backward_each(sample, |layer, source| layer.adjust_weights(source, rate));
    }

    pub fn accumulate_weights(&mut self, sample: &Sample, rate: f64) {
        self.backward_each(sample, |layer, source| layer.accumulate_weights(source, rate));
    }

    pub fn accumulate_gradient(&mut self, sample: &Sample) {
        self.backward_each(sample, |layer, source| layer.accumulate_gradient(source));
    }

    pub fn clear_accumulation(&mut self) {
        self.layers.iter_mut().rev().for_each(Layer::clear_accumulation);
    }

    pub fn install_accumulation(&mut self) {
        self.layers.iter_mut().rev().for_each(Layer::install_accumulation);
    }

    pub fn adjust_by_rprop(&mut self, eta_plus: f64, eta_minus: f64) {
        self.layers.iter_mut().rev().for_each(|l| l.adjust_by_rprop(eta_plus, eta_minus));
    }

    /// Squared difference between targets and the logical outputs, averaged
    /// over the output dimension. For a one-hot network that is
    /// `(category - max_index)²`, not the layer's 0/1 loss.
    pub fn compute_error(&self, sample: &Sample) -> f64 {
        let n = sample.output_dimension();
        assert!(n > 0);
        let last = self.output_layer();
        (0..n).map(|i| (sample.output(i) - last.get(i)).powi(2)).sum::<f64>() / n as f64
    }

    /// 1 if any output lands on the other side of 0.5 than its target.
    pub fn compute_usage_error(&self, sample: &Sample) -> u32 {
        let last = self.output_layer();
        let disagrees = (0..sample.output_dimension()).any(|i| (sample.output(i) > 0.5) != (last.get(i) > 0.5));
        disagrees as u32
    }

    pub fn outputs(&self) -> Vec<f64> {
        self.output_layer().outputs()
    }

    pub fn show_weights(&self, title: &str) {
        self.layers.iter().for_each(|l| l.show_weights(title));
    }

    pub fn show_output(&self) {
        self.output_layer().show_output();
    }

    /// `inputDimension`, `numberLayers`, then `size` and activation name per layer.
    pub fn save_stats<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "{}", self.input_dimension)?;
        writeln!(w, "{}", self.layers.len())?;
        for layer in &self.layers {
            writeln!(w, "{}", layer.size())?;
            writeln!(w, "{}", layer.activation())?;
        }
        Ok(())
    }

    pub fn save_weights<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        self.layers.iter().try_for_each(|l| l.save_weights(w))
    }

    pub fn save_output<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        self.output_layer().save_output(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn specs(list: &[(Activation, usize)]) -> Vec<LayerSpec> {
        list.iter().map(|&(a, s)| LayerSpec::new(a, s)).collect()
    }

    #[test]
    fn weight_length_matches_inputs_for_any_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        for (input, shape) in [
            (1, vec![(Activation::Tansig, 1), (Activation::Purelin, 1)]),
            (4, vec![(Activation::Logsig, 7), (Activation::Satlins, 3), (Activation::Hardlim, 2)]),
            (2, vec![(Activation::Tansig, 5), (Activation::Onehot, 4)]),
        ] {
            let net = Network::new(&mut rng, input, &specs(&shape)).unwrap();
            let mut width = input;
            for layer in net.layers() {
                assert!(layer.neurons().iter().all(|n| n.weights().len() == width + 1));
                width = layer.size();
            }
        }
    }

    #[test]
    fn rejects_single_layer_and_inner_onehot() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            Network::new(&mut rng, 2, &specs(&[(Activation::Tansig, 1)])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Network::new(&mut rng, 2, &specs(&[(Activation::Onehot, 2), (Activation::Tansig, 1)])),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Network::new(&mut rng, 2, &specs(&[(Activation::Tansig, 0), (Activation::Tansig, 1)])),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_layers_checks_widths() {
        let hidden = Layer::with_weights(0, Activation::Purelin, vec![vec![1., 1., 0.]]);
        let output = Layer::with_weights(1, Activation::Purelin, vec![vec![1., 1., 0.]]);
        assert!(matches!(Network::from_layers(2, vec![hidden, output]), Err(Error::DimensionMismatch(_))));
    }

    #[test]
    fn output_dimension_rules() {
        let mut rng = StdRng::seed_from_u64(3);
        let plain = Network::new(&mut rng, 2, &specs(&[(Activation::Tansig, 3), (Activation::Purelin, 2)])).unwrap();
        assert!(plain.check_output_dimension(2).is_ok());
        assert!(plain.check_output_dimension(1).is_err());

        let onehot = Network::new(&mut rng, 2, &specs(&[(Activation::Tansig, 3), (Activation::Onehot, 4)])).unwrap();
        assert!(onehot.check_output_dimension(1).is_ok());
        assert!(onehot.check_output_dimension(4).is_err());
        assert!(onehot.check_sample(&Sample::from_parts(vec![3.], vec![0., 0.])).is_ok());
        assert!(onehot.check_sample(&Sample::from_parts(vec![4.], vec![0., 0.])).is_err());
        assert!(onehot.check_sample(&Sample::from_parts(vec![1.5], vec![0., 0.])).is_err());
        assert!(onehot.check_sample(&Sample::from_parts(vec![1.], vec![0.])).is_err());
    }

    fn linear_chain() -> Network {
        Network::from_layers(1, vec![
            Layer::with_weights(0, Activation::Purelin, vec![vec![2., 0.]]),
            Layer::with_weights(1, Activation::Purelin, vec![vec![3., 1.]]),
        ]).unwrap()
    }

    #[test]
    fn forward_pass_feeds_each_layer_from_the_previous() {
        let mut net = linear_chain();
        let sample = Sample::from_parts(vec![0.], vec![1.5]);
        net.fire(&sample);
        assert_eq!(net.layer(0).get(0), 3.);
        assert_eq!(net.outputs(), vec![10.]);
        assert_eq!(net.compute_error(&sample), 100.);
    }

    #[test]
    fn backward_pass_matches_hand_computed_gradient() {
        let mut net = linear_chain();
        let sample = Sample::from_parts(vec![4.], vec![1.]);
        net.fire(&sample);
        // output 2*3+1 = 7, error 4-7 = -3
        net.set_sensitivity(&sample);
        assert_eq!(net.layer(1).neuron(0).sensitivity(), 6.);
        assert_eq!(net.layer(0).neuron(0).sensitivity(), 18.);

        net.adjust_weights(&sample, 0.01);
        assert_relative_eq!(net.layer(1).neuron(0).weight(0), 3. - 0.01 * 6. * 2.);
        assert_relative_eq!(net.layer(1).neuron(0).bias(), 1. - 0.01 * 6.);
        assert_relative_eq!(net.layer(0).neuron(0).weight(0), 2. - 0.01 * 18.);
        assert_relative_eq!(net.layer(0).neuron(0).bias(), -0.01 * 18.);
    }

    #[test]
    fn error_is_mean_over_outputs_and_never_negative() {
        let mut net = Network::from_layers(1, vec![
            Layer::with_weights(0, Activation::Purelin, vec![vec![1., 0.]]),
            Layer::with_weights(1, Activation::Purelin, vec![vec![1., 0.], vec![-1., 0.]]),
        ]).unwrap();
        let exact = Sample::from_parts(vec![2., -2.], vec![2.]);
        net.fire(&exact);
        assert_eq!(net.compute_error(&exact), 0.);

        let off = Sample::from_parts(vec![3., 0.], vec![2.]);
        net.fire(&off);
        assert_eq!(net.compute_error(&off), (1. + 4.) / 2.);
    }

    #[test]
    fn onehot_error_is_squared_category_distance() {
        let mut net = Network::from_layers(1, vec![
            Layer::with_weights(0, Activation::Purelin, vec![vec![0., 0.]]),
            Layer::with_weights(1, Activation::Onehot, vec![vec![0., 0.9], vec![0., 0.1], vec![0., -0.5]]),
        ]).unwrap();
        let sample = Sample::from_parts(vec![2.], vec![1.]);
        net.fire(&sample);

        assert_eq!(net.output_layer().max_index(), Some(0));
        assert_eq!(net.output_layer().compute_error(&sample), 1.);
        assert_eq!(net.compute_error(&sample), 4.);

        let right = Sample::from_parts(vec![0.], vec![1.]);
        assert_eq!(net.compute_error(&right), 0.);
    }

    #[test]
    fn usage_error_compares_sides_of_one_half() {
        let mut net = Network::from_layers(1, vec![
            Layer::with_weights(0, Activation::Purelin, vec![vec![1., 0.]]),
            Layer::with_weights(1, Activation::Hardlim, vec![vec![1., 0.], vec![-1., 0.]]),
        ]).unwrap();
        let sample = Sample::from_parts(vec![1., 0.], vec![0.7]);
        net.infer(&sample);
        assert_eq!(net.outputs(), vec![1., 0.]);
        assert_eq!(net.compute_usage_error(&sample), 0);
        assert_eq!(net.compute_usage_error(&Sample::from_parts(vec![1., 0.9], vec![0.7])), 1);
    }

    #[test]
    fn stats_block_names_layers() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = Network::new(&mut rng, 2, &specs(&[(Activation::Logsig, 3), (Activation::Onehot, 4)])).unwrap();
        let mut out = Vec::new();
        net.save_stats(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2\n2\n3\nlogsig\n4\nonehot\n");
    }
}
