use std::fmt;

use serde::{Serialize, Deserialize};

/// Anything a layer can read its inputs from: the inputs of a [`Sample`]
/// or the outputs of the previous [`crate::Layer`].
pub trait Source {
    fn get(&self, i: usize) -> f64;
    fn len(&self) -> usize;
}

/// One labelled example. `output` holds the desired network output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    input: Vec<f64>,
    output: Vec<f64>,
}

impl Sample {
    /// Zero filled sample with the given dimensions.
    pub fn new(output_dim: usize, input_dim: usize) -> Self {
        assert!(output_dim > 0, "a sample needs at least one output");
        Self { input: vec![0.; input_dim], output: vec![0.; output_dim] }
    }

    pub fn from_parts(output: Vec<f64>, input: Vec<f64>) -> Self {
        assert!(!output.is_empty(), "a sample needs at least one output");
        Self { input, output }
    }

    #[inline(always)]
    pub fn set_output(&mut self, i: usize, value: f64) { self.output[i] = value }
    #[inline(always)]
    pub fn set_input(&mut self, i: usize, value: f64) { self.input[i] = value }
    #[inline(always)]
    pub fn output(&self, i: usize) -> f64 { self.output[i] }
    #[inline(always)]
    pub fn input(&self, i: usize) -> f64 { self.input[i] }
    pub fn outputs(&self) -> &[f64] { &self.output }
    pub fn inputs(&self) -> &[f64] { &self.input }
    pub fn output_dimension(&self) -> usize { self.output.len() }
    pub fn input_dimension(&self) -> usize { self.input.len() }
}

impl Source for Sample {
    #[inline(always)]
    fn get(&self, i: usize) -> f64 { self.input[i] }
    fn len(&self) -> usize { self.input.len() }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "outputs:")?;
        for v in &self.output {
            write!(f, " {: >6.3}", v)?;
        }
        write!(f, " inputs:")?;
        for v in &self.input {
            write!(f, " {: >6.3}", v)?;
        }
        Ok(())
    }
}
