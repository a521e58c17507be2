use std::io::Write;

use colored::Colorize;
use log::info;

use crate::{Error, Mode, Network, Result, Sample, Trace, TrainingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    GoalReached,
    LimitExceeded,
}

impl Termination {
    pub fn name(self) -> &'static str {
        match self {
            Termination::GoalReached => "goal reached",
            Termination::LimitExceeded => "limit exceeded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub mse: f64,
    /// Training samples misclassified by the inference pass after the epoch.
    pub usage_error: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Number of epochs actually run.
    pub epochs: usize,
    pub termination: Termination,
    pub history: Vec<EpochReport>,
}

impl TrainingReport {
    pub fn final_mse(&self) -> Option<f64> {
        self.history.last().map(|r| r.mse)
    }
}

pub struct Trainer {
    pub config: TrainingConfig,
    pub trace: Trace,
}

impl Trainer {
    pub fn new(config: TrainingConfig, trace: Trace) -> Self {
        Self { config, trace }
    }

    /// Runs whole epochs over `samples`, in order, until the goal is met or
    /// the epoch limit is passed. At least one epoch always runs.
    pub fn train(&self, network: &mut Network, samples: &[Sample]) -> Result<TrainingReport> {
        if samples.is_empty() {
            return Err(Error::MalformedData("no training samples".into()));
        }
        samples.iter().try_for_each(|s| network.check_sample(s))?;

        info!("Training begins with epoch 1.");

        let mut history = Vec::new();
        let mut old_mse = f64::INFINITY;
        let mut epoch = 1;

        let termination = loop {
            let mse = self.train_epoch(network, samples);
            let usage_error = usage_errors(network, samples);

            if self.trace.at_level(2) {
                let trend = if mse < old_mse { "decreasing".green() } else { "increasing".red() };
                info!(
                    "end epoch {}, mse: {:10.8} {}, usage error: {}/{} ({:5.2}%)",
                    epoch, mse, trend, usage_error, samples.len(), 100. * usage_error as f64 / samples.len() as f64
                );
            }
            history.push(EpochReport { epoch, mse, usage_error });

            epoch += 1;
            if mse <= self.config.goal {
                break Termination::GoalReached;
            } else if epoch > self.config.epoch_limit {
                break Termination::LimitExceeded;
            }
            old_mse = mse;
        };

        info!("Training ends at epoch {}, {}.", epoch, termination.name());
        Ok(TrainingReport { epochs: epoch - 1, termination, history })
    }

    /// One pass over the samples followed by the mode's end-of-epoch commit.
    /// Returns the epoch's mean squared error.
    pub fn train_epoch(&self, network: &mut Network, samples: &[Sample]) -> f64 {
        let mode = self.config.mode;
        if matches!(mode, Mode::Batch | Mode::Rprop) {
            network.clear_accumulation();
        }

        let sse: f64 = samples.iter().map(|sample| self.train_sample(network, sample)).sum();

        match mode {
            Mode::Online => {}
            Mode::Batch => network.install_accumulation(),
            Mode::Rprop => {
                network.adjust_by_rprop(self.config.eta_plus, self.config.eta_minus);
                // nothing left to install, the Rprop step zeroed the accumulators
                network.install_accumulation();
            }
        }

        sse / samples.len() as f64
    }

    /// Forward pass, backward pass and the per-sample update. Returns the
    /// sample's error as measured before the update.
    ///
    /// Batch and Rprop also apply the online step here: every mode ends with
    /// `adjust_weights`, batch adds `accumulate_weights` before it and Rprop
    /// adds `accumulate_gradient` before that.
    pub fn train_sample(&self, network: &mut Network, sample: &Sample) -> f64 {
        let rate = self.config.learning_rate;

        network.fire(sample);
        let error = network.compute_error(sample);

        if self.trace.at_level(4) {
            print!("forward output: ");
            network.show_output();
            println!(" {}, sample sse: {: >6.3}", sample, error);
        }

        network.set_sensitivity(sample);

        if self.config.mode == Mode::Rprop {
            network.accumulate_gradient(sample);
        }
        if matches!(self.config.mode, Mode::Batch | Mode::Rprop) {
            network.accumulate_weights(sample, rate);
        }
        network.adjust_weights(sample, rate);

        if self.trace.at_level(4) {
            network.show_weights("current");
        }
        error
    }
}

/// Number of samples the inference pass gets wrong.
pub fn usage_errors(network: &mut Network, samples: &[Sample]) -> u32 {
    samples
        .iter()
        .map(|sample| {
            network.infer(sample);
            network.compute_usage_error(sample)
        })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub samples: usize,
    /// Sum of the per-sample errors of the training forward pass.
    pub error_sum: f64,
    pub usage_error: u32,
}

impl Evaluation {
    pub fn mse(&self) -> f64 {
        if self.samples == 0 { 0. } else { self.error_sum / self.samples as f64 }
    }

    pub fn usage_percent(&self) -> f64 {
        if self.samples == 0 { 0. } else { 100. * self.usage_error as f64 / self.samples as f64 }
    }
}

/// Runs each test sample through the inference pass and then the training
/// forward pass, printing both and writing the latter's outputs to `output`.
pub fn evaluate(network: &mut Network, samples: &[Sample], mut output: Option<&mut dyn Write>) -> Result<Evaluation> {
    samples.iter().try_for_each(|s| network.check_sample(s))?;

    let mut evaluation = Evaluation { samples: samples.len(), error_sum: 0., usage_error: 0 };
    for sample in samples {
        network.infer(sample);
        let usage = network.compute_usage_error(sample);
        evaluation.usage_error += usage;
        let flag = if usage > 0 { " (non-zero)".red().to_string() } else { String::new() };
        print!("\nusage outputs:    ");
        network.show_output();
        println!(", sample usage sse: {: >6.3}{}", usage as f64, flag);

        network.fire(sample);
        let error = network.compute_error(sample);
        evaluation.error_sum += error;
        print!("test outputs:     ");
        network.show_output();
        println!(", sample test sse: {: >6.3}", error);

        if let Some(w) = output.as_deref_mut() {
            network.save_output(w)?;
        }
    }
    Ok(evaluation)
}
