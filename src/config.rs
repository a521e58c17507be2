use std::{fmt, path::PathBuf};

use serde::{Serialize, Deserialize};

use crate::{Activation, Error, LayerSpec, Result};

/// When accumulated gradient information reaches the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// After every sample.
    Online,
    /// Once per epoch, from the summed per-sample deltas.
    Batch,
    /// Once per epoch, by sign-adaptive steps.
    Rprop,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Online => "on-line",
            Mode::Batch => "batch",
            Mode::Rprop => "rprop",
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Mode::Online),
            1 => Ok(Mode::Batch),
            2 => Ok(Mode::Rprop),
            _ => Err(Error::InvalidArgument("mode must be 0, 1, or 2".into())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epoch_limit: usize,
    pub learning_rate: f64,
    /// Training stops once the epoch's mean squared error is at or below this.
    pub goal: f64,
    pub mode: Mode,
    pub eta_plus: f64,
    pub eta_minus: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epoch_limit: 1000,
            learning_rate: 0.01,
            goal: 0.01,
            mode: Mode::Online,
            eta_plus: 1.2,
            eta_minus: 0.5,
        }
    }
}

/// The tail of the training command line: `(activation size)` pairs, the
/// test file and an optional output file.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerArgs {
    pub specs: Vec<LayerSpec>,
    pub test_file: PathBuf,
    pub output_file: Option<PathBuf>,
}

impl LayerArgs {
    pub fn parse(number_of_layers: usize, args: &[String]) -> Result<Self> {
        if number_of_layers < 2 {
            return Err(Error::InvalidArgument("currently, at least two layers must be specified".into()));
        }
        let needed = 2 * number_of_layers;
        if args.len() < needed {
            return Err(Error::InvalidArgument(format!(
                "need {} layer parameters for {} layers, found {}", needed, number_of_layers, args.len()
            )));
        }

        let specs = args[..needed]
            .chunks(2)
            .map(|pair| {
                let activation: Activation = pair[0].parse()?;
                let size = pair[1].parse().map_err(|_| {
                    Error::InvalidArgument(format!("expected integer, but found {}", pair[1]))
                })?;
                Ok(LayerSpec::new(activation, size))
            })
            .collect::<Result<Vec<_>>>()?;

        let test_file = args
            .get(needed)
            .map(PathBuf::from)
            .ok_or_else(|| Error::InvalidArgument("no test file specified".into()))?;

        if args.len() > needed + 2 {
            return Err(Error::InvalidArgument(format!("unexpected argument {}", args[needed + 2])));
        }

        Ok(Self { specs, test_file, output_file: args.get(needed + 1).map(PathBuf::from) })
    }
}
