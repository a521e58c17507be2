use std::{path::Path, str::SplitWhitespace};

use log::info;

use crate::{Error, Result, Sample};

/// Free-form whitespace separated tokens, as found in data and weight files.
pub struct Tokens<'a> {
    iter: SplitWhitespace<'a>,
    consumed: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { iter: text.split_whitespace(), consumed: 0 }
    }

    pub fn next_token(&mut self) -> Option<&'a str> {
        let token = self.iter.next();
        if token.is_some() {
            self.consumed += 1;
        }
        token
    }

    pub fn consumed(&self) -> usize { self.consumed }

    fn parse<T: std::str::FromStr>(&self, token: &str, what: &str) -> Result<T> {
        token.parse().map_err(|_| Error::MalformedData(format!(
            "expected {} but found '{}' (token {})", what, token, self.consumed
        )))
    }

    /// Next number, or `None` at the end of the input.
    pub fn next_f64(&mut self, what: &str) -> Result<Option<f64>> {
        match self.next_token() {
            Some(token) => self.parse(token, what).map(Some),
            None => Ok(None),
        }
    }

    pub fn expect_f64(&mut self, what: &str) -> Result<f64> {
        self.next_f64(what)?.ok_or_else(|| Error::MalformedData(format!("missing {}", what)))
    }

    pub fn expect_usize(&mut self, what: &str) -> Result<usize> {
        let token = self.next_token().ok_or_else(|| Error::MalformedData(format!("missing {}", what)))?;
        let value: i64 = self.parse(token, what)?;
        usize::try_from(value).map_err(|_| Error::MalformedData(format!("{} must be non-negative, found {}", what, value)))
    }

    pub fn expect_str(&mut self, what: &str) -> Result<&'a str> {
        self.next_token().ok_or_else(|| Error::MalformedData(format!("missing {}", what)))
    }
}

/// The samples of one data file together with its declared dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    pub output_dimension: usize,
    pub input_dimension: usize,
    pub samples: Vec<Sample>,
}

impl SampleSet {
    pub fn len(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    /// Training and test data must describe the same problem.
    pub fn check_same_dimensions(&self, other: &SampleSet) -> Result<()> {
        if self.input_dimension != other.input_dimension || self.output_dimension != other.output_dimension {
            return Err(Error::DimensionMismatch(format!(
                "the dimensions of the test ({} outputs, {} inputs) vs. training ({} outputs, {} inputs) file don't match",
                other.output_dimension, other.input_dimension, self.output_dimension, self.input_dimension
            )));
        }
        Ok(())
    }
}

/// Parses `outputDim inputDim` followed by records of outputs then inputs.
pub fn parse_samples(text: &str) -> Result<SampleSet> {
    let mut tokens = Tokens::new(text);
    let output_dimension = tokens.expect_usize("output dimension")?;
    let input_dimension = tokens.expect_usize("input dimension")?;
    if output_dimension == 0 {
        return Err(Error::MalformedData("output dimension must be positive".into()));
    }

    let mut samples = Vec::new();
    while let Some(first) = tokens.next_f64("output value")? {
        let mut sample = Sample::new(output_dimension, input_dimension);
        sample.set_output(0, first);

        for i in 1..output_dimension {
            let value = tokens.next_f64("output value")?.ok_or_else(|| incomplete(samples.len(), i, output_dimension, "outputs"))?;
            sample.set_output(i, value);
        }
        for i in 0..input_dimension {
            let value = tokens.next_f64("input value")?.ok_or_else(|| incomplete(samples.len(), i, input_dimension, "inputs"))?;
            sample.set_input(i, value);
        }
        samples.push(sample);
    }

    Ok(SampleSet { output_dimension, input_dimension, samples })
}

fn incomplete(index: usize, found: usize, expected: usize, what: &str) -> Error {
    Error::MalformedData(format!(
        "last sample (#{}) only had {} out of {} {}", index + 1, found, expected, what
    ))
}

pub fn load_samples(path: &Path) -> Result<SampleSet> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(e.kind(), format!("input file {} not found: {}", path.display(), e)))
    })?;
    let set = parse_samples(&text)?;
    info!("Output dimension is {}.", set.output_dimension);
    info!("Input dimension is {}.", set.input_dimension);
    Ok(set)
}
