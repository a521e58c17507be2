use std::{fs::File, io::{BufWriter, Write}, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use backprop::{
    evaluate, load_network_file, load_samples, save_network_file, save_snapshot, Evaluation, LayerArgs, Mode,
    Network, SampleSet, Trace, Trainer, TrainingConfig,
};
use clap::Parser;
use log::{error, info, warn};
use rand::{rngs::StdRng, SeedableRng};


/// Train a network, evaluate it on a test file and save its weights.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Train {
    training_file: PathBuf,
    epoch_limit: usize,
    learning_rate: f64,
    /// Mean squared error at which training stops
    goal: f64,
    /// 0 = on-line, 1 = batch, 2 = rprop
    mode: u8,
    /// 0 (quiet) to 5 (every weight change)
    trace: u8,
    weight_file: PathBuf,
    number_of_layers: usize,
    /// <layer type> <number in layer> per layer, then <test file> [<output file>]
    #[clap(required = true)]
    layers: Vec<String>,
    /// Seed for the initial weights; random if absent
    #[clap(long)]
    seed: Option<u64>,
    /// Also write the trained network as JSON
    #[clap(long)]
    snapshot: Option<PathBuf>,
}

impl Train {
    fn exec(self) -> Result<()> {
        let trace = Trace::new(self.trace);
        let mode = Mode::try_from(self.mode)?;
        let layer_args = LayerArgs::parse(self.number_of_layers, &self.layers)?;

        println!("training file: {}", self.training_file.display());

        let weight_file = match File::create(&self.weight_file) {
            Ok(file) => {
                println!("Weights will be saved in: {}", self.weight_file.display());
                Some(file)
            }
            Err(e) => {
                warn!("Could not create weight file: {} ({})", self.weight_file.display(), e);
                None
            }
        };

        let config = TrainingConfig {
            epoch_limit: self.epoch_limit,
            learning_rate: self.learning_rate,
            goal: self.goal,
            mode,
            ..Default::default()
        };

        info!("{} layers structured (from input to output) as:", layer_args.specs.len());
        for spec in &layer_args.specs {
            let unit = if spec.activation.is_onehot() { "categories" } else { "neurons" };
            info!("    {} ({} {})", spec.activation, spec.size, unit);
        }
        info!("epoch limit = {}", config.epoch_limit);
        info!("specified rate = {}", config.learning_rate);
        info!("goal = {}", config.goal);
        info!("mode = {}", config.mode);
        info!("trace = {}", trace.level());

        println!("test file: {}", layer_args.test_file.display());

        let training = load_samples(&self.training_file)
            .with_context(|| format!("reading training file {}", self.training_file.display()))?;
        show_and_count("training", &training, trace);

        let test = load_samples(&layer_args.test_file)
            .with_context(|| format!("reading test file {}", layer_args.test_file.display()))?;
        training.check_same_dimensions(&test)?;
        show_and_count("test", &test, trace);

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut network = Network::new(&mut rng, training.input_dimension, &layer_args.specs)?;
        network.check_output_dimension(training.output_dimension)?;

        println!(
            "\nOutput dimension is {}{}.",
            training.output_dimension,
            if network.is_onehot() { " (one-hot)" } else { "" }
        );
        println!("\nInput dimension is {}.", training.input_dimension);

        if trace.at_level(4) {
            println!("\nInitial Weights:");
            network.show_weights("initial");
        }

        let trainer = Trainer::new(config, trace);
        let report = trainer.train(&mut network, &training.samples)?;

        println!("\nFinal Weights:");
        network.show_weights("final");

        if let Some(file) = weight_file {
            drop(file);
            save_network_file(&network, &self.weight_file)
                .with_context(|| format!("saving weights to {}", self.weight_file.display()))?;
        }
        if let Some(path) = &self.snapshot {
            save_snapshot(&network, path).with_context(|| format!("saving snapshot to {}", path.display()))?;
        }

        println!("\nFinal performance on all test samples:");
        let evaluation = run_test(&mut network, &test, layer_args.output_file.as_deref())?;

        let rate = match mode {
            Mode::Rprop => String::new(),
            _ => format!(" with learning rate {}", trainer.config.learning_rate),
        };
        println!(
            "\nAfter {} epochs using {}{}, {}, {}",
            report.epochs, mode, rate, report.termination.name(), summary(&evaluation)
        );
        Ok(())
    }
}

/// Rebuild a network from a saved weight file and evaluate a test file.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Run {
    weight_file: PathBuf,
    test_file: PathBuf,
    output_file: Option<PathBuf>,
    #[clap(short, long, default_value_t = 1)]
    trace: u8,
}

impl Run {
    fn exec(self) -> Result<()> {
        println!("weight file: {}", self.weight_file.display());
        let mut network = load_network_file(&self.weight_file)?;

        println!("test file: {}", self.test_file.display());
        let test = load_samples(&self.test_file)
            .with_context(|| format!("reading test file {}", self.test_file.display()))?;
        show_and_count("test", &test, Trace::new(self.trace));

        let evaluation = run_test(&mut network, &test, self.output_file.as_deref())?;
        println!("\n{}", summary(&evaluation));
        Ok(())
    }
}

fn show_and_count(title: &str, set: &SampleSet, trace: Trace) {
    if trace.at_level(4) {
        println!("\n{} samples are:\n", title);
        for (i, sample) in set.samples.iter().enumerate() {
            println!("{}: {}", i + 1, sample);
        }
    }
    println!("\n{} {} samples", set.len(), title);
}

fn run_test(network: &mut Network, test: &SampleSet, output_file: Option<&Path>) -> Result<Evaluation> {
    let mut output = match output_file {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating output file {}", path.display()))?,
        )),
        None => None,
    };
    let evaluation = evaluate(network, &test.samples, output.as_mut().map(|w| w as &mut dyn Write))?;
    if let Some(w) = output.as_mut() {
        w.flush()?;
    }
    Ok(evaluation)
}

fn summary(evaluation: &Evaluation) -> String {
    format!(
        "test mse = {}, total usage error = {}/{} ({}%)",
        evaluation.mse(), evaluation.usage_error, evaluation.samples, evaluation.usage_percent()
    )
}


#[derive(Parser)]
#[clap(author, version, about = "Multi-layer backpropagation trainer")]
enum SubCommand {
    Train(Train),
    Run(Run),
}

impl SubCommand {
    fn trace(&self) -> Trace {
        match self {
            SubCommand::Train(train) => Trace::new(train.trace),
            SubCommand::Run(run) => Trace::new(run.trace),
        }
    }
}

fn main() {
    let command = SubCommand::parse();
    command.trace().init_logger();

    let result = match command {
        SubCommand::Train(train) => train.exec(),
        SubCommand::Run(run) => run.exec(),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
