/// Train the six joint effort networks from a telemetry log
use std::path::PathBuf;

use clap::Parser;
use joint_effort::data::{self, TelemetryCache};
use joint_effort::training::{ArtifactLayout, ArtifactWriter, LogObserver, RunSummary, Trainer};
use joint_effort::{ComputeContext, PipelineConfig};

#[derive(Debug, Parser)]
#[command(
    name = "train_joints",
    about = "Train per-joint effort regressors from joint-state telemetry"
)]
struct Args {
    /// JSON pipeline configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON Lines telemetry log
    #[arg(long)]
    log: Option<PathBuf>,

    /// Channel substring selecting joint-state messages
    #[arg(long)]
    channel: Option<String>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Seed for both shuffling and initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for data.csv / labels.csv
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    models_dir: Option<PathBuf>,

    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Rows between progress lines
    #[arg(long, default_value_t = 1000)]
    log_every: usize,

    /// Never use an accelerator
    #[arg(long)]
    cpu: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(PipelineConfig, usize)> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(log) = self.log {
            config.log_path = log;
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(lr) = self.learning_rate {
            config.training.learning_rate = lr;
        }
        if let Some(seed) = self.seed {
            config.training.shuffle_seed = Some(seed);
            config.training.init_seed = Some(seed);
        }
        if let Some(dir) = self.cache_dir {
            config.cache_dir = dir;
        }
        if let Some(dir) = self.models_dir {
            config.models_dir = dir;
        }
        if let Some(dir) = self.results_dir {
            config.results_dir = dir;
        }
        config.training.force_cpu |= self.cpu;

        config.validate()?;
        Ok((config, self.log_every))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, log_every) = Args::parse().into_config()?;
    log::info!("Configuration: {:#?}", config);

    let context = ComputeContext::detect(config.training.force_cpu)?;

    let cache = TelemetryCache::new(&config.cache_dir);
    let dataset = data::load_or_parse(&config.log_path, &config.channel, &cache)?;
    log::info!("Dataset: {} samples", dataset.len());

    let trainer = Trainer::new(&config.model, config.training.clone(), context.clone())?;
    let outcome = trainer.train(&dataset, &mut LogObserver::new(log_every))?;

    let writer = ArtifactWriter::new(ArtifactLayout::new(&config.models_dir, &config.results_dir));
    writer.save(&outcome.models, &outcome.history)?;
    writer.write_summary(&RunSummary::new(
        dataset.len(),
        &config.model,
        &config.training,
        &context,
        &outcome.history,
    ))?;

    log::info!("Done");
    Ok(())
}
