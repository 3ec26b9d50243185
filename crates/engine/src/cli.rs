//! CLI wiring for the wordforge engine.

use crate::config::EngineConfig;
use crate::model::TextModel;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use wordforge_decoding::GenerateOptions;
use wordforge_predictor::FitConfig;

#[derive(Parser, Debug)]
#[command(name = "wordforge", about = "Word-level next-token text generator")]
pub struct Cli {
    /// JSON engine configuration; defaults apply when absent.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub model_dir: Option<PathBuf>,
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the vocabulary from a corpus (one text per line) and train.
    Train {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long, default_value_t = 10)]
        epochs: usize,
        #[arg(long, default_value_t = 32)]
        batch_size: usize,
        #[arg(long, default_value_t = 0.2)]
        validation_split: f32,
        /// Write the training report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Continue a prompt.
    Generate {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = 100)]
        max_length: usize,
        #[arg(long, default_value_t = 0.8)]
        temperature: f32,
        #[arg(long, default_value_t = 40)]
        top_k: usize,
    },
    /// Print several continuations at increasing temperature.
    Complete {
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = 3)]
        suggestions: usize,
    },
    /// Print the loaded model's dimensions as JSON.
    Info,
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli {
        config,
        model_dir,
        seed,
        command,
    } = cli;

    let mut config = match config {
        Some(path) => EngineConfig::load_from_file(&path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = model_dir {
        config.model_dir = dir;
    }
    if seed.is_some() {
        config.seed = seed;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(config, command))
}

async fn execute(config: EngineConfig, command: Command) -> Result<()> {
    let model = TextModel::with_neural_runtime(config);
    let outcome = model.load().await?;
    info!(outcome = ?outcome, "model ready");

    match command {
        Command::Train {
            corpus,
            epochs,
            batch_size,
            validation_split,
            report,
        } => {
            let blob = fs::read_to_string(&corpus)
                .with_context(|| format!("failed to read corpus {}", corpus.display()))?;
            let texts: Vec<&str> = blob
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect();

            let options = FitConfig {
                epochs,
                batch_size,
                validation_split,
            };
            let training = model.train(&texts, options).await?;

            for epoch in &training.metrics.history {
                println!(
                    "epoch {}: loss={:.4} accuracy={:.4}",
                    epoch.epoch, epoch.loss, epoch.accuracy
                );
            }
            println!(
                "examples={} vocabulary_size={}",
                training.examples, training.vocabulary_size
            );
            if let Some(warning) = training.save.warning() {
                eprintln!("Warning: model was not saved: {}", warning);
            }

            if let Some(path) = report {
                fs::write(path, serde_json::to_string_pretty(&training)?)?;
            }
        }
        Command::Generate {
            prompt,
            max_length,
            temperature,
            top_k,
        } => {
            let options = GenerateOptions {
                max_length,
                temperature,
                top_k,
                cancel: None,
            };
            let output = model.generate(&prompt, options).await?;
            println!("{}", output.text);
            info!(
                tokens = output.metrics.tokens_generated,
                tokens_per_sec = output.metrics.tokens_per_sec,
                state = ?output.state,
                "generation finished"
            );
        }
        Command::Complete { text, suggestions } => {
            for (index, suggestion) in model.complete(&text, suggestions).await?.iter().enumerate() {
                println!("{}. {}", index + 1, suggestion);
            }
        }
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&model.info())?);
        }
    }
    Ok(())
}
