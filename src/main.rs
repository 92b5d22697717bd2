use churn_xai::batch::{read_records, BatchRunner};
use churn_xai::{ChurnPipeline, EngineConfig, RawRecord};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "churn-xai")]
#[command(about = "Explainable churn-risk assessment for customer records")]
#[command(version)]
struct Args {
    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model directory (overrides the config file and CHURN_MODEL_DIR)
    #[arg(short, long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a single customer record
    Assess {
        /// JSON file holding one record, or "-" for stdin
        input: String,
    },
    /// Assess every record in a CSV or JSON lines file
    Batch {
        /// Input file (.csv, .jsonl, or .json)
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent records (default: from config)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Print the loaded schema registry
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::load(args.config.as_deref()).context("Failed to load engine config")?;
    if let Some(dir) = args.model_dir {
        config.model_dir = dir;
    }

    match args.command {
        Commands::Assess { input } => assess(config, &input),
        Commands::Batch { input, output, workers } => batch(config, input, output, workers).await,
        Commands::Schema => schema(config),
    }
}

fn load_pipeline(config: EngineConfig) -> Result<ChurnPipeline> {
    let model_dir = config.model_dir.clone();
    ChurnPipeline::from_config(config)
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))
}

fn assess(config: EngineConfig, input: &str) -> Result<()> {
    let pipeline = load_pipeline(config)?;

    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };
    let record: RawRecord = serde_json::from_str(&content).context("Input must be a JSON object")?;

    let assessment = pipeline.assess(&record)?;
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

async fn batch(
    config: EngineConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    workers: Option<usize>,
) -> Result<()> {
    let pipeline = Arc::new(load_pipeline(config)?);
    let records = read_records(&input).with_context(|| format!("Failed to read {}", input.display()))?;
    info!("Read {} records from {}", records.len(), input.display());

    let mut runner = BatchRunner::new(pipeline);
    if let Some(workers) = workers {
        runner = runner.with_workers(workers);
    }

    let token = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, skipping records not yet started");
            token.cancel();
        }
    });

    let report = runner.run(records).await;
    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn schema(config: EngineConfig) -> Result<()> {
    let pipeline = load_pipeline(config)?;
    let registry = pipeline.registry();

    println!("Schema version: {}", registry.version());
    println!("Columns ({}): {}", registry.columns().len(), registry.columns().iter().join(", "));
    println!(
        "Scaled columns ({}): {}",
        registry.scaled_columns().len(),
        registry.scaled_columns().iter().join(", ")
    );
    println!("Input fields: {}", registry.input_fields().map(|f| f.name.as_str()).join(", "));
    println!("Categorical levels:");
    for spec in registry.categorical_fields() {
        let levels = registry.valid_enum_values(&spec.name).unwrap_or_default();
        match registry.baseline(&spec.name) {
            Some(baseline) => println!("  {}: {} (baseline {})", spec.name, levels.iter().join(", "), baseline),
            None => println!("  {}: {}", spec.name, levels.iter().join(", ")),
        }
    }
    println!("Risk bands:");
    for band in pipeline.config().risk_bands.bands() {
        println!("  {:<10} >= {:.2}", band.label, band.min_probability);
    }
    Ok(())
}
