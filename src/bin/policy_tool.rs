use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use climate_policy_core::{
    DocumentProcessor, ParallelProcessor, PipelineConfig, PolicyAnalyzer, Recommender, WeatherQuery,
    load_samples_csv,
};
use log::info;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "policy-tool",
    about = "Clean climate-policy documents and recommend weather conditions"
)]
struct PolicyCli {
    /// Optional JSON pipeline config; absent keys keep their defaults.
    #[arg(long, env = "CLIMATE_POLICY_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, clean and tag PDF/DOCX files; prints one JSON object per file.
    Clean {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Rank historical weather rows against a query.
    Recommend {
        /// CSV with location, month, temperature_c, humidity_pct, wind_kmh, condition.
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        location: String,
        #[arg(long)]
        month: u8,
        #[arg(long, allow_hyphen_values = true)]
        temperature_c: f64,
        #[arg(long)]
        humidity_pct: f64,
        #[arg(long)]
        wind_kmh: f64,
        /// Neighbours to vote with; defaults to the config value.
        #[arg(long)]
        top_n: Option<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = PolicyCli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Clean { files } => clean(config, &files),
        Command::Recommend {
            corpus,
            location,
            month,
            temperature_c,
            humidity_pct,
            wind_kmh,
            top_n,
        } => {
            let top_n = top_n.unwrap_or(config.recommend_top_n);
            let query = WeatherQuery {
                location,
                month,
                temperature_c,
                humidity_pct,
                wind_kmh,
            };
            recommend(&corpus, &query, top_n)
        }
    }
}

fn clean(config: PipelineConfig, files: &[PathBuf]) -> Result<()> {
    let batch_size = config.batch_size;
    let processor = DocumentProcessor::new(config).context("failed to build document processor")?;
    let parallel = ParallelProcessor::from_system(batch_size).context("failed to start worker pool")?;
    let analyzer = PolicyAnalyzer::new();

    let results = parallel.process_files_parallel(&processor, files);
    let mut failures = 0usize;

    for (path, result) in files.iter().zip(results) {
        let line = match result {
            Ok(document) => {
                let analysis = analyzer.analyze(&document.cleaned_text);
                json!({
                    "file": path.display().to_string(),
                    "document": document,
                    "topics": analysis,
                })
            }
            Err(e) => {
                failures += 1;
                json!({
                    "file": path.display().to_string(),
                    "error": e.to_string(),
                })
            }
        };
        println!("{}", serde_json::to_string(&line).context("failed to serialise result")?);
    }

    info!("Cleaned {} files, {} failed", files.len() - failures, failures);
    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, files.len());
    }
    Ok(())
}

fn recommend(corpus: &Path, query: &WeatherQuery, top_n: usize) -> Result<()> {
    let samples = load_samples_csv(corpus)
        .with_context(|| format!("failed to load historical corpus {}", corpus.display()))?;
    let recommender = Recommender::fit(samples).context("failed to fit recommender")?;

    let result = recommender.recommend(query, top_n);
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("failed to serialise recommendation")?
    );
    Ok(())
}
