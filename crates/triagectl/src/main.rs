//! triagectl - CLI front end for the ticket triage pipeline.
//!
//! Reads ticket text from the command line or stdin, runs the pipeline
//! against the local Ollama host, and prints the analysis as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use triage_core::ollama::OllamaBackend;
use triage_core::{detect_sentiment, Category, TriageConfig, TriagePipeline};

#[derive(Parser)]
#[command(name = "triagectl")]
#[command(about = "Support ticket triage - classify tickets and draft replies", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, default_value = "/etc/triage/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis pipeline on one ticket
    Analyze {
        /// Ticket text ("-" to read stdin)
        text: String,

        /// Also report sentiment
        #[arg(long)]
        sentiment: bool,
    },

    /// Keyword-only classification (rules, then prototypes, then model)
    Classify {
        /// Ticket text ("-" to read stdin)
        text: String,
    },

    /// Check the local model host and list installed models
    Status,

    /// Record a misclassified ticket for future fine-tuning
    Correct {
        /// Ticket text
        text: String,

        /// Category a human assigned
        #[arg(long)]
        expected: String,

        /// Category the pipeline produced
        #[arg(long)]
        predicted: String,

        /// JSONL log file
        #[arg(long, default_value = "misclassified.jsonl")]
        log: PathBuf,
    },
}

fn read_text(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading ticket text from stdin")?;
        Ok(buf)
    } else {
        Ok(arg.to_string())
    }
}

fn parse_category(s: &str) -> Result<Category> {
    s.parse::<Category>()
        .map_err(|_| anyhow::anyhow!("unknown category '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = TriageConfig::load(&cli.config)?;

    match cli.command {
        Commands::Analyze { text, sentiment } => {
            let text = read_text(&text)?;
            let pipeline = TriagePipeline::new(config)?;
            let result = pipeline.analyze(&text).await;
            let mut out = serde_json::to_value(&result)?;
            if sentiment {
                out["sentiment"] = detect_sentiment(&text).as_str().into();
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Commands::Classify { text } => {
            let text = read_text(&text)?;
            let pipeline = TriagePipeline::new(config)?;
            let (category, confidence) = pipeline.classify(&text).await;
            println!(
                "{}",
                serde_json::json!({ "category": category, "confidence": confidence })
            );
        }

        Commands::Status => {
            let backend = OllamaBackend::new(
                &config.ollama_url,
                std::time::Duration::from_secs(config.chat_timeout_secs),
            );
            if !backend.is_available().await {
                println!("Ollama host {} is not reachable", config.ollama_url);
                std::process::exit(1);
            }
            use triage_core::ollama::ChatBackend;
            let models = backend.list_models().await.unwrap_or_default();
            println!("Ollama host {} is up", config.ollama_url);
            if models.is_empty() {
                println!("No models installed");
            } else {
                for model in models {
                    println!("  {model}");
                }
            }
        }

        Commands::Correct {
            text,
            expected,
            predicted,
            log,
        } => {
            let expected = parse_category(&expected)?;
            let predicted = parse_category(&predicted)?;
            triage_core::learn::log_misclassified(&log, &text, expected, predicted)?;
            println!("Recorded correction to {}", log.display());
        }
    }

    Ok(())
}
