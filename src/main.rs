use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

mod config;
mod engine;
mod error;
mod keywords;
mod models;
mod priority;
mod records;
mod report;
mod runner;
mod scorer;
mod sentiment;

use config::TriageConfig;
use engine::{SystemClock, TriageEngine, Variant};
use scorer::{HttpInferenceClient, LexiconScorer, TextScorer};

#[derive(Parser)]
#[command(name = "ticket-triage")]
#[command(about = "Turns bank social-media messages into prioritised support tickets", long_about = None)]
struct Cli {
    /// Policy file (TOML); defaults are built in
    #[arg(long, global = true, env = "TICKET_TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    /// Department from keyword rules
    Keyword,
    /// Category from a hosted zero-shot model
    ZeroShot,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample input file
    Seed {
        #[arg(long, default_value = "input_tweets.csv")]
        out: PathBuf,
    },
    /// Triage every message in an input file
    Triage {
        #[arg(long, default_value = "input_tweets.csv")]
        input: PathBuf,
        #[arg(long, default_value = "output_tickets.csv")]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = VariantArg::Keyword)]
        variant: VariantArg,
        /// Score sentiment with the built-in lexicon instead of a hosted model
        #[arg(long)]
        offline: bool,
        /// Also write a markdown report
        #[arg(long = "report")]
        report_path: Option<PathBuf>,
    },
    /// Triage a single message and print the ticket
    Classify {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "adhoc")]
        id: String,
        #[arg(long, default_value = "unknown")]
        author: String,
        #[arg(long, value_enum, default_value_t = VariantArg::Keyword)]
        variant: VariantArg,
        #[arg(long)]
        offline: bool,
    },
    /// Generate a markdown report from a ticket file
    Report {
        #[arg(long, default_value = "output_tickets.csv")]
        tickets: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn build_engine(
    config: &TriageConfig,
    variant: VariantArg,
    offline: bool,
) -> anyhow::Result<TriageEngine> {
    let token = std::env::var("HF_API_TOKEN").ok();

    let scorer: Arc<dyn TextScorer> = if offline {
        Arc::new(LexiconScorer)
    } else {
        Arc::new(
            HttpInferenceClient::new(&config.models.sentiment_url, token.as_deref())
                .context("failed to set up sentiment model client")?,
        )
    };

    let variant = match variant {
        VariantArg::Keyword => Variant::Keyword,
        VariantArg::ZeroShot => {
            if offline {
                anyhow::bail!("the zero-shot variant needs a model endpoint; drop --offline");
            }
            Variant::ZeroShot(Arc::new(
                HttpInferenceClient::new(&config.models.zero_shot_url, token.as_deref())
                    .context("failed to set up zero-shot model client")?,
            ))
        }
    };

    Ok(TriageEngine::new(config, variant, scorer, Arc::new(SystemClock)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = TriageConfig::load(cli.config.as_deref())
        .context("failed to load triage configuration")?
        .with_env_overrides();

    match cli.command {
        Commands::Seed { out } => {
            let written = records::write_sample_messages(&out)?;
            println!("Wrote {written} sample messages to {}.", out.display());
        }
        Commands::Triage {
            input,
            output,
            variant,
            offline,
            report_path,
        } => {
            let engine = build_engine(&config, variant, offline)?;
            let outcome =
                runner::run_file(&engine, &input, &output, config.runner.max_in_flight).await?;

            report::print_summary(&outcome.summary, &outcome.tickets);
            println!(
                "Wrote {} tickets to {} (run {}).",
                outcome.tickets.len(),
                output.display(),
                outcome.run_id
            );

            if let Some(path) = report_path {
                let source = input.display().to_string();
                let markdown =
                    report::build_report(&source, &outcome.tickets, Some(&outcome.summary));
                std::fs::write(&path, markdown)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Report written to {}.", path.display());
            }
        }
        Commands::Classify {
            text,
            id,
            author,
            variant,
            offline,
        } => {
            let engine = build_engine(&config, variant, offline)?;
            let message = models::Message {
                id,
                author,
                text,
                timestamp: None,
            };
            let ticket = engine.triage(&message).await;
            println!("{}", serde_json::to_string_pretty(&ticket)?);
        }
        Commands::Report { tickets, out } => {
            let loaded = records::read_tickets(&tickets)
                .with_context(|| format!("failed to read tickets from {}", tickets.display()))?;
            let source = tickets.display().to_string();
            let markdown = report::build_report(&source, &loaded, None);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
