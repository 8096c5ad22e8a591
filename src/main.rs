use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use quarry_core::{Config, RagPipeline};

#[derive(Parser)]
#[command(name = "quarry", version, about = "Agentic RAG engine over a dual vector index")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "quarry.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every configured knowledge-base source into the index.
    Ingest,
    /// Ask a question through the reasoning loop.
    Ask {
        question: Vec<String>,
        /// Stream the answer token by token (single turn, no tool loop).
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let pipeline = RagPipeline::new(config.agent, config.store)
        .await
        .context("building pipeline")?;

    match cli.command {
        Command::Ingest => {
            let report = pipeline.build().await.context("ingestion failed")?;
            println!(
                "ingested {} files ({} failed, {} skipped): {} chunks, {} symbols",
                report.files_processed,
                report.files_failed,
                report.files_skipped,
                report.chunks,
                report.symbols
            );
        }
        Command::Ask { question, stream } => {
            let question = question.join(" ");
            anyhow::ensure!(!question.trim().is_empty(), "question must not be empty");

            if stream {
                let mut fragments = pipeline
                    .generate_stream(&question)
                    .await
                    .context("generation failed")?;
                while let Some(fragment) = fragments.next().await {
                    print!("{}", fragment.context("stream failed")?);
                }
                println!();
            } else {
                let answer = pipeline
                    .generate(&question)
                    .await
                    .context("generation failed")?;
                println!("{answer}");
            }
        }
    }

    Ok(())
}
