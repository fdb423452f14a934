//! Composition engine binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use vcomp_engine::{init_tracing, CompositionEngine, EngineConfig, TemplateRegistry};
use vcomp_models::CompositionRequest;

#[derive(Debug, Parser)]
#[command(name = "vcomp", version, about = "Compose and render short-form vertical video")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a composition request and print the result as JSON
    Compose {
        /// Request file (JSON)
        request: PathBuf,

        /// Override the request's output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the retry budget
        #[arg(long)]
        max_retries: Option<u32>,

        /// Platform profile to export (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<String>,
    },
    /// List available templates
    Templates,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        error!("vcomp failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = EngineConfig::from_env().context("invalid configuration")?;
    let templates = TemplateRegistry::load(config.templates_file.as_deref())
        .context("failed to load templates")?;

    match cli.command {
        Command::Templates => {
            for template in templates.iter() {
                println!(
                    "{}\t{}x{}\t{}",
                    template.name,
                    template.resolution.width,
                    template.resolution.height,
                    template.effects.len()
                );
            }
        }
        Command::Compose {
            request,
            output,
            max_retries,
            platforms,
        } => {
            let raw = tokio::fs::read_to_string(&request)
                .await
                .with_context(|| format!("failed to read {}", request.display()))?;
            let mut request: CompositionRequest =
                serde_json::from_str(&raw).context("invalid request JSON")?;
            if let Some(output) = output {
                request.output_path = output;
            }
            if max_retries.is_some() {
                request.max_retries = max_retries;
            }
            if !platforms.is_empty() {
                request.platforms = platforms;
            }

            info!(request_id = %request.id, "Starting composition");
            let engine = CompositionEngine::new(Arc::new(config), Arc::new(templates));
            let result = engine.compose(request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
