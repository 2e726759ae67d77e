//! Dealterm CLI
//!
//! Command-line front end for the contract extraction pipeline:
//! - `classify` a packet and inspect per-page form identities,
//! - `select` the critical pages a run would extract from,
//! - `extract` the full reconciled term set.
//!
//! Pages are a directory of scanned images (`.png`/`.jpg`), ordered by file
//! name. Model credentials come from the environment (OPENAI_API_KEY,
//! ANTHROPIC_API_KEY, or LOCAL_VLM_URL).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use dealterm_core::select::select_critical_pages;
use dealterm_llm::UnifiedVision;
use dealterm_pipeline::{classify_pages, Pipeline};

mod display;
mod pages;

#[derive(Parser)]
#[command(name = "dealterm")]
#[command(author, version, about = "Reconcile scanned purchase-contract packets into final terms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every page of a packet.
    Classify {
        /// Directory of page images.
        dir: PathBuf,
        /// Write the classification array as JSON.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show which pages the selector would extract from.
    Select {
        /// Directory of page images.
        dir: PathBuf,
    },

    /// Run the full extraction pipeline.
    Extract {
        /// Directory of page images.
        dir: PathBuf,
        /// Write the full outcome (terms, provenance, audit) as JSON.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Print the audit trail after the summary.
        #[arg(long)]
        audit: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { dir, out } => {
            let packet = pages::load_packet(&dir)?;
            let model = Arc::new(UnifiedVision::from_env()?);
            let classifications = classify_pages(model, &packet).await?;

            display::print_classifications(&classifications);
            if let Some(path) = out {
                let json = serde_json::to_string_pretty(&classifications)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("\nwrote {}", path.display());
            }
        }

        Commands::Select { dir } => {
            let packet = pages::load_packet(&dir)?;
            let model = Arc::new(UnifiedVision::from_env()?);
            let classifications = classify_pages(model, &packet).await?;
            let critical = select_critical_pages(&classifications, &[]);

            display::print_critical_pages(&critical, packet.len());
            if critical.is_empty() {
                println!("{}", "nothing worth extracting in this packet".yellow());
            }
        }

        Commands::Extract { dir, out, audit } => {
            let packet = pages::load_packet(&dir)?;
            let pipeline = Pipeline::from_env()?;
            let outcome = pipeline.extract(&packet).await?;

            display::print_outcome(&outcome, audit);
            if let Some(path) = out {
                let json = serde_json::to_string_pretty(&outcome)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("\nwrote {}", path.display());
            }
        }
    }

    Ok(())
}
