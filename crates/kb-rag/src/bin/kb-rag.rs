//! kb-rag command-line client
//!
//! Run with: cargo run -p kb-rag --features cli --bin kb-rag -- query "Show me all tables"

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kb_rag::{
    EngineConfig, KnowledgeService, NewCorrection, QueryMode, QueryTarget,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kb-rag")]
#[command(author, version, about = "Multi-strategy retrieval and routing over knowledge sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Include the reasoning trace in query output
    #[arg(long, global = true)]
    thinking: bool,

    /// Include retrieved contexts in query output
    #[arg(long, global = true)]
    contexts: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question routed over the configured sources
    Query {
        text: String,

        /// Routing mode: smart, database, support or documentation
        #[arg(short, long, default_value = "smart")]
        mode: String,
    },

    /// Ask a question across explicit targets
    Multi {
        text: String,

        /// Target as type:source_id[:secondary], repeatable
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },

    /// Explain how a table relates to the rest of the schema
    Relationships { table: String },

    /// Suggest optimizations for a SQL statement
    Optimize { sql: String },

    /// Manage user corrections
    Corrections {
        #[command(subcommand)]
        command: CorrectionCommands,
    },
}

#[derive(Subcommand)]
enum CorrectionCommands {
    /// Record a corrected answer as pending
    Submit {
        #[arg(long)]
        source_id: String,
        #[arg(long)]
        company_id: i64,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "")]
        original: String,
        #[arg(long)]
        corrected: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Turn pending corrections into documents and ingest them
    Process {
        #[arg(long)]
        source_id: String,
        #[arg(long)]
        company_id: i64,

        /// Only report how many corrections are pending
        #[arg(long)]
        dry_run: bool,
    },

    /// Reject a correction
    Reject { id: i64 },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kb_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => {
            let mut config = EngineConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    tracing::info!("Configuration loaded");
    tracing::info!("  - Generator: {} at {}", config.generator.model, config.generator.base_url);
    tracing::info!("  - Knowledge sources: {}", config.knowledge_sources.base_url);
    tracing::info!("  - Corrections: {}", config.corrections.database_path.display());

    let service = KnowledgeService::from_config(&config)?;

    match cli.command {
        Commands::Query { text, mode } => {
            let mode: QueryMode = mode.parse()?;
            let response = service.query(&text, mode).await?;
            print_json(&response.with_options(cli.thinking, cli.contexts))?;
        }
        Commands::Multi { text, targets } => {
            let targets = targets
                .iter()
                .map(|t| t.parse::<QueryTarget>())
                .collect::<kb_rag::Result<Vec<_>>>()?;
            let explicit = (!targets.is_empty()).then_some(targets.as_slice());
            let response = service
                .query_multi(&text, explicit, service.descriptors())
                .await?;
            print_json(&response.with_options(cli.thinking, cli.contexts))?;
        }
        Commands::Relationships { table } => {
            let response = service.relationships(&table).await?;
            print_json(&response.with_options(cli.thinking, cli.contexts))?;
        }
        Commands::Optimize { sql } => {
            let response = service.optimize(&sql).await?;
            print_json(&response.with_options(cli.thinking, cli.contexts))?;
        }
        Commands::Corrections { command } => match command {
            CorrectionCommands::Submit {
                source_id,
                company_id,
                query,
                original,
                corrected,
                notes,
            } => {
                let response = service.submit_correction(&NewCorrection {
                    source_id,
                    company_id,
                    original_query: query,
                    original_response: original,
                    corrected_response: corrected,
                    notes,
                    ..Default::default()
                })?;
                print_json(&response)?;
            }
            CorrectionCommands::Process {
                source_id,
                company_id,
                dry_run,
            } => {
                if dry_run {
                    let pending = service.pending_corrections(&source_id, company_id)?;
                    print_json(&serde_json::json!({ "pending": pending }))?;
                } else {
                    let outcome = service.process_corrections(&source_id, company_id).await?;
                    print_json(&outcome)?;
                }
            }
            CorrectionCommands::Reject { id } => {
                service.reject_correction(id)?;
                print_json(&serde_json::json!({ "status": "rejected", "id": id }))?;
            }
        },
    }

    Ok(())
}
