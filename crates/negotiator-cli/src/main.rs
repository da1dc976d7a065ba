//! CLI binary for running the negotiation reasoning pipeline.

mod config;
mod dry_run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use negotiator_llm::{FixedGenerator, TextGenerator, UsageTrackingMiddleware};
use negotiator_pipeline::{
    save_trace, standard_stages, validate, DealRepository, NegotiationPipeline, Severity,
};

use crate::config::{ConfigArgs, NegotiatorConfig};

#[derive(Parser)]
#[command(name = "negotiator", version, about = "Negotiation strategy pipeline for insurance deals")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: ConfigArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce a negotiation strategy for a deal
    Run {
        /// Deal identifier, e.g. DEAL123
        deal_id: String,

        /// Submission whose documents should be included
        #[arg(short, long)]
        submission: Option<String>,

        /// Use canned responses instead of calling a model
        #[arg(long)]
        dry_run: bool,

        /// Write the run trace to this file
        #[arg(long)]
        trace_out: Option<PathBuf>,

        /// Write the final state here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the known deals
    Deals,

    /// Search the knowledge store
    Search {
        /// Free text or a deal field path such as submission.risk_profile
        query: String,
    },

    /// Check the stage sequence
    Validate,

    /// Show each stage's reads and writes
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);
    let config = NegotiatorConfig::from_args(&cli.config);
    tracing::debug!(data_dir = %config.data_dir.display(), model = %config.model, "configuration");

    match cli.command {
        Commands::Run {
            deal_id,
            submission,
            dry_run,
            trace_out,
            output,
        } => {
            cmd_run(
                &config,
                &deal_id,
                submission.as_deref(),
                dry_run,
                trace_out.as_deref(),
                output.as_deref(),
            )
            .await?;
        }
        Commands::Deals => cmd_deals(&config).await?,
        Commands::Search { query } => cmd_search(&config, &query).await?,
        Commands::Validate => cmd_validate(),
        Commands::Info => cmd_info(),
    }

    Ok(())
}

/// Logs go to stderr so the state JSON on stdout stays machine-readable.
/// `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn cmd_run(
    config: &NegotiatorConfig,
    deal_id: &str,
    submission: Option<&str>,
    dry_run: bool,
    trace_out: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let usage = UsageTrackingMiddleware::new();
    let generator: Arc<dyn TextGenerator> = if dry_run {
        tracing::info!("dry run: no model calls");
        Arc::new(dry_run::generator())
    } else {
        config.generator(&usage)?
    };

    let pipeline = NegotiationPipeline::standard(
        Arc::new(config.load_deals().await?),
        config.submissions().await,
        Arc::new(config.load_knowledge().await?),
        generator,
    )?;

    let outcome = pipeline.execute(deal_id, submission).await;
    if let Some(path) = trace_out {
        save_trace(&outcome.trace, path)
            .await
            .with_context(|| format!("writing trace to {}", path.display()))?;
        tracing::info!(path = %path.display(), "trace written");
    }
    if usage.calls() > 0 {
        tracing::info!(
            calls = usage.calls(),
            input_tokens = usage.total_input_tokens(),
            output_tokens = usage.total_output_tokens(),
            "generation usage"
        );
    }

    let state = outcome
        .result
        .with_context(|| format!("negotiation run for {deal_id} failed"))?;
    let json = serde_json::to_string_pretty(&state.to_value()?)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("writing state to {}", path.display()))?;
            eprintln!("State written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn cmd_deals(config: &NegotiatorConfig) -> anyhow::Result<()> {
    let repo = config.load_deals().await?;
    for id in repo.ids() {
        let deal = repo.get(&id).await?;
        println!(
            "{}  {}  objections={}",
            id,
            deal.submission.risk_profile,
            deal.negotiation_context.objections.len()
        );
    }
    Ok(())
}

async fn cmd_search(config: &NegotiatorConfig, query: &str) -> anyhow::Result<()> {
    let store = config.load_knowledge().await?;
    let found = store.search(query);
    if found.is_empty() {
        println!("No matching knowledge for '{query}'");
        return Ok(());
    }
    for chunk in found {
        println!(
            "[{}] ({}) {}",
            chunk.chunk_id,
            chunk.document_type().unwrap_or("unknown"),
            chunk.text
        );
    }
    Ok(())
}

/// Stages built against an inert generator, for inspection only.
fn inspection_stages() -> Vec<negotiator_pipeline::DynStage> {
    standard_stages(
        Arc::new(negotiator_pipeline::InMemoryDealRepository::new()),
        None,
        Arc::new(negotiator_pipeline::KnowledgeStore::new()),
        Arc::new(FixedGenerator::new("{}")),
    )
}

fn cmd_validate() {
    let diagnostics = validate(&inspection_stages());
    if diagnostics.is_empty() {
        println!("Pipeline is valid");
        return;
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
    }

    if has_error {
        std::process::exit(1);
    }
}

fn cmd_info() {
    let join = |fields: &[negotiator_types::StateField]| {
        if fields.is_empty() {
            "-".to_string()
        } else {
            fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
        }
    };

    for (i, stage) in inspection_stages().iter().enumerate() {
        let contract = stage.contract();
        println!("{}. {}", i + 1, stage.name());
        println!("   requires: {}", join(contract.required));
        println!("   optional: {}", join(contract.optional));
        println!("   writes:   {}", join(contract.owns));
    }
}
