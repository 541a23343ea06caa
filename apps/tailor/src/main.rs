mod config;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;
mod storage;
mod tailoring;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::models::document::ResumeFile;
use crate::pipeline::{Pipeline, RunState};
use crate::routes::build_router;
use crate::state::AppState;

/// How many errors and warnings `run` prints before summarising the rest.
const SUMMARY_LIMIT: usize = 5;

/// Tailors a master CV to a job advertisement.
#[derive(Parser)]
#[command(name = "tailor", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve,

    /// Tailor one CV file and exit.
    Run {
        /// Master CV (YAML with a top-level `cv` key).
        #[arg(long, default_value = "master_CV.yaml")]
        cv: PathBuf,

        /// Job advertisement as plain text.
        #[arg(long, default_value = "job_advertisement.txt")]
        job_ad: PathBuf,

        /// Where the tailored CV is written.
        #[arg(long, default_value = "working_CV.yaml")]
        output: PathBuf,

        /// Optional JSON run report.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Arc::new(build_pipeline(&config)?);

    match cli.command {
        Command::Serve => serve(config, pipeline).await,
        Command::Run {
            cv,
            job_ad,
            output,
            report,
        } => run_once(&pipeline, &cv, &job_ad, &output, report.as_deref()).await,
    }
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let mut llm = LlmClient::new(config.anthropic_api_key.clone())
        .context("Failed to initialize LLM client")?;
    if let Some(url) = &config.anthropic_api_url {
        llm = llm.with_api_url(url.clone());
    }
    if let Some(model) = &config.model {
        llm = llm.with_model(model.clone());
    }
    info!("LLM client initialized (model: {})", llm.model());

    let pipeline = Pipeline::new(Arc::new(llm), config.pipeline.clone());
    info!(
        "Pipeline steps: {}",
        pipeline
            .step_kinds()
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(" → ")
    );
    Ok(pipeline)
}

async fn serve(config: Config, pipeline: Arc<Pipeline>) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let state = AppState { pipeline, config };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_once(
    pipeline: &Pipeline,
    cv_path: &Path,
    job_ad_path: &Path,
    output: &Path,
    report_path: Option<&Path>,
) -> Result<()> {
    let ResumeFile { cv, extra } = storage::load_resume(cv_path)?;
    let job_ad = storage::load_job_ad(job_ad_path)?;

    let state = pipeline
        .run(cv, &job_ad)
        .await
        .context("Tailoring run could not start")?;
    log_summary(&state);

    let report = state.report();
    if let Some(path) = report_path {
        storage::save_report(path, &report)?;
    }
    storage::save_resume(
        output,
        &ResumeFile {
            cv: state.document,
            extra,
        },
    )?;
    info!("Run {} finished: {:?}", report.run_id, report.status);
    Ok(())
}

fn log_summary(state: &RunState) {
    for (flag, done) in state.flags() {
        info!("  {flag}: {}", if done { "done" } else { "not run" });
    }
    for change in state.changes() {
        info!("  {}: {}", change.step, change.summary);
    }

    info!("{} errors, {} warnings", state.errors.len(), state.warnings.len());
    for error in state.errors.iter().take(SUMMARY_LIMIT) {
        warn!("  error: {error}");
    }
    if state.errors.len() > SUMMARY_LIMIT {
        warn!("  ... and {} more errors", state.errors.len() - SUMMARY_LIMIT);
    }
    for warning in state.warnings.iter().take(SUMMARY_LIMIT) {
        warn!("  warning: {warning}");
    }
    if state.warnings.len() > SUMMARY_LIMIT {
        warn!("  ... and {} more warnings", state.warnings.len() - SUMMARY_LIMIT);
    }
}
