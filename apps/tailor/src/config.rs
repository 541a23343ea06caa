use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::pipeline::step::{StepKind, DEFAULT_SEQUENCE};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_api_url: Option<String>,
    pub model: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_api_url: optional_env("ANTHROPIC_API_URL"),
            model: optional_env("TAILOR_MODEL"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            pipeline: PipelineConfig::from_lookup(optional_env)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ─── Pipeline settings ───────────────────────────────────────────────────────

/// How the reorder step decides section order and removals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReorderStrategy {
    /// Ask the model.
    #[default]
    Model,
    /// Keyword-relevance rules, no model call.
    Rules,
}

impl FromStr for ReorderStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "rules" => Ok(Self::Rules),
            other => bail!("unknown reorder strategy '{other}' (expected 'model' or 'rules')"),
        }
    }
}

/// Immutable per-run settings, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Transforms run between job-ad parsing and validation, in order.
    pub sequence: Vec<StepKind>,
    pub model_timeout: Duration,
    pub projects_cap: usize,
    pub education_highlight_limit: usize,
    pub reorder_strategy: ReorderStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sequence: DEFAULT_SEQUENCE.to_vec(),
            model_timeout: Duration::from_secs(90),
            projects_cap: 4,
            education_highlight_limit: 5,
            reorder_strategy: ReorderStrategy::Model,
        }
    }
}

impl PipelineConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let sequence = match lookup("TAILOR_STEPS") {
            Some(raw) => parse_sequence(&raw)?,
            None => defaults.sequence,
        };
        let model_timeout = match lookup("TAILOR_MODEL_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                parse_positive(&raw).context("TAILOR_MODEL_TIMEOUT_SECS must be a positive integer")?,
            ),
            None => defaults.model_timeout,
        };
        let projects_cap = match lookup("TAILOR_PROJECTS_CAP") {
            Some(raw) => parse_positive(&raw)
                .context("TAILOR_PROJECTS_CAP must be a positive integer")?
                as usize,
            None => defaults.projects_cap,
        };
        let education_highlight_limit = match lookup("TAILOR_EDUCATION_HIGHLIGHTS") {
            Some(raw) => parse_positive(&raw)
                .context("TAILOR_EDUCATION_HIGHLIGHTS must be a positive integer")?
                as usize,
            None => defaults.education_highlight_limit,
        };
        let reorder_strategy = match lookup("TAILOR_REORDER") {
            Some(raw) => raw
                .parse::<ReorderStrategy>()
                .context("invalid TAILOR_REORDER")?,
            None => defaults.reorder_strategy,
        };

        Ok(Self {
            sequence,
            model_timeout,
            projects_cap,
            education_highlight_limit,
            reorder_strategy,
        })
    }
}

fn parse_positive(raw: &str) -> Result<u64> {
    let value = raw.trim().parse::<u64>()?;
    if value == 0 {
        bail!("value must be greater than zero");
    }
    Ok(value)
}

/// Parses a comma-separated transform list such as `summary,skills`.
/// Job-ad parsing and validation always run and may not be listed.
pub fn parse_sequence(raw: &str) -> Result<Vec<StepKind>> {
    let mut sequence = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let kind = StepKind::from_name(name)
            .with_context(|| format!("unknown pipeline step '{name}' in TAILOR_STEPS"))?;
        if matches!(kind, StepKind::ParseJobAd | StepKind::Validate) {
            bail!("'{name}' always runs and cannot be listed in TAILOR_STEPS");
        }
        if sequence.contains(&kind) {
            bail!("pipeline step '{name}' is listed twice in TAILOR_STEPS");
        }
        sequence.push(kind);
    }
    Ok(sequence)
}
