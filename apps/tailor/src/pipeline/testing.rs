//! Test doubles and fixtures shared by the pipeline and tailoring tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::llm_client::structured::{FallbackRegistry, ResponseParser};
use crate::llm_client::{LlmError, ModelClient, ModelRequest};
use crate::models::document::{Document, ResumeFile};
use crate::models::requirements::JobRequirements;
use crate::pipeline::step::{
    ModelGateway, SectionTransform, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::grounding::Vocabulary;

pub const SAMPLE_YAML: &str = r#"cv:
  name: Jordan Lee
  email: jordan@example.com
  location: Leeds, UK
  sections:
    professional_summary:
      - Data analyst with five years of experience turning raw data into decisions. Skilled in Python and SQL reporting.
    experience:
      - company: Acme Analytics
        position: Data Tech
        start_date: 2021-03
        end_date: present
        location: Leeds
        highlights:
          - Used Python and SQL daily to automate reporting
          - Built Excel dashboards for the finance team
      - company: Globex
        position: Test Engineer
        start_date: 2018-06
        end_date: 2021-02
        highlights:
          - Wrote regression test plans for billing releases
    projects:
      - name: Sales Forecaster
        start_date: 2022
        summary: Forecasting tool for regional sales
        highlights:
          - Modelled weekly sales with Python
      - name: Budget Tracker
        summary: Household budget spreadsheet
        highlights:
          - Automated monthly reports in Excel
      - name: Chess Engine
        highlights:
          - Wrote a move generator
      - name: Recipe Site
        highlights:
          - Static recipe site with search
      - name: Weather Bot
        highlights:
          - Posted daily forecasts to a chat room
    education:
      - institution: MIT
        area: Data Science
        degree: MS
        start_date: 2016
        end_date: 2018
        highlights:
          - Thesis on time-series forecasting
    skills:
      - label: Languages
        details: Python, SQL
      - label: Tools
        details: Git, Excel
    certifications:
      - AWS Certified Cloud Practitioner
      - First Aid Certificate
    extracurricular:
      - label: Volunteering
        details: Coding club mentor at the local library
      - Chess club captain
design:
  theme: classic
"#;

pub const SAMPLE_JOB_AD: &str = "Data Analyst at Initech. You will build reporting pipelines in \
    Python and SQL, maintain dashboards and work with finance stakeholders.";

pub fn sample_file() -> ResumeFile {
    ResumeFile::from_yaml_str(SAMPLE_YAML).expect("sample CV parses")
}

pub fn sample_document() -> Document {
    sample_file().cv
}

pub fn sample_requirements() -> JobRequirements {
    JobRequirements {
        essential_requirements: vec!["Python".to_string(), "SQL reporting".to_string()],
        key_technologies: vec!["Python".to_string(), "SQL".to_string()],
        role_focus: vec!["Data analysis".to_string()],
        industry_domain: "Finance".to_string(),
        ..Default::default()
    }
}

// ─── Scripted model ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail,
    Hang,
}

/// `ModelClient` double that answers by request context and records calls.
#[derive(Default)]
pub struct ScriptedModel {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, context: &str, body: impl Into<String>) -> Self {
        self.scripts
            .insert(context.to_string(), Script::Reply(body.into()));
        self
    }

    pub fn reply_json(self, context: &str, value: Value) -> Self {
        self.reply(context, value.to_string())
    }

    pub fn fail(mut self, context: &str) -> Self {
        self.scripts.insert(context.to_string(), Script::Fail);
        self
    }

    pub fn hang(mut self, context: &str) -> Self {
        self.scripts.insert(context.to_string(), Script::Hang);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, context: &str) -> usize {
        self.calls().iter().filter(|c| *c == context).count()
    }

    /// User prompt of the most recent request sent under `context`.
    pub fn last_prompt(&self, context: &str) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(c, _)| c == context)
            .map(|(_, prompt)| prompt.clone())
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(request.context.to_string());
        self.prompts
            .lock()
            .unwrap()
            .push((request.context.to_string(), request.prompt.to_string()));
        match self.scripts.get(request.context).cloned() {
            Some(Script::Reply(body)) => Ok(body),
            Some(Script::Fail) => Err(LlmError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            }),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(LlmError::Api {
                status: 404,
                message: format!("no script for {}", request.context),
            }),
        }
    }
}

/// Runs one transform against `document` (also used as the original
/// snapshot) with the given model double.
pub async fn run_transform(
    transform: &dyn SectionTransform,
    model: Arc<ScriptedModel>,
    document: &Document,
    settings: &PipelineConfig,
) -> Result<TransformOutput, TransformError> {
    let mut registry = FallbackRegistry::default();
    if let Some((context, default)) = transform.fallback() {
        registry.register(context, default);
    }
    let gateway = ModelGateway::new(model, ResponseParser::new(registry), settings.model_timeout);
    let vocabulary = Vocabulary::from_document(document);
    let requirements = sample_requirements();
    let ctx = TransformContext {
        document,
        original: document,
        vocabulary: &vocabulary,
        requirements: &requirements,
        job_ad: SAMPLE_JOB_AD,
        settings,
        gateway: &gateway,
    };
    transform.apply(&ctx).await
}
