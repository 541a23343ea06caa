//! The section-transform contract shared by every tailoring step.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::llm_client::structured::{FallbackFn, ParseSource, ResponseParser};
use crate::llm_client::{LlmError, ModelClient, ModelRequest};
use crate::models::document::{self, Document, Section};
use crate::models::requirements::JobRequirements;
use crate::tailoring::grounding::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    ParseJobAd,
    ReorderSections,
    Summary,
    Experience,
    Projects,
    Education,
    Certifications,
    Extracurricular,
    Skills,
    CrossReference,
    AuEnglish,
    Validate,
}

/// Transforms run when no sequence is configured.
pub const DEFAULT_SEQUENCE: [StepKind; 8] = [
    StepKind::ReorderSections,
    StepKind::Summary,
    StepKind::Experience,
    StepKind::Projects,
    StepKind::Education,
    StepKind::Certifications,
    StepKind::Extracurricular,
    StepKind::Skills,
];

const ALL_STEPS: [StepKind; 12] = [
    StepKind::ParseJobAd,
    StepKind::ReorderSections,
    StepKind::Summary,
    StepKind::Experience,
    StepKind::Projects,
    StepKind::Education,
    StepKind::Certifications,
    StepKind::Extracurricular,
    StepKind::Skills,
    StepKind::CrossReference,
    StepKind::AuEnglish,
    StepKind::Validate,
];

impl StepKind {
    pub fn name(self) -> &'static str {
        match self {
            StepKind::ParseJobAd => "parse_job_ad",
            StepKind::ReorderSections => "reorder_sections",
            StepKind::Summary => "summary",
            StepKind::Experience => "experience",
            StepKind::Projects => "projects",
            StepKind::Education => "education",
            StepKind::Certifications => "certifications",
            StepKind::Extracurricular => "extracurricular",
            StepKind::Skills => "skills",
            StepKind::CrossReference => "cross_reference",
            StepKind::AuEnglish => "au_english",
            StepKind::Validate => "validate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        ALL_STEPS.into_iter().find(|kind| kind.name() == name)
    }

    /// Completion flag name exposed in run reports.
    pub fn flag_name(self) -> &'static str {
        match self {
            StepKind::ParseJobAd => "job_parsed",
            StepKind::ReorderSections => "sections_reordered",
            StepKind::Summary => "summary_updated",
            StepKind::Experience => "experience_tailored",
            StepKind::Projects => "projects_tailored",
            StepKind::Education => "education_tailored",
            StepKind::Certifications => "certifications_tailored",
            StepKind::Extracurricular => "extracurricular_tailored",
            StepKind::Skills => "skills_tailored",
            StepKind::CrossReference => "cross_reference_checked",
            StepKind::AuEnglish => "au_english_converted",
            StepKind::Validate => "yaml_validated",
        }
    }

    /// Tag sent with the model request; also keys the parser's fallbacks.
    pub fn context_tag(self) -> &'static str {
        match self {
            StepKind::ParseJobAd => "parse_job_ad",
            StepKind::ReorderSections => "reorder_sections",
            StepKind::Summary => "update_summary",
            StepKind::Experience => "tailor_experience",
            StepKind::Projects => "tailor_projects",
            StepKind::Education => "tailor_education",
            StepKind::Certifications => "tailor_certifications",
            StepKind::Extracurricular => "tailor_extracurricular",
            StepKind::Skills => "tailor_skills",
            StepKind::CrossReference => "cross_reference_check",
            StepKind::AuEnglish => "convert_au_english",
            StepKind::Validate => "validate_yaml",
        }
    }

    /// The section this step rewrites, if it owns one.
    pub fn target_section(self) -> Option<&'static str> {
        match self {
            StepKind::Summary => Some(document::SUMMARY),
            StepKind::Experience => Some(document::EXPERIENCE),
            StepKind::Projects => Some(document::PROJECTS),
            StepKind::Education => Some(document::EDUCATION),
            StepKind::Certifications => Some(document::CERTIFICATIONS),
            StepKind::Extracurricular => Some(document::EXTRACURRICULAR),
            StepKind::Skills => Some(document::SKILLS),
            _ => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("could not parse the model response ({context})")]
    Unparseable { context: String },

    #[error("model response ({context}) does not match the expected shape: {message}")]
    Schema { context: String, message: String },

    #[error("{0}")]
    Rejected(String),
}

impl TransformError {
    /// Call failures and timeouts are run errors; everything else is a
    /// warning. Either way the section stays as it was.
    pub fn is_hard(&self) -> bool {
        matches!(self, TransformError::Model(_) | TransformError::Timeout { .. })
    }
}

/// A document change proposed by a transform, applied by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    SetRequirements(JobRequirements),
    Replace { key: String, section: Section },
    Remove { key: String, reason: String },
    Reorder(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub edits: Vec<Edit>,
    pub summary: String,
    pub warnings: Vec<String>,
}

impl TransformOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn with_edit(mut self, edit: Edit) -> Self {
        self.edits.push(edit);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// Model access for transforms: one call, bounded by the per-call timeout,
/// decoded through the structured-response parser.
pub struct ModelGateway {
    client: Arc<dyn ModelClient>,
    parser: ResponseParser,
    timeout: Duration,
}

/// A decoded model response. `defaulted` is set when the parser had to
/// substitute the registered fallback.
#[derive(Debug)]
pub struct Parsed<T> {
    pub value: T,
    pub defaulted: bool,
}

impl ModelGateway {
    pub fn new(client: Arc<dyn ModelClient>, parser: ResponseParser, timeout: Duration) -> Self {
        Self {
            client,
            parser,
            timeout,
        }
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        context: &str,
        system: &str,
        prompt: &str,
    ) -> Result<Parsed<T>, TransformError> {
        let call = self.client.complete(ModelRequest {
            context,
            system,
            prompt,
        });
        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TransformError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        };

        let parsed = self
            .parser
            .parse(&raw, context)
            .ok_or_else(|| TransformError::Unparseable {
                context: context.to_string(),
            })?;
        let defaulted = parsed.source == ParseSource::Fallback;
        let value = serde_json::from_value(parsed.value).map_err(|e| TransformError::Schema {
            context: context.to_string(),
            message: e.to_string(),
        })?;
        Ok(Parsed { value, defaulted })
    }
}

/// Read-only view of the run handed to a transform for one invocation.
pub struct TransformContext<'a> {
    pub document: &'a Document,
    /// Snapshot of the document as loaded, before any step ran.
    pub original: &'a Document,
    pub vocabulary: &'a Vocabulary,
    pub requirements: &'a JobRequirements,
    pub job_ad: &'a str,
    pub settings: &'a PipelineConfig,
    pub gateway: &'a ModelGateway,
}

impl TransformContext<'_> {
    pub async fn request<T: DeserializeOwned>(
        &self,
        step: StepKind,
        system: &str,
        prompt: &str,
    ) -> Result<Parsed<T>, TransformError> {
        self.gateway.request(step.context_tag(), system, prompt).await
    }
}

#[async_trait]
pub trait SectionTransform: Send + Sync {
    fn step(&self) -> StepKind;

    /// Default response registered with the parser for this step's context.
    fn fallback(&self) -> Option<(&'static str, FallbackFn)> {
        None
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in ALL_STEPS {
            assert_eq!(StepKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StepKind::from_name(" Skills "), Some(StepKind::Skills));
        assert_eq!(StepKind::from_name("grammar"), None);
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(StepKind::ParseJobAd.flag_name(), "job_parsed");
        assert_eq!(StepKind::Projects.flag_name(), "projects_tailored");
        assert_eq!(StepKind::Validate.flag_name(), "yaml_validated");
        assert_eq!(StepKind::AuEnglish.flag_name(), "au_english_converted");
    }

    #[test]
    fn test_error_severity() {
        assert!(TransformError::Timeout { secs: 90 }.is_hard());
        assert!(TransformError::Model(LlmError::EmptyContent).is_hard());
        assert!(!TransformError::Rejected("empty".to_string()).is_hard());
        assert!(!TransformError::Unparseable {
            context: "tailor_skills".to_string()
        }
        .is_hard());
    }
}
