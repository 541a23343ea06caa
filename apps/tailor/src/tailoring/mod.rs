//! Section transforms: one per tailoring step, plus the grounding and
//! text-metric helpers they share.

pub mod au_english;
pub mod certifications;
pub mod cross_reference;
pub mod education;
pub mod experience;
pub mod grounding;
pub mod handlers;
pub mod job_parser;
pub mod projects;
pub mod prompts;
pub mod reorder;
pub mod skills;
pub mod summary;
pub mod text_metrics;

use std::sync::Arc;

use serde::Serialize;

use crate::models::document::Document;
use crate::models::requirements::JobRequirements;
use crate::pipeline::step::{SectionTransform, StepKind};

use au_english::AuEnglish;
use certifications::ListSelection;
use cross_reference::CrossReferenceAudit;
use education::EducationTailor;
use experience::ExperienceTailor;
use job_parser::JobParser;
use projects::ProjectsTailor;
use reorder::SectionReorder;
use skills::SkillsTailor;
use summary::SummaryTailor;

/// The transform behind a step. Validation is not a transform.
pub fn build_transform(kind: StepKind) -> Option<Arc<dyn SectionTransform>> {
    let transform: Arc<dyn SectionTransform> = match kind {
        StepKind::ParseJobAd => Arc::new(JobParser),
        StepKind::ReorderSections => Arc::new(SectionReorder),
        StepKind::Summary => Arc::new(SummaryTailor),
        StepKind::Experience => Arc::new(ExperienceTailor),
        StepKind::Projects => Arc::new(ProjectsTailor),
        StepKind::Education => Arc::new(EducationTailor),
        StepKind::Certifications => Arc::new(ListSelection::certifications()),
        StepKind::Extracurricular => Arc::new(ListSelection::extracurricular()),
        StepKind::Skills => Arc::new(SkillsTailor),
        StepKind::CrossReference => Arc::new(CrossReferenceAudit),
        StepKind::AuEnglish => Arc::new(AuEnglish),
        StepKind::Validate => return None,
    };
    Some(transform)
}

// ─── Prompt helpers ──────────────────────────────────────────────────────────

/// Pretty JSON for embedding CV data in a prompt.
pub(crate) fn prompt_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// The job requirements as prompt text.
pub(crate) fn requirements_block(requirements: &JobRequirements) -> String {
    if requirements.is_empty() {
        return "(no structured requirements available; use general best practice)".to_string();
    }
    prompt_json(requirements)
}

/// One section of the document as prompt JSON.
pub(crate) fn section_json(document: &Document, key: &str) -> String {
    match document.section(key) {
        Some(section) => prompt_json(&section.to_json()),
        None => "(none)".to_string(),
    }
}

/// Lower-cased, whitespace-collapsed text for matching model output back to
/// CV entries.
pub(crate) fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
