use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::document::Document;
use crate::models::requirements::JobRequirements;
use crate::pipeline::step::{Edit, StepKind};
use crate::tailoring::grounding::Vocabulary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    Running { step_index: usize },
    Completed,
    CompletedWithErrors,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub step: StepKind,
    pub summary: String,
}

/// Working memory of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub document: Document,
    original: Document,
    vocabulary: Vocabulary,
    pub job_ad: String,
    requirements: Option<JobRequirements>,
    removed_sections: BTreeSet<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    completed: Vec<(StepKind, bool)>,
    changes: Vec<ChangeRecord>,
    pub status: PipelineStatus,
}

impl RunState {
    /// Captures the original-document snapshot; `steps` fixes the order of
    /// the completion flags.
    pub fn new(document: Document, job_ad: String, steps: &[StepKind]) -> Self {
        let vocabulary = Vocabulary::from_document(&document);
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            original: document.clone(),
            document,
            vocabulary,
            job_ad,
            requirements: None,
            removed_sections: BTreeSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            completed: steps.iter().map(|&kind| (kind, false)).collect(),
            changes: Vec::new(),
            status: PipelineStatus::Idle,
        }
    }

    pub fn original(&self) -> &Document {
        &self.original
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn requirements(&self) -> Option<&JobRequirements> {
        self.requirements.as_ref()
    }

    pub fn is_removed(&self, key: &str) -> bool {
        self.removed_sections.contains(key)
    }

    pub fn is_complete(&self, kind: StepKind) -> bool {
        self.completed
            .iter()
            .any(|&(step, done)| step == kind && done)
    }

    pub fn mark_complete(&mut self, kind: StepKind) {
        match self.completed.iter_mut().find(|(step, _)| *step == kind) {
            Some(entry) => entry.1 = true,
            None => self.completed.push((kind, true)),
        }
    }

    /// Completion flags under their report names, in step order.
    pub fn flags(&self) -> Vec<(&'static str, bool)> {
        self.completed
            .iter()
            .map(|&(kind, done)| (kind.flag_name(), done))
            .collect()
    }

    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn record_change(&mut self, step: StepKind, summary: impl Into<String>) {
        self.changes.push(ChangeRecord {
            step,
            summary: summary.into(),
        });
    }

    /// Applies one edit from a successful transform. Edits that would break
    /// the document's invariants are refused with a warning.
    pub fn apply_edit(&mut self, step: StepKind, edit: Edit) {
        match edit {
            Edit::SetRequirements(requirements) => {
                if self.requirements.is_some() {
                    self.record_warning(format!(
                        "{step}: job requirements are already set, ignoring new ones"
                    ));
                } else {
                    self.requirements = Some(requirements);
                }
            }
            Edit::Replace { key, section } => {
                let current_kind = self.document.section(&key).map(|s| s.kind());
                match current_kind {
                    Some(kind) if kind != section.kind() => {
                        warn!("{}: refusing to change the shape of section '{}'", step, key);
                        self.record_warning(format!(
                            "{step}: refused to change the shape of section '{key}'"
                        ));
                    }
                    _ => self.document.replace_section(&key, section),
                }
            }
            Edit::Remove { key, reason } => {
                if self.document.remove_section(&key).is_some() {
                    info!("{}: removed section '{}' ({})", step, key, reason);
                }
                self.removed_sections.insert(key);
            }
            Edit::Reorder(order) => self.document.reorder(&order),
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            status: self.status,
            steps: self
                .completed
                .iter()
                .map(|&(step, completed)| StepFlag {
                    step,
                    flag: step.flag_name(),
                    completed,
                })
                .collect(),
            removed_sections: self.removed_sections.iter().cloned().collect(),
            changes: self.changes.clone(),
            requirements: self.requirements.clone(),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepFlag {
    pub step: StepKind,
    pub flag: &'static str,
    pub completed: bool,
}

/// Serializable outcome of a run, returned by the API and written by
/// `tailor run --report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub status: PipelineStatus,
    pub steps: Vec<StepFlag>,
    pub removed_sections: Vec<String>,
    pub changes: Vec<ChangeRecord>,
    pub requirements: Option<JobRequirements>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{Section, SKILLS, SUMMARY};
    use crate::pipeline::testing::sample_document;

    fn state() -> RunState {
        RunState::new(
            sample_document(),
            "Data analyst".to_string(),
            &[StepKind::ParseJobAd, StepKind::Summary, StepKind::Validate],
        )
    }

    #[test]
    fn test_new_state_is_idle_with_false_flags() {
        let state = state();
        assert_eq!(state.status, PipelineStatus::Idle);
        assert_eq!(
            state.flags(),
            vec![
                ("job_parsed", false),
                ("summary_updated", false),
                ("yaml_validated", false)
            ]
        );
        assert_eq!(state.original(), &state.document);
    }

    #[test]
    fn test_remove_edit_updates_removed_set() {
        let mut state = state();
        state.apply_edit(
            StepKind::ReorderSections,
            Edit::Remove {
                key: "extracurricular".to_string(),
                reason: "not relevant".to_string(),
            },
        );
        assert!(state.is_removed("extracurricular"));
        assert!(!state.document.has_section("extracurricular"));
        assert!(state.original().has_section("extracurricular"));
    }

    #[test]
    fn test_replace_refuses_shape_change() {
        let mut state = state();
        let before = state.document.clone();
        state.apply_edit(
            StepKind::Summary,
            Edit::Replace {
                key: SKILLS.to_string(),
                section: Section::Summary(vec!["Python".to_string()]),
            },
        );
        assert_eq!(state.document, before);
        assert_eq!(state.warnings.len(), 1);

        state.apply_edit(
            StepKind::Summary,
            Edit::Replace {
                key: SUMMARY.to_string(),
                section: Section::Summary(vec!["Rewritten.".to_string()]),
            },
        );
        assert_eq!(state.document.summary().unwrap(), ["Rewritten.".to_string()]);
    }

    #[test]
    fn test_requirements_are_set_once() {
        let mut state = state();
        let first = JobRequirements {
            role_focus: vec!["analytics".to_string()],
            ..Default::default()
        };
        state.apply_edit(StepKind::ParseJobAd, Edit::SetRequirements(first.clone()));
        state.apply_edit(
            StepKind::ParseJobAd,
            Edit::SetRequirements(JobRequirements::default()),
        );
        assert_eq!(state.requirements(), Some(&first));
        assert_eq!(state.warnings.len(), 1);
    }

    #[test]
    fn test_report_lists_flags_in_step_order() {
        let mut state = state();
        state.mark_complete(StepKind::Summary);
        state.record_change(StepKind::Summary, "rewrote summary");
        let report = state.report();
        assert_eq!(report.steps.len(), 3);
        assert!(report.steps[1].completed);
        assert_eq!(report.steps[1].flag, "summary_updated");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"]["state"], "idle");
        assert_eq!(json["changes"][0]["step"], "summary");
    }
}
