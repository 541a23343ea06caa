//! Runs the ordered step list over one document.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::llm_client::structured::{FallbackRegistry, ResponseParser};
use crate::llm_client::ModelClient;
use crate::models::document::Document;
use crate::models::requirements::JobRequirements;
use crate::pipeline::run_state::{PipelineStatus, RunState};
use crate::pipeline::step::{ModelGateway, SectionTransform, StepKind, TransformContext};
use crate::pipeline::validator::validate;
use crate::tailoring;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job advertisement is empty")]
    MissingJobAd,

    #[error("document has no sections")]
    EmptyDocument,
}

pub type SkipPredicate = fn(&RunState, StepKind) -> bool;

/// Default skip rule: the step's own section was removed earlier in the run.
pub fn skip_when_target_removed(state: &RunState, kind: StepKind) -> bool {
    kind.target_section()
        .is_some_and(|key| state.is_removed(key))
}

fn never_skip(_: &RunState, _: StepKind) -> bool {
    false
}

pub enum StepAction {
    Transform(Arc<dyn SectionTransform>),
    Validate,
}

pub struct Step {
    pub kind: StepKind,
    pub action: StepAction,
    pub skip_when: SkipPredicate,
}

pub struct Pipeline {
    steps: Vec<Step>,
    gateway: ModelGateway,
    settings: PipelineConfig,
}

impl Pipeline {
    /// Job-ad parsing, then the configured transforms, then validation.
    pub fn new(client: Arc<dyn ModelClient>, settings: PipelineConfig) -> Self {
        let transforms: Vec<Arc<dyn SectionTransform>> = std::iter::once(StepKind::ParseJobAd)
            .chain(settings.sequence.iter().copied())
            .filter_map(tailoring::build_transform)
            .collect();
        Self::with_transforms(client, settings, transforms)
    }

    /// Builds a pipeline from explicit transforms; validation is appended.
    pub fn with_transforms(
        client: Arc<dyn ModelClient>,
        settings: PipelineConfig,
        transforms: Vec<Arc<dyn SectionTransform>>,
    ) -> Self {
        let mut registry = FallbackRegistry::default();
        let mut steps = Vec::with_capacity(transforms.len() + 1);

        for transform in transforms {
            if let Some((context, default)) = transform.fallback() {
                registry.register(context, default);
            }
            steps.push(Step {
                kind: transform.step(),
                action: StepAction::Transform(transform),
                skip_when: skip_when_target_removed,
            });
        }
        steps.push(Step {
            kind: StepKind::Validate,
            action: StepAction::Validate,
            skip_when: never_skip,
        });

        let gateway = ModelGateway::new(
            client,
            ResponseParser::new(registry),
            settings.model_timeout,
        );
        Self {
            steps,
            gateway,
            settings,
        }
    }

    pub fn step_kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }

    /// Runs every step in order. Only input problems are `Err`; step
    /// failures are recorded on the returned state.
    pub async fn run(&self, document: Document, job_ad: &str) -> Result<RunState, PipelineError> {
        if job_ad.trim().is_empty() {
            return Err(PipelineError::MissingJobAd);
        }
        if document.sections.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        let mut state = RunState::new(document, job_ad.to_string(), &self.step_kinds());
        info!(
            "Starting tailoring run {} ({} steps)",
            state.run_id,
            self.steps.len()
        );

        for (index, step) in self.steps.iter().enumerate() {
            state.status = PipelineStatus::Running { step_index: index };

            if (step.skip_when)(&state, step.kind) {
                info!("Skipping {}: its section was removed", step.kind);
                state.record_change(step.kind, "skipped: section removed");
                state.mark_complete(step.kind);
                continue;
            }

            match &step.action {
                StepAction::Transform(transform) => {
                    self.run_transform(&mut state, step.kind, transform.as_ref())
                        .await
                }
                StepAction::Validate => run_validation(&mut state),
            }
            state.mark_complete(step.kind);
        }

        state.status = if state.errors.is_empty() {
            PipelineStatus::Completed
        } else {
            PipelineStatus::CompletedWithErrors
        };
        info!(
            "Run {} finished: {} errors, {} warnings",
            state.run_id,
            state.errors.len(),
            state.warnings.len()
        );
        Ok(state)
    }

    async fn run_transform(
        &self,
        state: &mut RunState,
        kind: StepKind,
        transform: &dyn SectionTransform,
    ) {
        info!("Running {}", kind);
        let no_requirements = JobRequirements::default();
        let outcome = {
            let ctx = TransformContext {
                document: &state.document,
                original: state.original(),
                vocabulary: state.vocabulary(),
                requirements: state.requirements().unwrap_or(&no_requirements),
                job_ad: &state.job_ad,
                settings: &self.settings,
                gateway: &self.gateway,
            };
            transform.apply(&ctx).await
        };

        match outcome {
            Ok(output) => {
                for warning in output.warnings {
                    warn!("{}: {}", kind, warning);
                    state.record_warning(warning);
                }
                for edit in output.edits {
                    state.apply_edit(kind, edit);
                }
                state.record_change(kind, output.summary);
            }
            Err(err) if err.is_hard() => {
                error!("{} failed, keeping section unchanged: {}", kind, err);
                state.record_error(format!("Error in {kind}: {err}"));
                state.record_change(kind, "unchanged: model call failed");
            }
            Err(err) => {
                warn!("{} produced no usable output, keeping section unchanged: {}", kind, err);
                state.record_warning(format!("{kind}: {err}; section left unchanged"));
                state.record_change(kind, "unchanged: unusable model response");
            }
        }
    }
}

fn run_validation(state: &mut RunState) {
    let report = validate(&state.document);
    let summary = format!(
        "{} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );
    info!("Validation finished: {}", summary);
    for e in report.errors {
        state.record_error(e);
    }
    for w in report.warnings {
        state.record_warning(w);
    }
    state.record_change(StepKind::Validate, summary);
}
