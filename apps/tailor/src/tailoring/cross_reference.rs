//! Consistency audit across sections. Findings are reported as warnings;
//! the proposed corrections are never applied.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::llm_client::prompts::system_prompt;
use crate::llm_client::structured::FallbackFn;
use crate::models::requirements::string_or_list;
use crate::pipeline::step::{
    SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::prompts::{CROSS_REFERENCE_SYSTEM, CROSS_REFERENCE_TEMPLATE};
use crate::tailoring::{prompt_json, requirements_block};

pub struct CrossReferenceAudit;

#[derive(Debug, Deserialize)]
struct AuditResult {
    #[serde(default, deserialize_with = "string_or_list")]
    issues_found: Vec<String>,
    #[serde(default)]
    corrected_sections: Value,
}

fn audit_unavailable() -> Value {
    json!({
        "corrected_sections": {},
        "issues_found": ["JSON parsing error prevented analysis"]
    })
}

#[async_trait]
impl SectionTransform for CrossReferenceAudit {
    fn step(&self) -> StepKind {
        StepKind::CrossReference
    }

    fn fallback(&self) -> Option<(&'static str, FallbackFn)> {
        Some((StepKind::CrossReference.context_tag(), audit_unavailable))
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let prompt = CROSS_REFERENCE_TEMPLATE
            .replace("{sections}", &prompt_json(&ctx.document.sections))
            .replace("{master}", &prompt_json(&ctx.original.sections))
            .replace("{requirements}", &requirements_block(ctx.requirements));
        let parsed = ctx
            .request::<AuditResult>(
                StepKind::CrossReference,
                &system_prompt(CROSS_REFERENCE_SYSTEM),
                &prompt,
            )
            .await?;
        let audit = parsed.value;

        let corrections = audit.corrected_sections.as_object().map_or(0, |map| map.len());
        if corrections > 0 {
            info!("ignoring {} proposed section corrections", corrections);
        }

        let mut summary = format!("found {} issues", audit.issues_found.len());
        if corrections > 0 {
            summary.push_str(&format!("; {corrections} proposed corrections not applied"));
        }
        let mut output = TransformOutput::new(summary);
        for issue in audit.issues_found {
            output = output.with_warning(format!("Cross-reference: {issue}"));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::PipelineConfig;
    use crate::pipeline::testing::{run_transform, sample_document, ScriptedModel};

    #[tokio::test]
    async fn test_issues_become_warnings_and_corrections_are_ignored() {
        let model = Arc::new(ScriptedModel::new().reply_json(
            "cross_reference_check",
            json!({
                "issues_found": ["Excel used in experience but listed only under Tools"],
                "corrected_sections": {"skills": [{"label": "Tools", "details": "Excel"}]}
            }),
        ));
        let output = run_transform(
            &CrossReferenceAudit,
            model,
            &sample_document(),
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        assert!(output.edits.is_empty());
        assert_eq!(
            output.warnings,
            vec!["Cross-reference: Excel used in experience but listed only under Tools"]
        );
        assert_eq!(output.summary, "found 1 issues; 1 proposed corrections not applied");
    }

    #[tokio::test]
    async fn test_prompt_carries_the_master_cv() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply_json("cross_reference_check", json!({"issues_found": []})),
        );
        run_transform(
            &CrossReferenceAudit,
            model.clone(),
            &sample_document(),
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        let prompt = model.last_prompt("cross_reference_check").unwrap();
        let master = prompt.split("Master CV (source of truth):").nth(1).unwrap();
        assert!(master.contains("Acme Analytics"));
        assert!(!prompt.contains("{master}"));
    }

    #[tokio::test]
    async fn test_unparseable_audit_uses_fallback() {
        let model =
            Arc::new(ScriptedModel::new().reply("cross_reference_check", "Everything looks fine!"));
        let output = run_transform(
            &CrossReferenceAudit,
            model,
            &sample_document(),
            &PipelineConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            output.warnings,
            vec!["Cross-reference: JSON parsing error prevented analysis"]
        );
    }
}
