//! Job advertisement → structured requirements.

use async_trait::async_trait;
use tracing::info;

use crate::llm_client::prompts::system_prompt;
use crate::models::requirements::JobRequirements;
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::prompts::{PARSE_JOB_AD_SYSTEM, PARSE_JOB_AD_TEMPLATE};

pub struct JobParser;

#[async_trait]
impl SectionTransform for JobParser {
    fn step(&self) -> StepKind {
        StepKind::ParseJobAd
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let prompt = PARSE_JOB_AD_TEMPLATE.replace("{job_ad}", ctx.job_ad);
        let parsed = ctx
            .request::<JobRequirements>(
                StepKind::ParseJobAd,
                &system_prompt(PARSE_JOB_AD_SYSTEM),
                &prompt,
            )
            .await?;

        let requirements = parsed.value;
        if requirements.is_empty() {
            return Err(TransformError::Rejected(
                "job advertisement analysis returned no requirements".to_string(),
            ));
        }

        info!(
            "Parsed job ad: {} essential requirements, {} key technologies",
            requirements.essential_requirements.len(),
            requirements.key_technologies.len()
        );
        let summary = format!(
            "extracted {} essential requirements and {} key technologies",
            requirements.essential_requirements.len(),
            requirements.key_technologies.len()
        );
        Ok(TransformOutput::new(summary).with_edit(Edit::SetRequirements(requirements)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::PipelineConfig;
    use crate::pipeline::testing::{run_transform, sample_document, ScriptedModel};

    #[tokio::test]
    async fn test_requirements_become_an_edit() {
        let model = Arc::new(ScriptedModel::new().reply(
            "parse_job_ad",
            format!(
                "```json\n{}\n```",
                json!({
                    "essential_requirements": ["Python", "SQL"],
                    "key_technologies": "Python",
                    "preferred_requirements": ["Tableau"],
                    "industry_domain": "finance"
                })
            ),
        ));
        let output = run_transform(&JobParser, model, &sample_document(), &PipelineConfig::default())
            .await
            .unwrap();

        let Edit::SetRequirements(requirements) = &output.edits[0] else {
            panic!("expected requirements edit, got {:?}", output.edits);
        };
        assert_eq!(requirements.key_technologies, vec!["Python"]);
        assert_eq!(requirements.desirable_requirements, vec!["Tableau"]);
        assert_eq!(
            output.summary,
            "extracted 2 essential requirements and 1 key technologies"
        );
    }

    #[tokio::test]
    async fn test_empty_analysis_is_rejected() {
        let model = Arc::new(ScriptedModel::new().reply_json("parse_job_ad", json!({})));
        let err = run_transform(&JobParser, model, &sample_document(), &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Rejected(_)));
        assert!(!err.is_hard());
    }

    #[tokio::test]
    async fn test_call_failure_is_hard() {
        let model = Arc::new(ScriptedModel::new().fail("parse_job_ad"));
        let err = run_transform(&JobParser, model, &sample_document(), &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_hard());
    }
}
