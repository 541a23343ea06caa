//! Experience reordering and highlight rewriting.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::llm_client::prompts::{system_prompt, SCHEMA_INSTRUCTION, TRUTHFULNESS_INSTRUCTION};
use crate::models::document::{Section, EXPERIENCE};
use crate::models::entries::ExperienceEntry;
use crate::models::requirements::{loose_string, string_or_list};
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::grounding::Vocabulary;
use crate::tailoring::prompts::{EXPERIENCE_SYSTEM, EXPERIENCE_TEMPLATE};
use crate::tailoring::{normalize, prompt_json, requirements_block};

pub struct ExperienceTailor;

#[derive(Debug, Deserialize)]
struct ExperienceProposal {
    #[serde(alias = "experience", alias = "tailored_experience")]
    reordered_experience: Vec<ProposedRole>,
    #[serde(default, deserialize_with = "loose_string")]
    changes_summary: String,
}

#[derive(Debug, Deserialize)]
struct ProposedRole {
    #[serde(default, deserialize_with = "loose_string")]
    company: String,
    #[serde(default, deserialize_with = "loose_string")]
    position: String,
    #[serde(default, deserialize_with = "string_or_list")]
    highlights: Vec<String>,
}

/// Finds the entry a proposal refers to: same company and position, or
/// failing that the only unused entry at that company.
fn match_entry(entries: &[ExperienceEntry], used: &BTreeSet<usize>, proposal: &ProposedRole) -> Option<usize> {
    let company = normalize(&proposal.company);
    let position = normalize(&proposal.position);
    let unused = || (0..entries.len()).filter(move |i| !used.contains(i));

    if let Some(exact) = unused().find(|&i| {
        normalize(&entries[i].company) == company && normalize(&entries[i].position) == position
    }) {
        return Some(exact);
    }
    let mut same_company = unused().filter(|&i| normalize(&entries[i].company) == company);
    match (same_company.next(), same_company.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Keeps proposed highlights that name no unknown technology. Falls back to
/// the entry's own highlights when nothing survives.
fn grounded_highlights(
    vocabulary: &Vocabulary,
    entry: &ExperienceEntry,
    proposed: Vec<String>,
    notes: &mut Vec<String>,
) -> Vec<String> {
    let mut kept = Vec::new();
    for highlight in proposed {
        let highlight = highlight.trim().to_string();
        if highlight.is_empty() {
            continue;
        }
        let unsupported = vocabulary.unsupported_technologies(&highlight);
        if unsupported.is_empty() {
            kept.push(highlight);
        } else {
            info!(
                "dropped {} highlight naming {}: {}",
                entry.company,
                unsupported.join(", "),
                highlight
            );
            notes.push(format!(
                "dropped a {} highlight naming {}",
                entry.company,
                unsupported.join(", ")
            ));
        }
    }
    if kept.is_empty() {
        entry.highlights.clone()
    } else {
        kept
    }
}

#[async_trait]
impl SectionTransform for ExperienceTailor {
    fn step(&self) -> StepKind {
        StepKind::Experience
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let entries = match ctx.document.experience() {
            Some(entries) => entries,
            None if !ctx.document.has_section(EXPERIENCE) => {
                return Ok(TransformOutput::new("no experience section"))
            }
            None => {
                return Ok(TransformOutput::new("experience left unchanged")
                    .with_warning("experience: entries do not match the expected schema; left unchanged"))
            }
        };

        let prompt = EXPERIENCE_TEMPLATE
            .replace("{experience}", &prompt_json(entries))
            .replace("{requirements}", &requirements_block(ctx.requirements));
        let prompt = format!("{prompt}\n\n{TRUTHFULNESS_INSTRUCTION}\n{SCHEMA_INSTRUCTION}");

        let parsed = ctx
            .request::<ExperienceProposal>(
                StepKind::Experience,
                &system_prompt(EXPERIENCE_SYSTEM),
                &prompt,
            )
            .await?;
        let proposal = parsed.value;
        if proposal.reordered_experience.is_empty() {
            return Err(TransformError::Rejected(
                "experience proposal was empty".to_string(),
            ));
        }

        let mut used = BTreeSet::new();
        let mut tailored = Vec::with_capacity(entries.len());
        let mut notes = Vec::new();
        for role in proposal.reordered_experience {
            let Some(index) = match_entry(entries, &used, &role) else {
                info!(
                    "dropped experience entry not in the CV: {} / {}",
                    role.company, role.position
                );
                notes.push(format!("ignored unknown role {} at {}", role.position, role.company));
                continue;
            };
            used.insert(index);
            let entry = &entries[index];
            tailored.push(ExperienceEntry {
                highlights: grounded_highlights(ctx.vocabulary, entry, role.highlights, &mut notes),
                ..entry.clone()
            });
        }

        let omitted = entries.len() - used.len();
        tailored.extend(
            entries
                .iter()
                .enumerate()
                .filter(|(i, _)| !used.contains(i))
                .map(|(_, entry)| entry.clone()),
        );

        let mut summary = if proposal.changes_summary.is_empty() {
            format!("tailored {} roles", used.len())
        } else {
            proposal.changes_summary
        };
        if omitted > 0 {
            notes.push(format!("{omitted} roles kept unchanged at the end"));
        }
        if !notes.is_empty() {
            summary.push_str(&format!("; {}", notes.join("; ")));
        }

        Ok(TransformOutput::new(summary).with_edit(Edit::Replace {
            key: EXPERIENCE.to_string(),
            section: Section::Experience(tailored),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::PipelineConfig;
    use crate::pipeline::testing::{run_transform, sample_document, ScriptedModel};

    async fn tailored(reply: serde_json::Value) -> (Vec<ExperienceEntry>, TransformOutput) {
        let model = Arc::new(ScriptedModel::new().reply_json("tailor_experience", reply));
        let output =
            run_transform(&ExperienceTailor, model, &sample_document(), &PipelineConfig::default())
                .await
                .unwrap();
        match &output.edits[0] {
            Edit::Replace {
                section: Section::Experience(entries),
                ..
            } => (entries.clone(), output.clone()),
            other => panic!("unexpected edit {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reorders_and_rewrites_highlights_only() {
        let (entries, _) = tailored(json!({
            "reordered_experience": [
                {"company": "Globex", "position": "Test Engineer",
                 "highlights": ["Validated billing data with SQL checks"]},
                {"company": "ACME Analytics", "position": "Senior Data Scientist",
                 "highlights": ["Automated finance reporting with Python and SQL"]}
            ],
            "changes_summary": "Led with testing role"
        }))
        .await;

        let original = sample_document();
        let acme = &original.experience().unwrap()[0];
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].company, "Globex");
        assert_eq!(entries[1].position, "Data Tech");
        assert_eq!(entries[1].start_date, acme.start_date);
        assert_eq!(entries[1].location, acme.location);
        assert_eq!(
            entries[1].highlights,
            vec!["Automated finance reporting with Python and SQL"]
        );
    }

    #[tokio::test]
    async fn test_unknown_roles_dropped_and_omitted_roles_appended() {
        let (entries, output) = tailored(json!({
            "reordered_experience": [
                {"company": "Initech", "position": "Analyst", "highlights": ["Made it up"]},
                {"company": "Acme Analytics", "position": "Data Tech",
                 "highlights": ["Used Python and SQL daily"]}
            ]
        }))
        .await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].company, "Acme Analytics");
        assert_eq!(entries[1], sample_document().experience().unwrap()[1]);
        assert!(output.summary.contains("ignored unknown role Analyst at Initech"));
        assert!(output.summary.contains("1 roles kept unchanged"));
    }

    #[tokio::test]
    async fn test_ungrounded_highlights_fall_back_to_originals() {
        let (entries, output) = tailored(json!({
            "reordered_experience": [
                {"company": "Acme Analytics", "position": "Data Tech",
                 "highlights": ["Ran Kubernetes clusters on AWS"]}
            ]
        }))
        .await;

        let original = sample_document();
        assert_eq!(entries[0].highlights, original.experience().unwrap()[0].highlights);
        assert!(output.summary.contains("highlight naming kubernetes"));
    }

    #[tokio::test]
    async fn test_empty_proposal_is_rejected() {
        let model = Arc::new(
            ScriptedModel::new().reply_json("tailor_experience", json!({"reordered_experience": []})),
        );
        let err = run_transform(&ExperienceTailor, model, &sample_document(), &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Rejected(_)));
    }
}
