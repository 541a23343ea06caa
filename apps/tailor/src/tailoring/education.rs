//! Education highlights. Entries are matched by position and every field
//! except `highlights` is kept from the CV.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::llm_client::prompts::{system_prompt, SCHEMA_INSTRUCTION, TRUTHFULNESS_INSTRUCTION};
use crate::models::document::{Section, EDUCATION};
use crate::models::entries::{DateField, EducationEntry};
use crate::models::requirements::loose_string;
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::prompts::{EDUCATION_SYSTEM, EDUCATION_TEMPLATE};
use crate::tailoring::{prompt_json, requirements_block};

pub struct EducationTailor;

#[derive(Debug, Deserialize)]
struct EducationProposal {
    #[serde(alias = "education")]
    tailored_education: Vec<ProposedEducation>,
    #[serde(default, deserialize_with = "loose_string")]
    changes_summary: String,
}

#[derive(Debug, Deserialize)]
struct ProposedEducation {
    institution: Option<String>,
    area: Option<String>,
    degree: Option<String>,
    start_date: Option<DateField>,
    end_date: Option<DateField>,
    highlights: Option<Vec<String>>,
}

/// Names of the immutable fields the proposal tried to change, with the
/// attempted value.
fn rejected_changes(entry: &EducationEntry, proposal: &ProposedEducation) -> Vec<String> {
    let mut rejected = Vec::new();
    let mut check = |field: &str, current: String, proposed: Option<String>| {
        if let Some(proposed) = proposed {
            if proposed.trim() != current.trim() {
                rejected.push(format!("{field} '{current}' -> '{proposed}'"));
            }
        }
    };
    check("institution", entry.institution.clone(), proposal.institution.clone());
    check("area", entry.area.clone(), proposal.area.clone());
    check("degree", entry.degree.clone(), proposal.degree.clone());

    let date_text = |date: &Option<DateField>| date.as_ref().map(ToString::to_string);
    check(
        "start_date",
        date_text(&entry.start_date).unwrap_or_default(),
        date_text(&proposal.start_date),
    );
    check(
        "end_date",
        date_text(&entry.end_date).unwrap_or_default(),
        date_text(&proposal.end_date),
    );
    rejected
}

#[async_trait]
impl SectionTransform for EducationTailor {
    fn step(&self) -> StepKind {
        StepKind::Education
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let entries = match ctx.document.education() {
            Some(entries) => entries,
            None if !ctx.document.has_section(EDUCATION) => {
                return Ok(TransformOutput::new("no education section"))
            }
            None => {
                return Ok(TransformOutput::new("education left unchanged")
                    .with_warning("education: entries do not match the expected schema; left unchanged"))
            }
        };
        let limit = ctx.settings.education_highlight_limit;

        let prompt = EDUCATION_TEMPLATE
            .replace("{education}", &prompt_json(entries))
            .replace("{requirements}", &requirements_block(ctx.requirements))
            .replace("{limit}", &limit.to_string());
        let prompt = format!("{prompt}\n\n{TRUTHFULNESS_INSTRUCTION}\n{SCHEMA_INSTRUCTION}");

        let parsed = ctx
            .request::<EducationProposal>(
                StepKind::Education,
                &system_prompt(EDUCATION_SYSTEM),
                &prompt,
            )
            .await?;
        let proposal = parsed.value;

        if proposal.tailored_education.len() > entries.len() {
            info!(
                "ignoring {} extra education entries in the proposal",
                proposal.tailored_education.len() - entries.len()
            );
        }

        let mut notes = Vec::new();
        let mut updated = 0;
        let mut tailored = entries.to_vec();
        for (index, (entry, proposed)) in tailored
            .iter_mut()
            .zip(&proposal.tailored_education)
            .enumerate()
        {
            for change in rejected_changes(entry, proposed) {
                info!("rejected change to education entry {}: {}", index, change);
                notes.push(format!("kept {change} unchanged"));
            }

            let Some(highlights) = &proposed.highlights else {
                continue;
            };
            let highlights: Vec<String> = highlights
                .iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .take(limit)
                .collect();
            if !highlights.is_empty() && highlights != entry.highlights {
                entry.highlights = highlights;
                updated += 1;
            }
        }

        let mut summary = if proposal.changes_summary.is_empty() {
            format!("updated highlights of {updated} of {} entries", entries.len())
        } else {
            proposal.changes_summary
        };
        if !notes.is_empty() {
            summary.push_str(&format!("; {}", notes.join("; ")));
        }

        Ok(TransformOutput::new(summary).with_edit(Edit::Replace {
            key: EDUCATION.to_string(),
            section: Section::Education(tailored),
        }))
    }
}
