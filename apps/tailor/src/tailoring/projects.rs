//! Project selection: the model picks and rewrites, the configured cap
//! bounds how many survive.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::llm_client::prompts::{system_prompt, SCHEMA_INSTRUCTION, TRUTHFULNESS_INSTRUCTION};
use crate::models::document::{Section, PROJECTS};
use crate::models::entries::ProjectEntry;
use crate::models::requirements::{loose_string, string_or_list};
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::prompts::{PROJECTS_SYSTEM, PROJECTS_TEMPLATE};
use crate::tailoring::{normalize, prompt_json, requirements_block};

pub struct ProjectsTailor;

#[derive(Debug, Deserialize)]
struct ProjectsProposal {
    #[serde(alias = "projects", alias = "selected_projects")]
    tailored_projects: Vec<ProposedProject>,
    #[serde(default, deserialize_with = "loose_string")]
    changes_summary: String,
}

#[derive(Debug, Deserialize)]
struct ProposedProject {
    #[serde(default, deserialize_with = "loose_string")]
    name: String,
    #[serde(default, deserialize_with = "loose_string")]
    summary: String,
    #[serde(default, deserialize_with = "string_or_list")]
    highlights: Vec<String>,
}

#[async_trait]
impl SectionTransform for ProjectsTailor {
    fn step(&self) -> StepKind {
        StepKind::Projects
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let entries = match ctx.document.projects() {
            Some(entries) => entries,
            None if !ctx.document.has_section(PROJECTS) => {
                return Ok(TransformOutput::new("no projects section"))
            }
            None => {
                return Ok(TransformOutput::new("projects left unchanged")
                    .with_warning("projects: entries do not match the expected schema; left unchanged"))
            }
        };
        let cap = ctx.settings.projects_cap;

        let prompt = PROJECTS_TEMPLATE
            .replace("{projects}", &prompt_json(entries))
            .replace("{requirements}", &requirements_block(ctx.requirements))
            .replace("{cap}", &cap.to_string());
        let prompt = format!("{prompt}\n\n{TRUTHFULNESS_INSTRUCTION}\n{SCHEMA_INSTRUCTION}");

        let parsed = ctx
            .request::<ProjectsProposal>(StepKind::Projects, &system_prompt(PROJECTS_SYSTEM), &prompt)
            .await?;
        let proposal = parsed.value;

        let mut used = BTreeSet::new();
        let mut selected = Vec::new();
        for project in proposal.tailored_projects {
            let name = normalize(&project.name);
            let Some(index) = (0..entries.len())
                .find(|i| !used.contains(i) && normalize(&entries[*i].name) == name)
            else {
                info!("dropped project not in the CV: {}", project.name);
                continue;
            };
            used.insert(index);

            let entry = &entries[index];
            let summary = match project.summary.trim() {
                "" => entry.summary.clone(),
                text => Some(text.to_string()),
            };
            let highlights: Vec<String> = project
                .highlights
                .iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect();
            selected.push(ProjectEntry {
                summary,
                highlights: if highlights.is_empty() {
                    entry.highlights.clone()
                } else {
                    highlights
                },
                ..entry.clone()
            });
        }
        if selected.is_empty() {
            return Err(TransformError::Rejected(
                "no proposed project matches the CV".to_string(),
            ));
        }

        let matched = selected.len();
        selected.extend(
            entries
                .iter()
                .enumerate()
                .filter(|(i, _)| !used.contains(i))
                .map(|(_, entry)| entry.clone()),
        );
        let dropped: Vec<String> = selected
            .split_off(cap.min(selected.len()))
            .into_iter()
            .map(|entry| entry.name)
            .collect();

        let mut summary = if proposal.changes_summary.is_empty() {
            format!("selected {} of {} projects", selected.len(), entries.len())
        } else {
            proposal.changes_summary
        };
        if matched > selected.len() {
            summary.push_str(&format!("; cap of {cap} applied"));
        }
        if !dropped.is_empty() {
            info!("dropped projects: {}", dropped.join(", "));
            summary.push_str(&format!("; dropped: {}", dropped.join(", ")));
        }

        Ok(TransformOutput::new(summary).with_edit(Edit::Replace {
            key: PROJECTS.to_string(),
            section: Section::Projects(selected),
        }))
    }
}
