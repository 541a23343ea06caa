//! Skills tailoring with hallucination filtering.
//!
//! Every proposed token must be grounded in the master CV. Categories the
//! model dropped give their tokens back, either to a surviving category with
//! a similar label or under their original label.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use serde_yaml::Mapping;
use tracing::info;

use crate::llm_client::prompts::{system_prompt, TRUTHFULNESS_INSTRUCTION};
use crate::models::document::{Document, Section, SKILLS};
use crate::models::entries::SkillEntry;
use crate::models::requirements::loose_string;
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::grounding::{split_skill_list, Vocabulary};
use crate::tailoring::prompts::{SKILLS_SYSTEM, SKILLS_TEMPLATE};
use crate::tailoring::{normalize, prompt_json, requirements_block};

pub struct SkillsTailor;

#[derive(Debug, Deserialize)]
struct SkillsProposal {
    #[serde(alias = "skills")]
    tailored_skills: Vec<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    changes_summary: String,
}

#[derive(Debug, Clone, PartialEq)]
struct ProposedCategory {
    label: String,
    details: String,
}

/// Reads `{"label", "details"}` objects (details may be a list) and
/// `"Label: a, b"` strings.
fn proposed_category(value: &Value) -> Option<ProposedCategory> {
    match value {
        Value::String(text) => {
            let (label, details) = text.split_once(':').unwrap_or(("", text.as_str()));
            Some(ProposedCategory {
                label: label.trim().to_string(),
                details: details.trim().to_string(),
            })
        }
        Value::Object(map) => {
            let label = map
                .get("label")
                .or_else(|| map.get("category"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let details = match map.get("details").or_else(|| map.get("skills")) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => String::new(),
            };
            Some(ProposedCategory {
                label: label.trim().to_string(),
                details,
            })
        }
        _ => None,
    }
}

fn label_words(label: &str) -> BTreeSet<String> {
    label
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !matches!(*w, "and" | "the" | "skills"))
        .map(str::to_string)
        .collect()
}

/// Merges the proposal with the CV's categories.
fn reconcile(
    original: &[SkillEntry],
    proposed: Vec<ProposedCategory>,
    vocabulary: &Vocabulary,
    notes: &mut Vec<String>,
) -> Vec<SkillEntry> {
    let mut seen = BTreeSet::new();
    let mut categories: Vec<(SkillEntry, Vec<String>)> = Vec::new();

    for category in proposed {
        let label = if category.label.is_empty() {
            "Skills".to_string()
        } else {
            category.label
        };
        let mut tokens = Vec::new();
        for token in split_skill_list(&category.details) {
            if !vocabulary.is_grounded(&token) {
                info!("removed hallucinated skill: {}", token);
                notes.push(format!("removed hallucinated skill: {token}"));
            } else if seen.insert(token.to_lowercase()) {
                tokens.push(token);
            }
        }

        let key = normalize(&label);
        if let Some((_, existing)) = categories
            .iter_mut()
            .find(|(entry, _)| normalize(&entry.label) == key)
        {
            existing.extend(tokens);
            continue;
        }
        let entry = original
            .iter()
            .find(|entry| normalize(&entry.label) == key)
            .cloned()
            .unwrap_or_else(|| SkillEntry {
                label,
                details: String::new(),
                extra: Mapping::new(),
                blank_fields: Mapping::new(),
            });
        categories.push((entry, tokens));
    }

    let kept_labels: BTreeSet<String> = categories
        .iter()
        .filter(|(_, tokens)| !tokens.is_empty())
        .map(|(entry, _)| normalize(&entry.label))
        .collect();
    for dropped in original
        .iter()
        .filter(|entry| !kept_labels.contains(&normalize(&entry.label)))
    {
        let mut leftovers = Vec::new();
        for token in split_skill_list(&dropped.details) {
            if vocabulary.is_grounded(&token) && seen.insert(token.to_lowercase()) {
                leftovers.push(token);
            }
        }
        if leftovers.is_empty() {
            continue;
        }

        let words = label_words(&dropped.label);
        let mut best: Option<(usize, usize)> = None;
        for (index, (entry, tokens)) in categories.iter().enumerate() {
            let shared = label_words(&entry.label).intersection(&words).count();
            if !tokens.is_empty() && shared > 0 && best.map_or(true, |(_, most)| shared > most) {
                best = Some((index, shared));
            }
        }

        match best {
            Some((index, _)) => {
                let target = &mut categories[index];
                notes.push(format!(
                    "moved {} from {} into {}",
                    leftovers.join(", "),
                    dropped.label,
                    target.0.label
                ));
                target.1.extend(leftovers);
            }
            None => {
                notes.push(format!("restored {} ({})", dropped.label, leftovers.join(", ")));
                match categories
                    .iter_mut()
                    .find(|(entry, _)| normalize(&entry.label) == normalize(&dropped.label))
                {
                    Some((_, tokens)) => tokens.extend(leftovers),
                    None => categories.push((dropped.clone(), leftovers)),
                }
            }
        }
    }

    categories
        .into_iter()
        .filter(|(_, tokens)| !tokens.is_empty())
        .map(|(entry, tokens)| SkillEntry {
            details: tokens.join(", "),
            ..entry
        })
        .collect()
}

/// Experience and project highlights, one per line.
fn evidence(document: &Document) -> String {
    let experience = document
        .experience()
        .unwrap_or_default()
        .iter()
        .flat_map(|entry| &entry.highlights);
    let projects = document
        .projects()
        .unwrap_or_default()
        .iter()
        .flat_map(|entry| &entry.highlights);
    experience
        .chain(projects)
        .map(|h| format!("- {h}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl SectionTransform for SkillsTailor {
    fn step(&self) -> StepKind {
        StepKind::Skills
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let entries = match ctx.document.skills() {
            Some(entries) => entries,
            None if !ctx.document.has_section(SKILLS) => {
                return Ok(TransformOutput::new("no skills section"))
            }
            None => {
                return Ok(TransformOutput::new("skills left unchanged")
                    .with_warning("skills: entries do not match the expected schema; left unchanged"))
            }
        };

        let prompt = SKILLS_TEMPLATE
            .replace("{skills}", &prompt_json(entries))
            .replace("{evidence}", &evidence(ctx.document))
            .replace("{requirements}", &requirements_block(ctx.requirements));
        let prompt = format!("{prompt}\n\n{TRUTHFULNESS_INSTRUCTION}");

        let parsed = ctx
            .request::<SkillsProposal>(StepKind::Skills, &system_prompt(SKILLS_SYSTEM), &prompt)
            .await?;
        let proposal = parsed.value;
        let proposed: Vec<ProposedCategory> = proposal
            .tailored_skills
            .iter()
            .filter_map(proposed_category)
            .collect();

        let mut notes = Vec::new();
        let tailored = reconcile(entries, proposed, ctx.vocabulary, &mut notes);
        if tailored.is_empty() {
            return Err(TransformError::Rejected(
                "skills proposal left no grounded skills".to_string(),
            ));
        }

        let mut summary = if proposal.changes_summary.is_empty() {
            format!("tailored {} skill categories", tailored.len())
        } else {
            proposal.changes_summary
        };
        if !notes.is_empty() {
            summary.push_str(&format!("; {}", notes.join("; ")));
        }

        Ok(TransformOutput::new(summary).with_edit(Edit::Replace {
            key: SKILLS.to_string(),
            section: Section::Skills(tailored),
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

    async fn run_with(reply: Value) -> Result<TransformOutput, TransformError> {
        let model = Arc::new(ScriptedModel::new().reply_json("tailor_skills", reply));
        run_transform(&SkillsTailor, model, &sample_document(), &PipelineConfig::default()).await
    }

    fn pairs(output: &TransformOutput) -> Vec<(String, String)> {
        match &output.edits[0] {
            Edit::Replace {
                section: Section::Skills(entries),
                ..
            } => entries
                .iter()
                .map(|e| (e.label.clone(), e.details.clone()))
                .collect(),
            other => panic!("unexpected edit {other:?}"),
        }
    }

    fn pair(label: &str, details: &str) -> (String, String) {
        (label.to_string(), details.to_string())
    }

    #[tokio::test]
    async fn test_hallucinated_skill_is_removed() {
        let output = run_with(json!({"tailored_skills": [
            {"label": "Languages", "details": "Python, SQL, Java"},
            {"label": "Tools", "details": "Git, Excel"}
        ]}))
        .await
        .unwrap();

        assert_eq!(
            pairs(&output),
            vec![pair("Languages", "Python, SQL"), pair("Tools", "Git, Excel")]
        );
        assert!(output.summary.contains("removed hallucinated skill: Java"));
    }

    #[tokio::test]
    async fn test_dropped_categories_are_redistributed_or_restored() {
        let output = run_with(json!({"tailored_skills": [
            {"label": "Core Tools", "details": ["Excel"]}
        ]}))
        .await
        .unwrap();

        assert_eq!(
            pairs(&output),
            vec![pair("Core Tools", "Excel, Git"), pair("Languages", "Python, SQL")]
        );
        assert!(output.summary.contains("moved Git from Tools into Core Tools"));
        assert!(output.summary.contains("restored Languages (Python, SQL)"));
    }

    #[tokio::test]
    async fn test_string_categories_and_duplicates() {
        let output = run_with(json!({"skills": [
            "Languages: SQL, Python, sql",
            "Tools: Excel, Python"
        ]}))
        .await
        .unwrap();

        assert_eq!(
            pairs(&output),
            vec![pair("Languages", "SQL, Python"), pair("Tools", "Excel")]
        );
    }

    #[tokio::test]
    async fn test_fabricated_category_falls_back_to_original() {
        let doc = Document::from_yaml_str(
            "name: A\nsections:\n  skills:\n    - label: Cloud\n      details: AWS\n",
        )
        .unwrap();
        let model = Arc::new(ScriptedModel::new().reply_json(
            "tailor_skills",
            json!({"tailored_skills": [{"label": "Cloud", "details": "Azure, GCP"}]}),
        ));
        let output = run_transform(&SkillsTailor, model, &doc, &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(pairs(&output), vec![pair("Cloud", "AWS")]);
        assert!(output.summary.contains("removed hallucinated skill: Azure"));
        assert!(output.summary.contains("restored Cloud (AWS)"));
    }

    #[tokio::test]
    async fn test_nothing_left_is_rejected() {
        let doc = Document::from_yaml_str("name: A\nsections:\n  skills:\n    - label: Cloud\n")
            .unwrap();
        let model = Arc::new(
            ScriptedModel::new().reply_json("tailor_skills", json!({"tailored_skills": []})),
        );
        let err = run_transform(&SkillsTailor, model, &doc, &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Rejected(_)));
    }

    #[test]
    fn test_label_words_skip_filler() {
        assert_eq!(
            label_words("Programming Languages & Skills")
                .into_iter()
                .collect::<Vec<_>>(),
            vec!["languages", "programming"]
        );
    }
}
