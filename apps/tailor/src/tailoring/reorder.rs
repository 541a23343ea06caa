//! Section selection and ordering, either proposed by the model or derived
//! from keyword-relevance rules.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::ReorderStrategy;
use crate::llm_client::prompts::system_prompt;
use crate::llm_client::structured::FallbackFn;
use crate::models::document::{
    Document, Section, CERTIFICATIONS, EDUCATION, EXPERIENCE, EXTRACURRICULAR, PROJECTS, SKILLS,
    STANDARD_ORDER, SUMMARY,
};
use crate::models::requirements::{string_or_list, word_tokens, JobRequirements};
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::grounding::collect_strings;
use crate::tailoring::prompts::{REORDER_SYSTEM, REORDER_TEMPLATE};
use crate::tailoring::requirements_block;

/// Sections that must survive every reorder.
const CRITICAL_SECTIONS: [&str; 3] = [SUMMARY, EXPERIENCE, SKILLS];

const DEFAULT_REASON: &str = "not relevant for this role";

pub struct SectionReorder;

#[derive(Debug, Deserialize)]
struct ReorderProposal {
    #[serde(default, alias = "section_order", deserialize_with = "string_or_list")]
    optimized_sections: Vec<String>,
    #[serde(default, deserialize_with = "removal_list")]
    removed_sections: Vec<(String, String)>,
    #[serde(default)]
    reasoning: Value,
}

/// Accepts `["a", "b"]` or `{"a": "reason", ...}`.
fn removal_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<(String, String)>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|key| (key.trim().to_string(), String::new()))
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, reason)| {
                let reason = reason.as_str().unwrap_or_default().to_string();
                (key.trim().to_string(), reason)
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn standard_order() -> Value {
    json!({
        "optimized_sections": STANDARD_ORDER,
        "removed_sections": [],
        "reasoning": {
            SUMMARY: "Standard order - summary first",
            SKILLS: "Skills early to show capabilities",
            EXPERIENCE: "Experience after skills to demonstrate application",
            PROJECTS: "Projects to show practical work",
            EDUCATION: "Education towards the end",
            CERTIFICATIONS: "Certifications after education",
            EXTRACURRICULAR: "Extracurricular activities last"
        }
    })
}

#[async_trait]
impl SectionTransform for SectionReorder {
    fn step(&self) -> StepKind {
        StepKind::ReorderSections
    }

    fn fallback(&self) -> Option<(&'static str, FallbackFn)> {
        Some((StepKind::ReorderSections.context_tag(), standard_order))
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        match ctx.settings.reorder_strategy {
            ReorderStrategy::Model => model_plan(ctx).await,
            ReorderStrategy::Rules => Ok(rule_plan(ctx.document, ctx.requirements)),
        }
    }
}

async fn model_plan(ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
    let sections = ctx
        .document
        .sections
        .iter()
        .map(|(key, section)| format!("- {key}: {} entries", section.entry_count()))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = REORDER_TEMPLATE
        .replace("{sections}", &sections)
        .replace("{requirements}", &requirements_block(ctx.requirements));

    let parsed = ctx
        .request::<ReorderProposal>(
            StepKind::ReorderSections,
            &system_prompt(REORDER_SYSTEM),
            &prompt,
        )
        .await?;
    let proposal = parsed.value;

    let removals = proposal
        .removed_sections
        .into_iter()
        .map(|(key, reason)| {
            let reason = if reason.is_empty() {
                proposal
                    .reasoning
                    .get(&key)
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_REASON)
                    .to_string()
            } else {
                reason
            };
            (key, reason)
        })
        .collect();

    let mut output = plan(ctx.document, &proposal.optimized_sections, removals);
    if parsed.defaulted {
        output = output.with_warning(
            "reorder_sections: model response unusable; applied the standard section order",
        );
    }
    Ok(output)
}

/// Turns a proposed order and removal list into edits. Unknown keys are
/// ignored, critical sections are never removed, and sections the proposal
/// leaves out keep their relative order at the end.
fn plan(document: &Document, proposed: &[String], removals: Vec<(String, String)>) -> TransformOutput {
    let current = document.section_keys();
    let mut warnings = Vec::new();

    let mut removed: Vec<(String, String)> = Vec::new();
    for (key, reason) in removals {
        if !current.contains(&key) || removed.iter().any(|(k, _)| *k == key) {
            debug!("ignoring removal of unknown section '{}'", key);
            continue;
        }
        if CRITICAL_SECTIONS.contains(&key.as_str()) {
            warnings.push(format!("Critical section '{key}' cannot be removed; kept"));
            continue;
        }
        removed.push((key, reason));
    }
    let is_removed = |key: &str| removed.iter().any(|(k, _)| k == key);

    let mut order: Vec<String> = Vec::new();
    for key in proposed.iter().map(|k| k.trim()) {
        if current.iter().any(|k| k == key) && !is_removed(key) && !order.iter().any(|k| k == key) {
            order.push(key.to_string());
        }
    }
    let omitted: Vec<String> = current
        .iter()
        .filter(|k| !is_removed(k) && !order.contains(k))
        .cloned()
        .collect();
    order.extend(omitted);

    if removed.len() * 2 > current.len() {
        warnings.push(format!(
            "Removed {} of {} sections; the CV may be too sparse",
            removed.len(),
            current.len()
        ));
    }

    let mut summary = format!("order: {}", order.join(" → "));
    if !removed.is_empty() {
        let listed: Vec<String> = removed
            .iter()
            .map(|(key, reason)| format!("{key} ({reason})"))
            .collect();
        summary.push_str(&format!("; removed: {}", listed.join(", ")));
    }
    info!("Section plan: {}", summary);

    let mut output = TransformOutput::new(summary);
    for (key, reason) in removed {
        output = output.with_edit(Edit::Remove { key, reason });
    }
    output = output.with_edit(Edit::Reorder(order));
    output.warnings.extend(warnings);
    output
}

// ─── Rule-based strategy ─────────────────────────────────────────────────────

/// Base weight of a section scaled by the share of its words that are job
/// keywords: `base * (1 + 2 * ratio)`.
fn section_score(key: &str, section: &Section, keywords: &BTreeSet<String>) -> f64 {
    let base = match key {
        SUMMARY | EXPERIENCE => 0.9,
        SKILLS => 0.8,
        PROJECTS => 0.7,
        CERTIFICATIONS => 0.6,
        EDUCATION => 0.5,
        "publications" | "awards" => 0.4,
        EXTRACURRICULAR => 0.3,
        _ => 0.5,
    };

    let mut texts = Vec::new();
    if let Ok(value) = serde_yaml::to_value(section) {
        collect_strings(&value, &mut texts);
    }
    let (mut matched, mut total) = (0usize, 0usize);
    for text in &texts {
        let words: BTreeSet<String> = word_tokens(text).into_iter().collect();
        matched += words.iter().filter(|w| keywords.contains(*w)).count();
        total += words.len();
    }
    let ratio = if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    };
    base * (1.0 + ratio * 2.0)
}

fn rule_plan(document: &Document, requirements: &JobRequirements) -> TransformOutput {
    let keywords = requirements.keywords();
    if keywords.is_empty() {
        return TransformOutput::new("section order unchanged").with_warning(
            "reorder_sections: no job requirements available; section order left unchanged",
        );
    }

    let scored: Vec<(String, f64, bool)> = document
        .sections
        .iter()
        .map(|(key, section)| {
            let score = section_score(key, section, &keywords);
            debug!("section '{}' relevance {:.2}", key, score);
            (key.to_string(), score, section.entry_count() == 0)
        })
        .collect();
    let lookup = |key: &str| scored.iter().find(|(k, _, empty)| k == key && !empty);

    let mut order: Vec<String> = Vec::new();
    let take = |key: &str, min_score: f64, order: &mut Vec<String>| {
        if let Some((k, score, _)) = lookup(key) {
            if *score > min_score && !order.contains(k) {
                order.push(k.clone());
            }
        }
    };
    take(SUMMARY, f64::MIN, &mut order);
    take(SKILLS, 0.7, &mut order);
    take(EXPERIENCE, f64::MIN, &mut order);
    take(PROJECTS, 0.6, &mut order);
    take(SKILLS, f64::MIN, &mut order);

    let mut rest: Vec<&(String, f64, bool)> = scored
        .iter()
        .filter(|(k, score, empty)| !empty && *score > 0.4 && !order.contains(k))
        .collect();
    rest.sort_by(|a, b| b.1.total_cmp(&a.1));
    order.extend(rest.into_iter().map(|(k, _, _)| k.clone()));

    let industry = requirements.industry_domain.to_lowercase();
    let experience_count = document.experience().map_or(0, |entries| entries.len());
    let removals = scored
        .iter()
        .filter_map(|(key, score, empty)| {
            let score = *score;
            let reason = match key.as_str() {
                _ if *empty => "Section is empty".to_string(),
                EDUCATION if experience_count >= 4 && score < 0.6 => {
                    "Extensive experience makes education less critical".to_string()
                }
                CERTIFICATIONS if score < 0.4 => "Certifications not relevant to this role".to_string(),
                EXTRACURRICULAR
                    if ["senior", "lead", "principal"]
                        .iter()
                        .any(|s| industry.contains(s))
                        || score < 0.5 =>
                {
                    "Extracurricular activities less relevant".to_string()
                }
                "publications"
                    if !["research", "academic", "science"]
                        .iter()
                        .any(|s| industry.contains(s)) =>
                {
                    "Publications not relevant for a non-research role".to_string()
                }
                "awards" if score < 0.5 => "Awards not relevant to this role".to_string(),
                _ if score < 0.3 => format!("Low relevance score ({score:.1}) for this role"),
                _ => return None,
            };
            Some((key.clone(), reason))
        })
        .collect();

    let mut output = plan(document, &order, removals);
    output.summary = format!("rule-based {}", output.summary);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::PipelineConfig;
    use crate::pipeline::testing::{
        run_transform, sample_document, sample_requirements, ScriptedModel,
    };

    async fn run_with(reply: Value) -> TransformOutput {
        let model = Arc::new(ScriptedModel::new().reply_json("reorder_sections", reply));
        run_transform(&SectionReorder, model, &sample_document(), &PipelineConfig::default())
            .await
            .unwrap()
    }

    fn order_of(output: &TransformOutput) -> Vec<String> {
        output
            .edits
            .iter()
            .find_map(|edit| match edit {
                Edit::Reorder(order) => Some(order.clone()),
                _ => None,
            })
            .expect("reorder edit")
    }

    #[tokio::test]
    async fn test_model_order_and_removal() {
        let output = run_with(json!({
            "optimized_sections": ["professional_summary", "skills", "experience", "projects",
                "education", "certifications"],
            "removed_sections": ["extracurricular"],
            "reasoning": {"extracurricular": "hobbies add nothing here"}
        }))
        .await;

        assert_eq!(
            output.edits[0],
            Edit::Remove {
                key: EXTRACURRICULAR.to_string(),
                reason: "hobbies add nothing here".to_string()
            }
        );
        assert_eq!(order_of(&output)[..2], [SUMMARY.to_string(), SKILLS.to_string()]);
        assert!(output.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_critical_sections_are_never_removed() {
        let output = run_with(json!({
            "optimized_sections": ["experience"],
            "removed_sections": {"skills": "too generic", "publications": "none"}
        }))
        .await;

        assert!(!output
            .edits
            .iter()
            .any(|edit| matches!(edit, Edit::Remove { .. })));
        assert_eq!(
            output.warnings,
            vec!["Critical section 'skills' cannot be removed; kept".to_string()]
        );
    }

    #[tokio::test]
    async fn test_omitted_sections_keep_relative_order() {
        let output = run_with(json!({"optimized_sections": ["skills", "professional_summary"]})).await;
        assert_eq!(
            order_of(&output),
            vec![
                SKILLS,
                SUMMARY,
                EXPERIENCE,
                PROJECTS,
                EDUCATION,
                CERTIFICATIONS,
                EXTRACURRICULAR
            ]
        );
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back_to_standard_order() {
        let model = Arc::new(ScriptedModel::new().reply("reorder_sections", "I would rather not."));
        let output =
            run_transform(&SectionReorder, model, &sample_document(), &PipelineConfig::default())
                .await
                .unwrap();

        assert_eq!(
            order_of(&output),
            vec![
                SUMMARY,
                SKILLS,
                EXPERIENCE,
                PROJECTS,
                EDUCATION,
                CERTIFICATIONS,
                EXTRACURRICULAR
            ]
        );
        assert_eq!(output.warnings.len(), 1);
        assert!(output.warnings[0].contains("standard section order"));
    }

    #[tokio::test]
    async fn test_rules_strategy_needs_no_model() {
        let model = Arc::new(ScriptedModel::new());
        let settings = PipelineConfig {
            reorder_strategy: ReorderStrategy::Rules,
            ..Default::default()
        };
        let output = run_transform(&SectionReorder, model.clone(), &sample_document(), &settings)
            .await
            .unwrap();

        assert!(model.calls().is_empty());
        assert!(matches!(
            &output.edits[0],
            Edit::Remove { key, .. } if key == EXTRACURRICULAR
        ));
        assert_eq!(
            order_of(&output),
            vec![SUMMARY, SKILLS, EXPERIENCE, PROJECTS, EDUCATION, CERTIFICATIONS]
        );
        assert!(output.summary.starts_with("rule-based order:"));
    }

    #[test]
    fn test_rules_without_requirements_change_nothing() {
        let output = rule_plan(&sample_document(), &JobRequirements::default());
        assert!(output.edits.is_empty());
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_keyword_matches_raise_the_score() {
        let doc = sample_document();
        let keywords = sample_requirements().keywords();
        let skills = section_score(SKILLS, doc.section(SKILLS).unwrap(), &keywords);
        let certifications =
            section_score(CERTIFICATIONS, doc.section(CERTIFICATIONS).unwrap(), &keywords);
        assert!(skills > 0.8);
        assert!((certifications - 0.6).abs() < 1e-9);
    }
}
