//! Optional Australian English spelling pass over the prose fields.
//!
//! One model call converts every summary sentence, highlight and project
//! summary. A conversion is taken only when it changes spelling and nothing
//! else: same word count, and each changed word stays within a couple of
//! letters of the original.

use async_trait::async_trait;
use serde::Deserialize;
use strsim::levenshtein;
use tracing::info;

use crate::llm_client::prompts::system_prompt;
use crate::models::document::{Section, EDUCATION, EXPERIENCE, PROJECTS, SUMMARY};
use crate::models::requirements::string_or_list;
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::prompt_json;
use crate::tailoring::prompts::{AU_ENGLISH_SYSTEM, AU_ENGLISH_TEMPLATE};

/// Spelling variants differ by at most this many edits (centre, programme).
const MAX_SPELLING_EDITS: usize = 2;
/// Shorter words (numbers, acronyms) must come back unchanged.
const MIN_VARIANT_LEN: usize = 4;

pub struct AuEnglish;

#[derive(Debug, Deserialize)]
struct Conversion {
    #[serde(deserialize_with = "string_or_list")]
    converted: Vec<String>,
}

#[async_trait]
impl SectionTransform for AuEnglish {
    fn step(&self) -> StepKind {
        StepKind::AuEnglish
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let doc = ctx.document;
        let mut summary = doc.summary().map(<[String]>::to_vec);
        let mut experience = doc.experience().map(<[_]>::to_vec);
        let mut projects = doc.projects().map(<[_]>::to_vec);
        let mut education = doc.education().map(<[_]>::to_vec);

        let mut slots: Vec<&mut String> = summary
            .iter_mut()
            .flatten()
            .chain(
                experience
                    .iter_mut()
                    .flatten()
                    .flat_map(|entry| entry.highlights.iter_mut()),
            )
            .chain(
                projects
                    .iter_mut()
                    .flatten()
                    .flat_map(|entry| entry.summary.iter_mut().chain(entry.highlights.iter_mut())),
            )
            .chain(
                education
                    .iter_mut()
                    .flatten()
                    .flat_map(|entry| entry.highlights.iter_mut()),
            )
            .filter(|text| !text.trim().is_empty())
            .collect();
        if slots.is_empty() {
            return Ok(TransformOutput::new("no prose to convert"));
        }

        let texts: Vec<&str> = slots.iter().map(|text| text.as_str()).collect();
        let prompt = AU_ENGLISH_TEMPLATE.replace("{texts}", &prompt_json(&texts));
        let parsed = ctx
            .request::<Conversion>(StepKind::AuEnglish, &system_prompt(AU_ENGLISH_SYSTEM), &prompt)
            .await?;
        let converted = parsed.value.converted;
        if converted.len() != slots.len() {
            return Err(TransformError::Rejected(format!(
                "conversion returned {} texts for {}",
                converted.len(),
                slots.len()
            )));
        }

        let total = slots.len();
        let mut changed = 0;
        let mut refused = 0;
        for (slot, proposed) in slots.iter_mut().zip(converted) {
            let proposed = proposed.trim().to_string();
            if proposed == **slot {
                continue;
            }
            if is_spelling_variant(slot.as_str(), &proposed) {
                **slot = proposed;
                changed += 1;
            } else {
                info!("kept original text, conversion changed more than spelling: {}", slot);
                refused += 1;
            }
        }
        drop(slots);

        let mut summary_line = format!("converted {changed} of {total} texts");
        if refused > 0 {
            summary_line.push_str(&format!(
                "; kept {refused} whose conversion changed more than spelling"
            ));
        }
        let mut output = TransformOutput::new(summary_line);

        if let Some(items) = summary.filter(|items| Some(items.as_slice()) != doc.summary()) {
            output = output.with_edit(Edit::Replace {
                key: SUMMARY.to_string(),
                section: Section::Summary(items),
            });
        }
        if let Some(entries) = experience.filter(|e| Some(e.as_slice()) != doc.experience()) {
            output = output.with_edit(Edit::Replace {
                key: EXPERIENCE.to_string(),
                section: Section::Experience(entries),
            });
        }
        if let Some(entries) = projects.filter(|e| Some(e.as_slice()) != doc.projects()) {
            output = output.with_edit(Edit::Replace {
                key: PROJECTS.to_string(),
                section: Section::Projects(entries),
            });
        }
        if let Some(entries) = education.filter(|e| Some(e.as_slice()) != doc.education()) {
            output = output.with_edit(Edit::Replace {
                key: EDUCATION.to_string(),
                section: Section::Education(entries),
            });
        }
        Ok(output)
    }
}

/// True when `after` is `before` with only word spellings changed.
pub fn is_spelling_variant(before: &str, after: &str) -> bool {
    let before: Vec<&str> = before.split_whitespace().collect();
    let after: Vec<&str> = after.split_whitespace().collect();
    before.len() == after.len()
        && before
            .iter()
            .zip(&after)
            .all(|(b, a)| same_word(b, a))
}

fn same_word(before: &str, after: &str) -> bool {
    if before == after {
        return true;
    }
    let (b_lead, b_core, b_tail) = word_parts(before);
    let (a_lead, a_core, a_tail) = word_parts(after);
    if b_lead != a_lead || b_tail != a_tail {
        return false;
    }

    let (b, a) = (b_core.to_lowercase(), a_core.to_lowercase());
    b == a
        || (b.chars().count() >= MIN_VARIANT_LEN
            && b.chars().take(2).eq(a.chars().take(2))
            && levenshtein(&b, &a) <= MAX_SPELLING_EDITS)
}

/// Splits a word into leading punctuation, core and trailing punctuation.
fn word_parts(word: &str) -> (&str, &str, &str) {
    let start = word.len() - word.trim_start_matches(|c: char| !c.is_alphanumeric()).len();
    let rest = &word[start..];
    let core = rest.trim_end_matches(|c: char| !c.is_alphanumeric());
    (&word[..start], core, &rest[core.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::config::PipelineConfig;
    use crate::models::document::Document;
    use crate::pipeline::testing::{run_transform, ScriptedModel};

    fn small_document() -> Document {
        Document::from_yaml_str(
            r#"
name: A
sections:
  professional_summary:
    - Analyst who loves color and data visualization.
  experience:
    - company: Acme
      position: Dev
      highlights:
        - Led a team of 5 to optimize reporting
  skills:
    - label: Tools
      details: Excel
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_spelling_variants() {
        assert!(is_spelling_variant(
            "Organized the center's program (color).",
            "Organised the centre's programme (colour)."
        ));
        assert!(!is_spelling_variant("Grew sales 5%", "Grew sales 8%"));
        assert!(!is_spelling_variant("Increased revenue", "Decreased revenue"));
        assert!(!is_spelling_variant("Used Python", "Used Python daily"));
        assert!(!is_spelling_variant("Built dashboards.", "Built dashboards!"));
    }

    #[tokio::test]
    async fn test_only_spelling_changes_are_applied() {
        let doc = small_document();
        let model = Arc::new(ScriptedModel::new().reply_json(
            "convert_au_english",
            json!({"converted": [
                "Analyst who loves colour and data visualisation.",
                "Led a team of 8 to optimise reporting"
            ]}),
        ));
        let output = run_transform(&AuEnglish, model, &doc, &PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(
            output.edits,
            vec![Edit::Replace {
                key: SUMMARY.to_string(),
                section: Section::Summary(vec![
                    "Analyst who loves colour and data visualisation.".to_string()
                ]),
            }]
        );
        assert_eq!(
            output.summary,
            "converted 1 of 2 texts; kept 1 whose conversion changed more than spelling"
        );
    }

    #[tokio::test]
    async fn test_reply_of_the_wrong_length_is_rejected() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply_json("convert_au_english", json!({"converted": ["only one"]})),
        );
        let err = run_transform(&AuEnglish, model, &small_document(), &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Rejected(message) if message.contains("1 texts for 2")));
    }

    #[tokio::test]
    async fn test_document_without_prose_makes_no_call() {
        let doc = Document::from_yaml_str("name: A\nsections:\n  skills:\n    - label: Tools\n      details: Excel\n")
            .unwrap();
        let model = Arc::new(ScriptedModel::new());
        let output = run_transform(&AuEnglish, model.clone(), &doc, &PipelineConfig::default())
            .await
            .unwrap();
        assert_eq!(output.summary, "no prose to convert");
        assert_eq!(model.call_count("convert_au_english"), 0);
    }
}
