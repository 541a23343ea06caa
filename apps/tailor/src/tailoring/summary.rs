//! Professional summary rewrite.
//!
//! The model's proposal is accepted sentence by sentence: a sentence that
//! names a technology the CV never mentions is dropped, and an overlong
//! result is cut back to its opening sentences.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::llm_client::prompts::{system_prompt, TRUTHFULNESS_INSTRUCTION};
use crate::models::document::{Section, EDUCATION, EXPERIENCE, PROJECTS, SKILLS, SUMMARY};
use crate::models::requirements::string_or_list;
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::grounding::{contains_phrase, technology_mentions};
use crate::tailoring::prompts::{SUMMARY_SYSTEM, SUMMARY_TEMPLATE};
use crate::tailoring::text_metrics::{
    clamp_summary, split_sentences, TextMetrics, CLAMP_KEEP_SENTENCES, CLAMP_WORDS,
};
use crate::tailoring::{requirements_block, section_json};

pub struct SummaryTailor;

#[derive(Debug, Deserialize)]
struct SummaryProposal {
    #[serde(
        alias = "new_summary",
        alias = "tailored_summary",
        deserialize_with = "string_or_list"
    )]
    professional_summary: Vec<String>,
}

#[async_trait]
impl SectionTransform for SummaryTailor {
    fn step(&self) -> StepKind {
        StepKind::Summary
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let current = match ctx.document.summary() {
            Some(items) => items,
            None if !ctx.document.has_section(SUMMARY) => {
                return Ok(TransformOutput::new("no professional summary section"))
            }
            None => {
                return Ok(TransformOutput::new("summary left unchanged")
                    .with_warning("summary: professional_summary is not a list of strings; left unchanged"))
            }
        };

        let prompt = SUMMARY_TEMPLATE
            .replace("{summary}", &current.join(" "))
            .replace("{skills}", &section_json(ctx.document, SKILLS))
            .replace("{experience}", &section_json(ctx.document, EXPERIENCE))
            .replace("{projects}", &section_json(ctx.document, PROJECTS))
            .replace("{education}", &section_json(ctx.document, EDUCATION))
            .replace("{requirements}", &requirements_block(ctx.requirements));
        let prompt = format!("{prompt}\n\n{TRUTHFULNESS_INSTRUCTION}");

        let parsed = ctx
            .request::<SummaryProposal>(StepKind::Summary, &system_prompt(SUMMARY_SYSTEM), &prompt)
            .await?;

        let mut notes = Vec::new();
        let mut items = Vec::new();
        for item in parsed.value.professional_summary {
            let mut kept = Vec::new();
            for sentence in split_sentences(&item) {
                let unsupported = ctx.vocabulary.unsupported_technologies(&sentence);
                if unsupported.is_empty() {
                    kept.push(sentence);
                } else {
                    info!(
                        "dropped summary sentence naming {}: {}",
                        unsupported.join(", "),
                        sentence
                    );
                    notes.push(format!("dropped a sentence naming {}", unsupported.join(", ")));
                }
            }
            if !kept.is_empty() {
                items.push(kept.join(" "));
            }
        }
        if items.is_empty() {
            return Err(TransformError::Rejected(
                "summary proposal contained no usable sentences".to_string(),
            ));
        }

        let proposed = TextMetrics::measure(&items);
        if proposed.needs_clamp() {
            items = clamp_summary(&items);
            notes.push(format!(
                "trimmed to {CLAMP_KEEP_SENTENCES} sentences, {CLAMP_WORDS} words at most (was {} words, {} sentences)",
                proposed.words, proposed.sentences
            ));
        }

        let skills_text = ctx
            .document
            .skills()
            .unwrap_or_default()
            .iter()
            .map(|entry| format!("{} {}", entry.label, entry.details))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let warnings: Vec<String> = technology_mentions(&items.join(" "))
            .into_iter()
            .filter(|term| !contains_phrase(&skills_text, term))
            .map(|term| {
                format!(
                    "Summary-Skills alignment: '{term}' mentioned in summary but not found in skills section"
                )
            })
            .collect();

        let metrics = TextMetrics::measure(&items);
        let mut summary = format!(
            "rewrote summary: {} words, {} sentences",
            metrics.words, metrics.sentences
        );
        if !notes.is_empty() {
            summary.push_str(&format!("; {}", notes.join("; ")));
        }

        let mut output = TransformOutput::new(summary).with_edit(Edit::Replace {
            key: SUMMARY.to_string(),
            section: Section::Summary(items),
        });
        output.warnings = warnings;
        Ok(output)
    }
}
