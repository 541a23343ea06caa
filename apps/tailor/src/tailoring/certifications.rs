//! Certification and extracurricular selection. Both sections are plain
//! item lists; the model picks the relevant ones and the CV's own items
//! are kept verbatim.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::llm_client::prompts::system_prompt;
use crate::models::document::{Section, CERTIFICATIONS, EXTRACURRICULAR};
use crate::models::entries::ListItem;
use crate::models::requirements::{loose_string, word_tokens};
use crate::pipeline::step::{
    Edit, SectionTransform, StepKind, TransformContext, TransformError, TransformOutput,
};
use crate::tailoring::prompts::{
    CERTIFICATIONS_SYSTEM, CERTIFICATIONS_TEMPLATE, EXTRACURRICULAR_SYSTEM,
    EXTRACURRICULAR_TEMPLATE,
};
use crate::tailoring::{normalize, requirements_block};

/// Words too common to make an item relevant on their own.
const STOPWORDS: &[&str] = &[
    "and", "the", "for", "with", "years", "year", "experience", "knowledge", "strong", "skills",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Items the model dropped come back when they mention a job keyword.
    Inclusive,
    /// The model's selection is final.
    Selective,
}

pub struct ListSelection {
    step: StepKind,
    key: &'static str,
    policy: SelectionPolicy,
    system: &'static str,
    template: &'static str,
}

impl ListSelection {
    pub fn certifications() -> Self {
        Self {
            step: StepKind::Certifications,
            key: CERTIFICATIONS,
            policy: SelectionPolicy::Inclusive,
            system: CERTIFICATIONS_SYSTEM,
            template: CERTIFICATIONS_TEMPLATE,
        }
    }

    pub fn extracurricular() -> Self {
        Self {
            step: StepKind::Extracurricular,
            key: EXTRACURRICULAR,
            policy: SelectionPolicy::Selective,
            system: EXTRACURRICULAR_SYSTEM,
            template: EXTRACURRICULAR_TEMPLATE,
        }
    }

    fn wrap(&self, items: Vec<ListItem>) -> Section {
        match self.step {
            StepKind::Extracurricular => Section::Extracurricular(items),
            _ => Section::Certifications(items),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SelectionProposal {
    #[serde(
        alias = "relevant_certifications",
        alias = "relevant_activities",
        alias = "certifications",
        alias = "extracurricular"
    )]
    selected: Vec<Value>,
    #[serde(default, deserialize_with = "loose_string")]
    changes_summary: String,
}

/// Text of one proposed item: a string, or the label/name and details of
/// an object.
fn proposed_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => {
            let field = move |name: &str| map.get(name).and_then(Value::as_str).unwrap_or_default();
            let label = [field("label"), field("name"), field("title")]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or_default();
            match (label, field("details")) {
                ("", "") => None,
                (label, "") => Some(label.to_string()),
                ("", details) => Some(details.to_string()),
                (label, details) => Some(format!("{label}: {details}")),
            }
        }
        _ => None,
    }
}

/// Index of the unused input item a proposed text refers to.
fn match_item(items: &[ListItem], used: &BTreeSet<usize>, proposed: &str) -> Option<usize> {
    let proposed = normalize(proposed);
    let unused = || (0..items.len()).filter(move |i| !used.contains(i));

    unused()
        .find(|&i| {
            normalize(items[i].match_text()) == proposed
                || normalize(&items[i].display_text()) == proposed
        })
        .or_else(|| {
            unused().find(|&i| {
                let own = normalize(items[i].match_text());
                own.len() >= 4 && proposed.contains(&own)
            })
        })
}

fn mentions_keyword(item: &ListItem, keywords: &BTreeSet<String>) -> bool {
    word_tokens(&item.display_text())
        .iter()
        .any(|token| token.len() >= 3 && !STOPWORDS.contains(&token.as_str()) && keywords.contains(token))
}

#[async_trait]
impl SectionTransform for ListSelection {
    fn step(&self) -> StepKind {
        self.step
    }

    async fn apply(&self, ctx: &TransformContext<'_>) -> Result<TransformOutput, TransformError> {
        let items = match ctx.document.list_items(self.key) {
            Some(items) => items,
            None if !ctx.document.has_section(self.key) => {
                return Ok(TransformOutput::new(format!("no {} section", self.key)))
            }
            None => {
                return Ok(TransformOutput::new(format!("{} left unchanged", self.key)).with_warning(
                    format!("{}: items do not match the expected schema; left unchanged", self.key),
                ))
            }
        };
        if items.is_empty() {
            return Ok(TransformOutput::new(format!("{} section is empty", self.key)));
        }

        let listing = items
            .iter()
            .map(|item| format!("- {}", item.display_text()))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = self
            .template
            .replace("{items}", &listing)
            .replace("{requirements}", &requirements_block(ctx.requirements));

        let parsed = ctx
            .request::<SelectionProposal>(self.step, &system_prompt(self.system), &prompt)
            .await?;
        let proposal = parsed.value;

        let mut used = BTreeSet::new();
        let mut kept = Vec::new();
        for text in proposal.selected.iter().filter_map(proposed_text) {
            match match_item(items, &used, &text) {
                Some(index) => {
                    used.insert(index);
                    kept.push(items[index].clone());
                }
                None => info!("ignored {} item not in the CV: {}", self.key, text),
            }
        }

        let mut rekept = Vec::new();
        if self.policy == SelectionPolicy::Inclusive {
            let keywords = ctx.requirements.keywords();
            for (index, item) in items.iter().enumerate() {
                if !used.contains(&index) && mentions_keyword(item, &keywords) {
                    rekept.push(item.display_text());
                    kept.push(item.clone());
                }
            }
        }

        let dropped = items.len() - kept.len();
        if kept.is_empty() {
            info!("no relevant {} left, removing the section", self.key);
            return Ok(TransformOutput::new(format!("removed {}: no relevant items", self.key))
                .with_edit(Edit::Remove {
                    key: self.key.to_string(),
                    reason: "no relevant items".to_string(),
                }));
        }

        let mut summary = if proposal.changes_summary.is_empty() {
            format!("kept {} of {} items", kept.len(), items.len())
        } else {
            proposal.changes_summary
        };
        if !rekept.is_empty() {
            summary.push_str(&format!("; kept job-relevant {}", rekept.join(", ")));
        }
        if dropped > 0 {
            summary.push_str(&format!("; dropped {dropped}"));
        }

        Ok(TransformOutput::new(summary).with_edit(Edit::Replace {
            key: self.key.to_string(),
            section: self.wrap(kept),
        }))
    }
}
