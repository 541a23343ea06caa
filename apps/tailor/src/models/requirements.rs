use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Structured requirements extracted from a job advertisement.
/// Derived once at the start of a run and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRequirements {
    #[serde(deserialize_with = "string_or_list")]
    pub essential_requirements: Vec<String>,
    #[serde(alias = "preferred_requirements", deserialize_with = "string_or_list")]
    pub desirable_requirements: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub key_technologies: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub soft_skills: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub role_focus: Vec<String>,
    #[serde(deserialize_with = "loose_string")]
    pub industry_domain: String,
    #[serde(deserialize_with = "loose_string")]
    pub company_culture: String,
    #[serde(deserialize_with = "loose_string")]
    pub experience_level: String,
    #[serde(deserialize_with = "string_or_list")]
    pub education_requirements: Vec<String>,
    #[serde(deserialize_with = "loose_string")]
    pub location: String,
    #[serde(deserialize_with = "loose_string")]
    pub work_arrangement: String,
    #[serde(deserialize_with = "string_or_list")]
    pub tone_indicators: Vec<String>,
}

impl JobRequirements {
    /// Lower-case keyword set used for relevance scoring: word tokens of the
    /// technologies, essential requirements and role focus, plus a few terms
    /// implied by the industry domain.
    pub fn keywords(&self) -> BTreeSet<String> {
        let mut keywords: BTreeSet<String> = self
            .key_technologies
            .iter()
            .chain(&self.essential_requirements)
            .chain(&self.role_focus)
            .flat_map(|value| word_tokens(value))
            .collect();

        let industry = self.industry_domain.to_lowercase();
        let implied: &[&str] = if industry.contains("data") {
            &["data", "analytics", "science", "pipeline", "warehouse"]
        } else if industry.contains("software") || industry.contains("tech") {
            &["software", "development", "programming", "engineering"]
        } else if industry.contains("web") {
            &["web", "frontend", "backend", "fullstack"]
        } else {
            &[]
        };
        keywords.extend(implied.iter().map(|k| k.to_string()));
        keywords
    }

    pub fn is_empty(&self) -> bool {
        *self == JobRequirements::default()
    }
}

/// Lower-cased `[a-zA-Z0-9+#.-]+` tokens of a text, so `c++`, `c#` and
/// `node.js` survive as single tokens.
pub fn word_tokens(text: &str) -> Vec<String> {
    static WORD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[a-zA-Z0-9+#.\-]+").expect("valid regex"));

    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().trim_matches(|c| c == '.' || c == '-').to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

// ─── Lenient decoding ────────────────────────────────────────────────────────

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn string_or_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(&other).into_iter().collect(),
    })
}

pub(crate) fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar_text(&other).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_decoding() {
        let reqs: JobRequirements = serde_json::from_value(json!({
            "essential_requirements": "3+ years of SQL",
            "preferred_requirements": ["Airflow", null, "dbt"],
            "key_technologies": ["Python", "SQL"],
            "industry_domain": ["Finance", "Data"],
            "experience_level": 3,
            "unexpected": "ignored"
        }))
        .unwrap();

        assert_eq!(reqs.essential_requirements, vec!["3+ years of SQL"]);
        assert_eq!(reqs.desirable_requirements, vec!["Airflow", "dbt"]);
        assert_eq!(reqs.industry_domain, "Finance, Data");
        assert_eq!(reqs.experience_level, "3");
        assert!(reqs.soft_skills.is_empty());
    }

    #[test]
    fn test_keywords_include_industry_terms() {
        let reqs = JobRequirements {
            key_technologies: vec!["Node.js".to_string(), "C++".to_string()],
            role_focus: vec!["Data pipelines".to_string()],
            industry_domain: "Data & Analytics".to_string(),
            ..Default::default()
        };
        let keywords = reqs.keywords();
        assert!(keywords.contains("node.js"));
        assert!(keywords.contains("c++"));
        assert!(keywords.contains("pipelines"));
        assert!(keywords.contains("warehouse"));
    }

    #[test]
    fn test_empty_requirements() {
        assert!(JobRequirements::default().is_empty());
        let reqs: JobRequirements = serde_json::from_value(json!({})).unwrap();
        assert!(reqs.is_empty());
    }
}
