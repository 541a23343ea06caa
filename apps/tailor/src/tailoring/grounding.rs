//! Anti-fabrication checks: is a skill or technology actually backed by the
//! candidate's master CV?

use std::collections::BTreeSet;

use serde_yaml::Value;

use crate::models::document::Document;

/// Technology names recognised in free text. Multi-word and punctuated
/// names are matched as whole phrases.
pub const TECH_TERMS: &[&str] = &[
    // Languages
    "python", "java", "javascript", "typescript", "c++", "c#", "ruby", "php",
    "rust", "kotlin", "scala", "matlab", "sql",
    // Frameworks & libraries
    "react", "vue", "angular", "django", "flask", "laravel", "rails", "node.js",
    "pandas", "numpy", "scikit-learn", "tensorflow", "pytorch", "graphql",
    // Databases
    "mysql", "postgresql", "mongodb", "redis", "elasticsearch", "sql server",
    "sqlite", "cassandra", "dynamodb",
    // Cloud & DevOps
    "aws", "azure", "gcp", "google cloud", "docker", "kubernetes", "jenkins",
    "gitlab", "github", "terraform", "ansible", "ci/cd",
    // Tools & platforms
    "git", "linux", "nginx", "hadoop", "spark", "kafka", "airflow", "tableau",
    "power bi", "excel",
    // Disciplines
    "machine learning", "deep learning", "data science", "microservices",
];

/// Case-insensitive whole-phrase search: the match may not be glued to a
/// letter or digit on either side. `haystack` must already be lower-case.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let phrase = phrase.trim().to_lowercase();
    if phrase.is_empty() {
        return false;
    }
    haystack.match_indices(&phrase).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Known technologies named in `text`.
pub fn technology_mentions(text: &str) -> BTreeSet<&'static str> {
    let lower = text.to_lowercase();
    TECH_TERMS
        .iter()
        .copied()
        .filter(|term| contains_phrase(&lower, term))
        .collect()
}

/// Splits a comma-joined skills string, keeping commas inside parentheses:
/// `"Python (pandas, NumPy), SQL"` yields `["Python (pandas, NumPy)", "SQL"]`.
pub fn split_skill_list(details: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in details.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    tokens.push(current);

    tokens
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Everything the master CV says, captured once at run start.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    skill_tokens: BTreeSet<String>,
    corpus: String,
}

impl Vocabulary {
    pub fn from_document(document: &Document) -> Self {
        let skill_tokens = document
            .skills()
            .unwrap_or_default()
            .iter()
            .flat_map(|entry| split_skill_list(&entry.details))
            .map(|token| token.to_lowercase())
            .collect();

        let mut texts = Vec::new();
        if let Ok(value) = serde_yaml::to_value(&document.sections) {
            collect_strings(&value, &mut texts);
        }

        Self {
            skill_tokens,
            corpus: texts.join("\n").to_lowercase(),
        }
    }

    /// Whether a skill token is supported by the CV. A parenthetical token
    /// such as `Python (pandas)` needs both its head and every inner item.
    pub fn is_grounded(&self, token: &str) -> bool {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return false;
        }
        if self.skill_tokens.contains(&token) || contains_phrase(&self.corpus, &token) {
            return true;
        }

        match token.split_once('(') {
            Some((head, rest)) => {
                let inner = rest.trim_end().trim_end_matches(')');
                let head_ok = self.is_grounded(head);
                head_ok && split_skill_list(inner).iter().all(|item| self.is_grounded(item))
            }
            None => false,
        }
    }

    /// Technologies named in `text` that the CV never mentions.
    pub fn unsupported_technologies(&self, text: &str) -> Vec<&'static str> {
        technology_mentions(text)
            .into_iter()
            .filter(|term| !contains_phrase(&self.corpus, term))
            .collect()
    }
}

pub(crate) fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Sequence(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Mapping(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Tagged(tagged) => collect_strings(&tagged.value, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::sample_document;

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("python and sql", "sql"));
        assert!(!contains_phrase("mysql only", "sql"));
        assert!(!contains_phrase("javascript", "java"));
        assert!(contains_phrase("built with c++, rust", "c++"));
        assert!(contains_phrase("shipped node.js services", "node.js"));
        assert!(!contains_phrase("anything", ""));
    }

    #[test]
    fn test_technology_mentions() {
        let found = technology_mentions("Built ETL in Python on AWS with Power BI dashboards");
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["aws", "power bi", "python"]
        );
    }

    #[test]
    fn test_split_skill_list_keeps_parentheticals() {
        assert_eq!(
            split_skill_list("Python (pandas, NumPy), SQL, , Git"),
            vec!["Python (pandas, NumPy)", "SQL", "Git"]
        );
    }

    #[test]
    fn test_vocabulary_grounding() {
        let vocab = Vocabulary::from_document(&sample_document());
        assert!(vocab.is_grounded("Python"));
        assert!(vocab.is_grounded("sql"));
        assert!(!vocab.is_grounded("Java"));
        assert!(!vocab.is_grounded("Python (Kubernetes)"));
        assert!(vocab.is_grounded("Python (SQL)"));
    }

    #[test]
    fn test_unsupported_technologies() {
        let vocab = Vocabulary::from_document(&sample_document());
        assert_eq!(
            vocab.unsupported_technologies("Deployed Python services on Kubernetes"),
            vec!["kubernetes"]
        );
        assert!(vocab
            .unsupported_technologies("Wrote SQL reports in Excel")
            .is_empty());
    }
}
