//! The résumé document: identity fields plus an ordered set of typed sections.
//!
//! The persisted file wraps the document under `cv:`; every other top-level
//! key (`design`, `locale`, ...) is carried through untouched in
//! [`ResumeFile::extra`].

use serde::de::DeserializeOwned;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

use super::entries::{
    is_blank, BlankFields, EducationEntry, ExperienceEntry, ListItem, ProjectEntry, SkillEntry,
};

pub const SUMMARY: &str = "professional_summary";
pub const EXPERIENCE: &str = "experience";
pub const EDUCATION: &str = "education";
pub const PROJECTS: &str = "projects";
pub const SKILLS: &str = "skills";
pub const CERTIFICATIONS: &str = "certifications";
pub const EXTRACURRICULAR: &str = "extracurricular";

/// Rendered order used when nothing better is known: skills right after the
/// summary, ahead of the experience that demonstrates them.
pub const STANDARD_ORDER: [&str; 7] = [
    SUMMARY,
    SKILLS,
    EXPERIENCE,
    PROJECTS,
    EDUCATION,
    CERTIFICATIONS,
    EXTRACURRICULAR,
];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ─── File wrapper ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeFile {
    pub cv: Document,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl ResumeFile {
    pub fn from_yaml_str(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, DocumentError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// ─── Document ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub name: String,
    /// Contact and identity fields other than `name`, kept verbatim.
    #[serde(flatten)]
    pub contact: Mapping,
    #[serde(default)]
    pub sections: Sections,
}

impl Document {
    pub fn from_yaml_str(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, DocumentError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.get(key)
    }

    pub fn has_section(&self, key: &str) -> bool {
        self.sections.get(key).is_some()
    }

    pub fn section_keys(&self) -> Vec<String> {
        self.sections.keys().map(str::to_string).collect()
    }

    pub fn summary(&self) -> Option<&[String]> {
        match self.section(SUMMARY)? {
            Section::Summary(items) => Some(items),
            _ => None,
        }
    }

    pub fn experience(&self) -> Option<&[ExperienceEntry]> {
        match self.section(EXPERIENCE)? {
            Section::Experience(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn education(&self) -> Option<&[EducationEntry]> {
        match self.section(EDUCATION)? {
            Section::Education(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn projects(&self) -> Option<&[ProjectEntry]> {
        match self.section(PROJECTS)? {
            Section::Projects(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn skills(&self) -> Option<&[SkillEntry]> {
        match self.section(SKILLS)? {
            Section::Skills(entries) => Some(entries),
            _ => None,
        }
    }

    /// Items of the certifications or extracurricular section.
    pub fn list_items(&self, key: &str) -> Option<&[ListItem]> {
        match self.section(key)? {
            Section::Certifications(items) | Section::Extracurricular(items) => Some(items),
            _ => None,
        }
    }

    /// Replaces an existing section in place, or appends a new one.
    pub fn replace_section(&mut self, key: &str, section: Section) {
        self.sections.insert(key.to_string(), section);
    }

    pub fn remove_section(&mut self, key: &str) -> Option<Section> {
        self.sections.remove(key)
    }

    /// Puts the named keys first (in the given order); unnamed keys follow in
    /// their current relative order. Unknown names are ignored.
    pub fn reorder(&mut self, order: &[String]) {
        self.sections.reorder(order);
    }
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// Ordered, key-unique section map. Iteration order is the rendered order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections(Vec<(String, Section)>);

impl Sections {
    pub fn get(&self, key: &str) -> Option<&Section> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.0.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: String, section: Section) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = section,
            None => self.0.push((key, section)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Section> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    fn reorder(&mut self, order: &[String]) {
        let mut rest = std::mem::take(&mut self.0);
        let mut ordered = Vec::with_capacity(rest.len());
        for key in order {
            if let Some(index) = rest.iter().position(|(k, _)| k == key) {
                ordered.push(rest.remove(index));
            }
        }
        ordered.extend(rest);
        self.0 = ordered;
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, section) in &self.0 {
            map.serialize_entry(key, section)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Sections {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Mapping>::deserialize(deserializer)?.unwrap_or_default();
        let mut sections = Sections::default();
        for (key, value) in raw {
            let key = match key {
                Value::String(key) => key,
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "section keys must be strings, got {other:?}"
                    )))
                }
            };
            let section = Section::from_value(&key, value);
            sections.insert(key, section);
        }
        Ok(sections)
    }
}

// ─── Section ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Summary,
    Experience,
    Education,
    Projects,
    Skills,
    Certifications,
    Extracurricular,
    Other,
}

impl SectionKind {
    pub fn for_key(key: &str) -> Self {
        match key {
            SUMMARY => Self::Summary,
            EXPERIENCE => Self::Experience,
            EDUCATION => Self::Education,
            PROJECTS => Self::Projects,
            SKILLS => Self::Skills,
            CERTIFICATIONS => Self::Certifications,
            EXTRACURRICULAR => Self::Extracurricular,
            _ => Self::Other,
        }
    }
}

/// Section payload. The variant is fixed by the key at load time; a known key
/// whose data does not fit stays [`Section::Other`] for the validator to flag.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Summary(Vec<String>),
    Experience(Vec<ExperienceEntry>),
    Education(Vec<EducationEntry>),
    Projects(Vec<ProjectEntry>),
    Skills(Vec<SkillEntry>),
    Certifications(Vec<ListItem>),
    Extracurricular(Vec<ListItem>),
    Other(Value),
}

impl Section {
    pub fn from_value(key: &str, value: Value) -> Self {
        match SectionKind::for_key(key) {
            SectionKind::Summary => decode(key, value, Section::Summary),
            SectionKind::Experience => decode_entries(key, value, Section::Experience),
            SectionKind::Education => decode_entries(key, value, Section::Education),
            SectionKind::Projects => decode_entries(key, value, Section::Projects),
            SectionKind::Skills => decode_entries(key, value, Section::Skills),
            SectionKind::Certifications => decode_entries(key, value, Section::Certifications),
            SectionKind::Extracurricular => decode_entries(key, value, Section::Extracurricular),
            SectionKind::Other => Section::Other(value),
        }
    }

    pub fn kind(&self) -> SectionKind {
        match self {
            Section::Summary(_) => SectionKind::Summary,
            Section::Experience(_) => SectionKind::Experience,
            Section::Education(_) => SectionKind::Education,
            Section::Projects(_) => SectionKind::Projects,
            Section::Skills(_) => SectionKind::Skills,
            Section::Certifications(_) => SectionKind::Certifications,
            Section::Extracurricular(_) => SectionKind::Extracurricular,
            Section::Other(_) => SectionKind::Other,
        }
    }

    pub fn entry_count(&self) -> usize {
        match self {
            Section::Summary(items) => items.len(),
            Section::Experience(entries) => entries.len(),
            Section::Education(entries) => entries.len(),
            Section::Projects(entries) => entries.len(),
            Section::Skills(entries) => entries.len(),
            Section::Certifications(items) | Section::Extracurricular(items) => items.len(),
            Section::Other(Value::Sequence(items)) => items.len(),
            Section::Other(Value::Null) => 0,
            Section::Other(_) => 1,
        }
    }

    /// The section as a JSON value, for embedding in prompts.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value, wrap: fn(T) -> Section) -> Section {
    match serde_yaml::from_value::<T>(value.clone()) {
        Ok(decoded) => wrap(decoded),
        Err(e) => {
            debug!("section '{}' kept untyped: {}", key, e);
            Section::Other(value)
        }
    }
}

/// Like [`decode`], then records which keys each raw entry spelled out empty.
fn decode_entries<T: DeserializeOwned + BlankFields>(
    key: &str,
    value: Value,
    wrap: fn(Vec<T>) -> Section,
) -> Section {
    let mut entries = match serde_yaml::from_value::<Vec<T>>(value.clone()) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("section '{}' kept untyped: {}", key, e);
            return Section::Other(value);
        }
    };
    if let Value::Sequence(raw_entries) = &value {
        for (entry, raw) in entries.iter_mut().zip(raw_entries) {
            if let (Some(blank), Value::Mapping(raw)) = (entry.blank_fields_mut(), raw) {
                for (field, field_value) in raw.iter().filter(|(_, v)| is_blank(v)) {
                    blank.insert(field.clone(), field_value.clone());
                }
            }
        }
    }
    wrap(entries)
}

fn serialize_entries<T, S>(entries: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize + BlankFields,
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(entries.len()))?;
    for entry in entries {
        seq.serialize_element(&WithBlankFields(entry))?;
    }
    seq.end()
}

/// Writes an entry plus the recorded empty keys its typed fields skipped.
struct WithBlankFields<'a, T>(&'a T);

impl<T: Serialize + BlankFields> Serialize for WithBlankFields<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let blank = match self.0.blank_fields() {
            Some(blank) if !blank.is_empty() => blank,
            _ => return self.0.serialize(serializer),
        };
        let mut value = serde_yaml::to_value(self.0).map_err(S::Error::custom)?;
        if let Value::Mapping(map) = &mut value {
            for (field, empty) in blank {
                if !map.contains_key(field) {
                    map.insert(field.clone(), empty.clone());
                }
            }
        }
        value.serialize(serializer)
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Section::Summary(items) => items.serialize(serializer),
            Section::Experience(entries) => serialize_entries(entries, serializer),
            Section::Education(entries) => serialize_entries(entries, serializer),
            Section::Projects(entries) => serialize_entries(entries, serializer),
            Section::Skills(entries) => serialize_entries(entries, serializer),
            Section::Certifications(items) | Section::Extracurricular(items) => {
                serialize_entries(items, serializer)
            }
            Section::Other(value) => value.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
cv:
  name: Jordan Lee
  email: jordan@example.com
  phone: "+44 1234 567890"
  sections:
    professional_summary:
      - Data analyst with five years of experience.
    experience:
      - company: Acme
        position: Data Tech
        start_date: 2020-01
        end_date: present
        highlights:
          - Used Python and SQL daily
    skills:
      - label: Languages
        details: Python, SQL
    publications:
      - title: A paper
design:
  theme: classic
"#;

    #[test]
    fn test_load_types_known_sections() {
        let file = ResumeFile::from_yaml_str(SAMPLE).unwrap();
        let doc = &file.cv;
        assert_eq!(doc.name, "Jordan Lee");
        assert_eq!(
            doc.section_keys(),
            vec![SUMMARY, EXPERIENCE, SKILLS, "publications"]
        );
        assert_eq!(doc.experience().unwrap()[0].company, "Acme");
        assert_eq!(doc.skills().unwrap()[0].details, "Python, SQL");
        assert!(matches!(doc.section("publications"), Some(Section::Other(_))));
        assert!(file.extra.contains_key("design"));
        assert_eq!(
            doc.contact.get("email").and_then(|v| v.as_str()),
            Some("jordan@example.com")
        );
    }

    #[test]
    fn test_misshaped_known_section_stays_other() {
        let doc = Document::from_yaml_str(
            "name: A\nsections:\n  experience: just a string\n  skills:\n    - 42\n",
        )
        .unwrap();
        assert!(matches!(doc.section(EXPERIENCE), Some(Section::Other(_))));
        assert!(matches!(doc.section(SKILLS), Some(Section::Other(_))));
    }

    #[test]
    fn test_round_trip_preserves_document() {
        let file = ResumeFile::from_yaml_str(SAMPLE).unwrap();
        let text = file.to_yaml_string().unwrap();
        let again = ResumeFile::from_yaml_str(&text).unwrap();
        assert_eq!(again, file);
        assert!(text.contains("theme: classic"));
    }

    #[test]
    fn test_reorder_keeps_unnamed_sections_in_relative_order() {
        let mut doc = ResumeFile::from_yaml_str(SAMPLE).unwrap().cv;
        doc.reorder(&[SKILLS.to_string(), "missing".to_string()]);
        assert_eq!(
            doc.section_keys(),
            vec![SKILLS, SUMMARY, EXPERIENCE, "publications"]
        );
    }

    #[test]
    fn test_replace_and_remove_section() {
        let mut doc = ResumeFile::from_yaml_str(SAMPLE).unwrap().cv;
        doc.replace_section(SUMMARY, Section::Summary(vec!["New.".to_string()]));
        assert_eq!(doc.summary().unwrap(), ["New.".to_string()]);
        assert_eq!(doc.section_keys()[0], SUMMARY);

        assert!(doc.remove_section("publications").is_some());
        assert!(!doc.has_section("publications"));
        assert!(doc.remove_section("publications").is_none());
    }

    #[test]
    fn test_missing_cv_key_is_an_error() {
        assert!(ResumeFile::from_yaml_str("name: nobody\n").is_err());
    }

    #[test]
    fn test_fields_written_empty_survive_a_round_trip() {
        let doc = Document::from_yaml_str(
            r#"
name: A
sections:
  experience:
    - company: Acme
      position: Dev
      location: ""
      highlights: []
  certifications:
    - label: ""
      name: AWS
"#,
        )
        .unwrap();
        let entry = &doc.experience().unwrap()[0];
        assert!(entry.highlights.is_empty());
        assert!(entry.blank_fields.contains_key("highlights"));

        let text = doc.to_yaml_string().unwrap();
        assert!(text.contains("highlights: []"), "{text}");
        assert!(text.contains("location: ''"), "{text}");
        assert!(text.contains("label: ''"), "{text}");
        assert_eq!(Document::from_yaml_str(&text).unwrap(), doc);
    }
}
