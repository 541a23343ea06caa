//! Entry types for the typed résumé sections.
//!
//! Every entry keeps unknown fields in `extra` so fields the pipeline never
//! touches (urls, gpa, custom keys) survive a load/save cycle unchanged.
//! Known fields the file spelled out empty (`highlights: []`, `company: ""`)
//! are remembered in `blank_fields` and written back the same way.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// A résumé date: rendercv accepts bare years as integers as well as strings
/// such as `2021-03` or `present`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateField {
    Year(i64),
    Text(String),
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateField::Year(year) => write!(f, "{year}"),
            DateField::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub company: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(skip)]
    pub blank_fields: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub institution: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub area: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub degree: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(skip)]
    pub blank_fields: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(skip)]
    pub blank_fields: Mapping,
}

/// One skill category. `details` is a comma-joined list of skills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(skip)]
    pub blank_fields: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(skip)]
    pub blank_fields: Mapping,
}

/// Access to the empty-valued keys recorded at load time. `None` for shapes
/// that have no keys.
pub trait BlankFields {
    fn blank_fields(&self) -> Option<&Mapping>;
    fn blank_fields_mut(&mut self) -> Option<&mut Mapping>;
}

macro_rules! impl_blank_fields {
    ($($ty:ty),*) => {$(
        impl BlankFields for $ty {
            fn blank_fields(&self) -> Option<&Mapping> {
                Some(&self.blank_fields)
            }

            fn blank_fields_mut(&mut self) -> Option<&mut Mapping> {
                Some(&mut self.blank_fields)
            }
        }
    )*};
}

impl_blank_fields!(ExperienceEntry, EducationEntry, ProjectEntry, SkillEntry, LabeledItem);

impl BlankFields for ListItem {
    fn blank_fields(&self) -> Option<&Mapping> {
        match self {
            ListItem::Text(_) => None,
            ListItem::Labeled(item) => item.blank_fields(),
        }
    }

    fn blank_fields_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            ListItem::Text(_) => None,
            ListItem::Labeled(item) => item.blank_fields_mut(),
        }
    }
}

/// True for the values a typed field drops when written: null, `""`, `[]`.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Sequence(items) => items.is_empty(),
        _ => false,
    }
}

/// An item of a certifications or extracurricular list. Both shapes may be
/// mixed inside one section; each item keeps the shape it was loaded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Text(String),
    Labeled(LabeledItem),
}

impl LabeledItem {
    /// The item's title: `label`, else a `name` or `title` field kept in
    /// `extra`.
    pub fn title(&self) -> &str {
        if !self.label.is_empty() {
            return &self.label;
        }
        ["name", "title"]
            .into_iter()
            .filter_map(|key| self.extra.get(key).and_then(Value::as_str))
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default()
    }
}

impl ListItem {
    /// The text used to recognise this item in a model response.
    pub fn match_text(&self) -> &str {
        match self {
            ListItem::Text(text) => text,
            ListItem::Labeled(item) if !item.title().is_empty() => item.title(),
            ListItem::Labeled(item) => &item.details,
        }
    }

    /// Human-readable rendering, used in prompts and reports.
    pub fn display_text(&self) -> String {
        match self {
            ListItem::Text(text) => text.clone(),
            ListItem::Labeled(item) if item.details.is_empty() => item.title().to_string(),
            ListItem::Labeled(item) if item.title().is_empty() => item.details.clone(),
            ListItem::Labeled(item) => format!("{}: {}", item.title(), item.details),
        }
    }
}
