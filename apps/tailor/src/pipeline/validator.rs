//! Structural checks against the renderer's expectations. Findings only
//! accumulate; nothing here fails the run.

use chrono::NaiveDate;
use serde::Serialize;
use serde_yaml::Value;

use crate::models::document::{Document, Section, SectionKind};
use crate::models::entries::{DateField, ListItem};
use crate::tailoring::text_metrics::constraint_issues;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        self.warnings.push(message);
    }
}

pub fn validate(document: &Document) -> ValidationReport {
    let mut report = ValidationReport::default();

    if document.name.trim().is_empty() {
        report.error("Missing required CV field: name".to_string());
    }

    for (key, section) in document.sections.iter() {
        match section {
            Section::Summary(items) => check_summary(key, items, &mut report),
            Section::Experience(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    require(key, i, "company", &entry.company, &mut report);
                    require(key, i, "position", &entry.position, &mut report);
                    if entry.start_date.is_none() {
                        report.warning(format!("{key} entry {i} has no start_date"));
                    }
                    check_dates(key, i, &entry.start_date, &entry.end_date, &mut report);
                }
            }
            Section::Education(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    require(key, i, "institution", &entry.institution, &mut report);
                    require(key, i, "degree", &entry.degree, &mut report);
                    require(key, i, "area", &entry.area, &mut report);
                    check_dates(key, i, &entry.start_date, &entry.end_date, &mut report);
                }
            }
            Section::Projects(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    require(key, i, "name", &entry.name, &mut report);
                    check_dates(key, i, &entry.start_date, &entry.end_date, &mut report);
                }
            }
            Section::Skills(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    require(key, i, "label", &entry.label, &mut report);
                    require(key, i, "details", &entry.details, &mut report);
                }
            }
            Section::Certifications(items) | Section::Extracurricular(items) => {
                check_list_items(key, items, &mut report)
            }
            Section::Other(value) => {
                let kind = SectionKind::for_key(key);
                if kind != SectionKind::Other {
                    check_misshaped(key, kind, value, &mut report);
                }
            }
        }
    }

    check_round_trip(document, &mut report);
    report
}

fn require(key: &str, index: usize, field: &str, value: &str, report: &mut ValidationReport) {
    if value.trim().is_empty() {
        report.error(format!("{key} entry {index} missing required field: {field}"));
    }
}

fn check_summary(key: &str, items: &[String], report: &mut ValidationReport) {
    for (i, item) in items.iter().enumerate() {
        if item.trim().is_empty() {
            report.warning(format!("{key}: item {i} is empty"));
        }
    }
    for issue in constraint_issues(items) {
        report.warning(format!("{key}: {issue}"));
    }
}

fn check_list_items(key: &str, items: &[ListItem], report: &mut ValidationReport) {
    for (i, item) in items.iter().enumerate() {
        match item {
            ListItem::Text(text) if text.trim().is_empty() => {
                report.warning(format!("{key}: item {i} is empty"));
            }
            ListItem::Labeled(labeled)
                if labeled.title().trim().is_empty() && labeled.details.trim().is_empty() =>
            {
                report.error(format!("{key}: item {i} has no label or details"));
            }
            _ => {}
        }
    }
}

/// Explains why a known section failed to load as its typed variant.
fn check_misshaped(key: &str, kind: SectionKind, value: &Value, report: &mut ValidationReport) {
    let Value::Sequence(items) = value else {
        report.error(format!("{key}: must be a list"));
        return;
    };

    let before = report.errors.len();
    for (i, item) in items.iter().enumerate() {
        match kind {
            SectionKind::Summary => {
                if !item.is_string() {
                    report.error(format!("{key}: item {i} must be a string"));
                }
            }
            SectionKind::Certifications | SectionKind::Extracurricular => {
                if !item.is_string() && !item.is_mapping() {
                    report.error(format!("{key}: item {i} must be a string or a mapping"));
                }
            }
            _ => match item {
                Value::Mapping(entry) => match entry.get("highlights") {
                    Some(Value::Sequence(highlights)) => {
                        for (j, highlight) in highlights.iter().enumerate() {
                            if !highlight.is_string() {
                                report.error(format!(
                                    "{key} entry {i} highlight {j} must be a string"
                                ));
                            }
                        }
                    }
                    Some(Value::Null) | None => {}
                    Some(_) => report.error(format!("{key} entry {i} highlights must be a list")),
                },
                _ => report.error(format!("{key} entry {i} must be a mapping")),
            },
        }
    }

    if report.errors.len() == before {
        report.error(format!("{key}: entries do not match the expected schema"));
    }
}

fn check_round_trip(document: &Document, report: &mut ValidationReport) {
    let encoded = match document.to_yaml_string() {
        Ok(text) => text,
        Err(e) => {
            report.error(format!("YAML serialization error: {e}"));
            return;
        }
    };
    match Document::from_yaml_str(&encoded) {
        Ok(decoded) if decoded == *document => {}
        Ok(_) => report.error("YAML round-trip changed the document".to_string()),
        Err(e) => report.error(format!("YAML reload error: {e}")),
    }
}

// ─── Dates ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDate {
    On(NaiveDate),
    Ongoing,
}

/// Parses the date spellings résumés use: `2023-01-15`, `2023-01`, `2023`,
/// `01/2023`, `01-2023`, `January 2023`, `Jan 2023` and `present`.
pub fn parse_resume_date(field: &DateField) -> Option<ResumeDate> {
    let text = match field {
        DateField::Year(year) => {
            return i32::try_from(*year)
                .ok()
                .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
                .map(ResumeDate::On)
        }
        DateField::Text(text) => text.trim(),
    };

    if matches!(
        text.to_ascii_lowercase().as_str(),
        "present" | "current" | "ongoing" | "now"
    ) {
        return Some(ResumeDate::Ongoing);
    }

    let candidates = [
        (text.to_string(), "%Y-%m-%d"),
        (format!("{text}-01"), "%Y-%m-%d"),
        (format!("{text}-01-01"), "%Y-%m-%d"),
        (format!("01/{text}"), "%d/%m/%Y"),
        (format!("01-{text}"), "%d-%m-%Y"),
        (format!("1 {text}"), "%d %B %Y"),
        (format!("1 {text}"), "%d %b %Y"),
    ];
    candidates
        .iter()
        .find_map(|(candidate, format)| NaiveDate::parse_from_str(candidate, format).ok())
        .map(ResumeDate::On)
}

fn check_dates(
    key: &str,
    index: usize,
    start: &Option<DateField>,
    end: &Option<DateField>,
    report: &mut ValidationReport,
) {
    let parse = |field: &Option<DateField>, name: &str, report: &mut ValidationReport| {
        let field = field.as_ref()?;
        let parsed = parse_resume_date(field);
        if parsed.is_none() {
            report.warning(format!("{key} entry {index}: could not parse {name} '{field}'"));
        }
        parsed
    };

    let start_date = parse(start, "start_date", report);
    let end_date = parse(end, "end_date", report);
    if let (Some(ResumeDate::On(start_on)), Some(ResumeDate::On(end_on))) = (start_date, end_date) {
        if end_on < start_on {
            report.warning(format!(
                "{key} entry {index}: end date {end_on} is before start date {start_on}"
            ));
        }
    }
}
