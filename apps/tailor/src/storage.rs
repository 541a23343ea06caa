//! File glue for one-shot runs: master CV in, job ad in, working CV and
//! run report out.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::document::ResumeFile;
use crate::pipeline::RunReport;

pub fn load_resume(path: &Path) -> Result<ResumeFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read CV file {}", path.display()))?;
    let file = ResumeFile::from_yaml_str(&text)
        .with_context(|| format!("Failed to load CV from {}", path.display()))?;
    info!(
        "Loaded CV '{}' with {} sections from {}",
        file.cv.name,
        file.cv.sections.len(),
        path.display()
    );
    Ok(file)
}

pub fn load_job_ad(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job advertisement {}", path.display()))?;
    Ok(text.trim().to_string())
}

/// Writes the working CV, creating parent directories as needed.
pub fn save_resume(path: &Path, file: &ResumeFile) -> Result<()> {
    let yaml = file.to_yaml_string().context("Failed to encode CV as YAML")?;
    write_creating_dirs(path, &yaml)?;
    info!("Saved tailored CV to {}", path.display());
    Ok(())
}

pub fn save_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to encode run report")?;
    write_creating_dirs(path, &json)?;
    info!("Saved run report to {}", path.display());
    Ok(())
}

fn write_creating_dirs(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::run_state::RunState;
    use crate::pipeline::step::StepKind;
    use crate::pipeline::testing::SAMPLE_YAML;

    #[test]
    fn test_resume_survives_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let master = dir.path().join("master_CV.yaml");
        std::fs::write(&master, SAMPLE_YAML).unwrap();

        let file = load_resume(&master).unwrap();
        let working = dir.path().join("out").join("working_CV.yaml");
        save_resume(&working, &file).unwrap();

        let reloaded = load_resume(&working).unwrap();
        assert_eq!(reloaded, file);
    }

    #[test]
    fn test_missing_and_invalid_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = load_resume(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read CV file"));

        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "cv: [").unwrap();
        let err = load_resume(&broken).unwrap_err();
        assert!(err.to_string().contains("Failed to load CV"));
    }

    #[test]
    fn test_job_ad_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job_advertisement.txt");
        std::fs::write(&path, "\n  Data Analyst, SQL and Python  \n\n").unwrap();
        assert_eq!(load_job_ad(&path).unwrap(), "Data Analyst, SQL and Python");
    }

    #[test]
    fn test_report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let state = RunState::new(
            ResumeFile::from_yaml_str(SAMPLE_YAML).unwrap().cv,
            "Data analyst".to_string(),
            &[StepKind::ParseJobAd, StepKind::Validate],
        );
        save_report(&path, &state.report()).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["steps"][0]["flag"], "job_parsed");
        assert_eq!(written["status"]["state"], "idle");
    }
}
