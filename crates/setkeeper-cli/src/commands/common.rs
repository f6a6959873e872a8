use std::fs;
use std::path::Path;

use serde::Serialize;
use setkeeper_core::changes::ChangeSet;
use setkeeper_core::validation::DraftValidation;
use setkeeper_core::{EngineConfig, Workout};

use crate::cli::ReportLevel;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ChangeReport<'a> {
    pub has_unsaved_changes: bool,
    pub fields: &'a [String],
}

impl<'a> ChangeReport<'a> {
    pub fn new(changes: &'a ChangeSet) -> Self {
        Self {
            has_unsaved_changes: !changes.is_empty(),
            fields: changes.fields(),
        }
    }
}

/// Defaults, then the optional JSON file, then `SETKEEPER_*` overrides.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let config = match path {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env()?)
}

pub fn read_draft(path: &Path) -> Result<Workout, CliError> {
    let body = fs::read_to_string(path).map_err(|error| CliError::InvalidDraftFile {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    parse_draft(&body).map_err(|error| CliError::InvalidDraftFile {
        path: path.display().to_string(),
        reason: error.to_string(),
    })
}

pub fn parse_draft(body: &str) -> Result<Workout, serde_json::Error> {
    serde_json::from_str(body)
}

pub fn write_draft(path: &Path, workout: &Workout) -> Result<(), CliError> {
    let mut body = serde_json::to_string_pretty(workout)?;
    body.push('\n');
    fs::write(path, body)?;
    Ok(())
}

/// Human-readable lines for a validation report, filtered by `level`.
pub fn format_report_lines(report: &DraftValidation, level: ReportLevel) -> Vec<String> {
    let mut lines: Vec<String> = report.errors.iter().map(|error| format!("error    {error}")).collect();

    if level >= ReportLevel::Warning {
        lines.extend(report.warnings.iter().map(|warning| format!("warning  {warning}")));
    }

    if level >= ReportLevel::Info {
        lines.extend(report.notes.iter().map(|note| format!("info     {note}")));
        for (path, result) in &report.fields {
            for suggestion in &result.suggestions {
                lines.push(format!(
                    "suggest  {path}: {} ({})",
                    suggestion.value, suggestion.rationale
                ));
            }
        }
    }

    if lines.is_empty() {
        lines.push("Draft is valid".to_string());
    }
    lines
}

pub fn format_change_lines(changes: &ChangeSet) -> Vec<String> {
    if changes.is_empty() {
        return vec!["No unsaved changes".to_string()];
    }
    changes.iter().map(|field| format!("modified  {field}")).collect()
}
