use std::path::Path;
use std::sync::Arc;

use setkeeper_core::timing::SystemClock;
use setkeeper_core::validation::ValidationCache;
use setkeeper_core::EngineConfig;

use crate::cli::ReportLevel;
use crate::commands::common::{format_report_lines, read_draft};
use crate::error::CliError;

pub fn run_validate(
    draft_path: &Path,
    level: ReportLevel,
    as_json: bool,
    config: &EngineConfig,
) -> Result<(), CliError> {
    let draft = read_draft(draft_path)?;
    let cache = ValidationCache::new(config.validation.clone(), Arc::new(SystemClock))?;
    let report = cache.validate_draft(&draft);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report, level) {
            println!("{line}");
        }
    }

    if report.is_valid {
        Ok(())
    } else {
        Err(CliError::ValidationFailed(report.errors.len()))
    }
}
