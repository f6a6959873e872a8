use std::path::Path;

use setkeeper_core::changes::diff_workouts;
use setkeeper_core::EngineConfig;

use crate::commands::common::{format_change_lines, read_draft, ChangeReport};
use crate::error::CliError;

pub fn run_diff(
    snapshot_path: &Path,
    draft_path: &Path,
    shallow: bool,
    as_json: bool,
    config: &EngineConfig,
) -> Result<(), CliError> {
    let snapshot = read_draft(snapshot_path)?;
    let draft = read_draft(draft_path)?;
    let deep = config.changes.deep_compare && !shallow;
    let changes = diff_workouts(&draft, &snapshot, deep, &config.changes.exclude_fields);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&ChangeReport::new(&changes))?);
    } else {
        for line in format_change_lines(&changes) {
            println!("{line}");
        }
    }

    Ok(())
}
