//! Validation of structured log files written through `CHURON_LOG`.

use std::path::Path;

use churon_core::structured_log::validate_log_text;
use serde::Serialize;

use crate::error::HarnessError;

#[derive(Debug, Clone, Serialize)]
pub struct LogReport {
    pub path: String,
    pub valid_entries: usize,
    pub errors: Vec<String>,
}

impl LogReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate every line of the JSONL log at `path`.
///
/// # Errors
///
/// Only I/O failures; schema violations are reported in [`LogReport::errors`].
pub fn check_log_file(path: &Path) -> Result<LogReport, HarnessError> {
    let text = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
    let (valid_entries, errors) = match validate_log_text(&text) {
        Ok(count) => (count, Vec::new()),
        Err(errs) => (0, errs.iter().map(ToString::to_string).collect()),
    };
    Ok(LogReport {
        path: path.display().to_string(),
        valid_entries,
        errors,
    })
}
