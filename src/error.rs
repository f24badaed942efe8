use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    /// A required column is absent. Fatal for the grade's batch.
    #[error("column '{column}' not found in {origin}; columns found: {found:?}")]
    Schema {
        column: String,
        origin: String,
        found: Vec<String>,
    },

    #[error("template file not found: {}", .0.display())]
    TemplateMissing(PathBuf),

    #[error("template error: {0}")]
    Template(String),

    #[error("failed to save {}: {reason}", .path.display())]
    Save { path: PathBuf, reason: String },

    #[error("failed to read spreadsheet {}: {reason}", .path.display())]
    Sheet { path: PathBuf, reason: String },
}

impl ReportError {
    pub fn schema(column: &str, origin: &str, found: &[String]) -> Self {
        ReportError::Schema {
            column: column.to_string(),
            origin: origin.to_string(),
            found: found.to_vec(),
        }
    }
}
