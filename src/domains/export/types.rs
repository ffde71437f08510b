use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the export pipeline.
///
/// None of these are retried: partially written parts exist by the time any
/// of them is raised, so a retry is always a fresh job in a fresh workspace.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ExportError {
    /// The pipeline was given unusable limits.
    #[error("Invalid export configuration: {0}")]
    Configuration(String),
    /// The workspace directory could not be created.
    #[error("Failed to prepare export workspace: {0}")]
    Workspace(String),
    /// The record source failed mid-scan.
    #[error("Failed to read transactions: {0}")]
    SourceRead(String),
    /// A CSV part could not be written.
    #[error("Failed to write CSV part: {0}")]
    Write(String),
    /// The archive could not be assembled or read back.
    #[error("Failed to build archive: {0}")]
    Archive(String),
}

impl ExportError {
    /// Short name of the pipeline stage that failed, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            ExportError::Configuration(_) => "config",
            ExportError::Workspace(_) => "workspace",
            ExportError::SourceRead(_) => "source",
            ExportError::Write(_) => "write",
            ExportError::Archive(_) => "archive",
        }
    }
}

/// One physical CSV file inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePart {
    /// 1-indexed, in creation order.
    pub sequence: u32,
    pub file_name: String,
    pub path: PathBuf,
    /// Data rows, header excluded.
    pub row_count: u64,
}

impl FilePart {
    pub fn file_name_for(sequence: u32) -> String {
        format!("transactions_part_{}.csv", sequence)
    }
}

/// All parts produced by one export invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: Uuid,
    pub parts: Vec<FilePart>,
    pub total_rows: u64,
}

impl ExportJob {
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

/// Export statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStats {
    pub rows_exported: u64,
    pub part_count: usize,
    pub archive_bytes: u64,
    pub duration_ms: u64,
}

/// Number of parts a job of `total_rows` rows is split into.
pub fn expected_part_count(total_rows: u64, max_rows_per_part: u64) -> u64 {
    if total_rows == 0 || max_rows_per_part == 0 {
        0
    } else {
        total_rows.div_ceil(max_rows_per_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_file_names_are_one_indexed() {
        assert_eq!(FilePart::file_name_for(1), "transactions_part_1.csv");
        assert_eq!(FilePart::file_name_for(12), "transactions_part_12.csv");
    }

    #[test]
    fn test_expected_part_count() {
        assert_eq!(expected_part_count(0, 1_000_000), 0);
        assert_eq!(expected_part_count(1, 1_000_000), 1);
        assert_eq!(expected_part_count(1_000_000, 1_000_000), 1);
        assert_eq!(expected_part_count(1_000_001, 1_000_000), 2);
        assert_eq!(expected_part_count(3_000_000, 1_000_000), 3);
    }

    #[test]
    fn test_error_stage_names() {
        assert_eq!(ExportError::Write("disk full".into()).stage(), "write");
        assert_eq!(ExportError::SourceRead("x".into()).stage(), "source");
        assert_eq!(
            ExportError::Archive("gone".into()).to_string(),
            "Failed to build archive: gone"
        );
    }
}
