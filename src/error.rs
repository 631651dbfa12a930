use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{FileType, SpecialCategory};

#[derive(Debug, Error, Diagnostic)]
pub enum OrganizeError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("no {file_type} found for dataset {dataset_id} (referenced by {reference})")]
    #[diagnostic(help("check that the companion metadata files were downloaded and unpacked"))]
    CompanionMissing {
        dataset_id: String,
        file_type: FileType,
        reference: Utf8PathBuf,
    },

    #[error("duplicate copies differ at byte {offset}: {first} vs {second}")]
    CompanionInconsistent {
        first: Utf8PathBuf,
        second: Utf8PathBuf,
        offset: u64,
    },

    #[error("expected {expected} files per set but found {actual}: {}", .basenames.join(", "))]
    CardinalityMismatch {
        basenames: Vec<String>,
        expected: usize,
        actual: usize,
    },

    #[error("file {basename} found in more than one location: {}", join_paths(.paths))]
    #[diagnostic(help("the same download was probably unpacked twice"))]
    DuplicateFile {
        basename: String,
        paths: Vec<Utf8PathBuf>,
    },

    #[error("consent column {column} not found in {path}")]
    ConsentColumnMissing { column: String, path: Utf8PathBuf },

    #[error("dataset {dataset_id} is missing consent groups: {}", .missing.join(", "))]
    ConsentGroupMismatch {
        dataset_id: String,
        missing: Vec<String>,
    },

    #[error("link target does not exist: {target}")]
    LinkTargetMissing { target: Utf8PathBuf },

    #[error("no {category} table found in the inventory")]
    SpecialMissing { category: SpecialCategory },

    #[error("malformed table {path}: {message}")]
    MalformedTable { path: Utf8PathBuf, message: String },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("external tool failed: {0}")]
    ToolFailed(String),
}

impl OrganizeError {
    /// True for failures of the reconciliation and validation engine itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrganizeError::CompanionMissing { .. }
                | OrganizeError::CompanionInconsistent { .. }
                | OrganizeError::CardinalityMismatch { .. }
                | OrganizeError::DuplicateFile { .. }
                | OrganizeError::ConsentColumnMissing { .. }
                | OrganizeError::ConsentGroupMismatch { .. }
                | OrganizeError::SpecialMissing { .. }
                | OrganizeError::MalformedTable { .. }
        )
    }
}

fn join_paths(paths: &[Utf8PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
