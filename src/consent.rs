use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;
use tracing::{debug, info};

use crate::domain::FileSet;
use crate::error::OrganizeError;

/// Consent value meaning "no consent"; never a real consent group.
pub const NO_CONSENT: &str = "0";

/// Position of the consent column when no variable name is given.
const DEFAULT_CONSENT_COLUMN: usize = 2;

/// Cross-check every phenotype set against the consent groups listed in the Subject table.
///
/// Returns the consent groups in natural order.
pub fn validate(
    subject_set: &FileSet,
    phenotype_sets: &[FileSet],
    consent_variable: Option<&str>,
) -> Result<Vec<String>, OrganizeError> {
    let subject = subject_set
        .data_files
        .first()
        .ok_or_else(|| OrganizeError::MalformedTable {
            path: subject_set.data_dict.full_path().to_path_buf(),
            message: "subject set has no data file".to_string(),
        })?;
    let groups = read_consent_groups(subject.full_path(), consent_variable)?;
    info!(
        subject = %subject.full_path(),
        groups = %groups.join(","),
        "consent groups"
    );

    for set in phenotype_sets {
        check_set(set, &groups)?;
    }
    Ok(groups)
}

/// Distinct consent values of a tab-delimited Subject table, `0` excluded.
pub fn read_consent_groups(
    path: &Utf8Path,
    consent_variable: Option<&str>,
) -> Result<Vec<String>, OrganizeError> {
    let content = fs::read(path.as_std_path())
        .map_err(|err| OrganizeError::Filesystem(format!("read {path}: {err}")))?;
    let table = strip_preamble(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(table);

    // Only the header row and the consent cells are decoded; other columns may hold Latin-1.
    let headers = reader
        .byte_headers()
        .map_err(|err| malformed(path, err))?
        .iter()
        .map(|header| String::from_utf8_lossy(header).trim().to_string())
        .collect::<Vec<_>>();
    let column = match consent_variable {
        Some(name) => headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| OrganizeError::ConsentColumnMissing {
                column: name.to_string(),
                path: path.to_path_buf(),
            })?,
        None if headers.len() > DEFAULT_CONSENT_COLUMN => DEFAULT_CONSENT_COLUMN,
        None => {
            return Err(OrganizeError::MalformedTable {
                path: path.to_path_buf(),
                message: format!("header has only {} columns", headers.len()),
            });
        }
    };
    debug!(%path, column, header = %headers[column], "consent column");

    let mut values = BTreeSet::new();
    for (row, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| malformed(path, err))?;
        let cell = record
            .get(column)
            .ok_or_else(|| OrganizeError::MalformedTable {
                path: path.to_path_buf(),
                message: format!("row {} has no column {}", row + 1, column + 1),
            })?;
        let value = String::from_utf8_lossy(cell);
        let value = value.trim();
        if value.is_empty() || value == NO_CONSENT {
            continue;
        }
        values.insert(value.to_string());
    }

    let mut groups = values.into_iter().collect::<Vec<_>>();
    groups.sort_by(|a, b| natural_cmp(a, b));
    Ok(groups)
}

fn check_set(set: &FileSet, groups: &[String]) -> Result<(), OrganizeError> {
    let mut basenames = set.basenames();
    basenames.sort();

    let missing = groups
        .iter()
        .filter(|group| {
            let needle = format!(".c{group}.");
            !basenames.iter().any(|name| name.contains(&needle))
        })
        .map(|group| format!("c{group}"))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(OrganizeError::ConsentGroupMismatch {
            dataset_id: set.dataset_id().to_string(),
            missing,
        });
    }

    if basenames.len() != groups.len() {
        return Err(OrganizeError::CardinalityMismatch {
            basenames,
            expected: groups.len(),
            actual: set.data_files.len(),
        });
    }
    debug!(dataset_id = set.dataset_id(), "consent groups match");
    Ok(())
}

/// Skip the leading blank and `#` lines that precede the header row.
fn strip_preamble(content: &[u8]) -> &[u8] {
    let skipped = content
        .split_inclusive(|byte| *byte == b'\n')
        .take_while(|line| line.trim_ascii().is_empty() || line.starts_with(b"#"))
        .map(<[u8]>::len)
        .sum::<usize>();
    &content[skipped..]
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn malformed(path: &Utf8Path, err: csv::Error) -> OrganizeError {
    OrganizeError::MalformedTable {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
