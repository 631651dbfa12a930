use tracing::debug;

use crate::domain::{ClassifiedFile, FileType};
use crate::error::OrganizeError;
use crate::fs_util;
use crate::inventory::Inventory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    /// Require every candidate to be byte-for-byte identical.
    pub verify_identical: bool,
    /// Fail with `CompanionMissing` instead of returning `None` when nothing matches.
    pub required: bool,
}

impl MatchPolicy {
    pub const REQUIRED: MatchPolicy = MatchPolicy {
        verify_identical: true,
        required: true,
    };

    pub const OPTIONAL: MatchPolicy = MatchPolicy {
        verify_identical: true,
        required: false,
    };
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::REQUIRED
    }
}

/// Find the `target_type` companion of `reference` in `inventory`.
///
/// Candidates share the reference's dataset id. The representative is the candidate
/// whose full path is smallest as a plain string.
pub fn find_companion<'a>(
    inventory: &'a Inventory,
    reference: &ClassifiedFile,
    target_type: FileType,
    policy: MatchPolicy,
) -> Result<Option<&'a ClassifiedFile>, OrganizeError> {
    let dataset_id = reference.dataset_id().unwrap_or_default();
    let candidates = inventory
        .of_type(target_type)
        .filter(|file| file.dataset_id() == reference.dataset_id())
        .collect::<Vec<_>>();

    if candidates.is_empty() {
        if policy.required {
            return Err(OrganizeError::CompanionMissing {
                dataset_id: dataset_id.to_string(),
                file_type: target_type,
                reference: reference.full_path().to_path_buf(),
            });
        }
        debug!(dataset_id, file_type = %target_type, "no optional companion");
        return Ok(None);
    }

    if policy.verify_identical {
        ensure_identical(&candidates)?;
    }

    let selected = select_representative(&candidates);
    if let Some(file) = selected {
        debug!(
            dataset_id,
            file_type = %target_type,
            candidates = candidates.len(),
            selected = %file.full_path(),
            "matched companion"
        );
    }
    Ok(selected)
}

/// Fail with `CompanionInconsistent` unless every file has the same content.
pub fn ensure_identical(files: &[&ClassifiedFile]) -> Result<(), OrganizeError> {
    let Some(first) = select_representative(files) else {
        return Ok(());
    };
    for other in files {
        if other.full_path() == first.full_path() {
            continue;
        }
        if let Some(offset) = fs_util::first_difference(first.full_path(), other.full_path())? {
            return Err(OrganizeError::CompanionInconsistent {
                first: first.full_path().to_path_buf(),
                second: other.full_path().to_path_buf(),
                offset,
            });
        }
    }
    Ok(())
}

/// The file whose full path is smallest by plain string comparison.
pub fn select_representative<'a>(files: &[&'a ClassifiedFile]) -> Option<&'a ClassifiedFile> {
    files
        .iter()
        .copied()
        .min_by(|a, b| a.full_path().as_str().cmp(b.full_path().as_str()))
}
