use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::{ClassifiedFile, FileSet};
use crate::error::OrganizeError;
use crate::fs_util;

pub const SUBJECT_DIR: &str = "Subject";
pub const PHENOTYPE_DIR: &str = "Phenotypes";
pub const OTHER_DIR: &str = "Other";

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkSummary {
    pub created: usize,
    pub existing: usize,
    pub phenotype_sets: usize,
}

impl LinkSummary {
    fn record(&mut self, outcome: LinkOutcome) {
        match outcome {
            LinkOutcome::Created => self.created += 1,
            LinkOutcome::Existing => self.existing += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Existing,
}

/// Link the special sets into `Subject/` and up to `limit` phenotype sets into `Phenotypes/`.
pub fn materialize(
    output_root: &Utf8Path,
    subject: &FileSet,
    pedigree: Option<&FileSet>,
    sample: &FileSet,
    phenotype_sets: &[FileSet],
    limit: Option<usize>,
) -> Result<LinkSummary, OrganizeError> {
    let mut summary = LinkSummary::default();

    let subject_dir = ensure_dir(&output_root.join(SUBJECT_DIR))?;
    for set in [Some(subject), Some(sample), pedigree].into_iter().flatten() {
        link_set(set, &subject_dir, &mut summary)?;
    }

    let phenotype_dir = ensure_dir(&output_root.join(PHENOTYPE_DIR))?;
    let limit = limit.unwrap_or(phenotype_sets.len());
    for set in phenotype_sets.iter().take(limit) {
        link_set(set, &phenotype_dir, &mut summary)?;
        summary.phenotype_sets += 1;
    }

    info!(
        output = %output_root,
        created = summary.created,
        existing = summary.existing,
        phenotype_sets = summary.phenotype_sets,
        "linked file sets"
    );
    Ok(summary)
}

/// Link files no grammar recognised into `Other/`.
pub fn link_other<'a>(
    output_root: &Utf8Path,
    files: impl IntoIterator<Item = &'a ClassifiedFile>,
) -> Result<LinkSummary, OrganizeError> {
    let mut summary = LinkSummary::default();
    let mut files = files.into_iter().peekable();
    if files.peek().is_none() {
        return Ok(summary);
    }
    let other_dir = ensure_dir(&output_root.join(OTHER_DIR))?;
    for file in files {
        summary.record(link_file(file.full_path(), &other_dir)?);
    }
    Ok(summary)
}

/// Create `dest_dir/<basename>` as a relative symlink to `source`.
///
/// An existing link that already resolves to `source` is left alone.
pub fn link_file(source: &Utf8Path, dest_dir: &Utf8Path) -> Result<LinkOutcome, OrganizeError> {
    if !source.as_std_path().exists() {
        return Err(OrganizeError::LinkTargetMissing {
            target: source.to_path_buf(),
        });
    }
    let name = source
        .file_name()
        .ok_or_else(|| OrganizeError::Filesystem(format!("no file name in {source}")))?;
    let link = dest_dir.join(name);
    let relative = fs_util::relative_path(dest_dir, source);

    match fs::read_link(link.as_std_path()) {
        Ok(current) if current == relative.as_std_path() => {
            debug!(link = %link, "link already present");
            return Ok(LinkOutcome::Existing);
        }
        Ok(current) => {
            return Err(OrganizeError::Filesystem(format!(
                "{link} already links to {}",
                current.display()
            )));
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) if link.as_std_path().exists() => {
            return Err(OrganizeError::Filesystem(format!(
                "{link} exists and is not a link: {err}"
            )));
        }
        Err(err) => {
            return Err(OrganizeError::Filesystem(format!("inspect {link}: {err}")));
        }
    }

    symlink(&relative, &link)
        .map_err(|err| OrganizeError::Filesystem(format!("link {link} -> {relative}: {err}")))?;
    if fs::metadata(link.as_std_path()).is_err() {
        return Err(OrganizeError::LinkTargetMissing {
            target: source.to_path_buf(),
        });
    }
    debug!(link = %link, target = %relative, "linked");
    Ok(LinkOutcome::Created)
}

/// Remove write permission from every directory and regular file under `root`.
///
/// Symlinks are not followed, so link targets in the source tree stay untouched.
pub fn lock_output(root: &Utf8Path) -> Result<usize, OrganizeError> {
    let mut locked = 0;
    for entry in WalkDir::new(root.as_std_path())
        .follow_links(false)
        .contents_first(true)
    {
        let entry = entry.map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
        if entry.file_type().is_symlink() {
            continue;
        }
        let mut permissions = entry
            .metadata()
            .map_err(|err| OrganizeError::Filesystem(err.to_string()))?
            .permissions();
        permissions.set_readonly(true);
        fs::set_permissions(entry.path(), permissions)
            .map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
        locked += 1;
    }
    info!(root = %root, entries = locked, "output locked");
    Ok(locked)
}

fn link_set(
    set: &FileSet,
    dest_dir: &Utf8Path,
    summary: &mut LinkSummary,
) -> Result<(), OrganizeError> {
    for file in set.members() {
        summary.record(link_file(file.full_path(), dest_dir)?);
    }
    Ok(())
}

fn ensure_dir(path: &Utf8Path) -> Result<Utf8PathBuf, OrganizeError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| OrganizeError::Filesystem(format!("create {path}: {err}")))?;
    fs_util::absolute(path.as_std_path())
}

#[cfg(unix)]
fn symlink(target: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target.as_std_path(), link.as_std_path())
}

#[cfg(windows)]
fn symlink(target: &Utf8Path, link: &Utf8Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target.as_std_path(), link.as_std_path())
}
