use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::OrganizeError;
use crate::fs_util;

/// Decrypts an encrypted dbGaP download tree in place.
pub trait Decryptor {
    fn decrypt(&self, root: &Path) -> Result<(), OrganizeError>;
}

/// Runs the SRA Toolkit `vdb-decrypt` binary over the input tree.
#[derive(Debug, Clone)]
pub struct SystemDecryptor {
    program: Option<PathBuf>,
}

impl SystemDecryptor {
    pub fn new() -> Self {
        Self {
            program: find_in_path("vdb-decrypt"),
        }
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            program: Some(program),
        }
    }
}

impl Default for SystemDecryptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decryptor for SystemDecryptor {
    fn decrypt(&self, root: &Path) -> Result<(), OrganizeError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| OrganizeError::MissingTool("vdb-decrypt".to_string()))?;
        info!(root = %root.display(), program = %program.display(), "decrypting");
        run_cmd(program, &[root.to_string_lossy().to_string()])
    }
}

/// Leaves the tree untouched; for already-decrypted downloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecrypt;

impl Decryptor for NoDecrypt {
    fn decrypt(&self, _root: &Path) -> Result<(), OrganizeError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    Gzip,
    Tar,
}

/// Expand every archive under `root` next to itself until none remain.
///
/// Each archive is removed once expanded. Returns the number of archives expanded.
pub fn decompress_tree(root: &Path) -> Result<usize, OrganizeError> {
    if !root.exists() {
        return Err(OrganizeError::NotFound {
            path: root.to_path_buf(),
        });
    }
    let mut expanded = 0;
    loop {
        let archives = find_archives(root)?;
        if archives.is_empty() {
            break;
        }
        for (path, kind) in archives {
            expand(&path, kind)?;
            fs::remove_file(&path).map_err(|err| {
                OrganizeError::Filesystem(format!("remove {}: {err}", path.display()))
            })?;
            expanded += 1;
        }
    }
    info!(root = %root.display(), archives = expanded, "decompressed");
    Ok(expanded)
}

fn find_archives(root: &Path) -> Result<Vec<(PathBuf, ArchiveKind)>, OrganizeError> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = archive_kind(entry.path()) {
            archives.push((entry.into_path(), kind));
        }
    }
    Ok(archives)
}

fn archive_kind(path: &Path) -> Option<ArchiveKind> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(".zip") {
        Some(ArchiveKind::Zip)
    } else if name.ends_with(".gz") || name.ends_with(".tgz") {
        Some(ArchiveKind::Gzip)
    } else if name.ends_with(".tar") {
        Some(ArchiveKind::Tar)
    } else {
        None
    }
}

fn expand(path: &Path, kind: ArchiveKind) -> Result<(), OrganizeError> {
    let parent = path
        .parent()
        .ok_or_else(|| OrganizeError::Filesystem(format!("no parent for {}", path.display())))?;
    debug!(archive = %path.display(), ?kind, "expanding");
    match kind {
        ArchiveKind::Zip => fs_util::extract_zip(path, parent),
        ArchiveKind::Gzip => fs_util::gunzip(path, &gunzip_target(path)),
        ArchiveKind::Tar => {
            let tar = find_in_path("tar")
                .ok_or_else(|| OrganizeError::MissingTool("tar".to_string()))?;
            run_cmd(
                &tar,
                &[
                    "-xf".to_string(),
                    path.to_string_lossy().to_string(),
                    "-C".to_string(),
                    parent.to_string_lossy().to_string(),
                ],
            )
        }
    }
}

/// `x.txt.gz` -> `x.txt`, `x.tgz` -> `x.tar`.
fn gunzip_target(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let target = if let Some(stem) = name.strip_suffix(".tgz") {
        format!("{stem}.tar")
    } else if let Some(stem) = name.strip_suffix(".gz") {
        stem.to_string()
    } else {
        warn!(archive = %path.display(), "unexpected gzip name");
        format!("{name}.out")
    };
    path.with_file_name(target)
}

fn run_cmd(program: &Path, args: &[String]) -> Result<(), OrganizeError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| OrganizeError::ToolFailed(format!("{}: {err}", program.display())))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("command failed: {}", program.display())
    } else {
        stderr
    };
    Err(OrganizeError::ToolFailed(message))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn gunzip_names() {
        assert_eq!(
            gunzip_target(Path::new("/d/a.var_report.xml.gz")),
            PathBuf::from("/d/a.var_report.xml")
        );
        assert_eq!(
            gunzip_target(Path::new("/d/release.tgz")),
            PathBuf::from("/d/release.tar")
        );
    }

    #[test]
    fn expands_gzip_in_place() {
        let temp = tempfile::tempdir().unwrap();
        let gz = temp.path().join("table.txt.gz");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"ID\tCONSENT\n").unwrap();
        fs::write(&gz, encoder.finish().unwrap()).unwrap();

        assert_eq!(decompress_tree(temp.path()).unwrap(), 1);
        assert!(!gz.exists());
        assert_eq!(
            fs::read(temp.path().join("table.txt")).unwrap(),
            b"ID\tCONSENT\n"
        );
    }

    #[test]
    fn missing_decrypt_tool_is_reported() {
        let decryptor = SystemDecryptor { program: None };
        let err = decryptor.decrypt(Path::new("/tmp")).unwrap_err();
        assert_matches!(err, OrganizeError::MissingTool(_));
    }
}
