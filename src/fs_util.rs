use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use zip::ZipArchive;

use crate::error::OrganizeError;

const COMPARE_BUFFER: usize = 64 * 1024;

pub fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf, OrganizeError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| OrganizeError::NonUtf8Path(path.display().to_string()))
}

/// Canonical absolute form of an existing path.
pub fn absolute(path: &Path) -> Result<Utf8PathBuf, OrganizeError> {
    if !path.exists() {
        return Err(OrganizeError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let canonical = fs::canonicalize(path)
        .map_err(|err| OrganizeError::Filesystem(format!("resolve {}: {err}", path.display())))?;
    to_utf8(canonical)
}

/// Offset of the first differing byte, or `None` when both files are identical.
///
/// When one file is a strict prefix of the other the offset is the shorter length.
pub fn first_difference(a: &Utf8Path, b: &Utf8Path) -> Result<Option<u64>, OrganizeError> {
    let mut left = BufReader::with_capacity(COMPARE_BUFFER, open(a)?);
    let mut right = BufReader::with_capacity(COMPARE_BUFFER, open(b)?);
    let mut offset = 0u64;
    loop {
        let lhs = left.fill_buf().map_err(|err| read_error(a, err))?;
        let rhs = right.fill_buf().map_err(|err| read_error(b, err))?;
        if lhs.is_empty() && rhs.is_empty() {
            return Ok(None);
        }
        if lhs.is_empty() || rhs.is_empty() {
            return Ok(Some(offset));
        }
        let len = lhs.len().min(rhs.len());
        if let Some(pos) = lhs[..len].iter().zip(&rhs[..len]).position(|(x, y)| x != y) {
            return Ok(Some(offset + pos as u64));
        }
        left.consume(len);
        right.consume(len);
        offset += len as u64;
    }
}

/// Path to `target` expressed relative to the directory `from_dir`.
///
/// Both paths must be absolute.
pub fn relative_path(from_dir: &Utf8Path, target: &Utf8Path) -> Utf8PathBuf {
    let from = normal_components(from_dir);
    let to = normal_components(target);
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = Utf8PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component);
    }
    relative
}

fn normal_components(path: &Utf8Path) -> Vec<&str> {
    path.components()
        .filter_map(|component| match component {
            Utf8Component::Normal(value) => Some(value),
            _ => None,
        })
        .collect()
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), OrganizeError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| OrganizeError::Archive(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| OrganizeError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| OrganizeError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(OrganizeError::Archive(format!(
                    "zip entry path traversal detected in {}",
                    zip_path.display()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| OrganizeError::Archive(err.to_string()))?;
    }
    Ok(())
}

/// Decompress `gz_path` into `dest`, writing through a temp file in the same directory.
pub fn gunzip(gz_path: &Path, dest: &Path) -> Result<(), OrganizeError> {
    let parent = dest
        .parent()
        .ok_or_else(|| OrganizeError::Filesystem("invalid destination path".to_string()))?;
    let file = fs::File::open(gz_path)
        .map_err(|err| OrganizeError::Archive(format!("open gzip {}: {err}", gz_path.display())))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(file));
    let mut temp = tempfile::Builder::new()
        .prefix("dbgap-gunzip")
        .tempfile_in(parent)
        .map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
    io::copy(&mut decoder, temp.as_file_mut()).map_err(|err| {
        OrganizeError::Archive(format!("decompress {}: {err}", gz_path.display()))
    })?;
    temp.persist(dest)
        .map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
    Ok(())
}

fn open(path: &Utf8Path) -> Result<fs::File, OrganizeError> {
    fs::File::open(path.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => OrganizeError::NotFound {
            path: path.as_std_path().to_path_buf(),
        },
        _ => read_error(path, err),
    })
}

fn read_error(path: &Utf8Path, err: io::Error) -> OrganizeError {
    OrganizeError::Filesystem(format!("read {path}: {err}"))
}
