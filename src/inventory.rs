use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::classify::classify;
use crate::domain::{ClassifiedFile, FileType};
use crate::error::OrganizeError;
use crate::fs_util;

/// Every regular file found under one root, classified, in sorted traversal order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    files: Vec<ClassifiedFile>,
}

impl Inventory {
    pub fn build(root: &Path) -> Result<Self, OrganizeError> {
        let root = fs_util::absolute(root)?;

        // Entries are sorted by name so the inventory order does not depend on the filesystem.
        let walker = WalkDir::new(root.as_std_path())
            .follow_links(false)
            .sort_by_file_name();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| OrganizeError::Filesystem(err.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = fs_util::to_utf8(entry.into_path())?;
            let basename = path.file_name().unwrap_or_default();
            let file = match classify(basename) {
                Some((file_type, fields)) => {
                    ClassifiedFile::new(path.clone(), Some(file_type), Some(fields))
                }
                None => ClassifiedFile::new(path.clone(), None, None),
            };
            debug!(path = %path, file_type = ?file.file_type(), "classified");
            files.push(file);
        }

        let inventory = Self { files };
        info!(
            root = %root,
            total = inventory.len(),
            unclassified = inventory.unclassified().count(),
            "inventory built"
        );
        Ok(inventory)
    }

    pub fn files(&self) -> &[ClassifiedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn of_type(&self, file_type: FileType) -> impl Iterator<Item = &ClassifiedFile> {
        self.files
            .iter()
            .filter(move |file| file.file_type() == Some(file_type))
    }

    pub fn unclassified(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.files.iter().filter(|file| !file.is_classified())
    }
}
