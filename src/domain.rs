use std::fmt;
use std::hash::{Hash, Hasher};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Phenotype,
    VarReport,
    DataDict,
    Special,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Phenotype => "phenotype",
            FileType::VarReport => "var_report",
            FileType::DataDict => "data_dict",
            FileType::Special => "special",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The per-cohort tables that are identical across every consent group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialCategory {
    Subject,
    Sample,
    Pedigree,
}

impl SpecialCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialCategory::Subject => "Subject",
            SpecialCategory::Sample => "Sample",
            SpecialCategory::Pedigree => "Pedigree",
        }
    }
}

impl fmt::Display for SpecialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields captured from a filename by the grammar that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFields {
    /// `phs<study>.v<n>.pht<table>.v<n>`, shared by every companion of one dataset.
    pub dataset_id: String,
    pub study: String,
    pub study_version: String,
    pub table: String,
    pub table_version: String,
    pub base: String,
    pub participant_set: Option<String>,
    /// Consent group index (`c<n>`); phenotype files only.
    pub partition: Option<String>,
    pub partition_label: Option<String>,
    pub extra: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    full_path: Utf8PathBuf,
    basename: String,
    file_type: Option<FileType>,
    fields: Option<CapturedFields>,
}

impl ClassifiedFile {
    pub fn new(
        full_path: Utf8PathBuf,
        file_type: Option<FileType>,
        fields: Option<CapturedFields>,
    ) -> Self {
        let basename = full_path.file_name().unwrap_or(full_path.as_str()).to_string();
        Self {
            full_path,
            basename,
            file_type,
            fields,
        }
    }

    pub fn full_path(&self) -> &Utf8Path {
        &self.full_path
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn file_type(&self) -> Option<FileType> {
        self.file_type
    }

    pub fn fields(&self) -> Option<&CapturedFields> {
        self.fields.as_ref()
    }

    pub fn is_classified(&self) -> bool {
        self.file_type.is_some()
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.fields.as_ref().map(|fields| fields.dataset_id.as_str())
    }

    pub fn base(&self) -> Option<&str> {
        self.fields.as_ref().map(|fields| fields.base.as_str())
    }

    pub fn partition(&self) -> Option<&str> {
        self.fields
            .as_ref()
            .and_then(|fields| fields.partition.as_deref())
    }
}

impl PartialEq for ClassifiedFile {
    fn eq(&self, other: &Self) -> bool {
        self.full_path == other.full_path
    }
}

impl Eq for ClassifiedFile {}

impl Hash for ClassifiedFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_path.hash(state);
    }
}

/// One logical dataset: its data files plus the shared companion metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    pub data_files: Vec<ClassifiedFile>,
    pub var_report: Option<ClassifiedFile>,
    pub data_dict: ClassifiedFile,
}

impl FileSet {
    pub fn dataset_id(&self) -> &str {
        self.data_dict.dataset_id().unwrap_or_default()
    }

    pub fn basenames(&self) -> Vec<String> {
        self.data_files
            .iter()
            .map(|file| file.basename().to_string())
            .collect()
    }

    /// Data files, then the var_report if any, then the data_dict.
    pub fn members(&self) -> impl Iterator<Item = &ClassifiedFile> {
        self.data_files
            .iter()
            .chain(self.var_report.iter())
            .chain(std::iter::once(&self.data_dict))
    }
}
