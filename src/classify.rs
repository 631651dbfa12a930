use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::{CapturedFields, FileType};

const DATASET_ID: &str = r"(?P<dataset_id>phs(?P<study>\d{6})\.v(?P<study_version>\d+)\.pht(?P<table>\d{6})\.v(?P<table_version>\d+))";

struct Grammar {
    file_type: FileType,
    pattern: Regex,
}

/// Filename grammars in priority order. The first match wins.
static GRAMMARS: LazyLock<Vec<Grammar>> = LazyLock::new(|| {
    [
        (
            FileType::DataDict,
            r"\.(?P<base>.+?)\.data_dict(?P<extra>\w+?)\.xml",
        ),
        (
            FileType::Phenotype,
            r"\.p(?P<participant_set>\d+)\.c(?P<partition>\d+)\.(?P<base>.+?)\.(?P<partition_label>.+?)\.txt",
        ),
        (
            FileType::VarReport,
            r"\.p(?P<participant_set>\d+)\.(?P<base>.+?)\.var_report(?P<extra>\w+?)\.xml",
        ),
        (
            FileType::Special,
            r"\.p(?P<participant_set>\d+)\.(?P<base>.+?)\.MULTI\.txt",
        ),
    ]
    .into_iter()
    .map(|(file_type, tail)| Grammar {
        file_type,
        pattern: Regex::new(&format!("^{DATASET_ID}{tail}$")).expect("filename grammar"),
    })
    .collect()
});

/// Classify a bare filename. Returns `None` when no grammar matches.
pub fn classify(basename: &str) -> Option<(FileType, CapturedFields)> {
    GRAMMARS.iter().find_map(|grammar| {
        grammar
            .pattern
            .captures(basename)
            .map(|caps| (grammar.file_type, captured_fields(&caps)))
    })
}

fn captured_fields(caps: &Captures<'_>) -> CapturedFields {
    let required = |name: &str| {
        caps.name(name)
            .map(|value| value.as_str().to_string())
            .unwrap_or_default()
    };
    let optional = |name: &str| caps.name(name).map(|value| value.as_str().to_string());

    CapturedFields {
        dataset_id: required("dataset_id"),
        study: required("study"),
        study_version: required("study_version"),
        table: required("table"),
        table_version: required("table_version"),
        base: required("base"),
        participant_set: optional("participant_set"),
        partition: optional("partition"),
        partition_label: optional("partition_label"),
        extra: optional("extra"),
    }
}
