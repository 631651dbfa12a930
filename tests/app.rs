#![cfg(unix)]

mod common;

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use assert_matches::assert_matches;

use dbgap_organizer::app::{OrganizeOptions, Organizer, ProgressEvent, ProgressSink};
use dbgap_organizer::error::OrganizeError;
use dbgap_organizer::prepare::{Decryptor, NoDecrypt};

use common::*;

#[derive(Default)]
struct RecordingSink {
    phases: RefCell<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.phases.borrow_mut().push(event.message);
    }
}

struct FailingDecryptor;

impl Decryptor for FailingDecryptor {
    fn decrypt(&self, _root: &Path) -> Result<(), OrganizeError> {
        Err(OrganizeError::ToolFailed("bad key".to_string()))
    }
}

fn options() -> OrganizeOptions {
    OrganizeOptions {
        decompress: true,
        ..OrganizeOptions::default()
    }
}

#[test]
fn organize_links_curated_layout() {
    let release = Release::standard();
    release.write("c1", "README.txt", "release notes");
    let out = tempfile::tempdir().unwrap();
    let output = out.path().join("organized");

    let sink = RecordingSink::default();
    let report = Organizer::new(NoDecrypt)
        .run(release.root(), &output, &options(), &sink)
        .unwrap();

    assert_eq!(report.consent_groups, vec!["1", "2"]);
    assert_eq!(report.phenotype_datasets.len(), 2);
    assert_eq!(report.unclassified, 1);
    assert!(report.pedigree.is_none());

    let subject_dir = output.join("Subject");
    for name in [SUBJECT, SUBJECT_DICT, SUBJECT_REPORT, SAMPLE, SAMPLE_DICT] {
        let link = subject_dir.join(name);
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(fs::read_link(&link).unwrap().is_relative());
        assert!(link.exists(), "{name} should resolve");
    }

    let phenotype_dir = output.join("Phenotypes");
    for name in [
        ecg("c1", "NPU"),
        ecg("c2", "GRU"),
        ECG_DICT.to_string(),
        ECG_REPORT.to_string(),
        sleep("c1", "NPU"),
        sleep("c2", "GRU"),
        SLEEP_DICT.to_string(),
    ] {
        assert!(phenotype_dir.join(&name).exists(), "{name} should be linked");
    }
    assert_eq!(
        fs::read_to_string(output.join("Other").join("README.txt")).unwrap(),
        "release notes"
    );

    let links = report.links.unwrap();
    assert_eq!(links.phenotype_sets, 2);
    assert_eq!(links.created, 5 + 7 + 1);

    let phases = sink.phases.borrow();
    assert_eq!(phases.first().map(String::as_str), Some("phase=Decompress"));
    assert_eq!(phases.last().map(String::as_str), Some("phase=Done"));
}

#[test]
fn repeated_unclassified_file_is_linked_once() {
    let release = Release::standard();
    let archived = format!("{ECG_REPORT}.gz");
    for (group, _) in CONSENT_DIRS {
        release.write(group, &archived, "packed report");
    }
    let out = tempfile::tempdir().unwrap();
    let options = OrganizeOptions {
        decompress: false,
        ..options()
    };

    let report = Organizer::new(NoDecrypt)
        .run(release.root(), out.path(), &options, &RecordingSink::default())
        .unwrap();

    assert_eq!(report.unclassified, 2);
    let other_dir = out.path().join("Other");
    assert_eq!(fs::read_dir(&other_dir).unwrap().count(), 1);
    let target = fs::read_link(other_dir.join(&archived)).unwrap();
    assert!(target.to_string_lossy().contains("/c1/"));
}

#[test]
fn differing_unclassified_copies_abort_before_linking() {
    let release = Release::standard();
    release.write("c1", "README.txt", "release notes for c1");
    release.write("c2", "README.txt", "release notes for c2");
    let out = tempfile::tempdir().unwrap();

    let err = Organizer::new(NoDecrypt)
        .run(release.root(), out.path(), &options(), &RecordingSink::default())
        .unwrap_err();

    assert_matches!(err, OrganizeError::CompanionInconsistent { offset: 19, .. });
    assert!(!out.path().join("Phenotypes").exists());
    assert!(!out.path().join("Other").exists());
}

#[test]
fn organize_is_idempotent() {
    let release = Release::standard();
    let out = tempfile::tempdir().unwrap();

    let organizer = Organizer::new(NoDecrypt);
    let first = organizer
        .run(release.root(), out.path(), &options(), &RecordingSink::default())
        .unwrap();
    let second = organizer
        .run(release.root(), out.path(), &options(), &RecordingSink::default())
        .unwrap();

    assert_eq!(first.phenotype_datasets, second.phenotype_datasets);
    let links = second.links.unwrap();
    assert_eq!(links.created, 0);
    assert_eq!(links.existing, first.links.unwrap().created);
}

#[test]
fn limit_caps_phenotype_sets() {
    let release = Release::standard();
    let out = tempfile::tempdir().unwrap();
    let options = OrganizeOptions {
        limit: Some(1),
        ..options()
    };

    let report = Organizer::new(NoDecrypt)
        .run(release.root(), out.path(), &options, &RecordingSink::default())
        .unwrap();

    assert_eq!(report.links.unwrap().phenotype_sets, 1);
    let linked = fs::read_dir(out.path().join("Phenotypes")).unwrap().count();
    assert_eq!(linked, 4);
}

#[test]
fn dry_run_leaves_output_untouched() {
    let release = Release::standard();
    let out = tempfile::tempdir().unwrap();
    let output = out.path().join("organized");
    let options = OrganizeOptions {
        dry_run: true,
        ..options()
    };

    let report = Organizer::new(NoDecrypt)
        .run(release.root(), &output, &options, &RecordingSink::default())
        .unwrap();

    assert!(report.links.is_none());
    assert!(!output.exists());
}

#[test]
fn missing_sample_table_aborts() {
    let release = Release::standard();
    for (group, _) in CONSENT_DIRS {
        release.remove(group, SAMPLE);
    }
    let out = tempfile::tempdir().unwrap();

    let err = Organizer::new(NoDecrypt)
        .run(release.root(), out.path(), &options(), &RecordingSink::default())
        .unwrap_err();
    assert_matches!(err, OrganizeError::SpecialMissing { .. });
    assert!(!out.path().join("Subject").exists());
}

#[test]
fn decrypt_failure_aborts() {
    let release = Release::standard();
    let out = tempfile::tempdir().unwrap();
    let options = OrganizeOptions {
        decrypt: true,
        ..options()
    };

    let err = Organizer::new(FailingDecryptor)
        .run(release.root(), out.path(), &options, &RecordingSink::default())
        .unwrap_err();
    assert_matches!(err, OrganizeError::ToolFailed(_));
}

#[test]
fn missing_input_is_not_found() {
    let out = tempfile::tempdir().unwrap();
    let err = Organizer::new(NoDecrypt)
        .run(
            &out.path().join("absent"),
            out.path(),
            &options(),
            &RecordingSink::default(),
        )
        .unwrap_err();
    assert_matches!(err, OrganizeError::NotFound { .. });
}

#[test]
fn lock_removes_write_permission() {
    let release = Release::standard();
    let out = tempfile::tempdir().unwrap();
    let options = OrganizeOptions {
        lock_output: true,
        ..options()
    };

    Organizer::new(NoDecrypt)
        .run(release.root(), out.path(), &options, &RecordingSink::default())
        .unwrap();

    let phenotype_dir = out.path().join("Phenotypes");
    let permissions = fs::metadata(&phenotype_dir).unwrap().permissions();
    assert!(permissions.readonly());
    // source files behind the links keep their permissions
    assert!(
        !fs::metadata(release.path("c1", ECG_DICT))
            .unwrap()
            .permissions()
            .readonly()
    );

    for dir in ["Subject", "Phenotypes", ""] {
        let path = out.path().join(dir);
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(&path, permissions).unwrap();
    }
}
