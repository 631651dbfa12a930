use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::consent;
use crate::domain::{FileSet, SpecialCategory};
use crate::error::OrganizeError;
use crate::fs_util;
use crate::inventory::Inventory;
use crate::linker::{self, LinkSummary};
use crate::prepare::{self, Decryptor};
use crate::reconcile;

#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    pub consent_variable: Option<String>,
    pub limit: Option<usize>,
    pub decrypt: bool,
    pub decompress: bool,
    pub lock_output: bool,
    pub dry_run: bool,
}

impl From<&ResolvedConfig> for OrganizeOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            consent_variable: config.consent_variable.clone(),
            limit: config.phenotype_limit,
            decrypt: config.decrypt,
            decompress: config.decompress,
            lock_output: config.lock_output,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizeReport {
    pub input_root: String,
    pub output_root: String,
    pub organized_at: String,
    pub dry_run: bool,
    pub archives_expanded: usize,
    pub files: usize,
    pub unclassified: usize,
    pub subject: String,
    pub sample: String,
    pub pedigree: Option<String>,
    pub phenotype_datasets: Vec<String>,
    pub consent_groups: Vec<String>,
    pub links: Option<LinkSummary>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Runs the whole preparation, reconciliation, validation and linking pipeline once.
pub struct Organizer<D: Decryptor> {
    decryptor: D,
}

impl<D: Decryptor> Organizer<D> {
    pub fn new(decryptor: D) -> Self {
        Self { decryptor }
    }

    pub fn run(
        &self,
        input_root: &Path,
        output_root: &Path,
        options: &OrganizeOptions,
        sink: &dyn ProgressSink,
    ) -> Result<OrganizeReport, OrganizeError> {
        let started = Instant::now();
        let input = fs_util::absolute(input_root)?;

        if options.decrypt && !options.dry_run {
            phase(sink, "phase=Decrypt", started);
            self.decryptor.decrypt(input.as_std_path())?;
        }
        let archives_expanded = if options.decompress && !options.dry_run {
            phase(sink, "phase=Decompress", started);
            prepare::decompress_tree(input.as_std_path())?
        } else {
            0
        };

        phase(sink, "phase=Inventory", started);
        let inventory = Inventory::build(input.as_std_path())?;

        phase(sink, "phase=Reconcile", started);
        let subject = required_special(&inventory, SpecialCategory::Subject)?;
        let sample = required_special(&inventory, SpecialCategory::Sample)?;
        let pedigree = reconcile::special_set(&inventory, SpecialCategory::Pedigree)?;
        let phenotypes = reconcile::phenotype_sets(&inventory)?;
        let others = reconcile::other_files(&inventory)?;

        phase(sink, "phase=Validate", started);
        let consent_groups =
            consent::validate(&subject, &phenotypes, options.consent_variable.as_deref())?;

        let (output, links) = if options.dry_run {
            (output_root.display().to_string(), None)
        } else {
            phase(sink, "phase=Link", started);
            fs::create_dir_all(output_root).map_err(|err| {
                OrganizeError::Filesystem(format!("create {}: {err}", output_root.display()))
            })?;
            let output = fs_util::absolute(output_root)?;
            let mut links = linker::materialize(
                &output,
                &subject,
                pedigree.as_ref(),
                &sample,
                &phenotypes,
                options.limit,
            )?;
            let other = linker::link_other(&output, &others)?;
            links.created += other.created;
            links.existing += other.existing;

            if options.lock_output {
                phase(sink, "phase=Lock", started);
                linker::lock_output(&output)?;
            }
            (output.to_string(), Some(links))
        };

        let report = OrganizeReport {
            input_root: input.to_string(),
            output_root: output,
            organized_at: Utc::now().to_rfc3339(),
            dry_run: options.dry_run,
            archives_expanded,
            files: inventory.len(),
            unclassified: inventory.unclassified().count(),
            subject: subject.dataset_id().to_string(),
            sample: sample.dataset_id().to_string(),
            pedigree: pedigree.as_ref().map(|set| set.dataset_id().to_string()),
            phenotype_datasets: phenotypes
                .iter()
                .map(|set| set.dataset_id().to_string())
                .collect(),
            consent_groups,
            links,
        };
        info!(
            phenotype_sets = report.phenotype_datasets.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "organize finished"
        );
        phase(sink, "phase=Done", started);
        Ok(report)
    }
}

fn required_special(
    inventory: &Inventory,
    category: SpecialCategory,
) -> Result<FileSet, OrganizeError> {
    reconcile::special_set(inventory, category)?
        .ok_or(OrganizeError::SpecialMissing { category })
}

fn phase(sink: &dyn ProgressSink, message: &str, started: Instant) {
    sink.event(ProgressEvent {
        message: message.to_string(),
        elapsed: Some(started.elapsed()),
    });
}
