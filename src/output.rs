use std::io::{self, Write};

use serde::Serialize;

use crate::app::{OrganizeReport, ProgressEvent, ProgressSink};
use crate::domain::FileType;
use crate::inventory::Inventory;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &OrganizeReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Prints phase lines to stderr as the pipeline advances.
pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &OrganizeReport) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "dbGaP organize summary")?;
        writeln!(stdout, "  input:        {}", report.input_root)?;
        writeln!(stdout, "  output:       {}", report.output_root)?;
        writeln!(
            stdout,
            "  files:        {} ({} unclassified)",
            report.files, report.unclassified
        )?;
        writeln!(stdout, "  subject:      {}", report.subject)?;
        writeln!(stdout, "  sample:       {}", report.sample)?;
        writeln!(
            stdout,
            "  pedigree:     {}",
            report.pedigree.as_deref().unwrap_or("-")
        )?;
        writeln!(
            stdout,
            "  consent:      {}",
            report
                .consent_groups
                .iter()
                .map(|group| format!("c{group}"))
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        writeln!(
            stdout,
            "  phenotypes:   {} datasets",
            report.phenotype_datasets.len()
        )?;
        for dataset_id in &report.phenotype_datasets {
            writeln!(stdout, "    {dataset_id}")?;
        }
        match &report.links {
            Some(links) => writeln!(
                stdout,
                "  links:        {} created, {} already present, {} phenotype sets",
                links.created, links.existing, links.phenotype_sets
            )?,
            None => writeln!(stdout, "  links:        none (dry run)")?,
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    pub path: String,
    pub file_type: Option<FileType>,
    pub dataset_id: Option<String>,
    pub partition: Option<String>,
}

impl InventoryEntry {
    pub fn from_inventory(inventory: &Inventory) -> Vec<Self> {
        inventory
            .files()
            .iter()
            .map(|file| Self {
                path: file.full_path().to_string(),
                file_type: file.file_type(),
                dataset_id: file.dataset_id().map(str::to_string),
                partition: file.partition().map(str::to_string),
            })
            .collect()
    }
}

pub fn print_inventory(entries: &[InventoryEntry], mode: OutputMode) -> io::Result<()> {
    if let OutputMode::Json = mode {
        return JsonOutput::print_json(&entries);
    }
    let mut stdout = io::stdout().lock();
    for entry in entries {
        let file_type = entry
            .file_type
            .map(|file_type| file_type.as_str())
            .unwrap_or("unclassified");
        writeln!(
            stdout,
            "{file_type:<13} {:<28} {}",
            entry.dataset_id.as_deref().unwrap_or("-"),
            entry.path
        )?;
    }
    Ok(())
}
