use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::companion::{MatchPolicy, ensure_identical, find_companion, select_representative};
use crate::domain::{ClassifiedFile, FileSet, FileType, SpecialCategory};
use crate::error::OrganizeError;
use crate::inventory::Inventory;

/// Build the file set for one special table, or `None` when the inventory has none.
///
/// Every copy of the table (one per consent group download) must be identical; the copy
/// with the smallest path is kept.
pub fn special_set(
    inventory: &Inventory,
    category: SpecialCategory,
) -> Result<Option<FileSet>, OrganizeError> {
    let records = inventory
        .of_type(FileType::Special)
        .filter(|file| {
            file.base()
                .map(|base| base.contains(category.as_str()))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    let Some(representative) = select_representative(&records) else {
        debug!(%category, "no special table");
        return Ok(None);
    };
    ensure_identical(&records)?;

    let set = attach_companions(inventory, representative, vec![representative.clone()])?;
    info!(
        %category,
        dataset_id = set.dataset_id(),
        copies = records.len(),
        "special set reconciled"
    );
    Ok(Some(set))
}

/// Group phenotype files by dataset id and reconcile each group with its companions.
///
/// Every group must hold the same number of files and no basename may appear twice
/// within a group.
pub fn phenotype_sets(inventory: &Inventory) -> Result<Vec<FileSet>, OrganizeError> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&ClassifiedFile>> = HashMap::new();
    for file in inventory.of_type(FileType::Phenotype) {
        let dataset_id = file.dataset_id().unwrap_or_default();
        groups
            .entry(dataset_id)
            .or_insert_with(|| {
                order.push(dataset_id);
                Vec::new()
            })
            .push(file);
    }

    let mut sets = Vec::with_capacity(order.len());
    for dataset_id in order {
        let Some(mut members) = groups.remove(dataset_id) else {
            continue;
        };
        members.sort_by(|a, b| {
            a.basename()
                .cmp(b.basename())
                .then_with(|| a.full_path().as_str().cmp(b.full_path().as_str()))
        });
        let data_files = members.iter().map(|file| (*file).clone()).collect();
        sets.push(attach_companions(inventory, members[0], data_files)?);
    }

    for set in &sets {
        check_duplicates(set)?;
    }

    let expected = sets
        .iter()
        .map(|set| set.data_files.len())
        .max()
        .unwrap_or(0);
    for set in &sets {
        if set.data_files.len() != expected {
            return Err(OrganizeError::CardinalityMismatch {
                basenames: set.basenames(),
                expected,
                actual: set.data_files.len(),
            });
        }
    }

    info!(
        sets = sets.len(),
        partitions = expected,
        "phenotype sets reconciled"
    );
    Ok(sets)
}

/// One file per distinct basename among the files no grammar recognised.
///
/// An unclassified file repeated in several consent group downloads must be identical in
/// every copy; the copy with the smallest path is kept.
pub fn other_files(inventory: &Inventory) -> Result<Vec<ClassifiedFile>, OrganizeError> {
    let mut by_name: BTreeMap<&str, Vec<&ClassifiedFile>> = BTreeMap::new();
    for file in inventory.unclassified() {
        by_name.entry(file.basename()).or_default().push(file);
    }

    let mut files = Vec::with_capacity(by_name.len());
    for (basename, copies) in by_name {
        ensure_identical(&copies)?;
        if let Some(file) = select_representative(&copies) {
            debug!(basename, copies = copies.len(), "unclassified file");
            files.push(file.clone());
        }
    }
    Ok(files)
}

fn attach_companions(
    inventory: &Inventory,
    reference: &ClassifiedFile,
    data_files: Vec<ClassifiedFile>,
) -> Result<FileSet, OrganizeError> {
    let var_report = find_companion(
        inventory,
        reference,
        FileType::VarReport,
        MatchPolicy::OPTIONAL,
    )?
    .cloned();
    let data_dict = find_companion(
        inventory,
        reference,
        FileType::DataDict,
        MatchPolicy::REQUIRED,
    )?
    .cloned()
    .ok_or_else(|| OrganizeError::CompanionMissing {
        dataset_id: reference.dataset_id().unwrap_or_default().to_string(),
        file_type: FileType::DataDict,
        reference: reference.full_path().to_path_buf(),
    })?;

    Ok(FileSet {
        data_files,
        var_report,
        data_dict,
    })
}

fn check_duplicates(set: &FileSet) -> Result<(), OrganizeError> {
    let mut by_name: BTreeMap<&str, Vec<&ClassifiedFile>> = BTreeMap::new();
    for file in &set.data_files {
        by_name.entry(file.basename()).or_default().push(file);
    }
    match by_name.into_iter().find(|(_, files)| files.len() > 1) {
        Some((basename, files)) => Err(OrganizeError::DuplicateFile {
            basename: basename.to_string(),
            paths: files
                .iter()
                .map(|file| file.full_path().to_path_buf())
                .collect(),
        }),
        None => Ok(()),
    }
}
