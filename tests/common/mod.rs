#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const SUBJECT: &str = "phs000284.v1.pht001902.v1.p1.CFS_CARe_Subject.MULTI.txt";
pub const SUBJECT_DICT: &str = "phs000284.v1.pht001902.v1.CFS_CARe_Subject.data_dict_2011_02_07.xml";
pub const SUBJECT_REPORT: &str =
    "phs000284.v1.pht001902.v1.p1.CFS_CARe_Subject.var_report_2011_02_07.xml";
pub const SAMPLE: &str = "phs000284.v1.pht001904.v1.p1.CFS_CARe_Sample.MULTI.txt";
pub const SAMPLE_DICT: &str = "phs000284.v1.pht001904.v1.CFS_CARe_Sample.data_dict_2011_02_07.xml";
pub const PEDIGREE: &str = "phs000284.v1.pht001906.v1.p1.CFS_CARe_Pedigree.MULTI.txt";
pub const PEDIGREE_DICT: &str =
    "phs000284.v1.pht001906.v1.CFS_CARe_Pedigree.data_dict_2011_02_07.xml";

pub const ECG_DICT: &str = "phs000284.v1.pht001903.v1.CFS_CARe_ECG.data_dict_2011_02_07.xml";
pub const ECG_REPORT: &str = "phs000284.v1.pht001903.v1.p1.CFS_CARe_ECG.var_report_2011_02_07.xml";
pub const SLEEP_DICT: &str = "phs000284.v1.pht001905.v1.CFS_CARe_Sleep.data_dict_2011_02_07.xml";

pub const SUBJECT_TABLE: &str = "# Study accession: phs000284.v1.p1\n\
# Table accession: pht001902.v1.p1\n\
# Consent group: All\n\
\n\
dbGaP_Subject_ID\tSUBJID\tCONSENT\tAFFECTION_STATUS\n\
100\tCFS-1\t1\t2\n\
101\tCFS-2\t2\t1\n\
102\tCFS-3\t0\t1\n\
103\tCFS-4\t1\t1\n";

pub const CONSENT_DIRS: [(&str, &str); 2] = [("c1", "NPU"), ("c2", "GRU")];

pub fn ecg(group: &str, label: &str) -> String {
    format!("phs000284.v1.pht001903.v1.p1.{group}.CFS_CARe_ECG.{label}.txt")
}

pub fn sleep(group: &str, label: &str) -> String {
    format!("phs000284.v1.pht001905.v1.p1.{group}.CFS_CARe_Sleep.{label}.txt")
}

/// A scratch dbGaP release laid out as one directory per consent group download.
pub struct Release {
    pub temp: TempDir,
}

impl Release {
    pub fn empty() -> Self {
        Self {
            temp: tempfile::tempdir().unwrap(),
        }
    }

    /// Subject, Sample and the ECG phenotype dataset across two consent groups.
    pub fn single() -> Self {
        let release = Self::empty();
        for (group, label) in CONSENT_DIRS {
            release.write_specials(group);
            release.write(group, &ecg(group, label), &format!("ID\tQT\n{group}\t400\n"));
            release.write(group, ECG_DICT, "<data_table id=\"pht001903.v1\"/>");
            release.write(group, ECG_REPORT, "<data_table report/>");
        }
        release
    }

    /// `single` plus a second phenotype dataset without a var_report.
    pub fn standard() -> Self {
        let release = Self::single();
        for (group, label) in CONSENT_DIRS {
            release.write(group, &sleep(group, label), &format!("ID\tAHI\n{group}\t3\n"));
            release.write(group, SLEEP_DICT, "<data_table id=\"pht001905.v1\"/>");
        }
        release
    }

    pub fn write_specials(&self, group: &str) {
        self.write(group, SUBJECT, SUBJECT_TABLE);
        self.write(group, SUBJECT_DICT, "<data_table id=\"pht001902.v1\"/>");
        self.write(group, SUBJECT_REPORT, "<data_table subject report/>");
        self.write(group, SAMPLE, "dbGaP_Subject_ID\tSAMPID\n100\tS1\n");
        self.write(group, SAMPLE_DICT, "<data_table id=\"pht001904.v1\"/>");
    }

    pub fn write_pedigree(&self) {
        for (group, _) in CONSENT_DIRS {
            self.write(group, PEDIGREE, "FAMID\tSUBJID\tFATHER\tMOTHER\n");
            self.write(group, PEDIGREE_DICT, "<data_table id=\"pht001906.v1\"/>");
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn path(&self, dir: &str, name: &str) -> PathBuf {
        self.root().join(dir).join(name)
    }

    pub fn write(&self, dir: &str, name: &str, content: &str) -> PathBuf {
        let dir = self.root().join(dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove(&self, dir: &str, name: &str) {
        fs::remove_file(self.path(dir, name)).unwrap();
    }
}
