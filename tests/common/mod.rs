#![allow(dead_code)]

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

/// A throwaway dataset tree on disk.
pub struct Dataset {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Dataset {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dir(&self, relative: &str) -> &Self {
        fs::create_dir_all(self.root.join(relative)).unwrap();
        self
    }

    pub fn file(&self, relative: &str, content: &str) -> &Self {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }
}

pub const EVENTS: &str = "onset\tduration\ttrial_type\n0\t1\tA\n5\t1\tB\n10\t1\tA\n";

pub const CONFOUNDS: &str = "trans_x\tCompCor00\ttrans_y\tframewise_displacement\n\
0.1\t0.5\t0.2\tn/a\n\
0.2\t0.6\t0.3\t0.01\n\
0.3\t0.7\t0.4\t0.02\n";

/// Raw dataset with `sub-01` and `sub-02` doing `task-rest`, a dataset-wide
/// sidecar with `RepetitionTime` and one events file per subject.
pub fn raw_dataset() -> Dataset {
    let dataset = Dataset::new();
    dataset.file("dataset_description.json", r#"{"Name": "test", "BIDSVersion": "1.8.0"}"#);
    dataset.file("task-rest_bold.json", r#"{"RepetitionTime": 2.0, "TaskName": "rest"}"#);
    for subject in ["01", "02"] {
        dataset.file(
            &format!("sub-{subject}/func/sub-{subject}_task-rest_bold.nii.gz"),
            "",
        );
        dataset.file(
            &format!("sub-{subject}/func/sub-{subject}_task-rest_events.tsv"),
            EVENTS,
        );
    }
    dataset
}

/// fmriprep-style derivatives matching [`raw_dataset`].
pub fn derivatives_dataset() -> Dataset {
    let dataset = Dataset::new();
    for subject in ["01", "02"] {
        dataset.file(
            &format!("sub-{subject}/func/sub-{subject}_task-rest_desc-confounds_timeseries.tsv"),
            CONFOUNDS,
        );
    }
    dataset
}
