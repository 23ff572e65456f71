use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{Category, ParticipantLabel, RunLabel, TaskLabel, UnitKey};
use crate::error::BidsError;

const SKIPPED_DIRS: &[&str] = &["derivatives", "sourcedata", "code"];
const DATATYPES: &[&str] = &[
    "anat", "func", "fmap", "dwi", "beh", "perf", "eeg", "meg", "ieeg", "pet",
];

/// Read-only lookup of dataset files by entity filters.
pub trait DatasetIndex: Send + Sync {
    fn root(&self) -> &Utf8Path;
    fn query(&self, query: &Query) -> Vec<Utf8PathBuf>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubjectFilter {
    #[default]
    Any,
    /// Only files without a `sub-` entity, i.e. top-level inheritance files.
    DatasetWide,
    Only(ParticipantLabel),
}

/// Filter predicates for [`DatasetIndex::query`].
///
/// A run filter accepts files that carry no run entity, since such files
/// apply to every run of the task.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub subject: SubjectFilter,
    pub task: Option<TaskLabel>,
    pub run: Option<RunLabel>,
    pub category: Option<Category>,
    pub extensions: Vec<String>,
}

impl Query {
    pub fn new(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn with_subject(mut self, subject: &ParticipantLabel) -> Self {
        self.subject = SubjectFilter::Only(subject.clone());
        self
    }

    pub fn dataset_wide(mut self) -> Self {
        self.subject = SubjectFilter::DatasetWide;
        self
    }

    pub fn with_task(mut self, task: &TaskLabel) -> Self {
        self.task = Some(task.clone());
        self
    }

    pub fn with_run(mut self, run: Option<&RunLabel>) -> Self {
        self.run = run.cloned();
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extensions
            .push(extension.trim_start_matches('.').to_string());
        self
    }

    pub fn matches(&self, file: &BidsFile) -> bool {
        let subject_ok = match &self.subject {
            SubjectFilter::Any => true,
            SubjectFilter::DatasetWide => file.entity("sub").is_none(),
            SubjectFilter::Only(label) => file.entity("sub") == Some(label.as_str()),
        };
        let task_ok = self
            .task
            .as_ref()
            .map(|task| file.entity("task") == Some(task.as_str()))
            .unwrap_or(true);
        let run_ok = match (&self.run, file.entity("run")) {
            (Some(run), Some(value)) => run.matches(value),
            _ => true,
        };
        let category_ok = self
            .category
            .map(|category| file.is_category(category))
            .unwrap_or(true);
        let extension_ok = self.extensions.is_empty()
            || self.extensions.iter().any(|ext| *ext == file.extension);
        subject_ok && task_ok && run_ok && category_ok && extension_ok
    }
}

/// A file name decomposed into BIDS entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsFile {
    pub path: Utf8PathBuf,
    pub datatype: Option<String>,
    pub entities: BTreeMap<String, String>,
    pub suffix: String,
    pub extension: String,
}

impl BidsFile {
    pub fn parse(path: &Utf8Path) -> Option<Self> {
        let name = path.file_name()?;
        let (stem, extension) = name.split_once('.').unwrap_or((name, ""));
        let mut parts = stem.split('_').collect::<Vec<_>>();
        let suffix = parts.pop()?;
        if suffix.is_empty() || suffix.contains('-') {
            return None;
        }

        let mut entities = BTreeMap::new();
        for part in parts {
            // derivatives such as `_bold_confounds.tsv` carry bare words between entities
            if let Some((key, value)) = part.split_once('-') {
                if key.is_empty() || value.is_empty() {
                    return None;
                }
                entities.insert(key.to_string(), value.to_string());
            }
        }

        let datatype = path
            .parent()
            .and_then(|parent| parent.file_name())
            .filter(|dir| DATATYPES.contains(dir))
            .map(str::to_string);

        Some(Self {
            path: path.to_path_buf(),
            datatype,
            entities,
            suffix: suffix.to_string(),
            extension: extension.to_string(),
        })
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }

    pub fn is_category(&self, category: Category) -> bool {
        match category {
            Category::Bold => self.suffix == "bold",
            Category::Sbref => self.suffix == "sbref",
            Category::T1w => self.suffix == "T1w",
            Category::T2w => self.suffix == "T2w",
            Category::Events => self.suffix == "events",
            Category::Fmap => self.datatype.as_deref() == Some("fmap"),
            Category::Confounds => {
                self.suffix == "confounds"
                    || (matches!(self.suffix.as_str(), "regressors" | "timeseries")
                        && self.entity("desc") == Some("confounds"))
            }
        }
    }
}

/// Filesystem-backed index built by walking the dataset once.
#[derive(Debug, Clone)]
pub struct FsIndex {
    root: Utf8PathBuf,
    files: Vec<BidsFile>,
}

impl FsIndex {
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, BidsError> {
        let root = root.into();
        if !root.as_std_path().is_dir() {
            return Err(BidsError::DatasetRoot {
                root,
                message: "not a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        for path in walk_files(root.as_std_path()).map_err(|message| BidsError::DatasetRoot {
            root: root.clone(),
            message,
        })? {
            let path = Utf8PathBuf::from_path_buf(path)
                .map_err(|_| BidsError::Filesystem("non-utf8 file path in dataset".to_string()))?;
            if let Some(file) = BidsFile::parse(&path) {
                files.push(file);
            }
        }
        files.sort_by(|left, right| left.path.cmp(&right.path));
        tracing::debug!(root = %root, files = files.len(), "indexed dataset");

        Ok(Self { root, files })
    }

    pub fn files(&self) -> &[BidsFile] {
        &self.files
    }

    /// Distinct task labels of functional runs, sorted.
    pub fn tasks(&self) -> Vec<TaskLabel> {
        self.files
            .iter()
            .filter(|file| file.is_category(Category::Bold))
            .filter_map(|file| file.entity("task"))
            .filter_map(|task| task.parse::<TaskLabel>().ok())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl DatasetIndex for FsIndex {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn query(&self, query: &Query) -> Vec<Utf8PathBuf> {
        self.files
            .iter()
            .filter(|file| query.matches(file))
            .map(|file| file.path.clone())
            .collect()
    }
}

/// Runs `query` and insists on exactly one match; tables that drive the
/// design cannot be guessed between.
pub fn require_single(
    index: &dyn DatasetIndex,
    unit: &UnitKey,
    category: Category,
    query: &Query,
) -> Result<Utf8PathBuf, BidsError> {
    let mut matches = index.query(query);
    match matches.len() {
        0 => Err(BidsError::MissingTable {
            root: index.root().to_path_buf(),
            unit: unit.clone(),
            category,
        }),
        1 => Ok(matches.remove(0)),
        count => Err(BidsError::AmbiguousTable {
            root: index.root().to_path_buf(),
            unit: unit.clone(),
            category,
            count,
        }),
    }
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>, String> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(|err| format!("{}: {err}", path.display()))?;
        for entry in entries {
            let entry = entry.map_err(|err| err.to_string())?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if path.is_dir() {
                if !SKIPPED_DIRS.contains(&name.as_str()) {
                    stack.push(path);
                }
                continue;
            }
            items.push(path);
        }
    }
    Ok(items)
}
