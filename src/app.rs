use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::Serialize;

use crate::confounds::{ColumnSelector, extract_confounds};
use crate::descriptor::SubjectAnalysisInfo;
use crate::diagnostics::{Advisory, DiagnosticSink, Diagnostics};
use crate::domain::{Category, MergePolicy, ParticipantLabel, RunLabel, TaskLabel, UnitKey};
use crate::error::{BidsError, ErrorKind};
use crate::events::extract_design;
use crate::layout::{BidsFile, DatasetIndex, Query};
use crate::metadata::resolve_repetition_time;

const IMAGE_EXTENSIONS: &[&str] = &["nii", "nii.gz"];

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub merge_policy: MergePolicy,
    pub selector: ColumnSelector,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub bids_dir: String,
    pub derivatives_dir: String,
    pub succeeded: Vec<UnitReport>,
    pub failed: Vec<UnitFailure>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: UnitKey,
    pub info: SubjectAnalysisInfo,
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub unit: UnitKey,
    pub kind: ErrorKind,
    pub message: String,
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantsResult {
    pub bids_dir: String,
    pub participants: Vec<ParticipantLabel>,
    pub advisories: Vec<Advisory>,
}

/// Imaging inputs of one participant, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubjectData {
    pub subject: String,
    pub fmap: Vec<String>,
    pub bold: Vec<String>,
    pub sbref: Vec<String>,
    pub t1w: Vec<String>,
    pub t2w: Vec<String>,
}

/// Resolves analysis descriptors from a raw dataset index and its
/// preprocessing derivatives index.
pub struct App<R: DatasetIndex, D: DatasetIndex> {
    raw: R,
    derivatives: D,
    options: ResolveOptions,
}

impl<R: DatasetIndex, D: DatasetIndex> App<R, D> {
    pub fn new(raw: R, derivatives: D, options: ResolveOptions) -> Self {
        Self {
            raw,
            derivatives,
            options,
        }
    }

    pub fn raw(&self) -> &R {
        &self.raw
    }

    pub fn derivatives(&self) -> &D {
        &self.derivatives
    }

    pub fn resolve_unit(
        &self,
        unit: &UnitKey,
        sink: &dyn DiagnosticSink,
    ) -> Result<SubjectAnalysisInfo, BidsError> {
        let repetition_time =
            resolve_repetition_time(&self.raw, unit, self.options.merge_policy, sink)?;
        let design = extract_design(&self.raw, unit)?;
        let confounds = extract_confounds(&self.derivatives, unit, &self.options.selector)?;
        SubjectAnalysisInfo::from_parts(repetition_time, design, confounds)
            .map_err(|err| err.in_unit(self.raw.root(), unit))
    }

    /// Expands subjects and tasks into units. With a fixed `run` every pair
    /// gets that run; otherwise each run found among the event files becomes
    /// its own unit, and pairs without run entities get a single run-less unit.
    pub fn plan_units(
        &self,
        subjects: &[ParticipantLabel],
        tasks: &[TaskLabel],
        run: Option<&RunLabel>,
    ) -> Vec<UnitKey> {
        let mut units = Vec::new();
        for subject in subjects {
            for task in tasks {
                if let Some(run) = run {
                    units.push(UnitKey::new(subject.clone(), task.clone(), Some(run.clone())));
                    continue;
                }
                let query = Query::new(Category::Events)
                    .with_subject(subject)
                    .with_task(task)
                    .with_extension("tsv");
                let runs = self
                    .raw
                    .query(&query)
                    .iter()
                    .filter_map(|path| BidsFile::parse(path))
                    .filter_map(|file| file.entity("run").and_then(|run| run.parse().ok()))
                    .collect::<BTreeSet<RunLabel>>();
                if runs.is_empty() {
                    units.push(UnitKey::new(subject.clone(), task.clone(), None));
                } else {
                    units.extend(
                        runs.into_iter()
                            .map(|run| UnitKey::new(subject.clone(), task.clone(), Some(run))),
                    );
                }
            }
        }
        tracing::debug!(units = units.len(), "planned units");
        units
    }

    /// Resolves every unit independently; one unit failing does not stop the others.
    pub fn run_batch(&self, units: &[UnitKey]) -> BatchReport {
        let outcomes = units
            .par_iter()
            .map(|unit| {
                let diagnostics = Diagnostics::new();
                let result = self.resolve_unit(unit, &diagnostics);
                (unit.clone(), result, diagnostics.into_advisories())
            })
            .collect::<Vec<_>>();

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (unit, result, advisories) in outcomes {
            match result {
                Ok(info) => {
                    tracing::info!(%unit, conditions = info.conditions().len(), "resolved");
                    succeeded.push(UnitReport {
                        unit,
                        info,
                        advisories,
                    });
                }
                Err(err) => {
                    tracing::error!(%unit, "{err}");
                    failed.push(UnitFailure {
                        unit,
                        kind: err.kind(),
                        message: err.to_string(),
                        advisories,
                    });
                }
            }
        }

        BatchReport {
            generated_at: iso_timestamp(),
            bids_dir: self.raw.root().to_string(),
            derivatives_dir: self.derivatives.root().to_string(),
            succeeded,
            failed,
        }
    }

    /// Lists the imaging files of `subject`; `task` narrows bold runs only.
    pub fn collect_data(&self, subject: &ParticipantLabel, task: Option<&TaskLabel>) -> SubjectData {
        let images = |category: Category, task: Option<&TaskLabel>| {
            let mut query = Query::new(category).with_subject(subject);
            if let Some(task) = task {
                query = query.with_task(task);
            }
            for extension in IMAGE_EXTENSIONS {
                query = query.with_extension(extension);
            }
            self.raw
                .query(&query)
                .into_iter()
                .map(|path| path.to_string())
                .collect::<Vec<_>>()
        };

        SubjectData {
            subject: subject.to_string(),
            fmap: images(Category::Fmap, None),
            bold: images(Category::Bold, task),
            sbref: images(Category::Sbref, None),
            t1w: images(Category::T1w, None),
            t2w: images(Category::T2w, None),
        }
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
