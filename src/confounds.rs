use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecord, Trim};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::domain::{Category, MatchMode, UnitKey};
use crate::error::BidsError;
use crate::events::is_na;
use crate::layout::{DatasetIndex, Query, require_single};

pub const DEFAULT_PATTERNS: &[&str] = &["CompCor", "X", "Y", "Z"];

/// Decides which confound columns become nuisance regressors.
#[derive(Debug, Clone)]
pub struct ColumnSelector {
    patterns: Vec<String>,
    mode: MatchMode,
    case_sensitive: bool,
    regexes: Vec<Regex>,
}

impl Default for ColumnSelector {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            mode: MatchMode::Substring,
            case_sensitive: true,
            regexes: Vec::new(),
        }
    }
}

impl ColumnSelector {
    pub fn new(
        patterns: Vec<String>,
        mode: MatchMode,
        case_sensitive: bool,
    ) -> Result<Self, BidsError> {
        let regexes = match mode {
            MatchMode::Regex => patterns
                .iter()
                .map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(!case_sensitive)
                        .build()
                        .map_err(|err| BidsError::InvalidPattern(format!("{pattern}: {err}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            MatchMode::Substring | MatchMode::Token => Vec::new(),
        };
        Ok(Self {
            patterns,
            mode,
            case_sensitive,
            regexes,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self.mode {
            MatchMode::Substring if self.case_sensitive => {
                self.patterns.iter().any(|pattern| name.contains(pattern.as_str()))
            }
            MatchMode::Substring => {
                let name = name.to_lowercase();
                self.patterns
                    .iter()
                    .any(|pattern| name.contains(&pattern.to_lowercase()))
            }
            MatchMode::Token => name.split(['_', '-']).any(|token| {
                self.patterns.iter().any(|pattern| {
                    if self.case_sensitive {
                        token == pattern.as_str()
                    } else {
                        token.eq_ignore_ascii_case(pattern)
                    }
                })
            }),
            MatchMode::Regex => self.regexes.iter().any(|regex| regex.is_match(name)),
        }
    }
}

pub fn default_patterns() -> Vec<String> {
    DEFAULT_PATTERNS.iter().map(|pattern| pattern.to_string()).collect()
}

/// Selected regressors, one inner vector per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Confounds {
    pub names: Vec<String>,
    pub regressors: Vec<Vec<f64>>,
}

/// A confounds table: one named column per signal, one row per volume.
#[derive(Debug, Clone)]
pub struct ConfoundTable {
    source: Utf8PathBuf,
    names: Vec<String>,
    rows: Vec<StringRecord>,
}

impl ConfoundTable {
    pub fn load(path: &Utf8Path) -> Result<Self, BidsError> {
        let file = File::open(path.as_std_path()).map_err(|err| BidsError::MalformedTable {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_reader(path, file)
    }

    pub fn from_reader<R: Read>(source: &Utf8Path, reader: R) -> Result<Self, BidsError> {
        let malformed = |err: csv::Error| BidsError::MalformedTable {
            path: source.to_path_buf(),
            message: err.to_string(),
        };
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);
        let names = reader
            .headers()
            .map_err(malformed)?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?;
        Ok(Self {
            source: source.to_path_buf(),
            names,
            rows,
        })
    }

    /// Values of column `idx`; `n/a` and empty cells read as NaN.
    pub fn column(&self, idx: usize) -> Result<Vec<f64>, BidsError> {
        let name = self.names.get(idx).map(String::as_str).unwrap_or_default();
        self.rows
            .iter()
            .enumerate()
            .map(|(line, record)| {
                let raw = record.get(idx).unwrap_or_default();
                if is_na(raw) {
                    return Ok(f64::NAN);
                }
                raw.parse::<f64>().map_err(|_| BidsError::MalformedTable {
                    path: self.source.clone(),
                    message: format!(
                        "line {}: column {name} value {raw:?} is not a number",
                        line + 2
                    ),
                })
            })
            .collect()
    }

    pub fn select(&self, selector: &ColumnSelector) -> Result<Confounds, BidsError> {
        let mut confounds = Confounds::default();
        for (idx, name) in self.names.iter().enumerate() {
            if !selector.matches(name) {
                continue;
            }
            confounds.regressors.push(self.column(idx)?);
            confounds.names.push(name.clone());
        }
        Ok(confounds)
    }
}

/// Locates the single confounds table of `unit` and extracts the columns
/// chosen by `selector`. No matching column is not an error.
pub fn extract_confounds(
    index: &dyn DatasetIndex,
    unit: &UnitKey,
    selector: &ColumnSelector,
) -> Result<Confounds, BidsError> {
    let query = Query::new(Category::Confounds)
        .with_subject(&unit.subject)
        .with_task(&unit.task)
        .with_run(unit.run.as_ref())
        .with_extension("tsv");
    let path = require_single(index, unit, Category::Confounds, &query)?;
    tracing::debug!(%unit, path = %path, "loading confounds");

    let confounds = ConfoundTable::load(&path)?.select(selector)?;
    if confounds.names.is_empty() {
        tracing::debug!(%unit, "no confound column matched the selector");
    }
    Ok(confounds)
}
