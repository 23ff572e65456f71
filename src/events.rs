use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;

use crate::domain::{Category, UnitKey};
use crate::error::BidsError;
use crate::layout::{DatasetIndex, Query, require_single};

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub onset: f64,
    pub duration: f64,
    pub trial_type: String,
}

/// Rows of an `_events.tsv` file in file order, reduced to the columns the
/// design needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    rows: Vec<EventRow>,
}

/// Event onsets and durations grouped per condition. Conditions keep the
/// order in which their trial type first appears.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Design {
    pub conditions: Vec<String>,
    pub onsets: Vec<Vec<f64>>,
    pub durations: Vec<Vec<f64>>,
}

impl EventTable {
    pub fn from_rows(rows: Vec<EventRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    pub fn load(path: &Utf8Path) -> Result<Self, BidsError> {
        let file = File::open(path.as_std_path()).map_err(|err| BidsError::MalformedTable {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_reader(path, file)
    }

    /// Parses tab-separated events; `source` only labels errors.
    pub fn from_reader<R: Read>(source: &Utf8Path, reader: R) -> Result<Self, BidsError> {
        let malformed = |message: String| BidsError::MalformedTable {
            path: source.to_path_buf(),
            message,
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| malformed(err.to_string()))?
            .clone();
        let onset_idx = column(&headers, "onset").ok_or_else(|| malformed(missing("onset")))?;
        let duration_idx =
            column(&headers, "duration").ok_or_else(|| malformed(missing("duration")))?;
        let trial_idx =
            column(&headers, "trial_type").ok_or_else(|| malformed(missing("trial_type")))?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|err| malformed(err.to_string()))?;
            // header is line 1
            let line = line + 2;
            rows.push(EventRow {
                onset: number(&record, onset_idx, "onset", line).map_err(malformed)?,
                duration: optional_number(&record, duration_idx, "duration", line)
                    .map_err(malformed)?,
                trial_type: record.get(trial_idx).unwrap_or_default().to_string(),
            });
        }
        Ok(Self { rows })
    }

    /// Rows without a trial type (`n/a` or blank) belong to no condition and
    /// are left out.
    pub fn group(&self) -> Design {
        let mut positions = HashMap::<&str, usize>::new();
        let mut design = Design::default();
        for row in self.rows.iter().filter(|row| !is_na(&row.trial_type)) {
            let slot = *positions.entry(row.trial_type.as_str()).or_insert_with(|| {
                design.conditions.push(row.trial_type.clone());
                design.onsets.push(Vec::new());
                design.durations.push(Vec::new());
                design.conditions.len() - 1
            });
            design.onsets[slot].push(row.onset);
            design.durations[slot].push(row.duration);
        }
        design
    }
}

impl Design {
    /// Every condition must have one onset and one duration per event.
    pub fn check(&self) -> Result<(), BidsError> {
        if self.onsets.len() != self.conditions.len()
            || self.durations.len() != self.conditions.len()
        {
            return Err(BidsError::Descriptor(format!(
                "{} conditions but {} onset groups and {} duration groups",
                self.conditions.len(),
                self.onsets.len(),
                self.durations.len()
            )));
        }
        for ((condition, onsets), durations) in self
            .conditions
            .iter()
            .zip(&self.onsets)
            .zip(&self.durations)
        {
            if onsets.len() != durations.len() {
                return Err(BidsError::GroupLength {
                    condition: condition.clone(),
                    onsets: onsets.len(),
                    durations: durations.len(),
                });
            }
        }
        Ok(())
    }
}

/// Locates the single events table of `unit` and groups it by trial type.
pub fn extract_design(index: &dyn DatasetIndex, unit: &UnitKey) -> Result<Design, BidsError> {
    let query = Query::new(Category::Events)
        .with_subject(&unit.subject)
        .with_task(&unit.task)
        .with_run(unit.run.as_ref())
        .with_extension("tsv");
    let path: Utf8PathBuf = require_single(index, unit, Category::Events, &query)?;
    tracing::debug!(%unit, path = %path, "loading events");

    let design = EventTable::load(&path)?.group();
    design
        .check()
        .map_err(|err| err.in_unit(index.root(), unit))?;
    Ok(design)
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn missing(name: &str) -> String {
    format!("missing required column {name}")
}

/// BIDS marks absent values with `n/a`.
pub(crate) fn is_na(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("n/a")
}

fn optional_number(
    record: &StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<f64, String> {
    if is_na(record.get(idx).unwrap_or_default()) {
        return Ok(f64::NAN);
    }
    number(record, idx, name, line)
}

fn number(record: &StringRecord, idx: usize, name: &str, line: usize) -> Result<f64, String> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<f64>()
        .map_err(|_| format!("line {line}: {name} value {raw:?} is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(onset: f64, trial_type: &str) -> EventRow {
        EventRow {
            onset,
            duration: 1.0,
            trial_type: trial_type.to_string(),
        }
    }

    #[test]
    fn grouping_follows_first_appearance() {
        let table = EventTable::from_rows(vec![row(0.0, "A"), row(5.0, "B"), row(10.0, "A")]);
        let design = table.group();
        assert_eq!(design.conditions, vec!["A", "B"]);
        assert_eq!(design.onsets, vec![vec![0.0, 10.0], vec![5.0]]);
        assert_eq!(design.durations, vec![vec![1.0, 1.0], vec![1.0]]);
    }

    #[test]
    fn rows_without_trial_type_are_dropped() {
        let table = EventTable::from_rows(vec![row(0.0, "go"), row(2.0, "n/a"), row(4.0, "go")]);
        let design = table.group();
        assert_eq!(design.conditions, vec!["go"]);
        assert_eq!(design.onsets, vec![vec![0.0, 4.0]]);
    }

    #[test]
    fn empty_table_yields_empty_design() {
        let design = EventTable::default().group();
        assert!(design.conditions.is_empty());
        assert!(design.check().is_ok());
    }

    #[test]
    fn uneven_groups_fail_check() {
        let design = Design {
            conditions: vec!["go".to_string()],
            onsets: vec![vec![0.0, 1.0]],
            durations: vec![vec![0.5]],
        };
        assert!(matches!(
            design.check(),
            Err(BidsError::GroupLength { onsets: 2, durations: 1, .. })
        ));
    }
}
