use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::diagnostics::{Advisory, DiagnosticSink};
use crate::domain::{Category, MergePolicy, UnitKey};
use crate::error::BidsError;
use crate::layout::{BidsFile, DatasetIndex, Query};

pub const REPETITION_TIME: &str = "RepetitionTime";

/// A sidecar leaf value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Absent,
    /// Arrays and objects (e.g. `SliceTiming`) are carried through untouched.
    Structured(serde_json::Value),
}

impl MetadataValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Number(_) => "number",
            MetadataValue::Text(_) => "string",
            MetadataValue::Bool(_) => "boolean",
            MetadataValue::Absent => "null",
            MetadataValue::Structured(_) => "structured value",
        }
    }
}

impl From<serde_json::Value> for MetadataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => MetadataValue::Absent,
            serde_json::Value::Bool(flag) => MetadataValue::Bool(flag),
            serde_json::Value::Number(number) => match number.as_f64() {
                Some(value) => MetadataValue::Number(value),
                None => MetadataValue::Structured(serde_json::Value::Number(number)),
            },
            serde_json::Value::String(text) => MetadataValue::Text(text),
            other => MetadataValue::Structured(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetadataRecord {
    fields: BTreeMap<String, MetadataValue>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_reader(reader).map_err(|err| err.to_string())?;
        let serde_json::Value::Object(map) = value else {
            return Err("expected a JSON object at the top level".to_string());
        };
        Ok(map.into_iter().collect())
    }

    pub fn from_json_str(content: &str) -> Result<Self, String> {
        Self::from_reader(content.as_bytes())
    }

    pub fn load(path: &Utf8Path) -> Result<Self, String> {
        let file = File::open(path.as_std_path()).map_err(|err| err.to_string())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overlays `specific` on `general`. Keys present in only one record are
    /// kept as is; overlapping keys resolve according to `policy`. A `null`
    /// in `specific` never hides a value from `general`.
    pub fn merge(general: &Self, specific: &Self, policy: MergePolicy) -> Self {
        let mut fields = general.fields.clone();
        for (key, value) in &specific.fields {
            if *value == MetadataValue::Absent && fields.contains_key(key) {
                continue;
            }
            let merged = match (policy, fields.get(key), value) {
                (
                    MergePolicy::Additive,
                    Some(MetadataValue::Number(base)),
                    MetadataValue::Number(offset),
                ) => MetadataValue::Number(base + offset),
                _ => value.clone(),
            };
            fields.insert(key.clone(), merged);
        }
        Self { fields }
    }
}

impl<V: Into<MetadataValue>> FromIterator<(String, V)> for MetadataRecord {
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key, value.into()))
                .collect(),
        }
    }
}

/// Loads the dataset-wide and subject-level bold sidecars for `unit` and
/// merges them. Missing or ambiguous levels are reported to `sink` and
/// contribute nothing.
pub fn resolve_sidecar(
    index: &dyn DatasetIndex,
    unit: &UnitKey,
    policy: MergePolicy,
    sink: &dyn DiagnosticSink,
) -> Result<MetadataRecord, BidsError> {
    let general_query = Query::new(Category::Bold)
        .dataset_wide()
        .with_task(&unit.task)
        .with_extension("json");
    let subject_query = Query::new(Category::Bold)
        .with_subject(&unit.subject)
        .with_task(&unit.task)
        .with_run(unit.run.as_ref())
        .with_extension("json");

    let general = load_level(index, unit, "dataset-wide", &general_query, sink)?;
    let specific = load_level(index, unit, "subject", &subject_query, sink)?;
    Ok(MetadataRecord::merge(&general, &specific, policy))
}

/// Resolves the repetition time of `unit` from its merged sidecar metadata.
pub fn resolve_repetition_time(
    index: &dyn DatasetIndex,
    unit: &UnitKey,
    policy: MergePolicy,
    sink: &dyn DiagnosticSink,
) -> Result<f64, BidsError> {
    let record = resolve_sidecar(index, unit, policy, sink)?;
    match record.get(REPETITION_TIME) {
        None | Some(MetadataValue::Absent) => Err(BidsError::MissingRepetitionTime {
            root: index.root().to_path_buf(),
            unit: unit.clone(),
        }),
        Some(MetadataValue::Number(value)) => Ok(*value),
        Some(other) => Err(BidsError::RepetitionTimeType {
            root: index.root().to_path_buf(),
            unit: unit.clone(),
            found: other.type_name().to_string(),
        }),
    }
}

fn load_level(
    index: &dyn DatasetIndex,
    unit: &UnitKey,
    level: &str,
    query: &Query,
    sink: &dyn DiagnosticSink,
) -> Result<MetadataRecord, BidsError> {
    let root = index.root();
    let matches = most_specific(index.query(query), query);
    match matches.as_slice() {
        [] => {
            sink.advise(Advisory::warning(format!(
                "{unit} in {root}: no {level} sidecar for the task"
            )));
            Ok(MetadataRecord::new())
        }
        [path] => MetadataRecord::load(path).map_err(|message| BidsError::Sidecar {
            root: root.to_path_buf(),
            unit: unit.clone(),
            path: path.clone(),
            message,
        }),
        many => {
            let listed = many
                .iter()
                .map(|path| path.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            sink.advise(Advisory::error(format!(
                "{unit} in {root}: {} {level} sidecars match ({listed}); none of them is used",
                many.len()
            )));
            Ok(MetadataRecord::new())
        }
    }
}

/// When the query names a run, files carrying that run shadow run-less
/// files inherited at the same level.
fn most_specific(matches: Vec<Utf8PathBuf>, query: &Query) -> Vec<Utf8PathBuf> {
    if query.run.is_none() || matches.len() < 2 {
        return matches;
    }
    let with_run = matches
        .iter()
        .filter(|path| {
            BidsFile::parse(path)
                .map(|file| file.entity("run").is_some())
                .unwrap_or(false)
        })
        .cloned()
        .collect::<Vec<_>>();
    if with_run.is_empty() { matches } else { with_run }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_and_floats_become_numbers() {
        let record =
            MetadataRecord::from_json_str(r#"{"RepetitionTime": 2, "EchoTime": 0.03}"#).unwrap();
        assert_eq!(record.get("RepetitionTime"), Some(&MetadataValue::Number(2.0)));
        assert_eq!(record.get("EchoTime").and_then(MetadataValue::as_number), Some(0.03));
    }

    #[test]
    fn arrays_are_kept_structured() {
        let record = MetadataRecord::from_json_str(r#"{"SliceTiming": [0.0, 0.5]}"#).unwrap();
        assert_eq!(
            record.get("SliceTiming").map(MetadataValue::type_name),
            Some("structured value")
        );
    }

    #[test]
    fn top_level_array_is_rejected() {
        assert!(MetadataRecord::from_json_str("[1, 2]").is_err());
    }
}
