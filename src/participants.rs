use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;

use crate::diagnostics::{Advisory, DiagnosticSink};
use crate::domain::ParticipantLabel;
use crate::error::BidsError;

/// Lists the participants under a dataset root: every `sub-<label>` directory,
/// prefix stripped, sorted and unique.
pub fn discover(root: &Utf8Path) -> Result<Vec<ParticipantLabel>, BidsError> {
    let entries = fs::read_dir(root.as_std_path()).map_err(|err| BidsError::DatasetRoot {
        root: root.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut labels = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|err| BidsError::DatasetRoot {
            root: root.to_path_buf(),
            message: err.to_string(),
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(ParticipantLabel::PREFIX) {
            continue;
        }
        match name.parse::<ParticipantLabel>() {
            Ok(label) => {
                labels.insert(label);
            }
            Err(_) => tracing::debug!(dir = %name, "skipping malformed participant directory"),
        }
    }

    if labels.is_empty() {
        return Err(BidsError::NoParticipants {
            root: root.to_path_buf(),
        });
    }
    Ok(labels.into_iter().collect())
}

/// Checks requested participant labels against the dataset and returns the
/// ones that exist. An empty request selects every participant.
///
/// Unknown labels abort when `strict` is set; otherwise they are reported to
/// `sink` as a warning and dropped.
pub fn validate<S: AsRef<str>>(
    root: &Utf8Path,
    requested: &[S],
    strict: bool,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<ParticipantLabel>, BidsError> {
    let all = discover(root)?;
    if requested.is_empty() {
        return Ok(all);
    }

    let requested = requested
        .iter()
        .map(|label| {
            let label = label.as_ref().trim();
            label
                .strip_prefix(ParticipantLabel::PREFIX)
                .unwrap_or(label)
                .to_string()
        })
        .collect::<BTreeSet<_>>();

    let found = all
        .iter()
        .filter(|label| requested.contains(label.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    if found.is_empty() {
        return Err(BidsError::ParticipantsNotFound {
            root: root.to_path_buf(),
            labels: join(requested.iter()),
        });
    }

    let not_found = requested
        .iter()
        .filter(|label| !all.iter().any(|known| known.as_str() == label.as_str()))
        .collect::<Vec<_>>();
    if !not_found.is_empty() {
        let err = BidsError::MissingParticipants {
            root: root.to_path_buf(),
            labels: join(not_found.into_iter()),
        };
        if strict {
            return Err(err);
        }
        sink.advise(Advisory::warning(err.to_string()));
    }

    Ok(found)
}

fn join<'a>(labels: impl Iterator<Item = &'a String>) -> String {
    labels.map(String::as_str).collect::<Vec<_>>().join(", ")
}
