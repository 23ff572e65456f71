use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Category, UnitKey};

#[derive(Debug, Error, Diagnostic)]
pub enum BidsError {
    #[error("invalid participant label: {0}")]
    InvalidParticipantLabel(String),

    #[error("invalid task label: {0}")]
    InvalidTaskLabel(String),

    #[error("invalid run label: {0}")]
    InvalidRunLabel(String),

    #[error("invalid confound pattern: {0}")]
    InvalidPattern(String),

    #[error("missing config file bids-info.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("cannot read dataset root {root}: {message}")]
    DatasetRoot { root: Utf8PathBuf, message: String },

    #[error("could not find participants under dataset root {root}")]
    #[diagnostic(help(
        "make sure the BIDS structure is present and correct; participant directories are named sub-<label>"
    ))]
    NoParticipants { root: Utf8PathBuf },

    #[error("could not find participants [{labels}] under dataset root {root}")]
    ParticipantsNotFound { root: Utf8PathBuf, labels: String },

    #[error("some participants were not found under dataset root {root}: {labels}")]
    MissingParticipants { root: Utf8PathBuf, labels: String },

    #[error("{unit} in {root}: RepetitionTime is missing from the merged sidecar metadata")]
    MissingRepetitionTime { root: Utf8PathBuf, unit: UnitKey },

    #[error("{unit} in {root}: RepetitionTime must be numeric, found {found}")]
    RepetitionTimeType {
        root: Utf8PathBuf,
        unit: UnitKey,
        found: String,
    },

    #[error("{unit} in {root}: cannot load sidecar {path}: {message}")]
    Sidecar {
        root: Utf8PathBuf,
        unit: UnitKey,
        path: Utf8PathBuf,
        message: String,
    },

    #[error("{unit} in {root}: no {category} table found")]
    MissingTable {
        root: Utf8PathBuf,
        unit: UnitKey,
        category: Category,
    },

    #[error("{unit} in {root}: {count} {category} tables match, expected exactly one")]
    AmbiguousTable {
        root: Utf8PathBuf,
        unit: UnitKey,
        category: Category,
        count: usize,
    },

    #[error("malformed table {path}: {message}")]
    MalformedTable { path: Utf8PathBuf, message: String },

    #[error("condition {condition} has {onsets} onsets but {durations} durations")]
    GroupLength {
        condition: String,
        onsets: usize,
        durations: usize,
    },

    #[error("inconsistent subject descriptor: {0}")]
    Descriptor(String),

    #[error("{unit} in {root}: {message}")]
    InconsistentUnit {
        root: Utf8PathBuf,
        unit: UnitKey,
        message: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Coarse classification used for exit codes and batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Layout,
    Metadata,
    Config,
    Io,
}

impl BidsError {
    /// Attaches the dataset root and unit to consistency errors raised by
    /// pure construction code, which knows neither.
    pub fn in_unit(self, root: &Utf8Path, unit: &UnitKey) -> Self {
        match self {
            BidsError::Descriptor(_) | BidsError::GroupLength { .. } => {
                BidsError::InconsistentUnit {
                    root: root.to_path_buf(),
                    unit: unit.clone(),
                    message: self.to_string(),
                }
            }
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BidsError::DatasetRoot { .. }
            | BidsError::NoParticipants { .. }
            | BidsError::ParticipantsNotFound { .. }
            | BidsError::MissingParticipants { .. }
            | BidsError::InvalidParticipantLabel(_) => ErrorKind::Layout,
            BidsError::MissingRepetitionTime { .. }
            | BidsError::RepetitionTimeType { .. }
            | BidsError::Sidecar { .. }
            | BidsError::MissingTable { .. }
            | BidsError::AmbiguousTable { .. }
            | BidsError::MalformedTable { .. }
            | BidsError::GroupLength { .. }
            | BidsError::Descriptor(_)
            | BidsError::InconsistentUnit { .. } => ErrorKind::Metadata,
            BidsError::InvalidTaskLabel(_)
            | BidsError::InvalidRunLabel(_)
            | BidsError::InvalidPattern(_)
            | BidsError::MissingConfig
            | BidsError::ConfigRead(_)
            | BidsError::ConfigParse(_) => ErrorKind::Config,
            BidsError::Filesystem(_) => ErrorKind::Io,
        }
    }
}
