use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::BidsError;

fn is_bids_label(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_alphanumeric())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantLabel(String);

impl ParticipantLabel {
    pub const PREFIX: &'static str = "sub-";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn dir_name(&self) -> String {
        format!("{}{}", Self::PREFIX, self.0)
    }
}

impl fmt::Display for ParticipantLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantLabel {
    type Err = BidsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let label = trimmed.strip_prefix(Self::PREFIX).unwrap_or(trimmed);
        if !is_bids_label(label) {
            return Err(BidsError::InvalidParticipantLabel(value.to_string()));
        }
        Ok(Self(label.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskLabel(String);

impl TaskLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskLabel {
    type Err = BidsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let label = trimmed.strip_prefix("task-").unwrap_or(trimmed);
        if !is_bids_label(label) {
            return Err(BidsError::InvalidTaskLabel(value.to_string()));
        }
        Ok(Self(label.to_string()))
    }
}

/// Run index as written in file names. `1` and `01` denote the same run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunLabel(String);

impl RunLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, value: &str) -> bool {
        match (self.0.parse::<u32>(), value.parse::<u32>()) {
            (Ok(left), Ok(right)) => left == right,
            _ => self.0 == value,
        }
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunLabel {
    type Err = BidsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let label = trimmed.strip_prefix("run-").unwrap_or(trimmed);
        if !is_bids_label(label) {
            return Err(BidsError::InvalidRunLabel(value.to_string()));
        }
        Ok(Self(label.to_string()))
    }
}

/// File category understood by the dataset indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bold,
    Sbref,
    Fmap,
    T1w,
    T2w,
    Events,
    Confounds,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Bold => write!(f, "bold"),
            Category::Sbref => write!(f, "sbref"),
            Category::Fmap => write!(f, "fmap"),
            Category::T1w => write!(f, "T1w"),
            Category::T2w => write!(f, "T2w"),
            Category::Events => write!(f, "events"),
            Category::Confounds => write!(f, "confounds"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Column name contains the pattern anywhere.
    #[default]
    Substring,
    /// Column name, split on `_` and `-`, has a token equal to the pattern.
    Token,
    /// Pattern is a regular expression searched in the column name.
    Regex,
}

/// How overlapping sidecar fields from the dataset-wide and subject scopes combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    #[default]
    SpecificWins,
    /// Overlapping numeric values are summed; anything else falls back to the subject value.
    Additive,
}

/// One independent unit of work: a subject, a task and optionally a run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnitKey {
    pub subject: ParticipantLabel,
    pub task: TaskLabel,
    pub run: Option<RunLabel>,
}

impl UnitKey {
    pub fn new(subject: ParticipantLabel, task: TaskLabel, run: Option<RunLabel>) -> Self {
        Self { subject, task, run }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{} task-{}", self.subject, self.task)?;
        if let Some(run) = &self.run {
            write!(f, " run-{run}")?;
        }
        Ok(())
    }
}
