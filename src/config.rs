use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::confounds::{ColumnSelector, default_patterns};
use crate::domain::{MatchMode, MergePolicy, TaskLabel};
use crate::error::BidsError;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub bids_dir: Option<String>,
    #[serde(default)]
    pub derivatives_dir: Option<String>,
    #[serde(default)]
    pub participant_label: Option<LabelSelection>,
    #[serde(default)]
    pub strict: Option<bool>,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub confounds: Option<ConfoundsEntry>,
    #[serde(default)]
    pub merge_policy: Option<MergePolicy>,
}

/// `"01"` or `["01", "sub-02"]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LabelSelection {
    Single(String),
    Many(Vec<String>),
}

impl LabelSelection {
    pub fn into_labels(self) -> Vec<String> {
        match self {
            LabelSelection::Single(label) => vec![label],
            LabelSelection::Many(labels) => labels,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfoundsEntry {
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
    #[serde(default)]
    pub match_mode: Option<MatchMode>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub bids_dir: Option<Utf8PathBuf>,
    pub derivatives_dir: Option<Utf8PathBuf>,
    pub participant_labels: Vec<String>,
    pub strict: bool,
    pub tasks: Vec<TaskLabel>,
    pub confound_patterns: Vec<String>,
    pub match_mode: MatchMode,
    pub case_sensitive: bool,
    pub merge_policy: MergePolicy,
}

impl ResolvedConfig {
    pub fn selector(&self) -> Result<ColumnSelector, BidsError> {
        ColumnSelector::new(
            self.confound_patterns.clone(),
            self.match_mode,
            self.case_sensitive,
        )
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub const DEFAULT_FILE: &'static str = "bids-info.json";

    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, BidsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(Self::DEFAULT_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(BidsError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| BidsError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| BidsError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// Like [`ConfigLoader::resolve`], but a missing default file yields the defaults.
    pub fn resolve_or_default(path: Option<&str>) -> Result<ResolvedConfig, BidsError> {
        match Self::resolve(path) {
            Err(BidsError::MissingConfig) => Self::resolve_config(Config::default()),
            other => other,
        }
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, BidsError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let tasks = config
            .tasks
            .iter()
            .map(|task| task.parse())
            .collect::<Result<Vec<TaskLabel>, BidsError>>()?;

        let confounds = config.confounds.unwrap_or_default();
        let resolved = ResolvedConfig {
            schema_version,
            bids_dir: config.bids_dir.map(Utf8PathBuf::from),
            derivatives_dir: config.derivatives_dir.map(Utf8PathBuf::from),
            participant_labels: config
                .participant_label
                .map(LabelSelection::into_labels)
                .unwrap_or_default(),
            strict: config.strict.unwrap_or(false),
            tasks,
            confound_patterns: confounds.patterns.unwrap_or_else(default_patterns),
            match_mode: confounds.match_mode.unwrap_or_default(),
            case_sensitive: confounds.case_sensitive.unwrap_or(true),
            merge_policy: config.merge_policy.unwrap_or_default(),
        };

        // fail early on patterns that cannot compile
        resolved.selector()?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert!(!resolved.strict);
        assert_eq!(resolved.confound_patterns, default_patterns());
        assert_eq!(resolved.match_mode, MatchMode::Substring);
        assert_eq!(resolved.merge_policy, MergePolicy::SpecificWins);
        assert!(resolved.case_sensitive);
    }
}
