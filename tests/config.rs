use std::fs;

use assert_matches::assert_matches;

use bids_subject_info::config::{Config, ConfigLoader, ConfoundsEntry, LabelSelection};
use bids_subject_info::domain::{MatchMode, MergePolicy, TaskLabel};
use bids_subject_info::error::{BidsError, ErrorKind};

#[test]
fn parse_config_shorthand_label() {
    let config: Config = serde_json::from_str(
        r#"{
            "bids_dir": "/data/ds000001",
            "participant_label": "sub-01",
            "tasks": ["task-balloon"]
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.participant_labels, vec!["sub-01"]);
    assert_eq!(resolved.tasks, vec!["balloon".parse::<TaskLabel>().unwrap()]);
    assert_eq!(
        resolved.bids_dir.as_ref().map(|dir| dir.as_str()),
        Some("/data/ds000001")
    );
    assert!(resolved.derivatives_dir.is_none());
}

#[test]
fn parse_config_detailed() {
    let config: Config = serde_json::from_str(
        r#"{
            "schema_version": 1,
            "participant_label": ["01", "02"],
            "strict": true,
            "confounds": {
                "patterns": ["a_comp_cor", "trans"],
                "match_mode": "token",
                "case_sensitive": false
            },
            "merge_policy": "additive"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.participant_labels, vec!["01", "02"]);
    assert!(resolved.strict);
    assert_eq!(resolved.match_mode, MatchMode::Token);
    assert!(!resolved.case_sensitive);
    assert_eq!(resolved.merge_policy, MergePolicy::Additive);

    let selector = resolved.selector().unwrap();
    assert!(selector.matches("TRANS_x"));
    assert!(!selector.matches("t_comp_cor_00"));
}

#[test]
fn invalid_regex_in_config_is_rejected() {
    let config = Config {
        confounds: Some(ConfoundsEntry {
            patterns: Some(vec!["[unclosed".to_string()]),
            match_mode: Some(MatchMode::Regex),
            case_sensitive: None,
        }),
        ..Config::default()
    };

    let err = ConfigLoader::resolve_config(config).unwrap_err();
    assert_matches!(err, BidsError::InvalidPattern(_));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn invalid_task_in_config_is_rejected() {
    let config = Config {
        tasks: vec!["rest_1".to_string()],
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(BidsError::InvalidTaskLabel(_))
    );
}

#[test]
fn label_selection_flattens() {
    assert_eq!(
        LabelSelection::Single("01".to_string()).into_labels(),
        vec!["01"]
    );
    assert_eq!(
        LabelSelection::Many(vec!["01".to_string(), "02".to_string()]).into_labels(),
        vec!["01", "02"]
    );
}

#[test]
fn resolve_reads_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{"merge_policy": "specific-wins", "strict": true}"#).unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert!(resolved.strict);
    assert_eq!(resolved.merge_policy, MergePolicy::SpecificWins);
}

#[test]
fn resolve_reports_unreadable_and_unparsable_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert_matches!(
        ConfigLoader::resolve(missing.to_str()),
        Err(BidsError::ConfigRead(_))
    );

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ \"strict\": ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(broken.to_str()),
        Err(BidsError::ConfigParse(_))
    );
}
