mod common;

use assert_matches::assert_matches;
use camino::Utf8Path;

use bids_subject_info::confounds::{ColumnSelector, ConfoundTable, extract_confounds};
use bids_subject_info::domain::{Category, MatchMode, UnitKey};
use bids_subject_info::error::BidsError;
use bids_subject_info::layout::FsIndex;

use common::{CONFOUNDS, Dataset};

fn table(content: &str) -> ConfoundTable {
    ConfoundTable::from_reader(Utf8Path::new("confounds.tsv"), content.as_bytes()).unwrap()
}

fn selector(patterns: &[&str], mode: MatchMode, case_sensitive: bool) -> ColumnSelector {
    ColumnSelector::new(
        patterns.iter().map(|pattern| pattern.to_string()).collect(),
        mode,
        case_sensitive,
    )
    .unwrap()
}

fn unit() -> UnitKey {
    UnitKey::new("01".parse().unwrap(), "rest".parse().unwrap(), None)
}

const MOTION: &str = "trans_x\tCompCor00\ttrans_y\n1\t2\t3\n4\t5\t6\n";

#[test]
fn case_insensitive_substring_selects_only_trans_x() {
    let confounds = table(MOTION)
        .select(&selector(&["X"], MatchMode::Substring, false))
        .unwrap();
    assert_eq!(confounds.names, vec!["trans_x"]);
    assert_eq!(confounds.regressors, vec![vec![1.0, 4.0]]);
}

#[test]
fn case_sensitive_substring_does_not_fold_case() {
    let confounds = table(MOTION)
        .select(&selector(&["X"], MatchMode::Substring, true))
        .unwrap();
    assert!(confounds.names.is_empty());
    assert!(confounds.regressors.is_empty());
}

#[test]
fn default_patterns_pick_compcor() {
    let confounds = table(CONFOUNDS).select(&ColumnSelector::default()).unwrap();
    assert_eq!(confounds.names, vec!["CompCor00"]);
    assert_eq!(confounds.regressors, vec![vec![0.5, 0.6, 0.7]]);
}

#[test]
fn regressors_are_column_major() {
    let confounds = table(CONFOUNDS)
        .select(&selector(&["trans"], MatchMode::Substring, true))
        .unwrap();
    assert_eq!(confounds.names, vec!["trans_x", "trans_y"]);
    assert_eq!(
        confounds.regressors,
        vec![vec![0.1, 0.2, 0.3], vec![0.2, 0.3, 0.4]]
    );
}

#[test]
fn blank_and_na_cells_read_as_nan() {
    let confounds = table("fd\n\nn/a\n0.5\n")
        .select(&selector(&["fd"], MatchMode::Token, true))
        .unwrap();
    let values = &confounds.regressors[0];
    assert_eq!(values.len(), 2);
    assert!(values[0].is_nan());
    assert_eq!(values[1], 0.5);

    let confounds = table(CONFOUNDS)
        .select(&selector(&["framewise_displacement"], MatchMode::Substring, true))
        .unwrap();
    assert!(confounds.regressors[0][0].is_nan());
    assert_eq!(confounds.regressors[0][1], 0.01);
}

#[test]
fn token_mode_rejects_partial_words() {
    let selector = selector(&["x"], MatchMode::Token, true);
    let confounds = table("trans_x\tmax_fd\trot_x\n1\t2\t3\n")
        .select(&selector)
        .unwrap();
    assert_eq!(confounds.names, vec!["trans_x", "rot_x"]);
}

#[test]
fn regex_mode_is_unanchored_unless_asked() {
    let confounds = table("a_comp_cor_00\tt_comp_cor_01\tcosine00\n1\t2\t3\n")
        .select(&selector(&["^a_comp_cor_\\d+$", "cosine"], MatchMode::Regex, true))
        .unwrap();
    assert_eq!(confounds.names, vec!["a_comp_cor_00", "cosine00"]);
}

#[test]
fn text_in_selected_column_is_malformed() {
    let err = table("trans_x\nabc\n")
        .select(&selector(&["trans"], MatchMode::Substring, true))
        .unwrap_err();
    assert_matches!(err, BidsError::MalformedTable { ref message, .. } if message.contains("trans_x"));
}

#[test]
fn text_in_unselected_column_is_fine() {
    let confounds = table("trans_x\tnote\n1\tmoved\n")
        .select(&selector(&["trans"], MatchMode::Substring, true))
        .unwrap();
    assert_eq!(confounds.names, vec!["trans_x"]);
}

#[test]
fn extracts_from_derivatives_index() {
    let dataset = Dataset::new();
    dataset.file(
        "sub-01/func/sub-01_task-rest_desc-confounds_timeseries.tsv",
        CONFOUNDS,
    );
    dataset.file(
        "sub-01/func/sub-01_task-rest_desc-confounds_timeseries.json",
        "{}",
    );
    let index = FsIndex::open(dataset.root()).unwrap();

    let confounds = extract_confounds(&index, &unit(), &ColumnSelector::default()).unwrap();
    assert_eq!(confounds.names, vec!["CompCor00"]);
}

#[test]
fn legacy_confounds_name_is_found() {
    let dataset = Dataset::new();
    dataset.file("sub-01/func/sub-01_task-rest_bold_confounds.tsv", CONFOUNDS);
    let index = FsIndex::open(dataset.root()).unwrap();

    let confounds = extract_confounds(&index, &unit(), &ColumnSelector::default()).unwrap();
    assert_eq!(confounds.regressors.len(), 1);
}

#[test]
fn missing_and_ambiguous_confound_tables_are_fatal() {
    let dataset = Dataset::new();
    dataset.dir("sub-01/func");
    let index = FsIndex::open(dataset.root()).unwrap();
    assert_matches!(
        extract_confounds(&index, &unit(), &ColumnSelector::default()),
        Err(BidsError::MissingTable {
            category: Category::Confounds,
            ..
        })
    );

    dataset.file(
        "sub-01/func/sub-01_task-rest_run-1_desc-confounds_timeseries.tsv",
        CONFOUNDS,
    );
    dataset.file(
        "sub-01/func/sub-01_task-rest_run-2_desc-confounds_timeseries.tsv",
        CONFOUNDS,
    );
    let index = FsIndex::open(dataset.root()).unwrap();
    assert_matches!(
        extract_confounds(&index, &unit(), &ColumnSelector::default()),
        Err(BidsError::AmbiguousTable { count: 2, .. })
    );
}
