use serde::Serialize;

use crate::confounds::Confounds;
use crate::error::BidsError;
use crate::events::Design;

/// Everything the modeling stage needs for one subject/task/run.
///
/// Only [`assemble`] constructs it, so the parallel sequences always line up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAnalysisInfo {
    conditions: Vec<String>,
    onsets: Vec<Vec<f64>>,
    durations: Vec<Vec<f64>>,
    regressor_names: Vec<String>,
    regressors: Vec<Vec<f64>>,
    repetition_time: f64,
}

impl SubjectAnalysisInfo {
    pub fn from_parts(
        repetition_time: f64,
        design: Design,
        confounds: Confounds,
    ) -> Result<Self, BidsError> {
        assemble(
            repetition_time,
            design.conditions,
            design.onsets,
            design.durations,
            confounds.names,
            confounds.regressors,
        )
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn onsets(&self) -> &[Vec<f64>] {
        &self.onsets
    }

    pub fn durations(&self) -> &[Vec<f64>] {
        &self.durations
    }

    pub fn regressor_names(&self) -> &[String] {
        &self.regressor_names
    }

    pub fn regressors(&self) -> &[Vec<f64>] {
        &self.regressors
    }

    pub fn repetition_time(&self) -> f64 {
        self.repetition_time
    }
}

pub fn assemble(
    repetition_time: f64,
    conditions: Vec<String>,
    onsets: Vec<Vec<f64>>,
    durations: Vec<Vec<f64>>,
    regressor_names: Vec<String>,
    regressors: Vec<Vec<f64>>,
) -> Result<SubjectAnalysisInfo, BidsError> {
    if !repetition_time.is_finite() || repetition_time <= 0.0 {
        return Err(BidsError::Descriptor(format!(
            "repetition time must be a positive number, got {repetition_time}"
        )));
    }

    let design = Design {
        conditions,
        onsets,
        durations,
    };
    design.check()?;

    if regressor_names.len() != regressors.len() {
        return Err(BidsError::Descriptor(format!(
            "{} regressor names but {} regressors",
            regressor_names.len(),
            regressors.len()
        )));
    }
    if let Some(first) = regressors.first() {
        let timepoints = first.len();
        if let Some((name, values)) = regressor_names
            .iter()
            .zip(&regressors)
            .find(|(_, values)| values.len() != timepoints)
        {
            return Err(BidsError::Descriptor(format!(
                "regressor {name} has {} values, expected {timepoints}",
                values.len()
            )));
        }
    }

    Ok(SubjectAnalysisInfo {
        conditions: design.conditions,
        onsets: design.onsets,
        durations: design.durations,
        regressor_names,
        regressors,
        repetition_time,
    })
}
