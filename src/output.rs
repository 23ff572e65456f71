use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::app::{BatchReport, ParticipantsResult, SubjectData};
use crate::error::BidsError;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_participants(result: &ParticipantsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_subject_data(result: &SubjectData) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_report(result: &BatchReport) -> io::Result<()> {
        Self::print_json(result)
    }

    /// Writes the report next to `path` first and renames it into place.
    pub fn write_report(path: &Utf8Path, report: &BatchReport) -> Result<(), BidsError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| BidsError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("bids-info-report")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| BidsError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(report)
            .map_err(|err| BidsError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| BidsError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| BidsError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
