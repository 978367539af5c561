//! Loading of raw documents from newline-delimited JSON.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;
use writebench_types::{Document, Record, TranslationError};

#[derive(Debug, Error, Diagnostic)]
pub enum InputError {
    #[error("failed to read {}", .path.display())]
    #[diagnostic(code(writebench::input::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line} is not valid JSON")]
    #[diagnostic(
        code(writebench::input::json),
        help("every non-empty line must hold one JSON document")
    )]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line} cannot be routed")]
    #[diagnostic(
        code(writebench::input::translation),
        help("documents need a six character `flightid` and `posmsgtype` of `position` or `surface`")
    )]
    Translation {
        line: usize,
        #[source]
        source: TranslationError,
    },
}

/// Translate every non-empty line of `reader` into a record.
///
/// The first line that fails to parse or translate stops the load.
pub fn read_records<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Record>, InputError> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let document: Document =
            serde_json::from_str(&line).map_err(|source| InputError::Json {
                line: line_number,
                source,
            })?;
        let record = Record::try_from(document).map_err(|source| InputError::Translation {
            line: line_number,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

pub fn load_records(path: &Path) -> Result<Vec<Record>, InputError> {
    let file = std::fs::File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_records(std::io::BufReader::new(file), path)
}
