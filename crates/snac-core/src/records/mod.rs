//! Record extraction from input artifacts.
//!
//! A job reads exactly one artifact: either a delimited table whose first
//! row is a header (batch reconciliation and batch download), or a single
//! EAC-CPF XML document (parsing and validation). Both are read fully up front so that a
//! malformed artifact fails the job before any output is produced.

mod document;
mod table;

pub use document::{DocumentRecord, DocumentSource};
pub(crate) use document::parse_xml;
pub use table::{
    TableRecord, TableSource, DATES_FIELD, GIVEN_NAME_FIELD, ID_FIELD, ID_LIST_MIN_FIELDS,
    MIDDLE_NAME_FIELD, MIN_FIELDS, SURNAME_FIELD,
};

use thiserror::Error;

/// Errors that can occur when reading an input artifact.
///
/// Every variant is fatal to the job that raised it.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to read input file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Input is not a valid delimited table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input table has no header row")]
    MissingHeader,

    #[error("Data row {row} has {found} fields, expected at least {expected}")]
    ShortRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Input is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Input is not a well-formed XML document: {0}")]
    Xml(String),
}
