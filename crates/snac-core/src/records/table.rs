//! Delimited table input for batch reconciliation.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::RecordError;

/// Column holding the opaque identifier carried through to the output.
pub const ID_FIELD: usize = 0;

/// Column holding the first given name.
pub const GIVEN_NAME_FIELD: usize = 2;

/// Column holding the middle name.
pub const MIDDLE_NAME_FIELD: usize = 3;

/// Column holding the surname.
pub const SURNAME_FIELD: usize = 4;

/// Optional column holding free-text life dates.
pub const DATES_FIELD: usize = 12;

/// Minimum number of fields a data row needs for name synthesis.
pub const MIN_FIELDS: usize = SURNAME_FIELD + 1;

/// Minimum number of fields in an identifier list (the identifier itself).
pub const ID_LIST_MIN_FIELDS: usize = ID_FIELD + 1;

/// One data row of the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    /// 0-based position among data rows (header excluded)
    pub index: usize,

    /// Raw field values in column order
    pub fields: Vec<String>,
}

impl TableRecord {
    /// Create a record from its position and field values.
    pub fn new<I, S>(index: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Get a field by column, if the row has it.
    pub fn field(&self, column: usize) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// The opaque record identifier (first column).
    pub fn id(&self) -> &str {
        self.field(ID_FIELD).unwrap_or_default()
    }
}

/// A parsed delimited table: the header row plus ordered data rows.
///
/// The rows are held in memory, so iterating with [`TableSource::records`]
/// can be restarted from the beginning any number of times.
#[derive(Debug, Clone)]
pub struct TableSource {
    header: Vec<String>,
    records: Vec<TableRecord>,
}

impl TableSource {
    /// Read a name table from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        Self::from_path_with_min_fields(path, MIN_FIELDS)
    }

    /// Read a list of constellation identifiers (first column) from a file.
    pub fn id_list_from_path(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        Self::from_path_with_min_fields(path, ID_LIST_MIN_FIELDS)
    }

    fn from_path_with_min_fields(
        path: impl AsRef<Path>,
        min_fields: usize,
    ) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RecordError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::read(file, min_fields)
    }

    /// Parse a table from an in-memory string.
    pub fn parse(text: &str) -> Result<Self, RecordError> {
        Self::from_reader(text.as_bytes())
    }

    /// Parse an identifier list from an in-memory string.
    pub fn parse_id_list(text: &str) -> Result<Self, RecordError> {
        Self::read(text.as_bytes(), ID_LIST_MIN_FIELDS)
    }

    /// Parse a name table from any reader.
    ///
    /// Rows may have differing field counts, but every data row must carry
    /// at least the name columns.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RecordError> {
        Self::read(reader, MIN_FIELDS)
    }

    fn read<R: Read>(reader: R, min_fields: usize) -> Result<Self, RecordError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = csv_reader.records();

        let header = match rows.next() {
            Some(row) => row?.iter().map(str::to_string).collect(),
            None => return Err(RecordError::MissingHeader),
        };

        let mut records = Vec::new();
        for (index, row) in rows.enumerate() {
            let row = row?;
            if row.len() < min_fields {
                return Err(RecordError::ShortRow {
                    row: index,
                    found: row.len(),
                    expected: min_fields,
                });
            }
            records.push(TableRecord::new(index, row.iter()));
        }

        tracing::debug!(records = records.len(), "Read input table");

        Ok(Self { header, records })
    }

    /// The header row.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Iterate data rows in file order.
    pub fn records(&self) -> std::slice::Iter<'_, TableRecord> {
        self.records.iter()
    }

    /// Number of data rows (total rows minus the header).
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}
