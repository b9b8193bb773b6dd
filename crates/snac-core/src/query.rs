//! Query construction for the SNAC REST API.
//!
//! A [`QueryPayload`] is the canonical command envelope: a name to
//! reconcile, a document to parse, or a stored constellation to download.
//! Its wire form, produced by [`QueryPayload::wire`], follows the shape the
//! SNAC REST API accepts for each command.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::patterns::joined_years;
use crate::records::{
    DocumentRecord, TableRecord, DATES_FIELD, GIVEN_NAME_FIELD, MIDDLE_NAME_FIELD, SURNAME_FIELD,
};

/// Entity type sent with every name query.
pub const ENTITY_TYPE_PERSON: &str = "person";

/// MIME type sent with every document query.
pub const DOCUMENT_MIME_TYPE: &str = "text/xml";

/// Preference score attached to the queried name entry.
pub const PREFERENCE_SCORE: u8 = 1;

/// Errors from query construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Data row {row} has no name to reconcile")]
    EmptyName { row: usize },

    #[error("Data row {row} has no constellation identifier")]
    MissingConstellationId { row: usize },
}

/// Remote command to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Reconcile,
    ParseEac,
    Validate,
    #[serde(rename = "download_constellation")]
    Download,
}

impl Command {
    /// Command name as the service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Reconcile => "reconcile",
            Command::ParseEac => "parse_eac",
            Command::Validate => "validate",
            Command::Download => "download_constellation",
        }
    }
}

/// Export format requested from `download_constellation`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadFormat {
    #[default]
    #[serde(rename = "eac-cpf")]
    EacCpf,

    #[serde(rename = "constellation_json")]
    ConstellationJson,
}

impl DownloadFormat {
    /// Format name as the service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadFormat::EacCpf => "eac-cpf",
            DownloadFormat::ConstellationJson => "constellation_json",
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eac-cpf" => Ok(DownloadFormat::EacCpf),
            "constellation_json" => Ok(DownloadFormat::ConstellationJson),
            other => Err(format!(
                "unknown download format '{}' (expected eac-cpf or constellation_json)",
                other
            )),
        }
    }
}

/// Name query subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameQuery {
    pub entity_type: String,
    pub name_original: String,
    pub preference_score: u8,
}

/// Document query subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    pub content_base64: String,
    pub mime_type: String,
}

/// Stored constellation subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstellationQuery {
    pub constellation_id: String,
    pub format: DownloadFormat,
}

/// What a query is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    Name(NameQuery),
    Document(DocumentQuery),
    Constellation(ConstellationQuery),
}

/// Canonical command envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub command: Command,
    pub subject: Subject,
}

impl QueryPayload {
    /// A reconcile command for a person name.
    pub fn reconcile(name: impl Into<String>) -> Self {
        Self {
            command: Command::Reconcile,
            subject: Subject::Name(NameQuery {
                entity_type: ENTITY_TYPE_PERSON.to_string(),
                name_original: name.into(),
                preference_score: PREFERENCE_SCORE,
            }),
        }
    }

    /// A parse command for a whole document.
    pub fn parse_eac(document: &DocumentRecord) -> Self {
        Self {
            command: Command::ParseEac,
            subject: Subject::Document(DocumentQuery {
                content_base64: STANDARD.encode(document.as_bytes()),
                mime_type: DOCUMENT_MIME_TYPE.to_string(),
            }),
        }
    }

    /// A download command for one stored constellation.
    pub fn download(constellation_id: impl Into<String>, format: DownloadFormat) -> Self {
        Self {
            command: Command::Download,
            subject: Subject::Constellation(ConstellationQuery {
                constellation_id: constellation_id.into(),
                format,
            }),
        }
    }

    /// The queried name, for name subjects.
    pub fn name(&self) -> Option<&str> {
        match &self.subject {
            Subject::Name(query) => Some(&query.name_original),
            Subject::Document(_) | Subject::Constellation(_) => None,
        }
    }

    /// Borrowed wire form, ready for JSON serialization.
    pub fn wire(&self) -> WireRequest<'_> {
        let command = self.command.as_str();
        match &self.subject {
            Subject::Name(query) => WireRequest::Constellation {
                command,
                constellation: WireConstellation {
                    data_type: "Constellation",
                    entity_type: WireTerm {
                        term: &query.entity_type,
                    },
                    name_entries: vec![WireNameEntry {
                        data_type: "NameEntry",
                        original: &query.name_original,
                        preference_score: query.preference_score,
                    }],
                },
            },
            Subject::Document(query) => WireRequest::File {
                command,
                file: WireFile {
                    content: &query.content_base64,
                    mime_type: &query.mime_type,
                },
            },
            Subject::Constellation(query) => WireRequest::Download {
                command,
                constellationid: &query.constellation_id,
                format: query.format.as_str(),
            },
        }
    }
}

/// Request body as sent to the service.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WireRequest<'a> {
    Constellation {
        command: &'a str,
        constellation: WireConstellation<'a>,
    },
    File {
        command: &'a str,
        file: WireFile<'a>,
    },
    Download {
        command: &'a str,
        constellationid: &'a str,
        #[serde(rename = "type")]
        format: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireConstellation<'a> {
    data_type: &'static str,
    entity_type: WireTerm<'a>,
    name_entries: Vec<WireNameEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct WireTerm<'a> {
    term: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNameEntry<'a> {
    data_type: &'static str,
    original: &'a str,
    preference_score: u8,
}

#[derive(Debug, Serialize)]
pub struct WireFile<'a> {
    content: &'a str,
    #[serde(rename = "mime-type")]
    mime_type: &'a str,
}

/// Build the heading-style name for one table row.
///
/// The name is `surname, given middle`, followed by `, YYYY-YYYY` when the
/// dates column holds 4-digit years. Stray commas and whitespace at either
/// end of the name part are dropped, so an empty surname never leaves a
/// leading comma behind.
pub fn synthesize_name(record: &TableRecord) -> Result<String, QueryError> {
    let field = |column| record.field(column).unwrap_or_default().trim();

    let composed = format!(
        "{}, {} {}",
        field(SURNAME_FIELD),
        field(GIVEN_NAME_FIELD),
        field(MIDDLE_NAME_FIELD)
    );
    let name_only = composed
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string();

    if name_only.is_empty() {
        return Err(QueryError::EmptyName { row: record.index });
    }

    let name = match record.field(DATES_FIELD).and_then(joined_years) {
        Some(years) => format!("{}, {}", name_only, years),
        None => name_only,
    };

    Ok(name)
}

/// Build the reconcile payload for one table row.
pub fn name_query(record: &TableRecord) -> Result<QueryPayload, QueryError> {
    synthesize_name(record).map(QueryPayload::reconcile)
}

/// Build the parse payload for a document.
pub fn document_query(document: &DocumentRecord) -> QueryPayload {
    QueryPayload::parse_eac(document)
}

/// Build the download payload for one row of an identifier list.
pub fn download_query(
    record: &TableRecord,
    format: DownloadFormat,
) -> Result<QueryPayload, QueryError> {
    let id = record.id().trim();
    if id.is_empty() {
        return Err(QueryError::MissingConstellationId { row: record.index });
    }
    Ok(QueryPayload::download(id, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(fields: &[&str]) -> TableRecord {
        TableRecord::new(0, fields.iter().copied())
    }

    fn row_with_dates(dates: &str) -> TableRecord {
        let mut fields = vec!["cbw-1", "", "Jane", "Q", "Doe", "", "", "", "", "", "", ""];
        fields.push(dates);
        row(&fields)
    }

    #[test]
    fn test_name_without_dates() {
        let record = row(&["cbw-1", "", "Jane", "Q", "Doe"]);
        assert_eq!(synthesize_name(&record).unwrap(), "Doe, Jane Q");
    }

    #[test]
    fn test_name_with_year_range() {
        let record = row_with_dates("fl. 1810-1850 approx");
        assert_eq!(synthesize_name(&record).unwrap(), "Doe, Jane Q, 1810-1850");
    }

    #[test]
    fn test_dates_without_years_leave_name_unchanged() {
        let record = row_with_dates("unknown");
        assert_eq!(synthesize_name(&record).unwrap(), "Doe, Jane Q");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let record = row(&["cbw-1", "", "  Jane ", " Q ", "  Doe  "]);
        assert_eq!(synthesize_name(&record).unwrap(), "Doe, Jane Q");
    }

    #[test]
    fn test_missing_given_names_drop_trailing_comma() {
        let record = row(&["cbw-1", "", "", "", "Doe"]);
        assert_eq!(synthesize_name(&record).unwrap(), "Doe");
    }

    #[test]
    fn test_empty_surname_has_no_comma_artifacts() {
        let record = row(&["cbw-1", "", "Jane", "Q", ""]);
        let name = synthesize_name(&record).unwrap();
        assert_eq!(name, "Jane Q");
        assert!(!name.starts_with(','));
        assert!(!name.ends_with(','));
    }

    #[test]
    fn test_no_name_is_an_error() {
        let record = row(&["cbw-1", "", " ", "", ""]);
        assert_eq!(
            synthesize_name(&record),
            Err(QueryError::EmptyName { row: 0 })
        );
    }

    #[test]
    fn test_reconcile_payload() {
        let record = row(&["cbw-1", "", "Jane", "Q", "Doe"]);
        let payload = name_query(&record).unwrap();
        assert_eq!(payload.command, Command::Reconcile);
        match payload.subject {
            Subject::Name(query) => {
                assert_eq!(query.entity_type, "person");
                assert_eq!(query.name_original, "Doe, Jane Q");
                assert_eq!(query.preference_score, 1);
            }
            Subject::Document(_) | Subject::Constellation(_) => panic!("Expected a name subject"),
        }
    }

    #[test]
    fn test_reconcile_wire_shape() {
        let payload = QueryPayload::reconcile("Doe, Jane Q");
        let wire = serde_json::to_value(payload.wire()).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "command": "reconcile",
                "constellation": {
                    "dataType": "Constellation",
                    "entityType": { "term": "person" },
                    "nameEntries": [{
                        "dataType": "NameEntry",
                        "original": "Doe, Jane Q",
                        "preferenceScore": 1
                    }]
                }
            })
        );
    }

    #[test]
    fn test_document_payload_is_base64() {
        let document = DocumentRecord {
            text: "<eac-cpf/>".to_string(),
        };
        let payload = document_query(&document);
        assert_eq!(payload.command, Command::ParseEac);
        assert_eq!(payload.name(), None);

        let wire = serde_json::to_value(payload.wire()).unwrap();
        assert_eq!(wire["command"], "parse_eac");
        assert_eq!(wire["file"]["mime-type"], "text/xml");
        assert_eq!(wire["file"]["content"], "PGVhYy1jcGYvPg==");
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::Reconcile.as_str(), "reconcile");
        assert_eq!(Command::ParseEac.as_str(), "parse_eac");
        assert_eq!(Command::Validate.as_str(), "validate");
        assert_eq!(Command::Download.as_str(), "download_constellation");
        assert_eq!(
            serde_json::to_value(Command::ParseEac).unwrap(),
            serde_json::json!("parse_eac")
        );
        assert_eq!(
            serde_json::to_value(Command::Download).unwrap(),
            serde_json::json!("download_constellation")
        );
    }

    #[test]
    fn test_download_wire_format() {
        let record = TableRecord::new(3, [" 87654 ", "ignored"]);
        let payload = download_query(&record, DownloadFormat::ConstellationJson).unwrap();
        assert_eq!(payload.command, Command::Download);
        assert_eq!(payload.name(), None);

        let wire = serde_json::to_value(payload.wire()).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "command": "download_constellation",
                "constellationid": "87654",
                "type": "constellation_json"
            })
        );
    }

    #[test]
    fn test_download_requires_identifier() {
        let record = TableRecord::new(4, ["  "]);
        assert_eq!(
            download_query(&record, DownloadFormat::EacCpf),
            Err(QueryError::MissingConstellationId { row: 4 })
        );
    }

    #[test]
    fn test_download_format_names() {
        assert_eq!(DownloadFormat::default(), DownloadFormat::EacCpf);
        assert_eq!("eac-cpf".parse::<DownloadFormat>(), Ok(DownloadFormat::EacCpf));
        assert_eq!(
            "constellation_json".parse::<DownloadFormat>(),
            Ok(DownloadFormat::ConstellationJson)
        );
        assert!("mods".parse::<DownloadFormat>().is_err());
        assert_eq!(
            serde_json::to_value(DownloadFormat::EacCpf).unwrap(),
            serde_json::json!("eac-cpf")
        );
    }

    proptest! {
        #[test]
        fn prop_name_never_empty_or_comma_bounded(
            given in "[ ,a-zA-Z]{0,8}",
            middle in "[ ,a-zA-Z]{0,8}",
            surname in "[ ,a-zA-Z]{0,8}",
            dates in proptest::option::of("[0-9a-z .-]{0,16}"),
        ) {
            let mut fields = vec![
                "id".to_string(),
                String::new(),
                given,
                middle,
                surname,
            ];
            if let Some(dates) = dates {
                fields.resize(12, String::new());
                fields.push(dates);
            }
            let record = TableRecord::new(0, fields);

            if let Ok(name) = synthesize_name(&record) {
                prop_assert!(!name.is_empty());
                prop_assert!(!name.ends_with(','));
                prop_assert!(!name.starts_with(','));
            }
        }
    }
}
