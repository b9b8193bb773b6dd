//! Whole-document XML input for EAC-CPF parsing and validation.

use std::fs;
use std::path::Path;

use super::RecordError;

/// The single record of a document-mode job: the full document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Raw document text, exactly as read
    pub text: String,
}

impl DocumentRecord {
    /// Raw document bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// A document that has been read and checked for well-formedness.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    record: DocumentRecord,
}

impl DocumentSource {
    /// Read a document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| RecordError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| RecordError::Encoding(e.to_string()))?;
        Self::parse(text)
    }

    /// Check an in-memory document.
    pub fn parse(text: impl Into<String>) -> Result<Self, RecordError> {
        let text = text.into();
        parse_xml(&text)?;
        Ok(Self {
            record: DocumentRecord { text },
        })
    }

    /// The document record.
    pub fn record(&self) -> &DocumentRecord {
        &self.record
    }

    /// Take ownership of the document record.
    pub fn into_record(self) -> DocumentRecord {
        self.record
    }
}

/// Parse XML text into a read-only tree.
///
/// DTDs are allowed since exported EAC-CPF records sometimes carry one.
pub(crate) fn parse_xml(text: &str) -> Result<roxmltree::Document<'_>, RecordError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    roxmltree::Document::parse_with_options(text, options).map_err(|e| RecordError::Xml(e.to_string()))
}
