//! # snac-core
//!
//! Deterministic building blocks for SNAC reconciliation, EAC-CPF parsing
//! and EAC-CPF validation.
//!
//! This crate never touches the network. It covers:
//! - reading input artifacts into records ([`records`])
//! - building command payloads for the SNAC REST API ([`query`]),
//!   including constellation downloads
//! - classifying loosely shaped replies ([`response`])
//! - selecting the candidates that reach the output ([`ranker`])
//! - formatting output tables, documents and summaries ([`output`])
//! - validating documents against an embedded rule set ([`validation`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use snac_core::{interpret, ranker, synthesize_name, ResponseShape, TableSource};
//!
//! let source = TableSource::from_path("cbw.csv")?;
//! for record in source.records() {
//!     let name = synthesize_name(record)?;
//!     let reply = send(QueryPayload::reconcile(&name));
//!     if let ResponseShape::CandidateList(candidates) = interpret(&reply).shape {
//!         let rows = ranker::rows_for(&name, record.id(), &candidates, ranker::DEFAULT_MAX_CANDIDATES);
//!     }
//! }
//! ```

pub mod output;
pub mod patterns;
pub mod query;
pub mod ranker;
pub mod records;
pub mod response;
pub mod validation;

// Re-export main types at crate root
pub use output::{
    pretty_json, render_html_summary, render_table, OutputRow, ReconciledRecord, TableWriter,
    TABLE_HEADER,
};
pub use query::{
    document_query, download_query, name_query, synthesize_name, Command, ConstellationQuery,
    DocumentQuery, DownloadFormat, NameQuery, QueryError, QueryPayload, Subject, WireRequest,
};
pub use records::{DocumentRecord, DocumentSource, RecordError, TableRecord, TableSource};
pub use response::{
    interpret, Candidate, Diagnostics, DocumentResult, DownloadedFile, FailureCause,
    Interpretation, ResponseShape, ScoreVector, ServiceFailure,
};
pub use validation::{
    FailedAssertion, RuleSet, RulesetError, ValidationReport, Validator, DEFAULT_RULESET,
};
