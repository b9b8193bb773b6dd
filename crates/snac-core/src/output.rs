//! Output formatting: the reconciliation table, pretty-printed documents
//! and the HTML summary shown to the user.

use std::io;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::response::Candidate;

/// Batch output header, in column order.
pub const TABLE_HEADER: [&str; 12] = [
    "CBW Name",
    "CBW ID",
    "Snac Name",
    "Snac ARK",
    "Overall Reconciliation Score",
    "Elastic Full Name Score",
    "Elastic Name-Only Score",
    "Elastic75 Score",
    "Original Length Score",
    "Original Length Difference Score",
    "Entity Type Filter Score",
    "SNAC Degree Score",
];

/// One line of the reconciliation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub cbw_name: String,
    pub cbw_id: String,
    pub snac_name: String,
    pub snac_ark: String,
    pub overall_score: String,
    pub sub_scores: [String; 7],
}

impl OutputRow {
    pub fn from_candidate(query_name: &str, record_id: &str, candidate: &Candidate) -> Self {
        Self {
            cbw_name: query_name.to_string(),
            cbw_id: record_id.to_string(),
            snac_name: candidate.name.clone(),
            snac_ark: candidate.ark.clone(),
            overall_score: candidate.formatted_strength(),
            sub_scores: candidate.formatted_sub_scores(),
        }
    }

    /// Fields in [`TABLE_HEADER`] order.
    pub fn to_record(&self) -> [&str; 12] {
        [
            &self.cbw_name,
            &self.cbw_id,
            &self.snac_name,
            &self.snac_ark,
            &self.overall_score,
            &self.sub_scores[0],
            &self.sub_scores[1],
            &self.sub_scores[2],
            &self.sub_scores[3],
            &self.sub_scores[4],
            &self.sub_scores[5],
            &self.sub_scores[6],
        ]
    }
}

/// Writes the reconciliation table: every field quoted, `\n` line endings.
pub struct TableWriter<W: io::Write> {
    inner: csv::Writer<W>,
}

impl<W: io::Write> TableWriter<W> {
    pub fn new(writer: W) -> Self {
        let inner = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        Self { inner }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.inner.write_record(TABLE_HEADER).map_err(io::Error::from)
    }

    pub fn write_row(&mut self, row: &OutputRow) -> io::Result<()> {
        self.inner.write_record(row.to_record()).map_err(io::Error::from)
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}

/// The whole table, header first, as text.
pub fn render_table(rows: &[OutputRow]) -> io::Result<String> {
    let mut writer = TableWriter::new(Vec::new());
    writer.write_header()?;
    for row in rows {
        writer.write_row(row)?;
    }
    let bytes = writer.into_inner()?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Pretty-print with a four-space indent.
pub fn pretty_json(value: &Value) -> String {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(buffer).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

/// One record's outcome, for the HTML summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledRecord {
    pub query_name: String,
    pub record_id: String,
    pub rows: Vec<OutputRow>,
}

/// HTML list of each searched name and its retained candidates.
pub fn render_html_summary(records: &[ReconciledRecord]) -> String {
    let mut html = String::from("<html><body><ul>\n");
    for record in records {
        html.push_str(&format!(
            "<li>{} ({}) :\n<br>&nbsp;&nbsp;searched: {}\n<ul>\n",
            escape_html(&record.query_name),
            escape_html(&record.record_id),
            escape_html(&record.query_name),
        ));
        if record.rows.is_empty() {
            html.push_str("   <li>no matches</li>\n");
        }
        for row in &record.rows {
            let ark = escape_html(&row.snac_ark);
            html.push_str(&format!(
                "   <li>{} (<a href=\"{}\">{}</a>) -- score: {}</li>\n",
                escape_html(&row.snac_name),
                ark,
                ark,
                escape_html(&row.overall_score),
            ));
        }
        html.push_str("</ul></li>\n");
    }
    html.push_str("</ul></body></html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
