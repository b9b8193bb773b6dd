//! The job state machine.
//!
//! One controller runs one job, strictly sequentially: a single record is
//! in flight at a time, so progress and output order follow input order.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use snac_core::ranker;
use snac_core::{
    download_query, interpret, pretty_json, render_html_summary, synthesize_name, Diagnostics,
    DocumentSource, DownloadedFile, Interpretation, OutputRow, QueryPayload, ReconciledRecord,
    ResponseShape, TableRecord, TableSource, Validator,
};

use super::progress::{batch_percent, ProgressTracker, COMPLETE_PERCENT};
use super::state::JobState;
use super::{
    DownloadedRecord, JobFailure, JobKind, JobObserver, JobOutput, JobReport, JobRequest,
    Presentation, RecordFailure, BATCH_DONE, INVALID_DOCUMENT, VALIDATED,
};
use crate::client::ServiceClient;
use crate::config::RuntimeConfig;
use crate::sink::{write_document, DirectorySink, TableSink};
use crate::{JobError, JobErrorKind};

const READING_CSV: &str = "Reading CSV file";
const READING_XML: &str = "Reading XML file";
const ENCODING_XML: &str = "Encoding XML file";
const QUERYING: &str = "Querying SNAC-Alpha";
const READING_RESPONSE: &str = "Reading response from SNAC-Alpha";
const PARSING_RESPONSE: &str = "Parsing response from SNAC";
const WRITING_JSON: &str = "Writing JSON file from SNAC";
const VALIDATING: &str = "Validating XML file";
const DOWNLOADING: &str = "Downloading constellation";

/// Percent reported just before a document job fails.
const DOCUMENT_FAILURE_PERCENT: u8 = 99;

pub(crate) struct JobController {
    client: Arc<dyn ServiceClient>,
    config: RuntimeConfig,
    request: JobRequest,
    progress: Arc<ProgressTracker>,
    observers: Vec<Arc<dyn JobObserver>>,
    state: JobState,

    /// Diagnostics that arrived with a fatal reply
    failure_diagnostics: Diagnostics,
}

/// Title of the error report shown for each job kind.
fn error_title(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Reconcile => "Reconciliation Errors",
        JobKind::ParseEac => "Parse Errors",
        JobKind::Validate => "Validation Errors",
        JobKind::Download => "Download Errors",
    }
}

fn log_diagnostics(record: Option<usize>, diagnostics: &Diagnostics) {
    for line in diagnostics.lines() {
        warn!(record, line = %line, "service reported unparsed input");
    }
}

impl JobController {
    pub(crate) fn new(
        client: Arc<dyn ServiceClient>,
        config: RuntimeConfig,
        request: JobRequest,
        progress: Arc<ProgressTracker>,
        observers: Vec<Arc<dyn JobObserver>>,
    ) -> Self {
        Self {
            client,
            config,
            request,
            progress,
            observers,
            state: JobState::Idle,
            failure_diagnostics: Diagnostics::default(),
        }
    }

    /// Run the job to its terminal state and notify observers exactly once.
    pub(crate) async fn run(mut self) -> Result<JobReport, JobFailure> {
        info!(
            kind = ?self.request.kind,
            input = %self.request.input.display(),
            client = self.client.name(),
            "job started"
        );

        let outcome = match self.request.kind {
            JobKind::Reconcile => self.run_batch().await,
            JobKind::ParseEac => self.run_document().await,
            JobKind::Validate => self.run_validation().await,
            JobKind::Download => self.run_download().await,
        };

        match outcome {
            Ok(report) => {
                self.enter(JobState::Done);
                self.report(COMPLETE_PERCENT, &report.status_text);
                info!(
                    status = %report.status_text,
                    record_failures = report.record_failures.len(),
                    "job finished"
                );
                for observer in &self.observers {
                    observer.on_success(&report);
                }
                Ok(report)
            }
            Err(err) => {
                let diagnostics = std::mem::take(&mut self.failure_diagnostics);
                let failure = JobFailure {
                    kind: err.kind(),
                    status_text: self.failure_status(&err).to_string(),
                    message: err.to_string(),
                    presentation: self.error_report(&diagnostics),
                    diagnostics,
                };
                self.enter(JobState::Failed);
                if self.request.kind == JobKind::ParseEac {
                    self.report(DOCUMENT_FAILURE_PERCENT, &failure.status_text);
                }
                self.report(COMPLETE_PERCENT, &failure.status_text);
                error!(kind = ?failure.kind, error = %err, "job failed");
                for observer in &self.observers {
                    observer.on_failure(&failure);
                }
                Err(failure)
            }
        }
    }

    async fn run_batch(&mut self) -> Result<JobReport, JobError> {
        self.enter(JobState::Reading);
        self.report(0, READING_CSV);

        let source = TableSource::from_path(&self.request.input)?;
        let mut sink = TableSink::create(self.request.output.as_deref())?;
        let record_count = source.record_count();
        debug!(record_count, "input table read");

        let mut rows = Vec::new();
        let mut records = Vec::with_capacity(record_count);
        let mut record_failures = Vec::new();

        for (offset, record) in source.records().enumerate() {
            self.enter(JobState::Querying);
            let percent = batch_percent(offset + 1, record_count);

            let name = match synthesize_name(record) {
                Ok(name) => name,
                Err(err) => {
                    self.report(percent, &format!("Skipped row {}", record.index + 1));
                    warn!(record = record.index, error = %err, "record skipped");
                    record_failures.push(RecordFailure {
                        record_index: record.index,
                        record_id: record.id().to_string(),
                        query_name: None,
                        kind: JobErrorKind::MalformedInput,
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            self.report(percent, &name);

            match self.reconcile_record(&name, record).await {
                Ok(record_rows) => {
                    self.enter(JobState::Emitting);
                    sink.write_rows(&record_rows)?;
                    rows.extend(record_rows.iter().cloned());
                    records.push(ReconciledRecord {
                        query_name: name,
                        record_id: record.id().to_string(),
                        rows: record_rows,
                    });
                }
                Err(err) if err.is_recoverable() => {
                    warn!(record = record.index, name = %name, error = %err, "record failed");
                    record_failures.push(RecordFailure {
                        record_index: record.index,
                        record_id: record.id().to_string(),
                        query_name: Some(name.clone()),
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                    records.push(ReconciledRecord {
                        query_name: name,
                        record_id: record.id().to_string(),
                        rows: Vec::new(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        self.enter(JobState::Finalizing);
        let output_path = sink.finish()?;
        let presentation = self.presentation(&Diagnostics::default(), || {
            ("Reconciliation Results", render_html_summary(&records))
        });

        Ok(JobReport {
            kind: JobKind::Reconcile,
            status_text: BATCH_DONE.to_string(),
            output: JobOutput::Table { rows, records },
            diagnostics: Diagnostics::default(),
            record_failures,
            output_path,
            presentation,
        })
    }

    /// One exchange for one record. Every error here is per-record.
    async fn reconcile_record(
        &mut self,
        name: &str,
        record: &TableRecord,
    ) -> Result<Vec<OutputRow>, JobError> {
        let payload = QueryPayload::reconcile(name);

        self.enter(JobState::Awaiting);
        let response = self.client.execute(&payload).await?;

        self.enter(JobState::Interpreting);
        let interpretation = interpret(&response.body);
        log_diagnostics(Some(record.index), &interpretation.diagnostics);

        match interpretation.shape {
            ResponseShape::CandidateList(candidates) => Ok(ranker::rows_for(
                name,
                record.id(),
                &candidates,
                self.config.max_candidates,
            )),
            ResponseShape::DocumentResult(_) | ResponseShape::FileResult(_) => Err(
                JobError::Service("reconcile command returned no candidates".to_string()),
            ),
            ResponseShape::ErrorResult(failure) => Err(failure.into()),
        }
    }

    async fn run_document(&mut self) -> Result<JobReport, JobError> {
        self.enter(JobState::Reading);
        self.report(0, READING_XML);
        let document = DocumentSource::from_path(&self.request.input)?.into_record();

        self.report(10, ENCODING_XML);
        let payload = QueryPayload::parse_eac(&document);

        self.enter(JobState::Querying);
        self.report(20, QUERYING);

        self.enter(JobState::Awaiting);
        self.report(50, READING_RESPONSE);
        let response = self.client.execute(&payload).await?;
        self.report(60, READING_RESPONSE);

        self.enter(JobState::Interpreting);
        let Interpretation { shape, diagnostics } = interpret(&response.body);
        log_diagnostics(None, &diagnostics);
        self.report(65, READING_RESPONSE);
        let result = match shape {
            ResponseShape::DocumentResult(result) => result,
            other => {
                self.failure_diagnostics = diagnostics;
                return Err(match other {
                    ResponseShape::ErrorResult(failure) => failure.into(),
                    _ => JobError::Service("parse command returned no document result".to_string()),
                });
            }
        };
        self.report(70, READING_RESPONSE);
        self.report(75, PARSING_RESPONSE);

        self.enter(JobState::Emitting);
        self.report(85, WRITING_JSON);
        let text = result.constellation.as_ref().map(pretty_json);
        let output_path = match &text {
            Some(text) => write_document(self.request.output.as_deref(), text)?,
            None => None,
        };

        self.enter(JobState::Finalizing);
        let outcome = result.outcome_text().to_string();
        let presentation = self.presentation(&diagnostics, || {
            let body = text.clone().unwrap_or_else(|| outcome.clone());
            ("Parsed Constellation", body)
        });

        Ok(JobReport {
            kind: JobKind::ParseEac,
            status_text: outcome.clone(),
            output: JobOutput::Document {
                constellation: result.constellation,
                text,
                outcome,
            },
            diagnostics,
            record_failures: Vec::new(),
            output_path,
            presentation,
        })
    }

    async fn run_validation(&mut self) -> Result<JobReport, JobError> {
        self.enter(JobState::Reading);
        self.report(0, READING_XML);
        let document = DocumentSource::from_path(&self.request.input)?.into_record();

        self.enter(JobState::Interpreting);
        self.report(50, VALIDATING);
        let validator = Validator::embedded(&self.config.ruleset)
            .map_err(|e| JobError::Service(format!("Invalid validation ruleset: {}", e)))?;
        let report = validator.validate(&document)?;
        let Interpretation { diagnostics, .. } = Interpretation::from_validation(&report);

        let status_text = if report.valid { VALIDATED } else { INVALID_DOCUMENT };
        debug!(
            ruleset = validator.ruleset_name(),
            valid = report.valid,
            failed = report.failed_assertions.len(),
            "validation finished"
        );

        self.enter(JobState::Emitting);
        let artifact = format!("{}\r\n{}", status_text, diagnostics.report());
        let output_path = write_document(self.request.output.as_deref(), &artifact)?;

        self.enter(JobState::Finalizing);
        let presentation = self.presentation(&diagnostics, || {
            ("Validation Results", status_text.to_string())
        });

        Ok(JobReport {
            kind: JobKind::Validate,
            status_text: status_text.to_string(),
            output: JobOutput::Validation(report),
            diagnostics,
            record_failures: Vec::new(),
            output_path,
            presentation,
        })
    }

    async fn run_download(&mut self) -> Result<JobReport, JobError> {
        self.enter(JobState::Reading);
        self.report(0, READING_CSV);

        let source = TableSource::id_list_from_path(&self.request.input)?;
        let sink = DirectorySink::create(self.request.output.as_deref())?;
        let record_count = source.record_count();
        let format = self.config.download_format;
        debug!(record_count, format = %format, "identifier list read");

        let mut files = Vec::with_capacity(record_count);
        let mut record_failures = Vec::new();

        for (offset, record) in source.records().enumerate() {
            self.enter(JobState::Querying);
            let percent = batch_percent(offset + 1, record_count);

            let payload = match download_query(record, format) {
                Ok(payload) => payload,
                Err(err) => {
                    self.report(percent, &format!("Skipped row {}", record.index + 1));
                    warn!(record = record.index, error = %err, "record skipped");
                    record_failures.push(RecordFailure {
                        record_index: record.index,
                        record_id: record.id().to_string(),
                        query_name: None,
                        kind: JobErrorKind::MalformedInput,
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            let constellation_id = record.id().trim().to_string();
            self.report(percent, &format!("{} {}", DOWNLOADING, constellation_id));

            match self.download_record(&payload, record).await {
                Ok(file) => {
                    self.enter(JobState::Emitting);
                    let path = sink.write_file(&file.filename, &file.content)?;
                    files.push(DownloadedRecord {
                        record_index: record.index,
                        constellation_id,
                        bytes: file.content.len(),
                        filename: file.filename,
                        path,
                    });
                }
                Err(err) if err.is_recoverable() => {
                    warn!(record = record.index, id = %constellation_id, error = %err, "record failed");
                    record_failures.push(RecordFailure {
                        record_index: record.index,
                        record_id: constellation_id,
                        query_name: None,
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        self.enter(JobState::Finalizing);
        let presentation = self.presentation(&Diagnostics::default(), || {
            ("Downloaded Constellations", download_summary(&files))
        });

        Ok(JobReport {
            kind: JobKind::Download,
            status_text: BATCH_DONE.to_string(),
            output: JobOutput::Downloads { files },
            diagnostics: Diagnostics::default(),
            record_failures,
            output_path: sink.path().map(Path::to_path_buf),
            presentation,
        })
    }

    /// One download exchange. Every error here is per-record.
    async fn download_record(
        &mut self,
        payload: &QueryPayload,
        record: &TableRecord,
    ) -> Result<DownloadedFile, JobError> {
        self.enter(JobState::Awaiting);
        let response = self.client.execute(payload).await?;

        self.enter(JobState::Interpreting);
        let Interpretation { shape, diagnostics } = interpret(&response.body);
        log_diagnostics(Some(record.index), &diagnostics);

        match shape {
            ResponseShape::FileResult(file) => match file.safe_name() {
                Some(name) => Ok(DownloadedFile {
                    filename: name.to_string(),
                    content: file.content,
                }),
                None => Err(JobError::Service(format!(
                    "SNAC returned an unusable file name: {:?}",
                    file.filename
                ))),
            },
            ResponseShape::ErrorResult(failure) => Err(failure.into()),
            ResponseShape::CandidateList(_) | ResponseShape::DocumentResult(_) => Err(
                JobError::Service("download command returned no file".to_string()),
            ),
        }
    }

    /// Error report for non-empty diagnostics.
    fn error_report(&self, diagnostics: &Diagnostics) -> Option<Presentation> {
        (!diagnostics.is_empty()).then(|| Presentation::ErrorReport {
            title: error_title(self.request.kind).to_string(),
            body: diagnostics.report(),
        })
    }

    /// Diagnostics win over display; display only when requested.
    fn presentation<F>(&self, diagnostics: &Diagnostics, display: F) -> Option<Presentation>
    where
        F: FnOnce() -> (&'static str, String),
    {
        if let Some(report) = self.error_report(diagnostics) {
            return Some(report);
        }
        if !self.request.display {
            return None;
        }
        let (title, body) = display();
        Some(Presentation::Display {
            title: title.to_string(),
            body,
        })
    }

    fn failure_status(&self, err: &JobError) -> &'static str {
        match (err.kind(), self.request.kind) {
            (JobErrorKind::MalformedInput, JobKind::Reconcile | JobKind::Download) => {
                "Could not read CSV file"
            }
            (JobErrorKind::MalformedInput, _) => INVALID_DOCUMENT,
            (JobErrorKind::Transport, JobKind::ParseEac) => {
                "SNAC-Alpha could not parse input: Invalid XML File"
            }
            (JobErrorKind::Transport, _) => "Could not reach SNAC",
            (JobErrorKind::Decode, _) => "SNAC-Alpha returned with an error",
            (JobErrorKind::Service, JobKind::Validate) => "Invalid validation ruleset",
            (JobErrorKind::Service, _) => "SNAC-Alpha returned with an error",
            (JobErrorKind::OutputWrite, _) => "Could not write output file",
        }
    }

    fn enter(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "unexpected job state transition");
        }
        debug!(from = ?self.state, to = ?next, "job state");
        self.state = next;
    }

    fn report(&self, percent: u8, status_text: &str) {
        let progress = self.progress.update(percent, status_text);
        debug!(percent = progress.percent, status = %progress.status_text, "progress");
        for observer in &self.observers {
            observer.on_progress(&progress);
        }
    }
}

/// One line per downloaded file.
fn download_summary(files: &[DownloadedRecord]) -> String {
    if files.is_empty() {
        return "no files downloaded\n".to_string();
    }
    files
        .iter()
        .map(|file| {
            format!(
                "{}: {} ({} bytes)\n",
                file.constellation_id, file.filename, file.bytes
            )
        })
        .collect()
}
