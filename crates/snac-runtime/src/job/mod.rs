//! Job execution.
//!
//! [`start_job`] runs one job on a dedicated tokio task and returns a
//! [`JobHandle`]. Progress and the single terminal outcome are delivered to
//! registered [`JobObserver`]s and to the handle's event stream.

mod controller;
mod progress;
mod state;

pub use progress::{batch_percent, ProgressTracker, COMPLETE_PERCENT};
pub use state::JobState;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use snac_core::{Diagnostics, OutputRow, ReconciledRecord, ValidationReport};

use crate::client::ServiceClient;
use crate::config::RuntimeConfig;
use crate::JobErrorKind;

use controller::JobController;

/// Final status text of a batch job.
pub const BATCH_DONE: &str = "DONE!";

/// Final status text of a valid document in validation mode.
pub const VALIDATED: &str = "Validated Successfully";

/// Final status text of an invalid document in validation mode.
pub const INVALID_DOCUMENT: &str = "Invalid XML File";

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Reconcile every row of a delimited table
    Reconcile,

    /// Parse one EAC-CPF document remotely
    ParseEac,

    /// Validate one EAC-CPF document locally
    Validate,

    /// Download every constellation listed in a table of identifiers
    Download,
}

/// Parameters of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub kind: JobKind,

    /// Input artifact
    pub input: PathBuf,

    /// Output artifact, if it should be written
    pub output: Option<PathBuf>,

    /// Whether to surface the result for display
    pub display: bool,
}

impl JobRequest {
    pub fn new(kind: JobKind, input: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            input: input.into(),
            output: None,
            display: false,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }
}

/// A progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    /// 0 - 100, non-decreasing within a job
    pub percent: u8,

    pub status_text: String,
}

/// A result the host should show, or the errors it should show instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Presentation {
    Display { title: String, body: String },
    ErrorReport { title: String, body: String },
}

/// What a job produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum JobOutput {
    /// Reconciliation rows, in input order
    Table {
        rows: Vec<OutputRow>,
        records: Vec<ReconciledRecord>,
    },

    /// Parsed constellation and its pretty-printed form
    Document {
        constellation: Option<Value>,
        text: Option<String>,
        outcome: String,
    },

    /// Local validation verdict
    Validation(ValidationReport),

    /// Downloaded constellation exports, in input order
    Downloads { files: Vec<DownloadedRecord> },
}

/// One constellation export received by a download job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedRecord {
    /// 0-based data row index
    pub record_index: usize,

    pub constellation_id: String,

    /// File name reported by the service
    pub filename: String,

    /// Decoded size in bytes
    pub bytes: usize,

    /// Where the file was written, if anywhere
    pub path: Option<PathBuf>,
}

/// A batch record that contributed no rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// 0-based data row index
    pub record_index: usize,

    pub record_id: String,

    /// Synthesized name, if one could be built
    pub query_name: Option<String>,

    pub kind: JobErrorKind,

    pub message: String,
}

/// Successful outcome of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub kind: JobKind,

    /// Final status text (also the last progress update)
    pub status_text: String,

    pub output: JobOutput,

    /// Diagnostics reported alongside the result
    pub diagnostics: Diagnostics,

    /// Batch records that failed; empty for document jobs
    pub record_failures: Vec<RecordFailure>,

    /// Where the output artifact was written, if anywhere
    pub output_path: Option<PathBuf>,

    pub presentation: Option<Presentation>,
}

/// Terminal failure of a job.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{status_text}: {message}")]
pub struct JobFailure {
    pub kind: JobErrorKind,

    /// Final status text (also the last progress update)
    pub status_text: String,

    /// Human-readable diagnostic
    pub message: String,

    /// Diagnostics the service reported alongside the failure
    pub diagnostics: Diagnostics,

    /// Error report for the host to show, when diagnostics are present
    pub presentation: Option<Presentation>,
}

/// Events emitted by a running job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(JobProgress),
    Succeeded(Box<JobReport>),
    Failed(JobFailure),
}

/// Receives job events. Called from the job's task, in order.
pub trait JobObserver: Send + Sync {
    fn on_progress(&self, progress: &JobProgress);

    fn on_success(&self, report: &JobReport);

    fn on_failure(&self, failure: &JobFailure);
}

/// Forwards events to a [`JobHandle`]'s stream.
struct ChannelObserver {
    sender: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelObserver {
    fn send(&self, event: JobEvent) {
        if self.sender.send(event).is_err() {
            trace!("job event stream closed");
        }
    }
}

impl JobObserver for ChannelObserver {
    fn on_progress(&self, progress: &JobProgress) {
        self.send(JobEvent::Progress(progress.clone()));
    }

    fn on_success(&self, report: &JobReport) {
        self.send(JobEvent::Succeeded(Box::new(report.clone())));
    }

    fn on_failure(&self, failure: &JobFailure) {
        self.send(JobEvent::Failed(failure.clone()));
    }
}

/// Why [`JobHandle::wait`] has no report.
#[derive(Error, Debug)]
pub enum WaitError {
    #[error("job failed: {0}")]
    Failed(JobFailure),

    #[error("job was aborted")]
    Aborted,

    #[error("job task panicked: {0}")]
    Panicked(String),
}

/// Handle to a running job.
pub struct JobHandle {
    events: mpsc::UnboundedReceiver<JobEvent>,
    progress: Arc<ProgressTracker>,
    task: JoinHandle<Result<JobReport, JobFailure>>,
}

impl JobHandle {
    /// Next event, or `None` once the job has finished and every event has
    /// been received.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> JobProgress {
        self.progress.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the job. No terminal event is emitted for an aborted job.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> Result<JobReport, WaitError> {
        match self.task.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(failure)) => Err(WaitError::Failed(failure)),
            Err(e) if e.is_cancelled() => Err(WaitError::Aborted),
            Err(e) => Err(WaitError::Panicked(e.to_string())),
        }
    }
}

/// Start a job on its own task.
pub fn start_job(
    client: Arc<dyn ServiceClient>,
    config: RuntimeConfig,
    request: JobRequest,
) -> JobHandle {
    start_job_with_observers(client, config, request, Vec::new())
}

/// Start a job that also reports to `observers`.
pub fn start_job_with_observers(
    client: Arc<dyn ServiceClient>,
    config: RuntimeConfig,
    request: JobRequest,
    mut observers: Vec<Arc<dyn JobObserver>>,
) -> JobHandle {
    let (sender, events) = mpsc::unbounded_channel();
    observers.push(Arc::new(ChannelObserver { sender }));

    let progress = Arc::new(ProgressTracker::new());
    let controller = JobController::new(client, config, request, Arc::clone(&progress), observers);
    let task = tokio::spawn(controller.run());

    JobHandle {
        events,
        progress,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::ScriptedClient;
    use parking_lot::Mutex;
    use std::io::Write;

    #[derive(Default)]
    struct RecordingObserver {
        percents: Mutex<Vec<u8>>,
        successes: Mutex<usize>,
        failures: Mutex<Vec<JobFailure>>,
    }

    impl JobObserver for RecordingObserver {
        fn on_progress(&self, progress: &JobProgress) {
            self.percents.lock().push(progress.percent);
        }

        fn on_success(&self, _report: &JobReport) {
            *self.successes.lock() += 1;
        }

        fn on_failure(&self, failure: &JobFailure) {
            self.failures.lock().push(failure.clone());
        }
    }

    fn write_input(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_request_builder() {
        let request = JobRequest::new(JobKind::Reconcile, "in.csv")
            .with_output("out.csv")
            .with_display(true);
        assert_eq!(request.output, Some(PathBuf::from("out.csv")));
        assert!(request.display);
    }

    #[tokio::test]
    async fn test_event_stream_ends_with_one_terminal_event() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "in.csv", "id,a,given,middle,surname\n1,,Jane,Q,Doe\n");
        let client = ScriptedClient::always(r#"{"reconciliation": []}"#);

        let mut handle = start_job(client, RuntimeConfig::default(), JobRequest::new(JobKind::Reconcile, input));

        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }

        let terminal: Vec<_> = events.iter().filter(|e| !matches!(e, JobEvent::Progress(_))).collect();
        assert_eq!(terminal.len(), 1);
        assert!(matches!(events.last(), Some(JobEvent::Succeeded(_))));
        assert_eq!(handle.progress().percent, 100);
        assert_eq!(handle.progress().status_text, BATCH_DONE);
    }

    #[tokio::test]
    async fn test_observer_receives_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.csv");
        let observer = Arc::new(RecordingObserver::default());
        let client = ScriptedClient::always("{}");

        let handle = start_job_with_observers(
            client,
            RuntimeConfig::default(),
            JobRequest::new(JobKind::Reconcile, input),
            vec![observer.clone() as Arc<dyn JobObserver>],
        );
        let err = handle.wait().await.unwrap_err();

        assert!(matches!(err, WaitError::Failed(ref f) if f.kind == JobErrorKind::MalformedInput));
        assert_eq!(observer.failures.lock().len(), 1);
        assert_eq!(*observer.successes.lock(), 0);
        assert_eq!(observer.percents.lock().last(), Some(&100));
    }

    #[tokio::test]
    async fn test_abort_emits_no_terminal_event() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir, "in.csv", "id,a,given,middle,surname\n1,,Jane,Q,Doe\n");
        let client = ScriptedClient::always(r#"{"reconciliation": []}"#);

        // A current-thread test runtime does not run the job until we yield.
        let mut handle = start_job(client, RuntimeConfig::default(), JobRequest::new(JobKind::Reconcile, input));
        handle.abort();

        while let Some(event) = handle.next_event().await {
            assert!(matches!(event, JobEvent::Progress(_)));
        }
        assert!(matches!(handle.wait().await, Err(WaitError::Aborted)));
    }
}
