//! # snac-runtime
//!
//! Async job execution for SNAC reconciliation, EAC-CPF parsing,
//! EAC-CPF validation and batch constellation download.
//!
//! A job reads one input artifact, talks to the SNAC REST API one request at
//! a time (or validates locally), and writes one output artifact (or, for
//! downloads, one file per listed constellation into an output directory).
//! Progress and the terminal outcome are reported through [`JobObserver`]s
//! and the [`JobHandle`] returned by [`start_job`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use snac_runtime::{start_job, HttpServiceClient, JobKind, JobRequest, RuntimeConfig};
//!
//! let config = RuntimeConfig::default();
//! let client = Arc::new(HttpServiceClient::new(config.clone())?);
//! let request = JobRequest::new(JobKind::Reconcile, "cbw.csv").with_output("reconciled.csv");
//!
//! let mut handle = start_job(client, config, request);
//! while let Some(event) = handle.next_event().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod client;
pub mod config;
pub mod job;
pub mod sink;

use serde::Serialize;
use thiserror::Error;

use snac_core::{FailureCause, RecordError, ServiceFailure};

pub use client::{ClientError, RawResponse, ServiceClient};
pub use config::{ConfigError, RuntimeConfig};
pub use job::{
    start_job, start_job_with_observers, DownloadedRecord, JobEvent, JobFailure, JobHandle,
    JobKind, JobObserver, JobOutput, JobProgress, JobReport, JobRequest, JobState, Presentation,
    RecordFailure, WaitError,
};
pub use snac_core::DownloadFormat;

#[cfg(feature = "http")]
pub use client::HttpServiceClient;

/// Errors raised while running a job.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] RecordError),

    #[error("Transport failure: {0}")]
    Transport(ClientError),

    #[error("Undecodable response: {0}")]
    Decode(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Failed to write output {path}: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Discriminant of [`JobError`], carried in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    MalformedInput,
    Transport,
    Decode,
    Service,
    OutputWrite,
}

impl JobError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            JobError::MalformedInput(_) => JobErrorKind::MalformedInput,
            JobError::Transport(_) => JobErrorKind::Transport,
            JobError::Decode(_) => JobErrorKind::Decode,
            JobError::Service(_) => JobErrorKind::Service,
            JobError::OutputWrite { .. } => JobErrorKind::OutputWrite,
        }
    }

    /// Whether a batch job may skip the record and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            JobErrorKind::Transport | JobErrorKind::Decode | JobErrorKind::Service
        )
    }
}

impl From<ClientError> for JobError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Decode(message) => JobError::Decode(message),
            other => JobError::Transport(other),
        }
    }
}

impl From<ServiceFailure> for JobError {
    fn from(failure: ServiceFailure) -> Self {
        match failure.cause {
            FailureCause::Decode => JobError::Decode(failure.message),
            FailureCause::Unrecognized => JobError::Service(failure.message),
        }
    }
}
