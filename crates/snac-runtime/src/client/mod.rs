//! Service client abstraction.
//!
//! A [`ServiceClient`] performs exactly one exchange per call and returns
//! the raw body. Interpretation of the body happens in `snac_core`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use snac_core::QueryPayload;

#[cfg(feature = "http")]
mod http;

#[cfg(test)]
pub(crate) mod mock;

#[cfg(feature = "http")]
pub use http::HttpServiceClient;

/// Errors from a service exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Service returned HTTP {status}: {}", body_excerpt(.body))]
    Status { status: u16, body: String },

    #[error("Response body could not be read: {0}")]
    Decode(String),

    #[error("Service client not configured: {0}")]
    NotConfigured(String),
}

/// Longest body excerpt carried in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

fn body_excerpt(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "(empty body)".to_string();
    }
    let mut excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
    if excerpt.len() < body.len() {
        excerpt.push_str("...");
    }
    excerpt
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code (or 200 for non-HTTP clients)
    pub status: u16,

    /// Response body text
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Sends one command to the remote service.
///
/// Implementations must not retry and must read the body fully before
/// returning.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Execute one exchange.
    async fn execute(&self, payload: &QueryPayload) -> Result<RawResponse, ClientError>;

    /// Client name for logging.
    fn name(&self) -> &str;
}
