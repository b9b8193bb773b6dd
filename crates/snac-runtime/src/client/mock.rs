//! Scripted service client for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use snac_core::QueryPayload;

use super::{ClientError, RawResponse, ServiceClient};

/// Replays scripted replies in order and records every payload it sees.
///
/// Once the script runs out, the last reply is repeated.
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, ClientError>>>,
    last: Mutex<Option<Result<String, ClientError>>>,
    requests: Mutex<Vec<QueryPayload>>,
}

impl ScriptedClient {
    pub(crate) fn new<I>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Result<String, ClientError>>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with the same body.
    pub(crate) fn always(body: impl Into<String>) -> Arc<Self> {
        Self::new([Ok(body.into())])
    }

    pub(crate) fn requests(&self) -> Vec<QueryPayload> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ServiceClient for ScriptedClient {
    async fn execute(&self, payload: &QueryPayload) -> Result<RawResponse, ClientError> {
        self.requests.lock().push(payload.clone());

        let reply = {
            let mut replies = self.replies.lock();
            let mut last = self.last.lock();
            match replies.pop_front() {
                Some(reply) => {
                    *last = Some(reply.clone());
                    reply
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Err(ClientError::NotConfigured("empty script".into()))),
            }
        };

        reply.map(RawResponse::ok)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
