//! HTTP client for the SNAC REST API.
//!
//! Every command is an HTTP PUT of the JSON wire payload. Connections are
//! not pooled, so each exchange opens and closes its own connection.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use snac_core::QueryPayload;

use super::{ClientError, RawResponse, ServiceClient};
use crate::config::RuntimeConfig;

/// reqwest-backed [`ServiceClient`].
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    client: reqwest::Client,
    config: RuntimeConfig,
}

impl HttpServiceClient {
    /// Build a client with the configured timeouts.
    pub fn new(config: RuntimeConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ClientError::NotConfigured(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn timeout(&self) -> Duration {
        self.config.request_timeout
    }

    fn map_error(&self, error: reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout(self.timeout())
        } else if error.is_decode() || error.is_body() {
            ClientError::Decode(error.to_string())
        } else {
            ClientError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    async fn execute(&self, payload: &QueryPayload) -> Result<RawResponse, ClientError> {
        let endpoint = self.config.endpoint_for(payload.command).ok_or_else(|| {
            ClientError::NotConfigured(format!(
                "no endpoint for command {}",
                payload.command.as_str()
            ))
        })?;

        debug!(
            endpoint,
            command = payload.command.as_str(),
            "sending request"
        );

        let response = self
            .client
            .put(endpoint)
            .json(&payload.wire())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_error(e))?;

        if !status.is_success() {
            warn!(
                endpoint,
                status = status.as_u16(),
                body = %body,
                "service returned an error status"
            );
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &str {
        "snac-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snac_core::{DocumentRecord, QueryPayload};

    #[test]
    fn test_client_creation() {
        let client = HttpServiceClient::new(RuntimeConfig::default()).unwrap();
        assert_eq!(client.name(), "snac-http");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_validate_has_no_endpoint() {
        let client = HttpServiceClient::new(RuntimeConfig::default()).unwrap();
        let mut payload = QueryPayload::parse_eac(&DocumentRecord {
            text: "<eac-cpf/>".into(),
        });
        payload.command = snac_core::Command::Validate;
        let err = client.execute(&payload).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConfigured(_)));
    }

    /// Serve one connection: read the whole request, then answer with
    /// `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];
            loop {
                let read = stream.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..read]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
                if read == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{}/", address)
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let endpoint = serve_once("502 Bad Gateway", "<html>upstream down</html>").await;
        let client = HttpServiceClient::new(RuntimeConfig {
            reconcile_endpoint: endpoint,
            ..RuntimeConfig::default()
        })
        .unwrap();

        let err = client
            .execute(&QueryPayload::reconcile("Doe, Jane"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::Status {
                status: 502,
                body: "<html>upstream down</html>".to_string(),
            }
        );
        assert!(err.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_success_body_returned() {
        let endpoint = serve_once("200 OK", r#"{"reconciliation": []}"#).await;
        let client = HttpServiceClient::new(RuntimeConfig {
            reconcile_endpoint: endpoint,
            ..RuntimeConfig::default()
        })
        .unwrap();

        let response = client
            .execute(&QueryPayload::reconcile("Doe, Jane"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"reconciliation": []}"#);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let config = RuntimeConfig {
            reconcile_endpoint: "http://127.0.0.1:9/".to_string(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            ..RuntimeConfig::default()
        };
        let client = HttpServiceClient::new(config).unwrap();
        let err = client
            .execute(&QueryPayload::reconcile("Doe, Jane"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(_) | ClientError::Timeout(_)
        ));
    }
}
