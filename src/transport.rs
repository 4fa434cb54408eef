use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

pub const CONTENT_TYPE: &str = "Content-type";
pub const APPLICATION_JSON: &str = "application/json";

/// Status line and, for 2xx answers, the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Option<String>,
}

/// A single HTTP POST to the gateway. Retries live in the dispatcher.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn post_json(&self, url: &str, payload: &str) -> Result<GatewayResponse, TransportError>;
}

/// `reqwest`-backed transport.
///
/// The client is created once and reused across attempts and invocations.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Redirects are not followed: a 3xx answer is reported as-is.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;

        Ok(Self {
            client,
            timeout: None,
        })
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl GatewayTransport for HttpTransport {
    async fn post_json(&self, url: &str, payload: &str) -> Result<GatewayResponse, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(payload.to_owned());

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();

        // Only successful answers carry a body worth logging.
        let body = if status.is_success() {
            Some(response.text().await.map_err(map_reqwest_error)?)
        } else {
            None
        };

        Ok(GatewayResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}
