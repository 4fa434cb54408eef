use std::fmt;

use thiserror::Error;

/// Errors that abort an invocation.
///
/// These are the only failures surfaced to the pub/sub host, which decides
/// on redelivery or dead-lettering. Gateway failures never end up here.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Payload is not valid JSON or does not match the event shape.
    #[error("failed to decode tracking update: {0}")]
    Decode(#[from] serde_json::Error),

    /// Payload decoded but carries no usable tracking data.
    #[error("missing tracking data: {0}")]
    MissingData(MissingData),
}

impl From<MissingData> for RelayError {
    fn from(missing: MissingData) -> Self {
        RelayError::MissingData(missing)
    }
}

/// What was missing from an otherwise well-formed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingData {
    /// Neither a merged nor a previous tracking response.
    NoResponse,

    /// The selected response has no tracking entries.
    EmptyTracking,
}

impl fmt::Display for MissingData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingData::NoResponse =>
                write!(f, "no tracking response found in the payload"),
            MissingData::EmptyTracking =>
                write!(f, "no tracking details found in tracking response"),
        }
    }
}

/// Failure to publish to the output topic. Only ever logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to publish to topic {topic}: {message}")]
pub struct PublishError {
    pub topic: String,
    pub message: String,
}

/// Failure below the HTTP status line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Final outcome of forwarding an event to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Worth another attempt while attempts remain.
    RetryableFailure(FailureReason),
    /// Stops the retry loop immediately.
    FatalFailure(FailureReason),
}

impl DispatchOutcome {
    /// Maps a gateway status code to an outcome.
    ///
    /// 4xx is retryable; every other non-2xx status is fatal.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => DispatchOutcome::Delivered,
            400..=499 => DispatchOutcome::RetryableFailure(FailureReason::ClientError(status)),
            _ => DispatchOutcome::FatalFailure(FailureReason::UnexpectedStatus(status)),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchOutcome::RetryableFailure(_))
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }
}

impl From<TransportError> for DispatchOutcome {
    fn from(err: TransportError) -> Self {
        let reason = match err {
            TransportError::Timeout => FailureReason::Timeout,
            TransportError::Network(message) | TransportError::Client(message) =>
                FailureReason::Network(message),
        };
        DispatchOutcome::FatalFailure(reason)
    }
}

/// Reasons why a gateway attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Gateway answered 4xx.
    ClientError(u16),
    /// Gateway answered outside 2xx and 4xx.
    UnexpectedStatus(u16),
    Timeout,
    Network(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ClientError(status) =>
                write!(f, "unexpected response status: {status} (retryable)"),
            FailureReason::UnexpectedStatus(status) =>
                write!(f, "unexpected response status: {status}"),
            FailureReason::Timeout =>
                write!(f, "request timed out"),
            FailureReason::Network(message) =>
                write!(f, "network error: {message}"),
        }
    }
}
