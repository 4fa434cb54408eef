use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::RetryPolicy;
use crate::error::DispatchOutcome;
use crate::transport::GatewayTransport;

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Result of forwarding one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcome: DispatchOutcome,
    /// Attempts actually made, including the first.
    pub attempts: u32,
}

/// Forwards payloads to the gateway under a fixed-interval retry policy.
///
/// Attempts within one dispatch are strictly sequential. Only a
/// [`DispatchOutcome::RetryableFailure`] leads to another attempt; the
/// final outcome is always returned, never raised.
#[derive(Clone)]
pub struct GatewayDispatcher {
    transport: Arc<dyn GatewayTransport>,
    policy: RetryPolicy,
}

impl GatewayDispatcher {
    pub fn new(transport: Arc<dyn GatewayTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn dispatch(&self, url: &str, payload: &str) -> DispatchReport {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = self.attempt(url, payload, attempt).await;

            if outcome.is_retryable() && attempt < max_attempts {
                info!(url, attempt, "retrying gateway dispatch");
                metric_inc("relay.dispatch.retry");
                sleep(self.policy.backoff()).await;
                attempt += 1;
                continue;
            }

            match &outcome {
                DispatchOutcome::Delivered => {
                    metric_inc("relay.dispatch.delivered");
                }
                DispatchOutcome::RetryableFailure(reason) => {
                    metric_inc("relay.dispatch.exhausted");
                    error!(url, attempts = attempt, %reason, "gateway dispatch failed after retries");
                }
                DispatchOutcome::FatalFailure(reason) => {
                    metric_inc("relay.dispatch.failed");
                    error!(url, attempts = attempt, %reason, "gateway dispatch failed");
                }
            }

            return DispatchReport {
                outcome,
                attempts: attempt,
            };
        }
    }

    /// One POST, classified.
    async fn attempt(&self, url: &str, payload: &str, attempt: u32) -> DispatchOutcome {
        let response = match self.transport.post_json(url, payload).await {
            Ok(response) => response,
            Err(err) => {
                warn!(url, attempt, error = %err, "gateway request failed");
                return err.into();
            }
        };

        let outcome = DispatchOutcome::from_status(response.status);
        match &outcome {
            DispatchOutcome::Delivered => {
                let body = response.body.unwrap_or_default();
                info!(attempt, status = response.status, response = %body, "gateway response");
                if !body.is_empty() {
                    info!(url, "message sent to gateway");
                }
            }
            DispatchOutcome::RetryableFailure(reason) | DispatchOutcome::FatalFailure(reason) => {
                warn!(url, attempt, status = response.status, %reason, "gateway rejected message");
            }
        }
        outcome
    }
}
