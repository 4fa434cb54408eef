use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::classifier::classify;
use crate::config::{GatewayUrl, RelayConfig, RoutingConfig};
use crate::decoder::decode;
use crate::dispatcher::{DispatchReport, GatewayDispatcher};
use crate::error::{RelayError, TransportError};
use crate::runtime::FunctionContext;
use crate::transport::{GatewayTransport, HttpTransport};
use crate::types::EventCode;

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Per-invocation progress, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Start,
    Republished,
    Decoded,
    Classified,
    Dispatched,
    Skipped,
    Done,
    Aborted,
}

/// How an invocation that did not abort ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Dispatched(DispatchReport),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Wrong source location or code not in the configured set.
    NotEligible {
        source_location: Option<String>,
        event_code: EventCode,
    },
    /// Eligible, but no gateway URL was configured.
    GatewayUnset,
}

/// Handles one tracking-update event per call.
///
/// Holds no per-event state, so one relay can serve concurrent invocations.
pub struct Relay {
    context: Arc<dyn FunctionContext>,
    dispatcher: GatewayDispatcher,
}

impl Relay {
    /// Relay that talks HTTP through `reqwest`.
    pub fn new(context: Arc<dyn FunctionContext>, config: &RelayConfig) -> Result<Self, TransportError> {
        let mut transport = HttpTransport::new()?;
        if let Some(timeout) = config.request_timeout() {
            transport = transport.with_timeout(timeout);
        }
        Ok(Self::with_transport(context, Arc::new(transport), config))
    }

    pub fn with_transport(
        context: Arc<dyn FunctionContext>,
        transport: Arc<dyn GatewayTransport>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            context,
            dispatcher: GatewayDispatcher::new(transport, config.retry),
        }
    }

    /// Process one payload.
    ///
    /// The payload is always republished to the output topic first, without
    /// waiting for the publish to finish. Only decode and missing-data
    /// failures are returned as errors.
    pub async fn handle(&self, payload: &str) -> Result<Handled, RelayError> {
        info!("payload received");
        debug!(payload, "raw payload");
        advance(RelayStage::Start);

        self.republish(payload);
        advance(RelayStage::Republished);

        match self.process(payload).await {
            Ok(handled) => {
                advance(RelayStage::Done);
                Ok(handled)
            }
            Err(err) => {
                metric_inc("relay.aborted");
                error!(error = %err, "aborting invocation");
                advance(RelayStage::Aborted);
                Err(err)
            }
        }
    }

    async fn process(&self, payload: &str) -> Result<Handled, RelayError> {
        let event = decode(payload)?;
        advance(RelayStage::Decoded);

        let routing = RoutingConfig::resolve(self.context.as_ref());
        let classification = classify(&event, &routing)?;
        advance(RelayStage::Classified);

        if !classification.eligible {
            info!("tracking response not eligible for gateway");
            metric_inc("relay.skipped.not_eligible");
            advance(RelayStage::Skipped);
            return Ok(Handled::Skipped(SkipReason::NotEligible {
                source_location: event.source_location().map(str::to_string),
                event_code: classification.event_code,
            }));
        }

        match &routing.gateway_url {
            GatewayUrl::Url(url) => {
                let report = self.dispatcher.dispatch(url, payload).await;
                advance(RelayStage::Dispatched);
                Ok(Handled::Dispatched(report))
            }
            GatewayUrl::Unset => {
                error!("URL for gateway is not provided");
                metric_inc("relay.skipped.gateway_unset");
                advance(RelayStage::Skipped);
                Ok(Handled::Skipped(SkipReason::GatewayUnset))
            }
        }
    }

    /// Fire-and-forget publish of the untouched payload.
    fn republish(&self, payload: &str) {
        let context = Arc::clone(&self.context);
        let topic = context.output_topic();
        let payload = payload.to_owned();

        tokio::spawn(async move {
            match context.publish(&topic, payload).await {
                Ok(()) => {
                    metric_inc("relay.republish.success");
                    info!(topic = %topic, "message sent to output topic");
                }
                Err(err) => {
                    metric_inc("relay.republish.failure");
                    warn!(topic = %topic, error = %err, "republish failed");
                }
            }
        });
    }
}

fn advance(stage: RelayStage) {
    debug!(?stage, "relay stage");
}
