//! A single-event tracking-update relay.
//!
//! Each invocation takes one tracking-update payload from a pub/sub topic,
//! republishes it unchanged to an output topic, and forwards it to an HTTP
//! gateway when it qualifies.
//!
//! ## Guarantees
//! - Every payload is handed to the output topic, whatever happens next
//! - At most `max_attempts` POSTs per eligible event, spaced by a fixed backoff
//! - Gateway failures never fail the invocation
//!
//! ## Non-Guarantees
//! - Ordering between the republish and the gateway call
//! - Ordering or exactly-once delivery across events
//! - Persistence of dispatch outcomes
//!
//! Only a payload that cannot be decoded, or that carries no tracking data,
//! is reported back to the host as a failure.

mod classifier;
mod config;
mod decoder;
mod dispatcher;
mod error;
mod relay;
mod runtime;
mod transport;
mod types;

pub use classifier::{classify, extract_event_code, is_eligible, Classification};
pub use config::{
    parse_event_codes,
    ConfigError,
    GatewayUrl,
    RelayConfig,
    RetryPolicy,
    RoutingConfig,
    API_GATEWAY_URL_KEY,
    DEFAULT_EVENT_CODE,
    EVENT_CODES_KEY,
    UNSET_GATEWAY_URL,
};
pub use decoder::decode;
pub use dispatcher::{DispatchReport, GatewayDispatcher};
pub use error::{
    DispatchOutcome,
    FailureReason,
    MissingData,
    PublishError,
    RelayError,
    TransportError,
};
pub use relay::{Handled, Relay, RelayStage, SkipReason};
pub use runtime::{FunctionContext, InMemoryContext};
pub use transport::{GatewayResponse, GatewayTransport, HttpTransport, APPLICATION_JSON, CONTENT_TYPE};
pub use types::{AtlasResponse, EventCode, MetaInfo, TrackingEntry, TrackingUpdateEvent, EXPECTED_SOURCE_LOCATION};
