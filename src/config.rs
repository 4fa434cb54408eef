use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::FunctionContext;
use crate::types::EventCode;

/// User config key holding the comma-separated eligible event codes.
pub const EVENT_CODES_KEY: &str = "event_codes";

/// User config key holding the gateway URL.
pub const API_GATEWAY_URL_KEY: &str = "api_gateway_url";

pub const DEFAULT_EVENT_CODE: &str = "700";

/// Placeholder URL meaning "no gateway configured".
pub const UNSET_GATEWAY_URL: &str = "dummy";

const DELIMITER_COMMA: char = ',';

/// Routing rules, resolved once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Never empty.
    pub event_codes: BTreeSet<EventCode>,
    pub gateway_url: GatewayUrl,
}

impl RoutingConfig {
    /// Read both keys from the host context, applying defaults.
    pub fn resolve(context: &dyn FunctionContext) -> Self {
        let event_codes = context.user_config_value_or_default(EVENT_CODES_KEY, DEFAULT_EVENT_CODE);
        let gateway_url = context.user_config_value_or_default(API_GATEWAY_URL_KEY, UNSET_GATEWAY_URL);

        Self {
            event_codes: parse_event_codes(&event_codes),
            gateway_url: GatewayUrl::parse(gateway_url),
        }
    }

    pub fn new(event_codes: &str, gateway_url: impl Into<String>) -> Self {
        Self {
            event_codes: parse_event_codes(event_codes),
            gateway_url: GatewayUrl::parse(gateway_url),
        }
    }

    pub fn contains(&self, code: &EventCode) -> bool {
        self.event_codes.contains(code)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CODE, UNSET_GATEWAY_URL)
    }
}

/// Parses a comma-separated code list.
///
/// Entries are trimmed and blanks dropped, so `"700, 710"` yields both codes
/// rather than only exact matches of the untrimmed pieces. Falls back to the
/// default code when nothing is left.
pub fn parse_event_codes(raw: &str) -> BTreeSet<EventCode> {
    let codes: BTreeSet<EventCode> = raw
        .split(DELIMITER_COMMA)
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(EventCode::new)
        .collect();

    if codes.is_empty() {
        BTreeSet::from([EventCode::new(DEFAULT_EVENT_CODE)])
    } else {
        codes
    }
}

/// Gateway destination, with the placeholder lifted into its own variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayUrl {
    Unset,
    Url(String),
}

impl GatewayUrl {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw == UNSET_GATEWAY_URL {
            GatewayUrl::Unset
        } else {
            GatewayUrl::Url(raw)
        }
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            GatewayUrl::Unset => None,
            GatewayUrl::Url(url) => Some(url),
        }
    }
}

/// Fixed-interval retry policy for gateway dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay between attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 3_000,
        }
    }
}

/// Process-level relay settings.
///
/// Unlike [`RoutingConfig`] these don't change between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub retry: RetryPolicy,

    /// Per-request HTTP timeout. `None` leaves the client default.
    pub request_timeout_ms: Option<u64>,
}

impl RelayConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::from_toml_str(&raw)?)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}
