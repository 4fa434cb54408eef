use tracing::info;

use crate::config::RoutingConfig;
use crate::error::{MissingData, RelayError};
use crate::types::{EventCode, TrackingUpdateEvent, EXPECTED_SOURCE_LOCATION};

/// Routing decision for a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub event_code: EventCode,
    pub eligible: bool,
}

/// Returns the current event code of the first tracking entry.
///
/// The merged response is used when present, otherwise the previous one.
pub fn extract_event_code(event: &TrackingUpdateEvent) -> Result<&EventCode, RelayError> {
    let response = match event.merged_order_tracking_response.as_ref() {
        Some(merged) => merged,
        None => {
            info!("merged tracking response not found in the payload");
            event
                .previous_order_tracking_response
                .as_ref()
                .ok_or(MissingData::NoResponse)?
        }
    };

    let first = response
        .tracking
        .first()
        .ok_or(MissingData::EmptyTracking)?;

    Ok(&first.current_event_code)
}

/// Both the source location and the code have to match.
pub fn is_eligible(event: &TrackingUpdateEvent, code: &EventCode, config: &RoutingConfig) -> bool {
    event.source_location() == Some(EXPECTED_SOURCE_LOCATION) && config.contains(code)
}

pub fn classify(event: &TrackingUpdateEvent, config: &RoutingConfig) -> Result<Classification, RelayError> {
    info!(
        source_location = event.source_location().unwrap_or_default(),
        "carrier location"
    );
    info!(event_codes = ?config.event_codes, "event codes supplied for redirecting");

    let event_code = extract_event_code(event)?.clone();
    info!(event_code = %event_code, "event code received in tracking response");

    let eligible = is_eligible(event, &event_code, config);
    Ok(Classification { event_code, eligible })
}
