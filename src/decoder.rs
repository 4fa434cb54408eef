use crate::error::RelayError;
use crate::types::TrackingUpdateEvent;

/// Parses a raw payload into a [`TrackingUpdateEvent`].
///
/// Wire fields are snake_case. Unknown fields are ignored; a missing
/// `meta_info` or a wrongly typed field is a decode error.
pub fn decode(payload: &str) -> Result<TrackingUpdateEvent, RelayError> {
    let event = serde_json::from_str(payload)?;
    Ok(event)
}
