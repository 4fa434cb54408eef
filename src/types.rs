use std::fmt;

use serde::{Deserialize, Serialize};

/// Source location an event must carry to be forwarded.
pub const EXPECTED_SOURCE_LOCATION: &str = "IN";

/// Decoded tracking-update event.
///
/// Only the fields that drive routing are modelled; everything else in the
/// payload is ignored on decode. The gateway always receives the raw payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackingUpdateEvent {
    /// Where the update came from.
    pub meta_info: MetaInfo,

    /// Merged tracking history. Takes precedence when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_order_tracking_response: Option<AtlasResponse>,

    /// Tracking history prior to this update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_order_tracking_response: Option<AtlasResponse>,
}

impl TrackingUpdateEvent {
    /// Origin system of the update, if the payload carried one.
    pub fn source_location(&self) -> Option<&str> {
        self.meta_info.message_source_location.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetaInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_source_location: Option<String>,
}

/// A tracking response. Only the first entry is meaningful here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tracking: Vec<TrackingEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackingEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub current_event_code: EventCode,
}

/// Tracking milestone code, e.g. `"700"`.
///
/// Strongly typed so codes don't get mixed up with other string fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCode(pub String);

impl EventCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
