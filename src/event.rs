//! The object storage notification delivered by the events service.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::env::{EVENT_DECODE_POLICY, read_env};

pub const CREATE_OBJECT_EVENT: &str = "com.oraclecloud.objectstorage.createobject";
pub const UPDATE_OBJECT_EVENT: &str = "com.oraclecloud.objectstorage.updateobject";
pub const DELETE_OBJECT_EVENT: &str = "com.oraclecloud.objectstorage.deleteobject";

/// A cloud event describing an object storage action.
///
/// Every field is optional on the wire. Anything absent is left at its default.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageEvent {
    pub cloud_events_version: String,
    #[serde(rename = "eventID")]
    pub event_id: String,
    pub event_type: String,
    pub source: String,
    pub event_type_version: String,
    pub event_time: Option<DateTime<Utc>>,
    #[serde(rename = "schemaURL")]
    pub schema_url: Option<Value>,
    pub content_type: String,
    pub extensions: Extensions,
    pub data: EventData,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Extensions {
    pub compartment_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EventData {
    pub compartment_id: String,
    pub compartment_name: String,
    /// The object name
    pub resource_name: String,
    pub resource_id: String,
    pub availability_domain: String,
    pub free_form_tags: FreeFormTags,
    pub defined_tags: DefinedTags,
    pub additional_details: AdditionalDetails,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FreeFormTags {
    #[serde(rename = "Department")]
    pub department: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DefinedTags {
    #[serde(rename = "Operations")]
    pub operations: OperationsTags,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct OperationsTags {
    #[serde(rename = "CostCenter")]
    pub cost_center: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct AdditionalDetails {
    /// Object storage namespace of the bucket
    pub namespace: String,
    pub public_access_type: String,
    pub e_tag: String,
}

/// The kind of object storage action an event reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    CreateObject,
    UpdateObject,
    DeleteObject,
    Other(String),
}

impl From<&str> for EventKind {
    fn from(event_type: &str) -> Self {
        match event_type {
            CREATE_OBJECT_EVENT => EventKind::CreateObject,
            UPDATE_OBJECT_EVENT => EventKind::UpdateObject,
            DELETE_OBJECT_EVENT => EventKind::DeleteObject,
            other => EventKind::Other(other.to_string()),
        }
    }
}

/// The invocation input could not be read as a [StorageEvent]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event payload is empty")]
    Empty,
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StorageEvent {
    /// Decodes the first json document in `input`. Anything after it is ignored.
    #[tracing::instrument(err, skip(input), fields(input_len = input.len()))]
    pub fn decode(input: &[u8]) -> Result<Self, DecodeError> {
        let event = serde_json::Deserializer::from_slice(input)
            .into_iter::<Self>()
            .next()
            .ok_or(DecodeError::Empty)??;

        event.log();

        Ok(event)
    }

    /// Decodes `input` according to `policy`. Under [DecodePolicy::Lenient] this never
    /// fails: fields with the wrong type are left at their default and the rest is kept.
    pub fn decode_with(input: &[u8], policy: DecodePolicy) -> Result<Self, DecodeError> {
        match (Self::decode(input), policy) {
            (Ok(event), _) => Ok(event),
            (Err(err), DecodePolicy::Strict) => Err(err),
            (Err(err), DecodePolicy::Lenient) => {
                tracing::warn!(error=?err, "keeping the event fields that did decode");
                let event = Self::salvage(input);
                event.log();
                Ok(event)
            }
        }
    }

    /// Picks every well typed field out of the first json value in `input`
    fn salvage(input: &[u8]) -> Self {
        let value = serde_json::Deserializer::from_slice(input)
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .unwrap_or(Value::Null);

        let text = |pointer: &str| {
            value
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            cloud_events_version: text("/cloudEventsVersion"),
            event_id: text("/eventID"),
            event_type: text("/eventType"),
            source: text("/source"),
            event_type_version: text("/eventTypeVersion"),
            event_time: value
                .pointer("/eventTime")
                .and_then(|time| DateTime::<Utc>::deserialize(time).ok()),
            schema_url: value
                .pointer("/schemaURL")
                .filter(|schema| !schema.is_null())
                .cloned(),
            content_type: text("/contentType"),
            extensions: Extensions {
                compartment_id: text("/extensions/compartmentId"),
            },
            data: EventData {
                compartment_id: text("/data/compartmentId"),
                compartment_name: text("/data/compartmentName"),
                resource_name: text("/data/resourceName"),
                resource_id: text("/data/resourceId"),
                availability_domain: text("/data/availabilityDomain"),
                free_form_tags: FreeFormTags {
                    department: text("/data/freeFormTags/Department"),
                },
                defined_tags: DefinedTags {
                    operations: OperationsTags {
                        cost_center: text("/data/definedTags/Operations/CostCenter"),
                    },
                },
                additional_details: AdditionalDetails {
                    namespace: text("/data/additionalDetails/namespace"),
                    public_access_type: text("/data/additionalDetails/publicAccessType"),
                    e_tag: text("/data/additionalDetails/eTag"),
                },
            },
        }
    }

    fn log(&self) {
        tracing::info!(
            event = %serde_json::to_string(self).unwrap_or_default(),
            "decoded storage event"
        );
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from(self.event_type.as_str())
    }
}

/// What to do with input that does not decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Abort the invocation
    #[default]
    Strict,
    /// Log a warning and carry on with whatever fields could be read
    Lenient,
}

/// Represents a value which cannot be converted into a [DecodePolicy]
#[derive(Debug, Error)]
#[error("Could not convert {0} into a decode policy")]
pub struct UnknownPolicy(String);

impl FromStr for DecodePolicy {
    type Err = UnknownPolicy;

    fn from_str(policy: &str) -> Result<Self, UnknownPolicy> {
        match policy {
            "strict" => Ok(DecodePolicy::Strict),
            "lenient" => Ok(DecodePolicy::Lenient),
            s => Err(UnknownPolicy(s.to_string())),
        }
    }
}

impl DecodePolicy {
    /// Reads `EVENT_DECODE_POLICY`, defaulting to [DecodePolicy::Strict]
    pub fn from_env() -> Self {
        match read_env(EVENT_DECODE_POLICY) {
            Ok(value) => value.parse().unwrap_or_else(|err| {
                tracing::warn!(error=%err, "falling back to strict decoding");
                DecodePolicy::Strict
            }),
            Err(_) => DecodePolicy::Strict,
        }
    }
}
