//! Telemetry log record

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::protocol::message::Message;

/// One line of the telemetry log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Local receive time, RFC 3339
    pub received_at: String,

    /// Message type name, e.g. "TELEMETRY"
    #[serde(rename = "type")]
    pub message_type: String,

    /// Message id from the header
    pub id: u32,

    /// Sender timestamp from the header (Unix seconds)
    pub timestamp: f64,

    pub payload: Value,
}

impl TelemetryRecord {
    /// Build a record for a received message
    ///
    /// # Errors
    ///
    /// Returns `Json` error if the body cannot be converted to JSON
    pub fn from_message(message: &Message, received_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            received_at: received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            message_type: message.message_type().name(),
            id: message.id,
            timestamp: message.timestamp,
            payload: message.body.to_json()?,
        })
    }
}
