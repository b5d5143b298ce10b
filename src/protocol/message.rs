//! # Extensible Message Codec
//!
//! Header + JSON message framing for traffic that does not fit the legacy
//! frame: heartbeats with status, telemetry, commands, errors and GPS fixes.
//!
//! ## Frame Format
//!
//! ```text
//! [type:1][id:4 BE][timestamp:8 BE f64 bits][length:2 BE][payload: UTF-8 JSON]
//! ```
//!
//! Payload decoders are looked up by type tag in a [`MessageCodec`] registry.
//! New message types are added by registering a decoder at start-up; the codec
//! itself does not change.

use std::collections::HashMap;
use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::constants::MESSAGE_HEADER_LEN;
use crate::controller::state::ControllerValues;
use crate::error::{BaseStationError, Result};

/// Message type tag
///
/// A newtype rather than an enum so that tags this build does not know about
/// can still be carried and named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageType(pub u8);

impl MessageType {
    pub const HEARTBEAT: Self = Self(0x01);
    pub const CONTROLLER_DATA: Self = Self(0x02);
    pub const TELEMETRY: Self = Self(0x03);
    pub const STATUS_REQUEST: Self = Self(0x04);
    pub const STATUS_RESPONSE: Self = Self(0x05);
    pub const COMMAND: Self = Self(0x06);
    pub const COMMAND_RESPONSE: Self = Self(0x07);
    pub const ERROR: Self = Self(0x08);
    pub const CAMERA_DATA: Self = Self(0x10);
    pub const SENSOR_DATA: Self = Self(0x11);
    pub const GPS_DATA: Self = Self(0x12);
    pub const DIAGNOSTIC: Self = Self(0x13);
    pub const QUIT: Self = Self(0xFF);

    /// Name of a known tag, `None` otherwise
    #[must_use]
    pub fn known_name(self) -> Option<&'static str> {
        let name = match self {
            Self::HEARTBEAT => "HEARTBEAT",
            Self::CONTROLLER_DATA => "CONTROLLER_DATA",
            Self::TELEMETRY => "TELEMETRY",
            Self::STATUS_REQUEST => "STATUS_REQUEST",
            Self::STATUS_RESPONSE => "STATUS_RESPONSE",
            Self::COMMAND => "COMMAND",
            Self::COMMAND_RESPONSE => "COMMAND_RESPONSE",
            Self::ERROR => "ERROR",
            Self::CAMERA_DATA => "CAMERA_DATA",
            Self::SENSOR_DATA => "SENSOR_DATA",
            Self::GPS_DATA => "GPS_DATA",
            Self::DIAGNOSTIC => "DIAGNOSTIC",
            Self::QUIT => "QUIT",
            _ => return None,
        };
        Some(name)
    }

    /// Readable name, `UNKNOWN_XX` for unknown tags
    #[must_use]
    pub fn name(self) -> String {
        match self.known_name() {
            Some(name) => name.to_string(),
            None => format!("UNKNOWN_{:02X}", self.0),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.known_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNKNOWN_{:02X}", self.0),
        }
    }
}

/// Fixed-size message header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub message_id: u32,
    pub timestamp: f64,
    pub payload_length: u16,
}

impl MessageHeader {
    /// Serialize to 15 bytes, big-endian
    #[must_use]
    pub fn to_bytes(&self) -> [u8; MESSAGE_HEADER_LEN] {
        let mut out = [0u8; MESSAGE_HEADER_LEN];
        let mut buf = &mut out[..];
        buf.put_u8(self.message_type.0);
        buf.put_u32(self.message_id);
        buf.put_f64(self.timestamp);
        buf.put_u16(self.payload_length);
        out
    }

    /// Parse the header at the front of `data`
    ///
    /// # Errors
    ///
    /// Returns `Message` error if fewer than 15 bytes are available
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < MESSAGE_HEADER_LEN {
            return Err(BaseStationError::Message(format!(
                "Message too short: {} bytes, header needs {}",
                data.len(),
                MESSAGE_HEADER_LEN
            )));
        }

        let mut buf = &data[..MESSAGE_HEADER_LEN];
        Ok(Self {
            message_type: MessageType(buf.get_u8()),
            message_id: buf.get_u32(),
            timestamp: buf.get_f64(),
            payload_length: buf.get_u16(),
        })
    }
}

fn default_status() -> String {
    "alive".to_string()
}

/// `{"status": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(default = "default_status")]
    pub status: String,
}

impl Default for HeartbeatPayload {
    fn default() -> Self {
        Self { status: default_status() }
    }
}

/// `{"xbox": {...}, "n64": {...}, "reverse_mode": bool}`
///
/// Maps are keyed by legacy index; JSON object keys are the decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerDataPayload {
    #[serde(default)]
    pub xbox: ControllerValues,
    #[serde(default)]
    pub n64: ControllerValues,
    #[serde(default)]
    pub reverse_mode: bool,
}

/// `{"sensors": {...}, "system": {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default)]
    pub sensors: Map<String, Value>,
    #[serde(default)]
    pub system: Map<String, Value>,
}

/// `{"command": ..., "parameters": {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandPayload {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// `{"error_code": n, "message": ...}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub message: String,
}

/// `{"lat": .., "lon": .., "alt": .., "acc": ..}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsPayload {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub alt: f64,
    #[serde(default)]
    pub acc: f64,
}

/// Decoded message body
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Heartbeat(HeartbeatPayload),
    ControllerData(ControllerDataPayload),
    Telemetry(TelemetryPayload),
    Command(CommandPayload),
    Error(ErrorPayload),
    Gps(GpsPayload),
    /// Any tag with an opaque JSON payload
    Raw { message_type: MessageType, payload: Value },
}

impl MessageBody {
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Heartbeat(_) => MessageType::HEARTBEAT,
            MessageBody::ControllerData(_) => MessageType::CONTROLLER_DATA,
            MessageBody::Telemetry(_) => MessageType::TELEMETRY,
            MessageBody::Command(_) => MessageType::COMMAND,
            MessageBody::Error(_) => MessageType::ERROR,
            MessageBody::Gps(_) => MessageType::GPS_DATA,
            MessageBody::Raw { message_type, .. } => *message_type,
        }
    }

    /// Serialize the body to its JSON payload bytes
    ///
    /// # Errors
    ///
    /// Returns `Json` error if serialization fails
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            MessageBody::Heartbeat(p) => serde_json::to_vec(p)?,
            MessageBody::ControllerData(p) => serde_json::to_vec(p)?,
            MessageBody::Telemetry(p) => serde_json::to_vec(p)?,
            MessageBody::Command(p) => serde_json::to_vec(p)?,
            MessageBody::Error(p) => serde_json::to_vec(p)?,
            MessageBody::Gps(p) => serde_json::to_vec(p)?,
            MessageBody::Raw { payload, .. } => serde_json::to_vec(payload)?,
        };
        Ok(bytes)
    }

    /// JSON value of the body, for logging
    ///
    /// # Errors
    ///
    /// Returns `Json` error if serialization fails
    pub fn to_json(&self) -> Result<Value> {
        let value = match self {
            MessageBody::Heartbeat(p) => serde_json::to_value(p)?,
            MessageBody::ControllerData(p) => serde_json::to_value(p)?,
            MessageBody::Telemetry(p) => serde_json::to_value(p)?,
            MessageBody::Command(p) => serde_json::to_value(p)?,
            MessageBody::Error(p) => serde_json::to_value(p)?,
            MessageBody::Gps(p) => serde_json::to_value(p)?,
            MessageBody::Raw { payload, .. } => payload.clone(),
        };
        Ok(value)
    }
}

/// A complete extensible message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u32,
    pub timestamp: f64,
    pub body: MessageBody,
}

impl Message {
    /// Wrap a body with a fresh id and the current time
    #[must_use]
    pub fn new(body: MessageBody) -> Self {
        let now = chrono::Utc::now();
        Self::with_header(
            default_message_id(now.timestamp_millis()),
            now.timestamp_micros() as f64 / 1_000_000.0,
            body,
        )
    }

    #[must_use]
    pub fn with_header(id: u32, timestamp: f64, body: MessageBody) -> Self {
        Self { id, timestamp, body }
    }

    #[must_use]
    pub fn heartbeat(status: impl Into<String>) -> Self {
        Self::new(MessageBody::Heartbeat(HeartbeatPayload { status: status.into() }))
    }

    #[must_use]
    pub fn controller_data(xbox: ControllerValues, n64: ControllerValues, reverse_mode: bool) -> Self {
        Self::new(MessageBody::ControllerData(ControllerDataPayload {
            xbox,
            n64,
            reverse_mode,
        }))
    }

    #[must_use]
    pub fn telemetry(sensors: Map<String, Value>, system: Map<String, Value>) -> Self {
        Self::new(MessageBody::Telemetry(TelemetryPayload { sensors, system }))
    }

    #[must_use]
    pub fn command(command: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self::new(MessageBody::Command(CommandPayload {
            command: command.into(),
            parameters,
        }))
    }

    #[must_use]
    pub fn error(error_code: i64, message: impl Into<String>) -> Self {
        Self::new(MessageBody::Error(ErrorPayload {
            error_code,
            message: message.into(),
        }))
    }

    #[must_use]
    pub fn gps(lat: f64, lon: f64, alt: f64, acc: f64) -> Self {
        Self::new(MessageBody::Gps(GpsPayload { lat, lon, alt, acc }))
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Encode header + payload
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The payload cannot be serialized
    /// - The payload is longer than 65535 bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = self.body.encode_payload()?;
        let payload_length = u16::try_from(payload.len()).map_err(|_| {
            BaseStationError::Message(format!("Payload too large: {} bytes", payload.len()))
        })?;

        let header = MessageHeader {
            message_type: self.message_type(),
            message_id: self.id,
            timestamp: self.timestamp,
            payload_length,
        };

        let mut buf = BytesMut::with_capacity(MESSAGE_HEADER_LEN + payload.len());
        buf.put_slice(&header.to_bytes());
        buf.put_slice(&payload);
        Ok(buf.to_vec())
    }
}

/// Unix milliseconds folded into 32 bits
fn default_message_id(unix_millis: i64) -> u32 {
    (unix_millis.rem_euclid(0xFFFF_FFFF)) as u32
}

/// Turns a payload into a body. The tag is passed so one decoder can serve
/// several tags.
pub type PayloadDecoder = fn(MessageType, &[u8]) -> Result<MessageBody>;

pub fn decode_heartbeat(_: MessageType, payload: &[u8]) -> Result<MessageBody> {
    Ok(MessageBody::Heartbeat(serde_json::from_slice(payload)?))
}

pub fn decode_controller_data(_: MessageType, payload: &[u8]) -> Result<MessageBody> {
    Ok(MessageBody::ControllerData(serde_json::from_slice(payload)?))
}

pub fn decode_telemetry(_: MessageType, payload: &[u8]) -> Result<MessageBody> {
    Ok(MessageBody::Telemetry(serde_json::from_slice(payload)?))
}

pub fn decode_command(_: MessageType, payload: &[u8]) -> Result<MessageBody> {
    Ok(MessageBody::Command(serde_json::from_slice(payload)?))
}

pub fn decode_error(_: MessageType, payload: &[u8]) -> Result<MessageBody> {
    Ok(MessageBody::Error(serde_json::from_slice(payload)?))
}

pub fn decode_gps(_: MessageType, payload: &[u8]) -> Result<MessageBody> {
    Ok(MessageBody::Gps(serde_json::from_slice(payload)?))
}

/// Keeps the payload as untyped JSON
pub fn decode_raw(message_type: MessageType, payload: &[u8]) -> Result<MessageBody> {
    Ok(MessageBody::Raw {
        message_type,
        payload: serde_json::from_slice(payload)?,
    })
}

/// Encoder/decoder with a registry of payload decoders
#[derive(Clone)]
pub struct MessageCodec {
    decoders: HashMap<MessageType, PayloadDecoder>,
}

impl fmt::Debug for MessageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCodec")
            .field("supported_types", &self.supported_types())
            .finish()
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCodec {
    /// Codec with the built-in types: heartbeat, controller data, telemetry,
    /// command and error.
    #[must_use]
    pub fn new() -> Self {
        let mut codec = Self {
            decoders: HashMap::new(),
        };
        codec.register(MessageType::HEARTBEAT, decode_heartbeat);
        codec.register(MessageType::CONTROLLER_DATA, decode_controller_data);
        codec.register(MessageType::TELEMETRY, decode_telemetry);
        codec.register(MessageType::COMMAND, decode_command);
        codec.register(MessageType::ERROR, decode_error);
        codec
    }

    /// Register (or replace) the decoder for a tag
    pub fn register(&mut self, message_type: MessageType, decoder: PayloadDecoder) {
        self.decoders.insert(message_type, decoder);
    }

    #[must_use]
    pub fn is_registered(&self, message_type: MessageType) -> bool {
        self.decoders.contains_key(&message_type)
    }

    /// Registered tags in ascending order
    #[must_use]
    pub fn supported_types(&self) -> Vec<MessageType> {
        let mut types: Vec<MessageType> = self.decoders.keys().copied().collect();
        types.sort();
        types
    }

    /// Encode a message to bytes
    ///
    /// # Errors
    ///
    /// See [`Message::encode`]
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        message.encode()
    }

    /// Decode a message from bytes
    ///
    /// Bytes past the declared payload length are ignored.
    ///
    /// # Arguments
    ///
    /// * `data` - Header followed by at least `payload_length` payload bytes
    ///
    /// # Returns
    ///
    /// * `Result<Message>` - Message carrying the header's id and timestamp
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Data is shorter than the header
    /// - Data is shorter than the declared payload
    /// - No decoder is registered for the tag
    /// - The payload is not valid JSON for the registered decoder
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_basestation::protocol::message::{Message, MessageBody, MessageCodec};
    ///
    /// let codec = MessageCodec::new();
    /// let bytes = codec.encode(&Message::heartbeat("alive"))?;
    /// let decoded = codec.decode(&bytes)?;
    /// assert!(matches!(decoded.body, MessageBody::Heartbeat(ref h) if h.status == "alive"));
    /// # Ok::<(), rover_basestation::error::BaseStationError>(())
    /// ```
    pub fn decode(&self, data: &[u8]) -> Result<Message> {
        let header = MessageHeader::from_bytes(data)?;

        let end = MESSAGE_HEADER_LEN + header.payload_length as usize;
        if data.len() < end {
            return Err(BaseStationError::Message(format!(
                "Truncated payload: header declares {} bytes, {} available",
                header.payload_length,
                data.len() - MESSAGE_HEADER_LEN
            )));
        }

        let decoder = self
            .decoders
            .get(&header.message_type)
            .ok_or(BaseStationError::UnknownMessageType(header.message_type.0))?;

        let body = decoder(header.message_type, &data[MESSAGE_HEADER_LEN..end])?;
        Ok(Message::with_header(header.message_id, header.timestamp, body))
    }
}
