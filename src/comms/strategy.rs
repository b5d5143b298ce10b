//! # Codec Strategy
//!
//! Chooses how a controller snapshot becomes bytes on the wire. The legacy
//! codec packs both controllers into 10 bytes; the extensible codec sends a
//! header + JSON `CONTROLLER_DATA` message.
//!
//! Each encoder also returns a duplicate-suppression key. For the legacy
//! frame that is the frame itself; for the extensible codec it is the JSON
//! payload, since the header carries a fresh id and timestamp every time.

use crate::config::CodecKind;
use crate::controller::manager::DriveModes;
use crate::controller::profile::ControllerProfile;
use crate::controller::state::ControllerState;
use crate::error::Result;
use crate::protocol::legacy;
use crate::protocol::message::Message;

/// Bytes to send plus the key used to detect an unchanged frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub bytes: Vec<u8>,
    pub key: Vec<u8>,
}

/// Turns controller state into a controller-data frame
pub trait FrameEncoder: Send + std::fmt::Debug {
    /// Encode the current state
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized
    fn encode_controller(&self, state: &ControllerState, modes: DriveModes) -> Result<EncodedFrame>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Fixed 10-byte packed frame
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyEncoder;

impl FrameEncoder for LegacyEncoder {
    fn encode_controller(&self, state: &ControllerState, modes: DriveModes) -> Result<EncodedFrame> {
        let bytes = legacy::combined_message(state, modes.reverse).to_vec();
        Ok(EncodedFrame {
            key: bytes.clone(),
            bytes,
        })
    }

    fn name(&self) -> &'static str {
        "legacy"
    }
}

/// Header + JSON controller-data message
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensibleEncoder;

impl FrameEncoder for ExtensibleEncoder {
    fn encode_controller(&self, state: &ControllerState, modes: DriveModes) -> Result<EncodedFrame> {
        let message = Message::controller_data(
            state.values(ControllerProfile::Primary),
            state.values(ControllerProfile::Auxiliary),
            modes.reverse,
        );
        Ok(EncodedFrame {
            key: message.body.encode_payload()?,
            bytes: message.encode()?,
        })
    }

    fn name(&self) -> &'static str {
        "extensible"
    }
}

/// Encoder selected by `[link].codec`
pub fn encoder_for(kind: CodecKind) -> Box<dyn FrameEncoder> {
    match kind {
        CodecKind::Legacy => Box::new(LegacyEncoder),
        CodecKind::Extensible => Box::new(ExtensibleEncoder),
    }
}
