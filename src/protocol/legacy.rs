//! # Legacy Frame Codec
//!
//! Encodes controller state into the fixed 10-byte frame the rover firmware
//! reads, and decodes it back for verification.
//!
//! ```text
//! [START][axisA][axisB][btn1][btn2][START][aux1][aux2][aux3][aux4]
//! ```
//!
//! Every button byte holds four 2-bit fields, field `i` at bits `2i..2i+1`:
//!
//! | Byte | Field 0 | Field 1 | Field 2 | Field 3 |
//! |------|---------|---------|---------|---------|
//! | btn1 | A | B | X | Y |
//! | btn2 | LB | RB | LT | RT |
//! | aux1 | A | B | L | R |
//! | aux2 | C-up | C-down | C-left | C-right |
//! | aux3 | D-up | D-down | D-left | D-right |
//! | aux4 | Z | - | - | - |
//!
//! Quit and heartbeat frames are also built here since they share the byte
//! stream with controller frames.

use crate::controller::profile::{AuxButton, ButtonState, PrimaryAxis, PrimaryButton, Trigger};
use crate::controller::state::ControllerState;
use crate::error::{BaseStationError, Result};

use super::constants::*;

/// Primary button fields in wire order (btn1 then btn2)
pub const PRIMARY_FIELD_COUNT: usize = 8;

/// Auxiliary button fields in wire order (aux1, aux2, aux3, then Z)
pub const AUXILIARY_FIELD_COUNT: usize = 13;

const AUX_FIELD_ORDER: [AuxButton; AUXILIARY_FIELD_COUNT] = [
    AuxButton::A,
    AuxButton::B,
    AuxButton::L,
    AuxButton::R,
    AuxButton::CUp,
    AuxButton::CDown,
    AuxButton::CLeft,
    AuxButton::CRight,
    AuxButton::DpUp,
    AuxButton::DpDown,
    AuxButton::DpLeft,
    AuxButton::DpRight,
    AuxButton::Z,
];

/// Decoded content of one legacy controller frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyFrame {
    /// Drive axes in wire order
    pub drive: [u8; 2],
    /// A, B, X, Y, LB, RB, LT, RT
    pub primary: [ButtonState; PRIMARY_FIELD_COUNT],
    /// A, B, L, R, C-up, C-down, C-left, C-right, D-up, D-down, D-left, D-right, Z
    pub auxiliary: [ButtonState; AUXILIARY_FIELD_COUNT],
}

impl Default for LegacyFrame {
    fn default() -> Self {
        Self {
            drive: [AXIS_NEUTRAL; 2],
            primary: [ButtonState::Off; PRIMARY_FIELD_COUNT],
            auxiliary: [ButtonState::Off; AUXILIARY_FIELD_COUNT],
        }
    }
}

impl LegacyFrame {
    /// Capture the fields of `state` that the legacy frame carries.
    #[must_use]
    pub fn from_state(state: &ControllerState, reverse: bool) -> Self {
        let p = &state.primary;
        let primary = [
            p.button(PrimaryButton::A),
            p.button(PrimaryButton::B),
            p.button(PrimaryButton::X),
            p.button(PrimaryButton::Y),
            p.button(PrimaryButton::LeftBumper),
            p.button(PrimaryButton::RightBumper),
            p.trigger(Trigger::Left),
            p.trigger(Trigger::Right),
        ];

        Self {
            drive: drive_axes(state, reverse),
            primary,
            auxiliary: AUX_FIELD_ORDER.map(|b| state.auxiliary.button(b)),
        }
    }

    /// `[START][axisA][axisB][btn1][btn2]`
    #[must_use]
    pub fn primary_message(&self) -> [u8; PRIMARY_MESSAGE_LEN] {
        [
            START_BYTE,
            self.drive[0],
            self.drive[1],
            pack_states(&self.primary[0..4]),
            pack_states(&self.primary[4..8]),
        ]
    }

    /// `[START][aux1][aux2][aux3][aux4]`
    #[must_use]
    pub fn auxiliary_message(&self) -> [u8; AUXILIARY_MESSAGE_LEN] {
        [
            START_BYTE,
            pack_states(&self.auxiliary[0..4]),
            pack_states(&self.auxiliary[4..8]),
            pack_states(&self.auxiliary[8..12]),
            pack_states(&self.auxiliary[12..13]),
        ]
    }

    /// Full 10-byte frame
    #[must_use]
    pub fn encode(&self) -> [u8; LEGACY_FRAME_LEN] {
        let mut frame = [0u8; LEGACY_FRAME_LEN];
        frame[..PRIMARY_MESSAGE_LEN].copy_from_slice(&self.primary_message());
        frame[PRIMARY_MESSAGE_LEN..].copy_from_slice(&self.auxiliary_message());
        frame
    }

    /// Parse a 10-byte frame
    ///
    /// # Errors
    ///
    /// Returns `Protocol` error if:
    /// - Frame is not exactly 10 bytes
    /// - Either START sentinel is wrong
    /// - A used button field is 0 or 3
    /// - The unused bits of the last byte are not zero
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() != LEGACY_FRAME_LEN {
            return Err(BaseStationError::Protocol(format!(
                "Frame must be {} bytes, got {}",
                LEGACY_FRAME_LEN,
                frame.len()
            )));
        }

        for offset in [0, PRIMARY_MESSAGE_LEN] {
            if frame[offset] != START_BYTE {
                return Err(BaseStationError::Protocol(format!(
                    "Invalid start byte at offset {}: 0x{:02X}",
                    offset, frame[offset]
                )));
            }
        }

        let mut decoded = Self {
            drive: [frame[1], frame[2]],
            ..Self::default()
        };

        unpack_states(frame[3], &mut decoded.primary[0..4])?;
        unpack_states(frame[4], &mut decoded.primary[4..8])?;
        unpack_states(frame[6], &mut decoded.auxiliary[0..4])?;
        unpack_states(frame[7], &mut decoded.auxiliary[4..8])?;
        unpack_states(frame[8], &mut decoded.auxiliary[8..12])?;
        unpack_states(frame[9], &mut decoded.auxiliary[12..13])?;

        let headroom = frame[9] >> BUTTON_FIELD_BITS;
        if headroom != 0 {
            return Err(BaseStationError::Protocol(format!(
                "Unused bits set in last auxiliary byte: 0x{:02X}",
                frame[9]
            )));
        }

        Ok(decoded)
    }
}

/// Drive axes in wire order: (LY, RY), or (RY, LY) when reversing.
///
/// This only swaps which stick is sent first. The sign flip applied to stick
/// values in reverse is done by the input processor; the two compose.
#[must_use]
pub fn drive_axes(state: &ControllerState, reverse: bool) -> [u8; 2] {
    let left = state.primary.axis(PrimaryAxis::LeftY);
    let right = state.primary.axis(PrimaryAxis::RightY);
    if reverse {
        [right, left]
    } else {
        [left, right]
    }
}

/// Encode the primary half of a legacy frame
#[must_use]
pub fn primary_message(state: &ControllerState, reverse: bool) -> [u8; PRIMARY_MESSAGE_LEN] {
    LegacyFrame::from_state(state, reverse).primary_message()
}

/// Encode the auxiliary half of a legacy frame
#[must_use]
pub fn auxiliary_message(state: &ControllerState) -> [u8; AUXILIARY_MESSAGE_LEN] {
    LegacyFrame::from_state(state, false).auxiliary_message()
}

/// Encode a complete legacy frame
///
/// # Arguments
///
/// * `state` - Current controller state
/// * `reverse` - Whether reverse drive mode is active
///
/// # Returns
///
/// * `[u8; 10]` - Primary half followed by auxiliary half
///
/// # Examples
///
/// ```
/// use rover_basestation::controller::state::ControllerState;
/// use rover_basestation::protocol::legacy::combined_message;
///
/// let frame = combined_message(&ControllerState::new(), false);
/// assert_eq!(frame, [0xDE, 100, 100, 0x55, 0x55, 0xDE, 0x55, 0x55, 0x55, 0x01]);
/// ```
#[must_use]
pub fn combined_message(state: &ControllerState, reverse: bool) -> [u8; LEGACY_FRAME_LEN] {
    LegacyFrame::from_state(state, reverse).encode()
}

/// Pack up to four 2-bit values, LSB first
///
/// Each value is masked to 2 bits.
#[must_use]
pub fn pack_fields(values: &[u8]) -> u8 {
    pack(values.iter().copied())
}

fn pack(values: impl Iterator<Item = u8>) -> u8 {
    values
        .take(BUTTON_FIELDS_PER_BYTE)
        .enumerate()
        .fold(0u8, |byte, (i, value)| {
            byte | ((value & 0b11) << (BUTTON_FIELD_BITS as usize * i))
        })
}

/// Extract the 2-bit field at `index` (0..=3)
#[must_use]
pub fn unpack_field(byte: u8, index: usize) -> u8 {
    (byte >> (BUTTON_FIELD_BITS as usize * index)) & 0b11
}

fn pack_states(states: &[ButtonState]) -> u8 {
    pack(states.iter().map(|s| s.as_u8()))
}

fn unpack_states(byte: u8, out: &mut [ButtonState]) -> Result<()> {
    for (i, slot) in out.iter_mut().enumerate() {
        let value = unpack_field(byte, i);
        *slot = ButtonState::from_wire(value).ok_or_else(|| {
            BaseStationError::Protocol(format!(
                "Illegal button field {} in byte 0x{:02X}: {}",
                i, byte, value
            ))
        })?;
    }
    Ok(())
}

/// One-byte quit frame
#[must_use]
pub fn quit_frame() -> [u8; 1] {
    [QUIT_BYTE]
}

/// Heartbeat frame for the given Unix time in seconds
///
/// Only the low 16 bits of the timestamp are sent, big-endian.
#[must_use]
pub fn heartbeat_frame(unix_seconds: i64) -> [u8; HEARTBEAT_FRAME_LEN] {
    let fragment = (unix_seconds & 0xFFFF) as u16;
    let [hi, lo] = fragment.to_be_bytes();
    [HEARTBEAT_BYTE, hi, lo]
}

/// Heartbeat frame stamped with the current time
#[must_use]
pub fn heartbeat_frame_now() -> [u8; HEARTBEAT_FRAME_LEN] {
    heartbeat_frame(chrono::Utc::now().timestamp())
}

/// Parse a heartbeat frame, returning its 16-bit timestamp fragment
///
/// # Errors
///
/// Returns `Protocol` error if the frame is not 3 bytes or does not start
/// with the heartbeat identifier.
pub fn parse_heartbeat(frame: &[u8]) -> Result<u16> {
    match frame {
        [HEARTBEAT_BYTE, hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        [first, _, _] => Err(BaseStationError::Protocol(format!(
            "Not a heartbeat frame: identifier 0x{:02X}",
            first
        ))),
        _ => Err(BaseStationError::Protocol(format!(
            "Heartbeat frame must be {} bytes, got {}",
            HEARTBEAT_FRAME_LEN,
            frame.len()
        ))),
    }
}
