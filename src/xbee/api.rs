//! # XBee API Constants and Types
//!
//! Frame definitions for XBee API mode (AP=1, unescaped).
//!
//! ```text
//! [0x7E][length:2 BE][frame data: type + fields][checksum]
//! ```

use crate::error::{BaseStationError, Result};

/// API frame start delimiter
pub const START_DELIMITER: u8 = 0x7E;

/// Transmit Request (64-bit addressing)
pub const FRAME_TYPE_TRANSMIT_REQUEST: u8 = 0x10;

/// Transmit Status
pub const FRAME_TYPE_TRANSMIT_STATUS: u8 = 0x8B;

/// Receive Packet
pub const FRAME_TYPE_RECEIVE_PACKET: u8 = 0x90;

/// 16-bit address placeholder when only the 64-bit address is known
pub const ADDRESS_16_UNKNOWN: u16 = 0xFFFE;

/// Start delimiter + 2 length bytes
pub const FRAME_HEADER_LEN: usize = 3;

/// Header + checksum, no frame data
pub const MIN_FRAME_LEN: usize = FRAME_HEADER_LEN + 1;

/// Transmit Request fields before the RF data:
/// type(1) + frame id(1) + address(8) + address16(2) + radius(1) + options(1)
pub const TRANSMIT_REQUEST_OVERHEAD: usize = 14;

/// Receive Packet fields before the RF data:
/// type(1) + address(8) + address16(2) + options(1)
pub const RECEIVE_PACKET_OVERHEAD: usize = 12;

/// Transmit Status frame data: type + frame id + address16(2) + retries + delivery + discovery
pub const TRANSMIT_STATUS_LEN: usize = 7;

/// Largest frame data the length field can describe
pub const MAX_FRAME_DATA_LEN: usize = u16::MAX as usize;

/// Largest frame data a radio delivers; longer length fields mean a corrupt header
pub const MAX_RECEIVED_FRAME_DATA_LEN: usize = 512;

/// One API frame with its type split off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFrame {
    /// Frame type
    pub frame_type: u8,

    /// Frame data after the type byte
    pub data: Vec<u8>,
}

impl ApiFrame {
    /// Create a new API frame
    ///
    /// # Errors
    ///
    /// Returns `Xbee` error if type + data would overflow the length field
    pub fn new(frame_type: u8, data: Vec<u8>) -> Result<Self> {
        if data.len() + 1 > MAX_FRAME_DATA_LEN {
            return Err(BaseStationError::Xbee(format!(
                "Frame data size {} exceeds maximum {}",
                data.len() + 1,
                MAX_FRAME_DATA_LEN
            )));
        }
        Ok(Self { frame_type, data })
    }

    /// Value of the length field (type + data)
    pub fn length(&self) -> u16 {
        (1 + self.data.len()) as u16
    }
}

/// RF data received from a remote radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePacket {
    /// 64-bit address of the sender
    pub source: u64,

    /// 16-bit network address of the sender
    pub source_16: u16,

    /// Receive options bit field
    pub options: u8,

    /// RF data
    pub data: Vec<u8>,
}

/// Delivery report for a transmit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitStatus {
    pub frame_id: u8,
    pub retry_count: u8,
    /// 0x00 on success
    pub delivery_status: u8,
    pub discovery_status: u8,
}

impl TransmitStatus {
    pub fn delivered(&self) -> bool {
        self.delivery_status == 0
    }
}
