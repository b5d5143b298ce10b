//! # XBee API Frame Codec
//!
//! Builds Transmit Request frames and reassembles received frames from the
//! serial byte stream.

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use super::api::*;
use super::checksum::{checksum, verify};
use crate::error::{BaseStationError, Result};

/// Encode RF data into a Transmit Request frame
///
/// # Arguments
///
/// * `frame_id` - Non-zero to request a Transmit Status, 0 for none
/// * `destination` - 64-bit address of the remote radio
/// * `rf_data` - Bytes to deliver
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Complete frame, delimiter through checksum
///
/// # Errors
///
/// Returns `Xbee` error if the frame would not fit the length field
///
/// # Examples
///
/// ```
/// use rover_basestation::xbee::frame::encode_transmit_request;
///
/// let frame = encode_transmit_request(0, 0x0013A200423A7DDD, &[0xFE])?;
/// assert_eq!(frame[0], 0x7E);
/// assert_eq!(frame.len(), 3 + 14 + 1 + 1);
/// # Ok::<(), rover_basestation::error::BaseStationError>(())
/// ```
pub fn encode_transmit_request(frame_id: u8, destination: u64, rf_data: &[u8]) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(TRANSMIT_REQUEST_OVERHEAD - 1 + rf_data.len());
    data.put_u8(frame_id);
    data.put_u64(destination);
    data.put_u16(ADDRESS_16_UNKNOWN);
    data.put_u8(0x00); // broadcast radius: network maximum
    data.put_u8(0x00); // transmit options
    data.put_slice(rf_data);

    let frame = ApiFrame::new(FRAME_TYPE_TRANSMIT_REQUEST, data)?;
    Ok(encode_frame(&frame))
}

/// Wrap an API frame with delimiter, length and checksum
pub fn encode_frame(frame: &ApiFrame) -> Vec<u8> {
    let mut frame_data = Vec::with_capacity(1 + frame.data.len());
    frame_data.push(frame.frame_type);
    frame_data.extend_from_slice(&frame.data);

    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + frame_data.len() + 1);
    out.put_u8(START_DELIMITER);
    out.put_u16(frame.length());
    out.put_slice(&frame_data);
    out.put_u8(checksum(&frame_data));
    out
}

/// Decode one complete API frame
///
/// # Errors
///
/// Returns `Xbee` error if:
/// - Frame is too short
/// - Start delimiter is wrong
/// - Length field disagrees with the frame size
/// - Checksum does not match
pub fn decode_frame(frame: &[u8]) -> Result<ApiFrame> {
    if frame.len() < MIN_FRAME_LEN + 1 {
        return Err(BaseStationError::Xbee("Frame too short".to_string()));
    }

    if frame[0] != START_DELIMITER {
        return Err(BaseStationError::Xbee(format!(
            "Invalid start delimiter: 0x{:02X}",
            frame[0]
        )));
    }

    let length = u16::from_be_bytes([frame[1], frame[2]]) as usize;
    if frame.len() != FRAME_HEADER_LEN + length + 1 {
        return Err(BaseStationError::Xbee(format!(
            "Length mismatch: header says {} bytes of frame data, frame has {}",
            length,
            frame.len().saturating_sub(MIN_FRAME_LEN)
        )));
    }

    let frame_data = &frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + length];
    let received = frame[FRAME_HEADER_LEN + length];
    if !verify(frame_data, received) {
        return Err(BaseStationError::Xbee(format!(
            "Checksum mismatch: expected 0x{:02X}, got 0x{:02X}",
            checksum(frame_data),
            received
        )));
    }

    ApiFrame::new(frame_data[0], frame_data[1..].to_vec())
}

/// Extract the sender and RF data of a Receive Packet frame
///
/// # Errors
///
/// Returns `Xbee` error if the frame is not a Receive Packet or is truncated
pub fn parse_receive_packet(frame: &ApiFrame) -> Result<ReceivePacket> {
    if frame.frame_type != FRAME_TYPE_RECEIVE_PACKET {
        return Err(BaseStationError::Xbee(format!(
            "Not a receive packet: frame type 0x{:02X}",
            frame.frame_type
        )));
    }

    if frame.data.len() < RECEIVE_PACKET_OVERHEAD - 1 {
        return Err(BaseStationError::Xbee(format!(
            "Receive packet too short: {} bytes",
            frame.data.len()
        )));
    }

    let mut buf = &frame.data[..];
    let source = buf.get_u64();
    let source_16 = buf.get_u16();
    let options = buf.get_u8();

    Ok(ReceivePacket {
        source,
        source_16,
        options,
        data: buf.to_vec(),
    })
}

/// Parse a Transmit Status frame
///
/// # Errors
///
/// Returns `Xbee` error if the frame is not a Transmit Status or is truncated
pub fn parse_transmit_status(frame: &ApiFrame) -> Result<TransmitStatus> {
    if frame.frame_type != FRAME_TYPE_TRANSMIT_STATUS || frame.data.len() < TRANSMIT_STATUS_LEN - 1 {
        return Err(BaseStationError::Xbee(format!(
            "Invalid transmit status frame (type 0x{:02X}, {} bytes)",
            frame.frame_type,
            frame.data.len()
        )));
    }

    let d = &frame.data;
    Ok(TransmitStatus {
        frame_id: d[0],
        retry_count: d[3],
        delivery_status: d[4],
        discovery_status: d[5],
    })
}

/// Splits a serial byte stream into API frames
///
/// Bytes before a start delimiter are discarded. A frame that fails its
/// checksum is dropped and reported; scanning resumes after its delimiter.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: BytesMut,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the port
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes held waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, if one is buffered
    ///
    /// # Returns
    ///
    /// * `None` - Not enough data yet
    /// * `Some(Ok(frame))` - A valid frame
    /// * `Some(Err(_))` - A corrupt frame was dropped
    pub fn next_frame(&mut self) -> Option<Result<ApiFrame>> {
        match self.buffer.iter().position(|&b| b == START_DELIMITER) {
            Some(0) => {}
            Some(skip) => {
                debug!("Discarding {} bytes before start delimiter", skip);
                self.buffer.advance(skip);
            }
            None => {
                self.buffer.clear();
                return None;
            }
        }

        if self.buffer.len() < FRAME_HEADER_LEN {
            return None;
        }

        let length = u16::from_be_bytes([self.buffer[1], self.buffer[2]]) as usize;
        let total = FRAME_HEADER_LEN + length + 1;
        if length == 0 || length > MAX_RECEIVED_FRAME_DATA_LEN {
            self.buffer.advance(1);
            return Some(Err(BaseStationError::Xbee(format!(
                "Implausible frame length {}",
                length
            ))));
        }
        if self.buffer.len() < total {
            return None;
        }

        let result = decode_frame(&self.buffer[..total]);
        if result.is_ok() {
            self.buffer.advance(total);
        } else {
            // resync on the next delimiter
            self.buffer.advance(1);
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMOTE: u64 = 0x0013_A200_423A_7DDD;

    fn receive_packet_frame(rf_data: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.put_u64(REMOTE);
        data.put_u16(0x1234);
        data.put_u8(0x01);
        data.put_slice(rf_data);
        encode_frame(&ApiFrame::new(FRAME_TYPE_RECEIVE_PACKET, data).unwrap())
    }

    #[test]
    fn test_transmit_request_layout() {
        let frame = encode_transmit_request(0x01, REMOTE, &[0xDE, 0x64]).unwrap();

        assert_eq!(frame[0], START_DELIMITER);
        assert_eq!(u16::from_be_bytes([frame[1], frame[2]]), 16);
        assert_eq!(frame[3], FRAME_TYPE_TRANSMIT_REQUEST);
        assert_eq!(frame[4], 0x01);
        assert_eq!(&frame[5..13], &REMOTE.to_be_bytes());
        assert_eq!(&frame[13..15], &[0xFF, 0xFE]);
        assert_eq!(frame[15], 0x00);
        assert_eq!(frame[16], 0x00);
        assert_eq!(&frame[17..19], &[0xDE, 0x64]);
        assert!(verify(&frame[3..19], frame[19]));
        assert_eq!(frame.len(), 20);
    }

    #[test]
    fn test_decode_transmit_request() {
        let bytes = encode_transmit_request(0, REMOTE, &[0xAA, 0x01, 0x02]).unwrap();
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!(frame.frame_type, FRAME_TYPE_TRANSMIT_REQUEST);
        assert_eq!(&frame.data[13..], &[0xAA, 0x01, 0x02]);
    }

    #[test]
    fn test_decode_bad_checksum() {
        let mut bytes = encode_transmit_request(0, REMOTE, &[0xFE]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(decode_frame(&bytes).is_err());
    }

    #[test]
    fn test_decode_bad_delimiter() {
        let mut bytes = encode_transmit_request(0, REMOTE, &[0xFE]).unwrap();
        bytes[0] = 0x7D;
        assert!(decode_frame(&bytes).is_err());
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut bytes = encode_transmit_request(0, REMOTE, &[0xFE]).unwrap();
        bytes.push(0x00);
        assert!(decode_frame(&bytes).is_err());
        assert!(decode_frame(&[0x7E, 0x00]).is_err());
    }

    #[test]
    fn test_parse_receive_packet() {
        let bytes = receive_packet_frame(b"hello");
        let frame = decode_frame(&bytes).unwrap();
        let packet = parse_receive_packet(&frame).unwrap();

        assert_eq!(packet.source, REMOTE);
        assert_eq!(packet.source_16, 0x1234);
        assert_eq!(packet.options, 0x01);
        assert_eq!(packet.data, b"hello");
    }

    #[test]
    fn test_parse_receive_packet_wrong_type() {
        let frame = ApiFrame::new(FRAME_TYPE_TRANSMIT_STATUS, vec![0; 6]).unwrap();
        assert!(parse_receive_packet(&frame).is_err());
    }

    #[test]
    fn test_parse_transmit_status() {
        let frame = ApiFrame::new(FRAME_TYPE_TRANSMIT_STATUS, vec![0x05, 0xFF, 0xFE, 0x02, 0x00, 0x00]).unwrap();
        let status = parse_transmit_status(&frame).unwrap();
        assert_eq!(status.frame_id, 5);
        assert_eq!(status.retry_count, 2);
        assert!(status.delivered());
    }

    #[test]
    fn test_reassembler_split_across_reads() {
        let bytes = receive_packet_frame(&[1, 2, 3]);
        let mut reassembler = FrameReassembler::new();

        reassembler.extend(&bytes[..5]);
        assert!(reassembler.next_frame().is_none());

        reassembler.extend(&bytes[5..]);
        let frame = reassembler.next_frame().unwrap().unwrap();
        assert_eq!(parse_receive_packet(&frame).unwrap().data, vec![1, 2, 3]);
        assert!(reassembler.next_frame().is_none());
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn test_reassembler_skips_leading_noise() {
        let mut reassembler = FrameReassembler::new();
        reassembler.extend(&[0x00, 0x11, 0x22]);
        reassembler.extend(&receive_packet_frame(&[9]));

        let frame = reassembler.next_frame().unwrap().unwrap();
        assert_eq!(frame.frame_type, FRAME_TYPE_RECEIVE_PACKET);
    }

    #[test]
    fn test_reassembler_back_to_back_frames() {
        let mut reassembler = FrameReassembler::new();
        let mut stream = receive_packet_frame(&[1]);
        stream.extend(receive_packet_frame(&[2]));
        reassembler.extend(&stream);

        let first = reassembler.next_frame().unwrap().unwrap();
        let second = reassembler.next_frame().unwrap().unwrap();
        assert_eq!(parse_receive_packet(&first).unwrap().data, vec![1]);
        assert_eq!(parse_receive_packet(&second).unwrap().data, vec![2]);
    }

    #[test]
    fn test_reassembler_oversized_length_does_not_stall() {
        let mut reassembler = FrameReassembler::new();
        reassembler.extend(&[START_DELIMITER, 0xFF, 0xF0, FRAME_TYPE_RECEIVE_PACKET]);
        for i in 0..50u8 {
            reassembler.extend(&receive_packet_frame(&[i]));
        }

        assert!(reassembler.next_frame().unwrap().is_err());

        let mut recovered = Vec::new();
        while let Some(result) = reassembler.next_frame() {
            recovered.push(parse_receive_packet(&result.unwrap()).unwrap().data[0]);
        }
        assert_eq!(recovered, (0..50).collect::<Vec<u8>>());
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn test_reassembler_recovers_after_corrupt_frame() {
        let mut corrupt = receive_packet_frame(&[1]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x01;

        let mut reassembler = FrameReassembler::new();
        reassembler.extend(&corrupt);
        reassembler.extend(&receive_packet_frame(&[2]));

        assert!(reassembler.next_frame().unwrap().is_err());

        // Drain until the good frame surfaces
        let good = loop {
            match reassembler.next_frame() {
                Some(Ok(frame)) => break frame,
                Some(Err(_)) => continue,
                None => panic!("good frame lost"),
            }
        };
        assert_eq!(parse_receive_packet(&good).unwrap().data, vec![2]);
    }

    #[test]
    fn test_reassembler_discards_garbage_without_delimiter() {
        let mut reassembler = FrameReassembler::new();
        reassembler.extend(&[0x01, 0x02, 0x03]);
        assert!(reassembler.next_frame().is_none());
        assert_eq!(reassembler.pending(), 0);
    }
}
