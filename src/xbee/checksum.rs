//! # XBee API Checksum
//!
//! `0xFF - (sum of frame data bytes & 0xFF)`, computed over everything between
//! the length field and the checksum. A frame is valid when the frame data plus
//! checksum sums to 0xFF.

/// Calculate the checksum of API frame data
///
/// # Arguments
///
/// * `frame_data` - Frame type and fields (no delimiter, length or checksum)
///
/// # Returns
///
/// * `u8` - Checksum byte
///
/// # Examples
///
/// ```
/// use rover_basestation::xbee::checksum::checksum;
///
/// // AT command "NJ" (frame type 0x08, frame id 0x01)
/// assert_eq!(checksum(&[0x08, 0x01, 0x4E, 0x4A]), 0x5E);
/// ```
pub fn checksum(frame_data: &[u8]) -> u8 {
    let sum = frame_data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    0xFF - sum
}

/// Check frame data against a received checksum
pub fn verify(frame_data: &[u8], received: u8) -> bool {
    frame_data
        .iter()
        .fold(received, |acc, &b| acc.wrapping_add(b))
        == 0xFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum(&[]), 0xFF);
    }

    #[test]
    fn test_checksum_known_frame() {
        assert_eq!(checksum(&[0x08, 0x01, 0x4E, 0x4A]), 0x5E);
    }

    #[test]
    fn test_checksum_wraps() {
        // 0xFF + 0x02 = 0x101, low byte 0x01
        assert_eq!(checksum(&[0xFF, 0x02]), 0xFE);
    }

    #[test]
    fn test_verify() {
        let data = [0x10, 0x01, 0x00, 0x13, 0xA2, 0x00];
        let sum = checksum(&data);
        assert!(verify(&data, sum));
        assert!(!verify(&data, sum.wrapping_add(1)));
    }
}
