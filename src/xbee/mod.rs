//! # XBee API Module
//!
//! Framing for XBee radios in API mode.
//!
//! This module handles:
//! - Transmit Request (0x10) frames addressed to the rover's 64-bit address
//! - Receive Packet (0x90) and Transmit Status (0x8B) parsing
//! - Frame checksum calculation
//! - Reassembly of frames from a serial byte stream

pub mod api;
pub mod checksum;
pub mod frame;
