//! # Protocol Module
//!
//! Wire formats spoken between the base station and the rover.
//!
//! This module handles:
//! - The fixed 10-byte bit-packed controller frame, plus quit and heartbeat frames
//! - The extensible 15-byte header + JSON message framing
//! - A registry of payload decoders keyed by message type tag

pub mod constants;
pub mod legacy;
pub mod message;
