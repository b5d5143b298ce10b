//! # Comms Module
//!
//! Everything between the controller state and the link.
//!
//! This module handles:
//! - Choosing the wire format for controller data
//! - Duplicate suppression of unchanged controller frames
//! - Heartbeat cadence
//! - Decoding inbound frames on a background task

pub mod heartbeat;
pub mod manager;
pub mod receiver;
pub mod strategy;

pub use heartbeat::HeartbeatManager;
pub use manager::CommunicationManager;
pub use strategy::{encoder_for, EncodedFrame, ExtensibleEncoder, FrameEncoder, LegacyEncoder};
