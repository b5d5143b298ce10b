//! # Rover Base Station Library
//!
//! Drive a rover with an Xbox controller and an N64-style auxiliary pad over
//! an XBee radio link.
//!
//! This library samples gamepad input, keeps a compact controller state and
//! sends it to the rover at a fixed cadence, either as a bit-packed 10-byte
//! frame or as a header + JSON message, alongside periodic heartbeats.

pub mod comms;
pub mod config;
pub mod controller;
pub mod error;
pub mod link;
pub mod protocol;
pub mod station;
pub mod telemetry;
pub mod xbee;
