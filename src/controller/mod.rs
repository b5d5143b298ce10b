//! # Controller Module
//!
//! Two-controller (Xbox drive + N64 auxiliary) input handling.
//!
//! This module handles:
//! - Controller profiles and their closed sets of axes and buttons
//! - The shared controller state and drive mode flags
//! - Deadband, scaling and mode-aware conversion of input events
//! - Hotplug bookkeeping of connected devices
//! - Reading physical gamepads via evdev

pub mod gamepad;
pub mod input;
pub mod manager;
pub mod profile;
pub mod state;
