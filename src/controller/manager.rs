//! # Controller Manager
//!
//! Owns the controller state, the drive mode flags and the map from connected
//! device ids to controller profiles.
//!
//! ## Hotplug
//!
//! A device is mapped when it is added and its name matches one of the
//! configured patterns. Events from unmapped devices are ignored. Losing a
//! mapped device ends the session: the rover must not keep driving on the last
//! state it was sent.
//!
//! ## Drive Modes
//!
//! | Held | D-pad | Effect |
//! |------|-------|--------|
//! | SELECT | UP | reverse on |
//! | SELECT | DOWN | reverse off |
//! | START | UP | creep on |
//! | START | DOWN | creep off |

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::input::{DeviceId, InputSignal, QuitReason};
use super::profile::{AuxButton, ControllerProfile, PrimaryButton};
use super::state::{ControllerState, ControllerValues};
use crate::config::InputConfig;
use crate::protocol::constants::hat;

/// Drive mode flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveModes {
    /// Reduced stick sensitivity
    pub creep: bool,
    /// Sticks negated and drive axes swapped
    pub reverse: bool,
}

/// Controller state plus device bookkeeping
#[derive(Debug)]
pub struct ControllerManager {
    devices: HashMap<DeviceId, ControllerProfile>,
    state: ControllerState,
    modes: DriveModes,
    primary_names: Vec<String>,
    auxiliary_names: Vec<String>,
}

impl Default for ControllerManager {
    fn default() -> Self {
        Self::new(&InputConfig::default())
    }
}

impl ControllerManager {
    /// Create a manager with a neutral state and no devices
    ///
    /// # Arguments
    ///
    /// * `config` - Input configuration supplying the device name patterns
    pub fn new(config: &InputConfig) -> Self {
        Self {
            devices: HashMap::new(),
            state: ControllerState::new(),
            modes: DriveModes::default(),
            primary_names: config.primary_names.clone(),
            auxiliary_names: config.auxiliary_names.clone(),
        }
    }

    /// Profile for a device name, `None` if it matches no pattern
    pub fn profile_for_name(&self, name: &str) -> Option<ControllerProfile> {
        ControllerProfile::from_device_name(name, &self.primary_names, &self.auxiliary_names)
    }

    /// Handle a device-added event
    ///
    /// Returns the profile the device was mapped to, if any.
    pub fn device_added(&mut self, device: DeviceId, name: &str) -> Option<ControllerProfile> {
        match self.profile_for_name(name) {
            Some(profile) => {
                if let Some(previous) = self.devices.insert(device, profile) {
                    debug!("Device {} remapped from {} to {}", device, previous, profile);
                }
                info!("{} controller connected: {} (device {})", profile, name, device);
                Some(profile)
            }
            None => {
                debug!("Ignoring unsupported input device: {} (device {})", name, device);
                None
            }
        }
    }

    /// Handle a device-removed event
    ///
    /// Removing a mapped device asks the control loop to quit. Removing a
    /// device that was never mapped does nothing.
    pub fn device_removed(&mut self, device: DeviceId) -> InputSignal {
        match self.devices.remove(&device) {
            Some(profile) => {
                warn!("{} controller disconnected (device {})", profile, device);
                InputSignal::Quit(QuitReason::DeviceRemoved(profile))
            }
            None => InputSignal::Continue,
        }
    }

    #[must_use]
    pub fn profile_of(&self, device: DeviceId) -> Option<ControllerProfile> {
        self.devices.get(&device).copied()
    }

    /// Whether a controller with this profile is connected
    #[must_use]
    pub fn is_connected(&self, profile: ControllerProfile) -> bool {
        self.devices.values().any(|p| *p == profile)
    }

    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut ControllerState {
        &mut self.state
    }

    #[must_use]
    pub fn modes(&self) -> DriveModes {
        self.modes
    }

    /// Snapshot of one controller in the legacy flat keying
    #[must_use]
    pub fn controller_values(&self, profile: ControllerProfile) -> ControllerValues {
        self.state.values(profile)
    }

    /// Whether pressing this button ends the session
    #[must_use]
    pub fn is_quit_button(profile: ControllerProfile, button: u8) -> bool {
        match profile {
            ControllerProfile::Primary => button == PrimaryButton::Home.raw(),
            ControllerProfile::Auxiliary => button == AuxButton::Start.raw(),
        }
    }

    /// Apply a primary D-pad transition to the mode flags
    ///
    /// Only UP and DOWN with SELECT or START held change anything. Modes are
    /// set or cleared, never flipped, so repeating a combination is harmless.
    pub fn update_mode_flags(&mut self, direction: (i8, i8)) {
        let select = self.state.primary.button(PrimaryButton::Select).is_on();
        let start = self.state.primary.button(PrimaryButton::Start).is_on();

        let enable = match direction {
            hat::UP => true,
            hat::DOWN => false,
            _ => return,
        };

        if select && self.modes.reverse != enable {
            self.modes.reverse = enable;
            info!("Reverse mode {}", if enable { "enabled" } else { "disabled" });
        }
        if start && self.modes.creep != enable {
            self.modes.creep = enable;
            info!("Creep mode {}", if enable { "enabled" } else { "disabled" });
        }
    }
}
