//! # Controller State
//!
//! The latest value of every input on both controllers.
//!
//! State is fully populated at construction (sticks neutral, buttons and
//! triggers OFF) and is only ever overwritten. It is owned by the control loop
//! and mutated only by the input processor; everyone else reads a snapshot.

use std::collections::BTreeMap;

use super::profile::{AuxButton, ButtonState, ControllerProfile, PrimaryAxis, PrimaryButton, Trigger};
use crate::protocol::constants::{auxiliary, AXIS_NEUTRAL};

/// Flat view of one controller keyed by legacy index.
///
/// Primary: axes and triggers by raw axis index, buttons by raw index + 6.
/// Auxiliary: buttons by raw index.
pub type ControllerValues = BTreeMap<u8, u8>;

/// Xbox controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryState {
    axes: [u8; 4],
    triggers: [ButtonState; 2],
    buttons: [ButtonState; PrimaryButton::COUNT],
}

impl Default for PrimaryState {
    fn default() -> Self {
        Self {
            axes: [AXIS_NEUTRAL; 4],
            triggers: [ButtonState::Off; 2],
            buttons: [ButtonState::Off; PrimaryButton::COUNT],
        }
    }
}

impl PrimaryState {
    #[must_use]
    pub fn axis(&self, axis: PrimaryAxis) -> u8 {
        self.axes[axis.slot()]
    }

    pub fn set_axis(&mut self, axis: PrimaryAxis, value: u8) {
        self.axes[axis.slot()] = value;
    }

    #[must_use]
    pub fn trigger(&self, trigger: Trigger) -> ButtonState {
        self.triggers[trigger.slot()]
    }

    pub fn set_trigger(&mut self, trigger: Trigger, state: ButtonState) {
        self.triggers[trigger.slot()] = state;
    }

    #[must_use]
    pub fn button(&self, button: PrimaryButton) -> ButtonState {
        self.buttons[button.slot()]
    }

    pub fn set_button(&mut self, button: PrimaryButton, state: ButtonState) {
        self.buttons[button.slot()] = state;
    }

    /// Snapshot in the legacy flat keying.
    #[must_use]
    pub fn values(&self) -> ControllerValues {
        let mut values = ControllerValues::new();
        for axis in PrimaryAxis::ALL {
            values.insert(axis.raw(), self.axis(axis));
        }
        for trigger in Trigger::ALL {
            values.insert(trigger.raw(), self.trigger(trigger).as_u8());
        }
        for button in PrimaryButton::ALL {
            values.insert(button.legacy_key(), self.button(button).as_u8());
        }
        values
    }
}

/// N64 controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryState {
    axes: [u8; auxiliary::NUM_AXES],
    buttons: [ButtonState; AuxButton::COUNT],
}

impl Default for AuxiliaryState {
    fn default() -> Self {
        Self {
            axes: [AXIS_NEUTRAL; auxiliary::NUM_AXES],
            buttons: [ButtonState::Off; AuxButton::COUNT],
        }
    }
}

impl AuxiliaryState {
    /// Auxiliary axes are never driven; they stay neutral.
    #[must_use]
    pub fn axis(&self, index: usize) -> Option<u8> {
        self.axes.get(index).copied()
    }

    #[must_use]
    pub fn button(&self, button: AuxButton) -> ButtonState {
        self.buttons[button.slot()]
    }

    pub fn set_button(&mut self, button: AuxButton, state: ButtonState) {
        self.buttons[button.slot()] = state;
    }

    #[must_use]
    pub fn values(&self) -> ControllerValues {
        AuxButton::ALL
            .into_iter()
            .map(|button| (button.raw(), self.button(button).as_u8()))
            .collect()
    }
}

/// State of both controllers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub primary: PrimaryState,
    pub auxiliary: AuxiliaryState,
}

impl ControllerState {
    /// Create a state with every axis neutral and every button OFF
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Owned snapshot of one controller in the legacy flat keying
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_basestation::controller::profile::ControllerProfile;
    /// use rover_basestation::controller::state::ControllerState;
    ///
    /// let state = ControllerState::new();
    /// let xbox = state.values(ControllerProfile::Primary);
    /// assert_eq!(xbox[&1], 100); // LY neutral
    /// assert_eq!(xbox[&6], 1);   // A released
    /// ```
    #[must_use]
    pub fn values(&self, profile: ControllerProfile) -> ControllerValues {
        match profile {
            ControllerProfile::Primary => self.primary.values(),
            ControllerProfile::Auxiliary => self.auxiliary.values(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_neutral() {
        let state = ControllerState::new();

        for axis in PrimaryAxis::ALL {
            assert_eq!(state.primary.axis(axis), AXIS_NEUTRAL);
        }
        for trigger in Trigger::ALL {
            assert_eq!(state.primary.trigger(trigger), ButtonState::Off);
        }
        for button in PrimaryButton::ALL {
            assert_eq!(state.primary.button(button), ButtonState::Off);
        }
        for button in AuxButton::ALL {
            assert_eq!(state.auxiliary.button(button), ButtonState::Off);
        }
        assert_eq!(state.auxiliary.axis(0), Some(AXIS_NEUTRAL));
        assert_eq!(state.auxiliary.axis(2), None);
    }

    #[test]
    fn test_primary_values_keying() {
        let mut state = ControllerState::new();
        state.primary.set_axis(PrimaryAxis::LeftY, 150);
        state.primary.set_axis(PrimaryAxis::RightX, 10);
        state.primary.set_trigger(Trigger::Right, ButtonState::On);
        state.primary.set_button(PrimaryButton::B, ButtonState::On);

        let values = state.values(ControllerProfile::Primary);
        assert_eq!(values.len(), 4 + 2 + 11);
        assert_eq!(values[&1], 150);
        assert_eq!(values[&5], 10);
        assert_eq!(values[&3], 2);
        assert_eq!(values[&2], 1);
        assert_eq!(values[&7], 2); // B = 1 + 6
        assert_eq!(values[&16], 1); // RIGHT_STICK = 10 + 6
    }

    #[test]
    fn test_auxiliary_values_keying() {
        let mut state = ControllerState::new();
        state.auxiliary.set_button(AuxButton::Z, ButtonState::On);
        state.auxiliary.set_button(AuxButton::DpLeft, ButtonState::On);

        let values = state.values(ControllerProfile::Auxiliary);
        assert_eq!(values.len(), 14);
        assert_eq!(values[&6], 2);
        assert_eq!(values[&22], 2);
        assert_eq!(values[&0], 1);
        assert!(!values.contains_key(&7));
    }

    #[test]
    fn test_values_is_a_snapshot() {
        let mut state = ControllerState::new();
        let before = state.values(ControllerProfile::Primary);
        state.primary.set_axis(PrimaryAxis::LeftX, 0);

        assert_eq!(before[&0], AXIS_NEUTRAL);
        assert_eq!(state.values(ControllerProfile::Primary)[&0], 0);
    }

    #[test]
    fn test_overwrite_keeps_last_value() {
        let mut state = ControllerState::new();
        state.primary.set_button(PrimaryButton::Home, ButtonState::On);
        state.primary.set_button(PrimaryButton::Home, ButtonState::Off);
        assert_eq!(state.primary.button(PrimaryButton::Home), ButtonState::Off);
    }
}
