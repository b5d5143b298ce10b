//! # Input Processor
//!
//! Turns input events into controller state updates.
//!
//! ## Stick Transform
//!
//! ```text
//! raw in [-1, 1] -> deadband -> * multiplier + 100 -> floor -> clamp [0, 200]
//! ```
//!
//! The multiplier is 100 normally and 20 in creep mode, negated in reverse
//! mode. Triggers are reduced to pressed / released. Auxiliary axes are ignored.

use tracing::{debug, info};

use super::manager::ControllerManager;
use super::profile::{AuxButton, ButtonState, ControllerProfile, PrimaryAxisInput, PrimaryButton};
use crate::config::InputConfig;
use crate::protocol::constants::{AXIS_MAX, AXIS_MIN, AXIS_NEUTRAL};

/// Identifier of a connected input device, stable for its lifetime
pub type DeviceId = u32;

/// What happened on a device
#[derive(Debug, Clone, PartialEq)]
pub enum InputEventKind {
    /// Normalized axis value in [-1, 1]
    AxisMotion { axis: u8, value: f32 },
    ButtonDown { button: u8 },
    ButtonUp { button: u8 },
    /// Hat position, up is positive y
    HatMotion { x: i8, y: i8 },
    DeviceAdded { name: String },
    DeviceRemoved,
}

/// One event from one device
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub device: DeviceId,
    pub kind: InputEventKind,
}

impl InputEvent {
    pub fn new(device: DeviceId, kind: InputEventKind) -> Self {
        Self { device, kind }
    }
}

/// Why the session should end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    /// HOME on the primary or START on the auxiliary controller
    QuitButton(ControllerProfile),
    /// A mapped controller was unplugged
    DeviceRemoved(ControllerProfile),
    /// Ctrl+C or the input source went away
    Interrupted,
}

impl std::fmt::Display for QuitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuitReason::QuitButton(profile) => write!(f, "quit button on {} controller", profile),
            QuitReason::DeviceRemoved(profile) => write!(f, "{} controller disconnected", profile),
            QuitReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Outcome of processing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum InputSignal {
    Continue,
    Quit(QuitReason),
}

/// Applies input events to the managed controller state
#[derive(Debug, Clone)]
pub struct InputProcessor {
    deadband: f32,
    normal_multiplier: i32,
    creep_multiplier: i32,
}

impl Default for InputProcessor {
    fn default() -> Self {
        Self::new(&InputConfig::default())
    }
}

impl InputProcessor {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            deadband: config.deadband,
            normal_multiplier: config.normal_multiplier,
            creep_multiplier: config.creep_multiplier,
        }
    }

    /// Process one event
    ///
    /// # Arguments
    ///
    /// * `manager` - Owner of the state, modes and device map
    /// * `event` - Event to apply
    ///
    /// # Returns
    ///
    /// * `InputSignal::Quit` - A quit button was pressed or a mapped device was removed
    /// * `InputSignal::Continue` - Otherwise, including events from unmapped devices
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_basestation::controller::input::{InputEvent, InputEventKind, InputProcessor, InputSignal};
    /// use rover_basestation::controller::manager::ControllerManager;
    /// use rover_basestation::controller::profile::{ControllerProfile, PrimaryAxis};
    ///
    /// let mut manager = ControllerManager::default();
    /// let processor = InputProcessor::default();
    ///
    /// let added = InputEvent::new(0, InputEventKind::DeviceAdded { name: "Xbox Controller".into() });
    /// assert_eq!(processor.process(&mut manager, &added), InputSignal::Continue);
    ///
    /// let stick = InputEvent::new(0, InputEventKind::AxisMotion { axis: 1, value: 0.5 });
    /// let _ = processor.process(&mut manager, &stick);
    /// assert_eq!(manager.state().primary.axis(PrimaryAxis::LeftY), 150);
    /// ```
    pub fn process(&self, manager: &mut ControllerManager, event: &InputEvent) -> InputSignal {
        let profile = match &event.kind {
            InputEventKind::DeviceAdded { name } => {
                manager.device_added(event.device, name);
                return InputSignal::Continue;
            }
            InputEventKind::DeviceRemoved => return manager.device_removed(event.device),
            _ => match manager.profile_of(event.device) {
                Some(profile) => profile,
                None => return InputSignal::Continue,
            },
        };

        match (&event.kind, profile) {
            (InputEventKind::AxisMotion { axis, value }, ControllerProfile::Primary) => {
                self.process_primary_axis(manager, *axis, *value);
                InputSignal::Continue
            }
            (InputEventKind::AxisMotion { .. }, ControllerProfile::Auxiliary) => InputSignal::Continue,
            (InputEventKind::ButtonDown { button }, _) => {
                Self::process_button(manager, profile, *button, true)
            }
            (InputEventKind::ButtonUp { button }, _) => {
                Self::process_button(manager, profile, *button, false)
            }
            (InputEventKind::HatMotion { x, y }, ControllerProfile::Primary) => {
                manager.update_mode_flags((*x, *y));
                InputSignal::Continue
            }
            (InputEventKind::HatMotion { x, y }, ControllerProfile::Auxiliary) => {
                Self::process_aux_hat(manager, *x, *y);
                InputSignal::Continue
            }
            (InputEventKind::DeviceAdded { .. } | InputEventKind::DeviceRemoved, _) => {
                InputSignal::Continue
            }
        }
    }

    fn process_primary_axis(&self, manager: &mut ControllerManager, axis: u8, value: f32) {
        let Some(input) = PrimaryAxisInput::from_raw(axis) else {
            debug!("Ignoring unknown primary axis {}", axis);
            return;
        };

        match input {
            PrimaryAxisInput::Stick(stick) => {
                let multiplier = self.axis_multiplier(manager.modes().creep, manager.modes().reverse);
                let byte = self.convert_axis(value, multiplier);
                manager.state_mut().primary.set_axis(stick, byte);
            }
            PrimaryAxisInput::Trigger(trigger) => {
                manager
                    .state_mut()
                    .primary
                    .set_trigger(trigger, ButtonState::from_pressed(value > 0.0));
            }
        }
    }

    fn process_button(
        manager: &mut ControllerManager,
        profile: ControllerProfile,
        button: u8,
        pressed: bool,
    ) -> InputSignal {
        let state = ButtonState::from_pressed(pressed);
        match profile {
            ControllerProfile::Primary => match PrimaryButton::from_raw(button) {
                Some(b) => manager.state_mut().primary.set_button(b, state),
                None => debug!("Ignoring unknown primary button {}", button),
            },
            ControllerProfile::Auxiliary => match AuxButton::from_raw(button) {
                Some(b) => manager.state_mut().auxiliary.set_button(b, state),
                None => debug!("Ignoring unknown auxiliary button {}", button),
            },
        }

        if pressed && ControllerManager::is_quit_button(profile, button) {
            info!("Quit requested from {} controller", profile);
            return InputSignal::Quit(QuitReason::QuitButton(profile));
        }
        InputSignal::Continue
    }

    fn process_aux_hat(manager: &mut ControllerManager, x: i8, y: i8) {
        let aux = &mut manager.state_mut().auxiliary;
        aux.set_button(AuxButton::DpLeft, ButtonState::from_pressed(x < 0));
        aux.set_button(AuxButton::DpRight, ButtonState::from_pressed(x > 0));
        aux.set_button(AuxButton::DpDown, ButtonState::from_pressed(y < 0));
        aux.set_button(AuxButton::DpUp, ButtonState::from_pressed(y > 0));
    }

    /// Stick multiplier for the given modes: creep picks the slow scale,
    /// reverse negates it.
    #[must_use]
    pub fn axis_multiplier(&self, creep: bool, reverse: bool) -> i32 {
        let base = if creep {
            self.creep_multiplier
        } else {
            self.normal_multiplier
        };
        if reverse {
            -base
        } else {
            base
        }
    }

    /// Zero out values strictly inside the deadband
    #[must_use]
    pub fn apply_deadband(&self, raw: f32) -> f32 {
        if !raw.is_finite() || raw.abs() < self.deadband {
            0.0
        } else {
            raw
        }
    }

    /// Deadband, scale around neutral, floor and clamp to the axis byte range
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_basestation::controller::input::InputProcessor;
    ///
    /// let processor = InputProcessor::default();
    /// assert_eq!(processor.convert_axis(0.5, 100), 150);
    /// assert_eq!(processor.convert_axis(0.05, 100), 100);
    /// assert_eq!(processor.convert_axis(1.5, 100), 200);
    /// assert_eq!(processor.convert_axis(-1.5, 100), 0);
    /// ```
    #[must_use]
    pub fn convert_axis(&self, raw: f32, multiplier: i32) -> u8 {
        let value = f64::from(self.apply_deadband(raw));
        let scaled = (f64::from(multiplier) * value + f64::from(AXIS_NEUTRAL)).floor();
        scaled.clamp(f64::from(AXIS_MIN), f64::from(AXIS_MAX)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::profile::{PrimaryAxis, Trigger};
    use crate::protocol::constants::hat;

    const XBOX: DeviceId = 1;
    const N64: DeviceId = 2;

    fn setup() -> (InputProcessor, ControllerManager) {
        let mut manager = ControllerManager::default();
        manager.device_added(XBOX, "Xbox Wireless Controller");
        manager.device_added(N64, "Generic DInput Device");
        (InputProcessor::default(), manager)
    }

    fn axis(device: DeviceId, axis: u8, value: f32) -> InputEvent {
        InputEvent::new(device, InputEventKind::AxisMotion { axis, value })
    }

    fn button(device: DeviceId, button: u8, pressed: bool) -> InputEvent {
        let kind = if pressed {
            InputEventKind::ButtonDown { button }
        } else {
            InputEventKind::ButtonUp { button }
        };
        InputEvent::new(device, kind)
    }

    fn hat_event(device: DeviceId, (x, y): (i8, i8)) -> InputEvent {
        InputEvent::new(device, InputEventKind::HatMotion { x, y })
    }

    #[test]
    fn test_axis_half_deflection() {
        let (processor, mut manager) = setup();
        let _ = processor.process(&mut manager, &axis(XBOX, 1, 0.5));
        assert_eq!(manager.state().primary.axis(PrimaryAxis::LeftY), 150);
        assert_eq!(manager.state().primary.axis(PrimaryAxis::LeftY), 0x96);
    }

    #[test]
    fn test_deadband_is_idempotent() {
        let processor = InputProcessor::default();
        let zero = processor.convert_axis(0.0, 100);
        for v in [0.09, -0.09, 0.0999, -0.05, 0.001] {
            assert_eq!(processor.convert_axis(v, 100), zero, "value {}", v);
        }
        assert_ne!(processor.convert_axis(0.1, 100), zero);
    }

    #[test]
    fn test_clamping() {
        let processor = InputProcessor::default();
        assert_eq!(processor.convert_axis(1.5, 100), 200);
        assert_eq!(processor.convert_axis(-1.5, 100), 0);
        assert_eq!(processor.convert_axis(1.0, 100), 200);
        assert_eq!(processor.convert_axis(-1.0, 100), 0);
    }

    #[test]
    fn test_floor_rounds_down() {
        let processor = InputProcessor::default();
        assert_eq!(processor.convert_axis(-0.25, 100), 75);
        assert_eq!(processor.convert_axis(0.255, 20), 105);
        assert_eq!(processor.convert_axis(-0.255, 20), 94);
    }

    #[test]
    fn test_non_finite_reads_neutral() {
        let processor = InputProcessor::default();
        assert_eq!(processor.convert_axis(f32::NAN, 100), 100);
        assert_eq!(processor.convert_axis(f32::INFINITY, 100), 100);
    }

    #[test]
    fn test_axis_multiplier_modes() {
        let processor = InputProcessor::default();
        assert_eq!(processor.axis_multiplier(false, false), 100);
        assert_eq!(processor.axis_multiplier(true, false), 20);
        assert_eq!(processor.axis_multiplier(false, true), -100);
        assert_eq!(processor.axis_multiplier(true, true), -20);
    }

    #[test]
    fn test_creep_and_reverse_applied_to_sticks() {
        let (processor, mut manager) = setup();
        let _ = processor.process(&mut manager, &button(XBOX, 7, true)); // START
        let _ = processor.process(&mut manager, &button(XBOX, 6, true)); // SELECT
        let _ = processor.process(&mut manager, &hat_event(XBOX, hat::UP));
        assert!(manager.modes().creep);
        assert!(manager.modes().reverse);

        let _ = processor.process(&mut manager, &axis(XBOX, 4, 0.5));
        assert_eq!(manager.state().primary.axis(PrimaryAxis::RightY), 90);
    }

    #[test]
    fn test_triggers_are_binary() {
        let (processor, mut manager) = setup();
        let _ = processor.process(&mut manager, &axis(XBOX, 2, 0.01));
        assert_eq!(manager.state().primary.trigger(Trigger::Left), ButtonState::On);

        let _ = processor.process(&mut manager, &axis(XBOX, 2, -1.0));
        assert_eq!(manager.state().primary.trigger(Trigger::Left), ButtonState::Off);

        let _ = processor.process(&mut manager, &axis(XBOX, 3, 0.0));
        assert_eq!(manager.state().primary.trigger(Trigger::Right), ButtonState::Off);

        // triggers never touch the stick bytes
        assert_eq!(manager.state().primary.axis(PrimaryAxis::LeftY), AXIS_NEUTRAL);
    }

    #[test]
    fn test_auxiliary_axes_ignored() {
        let (processor, mut manager) = setup();
        let before = manager.state().clone();
        let _ = processor.process(&mut manager, &axis(N64, 0, 1.0));
        let _ = processor.process(&mut manager, &axis(N64, 1, -1.0));
        assert_eq!(manager.state(), &before);
    }

    #[test]
    fn test_buttons_stored_as_pressed_plus_one() {
        let (processor, mut manager) = setup();
        let _ = processor.process(&mut manager, &button(XBOX, 0, true));
        assert_eq!(manager.state().primary.button(PrimaryButton::A).as_u8(), 2);
        let _ = processor.process(&mut manager, &button(XBOX, 0, false));
        assert_eq!(manager.state().primary.button(PrimaryButton::A).as_u8(), 1);

        let _ = processor.process(&mut manager, &button(N64, 9, true));
        assert_eq!(manager.state().auxiliary.button(AuxButton::CUp), ButtonState::On);
    }

    #[test]
    fn test_quit_buttons_signal() {
        let (processor, mut manager) = setup();
        assert_eq!(
            processor.process(&mut manager, &button(XBOX, 8, true)),
            InputSignal::Quit(QuitReason::QuitButton(ControllerProfile::Primary))
        );
        assert_eq!(
            processor.process(&mut manager, &button(N64, 12, true)),
            InputSignal::Quit(QuitReason::QuitButton(ControllerProfile::Auxiliary))
        );
        assert_eq!(
            processor.process(&mut manager, &button(N64, 12, false)),
            InputSignal::Continue
        );
        // the primary HOME index is C-right on the auxiliary controller
        assert_eq!(
            processor.process(&mut manager, &button(N64, 8, true)),
            InputSignal::Continue
        );
    }

    #[test]
    fn test_modifier_alone_changes_nothing() {
        let (processor, mut manager) = setup();
        let _ = processor.process(&mut manager, &button(XBOX, 6, true));
        let _ = processor.process(&mut manager, &button(XBOX, 7, true));
        assert!(!manager.modes().reverse);
        assert!(!manager.modes().creep);
    }

    #[test]
    fn test_select_up_twice_stays_reversed() {
        let (processor, mut manager) = setup();
        let _ = processor.process(&mut manager, &button(XBOX, 6, true));
        let _ = processor.process(&mut manager, &hat_event(XBOX, hat::UP));
        assert!(manager.modes().reverse);
        let _ = processor.process(&mut manager, &hat_event(XBOX, (0, 0)));
        let _ = processor.process(&mut manager, &hat_event(XBOX, hat::UP));
        assert!(manager.modes().reverse);
    }

    #[test]
    fn test_aux_hat_sets_dpad_buttons() {
        let (processor, mut manager) = setup();
        let _ = processor.process(&mut manager, &hat_event(N64, (-1, 1)));
        let aux = &manager.state().auxiliary;
        assert_eq!(aux.button(AuxButton::DpLeft), ButtonState::On);
        assert_eq!(aux.button(AuxButton::DpRight), ButtonState::Off);
        assert_eq!(aux.button(AuxButton::DpUp), ButtonState::On);
        assert_eq!(aux.button(AuxButton::DpDown), ButtonState::Off);

        let _ = processor.process(&mut manager, &hat_event(N64, (0, 0)));
        let aux = &manager.state().auxiliary;
        for b in [AuxButton::DpLeft, AuxButton::DpRight, AuxButton::DpUp, AuxButton::DpDown] {
            assert_eq!(aux.button(b), ButtonState::Off);
        }
    }

    #[test]
    fn test_unmapped_device_is_noop() {
        let (processor, mut manager) = setup();
        let before = manager.state().clone();
        let _ = processor.process(&mut manager, &axis(99, 1, 1.0));
        assert_eq!(
            processor.process(&mut manager, &button(99, 8, true)),
            InputSignal::Continue
        );
        assert_eq!(manager.state(), &before);
    }

    #[test]
    fn test_device_lifecycle_through_processor() {
        let processor = InputProcessor::default();
        let mut manager = ControllerManager::default();
        let added = InputEvent::new(5, InputEventKind::DeviceAdded { name: "XBOX pad".into() });
        assert_eq!(processor.process(&mut manager, &added), InputSignal::Continue);
        assert_eq!(manager.profile_of(5), Some(ControllerProfile::Primary));

        let removed = InputEvent::new(5, InputEventKind::DeviceRemoved);
        assert_eq!(
            processor.process(&mut manager, &removed),
            InputSignal::Quit(QuitReason::DeviceRemoved(ControllerProfile::Primary))
        );
    }
}
