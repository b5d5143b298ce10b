//! # Controller Profiles
//!
//! The two controller layouts the base station understands and the closed sets
//! of inputs each one has.
//!
//! | Profile | Device | Live axes | Buttons |
//! |---------|--------|-----------|---------|
//! | [`ControllerProfile::Primary`] | Xbox | LX, LY, RX, RY + 2 triggers | 11 |
//! | [`ControllerProfile::Auxiliary`] | N64 (DInput adapter) | none | 14 |
//!
//! Raw indices are what the input source reports. Each enum converts from its
//! raw index and back, so no code outside this module does index arithmetic.

use std::fmt;

use crate::protocol::constants::{auxiliary, primary, PRIMARY_BUTTON_KEY_OFFSET};

/// Controller layout a connected device is driven as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerProfile {
    /// Xbox drive controller
    Primary,
    /// N64 auxiliary controller
    Auxiliary,
}

impl ControllerProfile {
    /// Short name used in logs and in the controller-data JSON payload.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ControllerProfile::Primary => "xbox",
            ControllerProfile::Auxiliary => "n64",
        }
    }

    /// Pick a profile from a device name by case-insensitive substring match.
    ///
    /// Primary patterns are checked first.
    ///
    /// # Examples
    ///
    /// ```
    /// use rover_basestation::controller::profile::ControllerProfile;
    ///
    /// let primary = vec!["xbox".to_string()];
    /// let auxiliary = vec!["dinput".to_string()];
    ///
    /// assert_eq!(
    ///     ControllerProfile::from_device_name("Microsoft X-Box 360 pad / Xbox Wireless", &primary, &auxiliary),
    ///     Some(ControllerProfile::Primary)
    /// );
    /// assert_eq!(
    ///     ControllerProfile::from_device_name("USB Keyboard", &primary, &auxiliary),
    ///     None
    /// );
    /// ```
    #[must_use]
    pub fn from_device_name(
        name: &str,
        primary_patterns: &[String],
        auxiliary_patterns: &[String],
    ) -> Option<Self> {
        let name = name.to_lowercase();
        let matches = |patterns: &[String]| {
            patterns
                .iter()
                .filter(|p| !p.is_empty())
                .any(|p| name.contains(&p.to_lowercase()))
        };

        if matches(primary_patterns) {
            Some(ControllerProfile::Primary)
        } else if matches(auxiliary_patterns) {
            Some(ControllerProfile::Auxiliary)
        } else {
            None
        }
    }
}

impl fmt::Display for ControllerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Two-valued button field.
///
/// `Off = 1` and `On = 2` rather than 0/1: a single flipped bit turns either
/// legal value into 0 or 3, which the legacy decoder rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ButtonState {
    #[default]
    Off = 1,
    On = 2,
}

impl ButtonState {
    /// `false -> Off`, `true -> On` (i.e. the pressed flag plus one).
    #[must_use]
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            ButtonState::On
        } else {
            ButtonState::Off
        }
    }

    /// Parse a 2-bit wire field. Only 1 and 2 are legal.
    #[must_use]
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            1 => Some(ButtonState::Off),
            2 => Some(ButtonState::On),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_on(self) -> bool {
        self == ButtonState::On
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Analog stick axes of the primary controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimaryAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl PrimaryAxis {
    pub const ALL: [PrimaryAxis; 4] = [
        PrimaryAxis::LeftX,
        PrimaryAxis::LeftY,
        PrimaryAxis::RightX,
        PrimaryAxis::RightY,
    ];

    /// Raw axis index reported by the device.
    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            PrimaryAxis::LeftX => primary::AXIS_LX,
            PrimaryAxis::LeftY => primary::AXIS_LY,
            PrimaryAxis::RightX => primary::AXIS_RX,
            PrimaryAxis::RightY => primary::AXIS_RY,
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

/// Analog triggers of the primary controller, carried on the wire as buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Left,
    Right,
}

impl Trigger {
    pub const ALL: [Trigger; 2] = [Trigger::Left, Trigger::Right];

    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            Trigger::Left => primary::AXIS_LT,
            Trigger::Right => primary::AXIS_RT,
        }
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

/// What a raw primary axis index drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAxisInput {
    Stick(PrimaryAxis),
    Trigger(Trigger),
}

impl PrimaryAxisInput {
    #[must_use]
    pub fn from_raw(axis: u8) -> Option<Self> {
        match axis {
            primary::AXIS_LX => Some(Self::Stick(PrimaryAxis::LeftX)),
            primary::AXIS_LY => Some(Self::Stick(PrimaryAxis::LeftY)),
            primary::AXIS_RX => Some(Self::Stick(PrimaryAxis::RightX)),
            primary::AXIS_RY => Some(Self::Stick(PrimaryAxis::RightY)),
            primary::AXIS_LT => Some(Self::Trigger(Trigger::Left)),
            primary::AXIS_RT => Some(Self::Trigger(Trigger::Right)),
            _ => None,
        }
    }
}

/// Buttons of the primary controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimaryButton {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    Select,
    Start,
    Home,
    LeftStick,
    RightStick,
}

impl PrimaryButton {
    pub const COUNT: usize = 11;

    pub const ALL: [PrimaryButton; Self::COUNT] = [
        PrimaryButton::A,
        PrimaryButton::B,
        PrimaryButton::X,
        PrimaryButton::Y,
        PrimaryButton::LeftBumper,
        PrimaryButton::RightBumper,
        PrimaryButton::Select,
        PrimaryButton::Start,
        PrimaryButton::Home,
        PrimaryButton::LeftStick,
        PrimaryButton::RightStick,
    ];

    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            PrimaryButton::A => primary::BUTTON_A,
            PrimaryButton::B => primary::BUTTON_B,
            PrimaryButton::X => primary::BUTTON_X,
            PrimaryButton::Y => primary::BUTTON_Y,
            PrimaryButton::LeftBumper => primary::BUTTON_LEFT_BUMPER,
            PrimaryButton::RightBumper => primary::BUTTON_RIGHT_BUMPER,
            PrimaryButton::Select => primary::BUTTON_SELECT,
            PrimaryButton::Start => primary::BUTTON_START,
            PrimaryButton::Home => primary::BUTTON_HOME,
            PrimaryButton::LeftStick => primary::BUTTON_LEFT_STICK,
            PrimaryButton::RightStick => primary::BUTTON_RIGHT_STICK,
        }
    }

    #[must_use]
    pub fn from_raw(button: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.raw() == button)
    }

    /// Key in the legacy flat mapping, offset past the axis indices.
    #[must_use]
    pub fn legacy_key(self) -> u8 {
        self.raw() + PRIMARY_BUTTON_KEY_OFFSET
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

/// Buttons of the auxiliary controller, D-pad directions included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxButton {
    A,
    B,
    CUp,
    CDown,
    CLeft,
    CRight,
    L,
    R,
    Z,
    Start,
    DpUp,
    DpDown,
    DpLeft,
    DpRight,
}

impl AuxButton {
    pub const COUNT: usize = 14;

    pub const ALL: [AuxButton; Self::COUNT] = [
        AuxButton::A,
        AuxButton::B,
        AuxButton::CUp,
        AuxButton::CDown,
        AuxButton::CLeft,
        AuxButton::CRight,
        AuxButton::L,
        AuxButton::R,
        AuxButton::Z,
        AuxButton::Start,
        AuxButton::DpUp,
        AuxButton::DpDown,
        AuxButton::DpLeft,
        AuxButton::DpRight,
    ];

    #[must_use]
    pub fn raw(self) -> u8 {
        match self {
            AuxButton::A => auxiliary::BUTTON_A,
            AuxButton::B => auxiliary::BUTTON_B,
            AuxButton::CUp => auxiliary::BUTTON_C_UP,
            AuxButton::CDown => auxiliary::BUTTON_C_DOWN,
            AuxButton::CLeft => auxiliary::BUTTON_C_LEFT,
            AuxButton::CRight => auxiliary::BUTTON_C_RIGHT,
            AuxButton::L => auxiliary::BUTTON_L,
            AuxButton::R => auxiliary::BUTTON_R,
            AuxButton::Z => auxiliary::BUTTON_Z,
            AuxButton::Start => auxiliary::BUTTON_START,
            AuxButton::DpUp => auxiliary::BUTTON_DP_UP,
            AuxButton::DpDown => auxiliary::BUTTON_DP_DOWN,
            AuxButton::DpLeft => auxiliary::BUTTON_DP_LEFT,
            AuxButton::DpRight => auxiliary::BUTTON_DP_RIGHT,
        }
    }

    #[must_use]
    pub fn from_raw(button: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.raw() == button)
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}
