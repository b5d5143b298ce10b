//! # Protocol Constants
//!
//! Byte values, frame sizes and raw input indices shared by the legacy codec,
//! the extensible codec and the input layer.

/// Sentinel that opens each half of a legacy controller frame
pub const START_BYTE: u8 = 0xDE;

/// One-byte frame telling the rover the base station is going away
pub const QUIT_BYTE: u8 = 0xFE;

/// Identifier byte of a heartbeat frame
pub const HEARTBEAT_BYTE: u8 = 0xAA;

/// Heartbeat frame: identifier + 2-byte timestamp fragment
pub const HEARTBEAT_FRAME_LEN: usize = 3;

/// Primary half: start + 2 drive axes + 2 button bytes
pub const PRIMARY_MESSAGE_LEN: usize = 5;

/// Auxiliary half: start + 4 button bytes
pub const AUXILIARY_MESSAGE_LEN: usize = 5;

/// Combined legacy controller frame
pub const LEGACY_FRAME_LEN: usize = PRIMARY_MESSAGE_LEN + AUXILIARY_MESSAGE_LEN;

/// Axis byte range. Neutral is the stick at rest.
pub const AXIS_MIN: u8 = 0;
pub const AXIS_NEUTRAL: u8 = 100;
pub const AXIS_MAX: u8 = 200;

/// Width of one packed button field
pub const BUTTON_FIELD_BITS: u32 = 2;

/// Packed button fields per byte
pub const BUTTON_FIELDS_PER_BYTE: usize = 4;

/// Legacy mapping keys for primary buttons sit above the six axis indices
pub const PRIMARY_BUTTON_KEY_OFFSET: u8 = 6;

/// Extensible message header size: type(1) + id(4) + timestamp(8) + length(2)
pub const MESSAGE_HEADER_LEN: usize = 15;

/// Raw indices reported by the primary (Xbox) controller.
pub mod primary {
    pub const AXIS_LX: u8 = 0;
    pub const AXIS_LY: u8 = 1;
    pub const AXIS_LT: u8 = 2;
    pub const AXIS_RT: u8 = 3;
    pub const AXIS_RY: u8 = 4;
    pub const AXIS_RX: u8 = 5;

    pub const NUM_AXES: usize = 6;

    pub const BUTTON_A: u8 = 0;
    pub const BUTTON_B: u8 = 1;
    pub const BUTTON_X: u8 = 2;
    pub const BUTTON_Y: u8 = 3;
    pub const BUTTON_LEFT_BUMPER: u8 = 4;
    pub const BUTTON_RIGHT_BUMPER: u8 = 5;
    pub const BUTTON_SELECT: u8 = 6;
    pub const BUTTON_START: u8 = 7;
    pub const BUTTON_HOME: u8 = 8;
    pub const BUTTON_LEFT_STICK: u8 = 9;
    pub const BUTTON_RIGHT_STICK: u8 = 10;
}

/// Raw indices reported by the auxiliary (N64) controller.
///
/// The adapter reports the D-pad as a hat; the `DP_*` indices are the slots the
/// hat directions are stored under.
pub mod auxiliary {
    pub const NUM_AXES: usize = 2;

    pub const BUTTON_C_DOWN: u8 = 0;
    pub const BUTTON_A: u8 = 1;
    pub const BUTTON_B: u8 = 2;
    pub const BUTTON_C_LEFT: u8 = 3;
    pub const BUTTON_L: u8 = 4;
    pub const BUTTON_R: u8 = 5;
    pub const BUTTON_Z: u8 = 6;
    pub const BUTTON_C_RIGHT: u8 = 8;
    pub const BUTTON_C_UP: u8 = 9;
    pub const BUTTON_START: u8 = 12;
    pub const BUTTON_DP_UP: u8 = 20;
    pub const BUTTON_DP_DOWN: u8 = 21;
    pub const BUTTON_DP_LEFT: u8 = 22;
    pub const BUTTON_DP_RIGHT: u8 = 23;
}

/// Hat (D-pad) positions as `(x, y)`, up is positive y.
pub mod hat {
    pub const UP: (i8, i8) = (0, 1);
    pub const DOWN: (i8, i8) = (0, -1);
    pub const LEFT: (i8, i8) = (-1, 0);
    pub const RIGHT: (i8, i8) = (1, 0);
}
