//! # Gamepad Input Source
//!
//! Reads the physical controllers through the Linux evdev interface and feeds
//! [`InputEvent`]s into the control loop.
//!
//! Each matching `/dev/input/event*` device gets its own reader thread. Reads
//! block, so the threads never touch the async runtime; they only push events
//! into an mpsc channel. A watcher thread rescans the devices periodically and
//! starts readers for controllers plugged in later.
//!
//! ## Primary (Xbox) Mapping
//!
//! | evdev | Raw index |
//! |-------|-----------|
//! | ABS_X / ABS_Y | axis 0 / 1 (left stick) |
//! | ABS_Z / ABS_RZ | axis 2 / 3 (triggers) |
//! | ABS_RY / ABS_RX | axis 4 / 5 (right stick) |
//! | BTN_SOUTH, BTN_EAST, BTN_NORTH, BTN_WEST | A, B, X, Y |
//! | BTN_TL, BTN_TR | LB, RB |
//! | BTN_SELECT, BTN_START, BTN_MODE | SELECT, START, HOME |
//! | BTN_THUMBL, BTN_THUMBR | stick clicks |
//!
//! ## Auxiliary (DInput adapter) Mapping
//!
//! Buttons are numbered from `BTN_TRIGGER` (0x120) in code order. Axes are
//! ABS_X / ABS_Y.
//!
//! Both profiles report the D-pad as ABS_HAT0X / ABS_HAT0Y. evdev reports up as
//! -1; it is inverted here so up is +1.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use evdev::{AbsoluteAxisType, Device, InputEventKind as EvdevKind, Key};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::input::{DeviceId, InputEvent, InputEventKind};
use super::profile::ControllerProfile;
use crate::config::InputConfig;
use crate::error::{BaseStationError, Result};
use crate::protocol::constants::primary;

/// First generic joystick button code
const BTN_TRIGGER_CODE: u16 = 0x120;

/// Absolute axis range reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    /// Map a raw value to [-1, 1]
    #[must_use]
    pub fn normalize(&self, value: i32) -> f32 {
        let span = (self.max - self.min) as f32;
        if span <= 0.0 {
            return 0.0;
        }
        let unit = (value - self.min) as f32 / span;
        (unit * 2.0 - 1.0).clamp(-1.0, 1.0)
    }
}

/// Converts evdev events of one device into raw-index input events
#[derive(Debug)]
pub struct EventTranslator {
    profile: ControllerProfile,
    ranges: HashMap<u16, AxisRange>,
    hat: (i8, i8),
}

impl EventTranslator {
    pub fn new(profile: ControllerProfile, ranges: HashMap<u16, AxisRange>) -> Self {
        Self {
            profile,
            ranges,
            hat: (0, 0),
        }
    }

    /// Read the axis ranges of an open device
    pub fn for_device(profile: ControllerProfile, device: &Device) -> Self {
        let mut ranges = HashMap::new();
        if let (Some(supported), Ok(abs)) = (device.supported_absolute_axes(), device.get_abs_state()) {
            for axis in supported.iter() {
                if let Some(info) = abs.get(axis.0 as usize) {
                    ranges.insert(
                        axis.0,
                        AxisRange {
                            min: info.minimum,
                            max: info.maximum,
                        },
                    );
                }
            }
        }
        Self::new(profile, ranges)
    }

    /// Translate one evdev event
    ///
    /// Returns `None` for events with no counterpart (sync reports, key
    /// repeats, unmapped keys and axes).
    pub fn translate(&mut self, event: &evdev::InputEvent) -> Option<InputEventKind> {
        match event.kind() {
            EvdevKind::Key(key) => {
                let button = self.button_index(key)?;
                match event.value() {
                    0 => Some(InputEventKind::ButtonUp { button }),
                    1 => Some(InputEventKind::ButtonDown { button }),
                    _ => None,
                }
            }
            EvdevKind::AbsAxis(axis) if axis == AbsoluteAxisType::ABS_HAT0X => {
                self.hat.0 = event.value().signum() as i8;
                Some(self.hat_event())
            }
            EvdevKind::AbsAxis(axis) if axis == AbsoluteAxisType::ABS_HAT0Y => {
                self.hat.1 = -(event.value().signum() as i8);
                Some(self.hat_event())
            }
            EvdevKind::AbsAxis(axis) => {
                let index = self.axis_index(axis)?;
                let range = self.ranges.get(&axis.0).copied().unwrap_or(AxisRange {
                    min: -32768,
                    max: 32767,
                });
                Some(InputEventKind::AxisMotion {
                    axis: index,
                    value: range.normalize(event.value()),
                })
            }
            _ => None,
        }
    }

    fn hat_event(&self) -> InputEventKind {
        InputEventKind::HatMotion {
            x: self.hat.0,
            y: self.hat.1,
        }
    }

    fn button_index(&self, key: Key) -> Option<u8> {
        match self.profile {
            ControllerProfile::Primary => {
                let index = match key {
                    Key::BTN_SOUTH => primary::BUTTON_A,
                    Key::BTN_EAST => primary::BUTTON_B,
                    Key::BTN_NORTH => primary::BUTTON_X,
                    Key::BTN_WEST => primary::BUTTON_Y,
                    Key::BTN_TL => primary::BUTTON_LEFT_BUMPER,
                    Key::BTN_TR => primary::BUTTON_RIGHT_BUMPER,
                    Key::BTN_SELECT => primary::BUTTON_SELECT,
                    Key::BTN_START => primary::BUTTON_START,
                    Key::BTN_MODE => primary::BUTTON_HOME,
                    Key::BTN_THUMBL => primary::BUTTON_LEFT_STICK,
                    Key::BTN_THUMBR => primary::BUTTON_RIGHT_STICK,
                    _ => return None,
                };
                Some(index)
            }
            ControllerProfile::Auxiliary => key
                .code()
                .checked_sub(BTN_TRIGGER_CODE)
                .and_then(|i| u8::try_from(i).ok()),
        }
    }

    fn axis_index(&self, axis: AbsoluteAxisType) -> Option<u8> {
        match self.profile {
            ControllerProfile::Primary => {
                let index = match axis {
                    AbsoluteAxisType::ABS_X => primary::AXIS_LX,
                    AbsoluteAxisType::ABS_Y => primary::AXIS_LY,
                    AbsoluteAxisType::ABS_Z => primary::AXIS_LT,
                    AbsoluteAxisType::ABS_RZ => primary::AXIS_RT,
                    AbsoluteAxisType::ABS_RY => primary::AXIS_RY,
                    AbsoluteAxisType::ABS_RX => primary::AXIS_RX,
                    _ => return None,
                };
                Some(index)
            }
            ControllerProfile::Auxiliary => match axis {
                AbsoluteAxisType::ABS_X => Some(0),
                AbsoluteAxisType::ABS_Y => Some(1),
                _ => None,
            },
        }
    }
}

/// Device paths that currently have a live reader thread
type ActivePaths = Arc<Mutex<HashSet<PathBuf>>>;

/// A newly connected controller that matched a profile
#[derive(Debug)]
pub struct Discovered<D> {
    pub id: DeviceId,
    pub path: PathBuf,
    pub name: String,
    pub profile: ControllerProfile,
    pub device: D,
}

/// Tracks which device paths are being read and hands out device ids
///
/// A path is claimed once and stays claimed until its reader releases it,
/// so rescanning never starts a second reader for the same device. Ids are
/// never reused: a controller that reconnects gets a fresh one.
#[derive(Debug)]
pub struct DeviceRegistry {
    primary_names: Vec<String>,
    auxiliary_names: Vec<String>,
    active: ActivePaths,
    next_id: DeviceId,
}

impl DeviceRegistry {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            primary_names: config.primary_names.clone(),
            auxiliary_names: config.auxiliary_names.clone(),
            active: Arc::new(Mutex::new(HashSet::new())),
            next_id: 0,
        }
    }

    /// Claim every matching device that is not already being read
    ///
    /// Devices are considered in path order.
    pub fn claim<D, I>(&mut self, devices: I) -> Vec<Discovered<D>>
    where
        I: IntoIterator<Item = (PathBuf, String, D)>,
    {
        let mut devices: Vec<(PathBuf, String, D)> = devices.into_iter().collect();
        devices.sort_by(|a, b| a.0.cmp(&b.0));

        let mut active = lock(&self.active);
        let mut found = Vec::new();
        for (path, name, device) in devices {
            if active.contains(&path) {
                continue;
            }
            let Some(profile) =
                ControllerProfile::from_device_name(&name, &self.primary_names, &self.auxiliary_names)
            else {
                debug!("Skipping input device {}: {}", path.display(), name);
                continue;
            };

            active.insert(path.clone());
            let id = self.next_id;
            self.next_id += 1;
            found.push(Discovered {
                id,
                path,
                name,
                profile,
                device,
            });
        }
        found
    }

    /// Forget a path so a later scan can claim it again
    pub fn release(&self, path: &Path) {
        release(&self.active, path);
    }

    /// Number of paths with a live reader
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

fn lock(active: &ActivePaths) -> MutexGuard<'_, HashSet<PathBuf>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

fn release(active: &ActivePaths, path: &Path) {
    lock(active).remove(path);
}

fn enumerate_devices() -> impl Iterator<Item = (PathBuf, String, Device)> {
    evdev::enumerate().map(|(path, device)| {
        let name = device.name().unwrap_or_default().to_string();
        (path, name, device)
    })
}

/// Start reader threads for the controllers connected now, and a watcher
/// thread that picks up controllers connected later
///
/// # Arguments
///
/// * `config` - Input configuration supplying the name patterns and rescan interval
/// * `tx` - Channel the readers push events into
///
/// # Returns
///
/// * `Result<usize>` - Number of controllers found at start-up (may be 0)
///
/// # Errors
///
/// Returns `Controller` error if a thread could not be started
pub fn spawn_readers(config: &InputConfig, tx: mpsc::Sender<InputEvent>) -> Result<usize> {
    let mut registry = DeviceRegistry::new(config);

    let initial = registry.claim(enumerate_devices());
    let count = initial.len();
    for found in initial {
        start_reader(&registry, found, tx.clone())?;
    }

    let interval = Duration::from_millis(config.rescan_interval_ms);
    std::thread::Builder::new()
        .name("gamepad-watch".to_string())
        .spawn(move || watch_devices(registry, interval, tx))
        .map_err(|e| BaseStationError::Controller(format!("Failed to start device watcher: {}", e)))?;

    Ok(count)
}

fn watch_devices(mut registry: DeviceRegistry, interval: Duration, tx: mpsc::Sender<InputEvent>) {
    loop {
        std::thread::sleep(interval);
        if tx.is_closed() {
            debug!("Input channel closed, stopping device watcher");
            return;
        }

        for found in registry.claim(enumerate_devices()) {
            if let Err(e) = start_reader(&registry, found, tx.clone()) {
                warn!("{}", e);
            }
        }
    }
}

fn start_reader(
    registry: &DeviceRegistry,
    found: Discovered<Device>,
    tx: mpsc::Sender<InputEvent>,
) -> Result<()> {
    let Discovered {
        id,
        path,
        name,
        profile,
        device,
    } = found;
    info!("Reading {} controller \"{}\" at {}", profile, name, path.display());

    let translator = EventTranslator::for_device(profile, &device);
    let active = Arc::clone(&registry.active);
    let reader_path = path.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("gamepad-{}", id))
        .spawn(move || {
            read_device(id, name, device, translator, tx);
            release(&active, &reader_path);
        });

    if let Err(e) = spawned {
        registry.release(&path);
        return Err(BaseStationError::Controller(format!("Failed to start reader: {}", e)));
    }
    Ok(())
}

fn read_device(
    id: DeviceId,
    name: String,
    mut device: Device,
    mut translator: EventTranslator,
    tx: mpsc::Sender<InputEvent>,
) {
    if tx
        .blocking_send(InputEvent::new(id, InputEventKind::DeviceAdded { name: name.clone() }))
        .is_err()
    {
        return;
    }

    loop {
        let kinds: Vec<InputEventKind> = match device.fetch_events() {
            Ok(events) => events.filter_map(|e| translator.translate(&e)).collect(),
            Err(e) => {
                warn!("Lost input device \"{}\": {}", name, e);
                let _ = tx.blocking_send(InputEvent::new(id, InputEventKind::DeviceRemoved));
                return;
            }
        };

        for kind in kinds {
            if tx.blocking_send(InputEvent::new(id, kind)).is_err() {
                debug!("Input channel closed, stopping reader for \"{}\"", name);
                return;
            }
        }
    }
}
