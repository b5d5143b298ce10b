//! # Base Station
//!
//! The control loop's state: controllers, input processing and the outbound
//! link, owned by a single task.
//!
//! Each tick drains pending input events, sends at most one controller frame
//! and at most one heartbeat, then publishes a snapshot for observers on a
//! `watch` channel. Quit requests (quit buttons, controller removal, Ctrl+C)
//! are latched and acted on by [`BaseStation::shutdown`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::Duration;
use tracing::{debug, info};

use crate::comms::{encoder_for, CommunicationManager};
use crate::config::Config;
use crate::controller::input::{InputEvent, InputProcessor, InputSignal, QuitReason};
use crate::controller::manager::{ControllerManager, DriveModes};
use crate::controller::profile::ControllerProfile;
use crate::controller::state::ControllerValues;
use crate::link::{FrameSource, Link, LinkStats, Statistics};

/// What observers see after each tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationSnapshot {
    pub primary: ControllerValues,
    pub auxiliary: ControllerValues,
    pub modes: DriveModes,
    pub primary_connected: bool,
    pub auxiliary_connected: bool,
    pub link_open: bool,
    pub statistics: Statistics,
}

/// What a tick sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub events: usize,
    pub controller_sent: bool,
    pub heartbeat_sent: bool,
}

/// Controllers plus the outbound link
#[derive(Debug)]
pub struct BaseStation {
    controllers: ControllerManager,
    processor: InputProcessor,
    comms: CommunicationManager,
    snapshot_tx: watch::Sender<StationSnapshot>,
    quit: Option<QuitReason>,
    quit_sent: bool,
}

impl BaseStation {
    /// Build a station from configuration around an unopened link
    pub fn new(config: &Config, link: Link) -> Self {
        let comms = CommunicationManager::new(
            link,
            encoder_for(config.link.codec),
            Duration::from_millis(config.timing.heartbeat_interval_ms),
        );
        Self::from_parts(
            ControllerManager::new(&config.input),
            InputProcessor::new(&config.input),
            comms,
        )
    }

    pub fn from_parts(
        controllers: ControllerManager,
        processor: InputProcessor,
        comms: CommunicationManager,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(StationSnapshot::default());
        let station = Self {
            controllers,
            processor,
            comms,
            snapshot_tx,
            quit: None,
            quit_sent: false,
        };
        station.publish();
        station
    }

    /// Open the link. Failure leaves the station running without one.
    pub async fn open(&mut self) -> bool {
        let open = self.comms.open().await;
        self.publish();
        open
    }

    /// Apply one input event, latching a quit request if it raises one
    pub fn handle_event(&mut self, event: &InputEvent) -> InputSignal {
        let signal = self.processor.process(&mut self.controllers, event);
        if let InputSignal::Quit(reason) = signal {
            self.request_quit(reason);
        }
        signal
    }

    /// Apply every event already queued on `rx` without waiting
    ///
    /// A closed channel counts as an interrupt: no more input can arrive.
    pub fn drain_input(&mut self, rx: &mut mpsc::Receiver<InputEvent>) -> usize {
        let mut count = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    let _ = self.handle_event(&event);
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.request_quit(QuitReason::Interrupted);
                    break;
                }
            }
        }
        count
    }

    /// Latch a quit request. The first reason wins.
    pub fn request_quit(&mut self, reason: QuitReason) {
        if self.quit.is_none() {
            info!("Quit requested: {}", reason);
            self.quit = Some(reason);
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit.is_some()
    }

    pub fn quit_reason(&self) -> Option<QuitReason> {
        self.quit
    }

    /// One control-loop iteration: input, controller frame, heartbeat, snapshot
    pub async fn tick(&mut self, rx: &mut mpsc::Receiver<InputEvent>) -> TickOutcome {
        let events = self.drain_input(rx);
        if self.should_quit() {
            return TickOutcome {
                events,
                ..TickOutcome::default()
            };
        }

        let controller_sent = self
            .comms
            .send_controller_data(self.controllers.state(), self.controllers.modes())
            .await;
        let heartbeat_sent = self.comms.update_heartbeat().await;
        self.publish();

        TickOutcome {
            events,
            controller_sent,
            heartbeat_sent,
        }
    }

    /// Send the quit frame once and close the link
    pub async fn shutdown(&mut self) {
        if !self.quit_sent {
            self.quit_sent = true;
            self.comms.send_quit_message().await;
        }
        self.comms.close().await;
        self.publish();

        let stats = self.statistics();
        info!(
            "Shut down: {} frames sent, {} received, {} send failures",
            stats.sent, stats.received, stats.send_failures
        );
    }

    /// Observe snapshots published after every tick
    pub fn subscribe(&self) -> watch::Receiver<StationSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> StationSnapshot {
        StationSnapshot {
            primary: self.controllers.controller_values(ControllerProfile::Primary),
            auxiliary: self.controllers.controller_values(ControllerProfile::Auxiliary),
            modes: self.controllers.modes(),
            primary_connected: self.controllers.is_connected(ControllerProfile::Primary),
            auxiliary_connected: self.controllers.is_connected(ControllerProfile::Auxiliary),
            link_open: self.comms.link_is_open(),
            statistics: self.comms.statistics(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                debug!("Snapshot updated");
                *current = snapshot;
                true
            }
        });
    }

    pub fn controller_values(&self, profile: ControllerProfile) -> ControllerValues {
        self.controllers.controller_values(profile)
    }

    pub fn modes(&self) -> DriveModes {
        self.controllers.modes()
    }

    pub fn statistics(&self) -> Statistics {
        self.comms.statistics()
    }

    pub fn link_stats(&self) -> Arc<LinkStats> {
        self.comms.link().stats()
    }

    pub fn take_receiver(&mut self) -> Option<Box<dyn FrameSource>> {
        self.comms.take_receiver()
    }

    pub fn controllers(&self) -> &ControllerManager {
        &self.controllers
    }

    pub fn comms(&self) -> &CommunicationManager {
        &self.comms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::input::InputEventKind;
    use crate::controller::profile::PrimaryButton;
    use crate::link::mocks::RecordingTransport;
    use crate::protocol::constants::{
        primary, HEARTBEAT_BYTE, LEGACY_FRAME_LEN, QUIT_BYTE, START_BYTE,
    };
    use std::io;

    const XBOX: u32 = 1;
    const N64: u32 = 2;

    async fn station() -> (BaseStation, RecordingTransport) {
        let transport = RecordingTransport::new();
        let mut station = BaseStation::new(&Config::default(), Link::new(Box::new(transport.clone())));
        assert!(station.open().await);
        (station, transport)
    }

    fn plug_in_both(tx: &mpsc::Sender<InputEvent>) {
        tx.try_send(InputEvent::new(
            XBOX,
            InputEventKind::DeviceAdded {
                name: "Microsoft Xbox Series S|X Controller".to_string(),
            },
        ))
        .unwrap();
        tx.try_send(InputEvent::new(
            N64,
            InputEventKind::DeviceAdded {
                name: "Generic DInput Gamepad".to_string(),
            },
        ))
        .unwrap();
    }

    #[tokio::test]
    async fn test_first_tick_sends_frame_then_heartbeat() {
        tokio::time::pause();
        let (mut station, transport) = station().await;
        let (_tx, mut rx) = mpsc::channel(16);

        let outcome = station.tick(&mut rx).await;
        assert!(outcome.controller_sent);
        assert!(outcome.heartbeat_sent);

        let frames = transport.get_sent_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), LEGACY_FRAME_LEN);
        assert_eq!(frames[0][0], START_BYTE);
        assert_eq!(frames[1][0], HEARTBEAT_BYTE);
    }

    #[tokio::test]
    async fn test_idle_ticks_send_nothing_new() {
        tokio::time::pause();
        let (mut station, transport) = station().await;
        let (_tx, mut rx) = mpsc::channel(16);

        station.tick(&mut rx).await;
        let outcome = station.tick(&mut rx).await;

        assert!(!outcome.controller_sent);
        assert!(!outcome.heartbeat_sent);
        assert_eq!(transport.get_sent_frames().len(), 2);
    }

    #[tokio::test]
    async fn test_stick_input_reaches_wire() {
        tokio::time::pause();
        let (mut station, transport) = station().await;
        let (tx, mut rx) = mpsc::channel(16);
        plug_in_both(&tx);
        tx.try_send(InputEvent::new(
            XBOX,
            InputEventKind::AxisMotion {
                axis: primary::AXIS_LY,
                value: 0.5,
            },
        ))
        .unwrap();

        let outcome = station.tick(&mut rx).await;
        assert_eq!(outcome.events, 3);
        assert!(outcome.controller_sent);

        let frame = &transport.get_sent_frames()[0];
        assert_eq!(frame[1], 150);

        let snapshot = station.subscribe().borrow().clone();
        assert!(snapshot.primary_connected);
        assert!(snapshot.auxiliary_connected);
        assert_eq!(snapshot.primary[&primary::AXIS_LY], 150);
        assert_eq!(snapshot.statistics.sent, 2);
    }

    #[tokio::test]
    async fn test_quit_button_latches_and_skips_send() {
        let (mut station, transport) = station().await;
        let (tx, mut rx) = mpsc::channel(16);
        plug_in_both(&tx);
        tx.try_send(InputEvent::new(
            XBOX,
            InputEventKind::ButtonDown {
                button: PrimaryButton::Home.raw(),
            },
        ))
        .unwrap();

        let outcome = station.tick(&mut rx).await;
        assert!(!outcome.controller_sent);
        assert_eq!(
            station.quit_reason(),
            Some(QuitReason::QuitButton(ControllerProfile::Primary))
        );
        assert!(transport.get_sent_frames().is_empty());
    }

    #[tokio::test]
    async fn test_device_removal_requests_quit() {
        let (mut station, _transport) = station().await;
        let (tx, mut rx) = mpsc::channel(16);
        plug_in_both(&tx);
        tx.try_send(InputEvent::new(N64, InputEventKind::DeviceRemoved)).unwrap();

        station.tick(&mut rx).await;
        assert_eq!(
            station.quit_reason(),
            Some(QuitReason::DeviceRemoved(ControllerProfile::Auxiliary))
        );
    }

    #[tokio::test]
    async fn test_closed_input_channel_interrupts() {
        let (mut station, _transport) = station().await;
        let (tx, mut rx) = mpsc::channel::<InputEvent>(16);
        drop(tx);

        station.drain_input(&mut rx);
        assert_eq!(station.quit_reason(), Some(QuitReason::Interrupted));
    }

    #[tokio::test]
    async fn test_first_quit_reason_wins() {
        let (mut station, _transport) = station().await;
        station.request_quit(QuitReason::Interrupted);
        station.request_quit(QuitReason::QuitButton(ControllerProfile::Primary));
        assert_eq!(station.quit_reason(), Some(QuitReason::Interrupted));
    }

    #[tokio::test]
    async fn test_shutdown_sends_quit_once_and_closes() {
        let (mut station, transport) = station().await;

        station.shutdown().await;
        station.shutdown().await;

        assert_eq!(transport.get_sent_frames(), vec![vec![QUIT_BYTE]]);
        assert!(transport.is_closed());
        assert!(!station.snapshot().link_open);
    }

    #[tokio::test]
    async fn test_runs_without_link() {
        tokio::time::pause();
        let transport = RecordingTransport::new();
        transport.set_open_error(io::ErrorKind::NotFound);
        let mut station = BaseStation::new(&Config::default(), Link::new(Box::new(transport.clone())));
        assert!(!station.open().await);

        let (_tx, mut rx) = mpsc::channel(16);
        let outcome = station.tick(&mut rx).await;
        assert!(!outcome.controller_sent);
        assert!(!outcome.heartbeat_sent);

        station.shutdown().await;
        assert!(transport.get_sent_frames().is_empty());
        assert!(!transport.is_closed());
    }
}
