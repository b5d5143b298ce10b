//! # Communication Manager
//!
//! Owns the outbound link and decides what goes on it each tick: at most one
//! controller-data frame (skipped when unchanged since the last one) and at
//! most one heartbeat.

use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::heartbeat::HeartbeatManager;
use super::strategy::FrameEncoder;
use crate::controller::manager::DriveModes;
use crate::controller::state::ControllerState;
use crate::link::{FrameSource, Link, Statistics};
use crate::protocol::legacy;

/// Outbound side of the base station
#[derive(Debug)]
pub struct CommunicationManager {
    link: Link,
    encoder: Box<dyn FrameEncoder>,
    heartbeat: HeartbeatManager,
    last_key: Option<Vec<u8>>,
    enabled: bool,
}

impl CommunicationManager {
    /// Create an enabled manager
    ///
    /// # Arguments
    ///
    /// * `link` - Link to send on; opened separately with [`Self::open`]
    /// * `encoder` - Wire format for controller data
    /// * `heartbeat_interval` - Time between heartbeats
    pub fn new(link: Link, encoder: Box<dyn FrameEncoder>, heartbeat_interval: Duration) -> Self {
        Self {
            link,
            encoder,
            heartbeat: HeartbeatManager::new(heartbeat_interval),
            last_key: None,
            enabled: true,
        }
    }

    /// Open the link. A failed open leaves it disabled but is not fatal.
    pub async fn open(&mut self) -> bool {
        info!("Using {} codec", self.encoder.name());
        self.link.open().await
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn link_is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Send the controller state if it changed since the last send
    ///
    /// The duplicate cache is updated whether or not the link accepts the
    /// frame.
    ///
    /// # Returns
    ///
    /// `true` if a frame was handed to the link and accepted
    pub async fn send_controller_data(&mut self, state: &ControllerState, modes: DriveModes) -> bool {
        if !self.enabled {
            return false;
        }

        let encoded = match self.encoder.encode_controller(state, modes) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode controller data: {}", e);
                return false;
            }
        };

        if self.last_key.as_deref() == Some(encoded.key.as_slice()) {
            return false;
        }
        self.last_key = Some(encoded.key);

        match self.link.send(&encoded.bytes).await {
            Ok(()) => {
                debug!("Controller frame sent: {:02X?}", encoded.bytes);
                true
            }
            Err(e) => {
                debug!("Controller frame not sent: {}", e);
                false
            }
        }
    }

    /// Send a heartbeat if one is due
    pub async fn update_heartbeat(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        self.heartbeat.update(&mut self.link).await
    }

    /// Send the one-byte quit frame
    pub async fn send_quit_message(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.link.send(&legacy::quit_frame()).await {
            Ok(()) => {
                info!("Quit message sent");
                true
            }
            Err(e) => {
                warn!("Quit message not sent: {}", e);
                false
            }
        }
    }

    /// Forget the last frame so the next controller frame is always sent
    pub fn reset_duplicate_cache(&mut self) {
        self.last_key = None;
    }

    pub fn heartbeat(&self) -> &HeartbeatManager {
        &self.heartbeat
    }

    pub fn heartbeat_mut(&mut self) -> &mut HeartbeatManager {
        &mut self.heartbeat
    }

    /// Hand out the link's receive half, once
    pub fn take_receiver(&mut self) -> Option<Box<dyn FrameSource>> {
        self.link.take_receiver()
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn statistics(&self) -> Statistics {
        self.link.statistics()
    }

    pub async fn close(&mut self) {
        self.link.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::strategy::{ExtensibleEncoder, LegacyEncoder};
    use crate::controller::profile::{AuxButton, ButtonState, PrimaryAxis};
    use crate::link::mocks::RecordingTransport;
    use crate::link::MockTransport;
    use crate::protocol::constants::{LEGACY_FRAME_LEN, QUIT_BYTE};
    use std::io;

    async fn manager_with(transport: &RecordingTransport) -> CommunicationManager {
        let mut manager = CommunicationManager::new(
            Link::new(Box::new(transport.clone())),
            Box::new(LegacyEncoder),
            Duration::from_secs(1),
        );
        assert!(manager.open().await);
        manager
    }

    #[tokio::test]
    async fn test_identical_state_sent_once() {
        let transport = RecordingTransport::new();
        let mut manager = manager_with(&transport).await;
        let state = ControllerState::new();

        assert!(manager.send_controller_data(&state, DriveModes::default()).await);
        assert!(!manager.send_controller_data(&state, DriveModes::default()).await);

        let frames = transport.get_sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), LEGACY_FRAME_LEN);
    }

    #[tokio::test]
    async fn test_changed_state_sent_again() {
        let transport = RecordingTransport::new();
        let mut manager = manager_with(&transport).await;
        let mut state = ControllerState::new();

        manager.send_controller_data(&state, DriveModes::default()).await;
        state.primary.set_axis(PrimaryAxis::LeftY, 150);
        assert!(manager.send_controller_data(&state, DriveModes::default()).await);
        state.auxiliary.set_button(AuxButton::Z, ButtonState::On);
        assert!(manager.send_controller_data(&state, DriveModes::default()).await);

        assert_eq!(transport.get_sent_frames().len(), 3);
    }

    #[tokio::test]
    async fn test_reverse_toggle_changes_frame() {
        let transport = RecordingTransport::new();
        let mut manager = manager_with(&transport).await;
        let mut state = ControllerState::new();
        state.primary.set_axis(PrimaryAxis::LeftY, 150);

        manager.send_controller_data(&state, DriveModes::default()).await;
        let reverse = DriveModes {
            creep: false,
            reverse: true,
        };
        assert!(manager.send_controller_data(&state, reverse).await);
    }

    #[tokio::test]
    async fn test_cache_updated_on_failed_send() {
        let transport = RecordingTransport::new();
        let mut manager = manager_with(&transport).await;
        let state = ControllerState::new();

        transport.set_send_error(Some(io::ErrorKind::BrokenPipe));
        assert!(!manager.send_controller_data(&state, DriveModes::default()).await);

        transport.set_send_error(None);
        assert!(!manager.send_controller_data(&state, DriveModes::default()).await);
        assert!(transport.get_sent_frames().is_empty());
        assert_eq!(manager.statistics().send_failures, 1);
    }

    #[tokio::test]
    async fn test_extensible_duplicates_suppressed() {
        let transport = RecordingTransport::new();
        let mut manager = CommunicationManager::new(
            Link::new(Box::new(transport.clone())),
            Box::new(ExtensibleEncoder),
            Duration::from_secs(1),
        );
        manager.open().await;
        let state = ControllerState::new();

        assert!(manager.send_controller_data(&state, DriveModes::default()).await);
        assert!(!manager.send_controller_data(&state, DriveModes::default()).await);
        assert_eq!(transport.get_sent_frames().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let transport = RecordingTransport::new();
        let mut manager = manager_with(&transport).await;
        manager.disable();

        let state = ControllerState::new();
        assert!(!manager.send_controller_data(&state, DriveModes::default()).await);
        assert!(!manager.update_heartbeat().await);
        assert!(!manager.send_quit_message().await);
        assert!(transport.get_sent_frames().is_empty());

        manager.enable();
        assert!(manager.send_controller_data(&state, DriveModes::default()).await);
    }

    #[tokio::test]
    async fn test_quit_message() {
        let transport = RecordingTransport::new();
        let mut manager = manager_with(&transport).await;

        assert!(manager.send_quit_message().await);
        assert_eq!(transport.get_sent_frames(), vec![vec![QUIT_BYTE]]);
    }

    #[tokio::test]
    async fn test_reset_duplicate_cache() {
        let transport = RecordingTransport::new();
        let mut manager = manager_with(&transport).await;
        let state = ControllerState::new();

        manager.send_controller_data(&state, DriveModes::default()).await;
        manager.reset_duplicate_cache();
        assert!(manager.send_controller_data(&state, DriveModes::default()).await);
        assert_eq!(transport.get_sent_frames().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_open_reports_not_sent() {
        let mut mock = MockTransport::new();
        mock.expect_open()
            .times(1)
            .returning(|| Err(io::Error::new(io::ErrorKind::NotFound, "no radio").into()));
        mock.expect_send().times(0);
        mock.expect_describe().returning(|| "mock".to_string());

        let mut manager = CommunicationManager::new(
            Link::new(Box::new(mock)),
            Box::new(LegacyEncoder),
            Duration::from_secs(1),
        );
        assert!(!manager.open().await);
        assert!(!manager.link_is_open());

        let state = ControllerState::new();
        assert!(!manager.send_controller_data(&state, DriveModes::default()).await);
        assert!(!manager.update_heartbeat().await);
        assert!(!manager.send_quit_message().await);
    }
}
