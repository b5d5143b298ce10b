//! # Heartbeat
//!
//! Periodic liveness frames so the rover can tell the link is up even when
//! the controllers are idle and no controller frames are being sent.
//!
//! A heartbeat is `0xAA` followed by the low 16 bits of the Unix time in
//! seconds. `last_sent` only advances on a successful send, so a failed
//! heartbeat is retried on the next tick.

use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::Result;
use crate::link::Link;
use crate::protocol::legacy;

/// Default interval between heartbeats
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Decides when a heartbeat is due and sends it
#[derive(Debug)]
pub struct HeartbeatManager {
    interval: Duration,
    last_sent: Option<Instant>,
    enabled: bool,
    sent: u64,
}

impl Default for HeartbeatManager {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

impl HeartbeatManager {
    /// Create an enabled manager that has never sent
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            enabled: true,
            sent: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        debug!("Heartbeat interval set to {:?}", interval);
        self.interval = interval;
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

    /// Heartbeats successfully handed to the link
    pub fn heartbeats_sent(&self) -> u64 {
        self.sent
    }

    /// Whether a heartbeat is due
    ///
    /// Always due if none has been sent yet.
    pub fn should_send(&self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_sent {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        }
    }

    /// Send a heartbeat now
    ///
    /// # Returns
    ///
    /// `true` if the link accepted the frame. Failures are logged.
    pub async fn send(&mut self, link: &mut Link) -> bool {
        let frame = legacy::heartbeat_frame_now();
        match link.send(&frame).await {
            Ok(()) => {
                self.last_sent = Some(Instant::now());
                self.sent += 1;
                debug!("Heartbeat sent: {:02X?}", frame);
                true
            }
            Err(e) => {
                warn!("Heartbeat not sent: {}", e);
                false
            }
        }
    }

    /// Send a heartbeat if one is due
    ///
    /// # Returns
    ///
    /// `true` if a heartbeat went out on this call
    pub async fn update(&mut self, link: &mut Link) -> bool {
        if !self.should_send() {
            return false;
        }
        self.send(link).await
    }

    /// Decode a received heartbeat frame into its 16-bit timestamp fragment
    ///
    /// # Errors
    ///
    /// Returns `Protocol` error if the frame is not a heartbeat
    pub fn parse_heartbeat(frame: &[u8]) -> Result<u16> {
        legacy::parse_heartbeat(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BaseStationError;
    use crate::link::mocks::RecordingTransport;
    use crate::protocol::constants::HEARTBEAT_BYTE;
    use std::io;

    async fn open_link() -> (Link, RecordingTransport) {
        let transport = RecordingTransport::new();
        let mut link = Link::new(Box::new(transport.clone()));
        assert!(link.open().await);
        (link, transport)
    }

    #[tokio::test]
    async fn test_first_update_sends() {
        tokio::time::pause();
        let (mut link, transport) = open_link().await;
        let mut heartbeat = HeartbeatManager::default();

        assert!(heartbeat.should_send());
        assert!(heartbeat.update(&mut link).await);
        assert!(!heartbeat.should_send());

        let frames = transport.get_sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 3);
        assert_eq!(frames[0][0], HEARTBEAT_BYTE);
    }

    #[tokio::test]
    async fn test_short_interval_polled_slowly() {
        tokio::time::pause();
        let (mut link, _transport) = open_link().await;
        let mut heartbeat = HeartbeatManager::new(Duration::from_millis(100));

        let mut sent = 0;
        for _ in 0..5 {
            if heartbeat.update(&mut link).await {
                sent += 1;
            }
            tokio::time::advance(Duration::from_millis(110)).await;
        }
        assert!(sent >= 1);
        assert_eq!(sent, 5);
    }

    #[tokio::test]
    async fn test_cadence_over_three_seconds() {
        tokio::time::pause();
        let (mut link, transport) = open_link().await;
        let mut heartbeat = HeartbeatManager::new(Duration::from_millis(500));

        for _ in 0..30 {
            heartbeat.update(&mut link).await;
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        let sent = transport.get_sent_frames().len();
        assert!((5..=7).contains(&sent), "expected 6 +/- 1 heartbeats, got {}", sent);
        assert_eq!(heartbeat.heartbeats_sent(), sent as u64);
    }

    #[tokio::test]
    async fn test_failed_send_retries_next_tick() {
        tokio::time::pause();
        let (mut link, transport) = open_link().await;
        let mut heartbeat = HeartbeatManager::default();

        transport.set_send_error(Some(io::ErrorKind::BrokenPipe));
        assert!(!heartbeat.update(&mut link).await);
        assert!(heartbeat.should_send());

        transport.set_send_error(None);
        assert!(heartbeat.update(&mut link).await);
        assert_eq!(transport.get_sent_frames().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_link_reports_not_sent() {
        let transport = RecordingTransport::new();
        let mut link = Link::new(Box::new(transport.clone()));
        let mut heartbeat = HeartbeatManager::default();

        assert!(!heartbeat.update(&mut link).await);
        assert!(transport.get_sent_frames().is_empty());
    }

    #[tokio::test]
    async fn test_disable_and_set_interval() {
        tokio::time::pause();
        let (mut link, _transport) = open_link().await;
        let mut heartbeat = HeartbeatManager::default();

        heartbeat.disable();
        assert!(!heartbeat.should_send());
        assert!(!heartbeat.update(&mut link).await);

        heartbeat.enable();
        assert!(heartbeat.update(&mut link).await);

        heartbeat.set_interval(Duration::from_millis(200));
        assert_eq!(heartbeat.interval(), Duration::from_millis(200));
        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(heartbeat.should_send());
    }

    #[test]
    fn test_parse_heartbeat() {
        assert_eq!(HeartbeatManager::parse_heartbeat(&[0xAA, 0x12, 0x34]).unwrap(), 0x1234);
        assert!(matches!(
            HeartbeatManager::parse_heartbeat(&[0xDE, 0x00, 0x00]),
            Err(BaseStationError::Protocol(_))
        ));
        assert!(HeartbeatManager::parse_heartbeat(&[0xAA]).is_err());
    }
}
