//! # Link Module
//!
//! Byte transports between the base station and the rover.
//!
//! This module handles:
//! - The [`Transport`] / [`FrameSource`] traits every transport implements
//! - XBee API mode over a serial port
//! - UDP to a local rover simulator
//! - Shared sent / received counters
//!
//! A [`Link`] wraps one transport. If opening fails the link stays disabled and
//! every send reports [`BaseStationError::LinkDisabled`]; the control loop keeps
//! running either way.

pub mod serial;
pub mod udp;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{Config, LinkMode};
use crate::error::{BaseStationError, Result};

/// Outbound half of a transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Acquire the underlying device or socket
    async fn open(&mut self) -> Result<()>;

    /// Transmit one frame. Frames are all-or-nothing.
    async fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Release the underlying device or socket
    async fn close(&mut self) -> Result<()>;

    /// Hand out the receive half. Only the first call after `open` returns it.
    fn take_receiver(&mut self) -> Option<Box<dyn FrameSource>>;

    /// Human-readable endpoint for logs
    fn describe(&self) -> String;
}

/// Inbound half of a transport
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame
    ///
    /// # Errors
    ///
    /// `LinkClosed` once the transport is gone; other errors are transient.
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Frame counters shared between the sender and the receive task
#[derive(Debug, Default)]
pub struct LinkStats {
    sent: AtomicU64,
    received: AtomicU64,
    send_failures: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub sent: u64,
    pub received: u64,
    pub send_failures: u64,
}

impl LinkStats {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Statistics {
        Statistics {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// A transport plus its open state and counters
pub struct Link {
    transport: Box<dyn Transport>,
    open: bool,
    stats: Arc<LinkStats>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("transport", &self.transport.describe())
            .field("open", &self.open)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl Link {
    /// Wrap a transport. The link starts closed.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            open: false,
            stats: Arc::new(LinkStats::default()),
        }
    }

    /// Open the transport
    ///
    /// # Returns
    ///
    /// * `true` - Link is usable
    /// * `false` - Open failed; the link stays disabled and the failure is logged
    pub async fn open(&mut self) -> bool {
        match self.transport.open().await {
            Ok(()) => {
                info!("Link open: {}", self.transport.describe());
                self.open = true;
            }
            Err(e) => {
                warn!(
                    "Failed to open link {}: {}. Running without a link",
                    self.transport.describe(),
                    e
                );
                self.open = false;
            }
        }
        self.open
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Send one frame
    ///
    /// # Errors
    ///
    /// - `LinkDisabled`: the link was never opened or failed to open
    /// - Any transport error
    pub async fn send(&mut self, frame: &[u8]) -> Result<()> {
        if !self.open {
            return Err(BaseStationError::LinkDisabled);
        }

        match self.transport.send(frame).await {
            Ok(()) => {
                self.stats.record_sent();
                Ok(())
            }
            Err(e) => {
                self.stats.record_send_failure();
                Err(e)
            }
        }
    }

    /// Close the transport if it is open. Failures are logged.
    pub async fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        match self.transport.close().await {
            Ok(()) => info!("Link closed: {}", self.transport.describe()),
            Err(e) => warn!("Error closing link {}: {}", self.transport.describe(), e),
        }
    }

    pub fn take_receiver(&mut self) -> Option<Box<dyn FrameSource>> {
        if !self.open {
            return None;
        }
        self.transport.take_receiver()
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        Arc::clone(&self.stats)
    }

    pub fn statistics(&self) -> Statistics {
        self.stats.snapshot()
    }
}

/// Build the transport selected by `[link].mode`
///
/// # Errors
///
/// Returns `Config` error if the remote address is invalid
pub fn transport_from_config(config: &Config) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.link.mode {
        LinkMode::Serial => Box::new(serial::XbeeSerialTransport::new(
            &config.link.port,
            config.link.baud_rate,
            config.link.fallback_baud_rate,
            config.link.remote_address_u64()?,
        )),
        LinkMode::Udp => Box::new(udp::UdpTransport::new(&config.udp)),
    };
    Ok(transport)
}


#[cfg(test)]
mod tests {
    use super::mocks::RecordingTransport;
    use super::*;
    use std::io;

    #[tokio::test]
    async fn test_link_send_counts() {
        let transport = RecordingTransport::new();
        let mut link = Link::new(Box::new(transport.clone()));
        assert!(link.open().await);

        link.send(&[0xFE]).await.unwrap();
        link.send(&[0xAA, 0, 1]).await.unwrap();

        assert_eq!(transport.get_sent_frames(), vec![vec![0xFE], vec![0xAA, 0, 1]]);
        assert_eq!(link.statistics().sent, 2);
        assert_eq!(link.statistics().received, 0);
    }

    #[tokio::test]
    async fn test_failed_open_disables_link() {
        let transport = RecordingTransport::new();
        transport.set_open_error(io::ErrorKind::NotFound);
        let mut link = Link::new(Box::new(transport.clone()));

        assert!(!link.open().await);
        assert!(matches!(link.send(&[0xFE]).await, Err(BaseStationError::LinkDisabled)));
        assert!(transport.get_sent_frames().is_empty());
        assert!(link.take_receiver().is_none());
    }

    #[tokio::test]
    async fn test_send_failure_counted() {
        let transport = RecordingTransport::new();
        let mut link = Link::new(Box::new(transport.clone()));
        link.open().await;

        transport.set_send_error(Some(io::ErrorKind::BrokenPipe));
        assert!(link.send(&[0xFE]).await.is_err());

        let stats = link.statistics();
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.send_failures, 1);
    }

    #[tokio::test]
    async fn test_close_only_once() {
        let mut mock = MockTransport::new();
        mock.expect_open().times(1).returning(|| Ok(()));
        mock.expect_close().times(1).returning(|| Ok(()));
        mock.expect_describe().returning(|| "mock".to_string());

        let mut link = Link::new(Box::new(mock));
        link.open().await;
        link.close().await;
        link.close().await;
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn test_close_without_open_is_noop() {
        let mut mock = MockTransport::new();
        mock.expect_close().times(0);
        mock.expect_describe().returning(|| "mock".to_string());

        let mut link = Link::new(Box::new(mock));
        link.close().await;
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = LinkStats::default();
        stats.record_sent();
        stats.record_received();
        stats.record_received();
        assert_eq!(
            stats.snapshot(),
            Statistics {
                sent: 1,
                received: 2,
                send_failures: 0
            }
        );
    }

    #[test]
    fn test_transport_from_config() {
        let mut config = Config::default();
        assert_eq!(
            transport_from_config(&config).unwrap().describe(),
            "XBee /dev/ttyUSB0 -> 0013A200423A7DDD"
        );

        config.link.mode = LinkMode::Udp;
        assert_eq!(
            transport_from_config(&config).unwrap().describe(),
            "UDP 127.0.0.1:5000 -> 127.0.0.1:5001"
        );
    }
}
