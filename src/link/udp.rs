//! # UDP Simulation Transport
//!
//! Replaces the radio with loopback datagrams so the base station can drive
//! a rover simulator. Frames go from `local_port` to `rover_port`; the rover
//! answers on `telemetry_port`. Each datagram carries exactly one frame.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::{FrameSource, Transport};
use crate::config::UdpConfig;
use crate::error::{BaseStationError, Result};
use crate::protocol::constants::MESSAGE_HEADER_LEN;

/// Largest datagram accepted from the rover: a full header plus the longest
/// payload its length field can describe
const MAX_DATAGRAM: usize = MESSAGE_HEADER_LEN + u16::MAX as usize;

/// UDP transport to a rover simulator
#[derive(Debug)]
pub struct UdpTransport {
    host: String,
    local_port: u16,
    rover_port: u16,
    telemetry_port: u16,
    socket: Option<UdpSocket>,
    telemetry: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(config: &UdpConfig) -> Self {
        Self {
            host: config.host.clone(),
            local_port: config.local_port,
            rover_port: config.rover_port,
            telemetry_port: config.telemetry_port,
            socket: None,
            telemetry: None,
        }
    }

    /// Address the telemetry socket is bound to, once open
    pub fn telemetry_addr(&self) -> Option<SocketAddr> {
        self.telemetry.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Address outbound frames are sent from, once open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn open(&mut self) -> Result<()> {
        let socket = UdpSocket::bind((self.host.as_str(), self.local_port)).await?;
        socket.connect((self.host.as_str(), self.rover_port)).await?;

        let telemetry = UdpSocket::bind((self.host.as_str(), self.telemetry_port)).await?;
        info!(
            "UDP sending to {}:{}, receiving on {}",
            self.host,
            self.rover_port,
            telemetry.local_addr()?
        );

        self.socket = Some(socket);
        self.telemetry = Some(telemetry);
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(BaseStationError::LinkDisabled)?;
        let sent = socket.send(frame).await?;
        if sent != frame.len() {
            return Err(BaseStationError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("Short datagram: {} of {} bytes", sent, frame.len()),
            )));
        }
        debug!("Sent {} byte datagram", sent);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.socket = None;
        self.telemetry = None;
        Ok(())
    }

    fn take_receiver(&mut self) -> Option<Box<dyn FrameSource>> {
        let socket = self.telemetry.take()?;
        Some(Box::new(UdpFrameSource {
            socket,
            buf: vec![0u8; MAX_DATAGRAM],
        }))
    }

    fn describe(&self) -> String {
        format!(
            "UDP {}:{} -> {}:{}",
            self.host, self.local_port, self.host, self.rover_port
        )
    }
}

/// Receive half: one frame per datagram
#[derive(Debug)]
pub struct UdpFrameSource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

#[async_trait]
impl FrameSource for UdpFrameSource {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        let (n, from) = self.socket.recv_from(&mut self.buf).await?;
        debug!("Received {} byte datagram from {}", n, from);
        Ok(self.buf[..n].to_vec())
    }
}
