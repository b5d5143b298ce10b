//! # XBee Serial Transport
//!
//! Talks to a local XBee radio in API mode over a USB serial port.
//!
//! Outbound frames are wrapped in Transmit Request frames addressed to the
//! rover's radio. The receive half reassembles API frames from the serial
//! stream and yields the RF data of Receive Packet frames.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use super::{FrameSource, Transport};
use crate::error::{BaseStationError, Result};
use crate::xbee::api::{FRAME_TYPE_RECEIVE_PACKET, FRAME_TYPE_TRANSMIT_STATUS};
use crate::xbee::frame::{
    encode_transmit_request, parse_receive_packet, parse_transmit_status, FrameReassembler,
};

/// Frame id 0: the radio sends no Transmit Status back
const NO_STATUS_FRAME_ID: u8 = 0;

/// Read buffer size for the receive half
const READ_CHUNK: usize = 256;

/// Trait for serial port write operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Write half of a tokio-serial stream
pub struct SerialWriter {
    port: WriteHalf<SerialStream>,
}

#[async_trait]
impl SerialPortIO for SerialWriter {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}

/// XBee radio on a serial port
pub struct XbeeSerialTransport {
    port_path: String,
    baud_rate: u32,
    fallback_baud_rate: u32,
    destination: u64,
    writer: Option<Box<dyn SerialPortIO>>,
    reader: Option<ReadHalf<SerialStream>>,
}

impl std::fmt::Debug for XbeeSerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XbeeSerialTransport")
            .field("port_path", &self.port_path)
            .field("destination", &format_args!("{:016X}", self.destination))
            .finish_non_exhaustive()
    }
}

impl XbeeSerialTransport {
    /// Create a closed transport
    ///
    /// # Arguments
    ///
    /// * `port_path` - Serial device (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate tried first
    /// * `fallback_baud_rate` - Baud rate tried if the first fails
    /// * `destination` - 64-bit address of the rover's radio
    pub fn new(port_path: &str, baud_rate: u32, fallback_baud_rate: u32, destination: u64) -> Self {
        Self {
            port_path: port_path.to_string(),
            baud_rate,
            fallback_baud_rate,
            destination,
            writer: None,
            reader: None,
        }
    }

    /// Create an already-open transport over an arbitrary writer
    pub fn with_writer(writer: Box<dyn SerialPortIO>, destination: u64) -> Self {
        Self {
            port_path: "(injected)".to_string(),
            baud_rate: 0,
            fallback_baud_rate: 0,
            destination,
            writer: Some(writer),
            reader: None,
        }
    }

    /// Open a specific serial port at 8N1 without flow control
    fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| BaseStationError::Serial(format!("Failed to open {}: {}", path, e)))
    }
}

#[async_trait]
impl Transport for XbeeSerialTransport {
    async fn open(&mut self) -> Result<()> {
        let mut tried = Vec::new();
        let mut stream = None;

        for baud in [self.baud_rate, self.fallback_baud_rate] {
            if tried.contains(&baud) {
                continue;
            }
            tried.push(baud);
            debug!("Trying {} at {} baud", self.port_path, baud);

            match Self::open_port(&self.port_path, baud) {
                Ok(port) => {
                    info!("Opened XBee at {} ({} baud)", self.port_path, baud);
                    stream = Some(port);
                    break;
                }
                Err(e) => warn!("{}", e),
            }
        }

        let stream = stream.ok_or_else(|| {
            let bauds: Vec<String> = tried.iter().map(|b| format!("{}@{}", self.port_path, b)).collect();
            BaseStationError::SerialPortNotFound(bauds.join(", "))
        })?;

        let (reader, writer) = tokio::io::split(stream);
        self.writer = Some(Box::new(SerialWriter { port: writer }));
        self.reader = Some(reader);
        Ok(())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(BaseStationError::LinkDisabled)?;
        let api_frame = encode_transmit_request(NO_STATUS_FRAME_ID, self.destination, frame)?;

        writer
            .write_all(&api_frame)
            .await
            .map_err(|e| BaseStationError::Serial(format!("Failed to write frame: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| BaseStationError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent {} bytes ({} on the wire)", frame.len(), api_frame.len());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .await
                .map_err(|e| BaseStationError::Serial(format!("Failed to flush on close: {}", e)))?;
        }
        self.reader = None;
        Ok(())
    }

    fn take_receiver(&mut self) -> Option<Box<dyn FrameSource>> {
        let reader = self.reader.take()?;
        Some(Box::new(XbeeFrameSource::new(reader)))
    }

    fn describe(&self) -> String {
        format!("XBee {} -> {:016X}", self.port_path, self.destination)
    }
}

/// Receive half: RF data of Receive Packet frames
pub struct XbeeFrameSource<R> {
    reader: R,
    reassembler: FrameReassembler,
}

impl<R: AsyncRead + Unpin + Send> XbeeFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            reassembler: FrameReassembler::new(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for XbeeFrameSource<R> {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            while let Some(next) = self.reassembler.next_frame() {
                let frame = match next {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Dropping corrupt API frame: {}", e);
                        continue;
                    }
                };

                match frame.frame_type {
                    FRAME_TYPE_RECEIVE_PACKET => return Ok(parse_receive_packet(&frame)?.data),
                    FRAME_TYPE_TRANSMIT_STATUS => {
                        if let Ok(status) = parse_transmit_status(&frame) {
                            debug!(
                                "Transmit status for frame {}: 0x{:02X}",
                                status.frame_id, status.delivery_status
                            );
                        }
                    }
                    other => debug!("Skipping API frame type 0x{:02X}", other),
                }
            }

            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(BaseStationError::LinkClosed);
            }
            self.reassembler.extend(&chunk[..n]);
        }
    }
}
