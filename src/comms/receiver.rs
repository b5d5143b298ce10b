//! # Receive Loop
//!
//! Reads frames from the link's receive half, decodes them as extensible
//! messages and forwards them to the control loop. Malformed frames are
//! logged and skipped; the loop ends when the link closes, the consumer
//! goes away, or reads keep failing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::error::BaseStationError;
use crate::link::{FrameSource, LinkStats};
use crate::protocol::constants::{HEARTBEAT_BYTE, HEARTBEAT_FRAME_LEN};
use crate::protocol::legacy;
use crate::protocol::message::{decode_gps, Message, MessageCodec, MessageType};

/// Pause after a failed read before trying again
pub const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Consecutive failed reads after which the source is treated as dead
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Codec used for inbound frames: the default registry plus GPS
pub fn inbound_codec() -> MessageCodec {
    let mut codec = MessageCodec::new();
    codec.register(MessageType::GPS_DATA, decode_gps);
    codec
}

/// Run the receive loop until the link closes or `tx` is dropped
///
/// Bare 3-byte heartbeats from the rover are logged, not forwarded. A failed
/// read waits [`RECEIVE_RETRY_DELAY`]; after [`MAX_CONSECUTIVE_ERRORS`] in a
/// row the loop gives up.
pub async fn run(
    mut source: Box<dyn FrameSource>,
    codec: MessageCodec,
    stats: Arc<LinkStats>,
    tx: mpsc::Sender<Message>,
) {
    let mut failures = 0u32;
    loop {
        let frame = match source.receive().await {
            Ok(frame) => {
                failures = 0;
                frame
            }
            Err(BaseStationError::LinkClosed) => {
                info!("Receive loop stopped: link closed");
                break;
            }
            Err(e) => {
                failures += 1;
                if failures >= MAX_CONSECUTIVE_ERRORS {
                    error!("Receive loop stopped after {} failed reads: {}", failures, e);
                    break;
                }
                warn!("Receive error ({}/{}): {}", failures, MAX_CONSECUTIVE_ERRORS, e);
                sleep(RECEIVE_RETRY_DELAY).await;
                continue;
            }
        };

        if frame.len() == HEARTBEAT_FRAME_LEN && frame[0] == HEARTBEAT_BYTE {
            if let Ok(fragment) = legacy::parse_heartbeat(&frame) {
                stats.record_received();
                debug!("Rover heartbeat (t=0x{:04X})", fragment);
            }
            continue;
        }

        match codec.decode(&frame) {
            Ok(message) => {
                stats.record_received();
                debug!("Received {} message id={}", message.message_type(), message.id);
                if tx.send(message).await.is_err() {
                    debug!("Receive loop stopped: consumer gone");
                    break;
                }
            }
            Err(e) => warn!("Dropping malformed frame ({} bytes): {}", frame.len(), e),
        }
    }
}

/// Spawn [`run`] on the current runtime
pub fn spawn(
    source: Box<dyn FrameSource>,
    codec: MessageCodec,
    stats: Arc<LinkStats>,
    tx: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(run(source, codec, stats, tx))
}
