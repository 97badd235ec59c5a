//! Transfer protocol
//!
//! One TCP connection carries two sub-transfers, manifest then chunk blob.
//! The receiver acknowledges each one before the transmitter moves on.

mod framing;
mod receiver;
mod transmitter;

pub use framing::{Frame, Stop, fill, read_frame, read_until_quiet, write_frame};
pub use receiver::{ReceivedFiles, Receiver, ReceiverState};
pub use transmitter::{Acknowledgments, Transmitter, TransmitterState};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port the receiver listens on by default
pub const DEFAULT_PORT: u16 = 64321;

/// Largest length-prefixed frame accepted by default (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// How sub-transfer boundaries are marked on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Raw bytes; a sub-transfer ends on peer close or read timeout
    #[default]
    Legacy,
    /// 4-byte big-endian length before every payload and ack
    LengthPrefixed,
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::Legacy => write!(f, "legacy"),
            Framing::LengthPrefixed => write!(f, "length-prefixed"),
        }
    }
}

/// Knobs shared by both ends of a session
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub framing: Framing,
    /// Silence that ends a sub-transfer on the receiver
    pub receive_timeout: Duration,
    /// How long the transmitter waits for each acknowledgment
    pub ack_timeout: Duration,
    /// Size of each socket read
    pub recv_buffer: usize,
    pub max_frame_size: usize,
    /// Names echoed in the acknowledgments
    pub manifest_label: String,
    pub payload_label: String,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            framing: Framing::Legacy,
            receive_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(30),
            recv_buffer: 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            manifest_label: "hashes.txt".to_string(),
            payload_label: "receive.txt".to_string(),
        }
    }
}

/// Acknowledgment text for a received file
pub fn ack_message(label: &str) -> String {
    format!("Successfully received {}", label)
}

/// Socket timeouts must be non-zero
pub(crate) fn nonzero(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}
