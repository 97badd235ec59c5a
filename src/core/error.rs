//! Error types for the transfer-and-verify session
//!
//! Transport and format errors abort a session. Integrity errors are
//! recorded per chunk and verification carries on with the rest.

use std::net::SocketAddr;
use thiserror::Error;

/// Failures on the TCP connection
#[derive(Debug, Error)]
pub enum TransportError {
    /// Listener could not be bound (port already taken, bad address)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Transmitter could not reach the receiver
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O failed during a stage
    #[error("Socket error while {stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Peer closed the connection before the stage completed
    #[error("Connection closed by peer while {stage}")]
    ConnectionClosed { stage: &'static str },

    /// No acknowledgment arrived within the ack timeout
    #[error("Timed out waiting for acknowledgment of {stage}")]
    AckTimeout { stage: &'static str },

    /// A length-prefixed frame stopped short of its declared length
    #[error("Partial frame while {stage}: expected {expected} bytes, received {received}")]
    PartialFrame {
        stage: &'static str,
        expected: usize,
        received: usize,
    },

    /// `run` called again on a receiver whose listener is already spent
    #[error("Receiver has already accepted its one connection")]
    AlreadyRun,

    /// A length-prefixed frame announced more than the configured limit
    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },
}

/// Manifest or chunk blob that cannot be parsed or encoded
#[derive(Debug, Error)]
pub enum FormatError {
    /// Manifest line that is not a 40-character hex digest
    #[error("Manifest line {line} is not a SHA-1 hex digest: {value:?}")]
    InvalidDigest { line: usize, value: String },

    /// Chunk payload contains the record terminator and would split raggedly
    #[error("Chunk {position} contains the record terminator at byte {offset}")]
    TerminatorInChunk { position: usize, offset: usize },

    /// Chunk and hash sequences handed to the encoder are not aligned
    #[error("Chunker produced {hashes} hashes for {chunks} chunks")]
    Misaligned { hashes: usize, chunks: usize },
}

/// Per-chunk verification failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    /// Position present in only one of manifest and blob
    #[error(
        "Chunk {position} has no counterpart: manifest has {manifest_len} records, blob has {chunk_len} chunks"
    )]
    Unpaired {
        position: usize,
        manifest_len: usize,
        chunk_len: usize,
    },

    /// Reference hash could not be computed for a chunk
    #[error("Reference hash failed for chunk {position}: {reason}")]
    Oracle { position: usize, reason: String },
}

impl IntegrityError {
    /// 1-based chunk position this error belongs to
    pub fn position(&self) -> usize {
        match self {
            Self::Unpaired { position, .. } | Self::Oracle { position, .. } => *position,
        }
    }
}

/// Reference-hash command failure
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Unparseable digest output: {0:?}")]
    BadOutput(String),

    #[error("Scratch file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that aborts a whole session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Format(#[from] FormatError),
}
