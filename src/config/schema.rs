//! Configuration schema
//!
//! Defines the structure of the configuration file.

use crate::core::chunker::DEFAULT_CHUNK_SIZE;
use crate::core::manifest::RecordTerminator;
use crate::core::transfer::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT, Framing, TransferOptions};
use crate::core::verify::ScratchMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hashing: HashingConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Config {
    /// Reject values that would make a session meaningless
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hashing.chunk_size == 0 {
            anyhow::bail!("hashing.chunk_size must be greater than zero");
        }
        if self.network.receive_timeout_secs == 0 {
            anyhow::bail!("network.receive_timeout_secs must be greater than zero");
        }
        if self.network.ack_timeout_secs == 0 {
            anyhow::bail!("network.ack_timeout_secs must be greater than zero");
        }
        if self.network.recv_buffer == 0 {
            anyhow::bail!("network.recv_buffer must be greater than zero");
        }
        if self.oracle.kind == OracleKind::Command && self.oracle.program.trim().is_empty() {
            anyhow::bail!("oracle.program must name a command");
        }
        Ok(())
    }

    /// Transfer options with the receiver's file names in the acks
    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            framing: self.network.framing,
            receive_timeout: Duration::from_secs(self.network.receive_timeout_secs),
            ack_timeout: Duration::from_secs(self.network.ack_timeout_secs),
            recv_buffer: self.network.recv_buffer,
            max_frame_size: self.network.max_frame_size,
            manifest_label: self.files.manifest_name.clone(),
            payload_label: self.files.receive_blob_name.clone(),
        }
    }
}

/// Chunking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Bytes per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Byte ending each manifest and blob record
    #[serde(default)]
    pub record_terminator: RecordTerminator,

    /// Read the source as text, turning CR and CRLF into LF
    #[serde(default = "default_normalize_newlines")]
    pub normalize_newlines: bool,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            record_terminator: RecordTerminator::default(),
            normalize_newlines: default_normalize_newlines(),
        }
    }
}

/// Network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Silence that ends a sub-transfer, in seconds
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_secs: u64,

    /// How long the transmitter waits for an acknowledgment, in seconds
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_secs: u64,

    /// Bytes per socket read
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,

    #[serde(default)]
    pub framing: Framing,

    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            receive_timeout_secs: default_receive_timeout(),
            ack_timeout_secs: default_ack_timeout(),
            recv_buffer: default_recv_buffer(),
            framing: Framing::default(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Where manifests, blobs and reports are written
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    #[serde(default = "default_transmit_blob_name")]
    pub transmit_blob_name: String,

    #[serde(default = "default_receive_blob_name")]
    pub receive_blob_name: String,

    #[serde(default = "default_results_name_tx")]
    pub results_name_tx: String,

    #[serde(default = "default_results_name_rx")]
    pub results_name_rx: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            manifest_name: default_manifest_name(),
            transmit_blob_name: default_transmit_blob_name(),
            receive_blob_name: default_receive_blob_name(),
            results_name_tx: default_results_name_tx(),
            results_name_rx: default_results_name_rx(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// External digest command
    #[default]
    Command,
    /// In-process SHA-1
    Builtin,
}

/// Reference hashing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub kind: OracleKind,

    #[serde(default = "default_program")]
    pub program: String,

    /// Extra arguments placed before the file path
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub scratch: ScratchMode,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::default(),
            program: default_program(),
            args: Vec::new(),
            scratch: ScratchMode::default(),
        }
    }
}

// Default value functions for serde
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_normalize_newlines() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_receive_timeout() -> u64 {
    5
}
fn default_ack_timeout() -> u64 {
    30
}
fn default_recv_buffer() -> usize {
    1024
}
fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}
fn default_work_dir() -> PathBuf {
    crate::util::data_dir().join("work")
}
fn default_manifest_name() -> String {
    "hashes.txt".to_string()
}
fn default_transmit_blob_name() -> String {
    "send.txt".to_string()
}
fn default_receive_blob_name() -> String {
    "receive.txt".to_string()
}
fn default_results_name_tx() -> String {
    "SHA-1-results-tx.txt".to_string()
}
fn default_results_name_rx() -> String {
    "SHA-1-results-rx.txt".to_string()
}
fn default_program() -> String {
    "sha1sum".to_string()
}
