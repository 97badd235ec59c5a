//! CLI argument definitions
//!
//! Uses clap derive macros for argument parsing.

use clap::{Parser, Subcommand, ValueEnum};
use sha1bench::core::transfer::Framing;
use std::net::IpAddr;
use std::path::PathBuf;

/// sha1bench - SHA-1 chunk hashing benchmark with transfer and verification
#[derive(Parser, Debug)]
#[command(name = "sha1bench")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (default: ~/.sha1bench/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Platform name shown in the report banner
    #[arg(short, long, global = true, default_value = "host")]
    pub platform: String,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk and hash a source file, writing the manifest and blob
    Hash {
        /// Source text file
        source: PathBuf,
        /// Directory for the manifest, blob and report (default: work dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Bytes per chunk
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Hash a source file and send it to a receiver
    Transmit {
        /// Source text file
        source: PathBuf,
        /// Receiver address
        #[arg(long)]
        host: IpAddr,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, value_enum)]
        framing: Option<FramingArg>,
        /// Bytes per chunk
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Wait for one transmitter, then verify what it sent
    Receive {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long, value_enum)]
        framing: Option<FramingArg>,
        /// Seconds of silence that end a sub-transfer
        #[arg(long)]
        timeout: Option<u64>,
        /// Also print a JSON summary
        #[arg(long)]
        json: bool,
    },

    /// Verify a previously received manifest and blob
    Verify {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        blob: PathBuf,
        /// Also print a JSON summary
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FramingArg {
    Legacy,
    LengthPrefixed,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Legacy => Framing::Legacy,
            FramingArg::LengthPrefixed => Framing::LengthPrefixed,
        }
    }
}
