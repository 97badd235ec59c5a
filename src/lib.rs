//! sha1bench library root
//!
//! Chunking, transfer and verification for the SHA-1 benchmark.

pub mod config;
pub mod core;
pub mod report;
pub mod util;

pub use config::Config;
