//! Core module
//!
//! Chunk hashing, the transfer protocol and verification.

pub mod chunker;
pub mod error;
pub mod manifest;
pub mod transfer;
pub mod verify;
