//! Report module
//!
//! Ordered, caller-owned buffer of human-readable lines. Lines are echoed
//! to stdout as they arrive and written to disk once at the end of a run.

use crate::core::error::IntegrityError;
use crate::core::manifest::RecordTerminator;
use crate::core::verify::{ChunkOutcome, MatchResult, Verification};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Which end of the session produced the report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Transmitter,
    Receiver,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Transmitter => "TRANSMITTER",
            Role::Receiver => "RECEIVER",
        }
    }
}

#[derive(Debug, Default)]
pub struct Report {
    lines: Vec<String>,
    echo: bool,
}

impl Report {
    pub fn new(echo: bool) -> Self {
        Self {
            lines: Vec::new(),
            echo,
        }
    }

    /// Start a report with the platform banner and a UTC timestamp
    pub fn with_header(platform: &str, role: Role, echo: bool) -> Self {
        let mut report = Self::new(echo);
        report.push(format!(
            "----- RESULTS FROM THE {} SHA-1 {} -----",
            platform.to_uppercase(),
            role.as_str()
        ));
        report.push(format!(
            "Run at: {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        report
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.echo {
            println!("{}", line);
        }
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Append every line to `path`, each followed by the terminator
    pub fn flush_to(&self, path: &Path, terminator: RecordTerminator) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        for line in &self.lines {
            file.write_all(line.as_bytes())?;
            file.write_all(&[terminator.byte()])?;
        }
        file.flush()?;
        tracing::info!("Report written to {:?}", path);
        Ok(())
    }

    /// `Execution time = ...` / `Elapsed time = ...` lines
    pub fn push_timing(&mut self, execution: Duration, elapsed: Duration) {
        self.push(format!(
            "Execution time = {:.8} seconds",
            execution.as_secs_f64()
        ));
        self.push(format!("Elapsed time = {:.8} seconds", elapsed.as_secs_f64()));
    }

    /// One line per outcome, then a summary
    pub fn push_verification(&mut self, verification: &Verification) {
        for outcome in verification.outcomes() {
            match outcome {
                ChunkOutcome::Checked(result) => self.push(render_match(result)),
                ChunkOutcome::Failed(err) => self.push(render_error(err)),
            }
        }
        self.push(format!(
            "Verified {} chunks: {} matched, {} mismatched, {} errors",
            verification.outcomes().len(),
            verification.matched(),
            verification.mismatched(),
            verification.error_count()
        ));
    }
}

pub fn render_match(result: &MatchResult) -> String {
    if result.matched {
        format!(
            "chunk {} hash has MATCHING value of {} (manifest position {})",
            result.chunk, result.reference_hash, result.position
        )
    } else {
        format!(
            "chunk {} hash DOES NOT MATCH: transmitted 0x{} reference 0x{}",
            result.chunk, result.transmitted_hash, result.reference_hash
        )
    }
}

pub fn render_error(err: &IntegrityError) -> String {
    format!("chunk {} INTEGRITY ERROR: {}", err.position(), err)
}

/// Machine-readable form of a verification
#[derive(Debug, Serialize)]
pub struct VerificationSummary<'a> {
    pub matched: usize,
    pub mismatched: usize,
    pub results: Vec<&'a MatchResult>,
    pub errors: Vec<String>,
}

impl<'a> VerificationSummary<'a> {
    pub fn new(verification: &'a Verification) -> Self {
        Self {
            matched: verification.matched(),
            mismatched: verification.mismatched(),
            results: verification.results().collect(),
            errors: verification.errors().map(|e| e.to_string()).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
