//! Verifier
//!
//! Writes each received chunk to a scratch file, asks a [`ReferenceHasher`]
//! for its digest, and looks that digest up in the manifest by value.
//!
//! Lookup is by value, not position: when the manifest holds the same
//! digest twice, a match always reports the first index.

mod oracle;

pub use oracle::{BuiltinHasher, CommandHasher, ReferenceHasher, parse_oracle_output};

use super::chunker::Chunk;
use super::error::IntegrityError;
use super::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What each scratch file contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScratchMode {
    /// Chunks 1..=N, the same bytes manifest digest N covers
    #[default]
    Cumulative,
    /// Chunk N alone
    Chunk,
}

/// Outcome of reconciling one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Chunk that was hashed (1-based)
    pub chunk: usize,
    /// Manifest index of the first equal digest on a match, else the chunk's own position
    pub position: usize,
    pub matched: bool,
    pub transmitted_hash: String,
    pub reference_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Checked(MatchResult),
    Failed(IntegrityError),
}

/// Ordered outcomes, one per position in the longer of manifest and blob
#[derive(Debug, Clone, Default)]
pub struct Verification {
    outcomes: Vec<ChunkOutcome>,
}

impl Verification {
    pub fn outcomes(&self) -> &[ChunkOutcome] {
        &self.outcomes
    }

    pub fn results(&self) -> impl Iterator<Item = &MatchResult> {
        self.outcomes.iter().filter_map(|o| match o {
            ChunkOutcome::Checked(result) => Some(result),
            ChunkOutcome::Failed(_) => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &IntegrityError> {
        self.outcomes.iter().filter_map(|o| match o {
            ChunkOutcome::Failed(err) => Some(err),
            ChunkOutcome::Checked(_) => None,
        })
    }

    pub fn matched(&self) -> usize {
        self.results().filter(|r| r.matched).count()
    }

    pub fn mismatched(&self) -> usize {
        self.results().filter(|r| !r.matched).count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Every position checked and matched
    pub fn is_clean(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o, ChunkOutcome::Checked(r) if r.matched))
    }
}

pub struct Verifier<H> {
    hasher: H,
    mode: ScratchMode,
    scratch_root: Option<PathBuf>,
}

impl<H: ReferenceHasher> Verifier<H> {
    pub fn new(hasher: H) -> Self {
        Self {
            hasher,
            mode: ScratchMode::default(),
            scratch_root: None,
        }
    }

    pub fn with_mode(mut self, mode: ScratchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Create scratch directories under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Reconcile received chunks against the manifest
    ///
    /// Only failing to create the scratch directory aborts; everything
    /// else is recorded per position.
    pub fn verify(&self, manifest: &Manifest, chunks: &[Chunk]) -> std::io::Result<Verification> {
        let scratch = match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new()
                    .prefix("associative-hashes-")
                    .tempdir_in(root)?
            }
            None => tempfile::Builder::new()
                .prefix("associative-hashes-")
                .tempdir()?,
        };
        tracing::debug!("Scratch directory {}", scratch.path().display());

        let paired = manifest.len().min(chunks.len());
        let total = manifest.len().max(chunks.len());
        if manifest.len() != chunks.len() {
            tracing::warn!(
                "Manifest has {} records but blob has {} chunks",
                manifest.len(),
                chunks.len()
            );
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut prefix = Vec::new();

        for (idx, chunk) in chunks.iter().take(paired).enumerate() {
            let position = idx + 1;
            let contents = match self.mode {
                ScratchMode::Cumulative => {
                    prefix.extend_from_slice(&chunk.data);
                    &prefix[..]
                }
                ScratchMode::Chunk => &chunk.data[..],
            };

            let path = scratch.path().join(format!("text-of-hashes-{}.txt", position));
            let reference = write_scratch(&path, contents)
                .map_err(|e| e.to_string())
                .and_then(|_| {
                    self.hasher
                        .reference_digest(&path)
                        .map_err(|e| e.to_string())
                });
            // already hashed, and cumulative files grow with every chunk
            let _ = std::fs::remove_file(&path);

            let outcome = match reference {
                Ok(reference) => ChunkOutcome::Checked(self.reconcile(manifest, position, reference)),
                Err(reason) => {
                    tracing::warn!("Reference hash failed for chunk {}: {}", position, reason);
                    ChunkOutcome::Failed(IntegrityError::Oracle { position, reason })
                }
            };
            outcomes.push(outcome);
        }

        for position in paired + 1..=total {
            outcomes.push(ChunkOutcome::Failed(IntegrityError::Unpaired {
                position,
                manifest_len: manifest.len(),
                chunk_len: chunks.len(),
            }));
        }

        Ok(Verification { outcomes })
    }

    fn reconcile(&self, manifest: &Manifest, chunk: usize, reference: String) -> MatchResult {
        match manifest.first_index_of(&reference) {
            Some(idx) => {
                tracing::debug!("Chunk {} matches manifest position {}", chunk, idx + 1);
                MatchResult {
                    chunk,
                    position: idx + 1,
                    matched: true,
                    transmitted_hash: manifest.records()[idx].as_str().to_string(),
                    reference_hash: reference,
                }
            }
            None => {
                let transmitted = manifest.records()[chunk - 1].as_str().to_string();
                tracing::warn!(
                    "Chunk {} hash not found: transmitted {} reference {}",
                    chunk,
                    transmitted,
                    reference
                );
                MatchResult {
                    chunk,
                    position: chunk,
                    matched: false,
                    transmitted_hash: transmitted,
                    reference_hash: reference,
                }
            }
        }
    }
}

/// Write and close one scratch file
///
/// No fsync: the oracle reads it back through the page cache.
fn write_scratch(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
