//! Manifest and chunk blob formats
//!
//! Both files are sequences of records, each followed by the record
//! terminator. Positions in the manifest line up with positions in the
//! blob; nothing else links them.

use super::chunker::{Chunk, ChunkSet, HashRecord};
use super::error::FormatError;
use serde::{Deserialize, Serialize};

/// Length of a hex-encoded SHA-1 digest
pub const DIGEST_HEX_LEN: usize = 40;

/// Byte that ends each record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordTerminator {
    /// Carriage return, what the legacy transmitter writes
    #[default]
    Cr,
    /// Line feed
    Lf,
}

impl RecordTerminator {
    pub fn byte(self) -> u8 {
        match self {
            Self::Cr => b'\r',
            Self::Lf => b'\n',
        }
    }
}

/// Check and normalise a single hex digest
pub fn parse_digest(value: &str) -> Option<HashRecord> {
    if value.len() == DIGEST_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(HashRecord::from_hex(value.to_ascii_lowercase()))
    } else {
        None
    }
}

/// Ordered hash records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    records: Vec<HashRecord>,
}

impl Manifest {
    pub fn new(records: Vec<HashRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[HashRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 0-based index of the first record equal to `digest`
    pub fn first_index_of(&self, digest: &str) -> Option<usize> {
        self.records.iter().position(|r| r.as_str() == digest)
    }

    /// Parse manifest bytes
    ///
    /// CR, LF and CRLF all end a line. Blank lines are skipped.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut records = Vec::new();

        for (line_no, raw) in lines(bytes) {
            let line = String::from_utf8_lossy(raw);
            let value = line.trim();
            if value.is_empty() {
                continue;
            }
            match parse_digest(value) {
                Some(record) => records.push(record),
                None => {
                    return Err(FormatError::InvalidDigest {
                        line: line_no,
                        value: value.to_string(),
                    });
                }
            }
        }

        Ok(Self { records })
    }

    /// Render one record per line
    pub fn to_bytes(&self, terminator: RecordTerminator) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.records.len() * (DIGEST_HEX_LEN + 1));
        for record in &self.records {
            out.extend_from_slice(record.as_str().as_bytes());
            out.push(terminator.byte());
        }
        out
    }
}

/// Split on CR, LF or CRLF, yielding 1-based line numbers
fn lines(bytes: &[u8]) -> Vec<(usize, &[u8])> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\r' | b'\n' => {
                out.push((out.len() + 1, &bytes[start..i]));
                if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < bytes.len() {
        out.push((out.len() + 1, &bytes[start..]));
    }
    out
}

/// Encode chunk payloads into a blob, one record per chunk
///
/// The terminator after the last chunk marks end of input.
pub fn encode_blob(chunks: &[Chunk], terminator: RecordTerminator) -> Result<Vec<u8>, FormatError> {
    let term = terminator.byte();
    let mut out = Vec::with_capacity(chunks.iter().map(|c| c.data.len() + 1).sum());

    for chunk in chunks {
        if let Some(offset) = chunk.data.iter().position(|b| *b == term) {
            return Err(FormatError::TerminatorInChunk {
                position: chunk.position,
                offset,
            });
        }
        out.extend_from_slice(&chunk.data);
        out.push(term);
    }

    Ok(out)
}

/// Split a blob back into chunks on the same terminator
///
/// Empty records inside the blob are kept as real positions. A final empty
/// record is the end-of-input sentinel legacy transmitters write after the
/// last chunk (`...\r\r`, or a lone `\r` for an empty source) and is dropped.
pub fn decode_blob(bytes: &[u8], terminator: RecordTerminator) -> Vec<Chunk> {
    if bytes.is_empty() {
        return Vec::new();
    }

    let mut pieces: Vec<&[u8]> = bytes.split(|b| *b == terminator.byte()).collect();
    // trailing terminator leaves one empty piece behind
    if bytes.last() == Some(&terminator.byte()) {
        pieces.pop();
    }
    if pieces.last().is_some_and(|p| p.is_empty()) {
        pieces.pop();
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, data)| Chunk {
            position: i + 1,
            data: data.to_vec(),
        })
        .collect()
}

/// Encode both files for a chunk set
pub fn encode_chunk_set(
    set: &ChunkSet,
    terminator: RecordTerminator,
) -> Result<(Vec<u8>, Vec<u8>), FormatError> {
    if set.hashes.len() != set.chunks.len() {
        return Err(FormatError::Misaligned {
            hashes: set.hashes.len(),
            chunks: set.chunks.len(),
        });
    }
    let manifest = Manifest::new(set.hashes.clone()).to_bytes(terminator);
    let blob = encode_blob(&set.chunks, terminator)?;
    Ok((manifest, blob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunker::chunk_and_hash;

    const HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    #[test]
    fn test_parse_accepts_all_line_endings() {
        let text = format!("{HELLO}\r{HELLO}\n{HELLO}\r\n");
        let manifest = Manifest::parse(text.as_bytes()).unwrap();
        assert_eq!(manifest.len(), 3);
    }

    #[test]
    fn test_parse_normalises_case() {
        let manifest = Manifest::parse(HELLO.to_uppercase().as_bytes()).unwrap();
        assert_eq!(manifest.records()[0].as_str(), HELLO);
    }

    #[test]
    fn test_parse_rejects_non_hex_with_line_number() {
        let text = format!("{HELLO}\r\nnot-a-digest\r\n");
        match Manifest::parse(text.as_bytes()) {
            Err(FormatError::InvalidDigest { line, value }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "not-a-digest");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_short_digest() {
        assert!(Manifest::parse(b"abcdef\n").is_err());
    }

    #[test]
    fn test_empty_manifest() {
        assert!(Manifest::parse(b"").unwrap().is_empty());
        assert!(Manifest::default().to_bytes(RecordTerminator::Cr).is_empty());
    }

    #[test]
    fn test_first_index_of_prefers_earliest() {
        let record = parse_digest(HELLO).unwrap();
        let manifest = Manifest::new(vec![record.clone(), record]);
        assert_eq!(manifest.first_index_of(HELLO), Some(0));
        assert_eq!(manifest.first_index_of("0".repeat(40).as_str()), None);
    }

    #[test]
    fn test_blob_split_matches_chunker() {
        let source = b"line one\nline two\nline three\n";
        let set = chunk_and_hash(&source[..], 7).unwrap();
        let (manifest, blob) = encode_chunk_set(&set, RecordTerminator::Cr).unwrap();

        assert_eq!(Manifest::parse(&manifest).unwrap().records(), &set.hashes[..]);
        assert_eq!(decode_blob(&blob, RecordTerminator::Cr), set.chunks);
    }

    #[test]
    fn test_terminator_inside_chunk_is_rejected() {
        let set = chunk_and_hash(&b"one\ntwo"[..], 16).unwrap();
        match encode_chunk_set(&set, RecordTerminator::Lf) {
            Err(FormatError::TerminatorInChunk { position, offset }) => {
                assert_eq!(position, 1);
                assert_eq!(offset, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_crlf_source_round_trips_once_normalised() {
        use crate::core::chunker::UniversalNewlines;

        let source = b"first line\r\nsecond line\r\nthird\r\n";
        let set = chunk_and_hash(UniversalNewlines::new(&source[..]), 8).unwrap();
        let (manifest, blob) = encode_chunk_set(&set, RecordTerminator::Cr).unwrap();

        let chunks = decode_blob(&blob, RecordTerminator::Cr);
        assert_eq!(Manifest::parse(&manifest).unwrap().len(), chunks.len());
        let rebuilt: Vec<u8> = chunks.into_iter().flat_map(|c| c.data).collect();
        assert_eq!(rebuilt, b"first line\nsecond line\nthird\n");
    }

    #[test]
    fn test_decode_keeps_empty_records() {
        let chunks = decode_blob(b"a\r\rb\r", RecordTerminator::Cr);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].data.is_empty());
        assert_eq!(chunks[2].position, 3);
    }

    #[test]
    fn test_decode_without_trailing_terminator() {
        let chunks = decode_blob(b"a\rb", RecordTerminator::Cr);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].data, b"b");
    }

    #[test]
    fn test_decode_drops_end_of_input_sentinel() {
        let chunks = decode_blob(b"abcd\refgh\r\r", RecordTerminator::Cr);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].data, b"abcd");
        assert_eq!(chunks[1].data, b"efgh");

        assert!(decode_blob(b"\r", RecordTerminator::Cr).is_empty());
    }

    #[test]
    fn test_legacy_sentinel_blob_verifies_cleanly() {
        use crate::core::verify::{BuiltinHasher, Verifier};

        let set = chunk_and_hash(&b"abcdefgh"[..], 4).unwrap();
        let manifest = Manifest::new(set.hashes.clone());
        let mut legacy = encode_blob(&set.chunks, RecordTerminator::Cr).unwrap();
        legacy.push(b'\r');

        let chunks = decode_blob(&legacy, RecordTerminator::Cr);
        let verification = Verifier::new(BuiltinHasher).verify(&manifest, &chunks).unwrap();
        assert_eq!(verification.matched(), 2);
        assert!(verification.is_clean());

        let empty = decode_blob(b"\r", RecordTerminator::Cr);
        let verification = Verifier::new(BuiltinHasher)
            .verify(&Manifest::default(), &empty)
            .unwrap();
        assert!(verification.outcomes().is_empty());
    }

    #[test]
    fn test_empty_blob_has_no_chunks() {
        assert!(decode_blob(b"", RecordTerminator::Lf).is_empty());
    }
}
