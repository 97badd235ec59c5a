//! Chunker and cumulative hasher
//!
//! Reads a source in fixed-size chunks and feeds every chunk into one
//! running SHA-1 context. Digest N covers chunks 1..=N.

use sha1::{Digest, Sha1};
use std::io::{self, Read};

/// Chunk size used by the reference build
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// One chunk of source text (1-indexed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub position: usize,
    pub data: Vec<u8>,
}

/// Hex SHA-1 digest of all chunks absorbed so far
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashRecord(String);

impl HashRecord {
    /// Wrap an already-validated lowercase hex digest
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HashRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lazy iterator of `(HashRecord, Chunk)` pairs over a reader
///
/// Stops at the first empty read. That terminal read is not hashed.
pub struct Chunker<R> {
    reader: R,
    chunk_size: usize,
    hasher: Sha1,
    position: usize,
    done: bool,
}

impl<R: Read> Chunker<R> {
    /// A zero chunk size is treated as 1
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            hasher: Sha1::new(),
            position: 0,
            done: false,
        }
    }

    /// Number of chunks emitted so far
    pub fn emitted(&self) -> usize {
        self.position
    }

    /// Fill a buffer up to `chunk_size`, retrying short reads
    fn read_chunk(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

impl<R: Read> Iterator for Chunker<R> {
    type Item = io::Result<(HashRecord, Chunk)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let data = match self.read_chunk() {
            Ok(data) => data,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        if data.is_empty() {
            self.done = true;
            tracing::debug!("End of input after {} chunks", self.position);
            return None;
        }

        self.hasher.update(&data);
        // finalize on a clone so the running context keeps absorbing
        let digest = format!("{:x}", self.hasher.clone().finalize());
        self.position += 1;

        Some(Ok((
            HashRecord::from_hex(digest),
            Chunk {
                position: self.position,
                data,
            },
        )))
    }
}

/// Reader that turns CRLF and lone CR into LF
///
/// Text sources are read this way so no CR ever lands inside a chunk,
/// where it would collide with the CR record terminator.
pub struct UniversalNewlines<R> {
    inner: R,
    after_cr: bool,
}

impl<R: Read> UniversalNewlines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            after_cr: false,
        }
    }
}

impl<R: Read> Read for UniversalNewlines<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }

            // compact in place; the write index never passes the read index
            let mut out = 0;
            for i in 0..n {
                let byte = buf[i];
                if self.after_cr {
                    self.after_cr = false;
                    if byte == b'\n' {
                        continue;
                    }
                }
                if byte == b'\r' {
                    self.after_cr = true;
                    buf[out] = b'\n';
                } else {
                    buf[out] = byte;
                }
                out += 1;
            }

            // a read made only of the LF half of a split CRLF yields nothing
            if out > 0 {
                return Ok(out);
            }
        }
    }
}

/// Aligned hash and chunk sequences for one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSet {
    pub hashes: Vec<HashRecord>,
    pub chunks: Vec<Chunk>,
}

impl ChunkSet {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total payload bytes across all chunks
    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.data.len()).sum()
    }
}

/// Drain a reader into a [`ChunkSet`]
pub fn chunk_and_hash<R: Read>(reader: R, chunk_size: usize) -> io::Result<ChunkSet> {
    let mut set = ChunkSet::default();
    for item in Chunker::new(reader, chunk_size) {
        let (hash, chunk) = item?;
        set.hashes.push(hash);
        set.chunks.push(chunk);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out one byte per read, to split CRLF pairs across reads
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let data = self.0;
            match data.split_first() {
                Some((first, rest)) if !buf.is_empty() => {
                    buf[0] = *first;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    fn sha1_hex(data: &[u8]) -> String {
        format!("{:x}", Sha1::digest(data))
    }

    #[test]
    fn test_chunk_count_and_round_trip() {
        let source: Vec<u8> = (0..10_000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let set = chunk_and_hash(&source[..], 4096).unwrap();

        assert_eq!(set.len(), source.len().div_ceil(4096));
        assert_eq!(set.hashes.len(), set.chunks.len());
        assert_eq!(set.chunks.last().unwrap().data.len(), 10_000 - 2 * 4096);

        let rebuilt: Vec<u8> = set.chunks.iter().flat_map(|c| c.data.clone()).collect();
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn test_positions_are_one_indexed() {
        let set = chunk_and_hash(&b"abcdefg"[..], 3).unwrap();
        let positions: Vec<usize> = set.chunks.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_hashes_are_cumulative() {
        let source = b"The quick brown fox jumps over the lazy dog";
        let set = chunk_and_hash(&source[..], 10).unwrap();

        for (n, hash) in set.hashes.iter().enumerate() {
            let prefix_len = ((n + 1) * 10).min(source.len());
            assert_eq!(hash.as_str(), sha1_hex(&source[..prefix_len]));
        }
        // chunk 2 alone hashes differently from the running digest
        assert_ne!(set.hashes[1].as_str(), sha1_hex(&set.chunks[1].data));
    }

    #[test]
    fn test_single_chunk_matches_plain_sha1() {
        let set = chunk_and_hash(&b"hello"[..], DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(set.hashes.len(), 1);
        assert_eq!(
            set.hashes[0].as_str(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let set = chunk_and_hash(&b""[..], DEFAULT_CHUNK_SIZE).unwrap();
        assert!(set.is_empty());
        assert!(set.hashes.is_empty());
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_chunk() {
        let set = chunk_and_hash(&[7u8; 8][..], 4).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_iterator_is_fused_after_end() {
        let mut chunker = Chunker::new(&b"ab"[..], 4);
        assert!(chunker.next().is_some());
        assert!(chunker.next().is_none());
        assert!(chunker.next().is_none());
        assert_eq!(chunker.emitted(), 1);
    }

    #[test]
    fn test_universal_newlines_converts_cr_and_crlf() {
        let mut out = Vec::new();
        UniversalNewlines::new(&b"a\r\nb\rc\nd"[..])
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"a\nb\nc\nd");
    }

    #[test]
    fn test_universal_newlines_across_split_reads() {
        let mut out = Vec::new();
        UniversalNewlines::new(Trickle(b"a\r\n\r\nb\r"))
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"a\n\nb\n");
    }

    #[test]
    fn test_chunker_over_normalised_source() {
        let set = chunk_and_hash(UniversalNewlines::new(Trickle(b"ab\r\ncd\r\n")), 3).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.chunks[0].data, b"ab\n");
        assert_eq!(set.chunks[1].data, b"cd\n");
        assert_eq!(set.hashes[1].as_str(), sha1_hex(b"ab\ncd\n"));
    }
}
