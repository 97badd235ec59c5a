//! Blocking read/write helpers for both framing modes
//!
//! The caller sets the socket read timeout; a timed-out read shows up here
//! as `WouldBlock` or `TimedOut` depending on platform.

use crate::core::error::TransportError;
use std::io::{self, Read, Write};

/// Why a read loop stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Read returned zero bytes
    Closed,
    /// Read timeout elapsed with no data
    TimedOut,
}

/// Result of reading one length-prefixed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(Vec<u8>),
    /// Nothing arrived before the stream stopped
    Nothing(Stop),
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Read until `buf` is full or the stream stops
///
/// Returns the number of bytes filled and, if short, why.
pub fn fill<S: Read>(
    stream: &mut S,
    buf: &mut [u8],
    stage: &'static str,
) -> Result<(usize, Option<Stop>), TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Ok((filled, Some(Stop::Closed))),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) => return Ok((filled, Some(Stop::TimedOut))),
            Err(source) => return Err(TransportError::Io { stage, source }),
        }
    }
    Ok((filled, None))
}

/// Legacy sub-transfer: read until the peer closes or goes quiet
pub fn read_until_quiet<S: Read>(
    stream: &mut S,
    recv_buffer: usize,
    stage: &'static str,
) -> Result<(Vec<u8>, Stop), TransportError> {
    let mut data = Vec::new();
    let mut buf = vec![0u8; recv_buffer.max(1)];

    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok((data, Stop::Closed)),
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) => return Ok((data, Stop::TimedOut)),
            Err(source) => return Err(TransportError::Io { stage, source }),
        }
    }
}

/// Read one `u32` big-endian length-prefixed frame
///
/// Silence or close before the first header byte is `Frame::Nothing`.
/// Anything that stops inside the header or payload is a partial frame.
pub fn read_frame<S: Read>(
    stream: &mut S,
    limit: usize,
    stage: &'static str,
) -> Result<Frame, TransportError> {
    let mut header = [0u8; 4];
    match fill(stream, &mut header, stage)? {
        (0, Some(stop)) => return Ok(Frame::Nothing(stop)),
        (n, Some(_)) => {
            return Err(TransportError::PartialFrame {
                stage,
                expected: header.len(),
                received: n,
            });
        }
        (_, None) => {}
    }

    let size = u32::from_be_bytes(header) as usize;
    if size > limit {
        return Err(TransportError::FrameTooLarge { size, limit });
    }

    let mut payload = vec![0u8; size];
    match fill(stream, &mut payload, stage)? {
        (n, Some(_)) => Err(TransportError::PartialFrame {
            stage,
            expected: size,
            received: n,
        }),
        (_, None) => Ok(Frame::Data(payload)),
    }
}

/// Write one length-prefixed frame
pub fn write_frame<S: Write>(
    stream: &mut S,
    data: &[u8],
    limit: usize,
    stage: &'static str,
) -> Result<(), TransportError> {
    if data.len() > limit || data.len() > u32::MAX as usize {
        return Err(TransportError::FrameTooLarge {
            size: data.len(),
            limit: limit.min(u32::MAX as usize),
        });
    }
    let len = data.len() as u32;
    let write = |stream: &mut S| -> io::Result<()> {
        stream.write_all(&len.to_be_bytes())?;
        stream.write_all(data)?;
        stream.flush()
    };
    write(stream).map_err(|source| TransportError::Io { stage, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out its bytes, then reports a timeout
    struct QuietAfter(Cursor<Vec<u8>>);

    impl Read for QuietAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.read(buf)?;
            if n == 0 && !buf.is_empty() {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "quiet"));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_frame_round_trip() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"payload", 1024, "test").unwrap();
        assert_eq!(&wire[..4], &7u32.to_be_bytes());

        let frame = read_frame(&mut Cursor::new(wire), 1024, "test").unwrap();
        assert_eq!(frame, Frame::Data(b"payload".to_vec()));
    }

    #[test]
    fn test_zero_length_frame_is_empty_data() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"", 1024, "test").unwrap();
        let frame = read_frame(&mut Cursor::new(wire), 1024, "test").unwrap();
        assert_eq!(frame, Frame::Data(Vec::new()));
    }

    #[test]
    fn test_silence_before_header_is_nothing() {
        let mut quiet = QuietAfter(Cursor::new(Vec::<u8>::new()));
        let frame = read_frame(&mut quiet, 1024, "test").unwrap();
        assert_eq!(frame, Frame::Nothing(Stop::TimedOut));

        let frame = read_frame(&mut Cursor::new(Vec::<u8>::new()), 1024, "test").unwrap();
        assert_eq!(frame, Frame::Nothing(Stop::Closed));
    }

    #[test]
    fn test_timeout_mid_payload_is_partial() {
        let mut wire = 10u32.to_be_bytes().to_vec();
        wire.extend_from_slice(b"abc");
        let mut quiet = QuietAfter(Cursor::new(wire));

        match read_frame(&mut quiet, 1024, "test") {
            Err(TransportError::PartialFrame {
                expected, received, ..
            }) => {
                assert_eq!(expected, 10);
                assert_eq!(received, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let wire = 2048u32.to_be_bytes().to_vec();
        assert!(matches!(
            read_frame(&mut Cursor::new(wire), 1024, "test"),
            Err(TransportError::FrameTooLarge { size: 2048, limit: 1024 })
        ));
        assert!(write_frame(&mut Vec::new(), &[0u8; 8], 4, "test").is_err());
    }

    #[test]
    fn test_read_until_quiet_collects_everything() {
        let mut quiet = QuietAfter(Cursor::new(vec![b'x'; 3000]));
        let (data, stop) = read_until_quiet(&mut quiet, 1024, "test").unwrap();
        assert_eq!(data.len(), 3000);
        assert_eq!(stop, Stop::TimedOut);

        let (data, stop) = read_until_quiet(&mut Cursor::new(Vec::<u8>::new()), 1024, "test").unwrap();
        assert!(data.is_empty());
        assert_eq!(stop, Stop::Closed);
    }
}
