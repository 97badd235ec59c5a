//! Receiver side of the transfer
//!
//! LISTENING -> CONNECTED -> RECEIVING_MANIFEST -> ACKED_MANIFEST
//! -> RECEIVING_PAYLOAD -> ACKED_PAYLOAD -> CLOSED

use super::framing::{Frame, Stop, read_frame, read_until_quiet, write_frame};
use super::{Framing, TransferOptions, ack_message, nonzero};
use crate::core::error::TransportError;
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Listening,
    Connected,
    ReceivingManifest,
    AckedManifest,
    ReceivingPayload,
    AckedPayload,
    Closed,
    Failed,
}

/// Raw bytes of both sub-transfers
#[derive(Debug, Clone)]
pub struct ReceivedFiles {
    pub peer: SocketAddr,
    pub manifest: Vec<u8>,
    pub blob: Vec<u8>,
}

/// Single-session receiver
///
/// Binds on construction so a port clash fails before anything blocks.
pub struct Receiver {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    options: TransferOptions,
    state: ReceiverState,
}

impl Receiver {
    pub fn bind(addr: SocketAddr, options: TransferOptions) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        tracing::info!("Listening on {} ({} framing)", local_addr, options.framing);

        Ok(Self {
            listener: Some(listener),
            local_addr,
            options,
            state: ReceiverState::Listening,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    fn transition(&mut self, next: ReceiverState) {
        tracing::debug!("Receiver {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Accept one connection and take both sub-transfers
    ///
    /// Blocks until a transmitter connects. Can only run once.
    pub fn run(&mut self) -> Result<ReceivedFiles, TransportError> {
        if self.listener.is_none() {
            return Err(TransportError::AlreadyRun);
        }
        match self.exchange() {
            Ok(files) => Ok(files),
            Err(e) => {
                tracing::error!("Receive failed in state {:?}: {}", self.state, e);
                self.transition(ReceiverState::Failed);
                Err(e)
            }
        }
    }

    fn exchange(&mut self) -> Result<ReceivedFiles, TransportError> {
        // dropping the listener after accept refuses any second transmitter
        let listener = self
            .listener
            .take()
            .ok_or(TransportError::AlreadyRun)?;
        let (mut stream, peer) = listener.accept().map_err(|source| TransportError::Io {
            stage: "accepting",
            source,
        })?;
        drop(listener);

        tracing::info!("Connection from {}, now transferring files", peer);
        self.transition(ReceiverState::Connected);

        stream
            .set_read_timeout(Some(nonzero(self.options.receive_timeout)))
            .map_err(|source| TransportError::Io {
                stage: "configuring socket",
                source,
            })?;

        self.transition(ReceiverState::ReceivingManifest);
        let manifest = self.receive_sub_transfer(&mut stream, "receiving manifest")?;
        self.acknowledge(&mut stream, &self.options.manifest_label, "acknowledging manifest")?;
        self.transition(ReceiverState::AckedManifest);

        self.transition(ReceiverState::ReceivingPayload);
        let blob = self.receive_sub_transfer(&mut stream, "receiving payload")?;
        self.acknowledge(&mut stream, &self.options.payload_label, "acknowledging payload")?;
        self.transition(ReceiverState::AckedPayload);

        // peer may already be gone; the session is complete either way
        let _ = stream.shutdown(Shutdown::Both);
        self.transition(ReceiverState::Closed);

        Ok(ReceivedFiles {
            peer,
            manifest,
            blob,
        })
    }

    fn receive_sub_transfer(
        &self,
        stream: &mut TcpStream,
        stage: &'static str,
    ) -> Result<Vec<u8>, TransportError> {
        let (data, stop) = match self.options.framing {
            Framing::Legacy => {
                let (data, stop) = read_until_quiet(stream, self.options.recv_buffer, stage)?;
                (data, Some(stop))
            }
            Framing::LengthPrefixed => match read_frame(stream, self.options.max_frame_size, stage)? {
                Frame::Data(data) => (data, None),
                Frame::Nothing(stop) => (Vec::new(), Some(stop)),
            },
        };

        match stop {
            Some(Stop::TimedOut) if data.is_empty() => {
                tracing::warn!("No data before timeout while {}, treating as empty", stage);
            }
            Some(stop) => tracing::info!("Finished {}: {} bytes ({:?})", stage, data.len(), stop),
            None => tracing::info!("Finished {}: {} byte frame", stage, data.len()),
        }
        Ok(data)
    }

    fn acknowledge(
        &self,
        stream: &mut TcpStream,
        label: &str,
        stage: &'static str,
    ) -> Result<(), TransportError> {
        let ack = ack_message(label);
        match self.options.framing {
            Framing::Legacy => stream
                .write_all(ack.as_bytes())
                .and_then(|_| stream.flush())
                .map_err(|source| TransportError::Io { stage, source }),
            Framing::LengthPrefixed => {
                write_frame(stream, ack.as_bytes(), self.options.max_frame_size, stage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::thread;
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn quick_options(framing: Framing) -> TransferOptions {
        TransferOptions {
            framing,
            receive_timeout: Duration::from_millis(200),
            ..TransferOptions::default()
        }
    }

    #[test]
    fn test_bind_conflict_fails_fast() {
        let first = Receiver::bind(loopback(), TransferOptions::default()).unwrap();
        let second = Receiver::bind(first.local_addr(), TransferOptions::default());
        assert!(matches!(second, Err(TransportError::Bind { .. })));
        assert_eq!(first.state(), ReceiverState::Listening);
    }

    #[test]
    fn test_silent_peer_yields_empty_transfers_and_acks() {
        let mut receiver = Receiver::bind(loopback(), quick_options(Framing::Legacy)).unwrap();
        let addr = receiver.local_addr();

        let peer = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut acks = Vec::new();
            stream.read_to_end(&mut acks).unwrap();
            String::from_utf8(acks).unwrap()
        });

        let files = receiver.run().unwrap();
        assert!(files.manifest.is_empty());
        assert!(files.blob.is_empty());
        assert_eq!(receiver.state(), ReceiverState::Closed);

        let acks = peer.join().unwrap();
        assert_eq!(
            acks,
            "Successfully received hashes.txtSuccessfully received receive.txt"
        );
    }

    #[test]
    fn test_second_run_is_rejected_without_state_change() {
        let mut receiver = Receiver::bind(loopback(), quick_options(Framing::Legacy)).unwrap();
        let addr = receiver.local_addr();

        let peer = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut acks = Vec::new();
            stream.read_to_end(&mut acks).unwrap();
        });
        receiver.run().unwrap();
        peer.join().unwrap();

        assert!(matches!(receiver.run(), Err(TransportError::AlreadyRun)));
        assert_eq!(receiver.state(), ReceiverState::Closed);
    }

    #[test]
    fn test_silent_peer_framed_still_acks() {
        let mut receiver =
            Receiver::bind(loopback(), quick_options(Framing::LengthPrefixed)).unwrap();
        let addr = receiver.local_addr();

        let peer = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut acks = Vec::new();
            stream.read_to_end(&mut acks).unwrap();
            acks
        });

        let files = receiver.run().unwrap();
        assert!(files.manifest.is_empty() && files.blob.is_empty());

        let acks = peer.join().unwrap();
        let first_len = u32::from_be_bytes([acks[0], acks[1], acks[2], acks[3]]) as usize;
        assert_eq!(&acks[4..4 + first_len], b"Successfully received hashes.txt");
    }

    #[test]
    fn test_partial_frame_fails_session() {
        let mut receiver =
            Receiver::bind(loopback(), quick_options(Framing::LengthPrefixed)).unwrap();
        let addr = receiver.local_addr();

        let peer = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(&100u32.to_be_bytes()).unwrap();
            stream.write_all(b"short").unwrap();
            // hold the socket open past the receive timeout
            thread::sleep(Duration::from_millis(500));
        });

        let result = receiver.run();
        assert!(matches!(
            result,
            Err(TransportError::PartialFrame {
                expected: 100,
                received: 5,
                ..
            })
        ));
        assert_eq!(receiver.state(), ReceiverState::Failed);
        peer.join().unwrap();
    }
}
