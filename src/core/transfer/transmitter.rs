//! Transmitter side of the transfer
//!
//! CONNECTING -> SENDING_MANIFEST -> AWAIT_ACK_1 -> SENDING_PAYLOAD
//! -> AWAIT_ACK_2 -> CLOSED

use super::framing::{Frame, Stop, read_frame, write_frame};
use super::{Framing, TransferOptions, nonzero};
use crate::core::error::TransportError;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitterState {
    Connecting,
    SendingManifest,
    AwaitAck1,
    SendingPayload,
    AwaitAck2,
    Closed,
    Failed,
}

/// Acknowledgment text returned by the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgments {
    pub manifest: String,
    pub payload: String,
}

pub struct Transmitter {
    options: TransferOptions,
    state: TransmitterState,
}

impl Transmitter {
    pub fn new(options: TransferOptions) -> Self {
        Self {
            options,
            state: TransmitterState::Connecting,
        }
    }

    pub fn state(&self) -> TransmitterState {
        self.state
    }

    fn transition(&mut self, next: TransmitterState) {
        tracing::debug!("Transmitter {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Connect, send manifest and blob, and collect both acknowledgments
    pub fn send(
        &mut self,
        addr: SocketAddr,
        manifest: &[u8],
        blob: &[u8],
    ) -> Result<Acknowledgments, TransportError> {
        match self.exchange(addr, manifest, blob) {
            Ok(acks) => Ok(acks),
            Err(e) => {
                tracing::error!("Transmit failed in state {:?}: {}", self.state, e);
                self.transition(TransmitterState::Failed);
                Err(e)
            }
        }
    }

    fn exchange(
        &mut self,
        addr: SocketAddr,
        manifest: &[u8],
        blob: &[u8],
    ) -> Result<Acknowledgments, TransportError> {
        self.transition(TransmitterState::Connecting);
        let mut stream = TcpStream::connect_timeout(&addr, nonzero(self.options.ack_timeout))
            .map_err(|source| TransportError::Connect { addr, source })?;
        stream
            .set_read_timeout(Some(nonzero(self.options.ack_timeout)))
            .map_err(|source| TransportError::Io {
                stage: "configuring socket",
                source,
            })?;
        tracing::info!("Connected to {}", addr);

        self.transition(TransmitterState::SendingManifest);
        self.send_sub_transfer(&mut stream, manifest, "sending manifest")?;
        self.transition(TransmitterState::AwaitAck1);
        let manifest_ack = self.await_ack(&mut stream, "awaiting manifest acknowledgment")?;
        tracing::info!("{}", manifest_ack);

        self.transition(TransmitterState::SendingPayload);
        self.send_sub_transfer(&mut stream, blob, "sending payload")?;
        self.transition(TransmitterState::AwaitAck2);
        let payload_ack = self.await_ack(&mut stream, "awaiting payload acknowledgment")?;
        tracing::info!("{}", payload_ack);

        let _ = stream.shutdown(Shutdown::Both);
        self.transition(TransmitterState::Closed);

        Ok(Acknowledgments {
            manifest: manifest_ack,
            payload: payload_ack,
        })
    }

    fn send_sub_transfer(
        &self,
        stream: &mut TcpStream,
        data: &[u8],
        stage: &'static str,
    ) -> Result<(), TransportError> {
        tracing::debug!("{} ({} bytes)", stage, data.len());
        match self.options.framing {
            Framing::Legacy => stream
                .write_all(data)
                .and_then(|_| stream.flush())
                .map_err(|source| TransportError::Io { stage, source }),
            Framing::LengthPrefixed => {
                write_frame(stream, data, self.options.max_frame_size, stage)
            }
        }
    }

    fn await_ack(
        &self,
        stream: &mut TcpStream,
        stage: &'static str,
    ) -> Result<String, TransportError> {
        let bytes = match self.options.framing {
            Framing::Legacy => {
                // one read, as the legacy receiver sends the ack in one write
                let mut buf = vec![0u8; self.options.recv_buffer.max(1)];
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) => return Err(TransportError::ConnectionClosed { stage }),
                        Ok(n) => break buf[..n].to_vec(),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                            ) =>
                        {
                            return Err(TransportError::AckTimeout { stage });
                        }
                        Err(source) => return Err(TransportError::Io { stage, source }),
                    }
                }
            }
            Framing::LengthPrefixed => {
                match read_frame(stream, self.options.max_frame_size, stage)? {
                    Frame::Data(data) => data,
                    Frame::Nothing(Stop::TimedOut) => {
                        return Err(TransportError::AckTimeout { stage });
                    }
                    Frame::Nothing(Stop::Closed) => {
                        return Err(TransportError::ConnectionClosed { stage });
                    }
                }
            }
        };

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
