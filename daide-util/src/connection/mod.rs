use std::{
    io::Write as _,
    net::{Shutdown, TcpStream},
    time::Duration,
};

use thiserror::Error;

use crate::ReadExt as _;

pub const PROTOCOL_VERSION: u16 = 1;
pub const PROTOCOL_MAGIC: u16 = 0xDA10;
pub const DEFAULT_PORT: u16 = 16713;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Not connected")]
    NotConnected,
    #[error(transparent)]
    Io(std::io::Error),
    #[error("Peer closed the stream mid frame")]
    Eof,
    #[error("Read deadline expired")]
    Timeout,
    #[error("Diplomacy frame sent before the initial message")]
    Handshake,
    #[error("Unknown frame kind {0:#04X}")]
    UnknownFrameKind(u8),
    #[error("Frame payload of {0} bytes exceeds the u16 length field")]
    FrameTooLong(usize),
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe => ConnectionError::Eof,
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                ConnectionError::Timeout
            }
            _ => ConnectionError::Io(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Initial,
    Representation,
    Diplomacy,
    Final,
    Error,
}

impl FrameKind {
    pub fn into_byte(self) -> u8 {
        match self {
            FrameKind::Initial => 0,
            FrameKind::Representation => 1,
            FrameKind::Diplomacy => 2,
            FrameKind::Final => 3,
            FrameKind::Error => 4,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => FrameKind::Initial,
            1 => FrameKind::Representation,
            2 => FrameKind::Diplomacy,
            3 => FrameKind::Final,
            4 => FrameKind::Error,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Box<[u8]>,
}

/// One DAIDE session over a [`TcpStream`].
///
/// Frames are `[u8 kind][u8 pad=0][u16 length_be][payload]`. Reads
/// block; writes are one `write_all` per frame.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    sent_initial: bool,
}

impl Connection {
    pub fn connect(host: &str, port: u16) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect((host, port))?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already established stream, e.g. an accepted one.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
            sent_initial: false,
        }
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), ConnectionError> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(ConnectionError::NotConnected);
        };
        stream.set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    pub fn send_frame(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), ConnectionError> {
        let length: u16 = payload
            .len()
            .try_into()
            .map_err(|_| ConnectionError::FrameTooLong(payload.len()))?;
        let Some(stream) = self.stream.as_mut() else {
            return Err(ConnectionError::NotConnected);
        };
        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.push(kind.into_byte());
        frame.push(0);
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(payload);
        match stream.write_all(&frame) {
            Err(err)
                if err.kind() == std::io::ErrorKind::BrokenPipe
                    || err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                self.stream = None;
                Err(ConnectionError::Eof)
            }
            v => Ok(v?),
        }
    }

    /// The initial message: protocol version then the magic number.
    /// Must precede every diplomacy frame.
    pub fn send_initial(&mut self) -> Result<(), ConnectionError> {
        let mut payload = [0u8; 4];
        payload[..2].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());
        payload[2..].copy_from_slice(&PROTOCOL_MAGIC.to_be_bytes());
        self.send_frame(FrameKind::Initial, &payload)?;
        self.sent_initial = true;
        Ok(())
    }

    pub fn send_diplomacy(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        if !self.sent_initial {
            return Err(ConnectionError::Handshake);
        }
        self.send_frame(FrameKind::Diplomacy, payload)
    }

    pub fn recv(&mut self) -> Result<Frame, ConnectionError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ConnectionError::NotConnected);
        };
        let header: [u8; 4] = stream.read_const()?;
        let kind =
            FrameKind::from_byte(header[0]).ok_or(ConnectionError::UnknownFrameKind(header[0]))?;
        let length = u16::from_be_bytes([header[2], header[3]]) as usize;
        let payload = stream.read_var(length)?;
        Ok(Frame { kind, payload })
    }

    /// Announces the close with an empty FM frame, then tears the
    /// socket down. Harmless on an already closed connection.
    pub fn close(&mut self) -> Result<(), ConnectionError> {
        if self.stream.is_none() {
            return Ok(());
        }
        let sent = self.send_frame(FrameKind::Final, &[]);
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        match sent {
            Err(ConnectionError::Eof) => Ok(()),
            v => v,
        }
    }
}
