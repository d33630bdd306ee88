//! Crate-wide error taxonomy.
//!
//! Each layer of the stack (transport, framing, link session, capability
//! resolution, IGC emission) defines its own `thiserror` enum; [`GarminError`]
//! composes them with `#[from]` so callers higher up can propagate a single
//! type with `?` while still matching on the originating layer when useful.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{device}: open: {source}")]
    Open { device: String, source: io::Error },
    #[error("{device}: {syscall}: {source}")]
    Io {
        device: String,
        syscall: &'static str,
        source: io::Error,
    },
    #[error("{device}: read: device disconnected")]
    Disconnected { device: String },
    #[error("{device}: short write")]
    ShortWrite { device: String },
}

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("{device}: incomplete packet")]
    Incomplete { device: String },
    #[error("{device}: expected DLE")]
    ExpectedDle { device: String },
    #[error("{device}: expected ETX")]
    ExpectedEtx { device: String },
    #[error("{device}: checksum failed")]
    ChecksumFailed { device: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("{device}: expected ack packet")]
    ExpectedAck { device: String },
    #[error("{device}: ack to wrong packet")]
    AckMismatch { device: String },
    #[error("{device}: unexpected packet {id}")]
    UnexpectedPacket { device: String, id: u8 },
    #[error("{device}: device does not support Link Protocol L001")]
    MissingLinkProtocol { device: String },
    #[error("{device}: device does not support Device Command Protocol A010")]
    MissingApplicationProtocol { device: String },
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{device}: unsupported track transfer protocol")]
    Unsupported { device: String },
}

#[derive(Debug, Error)]
pub enum IgcError {
    #[error("{path}: {source}")]
    Io { path: String, source: io::Error },
}

#[derive(Debug, Error)]
pub enum GarminError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error(transparent)]
    Igc(#[from] IgcError),
    #[error("{0}")]
    Message(String),
}

impl GarminError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}
