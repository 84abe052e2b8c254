//! Classification of send failures into the transient-transport set.
//!
//! Only faults in [`TransportFault`] may disable the reporter. Everything else
//! raised while sending is treated as a defect and always propagates.

use std::fmt;
use std::io;

use thiserror::Error;

/// Closed set of transport faults that disable further sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFault {
    ConnectionTimeout,
    ConnectionReset,
    ConnectionRefused,
    /// Socket rejected an argument (`EINVAL`).
    InvalidArgument,
    /// Peer closed the stream before a full response arrived.
    EndOfStream,
    /// Response could not be parsed as HTTP.
    BadResponse,
    HeaderSyntax,
    /// Generic protocol failure, including non-success HTTP statuses.
    Protocol,
}

impl TransportFault {
    pub const ALL: [TransportFault; 8] = [
        TransportFault::ConnectionTimeout,
        TransportFault::ConnectionReset,
        TransportFault::ConnectionRefused,
        TransportFault::InvalidArgument,
        TransportFault::EndOfStream,
        TransportFault::BadResponse,
        TransportFault::HeaderSyntax,
        TransportFault::Protocol,
    ];

    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportFault::ConnectionTimeout => "connection_timeout",
            TransportFault::ConnectionReset => "connection_reset",
            TransportFault::ConnectionRefused => "connection_refused",
            TransportFault::InvalidArgument => "invalid_argument",
            TransportFault::EndOfStream => "end_of_stream",
            TransportFault::BadResponse => "bad_response",
            TransportFault::HeaderSyntax => "header_syntax",
            TransportFault::Protocol => "protocol",
        }
    }

    /// Fault for a socket-level `std::io::Error` kind, if it is transient.
    pub fn from_io_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::TimedOut => Some(TransportFault::ConnectionTimeout),
            io::ErrorKind::ConnectionReset => Some(TransportFault::ConnectionReset),
            io::ErrorKind::ConnectionRefused => Some(TransportFault::ConnectionRefused),
            io::ErrorKind::InvalidInput => Some(TransportFault::InvalidArgument),
            io::ErrorKind::UnexpectedEof => Some(TransportFault::EndOfStream),
            io::ErrorKind::InvalidData => Some(TransportFault::BadResponse),
            _ => None,
        }
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A send failure already known to be in the transient-transport set.
#[derive(Debug, Error)]
#[error("{fault}: {message}")]
pub struct TransportError {
    pub fault: TransportFault,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl TransportError {
    pub fn new(fault: TransportFault, message: impl Into<String>) -> Self {
        Self {
            fault,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(fault: TransportFault, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            fault,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Classify a send error.
///
/// Walks the error chain and returns the first fault found, either from a
/// [`TransportError`] or from a transport-level `std::io::Error` kind.
/// `None` means the error is unclassified.
pub fn classify(err: &anyhow::Error) -> Option<TransportFault> {
    err.chain().find_map(|cause| {
        if let Some(transport) = cause.downcast_ref::<TransportError>() {
            return Some(transport.fault);
        }
        cause
            .downcast_ref::<io::Error>()
            .and_then(|io_err| TransportFault::from_io_kind(io_err.kind()))
    })
}
