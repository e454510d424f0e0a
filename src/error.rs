//! Error taxonomy for LeoNTP status queries.
//!
//! Every failure of a query lands in one of four buckets. None of them are
//! fatal: the caller logs, reports "no data this cycle" and tries again later.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`ClientError`], for callers that only need to
/// branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    ConnectionFailure,
    MalformedResponse,
    UnknownFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::ConnectionFailure => write!(f, "connection failure"),
            ErrorKind::MalformedResponse => write!(f, "malformed response"),
            ErrorKind::UnknownFailure => write!(f, "unknown failure"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    /// No reply arrived within the receive timeout.
    #[error("no reply from {addr} within {timeout:?}")]
    Timeout { addr: SocketAddr, timeout: Duration },

    /// The socket could not be created, connected, or written to, or the host
    /// name did not resolve.
    #[error("cannot reach {target}: {source}")]
    ConnectionFailure {
        target: String,
        #[source]
        source: io::Error,
    },

    /// A datagram arrived but is not a valid 48-byte status reply.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error("unexpected failure talking to {target}: {source}")]
    UnknownFailure {
        target: String,
        #[source]
        source: io::Error,
    },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::ConnectionFailure { .. } => ErrorKind::ConnectionFailure,
            ClientError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            ClientError::UnknownFailure { .. } => ErrorKind::UnknownFailure,
        }
    }

    /// True when the server could not be reached at all, as opposed to
    /// answering with garbage.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::ConnectionFailure
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ClientError::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub(crate) fn connection(target: impl fmt::Display, source: io::Error) -> Self {
        ClientError::ConnectionFailure {
            target: target.to_string(),
            source,
        }
    }

    /// Classify an error returned while waiting for the reply.
    pub(crate) fn from_recv(addr: SocketAddr, timeout: Duration, err: io::Error) -> Self {
        match err.kind() {
            // Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                ClientError::Timeout { addr, timeout }
            }
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe => ClientError::connection(addr, err),
            _ => ClientError::UnknownFailure {
                target: addr.to_string(),
                source: err,
            },
        }
    }
}
