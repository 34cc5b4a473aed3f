//! Error types for the remote client
//!
//! All errors use `thiserror` for `Display` and `Error` implementations.
//! [`Error::kind`] classifies each variant so callers (and the failover loop)
//! can tell a caller fault from a broken channel without matching every
//! variant.
//!
//! | Kind | Variants | Handling |
//! |------|----------|----------|
//! | Usage | `ParameterNotSet`, `InvalidParameterIndex`, `StatementClosed`, `SessionClosed` | Raised before any I/O |
//! | Transport | `Transport` | Recovered by removing the channel |
//! | Unavailable | `NoReachableServer` | Every channel failed |
//! | Server | `Server` | Raised by the server, passed through |
//! | Protocol | `Protocol` | Unexpected response shape |
//! | Config | `Config` | Invalid client configuration |

use std::io;
use thiserror::Error;

use crate::types::ObjectId;

/// Result type alias for remote client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller misused the API
    Usage,
    /// A single channel failed at the I/O level
    Transport,
    /// No channel of the session is reachable any more
    Unavailable,
    /// The server rejected the request
    Server,
    /// The server answered with something the client did not expect
    Protocol,
    /// Client configuration is invalid
    Config,
}

/// Error types for the remote client
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter was not bound before execute
    #[error("Parameter #{position} is not set")]
    ParameterNotSet {
        /// 1-based parameter position, as shown to users
        position: usize,
    },

    /// A parameter index outside the statement's parameter list
    #[error("Invalid parameter index {index}, statement has {count} parameters")]
    InvalidParameterIndex {
        /// 0-based index that was requested
        index: usize,
        /// Number of parameters the statement declares
        count: usize,
    },

    /// The command was used after close
    #[error("Statement is closed")]
    StatementClosed,

    /// The session was used after close
    #[error("Session is closed")]
    SessionClosed,

    /// Every channel of the session failed
    #[error("No reachable server ({failures} channel(s) failed)")]
    NoReachableServer {
        /// Channels removed during the failing call
        failures: usize,
    },

    /// I/O failure on one channel
    #[error("Transport error on {endpoint}: {source}")]
    Transport {
        /// Endpoint of the failed channel
        endpoint: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error reported by the server
    #[error("Server error [{code}-{sql_state}]: {message}")]
    Server {
        /// Vendor error code
        code: i32,
        /// SQLSTATE
        sql_state: String,
        /// Server-side message
        message: String,
    },

    /// Response did not match the request
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Vendor code a server uses when an object id is no longer cached.
pub const OBJECT_CLOSED: i32 = 90007;

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ParameterNotSet { .. }
            | Error::InvalidParameterIndex { .. }
            | Error::StatementClosed
            | Error::SessionClosed => ErrorKind::Usage,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::NoReachableServer { .. } => ErrorKind::Unavailable,
            Error::Server { .. } => ErrorKind::Server,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns true for caller faults.
    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }

    /// Returns true if the failover loop should drop the channel and retry.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Build a transport error for `endpoint`.
    pub fn transport(endpoint: impl Into<String>, source: io::Error) -> Self {
        Error::Transport {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Build the error a server returns for an evicted or unknown object.
    pub fn object_closed(id: ObjectId) -> Self {
        Error::Server {
            code: OBJECT_CLOSED,
            sql_state: "90007".to_string(),
            message: format!("The object is already closed [{}]", id),
        }
    }

    /// Build a protocol error for an unexpected response.
    pub fn unexpected(expected: &str, actual: &str) -> Self {
        Error::Protocol(format!("expected {} response, got {}", expected, actual))
    }
}
