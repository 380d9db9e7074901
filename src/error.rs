//! Error types for the replication gateway

use thiserror::Error;

use crate::domain::{NodeId, ResultCode};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the gateway and its collaborators.
///
/// These never reach the caller of a gateway entry point directly: every
/// request ends with a single [`ResultCode`], obtained through
/// [`Error::result_code`].
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header or payload on the wire
    #[error("Codec error: {0}")]
    Codec(String),

    /// Payload does not fit the header's 32-bit length or the size bound
    #[error("Payload of {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Peer closed the connection
    #[error("Connection to {node} closed by peer")]
    ConnectionClosed { node: NodeId },

    /// Could not establish a connection
    #[error("Failed to connect to {node}: {reason}")]
    Connect { node: NodeId, reason: String },

    /// An I/O operation ran out of time and retry budget
    #[error("{operation} on {node} timed out")]
    Timeout {
        node: NodeId,
        operation: &'static str,
    },

    // =========================================================================
    // Placement Errors
    // =========================================================================
    /// A replica count of zero was requested
    #[error("Invalid copy count: {0}")]
    InvalidCopies(usize),

    /// More copies requested than the cluster supports
    #[error("Too many copies requested: {requested} (max {max})")]
    TooManyCopies { requested: usize, max: usize },

    /// Fewer failure zones than copies in the placement snapshot
    #[error("Insufficient zones for placement: need {requested}, have {available}")]
    InsufficientZones { requested: usize, available: usize },

    /// Placement table larger than the cluster bound
    #[error("Too many nodes in placement table: {count} (max {max})")]
    TooManyNodes { count: usize, max: usize },

    /// Forward set would exceed its capacity
    #[error("Forward set full: capacity {capacity}")]
    ForwardSetFull { capacity: usize },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),
}

impl Error {
    /// Collapse this error into the code reported to the caller.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Error::InvalidCopies(_)
            | Error::TooManyCopies { .. }
            | Error::PayloadTooLarge { .. } => ResultCode::InvalidParams,
            Error::InsufficientZones { .. } => ResultCode::InsufficientCopies,
            Error::TooManyNodes { .. }
            | Error::ForwardSetFull { .. }
            | Error::Config(_)
            | Error::DurationParse(_) => ResultCode::SystemError,
            Error::Io(_)
            | Error::Codec(_)
            | Error::ConnectionClosed { .. }
            | Error::Connect { .. }
            | Error::Timeout { .. } => ResultCode::NetworkError,
        }
    }

    /// True for errors that leave a connection in an unknown state.
    pub fn is_network(&self) -> bool {
        self.result_code() == ResultCode::NetworkError
    }
}
