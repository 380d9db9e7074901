//! Caller-visible result codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a request, carried on the wire as a `u32`.
///
/// Codes a healthy peer reports are passed through unchanged; codes this
/// crate does not name survive as [`ResultCode::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    #[default]
    Success,
    Unknown,
    NoObject,
    Io,
    InvalidParams,
    SystemError,
    NoSpace,
    /// Write against a read-only (snapshot) object
    ReadOnly,
    /// Request epoch does not match the peer's
    InvalidEpoch,
    /// Connection failure, timeout, or retry budget exhausted
    NetworkError,
    /// Peer is recovering the requested object
    NodeInRecovery,
    /// Fewer failure zones than requested copies
    InsufficientCopies,
    Other(u32),
}

impl ResultCode {
    pub fn from_u32(code: u32) -> Self {
        match code {
            0x00 => ResultCode::Success,
            0x01 => ResultCode::Unknown,
            0x02 => ResultCode::NoObject,
            0x03 => ResultCode::Io,
            0x05 => ResultCode::InvalidParams,
            0x06 => ResultCode::SystemError,
            0x15 => ResultCode::NoSpace,
            0x1A => ResultCode::ReadOnly,
            0x45 => ResultCode::InvalidEpoch,
            0x46 => ResultCode::NetworkError,
            0x4C => ResultCode::NodeInRecovery,
            0x50 => ResultCode::InsufficientCopies,
            other => ResultCode::Other(other),
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            ResultCode::Success => 0x00,
            ResultCode::Unknown => 0x01,
            ResultCode::NoObject => 0x02,
            ResultCode::Io => 0x03,
            ResultCode::InvalidParams => 0x05,
            ResultCode::SystemError => 0x06,
            ResultCode::NoSpace => 0x15,
            ResultCode::ReadOnly => 0x1A,
            ResultCode::InvalidEpoch => 0x45,
            ResultCode::NetworkError => 0x46,
            ResultCode::NodeInRecovery => 0x4C,
            ResultCode::InsufficientCopies => 0x50,
            ResultCode::Other(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ResultCode::Success
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Success => write!(f, "success"),
            ResultCode::Unknown => write!(f, "unknown error"),
            ResultCode::NoObject => write!(f, "no object found"),
            ResultCode::Io => write!(f, "I/O error"),
            ResultCode::InvalidParams => write!(f, "invalid parameters"),
            ResultCode::SystemError => write!(f, "system error"),
            ResultCode::NoSpace => write!(f, "no space left"),
            ResultCode::ReadOnly => write!(f, "object is read-only"),
            ResultCode::InvalidEpoch => write!(f, "invalid epoch"),
            ResultCode::NetworkError => write!(f, "network error"),
            ResultCode::NodeInRecovery => write!(f, "node in recovery"),
            ResultCode::InsufficientCopies => write!(f, "not enough zones for copies"),
            ResultCode::Other(code) => write!(f, "result code {:#x}", code),
        }
    }
}

/// First-failure-wins accumulator for a request's outcome.
///
/// Once a non-success code is recorded, later codes are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome(ResultCode);

impl Outcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code`; returns true if it became the outcome.
    pub fn record(&mut self, code: ResultCode) -> bool {
        if self.0.is_success() && !code.is_success() {
            self.0 = code;
            true
        } else {
            false
        }
    }

    pub fn is_success(&self) -> bool {
        self.0.is_success()
    }

    pub fn code(&self) -> ResultCode {
        self.0
    }
}
