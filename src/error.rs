//! Errors returned while driving the handshake.


use std::fmt;

use crate::context::State;


/// A malformed or unexpected message received from the server.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ProtocolError {
    /// A field extends past the end of the data it is read from.
    Truncated { field: &'static str, needed: usize, available: usize },

    /// The magic value does not match the expected one.
    MagicMismatch { expected: [u8; 8], obtained: Vec<u8> },

    /// The message is of a different type than the one expected at this point.
    UnexpectedMessageType { expected: u32, obtained: u32 },

    /// The Challenge message carries an empty target information block.
    NoTargetInfo,

    /// The target information block contains an entry of an unrecognized type.
    UnknownAvPair { av_id: u16 },
}
impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { field, needed, available }
                => write!(f, "{} truncated (needed {} bytes, {} available)", field, needed, available),
            Self::MagicMismatch { expected, obtained }
                => write!(f, "mismatched signature (expected {:?}, obtained {:?})", expected, obtained),
            Self::UnexpectedMessageType { expected, obtained }
                => write!(f, "unexpected message type (expected {}, obtained {})", expected, obtained),
            Self::NoTargetInfo
                => write!(f, "no target info in challenge message"),
            Self::UnknownAvPair { av_id }
                => write!(f, "unrecognized AV-pair type 0x{:04x}", av_id),
        }
    }
}
impl std::error::Error for ProtocolError {
}

/// A failure of one of the cryptographic primitives.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CryptoError {
    /// The primitive refused the key it was given.
    InvalidKeyLength { primitive: &'static str, length: usize },

    /// The secure random source could not deliver bytes.
    RandomUnavailable { reason: String },
}
impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength { primitive, length }
                => write!(f, "{} rejected a key of {} bytes", primitive, length),
            Self::RandomUnavailable { reason }
                => write!(f, "secure random source unavailable: {}", reason),
        }
    }
}
impl std::error::Error for CryptoError {
}

/// An error that ends the current authentication attempt.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The server sent something this client cannot accept.
    Protocol(ProtocolError),

    /// A cryptographic primitive failed.
    Crypto(CryptoError),

    /// A value is too long to be described by a 16-bit length field.
    FieldTooLong { field: &'static str, length: usize },

    /// [`advance`](crate::HandshakeContext::advance) was called in a way the handshake does not
    /// allow, e.g. again after completion.
    InvalidState { state: State, input_len: usize },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e)
                => write!(f, "NTLM protocol error: {}", e),
            Self::Crypto(e)
                => write!(f, "NTLM crypto error: {}", e),
            Self::FieldTooLong { field, length }
                => write!(f, "{} is too long ({} bytes, at most {} allowed)", field, length, u16::MAX),
            Self::InvalidState { state, input_len }
                => write!(f, "handshake cannot advance from state {:?} with a {}-byte token", state, input_len),
        }
    }
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Crypto(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}
