use std::fmt;

use crate::ext::FmtExt;

/// Error decoding a frame from the wire, or a frame arriving where it was
/// not expected.
pub enum ProtocolError {
    /// A message payload did not match the shape the protocol requires.
    Malformed(String),
    /// A backend message arrived in a phase that does not expect it.
    Unexpected { msgtype: u8, phase: &'static str },
}

impl ProtocolError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub(crate) fn unexpected(msgtype: u8, phase: &'static str) -> Self {
        Self::Unexpected { msgtype, phase }
    }
}

impl std::error::Error for ProtocolError {}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed message: {msg}"),
            Self::Unexpected { msgtype, phase } => write!(
                f,
                "unexpected message {:?} during {phase}",
                [*msgtype].lossy(),
            ),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
