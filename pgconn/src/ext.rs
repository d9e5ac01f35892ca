//! Small helper traits used throughout the wire codec.
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::common::ByteStr;

/// Integer signedness in the postgres docs is awful: lengths are `usize` in
/// Rust but the wire wants `u16`/`u32`.
pub trait UsizeExt {
    /// Panics instead of wrapping on overflow: a message this large means a
    /// caller bug, not a protocol condition to recover from.
    fn to_u32(self) -> u32;
    fn to_u16(self) -> u16;
}

impl UsizeExt for usize {
    fn to_u32(self) -> u32 {
        self.try_into().expect("message size too large for protocol")
    }

    fn to_u16(self) -> u16 {
        self.try_into().expect("message size too large for protocol")
    }
}

pub trait StrExt {
    /// String length plus the nul terminator.
    fn nul_string_len(&self) -> u32;
}

impl StrExt for str {
    fn nul_string_len(&self) -> u32 {
        self.len().to_u32() + 1
    }
}

pub trait BufMutExt {
    fn put_nul_string(&mut self, string: &str);
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }
}

/// A string field was missing its zero terminator (§4.1: a fatal decode
/// error, not a panic, since the byte stream is attacker/peer-controlled).
#[derive(Debug)]
pub struct MissingNulTerminator;

impl std::fmt::Display for MissingNulTerminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("string field missing zero terminator")
    }
}

impl std::error::Error for MissingNulTerminator {}

impl From<MissingNulTerminator> for crate::message::ProtocolError {
    fn from(_: MissingNulTerminator) -> Self {
        crate::message::ProtocolError::malformed("string field missing zero terminator")
    }
}

pub trait BytesExt: Sized {
    /// Read a nul-terminated byte string, returning the bytes before the nul.
    fn get_nul_bytes(&mut self) -> Result<Bytes, MissingNulTerminator>;

    /// Read a nul-terminated string, validating UTF-8.
    fn get_nul_bytestr(&mut self) -> Result<ByteStr, crate::message::ProtocolError>;
}

impl BytesExt for Bytes {
    fn get_nul_bytes(&mut self) -> Result<Bytes, MissingNulTerminator> {
        let end = self.iter().position(|&b| b == b'\0').ok_or(MissingNulTerminator)?;
        let me = self.split_to(end);
        self.advance(1);
        Ok(me)
    }

    fn get_nul_bytestr(&mut self) -> Result<ByteStr, crate::message::ProtocolError> {
        let bytes = self.get_nul_bytes()?;
        ByteStr::from_utf8(bytes).map_err(|e| crate::message::ProtocolError::malformed(e.to_string()))
    }
}

impl BytesExt for BytesMut {
    fn get_nul_bytes(&mut self) -> Result<Bytes, MissingNulTerminator> {
        let end = self.iter().position(|&b| b == b'\0').ok_or(MissingNulTerminator)?;
        let me = self.split_to(end);
        self.advance(1);
        Ok(me.freeze())
    }

    fn get_nul_bytestr(&mut self) -> Result<ByteStr, crate::message::ProtocolError> {
        let bytes = self.get_nul_bytes()?;
        ByteStr::from_utf8(bytes).map_err(|e| crate::message::ProtocolError::malformed(e.to_string()))
    }
}

/// Helper for writing `Bind` parameter values: the length prefix preceding
/// each value, or `-1` for NULL.
pub trait BindParams: Buf {
    fn size(&self) -> i32;
}

/// Lossy display of raw bytes, used in error messages and tracing.
pub struct LossyFmt<'a>(pub &'a [u8]);

pub trait FmtExt {
    fn lossy(&self) -> LossyFmt<'_>;
}

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}
