//! Frontend (frontend → server) messages.
use bytes::{Buf, BufMut, BytesMut};

use crate::ext::{BindParams, BufMutExt, StrExt, UsizeExt};

/// A message sent to the backend, framed with a type byte and length
/// prefix by [`write`].
pub trait FrontendProtocol {
    const MSGTYPE: u8;

    fn size_hint(&self) -> u32;

    fn encode(self, buf: impl BufMut);
}

/// Frame and append `msg` to `buf`: type byte, placeholder length, body,
/// then the length is patched in once the body has been written.
pub fn write<F: FrontendProtocol>(msg: F, buf: &mut BytesMut) {
    let size_hint = msg.size_hint();
    buf.reserve(1 + 4 + size_hint as usize);
    buf.put_u8(F::MSGTYPE);
    let len_at = buf.len();
    buf.put_u32(0);
    let start = buf.len();
    msg.encode(&mut *buf);
    let written = (buf.len() - start) as u32;
    debug_assert_eq!(written, size_hint, "size_hint did not match bytes written");
    buf[len_at..len_at + 4].copy_from_slice(&(written + 4).to_be_bytes());
}

/// Untagged StartupMessage: protocol version followed by `(key, value)`
/// pairs and a trailing empty key.
///
/// <https://www.postgresql.org/docs/current/protocol-message-formats.html#PROTOCOL-MESSAGE-FORMATS-STARTUPMESSAGE>
pub struct Startup<'a> {
    pub params: &'a [(&'a str, &'a str)],
}

impl Startup<'_> {
    pub const PROTOCOL_VERSION: u32 = 196_608;

    pub fn write(self, buf: &mut BytesMut) {
        let len_at = buf.len();
        buf.put_u32(0);
        buf.put_u32(Self::PROTOCOL_VERSION);
        for (key, value) in self.params {
            buf.put_nul_string(key);
            buf.put_nul_string(value);
        }
        buf.put_u8(0);
        let written = (buf.len() - len_at) as u32;
        buf[len_at..len_at + 4].copy_from_slice(&written.to_be_bytes());
    }
}

/// Untagged SSLRequest: `length=8, code=80877103`.
pub struct SslRequest;

impl SslRequest {
    pub const CODE: u32 = 80_877_103;

    pub fn write(self, buf: &mut BytesMut) {
        buf.put_u32(8);
        buf.put_u32(Self::CODE);
    }
}

/// Untagged CancelRequest: `length=16, code=80877102, pid, secret_key`.
pub struct CancelRequest {
    pub process_id: i32,
    pub secret_key: i32,
}

impl CancelRequest {
    pub const CODE: u32 = 80_877_102;

    pub fn write(self, buf: &mut BytesMut) {
        buf.put_u32(16);
        buf.put_u32(Self::CODE);
        buf.put_i32(self.process_id);
        buf.put_i32(self.secret_key);
    }
}

/// `p` — PasswordMessage (cleartext, MD5, and SASL response share the tag).
pub struct PasswordMessage<'a> {
    pub password: &'a [u8],
}

impl FrontendProtocol for PasswordMessage<'_> {
    const MSGTYPE: u8 = b'p';

    fn size_hint(&self) -> u32 {
        self.password.len().to_u32()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_slice(self.password);
    }
}

/// `p` — SASLInitialResponse: selects a SASL mechanism and carries its
/// first client message. SASL continuation shares `PasswordMessage`'s raw
/// shape (tag `p`, no framing beyond the message length).
pub struct SaslInitialResponse<'a> {
    pub mechanism: &'a str,
    pub data: &'a [u8],
}

impl FrontendProtocol for SaslInitialResponse<'_> {
    const MSGTYPE: u8 = b'p';

    fn size_hint(&self) -> u32 {
        self.mechanism.nul_string_len() + 4 + self.data.len().to_u32()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.mechanism);
        buf.put_i32(self.data.len().to_u32() as i32);
        buf.put_slice(self.data);
    }
}

/// `Q` — Query (simple query protocol).
pub struct Query<'a> {
    pub sql: &'a str,
}

impl FrontendProtocol for Query<'_> {
    const MSGTYPE: u8 = b'Q';

    fn size_hint(&self) -> u32 {
        self.sql.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.sql);
    }
}

/// `P` — Parse: statement name, SQL text, optional parameter OID hints.
pub struct Parse<'a, I> {
    pub prepare_name: &'a str,
    pub sql: &'a str,
    pub oids_len: u16,
    pub oids: I,
}

impl<'a, I: Iterator<Item = u32> + Clone> FrontendProtocol for Parse<'a, I> {
    const MSGTYPE: u8 = b'P';

    fn size_hint(&self) -> u32 {
        self.prepare_name.nul_string_len() + self.sql.nul_string_len() + 2 + 4 * self.oids_len as u32
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.prepare_name);
        buf.put_nul_string(self.sql);
        buf.put_u16(self.oids_len);
        for oid in self.oids {
            buf.put_u32(oid);
        }
    }
}

/// `B` — Bind: portal name, statement name, parameter format codes,
/// length-prefixed parameter values, result format codes.
pub struct Bind<'a, ParamFmts, Params> {
    pub portal_name: &'a str,
    pub stmt_name: &'a str,
    pub param_formats_len: u16,
    pub param_formats: ParamFmts,
    pub params_len: u16,
    pub params_size_hint: u32,
    pub params: Params,
    pub result_formats_len: u16,
    pub result_formats: [u16; 1],
}

impl<'a, ParamFmts, Params, P> FrontendProtocol for Bind<'a, ParamFmts, Params>
where
    ParamFmts: IntoIterator<Item = u16>,
    Params: IntoIterator<Item = P>,
    P: BindParams,
{
    const MSGTYPE: u8 = b'B';

    fn size_hint(&self) -> u32 {
        self.portal_name.nul_string_len()
            + self.stmt_name.nul_string_len()
            + 2
            + 2 * self.param_formats_len as u32
            + 2
            + 4 * self.params_len as u32
            + self.params_size_hint
            + 2
            + 2 * self.result_formats_len as u32
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.portal_name);
        buf.put_nul_string(self.stmt_name);
        buf.put_u16(self.param_formats_len);
        for fmt in self.param_formats {
            buf.put_u16(fmt);
        }
        buf.put_u16(self.params_len);
        for mut value in self.params {
            buf.put_i32(value.size());
            while value.has_remaining() {
                let chunk = value.chunk();
                buf.put_slice(chunk);
                let n = chunk.len();
                value.advance(n);
            }
        }
        buf.put_u16(self.result_formats_len);
        for fmt in self.result_formats {
            buf.put_u16(fmt);
        }
    }
}

/// `E` — Execute: portal name, max rows (`0` = all).
pub struct Execute<'a> {
    pub portal_name: &'a str,
    pub max_rows: u32,
}

impl FrontendProtocol for Execute<'_> {
    const MSGTYPE: u8 = b'E';

    fn size_hint(&self) -> u32 {
        self.portal_name.nul_string_len() + 4
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.portal_name);
        buf.put_u32(self.max_rows);
    }
}

/// `D` — Describe: `kind` is `b'S'` (statement) or `b'P'` (portal).
pub struct Describe<'a> {
    pub kind: u8,
    pub name: &'a str,
}

impl FrontendProtocol for Describe<'_> {
    const MSGTYPE: u8 = b'D';

    fn size_hint(&self) -> u32 {
        1 + self.name.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(self.kind);
        buf.put_nul_string(self.name);
    }
}

/// `C` — Close: `variant` is `b'S'` (statement) or `b'P'` (portal).
pub struct Close<'a> {
    pub variant: u8,
    pub name: &'a str,
}

impl FrontendProtocol for Close<'_> {
    const MSGTYPE: u8 = b'C';

    fn size_hint(&self) -> u32 {
        1 + self.name.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_u8(self.variant);
        buf.put_nul_string(self.name);
    }
}

macro_rules! zero_size {
    ($name:ident, $tag:literal) => {
        pub struct $name;

        impl FrontendProtocol for $name {
            const MSGTYPE: u8 = $tag;

            fn size_hint(&self) -> u32 {
                0
            }

            fn encode(self, _: impl BufMut) {}
        }
    };
}

zero_size!(Sync, b'S');
zero_size!(Flush, b'H');
zero_size!(Terminate, b'X');
zero_size!(CopyDone, b'c');

/// `d` — CopyData, client → server direction (COPY IN).
pub struct CopyData<'a> {
    pub data: &'a [u8],
}

impl FrontendProtocol for CopyData<'_> {
    const MSGTYPE: u8 = b'd';

    fn size_hint(&self) -> u32 {
        self.data.len().to_u32()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_slice(self.data);
    }
}

/// `f` — CopyFail: abort a COPY IN with an explanatory message.
pub struct CopyFail<'a> {
    pub message: &'a str,
}

impl FrontendProtocol for CopyFail<'_> {
    const MSGTYPE: u8 = b'f';

    fn size_hint(&self) -> u32 {
        self.message.nul_string_len()
    }

    fn encode(self, mut buf: impl BufMut) {
        buf.put_nul_string(self.message);
    }
}
