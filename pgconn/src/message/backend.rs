//! Backend (server → frontend) messages.
use bytes::{Buf, Bytes};
use std::collections::BTreeMap;

use crate::{
    common::ByteStr,
    ext::BytesExt,
    message::{PgFormat, error::ProtocolError},
};

/// A message received from the backend, decoded from its message type byte
/// and payload.
pub trait BackendProtocol: Sized {
    fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError>;
}

macro_rules! unit_msg {
    ($name:ident, $tag:literal) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl BackendProtocol for $name {
            fn decode(_: u8, _: Bytes) -> Result<Self, ProtocolError> {
                Ok(Self)
            }
        }

        impl $name {
            pub const MSGTYPE: u8 = $tag;
        }
    };
}

unit_msg!(ParseComplete, b'1');
unit_msg!(BindComplete, b'2');
unit_msg!(CloseComplete, b'3');
unit_msg!(EmptyQueryResponse, b'I');
unit_msg!(NoData, b'n');
unit_msg!(PortalSuspended, b's');
unit_msg!(CopyDone, b'c');

/// `R` — AuthenticationRequest. The four-byte subcode selects the variant.
///
/// <https://www.postgresql.org/docs/current/protocol-message-formats.html#PROTOCOL-MESSAGE-FORMATS-AUTHENTICATIONOK>
#[derive(Debug)]
pub enum Authentication {
    Ok,
    KerberosV5,
    CleartextPassword,
    MD5Password { salt: [u8; 4] },
    SCMCredential,
    GSS,
    GSSContinue { data: Bytes },
    SSPI,
    SASL { mechanisms: Vec<ByteStr> },
    SASLContinue { data: Bytes },
    SASLFinal { data: Bytes },
}

impl Authentication {
    pub const MSGTYPE: u8 = b'R';
}

impl BackendProtocol for Authentication {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let auth = match body.get_i32() {
            0 => Self::Ok,
            2 => Self::KerberosV5,
            3 => Self::CleartextPassword,
            5 => {
                if body.remaining() < 4 {
                    return Err(ProtocolError::malformed("AuthenticationMD5Password missing salt"));
                }
                let mut salt = [0u8; 4];
                body.copy_to_slice(&mut salt);
                Self::MD5Password { salt }
            }
            6 => Self::SCMCredential,
            7 => Self::GSS,
            8 => Self::GSSContinue { data: body },
            9 => Self::SSPI,
            10 => {
                let mut mechanisms = vec![];
                while !body.is_empty() && body[0] != 0 {
                    mechanisms.push(body.get_nul_bytestr().map_err(|e| {
                        ProtocolError::malformed(format!("SASL mechanism not utf8: {e}"))
                    })?);
                }
                Self::SASL { mechanisms }
            }
            11 => Self::SASLContinue { data: body },
            12 => Self::SASLFinal { data: body },
            code => return Err(ProtocolError::malformed(format!("unknown authentication code {code}"))),
        };
        Ok(auth)
    }
}

/// `K` — BackendKeyData: process id and secret key for cancel requests.
#[derive(Clone, Copy)]
pub struct BackendKeyData {
    pub process_id: i32,
    pub secret_key: i32,
}

impl BackendKeyData {
    pub const MSGTYPE: u8 = b'K';
}

impl BackendProtocol for BackendKeyData {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self { process_id: body.get_i32(), secret_key: body.get_i32() })
    }
}

impl std::fmt::Debug for BackendKeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendKeyData")
            .field("process_id", &self.process_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// `S` — ParameterStatus: a server-reported run-time parameter.
#[derive(Debug, Clone)]
pub struct ParameterStatus {
    pub name: ByteStr,
    pub value: ByteStr,
}

impl ParameterStatus {
    pub const MSGTYPE: u8 = b'S';
}

impl BackendProtocol for ParameterStatus {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let name = body.get_nul_bytestr()?;
        let value = body.get_nul_bytestr()?;
        Ok(Self { name, value })
    }
}

/// `Z` — ReadyForQuery: transaction status rendezvous.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ReadyForQuery {
    pub tx_status: u8,
}

impl ReadyForQuery {
    pub const MSGTYPE: u8 = b'Z';
}

impl BackendProtocol for ReadyForQuery {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self { tx_status: body.get_u8() })
    }
}

impl std::fmt::Debug for ReadyForQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.tx_status {
            b'I' => "Idle",
            b'T' => "InTransaction",
            b'E' => "InFailedTransaction",
            _ => "Unknown",
        };
        write!(f, "ReadyForQuery({status})")
    }
}

/// `C` — CommandComplete: the command tag for a completed SQL command.
#[derive(Debug, Clone)]
pub struct CommandComplete {
    pub tag: ByteStr,
}

impl CommandComplete {
    pub const MSGTYPE: u8 = b'C';
}

impl BackendProtocol for CommandComplete {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let tag = body.get_nul_bytestr().unwrap_or_else(|_| ByteStr::from_static(""));
        Ok(Self { tag })
    }
}

/// A single column descriptor from `RowDescription`.
///
/// <https://www.postgresql.org/docs/current/protocol-message-formats.html#PROTOCOL-MESSAGE-FORMATS-ROWDESCRIPTION>
#[derive(Debug, Clone)]
pub struct FieldDescription {
    pub name: ByteStr,
    pub table_oid: u32,
    pub attribute_number: i16,
    pub type_oid: u32,
    pub type_len: i16,
    pub type_modifier: i32,
    pub format: PgFormat,
}

/// `T` — RowDescription.
#[derive(Debug, Clone)]
pub struct RowDescription {
    pub fields: Vec<FieldDescription>,
}

impl RowDescription {
    pub const MSGTYPE: u8 = b'T';
}

impl BackendProtocol for RowDescription {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let count = body.get_i16();
        let mut fields = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            let name = body.get_nul_bytestr()?;
            let table_oid = body.get_u32();
            let attribute_number = body.get_i16();
            let type_oid = body.get_u32();
            let type_len = body.get_i16();
            let type_modifier = body.get_i32();
            let format = match body.get_i16() {
                0 => PgFormat::Text,
                1 => PgFormat::Binary,
                other => return Err(ProtocolError::malformed(format!("unknown format code {other}"))),
            };
            fields.push(FieldDescription {
                name,
                table_oid,
                attribute_number,
                type_oid,
                type_len,
                type_modifier,
                format,
            });
        }
        Ok(Self { fields })
    }
}

/// `D` — DataRow: raw column values, each length-prefixed (`-1` = NULL).
#[derive(Clone)]
pub struct DataRow {
    pub body: Bytes,
}

impl DataRow {
    pub const MSGTYPE: u8 = b'D';
}

impl BackendProtocol for DataRow {
    fn decode(_: u8, body: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self { body })
    }
}

impl std::fmt::Debug for DataRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRow").field("body", &self.body.len()).finish()
    }
}

/// `t` — ParameterDescription: inferred parameter OIDs from Describe.
#[derive(Debug, Clone)]
pub struct ParameterDescription {
    pub oids: Vec<u32>,
}

impl ParameterDescription {
    pub const MSGTYPE: u8 = b't';
}

impl BackendProtocol for ParameterDescription {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let count = body.get_i16();
        let mut oids = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            oids.push(body.get_u32());
        }
        Ok(Self { oids })
    }
}

/// `v` — NegotiateProtocolVersion.
#[derive(Debug, Clone)]
pub struct NegotiateProtocolVersion {
    pub minor: i32,
    pub unrecognized_options: Vec<ByteStr>,
}

impl NegotiateProtocolVersion {
    pub const MSGTYPE: u8 = b'v';
}

impl BackendProtocol for NegotiateProtocolVersion {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let minor = body.get_i32();
        let count = body.get_i32();
        let mut unrecognized_options = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            unrecognized_options.push(body.get_nul_bytestr()?);
        }
        Ok(Self { minor, unrecognized_options })
    }
}

/// One `(field_tag, value)` pair of an `ErrorResponse`/`NoticeResponse`
/// payload, decoded into a structured record.
///
/// <https://www.postgresql.org/docs/current/protocol-error-fields.html>
#[derive(Debug, Clone, Default)]
pub struct ErrorFields {
    pub severity: Option<ByteStr>,
    pub severity_nonlocalized: Option<ByteStr>,
    pub code: Option<ByteStr>,
    pub message: Option<ByteStr>,
    pub detail: Option<ByteStr>,
    pub hint: Option<ByteStr>,
    pub position: Option<ByteStr>,
    pub internal_position: Option<ByteStr>,
    pub internal_query: Option<ByteStr>,
    pub where_: Option<ByteStr>,
    pub schema: Option<ByteStr>,
    pub table: Option<ByteStr>,
    pub column: Option<ByteStr>,
    pub data_type: Option<ByteStr>,
    pub constraint: Option<ByteStr>,
    pub file: Option<ByteStr>,
    pub line: Option<ByteStr>,
    pub routine: Option<ByteStr>,
    /// Any field tag not recognised above, preserved rather than dropped.
    pub unknown: BTreeMap<u8, ByteStr>,
}

impl ErrorFields {
    fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let mut fields = Self::default();
        loop {
            let tag = body.get_u8();
            if tag == 0 {
                break;
            }
            let value = body.get_nul_bytestr()?;
            match tag {
                b'S' => fields.severity = Some(value),
                b'V' => fields.severity_nonlocalized = Some(value),
                b'C' => fields.code = Some(value),
                b'M' => fields.message = Some(value),
                b'D' => fields.detail = Some(value),
                b'H' => fields.hint = Some(value),
                b'P' => fields.position = Some(value),
                b'p' => fields.internal_position = Some(value),
                b'q' => fields.internal_query = Some(value),
                b'W' => fields.where_ = Some(value),
                b's' => fields.schema = Some(value),
                b't' => fields.table = Some(value),
                b'c' => fields.column = Some(value),
                b'd' => fields.data_type = Some(value),
                b'n' => fields.constraint = Some(value),
                b'F' => fields.file = Some(value),
                b'L' => fields.line = Some(value),
                b'R' => fields.routine = Some(value),
                other => {
                    fields.unknown.insert(other, value);
                }
            }
        }
        Ok(fields)
    }

    /// `true` for severities that make the connection unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self.severity_nonlocalized.as_deref().or(self.severity.as_deref()), Some("FATAL") | Some("PANIC"))
            || self.code.as_deref().is_some_and(|c| c.starts_with("08"))
    }
}

/// `E` — ErrorResponse.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub fields: ErrorFields,
}

impl ErrorResponse {
    pub const MSGTYPE: u8 = b'E';

    pub fn is_fatal(&self) -> bool {
        self.fields.is_fatal()
    }
}

impl BackendProtocol for ErrorResponse {
    fn decode(_: u8, body: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self { fields: ErrorFields::decode(body)? })
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.fields.code.as_deref().unwrap_or("?????"),
            self.fields.message.as_deref().unwrap_or(""),
        )
    }
}

impl std::error::Error for ErrorResponse {}

/// `N` — NoticeResponse. Same layout as `ErrorResponse`, never latches.
#[derive(Debug, Clone)]
pub struct NoticeResponse {
    pub fields: ErrorFields,
}

impl NoticeResponse {
    pub const MSGTYPE: u8 = b'N';
}

impl BackendProtocol for NoticeResponse {
    fn decode(_: u8, body: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self { fields: ErrorFields::decode(body)? })
    }
}

/// `A` — NotificationResponse, delivered by LISTEN/NOTIFY.
#[derive(Debug, Clone)]
pub struct NotificationResponse {
    pub process_id: i32,
    pub channel: ByteStr,
    pub payload: ByteStr,
}

impl NotificationResponse {
    pub const MSGTYPE: u8 = b'A';
}

impl BackendProtocol for NotificationResponse {
    fn decode(_: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let process_id = body.get_i32();
        let channel = body.get_nul_bytestr()?;
        let payload = body.get_nul_bytestr()?;
        Ok(Self { process_id, channel, payload })
    }
}

/// Direction distinguishing `G` CopyInResponse from `H` CopyOutResponse;
/// both share the same payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDirection {
    In,
    Out,
}

/// `G` — CopyInResponse / `H` — CopyOutResponse.
#[derive(Debug, Clone)]
pub struct CopyResponse {
    pub direction: CopyDirection,
    pub overall_format: u8,
    pub column_formats: Vec<i16>,
}

impl CopyResponse {
    pub const MSGTYPE_IN: u8 = b'G';
    pub const MSGTYPE_OUT: u8 = b'H';
}

impl BackendProtocol for CopyResponse {
    fn decode(msgtype: u8, mut body: Bytes) -> Result<Self, ProtocolError> {
        let direction = if msgtype == Self::MSGTYPE_IN { CopyDirection::In } else { CopyDirection::Out };
        let overall_format = body.get_u8();
        let count = body.get_i16();
        let mut column_formats = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            column_formats.push(body.get_i16());
        }
        Ok(Self { direction, overall_format, column_formats })
    }
}

/// `d` — CopyData, server → client direction (COPY OUT).
#[derive(Clone)]
pub struct CopyData {
    pub data: Bytes,
}

impl CopyData {
    pub const MSGTYPE: u8 = b'd';
}

impl BackendProtocol for CopyData {
    fn decode(_: u8, body: Bytes) -> Result<Self, ProtocolError> {
        Ok(Self { data: body })
    }
}

/// The union of every backend message kind recognised by the driver,
/// dispatched on the message type byte by [`BackendMessage::decode`].
#[derive(Debug)]
pub enum BackendMessage {
    Authentication(Authentication),
    BackendKeyData(BackendKeyData),
    BindComplete(BindComplete),
    CloseComplete(CloseComplete),
    CommandComplete(CommandComplete),
    CopyData(CopyData),
    CopyDone(CopyDone),
    CopyResponse(CopyResponse),
    DataRow(DataRow),
    EmptyQueryResponse(EmptyQueryResponse),
    ErrorResponse(ErrorResponse),
    NegotiateProtocolVersion(NegotiateProtocolVersion),
    NoData(NoData),
    NoticeResponse(NoticeResponse),
    NotificationResponse(NotificationResponse),
    ParameterDescription(ParameterDescription),
    ParameterStatus(ParameterStatus),
    ParseComplete(ParseComplete),
    PortalSuspended(PortalSuspended),
    ReadyForQuery(ReadyForQuery),
    RowDescription(RowDescription),
}

impl BackendMessage {
    /// Name used in tracing/error messages; not part of the wire format.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "Authentication",
            Self::BackendKeyData(_) => "BackendKeyData",
            Self::BindComplete(_) => "BindComplete",
            Self::CloseComplete(_) => "CloseComplete",
            Self::CommandComplete(_) => "CommandComplete",
            Self::CopyData(_) => "CopyData",
            Self::CopyDone(_) => "CopyDone",
            Self::CopyResponse(_) => "CopyResponse",
            Self::DataRow(_) => "DataRow",
            Self::EmptyQueryResponse(_) => "EmptyQueryResponse",
            Self::ErrorResponse(_) => "ErrorResponse",
            Self::NegotiateProtocolVersion(_) => "NegotiateProtocolVersion",
            Self::NoData(_) => "NoData",
            Self::NoticeResponse(_) => "NoticeResponse",
            Self::NotificationResponse(_) => "NotificationResponse",
            Self::ParameterDescription(_) => "ParameterDescription",
            Self::ParameterStatus(_) => "ParameterStatus",
            Self::ParseComplete(_) => "ParseComplete",
            Self::PortalSuspended(_) => "PortalSuspended",
            Self::ReadyForQuery(_) => "ReadyForQuery",
            Self::RowDescription(_) => "RowDescription",
        }
    }

    pub fn unexpected(&self, phase: &'static str) -> ProtocolError {
        ProtocolError::unexpected(self.msgtype(), phase)
    }

    fn msgtype(&self) -> u8 {
        match self {
            Self::Authentication(_) => Authentication::MSGTYPE,
            Self::BackendKeyData(_) => BackendKeyData::MSGTYPE,
            Self::BindComplete(_) => BindComplete::MSGTYPE,
            Self::CloseComplete(_) => CloseComplete::MSGTYPE,
            Self::CommandComplete(_) => CommandComplete::MSGTYPE,
            Self::CopyData(_) => CopyData::MSGTYPE,
            Self::CopyDone(_) => CopyDone::MSGTYPE,
            Self::CopyResponse(c) => match c.direction {
                CopyDirection::In => CopyResponse::MSGTYPE_IN,
                CopyDirection::Out => CopyResponse::MSGTYPE_OUT,
            },
            Self::DataRow(_) => DataRow::MSGTYPE,
            Self::EmptyQueryResponse(_) => EmptyQueryResponse::MSGTYPE,
            Self::ErrorResponse(_) => ErrorResponse::MSGTYPE,
            Self::NegotiateProtocolVersion(_) => NegotiateProtocolVersion::MSGTYPE,
            Self::NoData(_) => NoData::MSGTYPE,
            Self::NoticeResponse(_) => NoticeResponse::MSGTYPE,
            Self::NotificationResponse(_) => NotificationResponse::MSGTYPE,
            Self::ParameterDescription(_) => ParameterDescription::MSGTYPE,
            Self::ParameterStatus(_) => ParameterStatus::MSGTYPE,
            Self::ParseComplete(_) => ParseComplete::MSGTYPE,
            Self::PortalSuspended(_) => PortalSuspended::MSGTYPE,
            Self::ReadyForQuery(_) => ReadyForQuery::MSGTYPE,
            Self::RowDescription(_) => RowDescription::MSGTYPE,
        }
    }
}

impl BackendProtocol for BackendMessage {
    fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError> {
        Ok(match msgtype {
            Authentication::MSGTYPE => Self::Authentication(Authentication::decode(msgtype, body)?),
            BackendKeyData::MSGTYPE => Self::BackendKeyData(BackendKeyData::decode(msgtype, body)?),
            BindComplete::MSGTYPE => Self::BindComplete(BindComplete::decode(msgtype, body)?),
            CloseComplete::MSGTYPE => Self::CloseComplete(CloseComplete::decode(msgtype, body)?),
            CommandComplete::MSGTYPE => Self::CommandComplete(CommandComplete::decode(msgtype, body)?),
            CopyData::MSGTYPE => Self::CopyData(CopyData::decode(msgtype, body)?),
            CopyDone::MSGTYPE => Self::CopyDone(CopyDone::decode(msgtype, body)?),
            CopyResponse::MSGTYPE_IN | CopyResponse::MSGTYPE_OUT => {
                Self::CopyResponse(CopyResponse::decode(msgtype, body)?)
            }
            DataRow::MSGTYPE => Self::DataRow(DataRow::decode(msgtype, body)?),
            EmptyQueryResponse::MSGTYPE => Self::EmptyQueryResponse(EmptyQueryResponse::decode(msgtype, body)?),
            ErrorResponse::MSGTYPE => Self::ErrorResponse(ErrorResponse::decode(msgtype, body)?),
            NegotiateProtocolVersion::MSGTYPE => {
                Self::NegotiateProtocolVersion(NegotiateProtocolVersion::decode(msgtype, body)?)
            }
            NoData::MSGTYPE => Self::NoData(NoData::decode(msgtype, body)?),
            NoticeResponse::MSGTYPE => Self::NoticeResponse(NoticeResponse::decode(msgtype, body)?),
            NotificationResponse::MSGTYPE => Self::NotificationResponse(NotificationResponse::decode(msgtype, body)?),
            ParameterDescription::MSGTYPE => Self::ParameterDescription(ParameterDescription::decode(msgtype, body)?),
            ParameterStatus::MSGTYPE => Self::ParameterStatus(ParameterStatus::decode(msgtype, body)?),
            ParseComplete::MSGTYPE => Self::ParseComplete(ParseComplete::decode(msgtype, body)?),
            PortalSuspended::MSGTYPE => Self::PortalSuspended(PortalSuspended::decode(msgtype, body)?),
            ReadyForQuery::MSGTYPE => Self::ReadyForQuery(ReadyForQuery::decode(msgtype, body)?),
            RowDescription::MSGTYPE => Self::RowDescription(RowDescription::decode(msgtype, body)?),
            other => return Err(ProtocolError::malformed(format!("unknown backend message type {other:?}", ))),
        })
    }
}
