//! Per-OID value codec registry (C11).
//!
//! Built-in encode/decode is provided for the common scalar OIDs; any other
//! OID is delegated to caller-registered codecs or passed through as typed
//! bytes. Registration happens once per OID and never replaces a built-in.
use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::RwLock;

mod array;
mod datetime;
mod scalar;

pub use array::{decode_elements, encode_elements};
pub use datetime::{DecodeTimestampError, decode_timestamp};
#[cfg(feature = "time")]
pub use datetime::{decode_offset_date_time, decode_primitive_date_time, encode_offset_date_time, encode_primitive_date_time};

/// A PostgreSQL type OID.
pub type Oid = u32;

/// bool
pub const BOOL: Oid = 16;
/// bytea
pub const BYTEA: Oid = 17;
/// char
pub const CHAR: Oid = 18;
/// int8
pub const INT8: Oid = 20;
/// int2
pub const INT2: Oid = 21;
/// int4
pub const INT4: Oid = 23;
/// text
pub const TEXT: Oid = 25;
/// float4
pub const FLOAT4: Oid = 700;
/// float8
pub const FLOAT8: Oid = 701;
/// varchar
pub const VARCHAR: Oid = 1043;
/// date
pub const DATE: Oid = 1082;
/// time
pub const TIME: Oid = 1083;
/// timestamp
pub const TIMESTAMP: Oid = 1114;
/// timestamptz
pub const TIMESTAMPTZ: Oid = 1184;
/// timetz
pub const TIMETZ: Oid = 1266;

/// A type with a well-known default OID, used to pick the wire type for a
/// bound parameter.
pub trait PgType {
    const OID: Oid;
}

macro_rules! oid {
    ($ty:ty => $oid:expr) => {
        impl PgType for $ty {
            const OID: Oid = $oid;
        }
    };
}

oid!(bool => BOOL);
oid!(i16 => INT2);
oid!(i32 => INT4);
oid!(i64 => INT8);
oid!(f32 => FLOAT4);
oid!(f64 => FLOAT8);
oid!(str => TEXT);
oid!(String => TEXT);
oid!([u8] => BYTEA);
oid!(Vec<u8> => BYTEA);
#[cfg(feature = "time")]
oid!(time::OffsetDateTime => TIMESTAMPTZ);
#[cfg(feature = "time")]
oid!(time::PrimitiveDateTime => TIMESTAMP);

/// A caller-registered decode callback for an OID not built in.
pub type DecodeFn = fn(&[u8]) -> Result<Box<dyn std::any::Any + Send>, String>;

fn registry() -> &'static RwLock<HashMap<Oid, DecodeFn>> {
    static REGISTRY: OnceLock<RwLock<HashMap<Oid, DecodeFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a decode callback for `oid`. A no-op if a callback is already
/// registered (built-ins are never overridden; the first registration for a
/// given OID wins).
pub fn register(oid: Oid, f: DecodeFn) {
    registry().write().unwrap().entry(oid).or_insert(f);
}

/// Look up a caller-registered decode callback for `oid`.
pub fn lookup(oid: Oid) -> Option<DecodeFn> {
    registry().read().unwrap().get(&oid).copied()
}

pub use scalar::{encode_bool, encode_bytea_hex, encode_text, parse_bool, parse_bytea, parse_bytea_escape, parse_bytea_hex};
