//! Parameter encoding for the extended query path (C8/C11): turning Rust
//! values into the length-prefixed, OID-tagged wire format `Bind` expects.
//!
//! Grounded in `postro::value::ValueRef` for the borrowed-or-owned value
//! representation, simplified to drop the teacher's 15-byte inline
//! optimization (not worth the complexity for this driver's scope) and
//! adapted to always produce **text**-format bytes: this driver binds
//! parameters and requests results in text format uniformly (see
//! `DESIGN.md`), so there is one encode path per type rather than a
//! text/binary pair.
use bytes::{Buf, Bytes};

use crate::{
    codec::{self, Oid},
    ext::BindParams,
    value::ValueRef,
};

/// An encoded bind parameter: its declared OID plus the text-format bytes,
/// or `None` for SQL `NULL`.
pub struct Encoded<'a> {
    pub(crate) oid: Oid,
    pub(crate) value: Option<ValueRef<'a>>,
}

impl Encoded<'_> {
    pub(crate) fn null(oid: Oid) -> Self {
        Self { oid, value: None }
    }

    pub(crate) fn oid(&self) -> Oid {
        self.oid
    }
}

impl Buf for Encoded<'_> {
    fn remaining(&self) -> usize {
        self.value.as_ref().map_or(0, |v| Buf::remaining(v))
    }

    fn chunk(&self) -> &[u8] {
        self.value.as_ref().map_or(&[], |v| Buf::chunk(v))
    }

    fn advance(&mut self, cnt: usize) {
        if let Some(value) = &mut self.value {
            Buf::advance(value, cnt);
        }
    }
}

impl BindParams for Encoded<'_> {
    fn size(&self) -> i32 {
        match &self.value {
            None => -1,
            Some(v) => v.remaining() as i32,
        }
    }
}

/// A type that can be bound as a query parameter.
pub trait Encode {
    /// Encode self to a wire-ready [`Encoded`] value, borrowing from `self`
    /// where possible.
    fn encode(&self) -> Encoded<'_>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self) -> Encoded<'_> {
        (**self).encode()
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self) -> Encoded<'_> {
        match self {
            Some(v) => v.encode(),
            // OID 0 tells the server to infer the parameter type from
            // context; correct for every case but a genuinely ambiguous
            // expression (e.g. `NULL = NULL`), which Parse would already
            // need an explicit cast for regardless of this driver.
            None => Encoded::null(0),
        }
    }
}

impl Encode for bool {
    fn encode(&self) -> Encoded<'_> {
        Encoded { oid: codec::BOOL, value: Some(ValueRef::Slice(codec::encode_bool(*self).as_bytes())) }
    }
}

macro_rules! encode_num {
    ($($ty:ty => $oid:expr),* $(,)?) => {
        $(impl Encode for $ty {
            fn encode(&self) -> Encoded<'_> {
                Encoded { oid: $oid, value: Some(ValueRef::Owned(Bytes::from(self.to_string()))) }
            }
        })*
    };
}

encode_num! {
    i16 => codec::INT2,
    i32 => codec::INT4,
    i64 => codec::INT8,
    f32 => codec::FLOAT4,
    f64 => codec::FLOAT8,
}

impl Encode for str {
    fn encode(&self) -> Encoded<'_> {
        Encoded { oid: codec::TEXT, value: Some(ValueRef::Slice(self.as_bytes())) }
    }
}

impl Encode for String {
    fn encode(&self) -> Encoded<'_> {
        self.as_str().encode()
    }
}

impl Encode for [u8] {
    fn encode(&self) -> Encoded<'_> {
        Encoded { oid: codec::BYTEA, value: Some(ValueRef::Owned(Bytes::from(codec::encode_bytea_hex(self)))) }
    }
}

impl Encode for Vec<u8> {
    fn encode(&self) -> Encoded<'_> {
        self.as_slice().encode()
    }
}

/// Encodes as a one-dimensional array literal (`{elem,elem,...}`), with
/// each element text-encoded through `T`'s own [`Encode`] impl. Bound with
/// OID `0` (server-inferred) since this driver has no table of element OID
/// to array OID; see `DESIGN.md`.
impl<T: Encode> Encode for Vec<T> {
    fn encode(&self) -> Encoded<'_> {
        let rendered: Vec<Bytes> = self
            .iter()
            .map(|v| match v.encode().value {
                Some(mut value) => {
                    let len = Buf::remaining(&value);
                    value.copy_to_bytes(len)
                }
                None => Bytes::new(),
            })
            .collect();
        let texts: Vec<Option<&str>> =
            rendered.iter().map(|b| std::str::from_utf8(b).ok()).collect();
        let text = codec::encode_elements(texts);
        Encoded { oid: 0, value: Some(ValueRef::Owned(Bytes::from(text))) }
    }
}

#[cfg(feature = "time")]
impl Encode for time::PrimitiveDateTime {
    fn encode(&self) -> Encoded<'_> {
        Encoded {
            oid: codec::TIMESTAMP,
            value: Some(ValueRef::Owned(Bytes::from(codec::encode_primitive_date_time(self)))),
        }
    }
}

#[cfg(feature = "time")]
impl Encode for time::OffsetDateTime {
    fn encode(&self) -> Encoded<'_> {
        Encoded {
            oid: codec::TIMESTAMPTZ,
            value: Some(ValueRef::Owned(Bytes::from(codec::encode_offset_date_time(self)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(encoded: &Encoded<'_>) -> &str {
        std::str::from_utf8(encoded.value.as_ref().unwrap().chunk()).unwrap()
    }

    #[test]
    fn encodes_scalars_as_text() {
        assert_eq!(text(&42i32.encode()), "42");
        assert_eq!(text(&true.encode()), "t");
        assert_eq!(text(&false.encode()), "f");
        assert_eq!(text(&"hello".encode()), "hello");
        assert_eq!(text(&3.5f64.encode()), "3.5");
    }

    #[test]
    fn encodes_bytea_as_hex() {
        assert_eq!(text(&[0xDEu8, 0xAD].encode()), "\\xdead");
    }

    #[test]
    fn none_encodes_as_null_with_zero_size() {
        let encoded: Encoded<'_> = Option::<i32>::None.encode();
        assert!(encoded.value.is_none());
        assert_eq!(BindParams::size(&encoded), -1);
    }

    #[test]
    fn some_delegates_to_inner_oid() {
        let encoded = Some(7i32).encode();
        assert_eq!(encoded.oid(), codec::INT4);
        assert_eq!(text(&encoded), "7");
    }

    #[test]
    fn encodes_vec_as_array_literal() {
        let values = vec![1i32, 2, 3];
        let encoded = values.encode();
        assert_eq!(encoded.oid(), 0);
        assert_eq!(text(&encoded), "{1,2,3}");
    }

    #[test]
    fn encodes_vec_of_strings_with_quoting() {
        let values = vec!["plain".to_string(), "has,comma".to_string()];
        let encoded = values.encode();
        assert_eq!(text(&encoded), r#"{plain,"has,comma"}"#);
    }
}
