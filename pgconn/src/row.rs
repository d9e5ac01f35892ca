//! Postgres row operations (part of C8/C11 — result decoding).
//!
//! - [`Row`]
//! - [`Column`]
//! - [`FromRow`]
//! - [`Decode`]
//! - [`Index`]
//! - [`DecodeError`]
//!
//! Every built-in [`Decode`] impl here reads the server's **text** format:
//! this driver requests results in text format uniformly (see
//! `DESIGN.md`), so there is only one decode path per type rather than a
//! text/binary pair.
use bytes::Bytes;
use std::{borrow::Cow, fmt, str::Utf8Error, string::FromUtf8Error, sync::Arc};

use crate::{
    codec::{self, Oid},
    common::unit_error,
    message::backend::{DataRow, FieldDescription, RowDescription},
};

/// A row returned from a query, with its [`RowDescription`] shared across
/// every row from the same result set.
#[derive(Clone)]
pub struct Row {
    fields: Arc<[FieldDescription]>,
    values: Vec<Option<Bytes>>,
}

impl Row {
    /// Build the shared field list once per `RowDescription`; reused across
    /// every `DataRow` in the same result set via [`Row::from_data`].
    pub(crate) fn shared_fields(description: &RowDescription) -> Arc<[FieldDescription]> {
        description.fields.clone().into()
    }

    pub(crate) fn from_data(fields: Arc<[FieldDescription]>, data: DataRow) -> Result<Self, DecodeError> {
        use bytes::Buf;

        let mut values = Vec::with_capacity(fields.len());
        let mut body = data.body;
        for _ in 0..fields.len() {
            let len = body.get_i32();
            values.push(match len {
                -1 => None,
                len if len < 0 => return Err(DecodeError::Malformed(format!("negative column length {len}"))),
                len => Some(body.split_to(len as usize)),
            });
        }
        Ok(Self { fields, values })
    }

    #[cfg(test)]
    pub(crate) fn new(description: &RowDescription, data: DataRow) -> Result<Self, DecodeError> {
        Self::from_data(Self::shared_fields(description), data)
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields/columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Try get and decode column.
    pub fn try_get<I: Index, R: Decode>(&self, idx: I) -> Result<R, DecodeError> {
        let nth = idx.position(&self.fields)?;
        let field = &self.fields[nth];
        let value = self.values[nth].clone();
        R::decode(Column::new(field.name.as_ref().into(), field.type_oid, value))
    }

    /// Try decode type using [`FromRow`] implementation.
    pub fn decode<D: FromRow>(self) -> Result<D, DecodeError> {
        D::from_row(self)
    }

    /// Iterate over this row's columns by name/oid/value, in wire order.
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.fields.iter().zip(self.values.iter()).map(|(field, value)| {
            Column::new(field.name.as_ref().into(), field.type_oid, value.clone())
        })
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for column in self.columns() {
            match column.value {
                None => dbg.entry(&column.name, &format_args!("NULL")),
                Some(v) => dbg.entry(&column.name, &String::from_utf8_lossy(&v)),
            };
        }
        dbg.finish()
    }
}

/// A single column's name, type OID and raw text-format value.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    oid: Oid,
    value: Option<Bytes>,
}

impl Column {
    fn new(name: String, oid: Oid, value: Option<Bytes>) -> Self {
        Self { name, oid, value }
    }

    /// Returns column [`Oid`].
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Returns column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if value is NULL.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Raw text-format value, or `None` for NULL.
    pub fn as_slice(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Consume self into the inner raw value.
    pub fn into_value(self) -> Option<Bytes> {
        self.value
    }

    /// Try consume self into the inner value, erroring on NULL.
    pub fn try_into_value(self) -> Result<Bytes, DecodeError> {
        self.value.ok_or(DecodeError::Null)
    }

    /// Decode this column's raw text as UTF-8 `str`, erroring on NULL.
    pub fn try_into_text(self) -> Result<String, DecodeError> {
        Ok(String::from_utf8(self.try_into_value()?.into())?)
    }

    /// Try decode type using [`Decode`] implementation.
    pub fn decode<D: Decode>(self) -> Result<D, DecodeError> {
        D::decode(self)
    }
}

/// The number of rows a command affected, as reported by `CommandComplete`.
#[derive(Debug, Clone, Copy)]
pub struct RowResult {
    pub rows_affected: u64,
}

// ===== Traits =====

/// A type that can be constructed from an entire [`Row`].
pub trait FromRow: Sized {
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRow for ($($t),*,)
        where
            $($t: Decode),*
        {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                Ok(($(row.try_get::<usize, $t>($i)?),*,))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4);

/// A type that can be constructed from a [`Column`]'s raw text-format value.
pub trait Decode: Sized {
    fn decode(column: Column) -> Result<Self, DecodeError>;
}

impl Decode for Column {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.is_null() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

impl Decode for () {
    fn decode(_: Column) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl Decode for bool {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        let text = col.try_into_text()?;
        codec::parse_bool(&text).map_err(DecodeError::Malformed)
    }
}

impl Decode for Vec<u8> {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        let text = col.try_into_text()?;
        codec::parse_bytea(&text).map_err(DecodeError::Malformed)
    }
}

impl Decode for String {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        col.try_into_text()
    }
}

macro_rules! decode_num {
    ($($ty:ty),*) => {
        $(impl Decode for $ty {
            fn decode(col: Column) -> Result<Self, DecodeError> {
                let text = col.try_into_text()?;
                text.parse().map_err(|_| DecodeError::Malformed(format!("invalid {} text {text:?}", stringify!($ty))))
            }
        })*
    };
}

decode_num!(i16, i32, i64, f32, f64);

/// Decodes a one-dimensional array column (`{elem,elem,...}` text format)
/// element-by-element through `T`'s own [`Decode`] impl.
impl<T: Decode> Decode for Vec<T> {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        let oid = col.oid();
        let text = col.try_into_text()?;
        let elements = codec::decode_elements(&text).map_err(DecodeError::Malformed)?;
        elements
            .into_iter()
            .map(|element| {
                let value = element.map(|s| Bytes::from(s.into_bytes()));
                T::decode(Column::new(String::new(), oid, value))
            })
            .collect()
    }
}

#[cfg(feature = "time")]
impl Decode for time::OffsetDateTime {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        let text = col.try_into_text()?;
        codec::decode_offset_date_time(&text).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

#[cfg(feature = "time")]
impl Decode for time::PrimitiveDateTime {
    fn decode(col: Column) -> Result<Self, DecodeError> {
        let text = col.try_into_text()?;
        codec::decode_primitive_date_time(&text).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

/// A type that can be used for indexing a column within a [`Row`].
pub trait Index: Sized + sealed::Sealed {
    /// Returns the position of the matching field, in wire order.
    fn position(self, fields: &[FieldDescription]) -> Result<usize, DecodeError>;
}

impl Index for usize {
    fn position(self, fields: &[FieldDescription]) -> Result<usize, DecodeError> {
        if self < fields.len() {
            Ok(self)
        } else {
            Err(DecodeError::IndexOutOfBounds(self))
        }
    }
}

impl Index for &str {
    fn position(self, fields: &[FieldDescription]) -> Result<usize, DecodeError> {
        fields
            .iter()
            .position(|f| f.name.as_ref() == self)
            .ok_or_else(|| DecodeError::ColumnNotFound(String::from(self).into()))
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for usize {}
    impl Sealed for &str {}
}

unit_error! {
    /// An error from [`fetch_one`][crate::query::Query::fetch_one] when the
    /// query returned no row.
    pub struct RowNotFound("row not found");
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for DecodeError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

/// An error decoding a row or column value.
pub enum DecodeError {
    /// Server returned non-UTF8 text where UTF-8 was expected.
    Utf8(Utf8Error),
    /// Column requested not found.
    ColumnNotFound(Cow<'static, str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Value did not match its declared text representation.
    Malformed(String),
    /// Column is NULL where a non-optional type was requested.
    Null,
    /// Failed to deserialize using `serde_json`.
    #[cfg(feature = "json")]
    Json(serde_json::error::Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value: ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name:?}"),
            Self::IndexOutOfBounds(i) => write!(f, "index out of bounds: {i}"),
            Self::Malformed(msg) => write!(f, "{msg}"),
            Self::Null => write!(f, "unexpected NULL value"),
            #[cfg(feature = "json")]
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

from!(<Utf8Error>e => Self::Utf8(e));
from!(<FromUtf8Error>e => Self::Utf8(e.utf8_error()));
#[cfg(feature = "json")]
from!(<serde_json::error::Error>e => Self::Json(e));

impl std::error::Error for DecodeError {}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::backend::FieldDescription;
    use crate::message::format::PgFormat;

    fn field(name: &str, oid: Oid) -> FieldDescription {
        FieldDescription {
            name: crate::common::ByteStr::copy_from_str(name),
            table_oid: 0,
            attribute_number: 0,
            type_oid: oid,
            type_len: -1,
            type_modifier: -1,
            format: PgFormat::Text,
        }
    }

    fn row_from(fields: Vec<FieldDescription>, values: &[Option<&[u8]>]) -> Row {
        use bytes::BufMut;
        let mut body = bytes::BytesMut::new();
        for v in values {
            match v {
                None => body.put_i32(-1),
                Some(bytes) => {
                    body.put_i32(bytes.len() as i32);
                    body.put_slice(bytes);
                }
            }
        }
        let description = RowDescription { fields };
        Row::new(&description, DataRow { body: body.freeze() }).unwrap()
    }

    #[test]
    fn decodes_scalar_columns_by_index_and_name() {
        let row = row_from(
            vec![field("id", codec::INT4), field("name", codec::TEXT)],
            &[Some(b"42"), Some(b"alice")],
        );
        let id: i32 = row.try_get(0).unwrap();
        let name: String = row.try_get("name").unwrap();
        assert_eq!(id, 42);
        assert_eq!(name, "alice");
    }

    #[test]
    fn null_column_decodes_to_none() {
        let row = row_from(vec![field("n", codec::INT4)], &[None]);
        let n: Option<i32> = row.try_get(0).unwrap();
        assert_eq!(n, None);
    }

    #[test]
    fn null_column_errors_for_non_optional() {
        let row = row_from(vec![field("n", codec::INT4)], &[None]);
        let err = row.try_get::<usize, i32>(0).unwrap_err();
        assert!(matches!(err, DecodeError::Null));
    }

    #[test]
    fn unknown_column_name_errors() {
        let row = row_from(vec![field("id", codec::INT4)], &[Some(b"1")]);
        let err = row.try_get::<&str, i32>("missing").unwrap_err();
        assert!(matches!(err, DecodeError::ColumnNotFound(_)));
    }

    #[test]
    fn decodes_int_array_column() {
        let row = row_from(vec![field("ids", codec::INT4)], &[Some(b"{1,2,3}")]);
        let ids: Vec<i32> = row.try_get(0).unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn decodes_array_with_null_element_as_optional() {
        let row = row_from(vec![field("ids", codec::INT4)], &[Some(b"{1,NULL,3}")]);
        let ids: Vec<Option<i32>> = row.try_get(0).unwrap();
        assert_eq!(ids, vec![Some(1), None, Some(3)]);
    }

    #[test]
    fn tuple_from_row() {
        let row = row_from(
            vec![field("id", codec::INT4), field("ok", codec::BOOL)],
            &[Some(b"7"), Some(b"t")],
        );
        let (id, ok): (i32, bool) = row.decode().unwrap();
        assert_eq!(id, 7);
        assert!(ok);
    }
}
