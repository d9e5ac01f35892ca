use bytes::{Buf, Bytes};

/// A borrowed-or-owned byte value bound to a query parameter.
#[derive(Debug)]
pub(crate) enum ValueRef<'a> {
    Slice(&'a [u8]),
    Owned(Bytes),
}

impl Buf for ValueRef<'_> {
    fn remaining(&self) -> usize {
        match self {
            Self::Slice(s) => Buf::remaining(s),
            Self::Owned(b) => Buf::remaining(b),
        }
    }

    fn chunk(&self) -> &[u8] {
        match self {
            Self::Slice(s) => Buf::chunk(s),
            Self::Owned(b) => Buf::chunk(b),
        }
    }

    fn advance(&mut self, cnt: usize) {
        match self {
            Self::Slice(s) => Buf::advance(s, cnt),
            Self::Owned(b) => Buf::advance(b, cnt),
        }
    }
}
