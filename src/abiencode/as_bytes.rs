//! Serialize any `&[u8]` as solidity `bytes` (dynamic length bytes).
//!
//! Without this, it would be serialized to a `uint8[]` of fixed or dynamic
//! length.
//!
//! # Example usage
//! ```ignore
//! # // We cannot run this test because abiencode is not public.
//! # use serde::Serialize;
//! # use statechannel::abiencode::as_bytes;
//!
//! #[derive(Serialize, Debug)]
//! pub struct Commitment {
//!     #[serde(with = "as_bytes")]
//!     pub call_data: Vec<u8>,
//! }
//! ```

use super::ser::DYN_BYTES_NAME;
use serde::{ser::SerializeTupleStruct, Serialize, Serializer};

/// Lets us hand the raw data to `serialize_bytes`, which unfortunately cannot
/// be selected when calling `serialize_field`.
struct Bytes<'a>(&'a [u8]);

impl<'a> Serialize for Bytes<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.0)
    }
}

pub fn serialize<S>(v: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut s = serializer.serialize_tuple_struct(DYN_BYTES_NAME, 2)?;
    s.serialize_field(&(v.len() as u64))?; // Length without padding
    s.serialize_field(&Bytes(v))?; // Data, padded to full slots
    s.end()
}
