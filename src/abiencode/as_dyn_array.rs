//! Serialize any `&[T]` as solidity `T[]` (dynamic length array).
//!
//! Fixed-size Rust arrays are encoded as `T[N]` by default, use this when the
//! Solidity side expects a dynamic array of known length.

use serde::ser::{Serialize, SerializeSeq, Serializer};

pub fn serialize<S, T>(v: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut s = serializer.serialize_seq(Some(v.len()))?;
    for e in v {
        s.serialize_element(e)?;
    }
    s.end()
}
