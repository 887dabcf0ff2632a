use super::{
    error::{Error, Result},
    token::{encode_sequence, flatten_words, word_to_usize, Token},
};
use serde::{
    ser::{self, Impossible, SerializeSeq, SerializeStruct, SerializeTuple, SerializeTupleStruct},
    Serialize,
};

/// Type name used for marking a `(length, data)` tuple struct as solidity
/// `bytes`.
///
/// Due to limitations of the [serde::Serializer] trait we cannot represent the
/// solidity types `bytes` and `bytes32` at the same time: `bytes32` and other
/// fixed-size values (addresses, `uint256`) are written through
/// `serialize_bytes`, so `bytes` needs a different route. The characters have
/// no special meaning, they have just been chosen in a way that normal Rust
/// types will never have this name. Use [as_bytes][super::as_bytes] instead of
/// this marker directly.
pub(super) const DYN_BYTES_NAME: &str = ":$&_BYTES";

/// Receives the encoded output slot by slot (32 bytes each).
pub trait Writer {
    fn write(&mut self, slot: &[u8]);
}

impl Writer for Vec<u8> {
    fn write(&mut self, slot: &[u8]) {
        self.extend_from_slice(slot);
    }
}

/// Lowers any [Serialize] value into a [Token].
#[derive(Debug, Default, Clone, Copy)]
pub struct Serializer;

pub(super) fn to_token<T>(value: &T) -> Result<Token>
where
    T: Serialize + ?Sized,
{
    value.serialize(Serializer)
}

/// Equivalent of solidity's `abi.encode(value)`.
///
/// Dynamic values get the leading offset (0x20) Solidity writes for them.
pub fn to_writer<T, W>(value: &T, writer: &mut W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Writer,
{
    encode_sequence(&[to_token(value)?], writer);
    Ok(())
}

/// `abi.encode(value)` collected into a byte vector.
#[cfg(test)]
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    let mut buf = Vec::new();
    to_writer(value, &mut buf)?;
    Ok(buf)
}

/// Encode the fields of `value` the way Solidity encodes function arguments,
/// without the outer offset.
#[cfg(test)]
pub fn to_fnargs_writer<T, W>(value: &T, writer: &mut W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Writer,
{
    to_token(value)?.encode(writer);
    Ok(())
}

macro_rules! serialize_unsigned {
    ($($method:ident: $t:ty),* $(,)?) => {
        $(
            fn $method(self, v: $t) -> Result<Token> {
                Ok(Token::right_aligned(&v.to_be_bytes()))
            }
        )*
    };
}

macro_rules! serialize_signed {
    ($($method:ident: $t:ty),* $(,)?) => {
        $(
            fn $method(self, v: $t) -> Result<Token> {
                Ok(Token::signed(v < 0, &v.to_be_bytes()))
            }
        )*
    };
}

impl ser::Serializer for Serializer {
    type Ok = Token;
    type Error = Error;

    type SerializeSeq = Collector;
    type SerializeTuple = Collector;
    type SerializeTupleStruct = Collector;
    type SerializeTupleVariant = Impossible<Token, Error>;
    type SerializeMap = Impossible<Token, Error>;
    type SerializeStruct = Collector;
    type SerializeStructVariant = Impossible<Token, Error>;

    fn serialize_bool(self, v: bool) -> Result<Token> {
        self.serialize_u8(u8::from(v))
    }

    serialize_unsigned!(
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
    );

    serialize_signed!(
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
    );

    fn serialize_f32(self, _: f32) -> Result<Token> {
        Err(Error::TypeNotRepresentable("f32"))
    }

    fn serialize_f64(self, _: f64) -> Result<Token> {
        Err(Error::TypeNotRepresentable("f64"))
    }

    fn serialize_char(self, _: char) -> Result<Token> {
        Err(Error::TypeNotYetSupported("char"))
    }

    fn serialize_str(self, v: &str) -> Result<Token> {
        Ok(Token::Bytes(v.as_bytes().to_vec()))
    }

    // Fixed-size values. Types that need right alignment (addresses, uints)
    // pad themselves before calling this.
    fn serialize_bytes(self, v: &[u8]) -> Result<Token> {
        Ok(Token::left_aligned(v))
    }

    fn serialize_none(self) -> Result<Token> {
        Err(Error::TypeNotRepresentable("none"))
    }

    fn serialize_some<T: ?Sized>(self, _: &T) -> Result<Token>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("some"))
    }

    fn serialize_unit(self) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit"))
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit struct"))
    }

    fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Result<Token> {
        Err(Error::TypeNotRepresentable("unit variant (enum)"))
    }

    // A newtype struct is a struct with a single member on the Solidity side,
    // use `#[serde(transparent)]` to hide the wrapper.
    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> Result<Token>
    where
        T: Serialize,
    {
        Ok(Token::Tuple(vec![to_token(value)?]))
    }

    fn serialize_newtype_variant<T: ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Token>
    where
        T: Serialize,
    {
        Err(Error::TypeNotRepresentable("newtype variant (enum)"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Collector> {
        Ok(Collector::new(Kind::Array, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<Collector> {
        Ok(Collector::new(Kind::Tuple, len))
    }

    fn serialize_tuple_struct(self, name: &'static str, len: usize) -> Result<Collector> {
        let kind = if name == DYN_BYTES_NAME {
            Kind::DynBytes
        } else {
            Kind::Tuple
        };
        Ok(Collector::new(kind, len))
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::TypeNotRepresentable("tuple variant (enum)"))
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::TypeNotRepresentable("map"))
    }

    fn serialize_struct(self, _: &'static str, len: usize) -> Result<Collector> {
        Ok(Collector::new(Kind::Tuple, len))
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::TypeNotRepresentable("struct variant"))
    }
}

enum Kind {
    Tuple,
    Array,
    DynBytes,
}

/// Collects the members of a compound value.
pub struct Collector {
    kind: Kind,
    members: Vec<Token>,
}

impl Collector {
    fn new(kind: Kind, len: usize) -> Self {
        Self {
            kind,
            members: Vec::with_capacity(len),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.members.push(to_token(value)?);
        Ok(())
    }

    fn finish(self) -> Result<Token> {
        match self.kind {
            Kind::Tuple => Ok(Token::Tuple(self.members)),
            Kind::Array => Ok(Token::Array(self.members)),
            Kind::DynBytes => {
                let [len, data] = <[Token; 2]>::try_from(self.members)
                    .map_err(|_| Error::MalformedBytes)?;
                let len = word_to_usize(&len).ok_or(Error::MalformedBytes)?;
                let mut bytes = Vec::new();
                if !flatten_words(&data, &mut bytes) || bytes.len() < len {
                    return Err(Error::MalformedBytes);
                }
                bytes.truncate(len);
                Ok(Token::Bytes(bytes))
            }
        }
    }
}

impl SerializeSeq for Collector {
    type Ok = Token;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        self.finish()
    }
}

impl SerializeTuple for Collector {
    type Ok = Token;
    type Error = Error;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        self.finish()
    }
}

impl SerializeTupleStruct for Collector {
    type Ok = Token;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Token> {
        self.finish()
    }
}

impl SerializeStruct for Collector {
    type Ok = Token;
    type Error = Error;

    fn serialize_field<T: ?Sized>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        self.push(value)
    }

    fn skip_field(&mut self, _key: &'static str) -> Result<()> {
        Ok(())
    }

    fn end(self) -> Result<Token> {
        self.finish()
    }
}
