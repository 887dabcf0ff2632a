use core::{
    fmt::{Debug, Display},
    str::FromStr,
};

use rand::{distributions::Standard, prelude::Distribution};
use serde::Serialize;
use thiserror::Error;
use uint::construct_uint;

/// Returned when parsing a `0x`-prefixed hex string into a fixed-size type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseHexError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

fn parse_prefixed<const N: usize>(s: &str) -> Result<[u8; N], ParseHexError> {
    let digits = s.strip_prefix("0x").ok_or(ParseHexError::MissingPrefix)?;
    let bytes = hex::decode(digits)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ParseHexError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        })
}

macro_rules! impl_hex_fmt {
    ($T:ident) => {
        impl Debug for $T {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("0x")?;
                f.write_str(&hex::encode(self.0))
            }
        }

        impl Display for $T {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                Debug::fmt(self, f)
            }
        }

        impl FromStr for $T {
            type Err = ParseHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_prefixed(s).map(Self)
            }
        }

        impl Distribution<$T> for Standard {
            fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> $T {
                $T(rng.gen())
            }
        }
    };
}

macro_rules! bytes32 {
    ( $T:ident ) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Default)]
        pub struct $T(pub [u8; 32]);

        impl $T {
            pub const ZERO: Self = Self([0; 32]);
        }

        impl Serialize for $T {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_bytes(&self.0)
            }
        }

        impl_hex_fmt!($T);
    };
}

bytes32!(Bytes32);
bytes32!(Hash);

impl From<Hash> for Bytes32 {
    fn from(h: Hash) -> Self {
        Bytes32(h.0)
    }
}

/// Ethereum 65-byte recoverable signature (`r ‖ s ‖ v`, `v ∈ {27, 28}`).
#[derive(PartialEq, Eq, Copy, Clone)]
pub struct Signature(pub [u8; 65]);

impl Signature {
    pub fn new(rs: &[u8; 64], v: u8) -> Self {
        let mut sig = Signature([0; 65]);
        sig.0[..64].copy_from_slice(rs);
        sig.0[64] = v;
        sig
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0; 65])
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        super::as_bytes::serialize(&self.0, serializer)
    }
}

impl_hex_fmt!(Signature);

// We could use primitive_types:U256 or ethereum_types::U256 here, too. Both
// have the ability to serde serialize, but unfortunately to a hex string, which
// is not what we want. Since both internally use construct_uint and don't add
// much functionality it is easier to just create our own type.
construct_uint! {
    pub struct U256(4);
}

impl Serialize for U256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        serializer.serialize_bytes(&bytes)
    }
}

impl Distribution<U256> for Standard {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> U256 {
        let buf: [u8; 32] = rng.gen();
        U256::from_big_endian(&buf)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0; 20]);
}

impl_hex_fmt!(Address);

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // For some unknown reason abi encoding has addresses right aligned
        // (like uints) instead of left aligned like bytes/bytesN.
        let mut bytes = [0u8; 32];
        bytes[32 - 20..].copy_from_slice(self.0.as_slice());
        serializer.serialize_bytes(&bytes)
    }
}
