//! Handles the creation and verification of (Ethereum) Signatures.
//!
//! Every participant is known to its peers by a public identifier: the prefix
//! `vector` followed by the hex encoded compressed public key. The Ethereum
//! address of the signer can always be derived from it.

use crate::abiencode::{
    hashing::keccak256,
    types::{Address, Hash, Signature},
};
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[cfg(feature = "k256")]
mod k256;
#[cfg(feature = "secp256k1")]
#[cfg_attr(feature = "k256", allow(dead_code))]
mod secp256k1;

#[cfg(feature = "k256")]
pub use self::k256::Signer;
#[cfg(all(feature = "secp256k1", not(feature = "k256")))]
pub use self::secp256k1::Signer;

#[cfg(feature = "k256")]
use self::k256 as backend;
#[cfg(all(feature = "secp256k1", not(feature = "k256")))]
use self::secp256k1 as backend;

#[cfg(not(any(feature = "k256", feature = "secp256k1")))]
compile_error!("one of the features `k256` or `secp256k1` has to be enabled");


/// Prefix of every public identifier.
pub const PUBLIC_IDENTIFIER_PREFIX: &str = "vector";

/// Length of a SEC1 compressed secp256k1 public key.
const COMPRESSED_KEY_LEN: usize = 33;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid secret key")]
    InvalidSecretKey,
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("could not recover signer: {0}")]
    Recovery(String),
    #[error("invalid public identifier: {0}")]
    InvalidPublicIdentifier(String),
}

/// Add the `\x19Ethereum Signed Message\n<length>` prefix to hash.
///
/// This is the format expected by the Solidity contracts.
fn hash_to_eth_signed_msg_hash(hash: Hash) -> Hash {
    // Packed encoding => We can't use the serializer
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash.0);
    Hash(hasher.finalize().into())
}

/// Ethereum address of an uncompressed (65 byte, `0x04` prefixed) public key.
fn address_from_uncompressed(pk_bytes: &[u8; 65]) -> Address {
    // See https://ethereum.stackexchange.com/questions/65233/goethereum-getting-public-key-from-private-key-hex-formatting
    //
    // Throw away the first byte, which is not part of the public key. It is
    // added by the SEC1 encoding.
    let hash = keccak256(&pk_bytes[1..]);
    let mut addr = Address([0; 20]);
    addr.0.copy_from_slice(&hash.0[32 - 20..]);
    addr
}

fn public_identifier_from_compressed(key: &[u8; COMPRESSED_KEY_LEN]) -> String {
    format!("{}{}", PUBLIC_IDENTIFIER_PREFIX, hex::encode(key))
}

fn compressed_from_public_identifier(identifier: &str) -> Result<[u8; COMPRESSED_KEY_LEN], Error> {
    let invalid = || Error::InvalidPublicIdentifier(identifier.to_string());
    let digits = identifier
        .strip_prefix(PUBLIC_IDENTIFIER_PREFIX)
        .ok_or_else(invalid)?;
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    let key: [u8; COMPRESSED_KEY_LEN] = bytes.try_into().map_err(|_| invalid())?;
    // SEC1 compressed points carry the y parity as 0x02 or 0x03.
    if !matches!(key[0], 0x02 | 0x03) {
        return Err(invalid());
    }
    Ok(key)
}

/// Recover the address that signed `msg` with [Signer::sign_eth].
///
/// `msg` is the hash of the signed data, it should not include the `Ethereum
/// Signed Message` prefix.
pub fn recover_signer(msg: Hash, sig: Signature) -> Result<Address, Error> {
    backend::recover(hash_to_eth_signed_msg_hash(msg), sig)
}

/// Derive the Ethereum address of the key behind a public identifier.
pub fn address_from_public_identifier(identifier: &str) -> Result<Address, Error> {
    let compressed = compressed_from_public_identifier(identifier)?;
    let uncompressed = backend::decompress(&compressed)
        .map_err(|_| Error::InvalidPublicIdentifier(identifier.to_string()))?;
    Ok(address_from_uncompressed(&uncompressed))
}

/// Remove the 27 offset Ethereum adds to the recovery id.
fn recovery_id(sig: &Signature) -> Result<u8, Error> {
    match sig.0[64] {
        v @ (27 | 28) => Ok(v - 27),
        v => Err(Error::Recovery(format!("invalid recovery byte {v}"))),
    }
}
