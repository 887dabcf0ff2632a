//! Signer using the k256 Rust crate (implementation of ecdsa in Rust).

use super::{
    address_from_uncompressed, hash_to_eth_signed_msg_hash, public_identifier_from_compressed,
    recovery_id, Error, COMPRESSED_KEY_LEN,
};
use crate::abiencode::types::{Address, Hash, Signature};
use k256::{
    ecdsa::{
        recoverable,
        signature::{hazmat::PrehashSigner, Signature as k256Signature},
        SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};

#[derive(Debug, Clone)]
pub struct Signer {
    key: SigningKey,
    addr: Address,
    public_identifier: String,
}

fn uncompressed(key: &VerifyingKey) -> Result<[u8; 65], Error> {
    key.to_encoded_point(false)
        .as_bytes()
        .try_into()
        .map_err(|_| Error::Recovery("unexpected public key encoding".to_string()))
}

impl Signer {
    /// Create a signer with a fresh random key.
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        Self::from_key(SigningKey::random(rng))
    }

    /// Create a signer from a 32 byte secret key.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, Error> {
        let key = SigningKey::from_bytes(secret).map_err(|_| Error::InvalidSecretKey)?;
        Ok(Self::from_key(key))
    }

    fn from_key(key: SigningKey) -> Self {
        let verifying_key = key.verifying_key();
        let point = verifying_key.to_encoded_point(false);
        // An uncompressed SEC1 point of a valid key is always 65 bytes long.
        let mut pk_bytes = [0u8; 65];
        pk_bytes.copy_from_slice(point.as_bytes());

        let mut compressed = [0u8; COMPRESSED_KEY_LEN];
        compressed.copy_from_slice(verifying_key.to_encoded_point(true).as_bytes());

        Self {
            key,
            addr: address_from_uncompressed(&pk_bytes),
            public_identifier: public_identifier_from_compressed(&compressed),
        }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn public_identifier(&self) -> &str {
        &self.public_identifier
    }

    pub fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        // "\x19Ethereum Signed Message:\n32" format
        let hash = hash_to_eth_signed_msg_hash(msg);

        let sig: recoverable::Signature = self
            .key
            .sign_prehash(&hash.0)
            .map_err(|e| Error::Signing(e.to_string()))?;

        // This Signature type already has the format we need: 65 bytes
        // containing r, s and v in this order. We still have to add 27 to v
        // for the signature to be valid in the EVM.
        let mut sig_bytes: [u8; 65] = sig
            .as_bytes()
            .try_into()
            .map_err(|_| Error::Signing("unexpected signature length".to_string()))?;
        debug_assert!(sig_bytes[32] & 0x80 == 0);
        sig_bytes[64] += 27;

        Ok(Signature(sig_bytes))
    }

    pub fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        super::recover_signer(msg, eth_sig)
    }
}

pub(super) fn recover(prefixed: Hash, eth_sig: Signature) -> Result<Address, Error> {
    // Undo adding the 27, to go back to the format expected below
    let mut sig_bytes: [u8; 65] = eth_sig.0;
    sig_bytes[64] = recovery_id(&eth_sig)?;

    let sig = recoverable::Signature::from_bytes(&sig_bytes)
        .map_err(|e| Error::Recovery(e.to_string()))?;
    let verifying_key = sig
        .recover_verifying_key_from_digest_bytes(&prefixed.0.into())
        .map_err(|e| Error::Recovery(e.to_string()))?;
    Ok(address_from_uncompressed(&uncompressed(&verifying_key)?))
}

pub(super) fn decompress(compressed: &[u8; COMPRESSED_KEY_LEN]) -> Result<[u8; 65], Error> {
    let key = VerifyingKey::from_sec1_bytes(compressed)
        .map_err(|e| Error::Recovery(e.to_string()))?;
    uncompressed(&key)
}
