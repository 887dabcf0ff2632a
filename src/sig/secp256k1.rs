//! Signer using the secp256k1 crate (bindings to libsecp256k1).

use super::{
    address_from_uncompressed, hash_to_eth_signed_msg_hash, public_identifier_from_compressed,
    recovery_id, Error, COMPRESSED_KEY_LEN,
};
use crate::abiencode::types::{Address, Hash, Signature};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};

#[derive(Debug, Clone)]
pub struct Signer {
    secp: Secp256k1<All>,
    sk: SecretKey,
    addr: Address,
    public_identifier: String,
}

impl Signer {
    /// Create a signer with a fresh random key.
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        Self::from_key(SecretKey::new(rng))
    }

    /// Create a signer from a 32 byte secret key.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, Error> {
        let sk = SecretKey::from_slice(secret).map_err(|_| Error::InvalidSecretKey)?;
        Ok(Self::from_key(sk))
    }

    fn from_key(sk: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        Self {
            secp,
            sk,
            addr: address_from_uncompressed(&pk.serialize_uncompressed()),
            public_identifier: public_identifier_from_compressed(&pk.serialize()),
        }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn public_identifier(&self) -> &str {
        &self.public_identifier
    }

    /// Sign a hash using a Ethereum 65-byte recoverable signature.
    ///
    /// Note that this differs from transaction signatures, as it does not
    /// include the chain id in v.
    pub fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        // "\x19Ethereum Signed Message:\n32" format
        let hash = hash_to_eth_signed_msg_hash(msg);
        let message = Message::from_slice(&hash.0).map_err(|e| Error::Signing(e.to_string()))?;

        // We have to use sign_ecdsa_recoverable because the smart contract must
        // be able to recover the address. This gives us the additional
        // information needed for v.
        let sig = self.secp.sign_ecdsa_recoverable(&message, &self.sk);
        let (v, rs) = sig.serialize_compact();

        // [EIP-2](https://eips.ethereum.org/EIPS/eip-2) makes all signatures
        // with a non-canonical solution (s starts with the bit 1) invalid. The
        // library already produces canonical signatures.
        debug_assert!(rs[32] & 0x80 == 0);

        // Ethereum kept the offset of 27 Bitcoin uses for v.
        let v: u8 = 27 + v.to_i32() as u8;

        Ok(Signature::new(&rs, v))
    }

    pub fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        super::recover_signer(msg, eth_sig)
    }
}

pub(super) fn recover(prefixed: Hash, eth_sig: Signature) -> Result<Address, Error> {
    let secp = Secp256k1::verification_only();
    let recid = RecoveryId::from_i32(recovery_id(&eth_sig)?.into())
        .map_err(|e| Error::Recovery(e.to_string()))?;
    let sig = RecoverableSignature::from_compact(&eth_sig.0[..64], recid)
        .map_err(|e| Error::Recovery(e.to_string()))?;
    let message = Message::from_slice(&prefixed.0).map_err(|e| Error::Recovery(e.to_string()))?;
    let pk = secp
        .recover_ecdsa(&message, &sig)
        .map_err(|e| Error::Recovery(e.to_string()))?;
    Ok(address_from_uncompressed(&pk.serialize_uncompressed()))
}

pub(super) fn decompress(compressed: &[u8; COMPRESSED_KEY_LEN]) -> Result<[u8; 65], Error> {
    let pk = PublicKey::from_slice(compressed).map_err(|e| Error::Recovery(e.to_string()))?;
    Ok(pk.serialize_uncompressed())
}
