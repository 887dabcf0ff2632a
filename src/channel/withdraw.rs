//! Off-chain authorization of an on-chain withdrawal from the channel.

use crate::{
    abiencode::{
        self, as_bytes, to_hash,
        types::{Address, Hash, Signature, U256},
    },
    sig::{self, Signer},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WithdrawError {
    #[error("invalid signer detected, got {recovered}, expected one of {alice} / {bob}")]
    InvalidSigner {
        recovered: Address,
        alice: Address,
        bob: Address,
    },
    #[error(transparent)]
    Signature(#[from] sig::Error),
    #[error("failed to encode withdraw data: {0}")]
    Encoding(#[from] abiencode::Error),
}

impl WithdrawError {
    pub fn reason(&self) -> &'static str {
        match self {
            WithdrawError::InvalidSigner { .. } => "InvalidSigner",
            WithdrawError::Signature(_) => "SignatureRecoveryFailed",
            WithdrawError::Encoding(_) => "EncodingFailed",
        }
    }
}

/// The tuple the channel contract verifies the signatures against.
#[derive(Serialize, Debug)]
struct WithdrawData<'a> {
    channel_address: Address,
    asset_id: Address,
    recipient: Address,
    amount: U256,
    nonce: U256,
    call_to: Address,
    #[serde(with = "as_bytes")]
    call_data: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawCommitment {
    pub channel_address: Address,
    pub alice: Address,
    pub bob: Address,
    pub recipient: Address,
    pub asset_id: Address,
    pub amount: U256,
    pub nonce: U256,
    alice_signature: Option<Signature>,
    bob_signature: Option<Signature>,
}

impl WithdrawCommitment {
    pub fn new(
        channel_address: Address,
        alice: Address,
        bob: Address,
        recipient: Address,
        asset_id: Address,
        amount: U256,
        nonce: U256,
    ) -> Self {
        Self {
            channel_address,
            alice,
            bob,
            recipient,
            asset_id,
            amount,
            nonce,
            alice_signature: None,
            bob_signature: None,
        }
    }

    /// No call is attached to withdrawals, `(callTo, callData)` is always
    /// `(0x0, 0x)`.
    pub fn call_data(&self) -> (Address, Vec<u8>) {
        (Address::ZERO, Vec::new())
    }

    pub fn hash_to_sign(&self) -> Result<Hash, WithdrawError> {
        let (call_to, call_data) = self.call_data();
        Ok(to_hash(&WithdrawData {
            channel_address: self.channel_address,
            asset_id: self.asset_id,
            recipient: self.recipient,
            amount: self.amount,
            nonce: self.nonce,
            call_to,
            call_data: &call_data,
        })?)
    }

    pub fn sign(&self, signer: &Signer) -> Result<Signature, WithdrawError> {
        Ok(signer.sign_eth(self.hash_to_sign()?)?)
    }

    /// Add signatures in any order.
    ///
    /// Each signature is stored for the participant it recovers to. A
    /// signature from anyone else fails the whole call without storing any of
    /// the given signatures.
    pub fn add_signatures(&mut self, signatures: &[Signature]) -> Result<(), WithdrawError> {
        let hash = self.hash_to_sign()?;
        let mut alice_signature = self.alice_signature;
        let mut bob_signature = self.bob_signature;
        for signature in signatures {
            let recovered = sig::recover_signer(hash, *signature)?;
            if recovered == self.alice {
                alice_signature = Some(*signature);
            } else if recovered == self.bob {
                bob_signature = Some(*signature);
            } else {
                return Err(WithdrawError::InvalidSigner {
                    recovered,
                    alice: self.alice,
                    bob: self.bob,
                });
            }
        }
        self.alice_signature = alice_signature;
        self.bob_signature = bob_signature;
        Ok(())
    }

    pub fn alice_signature(&self) -> Option<Signature> {
        self.alice_signature
    }

    pub fn bob_signature(&self) -> Option<Signature> {
        self.bob_signature
    }

    /// All available signatures, alice first.
    pub fn signatures(&self) -> Vec<Signature> {
        self.alice_signature
            .into_iter()
            .chain(self.bob_signature)
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.alice_signature.is_some() && self.bob_signature.is_some()
    }
}
