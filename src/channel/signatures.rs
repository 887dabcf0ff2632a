//! Commitment hashing and signature validation for channel states.

use super::{state::CoreChannelState, update::ChannelUpdate, PartIdx, PARTICIPANTS};
use crate::{
    abiencode::{
        self,
        types::{Address, Hash, Signature},
    },
    sig::{self, Signer},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature of participant {0}")]
    MissingSignature(PartIdx),
    #[error("signature of participant {index} recovers to {recovered}, expected {expected}")]
    InvalidSigner {
        index: PartIdx,
        expected: Address,
        recovered: Address,
    },
    #[error("both signatures recover to {0}")]
    DuplicateSigner(Address),
    #[error(transparent)]
    Recovery(#[from] sig::Error),
    #[error("failed to encode state: {0}")]
    Encoding(#[from] abiencode::Error),
}

impl SignatureError {
    pub fn reason(&self) -> &'static str {
        match self {
            SignatureError::MissingSignature(_) => "MissingSignature",
            SignatureError::InvalidSigner { .. } => "InvalidSigner",
            SignatureError::DuplicateSigner(_) => "DuplicateSigner",
            SignatureError::Recovery(_) => "SignatureRecoveryFailed",
            SignatureError::Encoding(_) => "EncodingFailed",
        }
    }
}

/// Deterministic hash of the core state, see [CoreChannelState::hash_to_sign].
pub fn hash_to_sign(state: &CoreChannelState) -> Result<Hash, SignatureError> {
    Ok(state.hash_to_sign()?)
}

/// Check the signatures on `state` against the participants of the state.
///
/// At least `required` signatures have to be present. Every present signature
/// has to recover to the participant of its slot, and no signer may appear
/// twice.
pub fn validate_channel_signatures(
    state: &CoreChannelState,
    signatures: &[Option<Signature>; PARTICIPANTS],
    required: usize,
) -> Result<(), SignatureError> {
    let present = signatures.iter().filter(|s| s.is_some()).count();
    if present < required {
        let missing = signatures.iter().position(Option::is_none).unwrap_or(0);
        return Err(SignatureError::MissingSignature(missing));
    }

    let hash = hash_to_sign(state)?;
    let mut recovered: [Option<Address>; PARTICIPANTS] = [None; PARTICIPANTS];
    for (idx, signature) in signatures.iter().enumerate() {
        if let Some(signature) = signature {
            recovered[idx] = Some(sig::recover_signer(hash, *signature)?);
        }
    }

    if let [Some(a), Some(b)] = recovered {
        if a == b {
            return Err(SignatureError::DuplicateSigner(a));
        }
    }

    for (index, address) in recovered.iter().enumerate() {
        if let Some(address) = address {
            if *address != state.participants[index] {
                return Err(SignatureError::InvalidSigner {
                    index,
                    expected: state.participants[index],
                    recovered: *address,
                });
            }
        }
    }
    Ok(())
}

/// Validate that `update` carries both signatures over `state`.
pub fn validate_update_signatures(
    update: &ChannelUpdate,
    state: &CoreChannelState,
) -> Result<(), SignatureError> {
    validate_channel_signatures(state, &update.signatures, PARTICIPANTS)
}

/// Sign `state` and put the signature into slot `idx` of `update`.
pub fn sign_update(
    update: &mut ChannelUpdate,
    state: &CoreChannelState,
    signer: &Signer,
    idx: PartIdx,
) -> Result<(), SignatureError> {
    let hash = hash_to_sign(state)?;
    update.signatures[idx] = Some(signer.sign_eth(hash)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::apply_update,
        testing::{self, signers},
    };

    fn signed_setup() -> (CoreChannelState, ChannelUpdate) {
        let (alice, bob) = signers();
        let mut update = testing::setup_update(&alice, &bob);
        let core = apply_update(&update, None, &[]).unwrap().channel.core;
        sign_update(&mut update, &core, &alice, 0).unwrap();
        sign_update(&mut update, &core, &bob, 1).unwrap();
        (core, update)
    }

    #[test]
    fn fully_signed_update_is_valid() {
        let (core, update) = signed_setup();
        validate_update_signatures(&update, &core).unwrap();
        validate_channel_signatures(&core, &[update.signatures[0], None], 1).unwrap();
    }

    #[test]
    fn same_signer_twice() {
        let (core, update) = signed_setup();
        let alice = update.signatures[0];
        assert_eq!(
            validate_channel_signatures(&core, &[alice, alice], 2),
            Err(SignatureError::DuplicateSigner(core.participants[0]))
        );
    }

    #[test]
    fn swapped_slots() {
        let (core, update) = signed_setup();
        let [alice, bob] = update.signatures;
        assert_eq!(
            validate_channel_signatures(&core, &[bob, alice], 2),
            Err(SignatureError::InvalidSigner {
                index: 0,
                expected: core.participants[0],
                recovered: core.participants[1],
            })
        );
    }

    #[test]
    fn missing_signature() {
        let (core, update) = signed_setup();
        let err = validate_channel_signatures(&core, &[update.signatures[0], None], 2).unwrap_err();
        assert_eq!(err, SignatureError::MissingSignature(1));
        assert_eq!(err.reason(), "MissingSignature");
    }

    #[test]
    fn signature_over_other_state() {
        let (mut core, update) = signed_setup();
        core.nonce += 1;
        assert_eq!(
            validate_update_signatures(&update, &core).unwrap_err().reason(),
            "InvalidSigner"
        );
    }
}
