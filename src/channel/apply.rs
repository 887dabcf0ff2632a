//! Deterministic application of an update to the prior channel state.
//!
//! Applying is all-or-nothing: the prior state is never modified, a new state
//! is only returned if every check passed. Signatures are not checked here,
//! see [super::signatures].

use super::{
    state::{
        initial_state_hash, transfer_id, Balance, CoreChannelState, CoreTransferState,
        FullChannelState, FullTransferState,
    },
    update::{ChannelUpdate, CreateDetails, ResolveDetails, SetupDetails, UpdateDetails},
    PartIdx, PARTICIPANTS,
};
use crate::{
    abiencode::{
        self,
        types::{Address, Hash, U256},
    },
    merkle::{self, MerkleError},
    sig,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("stale update: expected nonce {expected}, received {received}")]
    StaleUpdate { expected: u64, received: u64 },
    #[error("update is for channel {received}, expected {expected}")]
    ChannelAddressMismatch { expected: Address, received: Address },
    #[error("balance mismatch: {0}")]
    BalanceMismatch(String),
    #[error("asset {0} not found in channel")]
    AssetNotFound(Address),
    #[error("insufficient locked value for asset {asset_id}: locked {locked}, requested {requested}")]
    InsufficientLockedValue {
        asset_id: Address,
        locked: U256,
        requested: U256,
    },
    #[error("transfer {0} is already active")]
    TransferAlreadyActive(Hash),
    #[error("transfer {0} not found")]
    TransferNotFound(Hash),
    #[error("invalid transfer id, expected {expected}, received {received}")]
    InvalidTransferId { expected: Hash, received: Hash },
    #[error("deposit nonce mismatch: expected {expected}, received {received}")]
    DepositNonceMismatch { expected: u64, received: u64 },
    #[error("{0} is not a participant of the channel")]
    UnknownIdentifier(String),
    #[error("channel {0} is not set up")]
    ChannelNotSetup(Address),
    #[error("channel {0} is already set up")]
    ChannelAlreadySetup(Address),
    #[error("failed to encode: {0}")]
    Encoding(#[from] abiencode::Error),
    #[error(transparent)]
    Merkle(#[from] MerkleError),
    #[error(transparent)]
    Signature(#[from] super::SignatureError),
    #[error(transparent)]
    Identifier(#[from] sig::Error),
}

impl ApplyError {
    pub fn reason(&self) -> &'static str {
        match self {
            ApplyError::StaleUpdate { .. } => "StaleUpdate",
            ApplyError::ChannelAddressMismatch { .. } => "ChannelAddressMismatch",
            ApplyError::BalanceMismatch(_) => "BalanceMismatch",
            ApplyError::AssetNotFound(_) => "AssetNotFound",
            ApplyError::InsufficientLockedValue { .. } => "InsufficientLockedValue",
            ApplyError::TransferAlreadyActive(_) => "TransferAlreadyActive",
            ApplyError::TransferNotFound(_) => "TransferNotFound",
            ApplyError::InvalidTransferId { .. } => "InvalidTransferId",
            ApplyError::DepositNonceMismatch { .. } => "DepositNonceMismatch",
            ApplyError::UnknownIdentifier(_) => "UnknownIdentifier",
            ApplyError::ChannelNotSetup(_) => "ChannelNotSetup",
            ApplyError::ChannelAlreadySetup(_) => "ChannelAlreadySetup",
            ApplyError::Encoding(_) => "EncodingFailed",
            ApplyError::Merkle(e) => e.reason(),
            ApplyError::Signature(e) => e.reason(),
            ApplyError::Identifier(_) => "InvalidIdentifier",
        }
    }
}

/// Outcome of [apply_update].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub channel: FullChannelState,
    /// Active transfers after the update.
    pub active_transfers: Vec<FullTransferState>,
    /// The transfer created or resolved by the update.
    pub transfer: Option<FullTransferState>,
}

/// Participant indices of the sender and receiver of `update`.
pub(crate) fn update_parties(
    channel: &FullChannelState,
    update: &ChannelUpdate,
) -> Result<(PartIdx, PartIdx), ApplyError> {
    let from = channel
        .identifier_index(&update.from_identifier)
        .ok_or_else(|| ApplyError::UnknownIdentifier(update.from_identifier.clone()))?;
    let to = channel
        .identifier_index(&update.to_identifier)
        .ok_or_else(|| ApplyError::UnknownIdentifier(update.to_identifier.clone()))?;
    if from == to {
        return Err(ApplyError::UnknownIdentifier(update.to_identifier.clone()));
    }
    Ok((from, to))
}

/// Channel balance after the initiator and the responder locked their share of
/// `transfer_balance` (`amount[0]` and `amount[1]` respectively).
pub(crate) fn created_channel_balance(
    prior: &Balance,
    initiator: PartIdx,
    transfer_balance: &Balance,
) -> Option<Balance> {
    let mut post = *prior;
    let responder = PARTICIPANTS - 1 - initiator;
    post.amount[initiator] = post.amount[initiator].checked_sub(transfer_balance.amount[0])?;
    post.amount[responder] = post.amount[responder].checked_sub(transfer_balance.amount[1])?;
    Some(post)
}

/// Channel balance after paying out `transfer_balance`. Every recipient of the
/// transfer has to be a channel participant.
pub(crate) fn resolved_channel_balance(
    prior: &Balance,
    participants: &[Address; PARTICIPANTS],
    transfer_balance: &Balance,
) -> Option<Balance> {
    let mut post = *prior;
    for (amount, to) in transfer_balance.amount.iter().zip(&transfer_balance.to) {
        let idx = participants.iter().position(|p| p == to)?;
        post.amount[idx] = post.amount[idx].checked_add(*amount)?;
    }
    Some(post)
}

/// The transfer a create update adds to the channel.
pub(crate) fn created_transfer(
    channel: &FullChannelState,
    update: &ChannelUpdate,
    details: &CreateDetails,
) -> Result<FullTransferState, ApplyError> {
    let (from, to) = update_parties(channel, update)?;
    Ok(FullTransferState {
        core: CoreTransferState {
            initial_balance: details.transfer_initial_balance,
            asset_id: update.asset_id,
            channel_address: channel.channel_address(),
            transfer_id: details.transfer_id,
            transfer_definition: details.transfer_definition,
            transfer_timeout: details.transfer_timeout,
            initial_state_hash: initial_state_hash(&details.transfer_initial_state),
            transfer_encodings: details.transfer_encodings.clone(),
        },
        transfer_state: details.transfer_initial_state.clone(),
        transfer_resolver: None,
        initiator: channel.core.participants[from],
        responder: channel.core.participants[to],
        chain_id: channel.network_context.chain_id,
        channel_nonce: update.nonce,
    })
}

/// Compute the channel state that results from applying `update` to `prior`.
///
/// `prior` is `None` only for setup updates. `active_transfers` are the
/// transfers active at `prior`.
pub fn apply_update(
    update: &ChannelUpdate,
    prior: Option<&FullChannelState>,
    active_transfers: &[FullTransferState],
) -> Result<ApplyResult, ApplyError> {
    let prior = match (prior, &update.details) {
        (None, UpdateDetails::Setup(details)) => {
            if update.nonce != 1 {
                return Err(ApplyError::StaleUpdate {
                    expected: 1,
                    received: update.nonce,
                });
            }
            return apply_setup(update, details);
        }
        (None, _) => return Err(ApplyError::ChannelNotSetup(update.channel_address)),
        (Some(prior), _) => prior,
    };

    let expected = prior.nonce() + 1;
    if update.nonce != expected {
        return Err(ApplyError::StaleUpdate {
            expected,
            received: update.nonce,
        });
    }
    if update.channel_address != prior.channel_address() {
        return Err(ApplyError::ChannelAddressMismatch {
            expected: prior.channel_address(),
            received: update.channel_address,
        });
    }

    let mut channel = prior.clone();
    let mut transfers = active_transfers.to_vec();
    let transfer = match &update.details {
        UpdateDetails::Setup(_) => {
            return Err(ApplyError::ChannelAlreadySetup(prior.channel_address()))
        }
        UpdateDetails::Deposit(details) => {
            apply_deposit(&mut channel.core, update, details.latest_deposit_nonce)?;
            None
        }
        UpdateDetails::Create(details) => {
            Some(apply_create(&mut channel, &mut transfers, update, details)?)
        }
        UpdateDetails::Resolve(details) => {
            Some(apply_resolve(&mut channel.core, &mut transfers, update, details)?)
        }
    };

    channel.core.nonce = update.nonce;
    channel.latest_update = update.clone();
    Ok(ApplyResult {
        channel,
        active_transfers: transfers,
        transfer,
    })
}

fn apply_setup(
    update: &ChannelUpdate,
    details: &SetupDetails,
) -> Result<ApplyResult, ApplyError> {
    let alice = sig::address_from_public_identifier(&update.from_identifier)?;
    let bob = sig::address_from_public_identifier(&update.to_identifier)?;
    if alice == bob {
        return Err(ApplyError::UnknownIdentifier(update.to_identifier.clone()));
    }

    let channel = FullChannelState {
        core: CoreChannelState {
            channel_address: update.channel_address,
            participants: [alice, bob],
            timeout: details.timeout,
            balances: Vec::new(),
            locked_value: Vec::new(),
            asset_ids: Vec::new(),
            nonce: update.nonce,
            latest_deposit_nonce: 0,
            merkle_root: Hash::ZERO,
        },
        public_identifiers: [update.from_identifier.clone(), update.to_identifier.clone()],
        network_context: details.network_context.clone(),
        latest_update: update.clone(),
        in_dispute: false,
    };
    Ok(ApplyResult {
        channel,
        active_transfers: Vec::new(),
        transfer: None,
    })
}

fn apply_deposit(
    core: &mut CoreChannelState,
    update: &ChannelUpdate,
    latest_deposit_nonce: u64,
) -> Result<(), ApplyError> {
    let expected = core.latest_deposit_nonce + 1;
    if latest_deposit_nonce != expected {
        return Err(ApplyError::DepositNonceMismatch {
            expected,
            received: latest_deposit_nonce,
        });
    }
    if update.balance.to != core.participants {
        return Err(ApplyError::BalanceMismatch(
            "deposit balance does not pay out to the participants".to_string(),
        ));
    }

    let idx = match core.asset_index(&update.asset_id) {
        Some(idx) => idx,
        None => {
            core.asset_ids.push(update.asset_id);
            core.balances.push(Balance::zero(core.participants));
            core.locked_value.push(U256::zero());
            core.asset_ids.len() - 1
        }
    };

    let prior = &core.balances[idx];
    if prior
        .amount
        .iter()
        .zip(&update.balance.amount)
        .any(|(before, after)| after < before)
    {
        return Err(ApplyError::BalanceMismatch(
            "deposit decreases a balance".to_string(),
        ));
    }

    core.balances[idx] = update.balance;
    core.latest_deposit_nonce = latest_deposit_nonce;
    Ok(())
}

fn apply_create(
    channel: &mut FullChannelState,
    transfers: &mut Vec<FullTransferState>,
    update: &ChannelUpdate,
    details: &CreateDetails,
) -> Result<FullTransferState, ApplyError> {
    let idx = channel
        .core
        .asset_index(&update.asset_id)
        .ok_or(ApplyError::AssetNotFound(update.asset_id))?;

    let expected_id = transfer_id(
        channel.channel_address(),
        update.nonce,
        details.transfer_definition,
        details.transfer_timeout,
    )?;
    if expected_id != details.transfer_id {
        return Err(ApplyError::InvalidTransferId {
            expected: expected_id,
            received: details.transfer_id,
        });
    }
    if transfers.iter().any(|t| t.transfer_id() == details.transfer_id) {
        return Err(ApplyError::TransferAlreadyActive(details.transfer_id));
    }

    let (initiator, responder) = update_parties(channel, update)?;
    let initial = &details.transfer_initial_balance;
    let participants = &channel.core.participants;
    if initial.to != [participants[initiator], participants[responder]]
        || !initial.amount[1].is_zero()
    {
        return Err(ApplyError::BalanceMismatch(
            "transfer must be funded by the initiator and pay out to both parties".to_string(),
        ));
    }
    let transfer = created_transfer(channel, update, details)?;
    let expected_balance = created_channel_balance(
        &channel.core.balances[idx],
        initiator,
        &details.transfer_initial_balance,
    )
    .ok_or_else(|| ApplyError::BalanceMismatch("transfer exceeds channel balance".to_string()))?;
    if expected_balance != update.balance {
        return Err(ApplyError::BalanceMismatch(format!(
            "expected {:?}, received {:?}",
            expected_balance.amount, update.balance.amount
        )));
    }

    let total = details
        .transfer_initial_balance
        .total()
        .ok_or_else(|| ApplyError::BalanceMismatch("transfer balance overflows".to_string()))?;
    let locked = channel.core.locked_value[idx]
        .checked_add(total)
        .ok_or_else(|| ApplyError::BalanceMismatch("locked value overflows".to_string()))?;

    transfers.push(transfer.clone());
    let root = merkle::compute_root(transfers.iter().map(|t| &t.core))?;
    if root != details.merkle_root {
        return Err(MerkleError::RootMismatch {
            expected: details.merkle_root,
            computed: root,
        }
        .into());
    }
    if !merkle::verify_proof(transfer.core.hash()?, &details.merkle_proof_data, root) {
        return Err(MerkleError::InvalidProof(details.transfer_id).into());
    }

    channel.core.balances[idx] = expected_balance;
    channel.core.locked_value[idx] = locked;
    channel.core.merkle_root = root;
    Ok(transfer)
}

fn apply_resolve(
    core: &mut CoreChannelState,
    transfers: &mut Vec<FullTransferState>,
    update: &ChannelUpdate,
    details: &ResolveDetails,
) -> Result<FullTransferState, ApplyError> {
    let pos = transfers
        .iter()
        .position(|t| t.transfer_id() == details.transfer_id)
        .ok_or(ApplyError::TransferNotFound(details.transfer_id))?;
    let asset_id = transfers[pos].core.asset_id;
    if asset_id != update.asset_id {
        return Err(ApplyError::BalanceMismatch(format!(
            "transfer is in asset {asset_id}, update in {}",
            update.asset_id
        )));
    }
    let idx = core
        .asset_index(&asset_id)
        .ok_or(ApplyError::AssetNotFound(asset_id))?;

    let total = transfers[pos]
        .core
        .initial_balance
        .total()
        .ok_or_else(|| ApplyError::BalanceMismatch("transfer balance overflows".to_string()))?;
    let locked = core.locked_value[idx];
    if locked < total {
        return Err(ApplyError::InsufficientLockedValue {
            asset_id,
            locked,
            requested: total,
        });
    }

    let prior = &core.balances[idx];
    let post = &update.balance;
    if post.to != prior.to {
        return Err(ApplyError::BalanceMismatch(
            "resolve changes the balance recipients".to_string(),
        ));
    }
    if prior
        .amount
        .iter()
        .zip(&post.amount)
        .any(|(before, after)| after < before)
    {
        return Err(ApplyError::BalanceMismatch(
            "resolve decreases a balance".to_string(),
        ));
    }
    let expected_total = prior.total().and_then(|t| t.checked_add(total));
    if expected_total.is_none() || post.total() != expected_total {
        return Err(ApplyError::BalanceMismatch(
            "resolved balance does not pay out the locked value".to_string(),
        ));
    }

    let mut resolved = transfers.remove(pos);
    let root = merkle::compute_root(transfers.iter().map(|t| &t.core))?;
    if root != details.merkle_root {
        return Err(MerkleError::RootMismatch {
            expected: details.merkle_root,
            computed: root,
        }
        .into());
    }

    core.balances[idx] = *post;
    core.locked_value[idx] = locked - total;
    core.merkle_root = root;
    resolved.transfer_resolver = Some(details.transfer_resolver.clone());
    Ok(resolved)
}
