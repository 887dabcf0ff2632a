//! Recovering a channel and its active transfers from the counterparty.
//!
//! Restoring replaces the local state wholesale, so it is only done when the
//! local state cannot be reconciled by syncing a single update.

use crate::{
    abiencode::types::{Address, Hash},
    chain::ChainError,
    channel::{
        validate_update_signatures, FullChannelState, RestoreParams, SignatureError,
        ValidationError,
    },
    client::Engine,
    error::ProtocolError,
    events::ChannelRestoredEvent,
    merkle,
    messages::{RestoreReply, RestoreRequest},
    sig,
    store::StoreError,
    wire::MessagingError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("counterparty has no channel to restore")]
    NoData,
    #[error("failed to get channel address: {0}")]
    GetChannelAddressFailed(ChainError),
    #[error("channel address {received} does not match {expected}")]
    InvalidChannelAddress { expected: Address, received: Address },
    #[error("unexpected channel participants: {0}")]
    UnexpectedParticipants(String),
    #[error("invalid signatures on latest update: {0}")]
    InvalidSignatures(SignatureError),
    #[error("merkle root {expected} does not match computed {computed}")]
    InvalidMerkleRoot { expected: Hash, computed: Hash },
    #[error("local nonce {local} can be synced to {received}")]
    SyncableState { local: u64, received: u64 },
    #[error("failed to save restored channel: {0}")]
    SaveChannelFailed(StoreError),
    #[error("counterparty failed to restore ({reason}): {message}")]
    CounterpartyFailure { reason: String, message: String },
    #[error(transparent)]
    Messaging(MessagingError),
}

impl RestoreError {
    pub fn reason(&self) -> &'static str {
        match self {
            RestoreError::NoData => "NoData",
            RestoreError::GetChannelAddressFailed(_) => "GetChannelAddressFailed",
            RestoreError::InvalidChannelAddress { .. } => "InvalidChannelAddress",
            RestoreError::UnexpectedParticipants(_) => "UnexpectedParticipants",
            RestoreError::InvalidSignatures(_) => "InvalidSignatures",
            RestoreError::InvalidMerkleRoot { .. } => "InvalidMerkleRoot",
            RestoreError::SyncableState { .. } => "SyncableState",
            RestoreError::SaveChannelFailed(_) => "SaveChannelFailed",
            RestoreError::CounterpartyFailure { .. } => "CounterpartyFailure",
            RestoreError::Messaging(e) => e.reason(),
        }
    }
}

/// Fetch the channel with the counterparty of `params` and replace the local
/// copy after checking it.
pub(crate) async fn restore_state(
    engine: &Engine,
    params: &RestoreParams,
) -> Result<FullChannelState, ProtocolError> {
    let restore = params.validate()?;
    let ours = engine.signer.public_identifier();
    if restore.counterparty_identifier == ours {
        return Err(ValidationError::CounterpartyIsSelf.into());
    }
    let counterparty = sig::address_from_public_identifier(&restore.counterparty_identifier)
        .map_err(|e| ValidationError::InvalidParams {
            params_error: format!("data.counterpartyIdentifier {e}"),
        })?;

    let request = RestoreRequest {
        chain_id: restore.chain_id,
        from_identifier: ours.to_string(),
        to_identifier: restore.counterparty_identifier.clone(),
    };
    let reply = engine
        .messaging
        .send_restore_request(request, engine.config.restore_timeout())
        .await
        .map_err(RestoreError::Messaging)?;
    let (channel, active_transfers) = match reply {
        RestoreReply::Error { reason, message } => {
            return Err(RestoreError::CounterpartyFailure { reason, message }.into())
        }
        RestoreReply::Data { channel: None, .. } => return Err(RestoreError::NoData.into()),
        RestoreReply::Data {
            channel: Some(channel),
            active_transfers,
        } => (channel, active_transfers),
    };
    let channel_address = channel.channel_address();

    let expected = engine
        .chain
        .get_channel_address(
            channel.alice(),
            channel.bob(),
            channel.network_context.channel_factory_address,
            restore.chain_id,
        )
        .await
        .map_err(RestoreError::GetChannelAddressFailed)?;
    if expected != channel_address {
        return Err(RestoreError::InvalidChannelAddress {
            expected,
            received: channel_address,
        }
        .into());
    }

    let me = engine.signer.address();
    let participants = &channel.core.participants;
    let identifiers = &channel.public_identifiers;
    let expected_pair = (participants.contains(&me) && participants.contains(&counterparty))
        && (identifiers.iter().any(|i| i == ours)
            && identifiers.contains(&restore.counterparty_identifier));
    if !expected_pair {
        return Err(RestoreError::UnexpectedParticipants(format!(
            "{} and {} are not {me} and {counterparty}",
            participants[0], participants[1]
        ))
        .into());
    }

    validate_update_signatures(&channel.latest_update, &channel.core)
        .map_err(RestoreError::InvalidSignatures)?;

    let computed = merkle::compute_root(active_transfers.iter().map(|t| &t.core))?;
    if computed != channel.core.merkle_root {
        return Err(RestoreError::InvalidMerkleRoot {
            expected: channel.core.merkle_root,
            computed,
        }
        .into());
    }

    let _guard = engine.queue.acquire(channel_address).await;
    if let Some(existing) = engine.store.get_channel_state(channel_address).await? {
        if existing.nonce() + 1 >= channel.nonce() {
            warn!(
                channel = %channel_address,
                local = existing.nonce(),
                received = channel.nonce(),
                "refusing to restore a syncable channel"
            );
            return Err(RestoreError::SyncableState {
                local: existing.nonce(),
                received: channel.nonce(),
            }
            .into());
        }
    }

    engine
        .store
        .save_channel_state_and_transfers(&channel, &active_transfers)
        .await
        .map_err(RestoreError::SaveChannelFailed)?;
    info!(
        channel = %channel_address,
        nonce = channel.nonce(),
        transfers = active_transfers.len(),
        "restored channel"
    );
    engine.events.channel_restored.emit(&ChannelRestoredEvent {
        channel_address,
        nonce: channel.nonce(),
    });
    Ok(channel)
}

fn restore_failure(reason: &str, message: impl ToString) -> Option<RestoreReply> {
    Some(RestoreReply::Error {
        reason: reason.to_string(),
        message: message.to_string(),
    })
}

/// Answer a restore request of the counterparty.
pub(crate) async fn handle_restore_request(
    engine: &Engine,
    req: RestoreRequest,
) -> Option<RestoreReply> {
    let ours = engine.signer.public_identifier();
    if req.from_identifier == ours || req.to_identifier != ours {
        debug!(from = %req.from_identifier, to = %req.to_identifier, "ignoring restore request");
        return None;
    }
    let counterparty = match sig::address_from_public_identifier(&req.from_identifier) {
        Ok(address) => address,
        Err(e) => return restore_failure("CouldNotGetChannel", e),
    };

    let channel = match engine
        .store
        .get_channel_state_by_participants(engine.signer.address(), counterparty, req.chain_id)
        .await
    {
        Ok(Some(channel)) => channel,
        Ok(None) => {
            return Some(RestoreReply::Data {
                channel: None,
                active_transfers: Vec::new(),
            })
        }
        Err(e) => return restore_failure("CouldNotGetChannel", e),
    };

    // Read again under the lock, an update may have been in flight.
    let channel_address = channel.channel_address();
    let _guard = engine.queue.acquire(channel_address).await;
    let channel = match engine.store.get_channel_state(channel_address).await {
        Ok(Some(channel)) => channel,
        Ok(None) => channel,
        Err(e) => return restore_failure("CouldNotGetChannel", e),
    };
    let active_transfers = match engine.store.get_active_transfers(channel_address).await {
        Ok(transfers) => transfers,
        Err(e) => return restore_failure("CouldNotGetActiveTransfers", e),
    };
    debug!(
        channel = %channel_address,
        nonce = channel.nonce(),
        "answering restore request"
    );
    Some(RestoreReply::Data {
        channel: Some(channel),
        active_transfers,
    })
}
