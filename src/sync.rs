//! Exchanging updates with the counterparty and catching up with its state.
//!
//! The outbound side proposes an update and retries after syncing the
//! counterparty's newer update, the inbound side countersigns valid proposals.
//! Both sides persist through [persist] so every applied update is saved and
//! announced the same way.

mod inbound;
mod outbound;

pub(crate) use inbound::handle_inbound;
pub(crate) use outbound::propose_outbound;

use crate::{
    abiencode::types::Address,
    channel::{
        apply_update, validate_update_signatures, ApplyResult, ChannelUpdate, FullChannelState,
        FullTransferState, UpdateType,
    },
    client::Engine,
    error::ProtocolError,
    events::ChannelUpdateEvent,
};
use thiserror::Error;
use tracing::{debug, error, warn};

/// How an outbound update ended up in the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessfullyApplied {
    /// The proposed update was countersigned.
    Executed,
    /// A newer update of the counterparty was applied instead, the proposal
    /// was not.
    SyncApplied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub updated_channel: FullChannelState,
    /// Active transfers after the update.
    pub updated_transfers: Vec<FullTransferState>,
    /// The transfer created or resolved by the update.
    pub updated_transfer: Option<FullTransferState>,
    pub successfully_applied: SuccessfullyApplied,
}

impl UpdateResult {
    pub(crate) fn new(applied: ApplyResult, successfully_applied: SuccessfullyApplied) -> Self {
        Self {
            updated_channel: applied.channel,
            updated_transfers: applied.active_transfers,
            updated_transfer: applied.transfer,
            successfully_applied,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("channel {channel} still behind after {attempts} sync attempts")]
    SyncRequired { channel: Address, attempts: u32 },
    #[error("channel state diverged, local nonce {our_nonce}, counterparty nonce {counterparty_nonce}")]
    RestoreNeeded {
        our_nonce: u64,
        counterparty_nonce: u64,
    },
    #[error("counterparty rejected the update ({reason}): {message}")]
    CounterpartyRejected { reason: String, message: String },
    #[error("counterparty is busy with channel {0}")]
    ChannelBusy(Address),
    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

impl SyncError {
    pub fn reason(&self) -> &'static str {
        match self {
            SyncError::SyncRequired { .. } => "SyncRequired",
            SyncError::RestoreNeeded { .. } => "RestoreNeeded",
            SyncError::CounterpartyRejected { .. } => "CounterpartyRejected",
            SyncError::ChannelBusy(_) => "ChannelBusy",
            SyncError::InvalidReply(_) => "InvalidReply",
        }
    }
}

/// Apply a double signed update of the counterparty and persist it.
pub(crate) async fn sync_apply(
    engine: &Engine,
    update: &ChannelUpdate,
    prior: Option<&FullChannelState>,
    active_transfers: &[FullTransferState],
) -> Result<ApplyResult, ProtocolError> {
    let applied = apply_update(update, prior, active_transfers)?;
    validate_update_signatures(update, &applied.channel.core)?;
    debug!(
        channel = %update.channel_address,
        nonce = update.nonce,
        update_type = %update.update_type(),
        "syncing counterparty update"
    );
    persist(engine, &applied).await?;
    Ok(applied)
}

/// Save an applied, double signed update and announce it.
pub(crate) async fn persist(engine: &Engine, applied: &ApplyResult) -> Result<(), ProtocolError> {
    let channel = &applied.channel;
    if let Err(e) = engine
        .store
        .save_channel_state(channel, applied.transfer.as_ref())
        .await
    {
        error!(
            channel = %channel.channel_address(),
            nonce = channel.nonce(),
            error = %e,
            "failed to save channel state"
        );
        return Err(e.into());
    }

    if channel.latest_update.update_type() == UpdateType::Setup {
        let network = &channel.network_context;
        if let Err(e) = engine
            .chain
            .register_channel(
                channel.channel_address(),
                network.channel_factory_address,
                network.chain_id,
            )
            .await
        {
            warn!(channel = %channel.channel_address(), error = %e, "failed to register channel");
        }
    }

    engine.events.channel_update.emit(&ChannelUpdateEvent {
        updated_channel_state: channel.clone(),
        updated_transfers: applied.active_transfers.clone(),
        updated_transfer: applied.transfer.clone(),
    });
    Ok(())
}
