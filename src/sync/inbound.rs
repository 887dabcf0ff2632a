use super::{persist, sync_apply};
use crate::{
    channel::{
        apply_update, sign_update, validate_channel_signatures, validate_inbound_update,
        FullChannelState, SignatureError, ValidationError, PARTICIPANTS,
    },
    client::Engine,
    error::ProtocolError,
    messages::{ProtocolMessage, ProtocolReply, RejectReason},
};
use tracing::{debug, warn};

fn rejected(
    reason: RejectReason,
    message: impl Into<String>,
    prior: Option<&FullChannelState>,
) -> ProtocolReply {
    ProtocolReply::Rejected {
        reason,
        message: message.into(),
        latest_update: prior.map(|c| c.latest_update.clone()),
    }
}

/// Answer an update proposed by the counterparty.
pub(crate) async fn handle_inbound(engine: &Engine, msg: ProtocolMessage) -> ProtocolReply {
    let channel_address = msg.update.channel_address;
    let nonce = msg.update.nonce;
    match countersign(engine, msg).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(
                channel = %channel_address,
                nonce,
                reason = e.reason(),
                error = %e,
                "rejecting update"
            );
            ProtocolReply::Rejected {
                reason: RejectReason::Invalid(e.reason().to_string()),
                message: e.to_string(),
                latest_update: None,
            }
        }
    }
}

async fn countersign(engine: &Engine, msg: ProtocolMessage) -> Result<ProtocolReply, ProtocolError> {
    let ProtocolMessage {
        mut update,
        latest_update,
    } = msg;
    let channel_address = update.channel_address;
    let our_identifier = engine.signer.public_identifier();

    // The setup proposer does not wait for a busy channel, so both sides can
    // propose at the same time without waiting on each other.
    let stored = engine.store.get_channel_state(channel_address).await?;
    let _guard = match stored.as_ref().and_then(|c| c.identifier_index(our_identifier)) {
        Some(0) => match engine.queue.try_acquire(channel_address) {
            Ok(guard) => guard,
            Err(e) => {
                debug!(channel = %channel_address, "channel busy, rejecting update");
                return Ok(rejected(RejectReason::ChannelBusy, e.to_string(), None));
            }
        },
        _ => engine.queue.acquire(channel_address).await,
    };

    let mut prior = engine.store.get_channel_state(channel_address).await?;
    let mut active = engine.store.get_active_transfers(channel_address).await?;
    let persisted = prior.as_ref().map(|c| c.nonce()).unwrap_or(0);

    if update.nonce <= persisted {
        debug!(
            channel = %channel_address,
            nonce = update.nonce,
            persisted,
            "stale update"
        );
        return Ok(rejected(
            RejectReason::StaleUpdate,
            format!("update nonce {} is not above {persisted}", update.nonce),
            prior.as_ref(),
        ));
    }
    if update.nonce > persisted + 1 {
        match latest_update {
            Some(latest) if latest.nonce == persisted + 1 && update.nonce == persisted + 2 => {
                let synced = sync_apply(engine, &latest, prior.as_ref(), &active).await?;
                prior = Some(synced.channel);
                active = synced.active_transfers;
            }
            _ => {
                warn!(
                    channel = %channel_address,
                    nonce = update.nonce,
                    persisted,
                    "update too far ahead"
                );
                return Ok(rejected(
                    RejectReason::RestoreNeeded,
                    format!("update nonce {} is ahead of {persisted}", update.nonce),
                    prior.as_ref(),
                ));
            }
        }
    }

    validate_inbound_update(
        &update,
        prior.as_ref(),
        &active,
        our_identifier,
        engine.chain.as_ref(),
        engine.interpreter.as_ref(),
    )
    .await?;
    let mut applied = apply_update(&update, prior.as_ref(), &active)?;

    let from = applied
        .channel
        .identifier_index(&update.from_identifier)
        .ok_or_else(|| ValidationError::InvalidUpdate("unknown proposer".to_string()))?;
    if update.signatures[from].is_none() {
        return Err(SignatureError::MissingSignature(from).into());
    }
    validate_channel_signatures(&applied.channel.core, &update.signatures, 1)?;

    sign_update(
        &mut update,
        &applied.channel.core,
        &engine.signer,
        PARTICIPANTS - 1 - from,
    )?;
    applied.channel.latest_update = update.clone();
    persist(engine, &applied).await?;
    debug!(
        channel = %channel_address,
        nonce = update.nonce,
        update_type = %update.update_type(),
        "countersigned update"
    );
    Ok(ProtocolReply::Accepted { update })
}
