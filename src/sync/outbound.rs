use super::{persist, sync_apply, SuccessfullyApplied, SyncError, UpdateResult};
use crate::{
    channel::{
        apply_update, channel_address_for, propose, sign_update, validate_update_signatures,
        ApplyResult, ChannelUpdate, UpdateParams, ValidationError, PARTICIPANTS,
    },
    client::Engine,
    error::ProtocolError,
    messages::{ProtocolMessage, ProtocolReply, RejectReason},
    wire::MessagingError,
};
use tracing::{debug, warn};

/// Everything but the signatures has to match.
fn same_update(a: &ChannelUpdate, b: &ChannelUpdate) -> bool {
    let mut a = a.clone();
    a.signatures = b.signatures;
    a == *b
}

/// Propose the update described by `params` and get it countersigned.
///
/// Each attempt holds the channel for the whole exchange. Timeouts, busy
/// replies and newer counterparty updates lead to a bounded number of new
/// attempts. If a synced counterparty update leaves nothing to propose, the
/// synced state is returned as [SuccessfullyApplied::SyncApplied].
pub(crate) async fn propose_outbound(
    engine: &Engine,
    params: &UpdateParams,
) -> Result<UpdateResult, ProtocolError> {
    let channel_address =
        channel_address_for(params, &engine.signer, engine.chain.as_ref()).await?;
    let config = &engine.config;
    let (mut timeouts, mut syncs, mut busy) = (0u32, 0u32, 0u32);
    let mut synced: Option<ApplyResult> = None;

    loop {
        let guard = engine.queue.acquire(channel_address).await;
        let prior = engine.store.get_channel_state(channel_address).await?;
        let active = engine.store.get_active_transfers(channel_address).await?;

        let proposed = propose(
            params,
            channel_address,
            prior.as_ref(),
            &active,
            &engine.signer,
            engine.interpreter.as_ref(),
        )
        .await;
        let mut update = match (proposed, synced.take()) {
            (Ok(update), _) => update,
            // The synced update made the proposal obsolete.
            (Err(e), Some(synced)) => {
                debug!(
                    channel = %channel_address,
                    reason = e.reason(),
                    "proposal no longer applies after sync"
                );
                return Ok(UpdateResult::new(synced, SuccessfullyApplied::SyncApplied));
            }
            (Err(e), None) => return Err(e.into()),
        };
        let mut applied = apply_update(&update, prior.as_ref(), &active)?;
        let idx = applied
            .channel
            .identifier_index(engine.signer.public_identifier())
            .ok_or_else(|| {
                ValidationError::InvalidUpdate("signer is not a participant".to_string())
            })?;
        sign_update(&mut update, &applied.channel.core, &engine.signer, idx)?;

        let our_nonce = prior.as_ref().map(|c| c.nonce()).unwrap_or(0);
        let msg = ProtocolMessage {
            update: update.clone(),
            latest_update: prior.as_ref().map(|c| c.latest_update.clone()),
        };
        let reply = engine
            .messaging
            .send_protocol_message(&update.to_identifier, msg, config.message_timeout())
            .await;

        match reply {
            Err(MessagingError::Timeout(to)) if timeouts < config.max_messaging_retries => {
                timeouts += 1;
                warn!(
                    channel = %channel_address,
                    nonce = update.nonce,
                    attempt = timeouts,
                    "no reply from {to}, resending"
                );
            }
            Err(e) => return Err(e.into()),
            Ok(ProtocolReply::Accepted { update: signed }) => {
                if !same_update(&signed, &update) {
                    return Err(SyncError::InvalidReply(
                        "countersigned update differs from the proposal".to_string(),
                    )
                    .into());
                }
                let other = PARTICIPANTS - 1 - idx;
                update.signatures[other] = signed.signatures[other];
                validate_update_signatures(&update, &applied.channel.core)?;
                applied.channel.latest_update = update;
                persist(engine, &applied).await?;
                debug!(
                    channel = %channel_address,
                    nonce = applied.channel.nonce(),
                    update_type = %applied.channel.latest_update.update_type(),
                    "update executed"
                );
                return Ok(UpdateResult::new(applied, SuccessfullyApplied::Executed));
            }
            Ok(ProtocolReply::Rejected {
                reason: RejectReason::StaleUpdate,
                latest_update: Some(latest),
                ..
            }) if latest.nonce == our_nonce + 1 => {
                let applied_latest = sync_apply(engine, &latest, prior.as_ref(), &active).await?;
                if applied_latest.channel.core == applied.channel.core {
                    // Our own proposal, the reply to it got lost.
                    return Ok(UpdateResult::new(
                        applied_latest,
                        SuccessfullyApplied::Executed,
                    ));
                }
                if syncs >= config.max_sync_retries {
                    warn!(channel = %channel_address, attempts = syncs + 1, "still behind after syncing");
                    return Err(SyncError::SyncRequired {
                        channel: channel_address,
                        attempts: syncs + 1,
                    }
                    .into());
                }
                syncs += 1;
                synced = Some(applied_latest);
                warn!(
                    channel = %channel_address,
                    nonce = latest.nonce,
                    "synced counterparty update, retrying proposal"
                );
            }
            Ok(ProtocolReply::Rejected {
                reason: RejectReason::StaleUpdate,
                latest_update: Some(latest),
                ..
            }) if latest.nonce > our_nonce + 1 => {
                return Err(SyncError::RestoreNeeded {
                    our_nonce,
                    counterparty_nonce: latest.nonce,
                }
                .into());
            }
            Ok(ProtocolReply::Rejected {
                reason: RejectReason::StaleUpdate,
                ..
            }) => {
                return Err(SyncError::InvalidReply(
                    "stale update reply without a newer update".to_string(),
                )
                .into());
            }
            Ok(ProtocolReply::Rejected {
                reason: RejectReason::RestoreNeeded,
                latest_update,
                ..
            }) => {
                return Err(SyncError::RestoreNeeded {
                    our_nonce,
                    counterparty_nonce: latest_update.map(|u| u.nonce).unwrap_or(0),
                }
                .into());
            }
            Ok(ProtocolReply::Rejected {
                reason: RejectReason::ChannelBusy,
                ..
            }) => {
                if busy >= config.max_busy_retries {
                    return Err(SyncError::ChannelBusy(channel_address).into());
                }
                busy += 1;
                debug!(channel = %channel_address, attempt = busy, "counterparty busy");
                drop(guard);
                tokio::time::sleep(config.busy_backoff()).await;
            }
            Ok(ProtocolReply::Rejected {
                reason: RejectReason::Invalid(reason),
                message,
                ..
            }) => {
                warn!(channel = %channel_address, reason = %reason, message = %message, "update rejected");
                return Err(SyncError::CounterpartyRejected { reason, message }.into());
            }
        }
    }
}
