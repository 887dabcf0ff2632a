//! Checks on updates received from the counterparty, before they are applied.
//!
//! Arithmetic and merkle checks happen during [apply_update](super::apply_update),
//! this covers what needs the chain or the transfer definition.

use super::{
    apply::created_transfer,
    params::ValidationError,
    propose::resolution_balance,
    state::{FullChannelState, FullTransferState},
    update::{ChannelUpdate, UpdateDetails},
};
use crate::{
    chain::{derive_channel_address, ChainReader, TransferInterpreter},
    sig,
};

/// Validate an update proposed to the participant `our_identifier`.
///
/// Deposits are taken as proposed. [ChainReader] has no view of on-chain
/// deposits, so the deposited amounts are not checked against the chain.
pub async fn validate_inbound_update(
    update: &ChannelUpdate,
    prior: Option<&FullChannelState>,
    active_transfers: &[FullTransferState],
    our_identifier: &str,
    chain: &dyn ChainReader,
    interpreter: &dyn TransferInterpreter,
) -> Result<(), ValidationError> {
    if update.to_identifier != our_identifier {
        return Err(ValidationError::InvalidUpdate(format!(
            "update is addressed to {}",
            update.to_identifier
        )));
    }
    if update.from_identifier == our_identifier {
        return Err(ValidationError::CounterpartyIsSelf);
    }

    let (details, channel) = match (&update.details, prior) {
        (UpdateDetails::Setup(details), None) => {
            let identity = |identifier: &str| {
                sig::address_from_public_identifier(identifier)
                    .map_err(|e| ValidationError::InvalidUpdate(e.to_string()))
            };
            let alice = identity(&update.from_identifier)?;
            let bob = identity(&update.to_identifier)?;
            let expected = derive_channel_address(chain, alice, bob, &details.network_context)
                .await
                .map_err(ValidationError::Create2Failed)?;
            if expected != update.channel_address {
                return Err(ValidationError::InvalidUpdate(format!(
                    "channel address {} does not match derived {expected}",
                    update.channel_address
                )));
            }
            return Ok(());
        }
        (UpdateDetails::Setup(_), Some(channel)) => {
            return Err(ValidationError::ChannelAlreadySetup(channel.channel_address()))
        }
        (_, None) => return Err(ValidationError::ChannelNotFound(update.channel_address)),
        (details, Some(channel)) => {
            if channel.in_dispute {
                return Err(ValidationError::ChannelInDispute(channel.channel_address()));
            }
            (details, channel)
        }
    };

    match details {
        UpdateDetails::Create(details) => {
            let transfer = created_transfer(channel, update, details)
                .map_err(|e| ValidationError::InvalidUpdate(e.to_string()))?;
            match interpreter.create(&transfer).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(ValidationError::TransferCreationRejected(
                    "initial state rejected by transfer definition".to_string(),
                )),
                Err(e) => Err(ValidationError::TransferCreationRejected(e.to_string())),
            }
        }
        UpdateDetails::Resolve(details) => {
            let transfer = active_transfers
                .iter()
                .find(|t| t.transfer_id() == details.transfer_id)
                .ok_or(ValidationError::TransferNotActive(details.transfer_id))?;
            let expected =
                resolution_balance(channel, transfer, &details.transfer_resolver, interpreter)
                    .await?;
            if expected != update.balance {
                return Err(ValidationError::InvalidResolution {
                    transfer_id: details.transfer_id,
                    message: "balance differs from the transfer definition result".to_string(),
                });
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
