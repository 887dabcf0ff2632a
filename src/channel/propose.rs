//! Building unsigned updates from caller parameters.

use super::{
    apply::{created_channel_balance, created_transfer, resolved_channel_balance},
    params::{CreateTransfer, ResolveTransfer, Setup, UpdateParams, ValidationError},
    state::{transfer_id, Balance, FullChannelState, FullTransferState},
    update::{
        ChannelUpdate, CreateDetails, DepositDetails, ResolveDetails, SetupDetails, UpdateDetails,
    },
    PartIdx, PARTICIPANTS,
};
use crate::{
    abiencode::types::{Address, U256},
    chain::{derive_channel_address, ChainReader, TransferInterpreter},
    merkle,
    sig::{self, Signer},
};
use tracing::debug;

fn invalid(e: impl ToString) -> ValidationError {
    ValidationError::InvalidUpdate(e.to_string())
}

/// Address of the channel `params` operate on. For setup this is the CREATE2
/// address of the channel between `signer` and the counterparty.
pub async fn channel_address_for(
    params: &UpdateParams,
    signer: &Signer,
    chain: &dyn ChainReader,
) -> Result<Address, ValidationError> {
    match params {
        UpdateParams::Setup(p) => {
            let setup = p.validate()?;
            let counterparty = counterparty_address(&setup, signer)?;
            derive_channel_address(chain, signer.address(), counterparty, &setup.network_context)
                .await
                .map_err(ValidationError::Create2Failed)
        }
        UpdateParams::Deposit(p) => Ok(p.validate()?.channel_address),
        UpdateParams::Create(p) => Ok(p.validate()?.channel_address),
        UpdateParams::Resolve(p) => Ok(p.validate()?.channel_address),
    }
}

fn counterparty_address(setup: &Setup, signer: &Signer) -> Result<Address, ValidationError> {
    if setup.counterparty_identifier == signer.public_identifier() {
        return Err(ValidationError::CounterpartyIsSelf);
    }
    let address = sig::address_from_public_identifier(&setup.counterparty_identifier).map_err(
        |e| ValidationError::InvalidParams {
            params_error: format!("data.counterpartyIdentifier {e}"),
        },
    )?;
    if address == signer.address() {
        return Err(ValidationError::CounterpartyIsSelf);
    }
    Ok(address)
}

/// Our index and the counterparty identifier in an existing, undisputed channel.
fn channel_parties<'a>(
    channel: Option<&'a FullChannelState>,
    channel_address: Address,
    signer: &Signer,
) -> Result<(&'a FullChannelState, PartIdx, String), ValidationError> {
    let channel = channel.ok_or(ValidationError::ChannelNotFound(channel_address))?;
    if channel.in_dispute {
        return Err(ValidationError::ChannelInDispute(channel_address));
    }
    let idx = channel
        .identifier_index(signer.public_identifier())
        .ok_or_else(|| invalid("signer is not a participant of the channel"))?;
    let counterparty = channel.public_identifiers[PARTICIPANTS - 1 - idx].clone();
    Ok((channel, idx, counterparty))
}

/// Build the next, unsigned update of the channel at `channel_address`.
///
/// `prior` and `active_transfers` are the persisted state of that channel. No
/// signature is created and nothing is sent.
pub async fn propose(
    params: &UpdateParams,
    channel_address: Address,
    prior: Option<&FullChannelState>,
    active_transfers: &[FullTransferState],
    signer: &Signer,
    interpreter: &dyn TransferInterpreter,
) -> Result<ChannelUpdate, ValidationError> {
    let update = match params {
        UpdateParams::Setup(p) => propose_setup(p.validate()?, channel_address, prior, signer)?,
        UpdateParams::Deposit(p) => {
            let deposit = p.validate()?;
            propose_deposit(deposit.amount, deposit.asset_id, channel_address, prior, signer)?
        }
        UpdateParams::Create(p) => {
            propose_create(p.validate()?, channel_address, prior, active_transfers, signer, interpreter)
                .await?
        }
        UpdateParams::Resolve(p) => {
            propose_resolve(p.validate()?, channel_address, prior, active_transfers, signer, interpreter)
                .await?
        }
    };
    debug!(
        channel = %update.channel_address,
        nonce = update.nonce,
        update_type = %update.update_type(),
        "proposed update"
    );
    Ok(update)
}

fn propose_setup(
    setup: Setup,
    channel_address: Address,
    prior: Option<&FullChannelState>,
    signer: &Signer,
) -> Result<ChannelUpdate, ValidationError> {
    if prior.is_some() {
        return Err(ValidationError::ChannelAlreadySetup(channel_address));
    }
    let counterparty = counterparty_address(&setup, signer)?;
    Ok(ChannelUpdate {
        channel_address,
        from_identifier: signer.public_identifier().to_string(),
        to_identifier: setup.counterparty_identifier,
        nonce: 1,
        balance: Balance::zero([signer.address(), counterparty]),
        asset_id: Address::ZERO,
        details: UpdateDetails::Setup(SetupDetails {
            timeout: setup.timeout,
            network_context: setup.network_context,
        }),
        signatures: [None, None],
    })
}

fn propose_deposit(
    amount: U256,
    asset_id: Address,
    channel_address: Address,
    prior: Option<&FullChannelState>,
    signer: &Signer,
) -> Result<ChannelUpdate, ValidationError> {
    let (channel, idx, counterparty) = channel_parties(prior, channel_address, signer)?;
    let mut balance = channel
        .core
        .asset_index(&asset_id)
        .map(|i| channel.core.balances[i])
        .unwrap_or_else(|| Balance::zero(channel.core.participants));
    balance.amount[idx] = balance.amount[idx]
        .checked_add(amount)
        .ok_or_else(|| invalid("deposit overflows the balance"))?;

    Ok(ChannelUpdate {
        channel_address,
        from_identifier: signer.public_identifier().to_string(),
        to_identifier: counterparty,
        nonce: channel.nonce() + 1,
        balance,
        asset_id,
        details: UpdateDetails::Deposit(DepositDetails {
            latest_deposit_nonce: channel.core.latest_deposit_nonce + 1,
        }),
        signatures: [None, None],
    })
}

async fn propose_create(
    create: CreateTransfer,
    channel_address: Address,
    prior: Option<&FullChannelState>,
    active_transfers: &[FullTransferState],
    signer: &Signer,
    interpreter: &dyn TransferInterpreter,
) -> Result<ChannelUpdate, ValidationError> {
    let (channel, idx, counterparty) = channel_parties(prior, channel_address, signer)?;
    let asset_idx = channel.core.asset_index(&create.asset_id);
    let available = asset_idx
        .map(|i| channel.core.balances[i].amount[idx])
        .unwrap_or_default();
    let insufficient = ValidationError::InsufficientFunds {
        asset_id: create.asset_id,
        available,
        requested: create.amount,
    };
    let asset_idx = match asset_idx {
        Some(i) if create.amount <= available => i,
        _ => return Err(insufficient),
    };

    let nonce = channel.nonce() + 1;
    let transfer_balance = Balance {
        amount: [create.amount, U256::zero()],
        to: [
            channel.core.participants[idx],
            channel.core.participants[PARTICIPANTS - 1 - idx],
        ],
    };
    let balance = created_channel_balance(&channel.core.balances[asset_idx], idx, &transfer_balance)
        .ok_or(insufficient)?;
    let mut details = CreateDetails {
        transfer_id: transfer_id(channel_address, nonce, create.transfer_definition, create.timeout)
            .map_err(invalid)?,
        transfer_definition: create.transfer_definition,
        transfer_timeout: create.timeout,
        transfer_initial_state: create.transfer_initial_state,
        transfer_encodings: create.encodings,
        transfer_initial_balance: transfer_balance,
        merkle_proof_data: Vec::new(),
        merkle_root: channel.core.merkle_root,
    };
    let mut update = ChannelUpdate {
        channel_address,
        from_identifier: signer.public_identifier().to_string(),
        to_identifier: counterparty,
        nonce,
        balance,
        asset_id: create.asset_id,
        details: UpdateDetails::Create(details.clone()),
        signatures: [None, None],
    };

    let transfer = created_transfer(channel, &update, &details).map_err(invalid)?;
    match interpreter.create(&transfer).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(ValidationError::TransferCreationRejected(
                "initial state rejected by transfer definition".to_string(),
            ))
        }
        Err(e) => return Err(ValidationError::TransferCreationRejected(e.to_string())),
    }

    let tree = merkle::build_tree(
        active_transfers
            .iter()
            .map(|t| &t.core)
            .chain([&transfer.core]),
    )
    .map_err(invalid)?;
    details.merkle_root = tree.root();
    details.merkle_proof_data = tree
        .proof(&transfer.transfer_id())
        .ok_or_else(|| invalid("new transfer missing from merkle tree"))?;
    update.details = UpdateDetails::Create(details);
    Ok(update)
}

/// Channel balance after resolving `transfer` with `resolver`, as computed by
/// the transfer definition.
pub(crate) async fn resolution_balance(
    channel: &FullChannelState,
    transfer: &FullTransferState,
    resolver: &[u8],
    interpreter: &dyn TransferInterpreter,
) -> Result<Balance, ValidationError> {
    let transfer_id = transfer.transfer_id();
    let invalid_resolution = |message: String| ValidationError::InvalidResolution {
        transfer_id,
        message,
    };

    let payout = interpreter
        .resolve(transfer, resolver)
        .await
        .map_err(|e| invalid_resolution(e.to_string()))?;
    if payout.total() != transfer.core.initial_balance.total() {
        return Err(invalid_resolution(
            "resolved balance does not match the locked amount".to_string(),
        ));
    }

    let asset_idx = channel
        .core
        .asset_index(&transfer.core.asset_id)
        .ok_or_else(|| invalid_resolution("transfer asset not in channel".to_string()))?;
    resolved_channel_balance(
        &channel.core.balances[asset_idx],
        &channel.core.participants,
        &payout,
    )
    .ok_or_else(|| invalid_resolution("transfer pays out to a non participant".to_string()))
}

async fn propose_resolve(
    resolve: ResolveTransfer,
    channel_address: Address,
    prior: Option<&FullChannelState>,
    active_transfers: &[FullTransferState],
    signer: &Signer,
    interpreter: &dyn TransferInterpreter,
) -> Result<ChannelUpdate, ValidationError> {
    let (channel, _, counterparty) = channel_parties(prior, channel_address, signer)?;
    let transfer = active_transfers
        .iter()
        .find(|t| t.transfer_id() == resolve.transfer_id)
        .ok_or(ValidationError::TransferNotActive(resolve.transfer_id))?;

    let balance =
        resolution_balance(channel, transfer, &resolve.transfer_resolver, interpreter).await?;
    let merkle_root = merkle::compute_root(
        active_transfers
            .iter()
            .filter(|t| t.transfer_id() != resolve.transfer_id)
            .map(|t| &t.core),
    )
    .map_err(invalid)?;

    Ok(ChannelUpdate {
        channel_address,
        from_identifier: signer.public_identifier().to_string(),
        to_identifier: counterparty,
        nonce: channel.nonce() + 1,
        balance,
        asset_id: transfer.core.asset_id,
        details: UpdateDetails::Resolve(ResolveDetails {
            transfer_id: resolve.transfer_id,
            transfer_definition: transfer.core.transfer_definition,
            transfer_resolver: resolve.transfer_resolver,
            transfer_encodings: transfer.core.transfer_encodings.clone(),
            merkle_root,
        }),
        signatures: [None, None],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{
            apply::apply_update,
            params::{CreateTransferParams, DepositParams, ResolveTransferParams},
        },
        testing::{
            self, hashlock_resolver, hashlock_state, signers, HashlockInterpreter, MockChainReader,
            HASHLOCK_ENCODINGS,
        },
    };

    const PREIMAGE: [u8; 32] = [3; 32];

    async fn funded_channel(amount: u64) -> (FullChannelState, Signer) {
        let (alice, bob) = signers();
        let chain = MockChainReader::new();
        let params = UpdateParams::Setup(testing::setup_params(&bob));
        let address = channel_address_for(&params, &alice, &chain).await.unwrap();
        assert_eq!(address, testing::channel_address(&alice, &bob));

        let update = propose(&params, address, None, &[], &alice, &HashlockInterpreter)
            .await
            .unwrap();
        let channel = apply_update(&update, None, &[]).unwrap().channel;

        let deposit = UpdateParams::Deposit(DepositParams {
            channel_address: address.to_string(),
            amount: amount.to_string(),
            asset_id: Address::ZERO.to_string(),
        });
        let update = propose(&deposit, address, Some(&channel), &[], &alice, &HashlockInterpreter)
            .await
            .unwrap();
        let channel = apply_update(&update, Some(&channel), &[]).unwrap().channel;
        (channel, alice)
    }

    fn create_params(channel: &FullChannelState, amount: &str) -> UpdateParams {
        UpdateParams::Create(CreateTransferParams {
            channel_address: channel.channel_address().to_string(),
            amount: amount.to_string(),
            asset_id: Address::ZERO.to_string(),
            transfer_definition: Address([0xde; 20]).to_string(),
            transfer_initial_state: format!("0x{}", hex::encode(hashlock_state(&PREIMAGE))),
            timeout: "1".to_string(),
            encodings: HASHLOCK_ENCODINGS.map(String::from),
        })
    }

    #[tokio::test]
    async fn deposit_credits_proposer() {
        let (channel, _) = funded_channel(10).await;
        assert_eq!(channel.nonce(), 2);
        assert_eq!(channel.core.balances[0].amount, [U256::from(10), U256::zero()]);
    }

    #[tokio::test]
    async fn setup_twice_fails() {
        let (channel, alice) = funded_channel(10).await;
        let (_, bob) = signers();
        let params = UpdateParams::Setup(testing::setup_params(&bob));
        let err = propose(
            &params,
            channel.channel_address(),
            Some(&channel),
            &[],
            &alice,
            &HashlockInterpreter,
        )
        .await
        .unwrap_err();
        assert_eq!(err.reason(), "ChannelAlreadySetup");
    }

    #[tokio::test]
    async fn setup_with_self_fails() {
        let (alice, _) = signers();
        let params = UpdateParams::Setup(testing::setup_params(&alice));
        let err = channel_address_for(&params, &alice, &MockChainReader::new())
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::CounterpartyIsSelf);
    }

    #[tokio::test]
    async fn create_exceeding_balance_fails() {
        let (channel, alice) = funded_channel(10).await;
        let err = propose(
            &create_params(&channel, "11"),
            channel.channel_address(),
            Some(&channel),
            &[],
            &alice,
            &HashlockInterpreter,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsufficientFunds {
                asset_id: Address::ZERO,
                available: U256::from(10),
                requested: U256::from(11),
            }
        );
    }

    #[tokio::test]
    async fn create_rejected_by_definition() {
        let (channel, alice) = funded_channel(10).await;
        let mut params = create_params(&channel, "1");
        if let UpdateParams::Create(p) = &mut params {
            p.transfer_initial_state = format!("0x{}", "00".repeat(32));
        }
        let err = propose(
            &params,
            channel.channel_address(),
            Some(&channel),
            &[],
            &alice,
            &HashlockInterpreter,
        )
        .await
        .unwrap_err();
        assert_eq!(err.reason(), "TransferCreationRejected");
    }

    #[tokio::test]
    async fn create_and_resolve_apply() {
        let (channel, alice) = funded_channel(10).await;
        let update = propose(
            &create_params(&channel, "4"),
            channel.channel_address(),
            Some(&channel),
            &[],
            &alice,
            &HashlockInterpreter,
        )
        .await
        .unwrap();
        let created = apply_update(&update, Some(&channel), &[]).unwrap();
        let transfer = created.transfer.unwrap();

        let resolve = UpdateParams::Resolve(ResolveTransferParams {
            channel_address: channel.channel_address().to_string(),
            transfer_id: transfer.transfer_id().to_string(),
            transfer_resolver: format!("0x{}", hex::encode(hashlock_resolver(&PREIMAGE))),
        });
        let update = propose(
            &resolve,
            channel.channel_address(),
            Some(&created.channel),
            &created.active_transfers,
            &alice,
            &HashlockInterpreter,
        )
        .await
        .unwrap();
        let resolved =
            apply_update(&update, Some(&created.channel), &created.active_transfers).unwrap();
        assert_eq!(resolved.channel.core.merkle_root, channel.core.merkle_root);
        assert_eq!(
            resolved.channel.core.balances[0].amount,
            [U256::from(6), U256::from(4)]
        );
    }

    #[tokio::test]
    async fn resolve_of_unknown_transfer_fails() {
        let (channel, alice) = funded_channel(10).await;
        let params = UpdateParams::Resolve(ResolveTransferParams {
            channel_address: channel.channel_address().to_string(),
            transfer_id: format!("0x{}", "11".repeat(32)),
            transfer_resolver: "0x".to_string(),
        });
        let err = propose(
            &params,
            channel.channel_address(),
            Some(&channel),
            &[],
            &alice,
            &HashlockInterpreter,
        )
        .await
        .unwrap_err();
        assert_eq!(err.reason(), "TransferNotActive");
    }

    #[tokio::test]
    async fn disputed_channel_rejects_updates() {
        let (mut channel, alice) = funded_channel(10).await;
        channel.in_dispute = true;
        let err = propose(
            &create_params(&channel, "1"),
            channel.channel_address(),
            Some(&channel),
            &[],
            &alice,
            &HashlockInterpreter,
        )
        .await
        .unwrap_err();
        assert_eq!(err, ValidationError::ChannelInDispute(channel.channel_address()));
    }
}
