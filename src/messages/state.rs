use super::{
    address, hash, per_participant, required, u256, u256_bytes, ConversionError,
};
use crate::{
    channel::{
        Balance, CoreChannelState, CoreTransferState, FullChannelState, FullTransferState,
        NetworkContext,
    },
    wire::proto,
};

impl TryFrom<proto::Balance> for Balance {
    type Error = ConversionError;

    fn try_from(value: proto::Balance) -> Result<Self, Self::Error> {
        let amount = per_participant("balance.amount", value.amount)?;
        let to = per_participant("balance.to", value.to)?;
        let [a0, a1] = amount;
        let [t0, t1] = to;
        Ok(Balance {
            amount: [u256("balance.amount", a0)?, u256("balance.amount", a1)?],
            to: [address("balance.to", t0)?, address("balance.to", t1)?],
        })
    }
}

impl From<Balance> for proto::Balance {
    fn from(value: Balance) -> Self {
        Self {
            amount: value.amount.iter().map(|a| u256_bytes(*a)).collect(),
            to: value.to.iter().map(|t| t.0.to_vec()).collect(),
        }
    }
}

impl TryFrom<proto::NetworkContext> for NetworkContext {
    type Error = ConversionError;

    fn try_from(value: proto::NetworkContext) -> Result<Self, Self::Error> {
        Ok(NetworkContext {
            chain_id: value.chain_id,
            channel_factory_address: address(
                "network_context.channel_factory_address",
                value.channel_factory_address,
            )?,
            channel_mastercopy_address: address(
                "network_context.channel_mastercopy_address",
                value.channel_mastercopy_address,
            )?,
            adjudicator_address: address(
                "network_context.adjudicator_address",
                value.adjudicator_address,
            )?,
            provider_url: value.provider_url,
        })
    }
}

impl From<NetworkContext> for proto::NetworkContext {
    fn from(value: NetworkContext) -> Self {
        Self {
            chain_id: value.chain_id,
            channel_factory_address: value.channel_factory_address.0.to_vec(),
            channel_mastercopy_address: value.channel_mastercopy_address.0.to_vec(),
            adjudicator_address: value.adjudicator_address.0.to_vec(),
            provider_url: value.provider_url,
        }
    }
}

impl TryFrom<proto::CoreChannelState> for CoreChannelState {
    type Error = ConversionError;

    fn try_from(value: proto::CoreChannelState) -> Result<Self, Self::Error> {
        let [p0, p1] = per_participant("participants", value.participants)?;
        Ok(CoreChannelState {
            channel_address: address("channel_address", value.channel_address)?,
            participants: [address("participants", p0)?, address("participants", p1)?],
            timeout: u256("timeout", value.timeout)?,
            balances: value
                .balances
                .into_iter()
                .map(Balance::try_from)
                .collect::<Result<_, _>>()?,
            locked_value: value
                .locked_value
                .into_iter()
                .map(|v| u256("locked_value", v))
                .collect::<Result<_, _>>()?,
            asset_ids: value
                .asset_ids
                .into_iter()
                .map(|a| address("asset_ids", a))
                .collect::<Result<_, _>>()?,
            nonce: value.nonce,
            latest_deposit_nonce: value.latest_deposit_nonce,
            merkle_root: hash("merkle_root", value.merkle_root)?,
        })
    }
}

impl From<CoreChannelState> for proto::CoreChannelState {
    fn from(value: CoreChannelState) -> Self {
        Self {
            channel_address: value.channel_address.0.to_vec(),
            participants: value.participants.iter().map(|p| p.0.to_vec()).collect(),
            timeout: u256_bytes(value.timeout),
            balances: value.balances.into_iter().map(Into::into).collect(),
            locked_value: value.locked_value.into_iter().map(u256_bytes).collect(),
            asset_ids: value.asset_ids.iter().map(|a| a.0.to_vec()).collect(),
            nonce: value.nonce,
            latest_deposit_nonce: value.latest_deposit_nonce,
            merkle_root: value.merkle_root.0.to_vec(),
        }
    }
}

impl TryFrom<proto::FullChannelState> for FullChannelState {
    type Error = ConversionError;

    fn try_from(value: proto::FullChannelState) -> Result<Self, Self::Error> {
        Ok(FullChannelState {
            core: required("core", value.core)?.try_into()?,
            public_identifiers: per_participant("public_identifiers", value.public_identifiers)?,
            network_context: required("network_context", value.network_context)?.try_into()?,
            latest_update: required("latest_update", value.latest_update)?.try_into()?,
            in_dispute: value.in_dispute,
        })
    }
}

impl From<FullChannelState> for proto::FullChannelState {
    fn from(value: FullChannelState) -> Self {
        Self {
            core: Some(value.core.into()),
            public_identifiers: value.public_identifiers.to_vec(),
            network_context: Some(value.network_context.into()),
            latest_update: Some(value.latest_update.into()),
            in_dispute: value.in_dispute,
        }
    }
}

impl TryFrom<proto::CoreTransferState> for CoreTransferState {
    type Error = ConversionError;

    fn try_from(value: proto::CoreTransferState) -> Result<Self, Self::Error> {
        Ok(CoreTransferState {
            initial_balance: required("initial_balance", value.initial_balance)?.try_into()?,
            asset_id: address("asset_id", value.asset_id)?,
            channel_address: address("channel_address", value.channel_address)?,
            transfer_id: hash("transfer_id", value.transfer_id)?,
            transfer_definition: address("transfer_definition", value.transfer_definition)?,
            transfer_timeout: u256("transfer_timeout", value.transfer_timeout)?,
            initial_state_hash: hash("initial_state_hash", value.initial_state_hash)?,
            transfer_encodings: per_participant("transfer_encodings", value.transfer_encodings)?,
        })
    }
}

impl From<CoreTransferState> for proto::CoreTransferState {
    fn from(value: CoreTransferState) -> Self {
        Self {
            initial_balance: Some(value.initial_balance.into()),
            asset_id: value.asset_id.0.to_vec(),
            channel_address: value.channel_address.0.to_vec(),
            transfer_id: value.transfer_id.0.to_vec(),
            transfer_definition: value.transfer_definition.0.to_vec(),
            transfer_timeout: u256_bytes(value.transfer_timeout),
            initial_state_hash: value.initial_state_hash.0.to_vec(),
            transfer_encodings: value.transfer_encodings.to_vec(),
        }
    }
}

impl TryFrom<proto::FullTransferState> for FullTransferState {
    type Error = ConversionError;

    fn try_from(value: proto::FullTransferState) -> Result<Self, Self::Error> {
        Ok(FullTransferState {
            core: required("core", value.core)?.try_into()?,
            transfer_state: value.transfer_state,
            transfer_resolver: value.transfer_resolver,
            initiator: address("initiator", value.initiator)?,
            responder: address("responder", value.responder)?,
            chain_id: value.chain_id,
            channel_nonce: value.channel_nonce,
        })
    }
}

impl From<FullTransferState> for proto::FullTransferState {
    fn from(value: FullTransferState) -> Self {
        Self {
            core: Some(value.core.into()),
            transfer_state: value.transfer_state,
            transfer_resolver: value.transfer_resolver,
            initiator: value.initiator.0.to_vec(),
            responder: value.responder.0.to_vec(),
            chain_id: value.chain_id,
            channel_nonce: value.channel_nonce,
        }
    }
}
