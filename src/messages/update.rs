use super::{
    address, hash, per_participant, required, signature, u256, u256_bytes, ConversionError,
};
use crate::{
    channel::{
        ChannelUpdate, CreateDetails, DepositDetails, ResolveDetails, SetupDetails, UpdateDetails,
    },
    wire::proto::{self, channel_update::Details},
};

impl TryFrom<Details> for UpdateDetails {
    type Error = ConversionError;

    fn try_from(value: Details) -> Result<Self, Self::Error> {
        Ok(match value {
            Details::Setup(d) => UpdateDetails::Setup(SetupDetails {
                timeout: u256("setup.timeout", d.timeout)?,
                network_context: required("setup.network_context", d.network_context)?
                    .try_into()?,
            }),
            Details::Deposit(d) => UpdateDetails::Deposit(DepositDetails {
                latest_deposit_nonce: d.latest_deposit_nonce,
            }),
            Details::Create(d) => UpdateDetails::Create(CreateDetails {
                transfer_id: hash("create.transfer_id", d.transfer_id)?,
                transfer_definition: address("create.transfer_definition", d.transfer_definition)?,
                transfer_timeout: u256("create.transfer_timeout", d.transfer_timeout)?,
                transfer_initial_state: d.transfer_initial_state,
                transfer_encodings: per_participant(
                    "create.transfer_encodings",
                    d.transfer_encodings,
                )?,
                transfer_initial_balance: required(
                    "create.transfer_initial_balance",
                    d.transfer_initial_balance,
                )?
                .try_into()?,
                merkle_proof_data: d
                    .merkle_proof_data
                    .into_iter()
                    .map(|h| hash("create.merkle_proof_data", h))
                    .collect::<Result<_, _>>()?,
                merkle_root: hash("create.merkle_root", d.merkle_root)?,
            }),
            Details::Resolve(d) => UpdateDetails::Resolve(ResolveDetails {
                transfer_id: hash("resolve.transfer_id", d.transfer_id)?,
                transfer_definition: address("resolve.transfer_definition", d.transfer_definition)?,
                transfer_resolver: d.transfer_resolver,
                transfer_encodings: per_participant(
                    "resolve.transfer_encodings",
                    d.transfer_encodings,
                )?,
                merkle_root: hash("resolve.merkle_root", d.merkle_root)?,
            }),
        })
    }
}

impl From<UpdateDetails> for Details {
    fn from(value: UpdateDetails) -> Self {
        match value {
            UpdateDetails::Setup(d) => Details::Setup(proto::SetupDetails {
                timeout: u256_bytes(d.timeout),
                network_context: Some(d.network_context.into()),
            }),
            UpdateDetails::Deposit(d) => Details::Deposit(proto::DepositDetails {
                latest_deposit_nonce: d.latest_deposit_nonce,
            }),
            UpdateDetails::Create(d) => Details::Create(proto::CreateDetails {
                transfer_id: d.transfer_id.0.to_vec(),
                transfer_definition: d.transfer_definition.0.to_vec(),
                transfer_timeout: u256_bytes(d.transfer_timeout),
                transfer_initial_state: d.transfer_initial_state,
                transfer_encodings: d.transfer_encodings.to_vec(),
                transfer_initial_balance: Some(d.transfer_initial_balance.into()),
                merkle_proof_data: d.merkle_proof_data.iter().map(|h| h.0.to_vec()).collect(),
                merkle_root: d.merkle_root.0.to_vec(),
            }),
            UpdateDetails::Resolve(d) => Details::Resolve(proto::ResolveDetails {
                transfer_id: d.transfer_id.0.to_vec(),
                transfer_definition: d.transfer_definition.0.to_vec(),
                transfer_resolver: d.transfer_resolver,
                transfer_encodings: d.transfer_encodings.to_vec(),
                merkle_root: d.merkle_root.0.to_vec(),
            }),
        }
    }
}

impl TryFrom<proto::ChannelUpdate> for ChannelUpdate {
    type Error = ConversionError;

    fn try_from(value: proto::ChannelUpdate) -> Result<Self, Self::Error> {
        let [s0, s1] = per_participant("signatures", value.signatures)?;
        Ok(ChannelUpdate {
            channel_address: address("channel_address", value.channel_address)?,
            from_identifier: value.from_identifier,
            to_identifier: value.to_identifier,
            nonce: value.nonce,
            balance: required("balance", value.balance)?.try_into()?,
            asset_id: address("asset_id", value.asset_id)?,
            details: required("details", value.details)?.try_into()?,
            signatures: [signature("signatures", s0)?, signature("signatures", s1)?],
        })
    }
}

impl From<ChannelUpdate> for proto::ChannelUpdate {
    fn from(value: ChannelUpdate) -> Self {
        Self {
            channel_address: value.channel_address.0.to_vec(),
            from_identifier: value.from_identifier,
            to_identifier: value.to_identifier,
            nonce: value.nonce,
            balance: Some(value.balance.into()),
            asset_id: value.asset_id.0.to_vec(),
            signatures: value
                .signatures
                .into_iter()
                .map(|s| s.map(|s| s.0.to_vec()).unwrap_or_default())
                .collect(),
            details: Some(value.details.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{apply_update, FullChannelState},
        testing::{self, signers},
    };
    use prost::Message;

    #[test]
    fn signed_setup_survives_the_wire() {
        let (alice, bob) = signers();
        let update = testing::setup_update(&alice, &bob);
        let channel = apply_update(&update, None, &[]).unwrap().channel;

        let bytes = proto::FullChannelState::from(channel.clone()).encode_to_vec();
        let decoded = proto::FullChannelState::decode(bytes.as_slice()).unwrap();
        assert_eq!(FullChannelState::try_from(decoded).unwrap(), channel);
    }

    #[test]
    fn unsigned_slot_stays_empty() {
        let (alice, bob) = signers();
        let mut update = testing::setup_update(&alice, &bob);
        update.signatures[1] = None;
        let wire = proto::ChannelUpdate::from(update.clone());
        assert!(wire.signatures[1].is_empty());
        assert_eq!(ChannelUpdate::try_from(wire).unwrap(), update);
    }

    #[test]
    fn malformed_fields_are_reported() {
        let (alice, bob) = signers();
        let mut wire = proto::ChannelUpdate::from(testing::setup_update(&alice, &bob));
        wire.channel_address.pop();
        assert_eq!(
            ChannelUpdate::try_from(wire.clone()).unwrap_err(),
            ConversionError::ByteLengthMismatch {
                field: "channel_address",
                expected: 20,
                actual: 19,
            }
        );

        wire.channel_address.push(0);
        wire.details = None;
        assert_eq!(
            ChannelUpdate::try_from(wire).unwrap_err(),
            ConversionError::MissingField("details")
        );
    }
}
