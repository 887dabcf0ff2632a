//! Caller supplied update parameters and their validation.
//!
//! Parameters arrive as strings (like they would from an RPC layer) and are
//! checked before the store or the counterparty is involved. The error
//! messages follow the schema validator wording (`data.<field> should ...`).

use super::state::NetworkContext;
use crate::{
    abiencode::types::{Address, Hash, U256},
    chain::ChainError,
};
use thiserror::Error;

const ADDRESS_PATTERN: &str = r#"should match pattern "^0x[a-fA-F0-9]{40}$""#;
const BYTES32_PATTERN: &str = r#"should match pattern "^0x([a-fA-F0-9]{64})$""#;
const BYTES_PATTERN: &str = r#"should match pattern "^0x([a-fA-F0-9]{2})*$""#;
const INTEGER_PATTERN: &str = r#"should match pattern "^([0-9])*$""#;
const IDENTIFIER_PATTERN: &str = r#"should match pattern "^vector([a-fA-F0-9]{66})$""#;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid params: {params_error}")]
    InvalidParams { params_error: String },
    #[error("channel {0} not found")]
    ChannelNotFound(Address),
    #[error("channel {0} is already set up")]
    ChannelAlreadySetup(Address),
    #[error("cannot set up a channel with oneself")]
    CounterpartyIsSelf,
    #[error("insufficient funds for asset {asset_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        asset_id: Address,
        available: U256,
        requested: U256,
    },
    #[error("transfer creation rejected: {0}")]
    TransferCreationRejected(String),
    #[error("transfer {0} is not active")]
    TransferNotActive(Hash),
    #[error("invalid resolution of transfer {transfer_id}: {message}")]
    InvalidResolution { transfer_id: Hash, message: String },
    #[error("channel {0} is in dispute")]
    ChannelInDispute(Address),
    #[error("failed to derive channel address: {0}")]
    Create2Failed(ChainError),
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}

impl ValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::InvalidParams { .. } => "InvalidParams",
            ValidationError::ChannelNotFound(_) => "ChannelNotFound",
            ValidationError::ChannelAlreadySetup(_) => "ChannelAlreadySetup",
            ValidationError::CounterpartyIsSelf => "CounterpartyIsSelf",
            ValidationError::InsufficientFunds { .. } => "InsufficientFunds",
            ValidationError::TransferCreationRejected(_) => "TransferCreationRejected",
            ValidationError::TransferNotActive(_) => "TransferNotActive",
            ValidationError::InvalidResolution { .. } => "InvalidResolution",
            ValidationError::ChannelInDispute(_) => "ChannelInDispute",
            ValidationError::Create2Failed(_) => "Create2Failed",
            ValidationError::InvalidUpdate(_) => "InvalidUpdate",
        }
    }

    fn params(params_error: String) -> Self {
        ValidationError::InvalidParams { params_error }
    }
}

/// Network context as given by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkContextParams {
    pub chain_id: u64,
    pub channel_factory_address: String,
    pub channel_mastercopy_address: String,
    pub adjudicator_address: String,
    pub provider_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetupParams {
    pub counterparty_identifier: String,
    pub timeout: String,
    pub network_context: NetworkContextParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepositParams {
    pub channel_address: String,
    pub amount: String,
    pub asset_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateTransferParams {
    pub channel_address: String,
    pub amount: String,
    pub asset_id: String,
    pub transfer_definition: String,
    /// Hex encoded, ABI encoded initial state.
    pub transfer_initial_state: String,
    pub timeout: String,
    /// ABI types of the initial state and the resolver.
    pub encodings: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolveTransferParams {
    pub channel_address: String,
    pub transfer_id: String,
    /// Hex encoded, ABI encoded resolver.
    pub transfer_resolver: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RestoreParams {
    pub chain_id: u64,
    pub counterparty_identifier: String,
}

/// Parameters of any update type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateParams {
    Setup(SetupParams),
    Deposit(DepositParams),
    Create(CreateTransferParams),
    Resolve(ResolveTransferParams),
}

fn required<'a>(parent: &str, name: &str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.is_empty() {
        Err(ValidationError::params(format!(
            "{parent} should have required property '{name}'"
        )))
    } else {
        Ok(value)
    }
}

fn pattern_error(parent: &str, name: &str, rule: &str) -> ValidationError {
    ValidationError::params(format!("{parent}.{name} {rule}"))
}

fn parse_address(parent: &str, name: &str, value: &str) -> Result<Address, ValidationError> {
    required(parent, name, value)?
        .parse()
        .map_err(|_| pattern_error(parent, name, ADDRESS_PATTERN))
}

fn parse_bytes32(parent: &str, name: &str, value: &str) -> Result<Hash, ValidationError> {
    required(parent, name, value)?
        .parse()
        .map_err(|_| pattern_error(parent, name, BYTES32_PATTERN))
}

fn parse_bytes(parent: &str, name: &str, value: &str) -> Result<Vec<u8>, ValidationError> {
    required(parent, name, value)?
        .strip_prefix("0x")
        .and_then(|digits| hex::decode(digits).ok())
        .ok_or_else(|| pattern_error(parent, name, BYTES_PATTERN))
}

fn parse_integer(parent: &str, name: &str, value: &str) -> Result<U256, ValidationError> {
    let value = required(parent, name, value)?;
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(pattern_error(parent, name, INTEGER_PATTERN));
    }
    U256::from_dec_str(value)
        .map_err(|_| ValidationError::params(format!("{parent}.{name} should fit into uint256")))
}

fn check_identifier<'a>(
    parent: &str,
    name: &str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    let value = required(parent, name, value)?;
    let valid = value
        .strip_prefix("vector")
        .map(|digits| digits.len() == 66 && digits.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false);
    if valid {
        Ok(value)
    } else {
        Err(pattern_error(parent, name, IDENTIFIER_PATTERN))
    }
}

fn check_chain_id(parent: &str, chain_id: u64) -> Result<u64, ValidationError> {
    if chain_id < 1 {
        return Err(ValidationError::params(format!(
            "{parent}.chainId should be >= 1"
        )));
    }
    Ok(chain_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Setup {
    pub counterparty_identifier: String,
    pub timeout: U256,
    pub network_context: NetworkContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Deposit {
    pub channel_address: Address,
    pub amount: U256,
    pub asset_id: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CreateTransfer {
    pub channel_address: Address,
    pub amount: U256,
    pub asset_id: Address,
    pub transfer_definition: Address,
    pub transfer_initial_state: Vec<u8>,
    pub timeout: U256,
    pub encodings: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolveTransfer {
    pub channel_address: Address,
    pub transfer_id: Hash,
    pub transfer_resolver: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Restore {
    pub chain_id: u64,
    pub counterparty_identifier: String,
}

impl NetworkContextParams {
    pub(crate) fn validate(&self) -> Result<NetworkContext, ValidationError> {
        const PARENT: &str = "data.networkContext";
        Ok(NetworkContext {
            chain_id: check_chain_id(PARENT, self.chain_id)?,
            channel_factory_address: parse_address(
                PARENT,
                "channelFactoryAddress",
                &self.channel_factory_address,
            )?,
            channel_mastercopy_address: parse_address(
                PARENT,
                "channelMastercopyAddress",
                &self.channel_mastercopy_address,
            )?,
            adjudicator_address: parse_address(
                PARENT,
                "adjudicatorAddress",
                &self.adjudicator_address,
            )?,
            provider_url: self.provider_url.clone(),
        })
    }
}

impl SetupParams {
    pub(crate) fn validate(&self) -> Result<Setup, ValidationError> {
        Ok(Setup {
            counterparty_identifier: check_identifier(
                "data",
                "counterpartyIdentifier",
                &self.counterparty_identifier,
            )?
            .to_string(),
            timeout: parse_integer("data", "timeout", &self.timeout)?,
            network_context: self.network_context.validate()?,
        })
    }
}

impl DepositParams {
    pub(crate) fn validate(&self) -> Result<Deposit, ValidationError> {
        Ok(Deposit {
            channel_address: parse_address("data", "channelAddress", &self.channel_address)?,
            amount: parse_integer("data", "amount", &self.amount)?,
            asset_id: parse_address("data", "assetId", &self.asset_id)?,
        })
    }
}

impl CreateTransferParams {
    pub(crate) fn validate(&self) -> Result<CreateTransfer, ValidationError> {
        let channel_address = parse_address("data", "channelAddress", &self.channel_address)?;
        let amount = parse_integer("data", "amount", &self.amount)?;
        let asset_id = parse_address("data", "assetId", &self.asset_id)?;
        let transfer_definition =
            parse_address("data", "transferDefinition", &self.transfer_definition)?;
        let transfer_initial_state =
            parse_bytes("data", "transferInitialState", &self.transfer_initial_state)?;
        let timeout = parse_integer("data", "timeout", &self.timeout)?;
        for encoding in &self.encodings {
            required("data", "encodings", encoding)?;
        }
        Ok(CreateTransfer {
            channel_address,
            amount,
            asset_id,
            transfer_definition,
            transfer_initial_state,
            timeout,
            encodings: self.encodings.clone(),
        })
    }
}

impl ResolveTransferParams {
    pub(crate) fn validate(&self) -> Result<ResolveTransfer, ValidationError> {
        Ok(ResolveTransfer {
            channel_address: parse_address("data", "channelAddress", &self.channel_address)?,
            transfer_id: parse_bytes32("data", "transferId", &self.transfer_id)?,
            transfer_resolver: parse_bytes("data", "transferResolver", &self.transfer_resolver)?,
        })
    }
}

impl RestoreParams {
    pub(crate) fn validate(&self) -> Result<Restore, ValidationError> {
        Ok(Restore {
            chain_id: check_chain_id("data", self.chain_id)?,
            counterparty_identifier: check_identifier(
                "data",
                "counterpartyIdentifier",
                &self.counterparty_identifier,
            )?
            .to_string(),
        })
    }
}
