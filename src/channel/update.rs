use super::{
    state::{Balance, NetworkContext},
    PartIdx, PARTICIPANTS,
};
use crate::abiencode::types::{Address, Hash, Signature, U256};
use core::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateType {
    Setup,
    Deposit,
    Create,
    Resolve,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Setup => "setup",
            UpdateType::Deposit => "deposit",
            UpdateType::Create => "create",
            UpdateType::Resolve => "resolve",
        }
    }
}

impl Display for UpdateType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupDetails {
    pub timeout: U256,
    pub network_context: NetworkContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositDetails {
    pub latest_deposit_nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDetails {
    pub transfer_id: Hash,
    pub transfer_definition: Address,
    pub transfer_timeout: U256,
    /// ABI encoded initial state.
    pub transfer_initial_state: Vec<u8>,
    pub transfer_encodings: [String; 2],
    /// Balance locked in the transfer, `[initiator, responder]`.
    pub transfer_initial_balance: Balance,
    /// Inclusion proof of the new transfer in `merkle_root`.
    pub merkle_proof_data: Vec<Hash>,
    pub merkle_root: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveDetails {
    pub transfer_id: Hash,
    pub transfer_definition: Address,
    /// ABI encoded resolver.
    pub transfer_resolver: Vec<u8>,
    pub transfer_encodings: [String; 2],
    pub merkle_root: Hash,
}

/// Type specific content of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDetails {
    Setup(SetupDetails),
    Deposit(DepositDetails),
    Create(CreateDetails),
    Resolve(ResolveDetails),
}

impl UpdateDetails {
    pub fn update_type(&self) -> UpdateType {
        match self {
            UpdateDetails::Setup(_) => UpdateType::Setup,
            UpdateDetails::Deposit(_) => UpdateType::Deposit,
            UpdateDetails::Create(_) => UpdateType::Create,
            UpdateDetails::Resolve(_) => UpdateType::Resolve,
        }
    }
}

/// A proposal to advance a channel by exactly one nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub channel_address: Address,
    pub from_identifier: String,
    pub to_identifier: String,
    pub nonce: u64,
    /// Channel balance of `asset_id` after the update is applied.
    pub balance: Balance,
    pub asset_id: Address,
    pub details: UpdateDetails,
    /// Signatures over the resulting core state, in participant order.
    pub signatures: [Option<Signature>; PARTICIPANTS],
}

impl ChannelUpdate {
    pub fn update_type(&self) -> UpdateType {
        self.details.update_type()
    }

    pub fn signature(&self, idx: PartIdx) -> Option<Signature> {
        self.signatures.get(idx).copied().flatten()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(Option::is_some)
    }
}
