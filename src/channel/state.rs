use super::{update::ChannelUpdate, PartIdx, PARTICIPANTS};
use crate::abiencode::{
    self, as_dyn_array,
    hashing::keccak256,
    to_hash,
    types::{Address, Hash, U256},
};
use serde::Serialize;

/// Balance of one asset, `amount[i]` is paid out to `to[i]`.
///
/// Ordering always corresponds to the channel participants ordering.
#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Balance {
    pub amount: [U256; PARTICIPANTS],
    pub to: [Address; PARTICIPANTS],
}

impl Balance {
    /// Empty balance paying out to `to`.
    pub fn zero(to: [Address; PARTICIPANTS]) -> Self {
        Self {
            amount: [U256::zero(); PARTICIPANTS],
            to,
        }
    }

    /// Sum of all amounts, `None` on overflow.
    pub fn total(&self) -> Option<U256> {
        self.amount
            .iter()
            .try_fold(U256::zero(), |acc, a| acc.checked_add(*a))
    }
}

/// Chain the channel lives on and the contracts it uses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkContext {
    pub chain_id: u64,
    pub channel_factory_address: Address,
    pub channel_mastercopy_address: Address,
    pub adjudicator_address: Address,
    pub provider_url: String,
}

/// The part of the channel state that is signed and can be enforced on-chain.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CoreChannelState {
    pub channel_address: Address,
    /// Signer addresses, index-stable for the lifetime of the channel.
    pub participants: [Address; PARTICIPANTS],
    pub timeout: U256,
    /// Indexed like `asset_ids`.
    #[serde(with = "as_dyn_array")]
    pub balances: Vec<Balance>,
    /// Indexed like `asset_ids`, changes in lockstep with the active transfers.
    #[serde(with = "as_dyn_array")]
    pub locked_value: Vec<U256>,
    #[serde(with = "as_dyn_array")]
    pub asset_ids: Vec<Address>,
    pub nonce: u64,
    pub latest_deposit_nonce: u64,
    /// Root of the tree over all active transfers.
    pub merkle_root: Hash,
}

impl CoreChannelState {
    /// `keccak256(abi.encode(state))`, the hash both participants sign.
    pub fn hash_to_sign(&self) -> Result<Hash, abiencode::Error> {
        to_hash(self)
    }

    pub fn asset_index(&self, asset_id: &Address) -> Option<usize> {
        self.asset_ids.iter().position(|a| a == asset_id)
    }

    pub fn participant_index(&self, address: &Address) -> Option<PartIdx> {
        self.participants.iter().position(|p| p == address)
    }
}

/// Everything a participant stores about a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullChannelState {
    pub core: CoreChannelState,
    /// Same ordering as `core.participants`.
    pub public_identifiers: [String; PARTICIPANTS],
    pub network_context: NetworkContext,
    /// The last applied, double signed update.
    pub latest_update: ChannelUpdate,
    /// Set once a dispute for this channel was found on-chain.
    pub in_dispute: bool,
}

impl FullChannelState {
    pub fn channel_address(&self) -> Address {
        self.core.channel_address
    }

    pub fn nonce(&self) -> u64 {
        self.core.nonce
    }

    pub fn alice(&self) -> Address {
        self.core.participants[0]
    }

    pub fn bob(&self) -> Address {
        self.core.participants[1]
    }

    pub fn identifier_index(&self, identifier: &str) -> Option<PartIdx> {
        self.public_identifiers.iter().position(|p| p == identifier)
    }
}

/// The hashed part of a transfer, one leaf of the merkle tree.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CoreTransferState {
    pub initial_balance: Balance,
    pub asset_id: Address,
    pub channel_address: Address,
    pub transfer_id: Hash,
    pub transfer_definition: Address,
    pub transfer_timeout: U256,
    pub initial_state_hash: Hash,
    /// ABI type descriptions of the initial state and the resolver.
    #[serde(skip)]
    pub transfer_encodings: [String; 2],
}

impl CoreTransferState {
    /// Leaf hash, `keccak256(abi.encode(transfer))`.
    pub fn hash(&self) -> Result<Hash, abiencode::Error> {
        to_hash(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTransferState {
    pub core: CoreTransferState,
    /// ABI encoded initial state.
    pub transfer_state: Vec<u8>,
    /// ABI encoded resolver, set once the transfer is resolved.
    pub transfer_resolver: Option<Vec<u8>>,
    pub initiator: Address,
    pub responder: Address,
    pub chain_id: u64,
    /// Channel nonce of the update that created the transfer.
    pub channel_nonce: u64,
}

impl FullTransferState {
    pub fn transfer_id(&self) -> Hash {
        self.core.transfer_id
    }
}

/// `keccak256(abi.encode(channelAddress, channelNonce, definition, timeout))`
pub fn transfer_id(
    channel_address: Address,
    channel_nonce: u64,
    transfer_definition: Address,
    transfer_timeout: U256,
) -> Result<Hash, abiencode::Error> {
    to_hash(&(
        channel_address,
        U256::from(channel_nonce),
        transfer_definition,
        transfer_timeout,
    ))
}

/// Hash of the ABI encoded initial transfer state.
pub fn initial_state_hash(transfer_state: &[u8]) -> Hash {
    keccak256(transfer_state)
}
