//! Persistence of channel and transfer states.

mod memory;

pub use memory::MemoryStore;

use crate::{
    abiencode::types::{Address, Hash},
    channel::{FullChannelState, FullTransferState},
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupted store entry: {0}")]
    Corrupted(String),
}

impl StoreError {
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "StoreUnavailable",
            StoreError::Corrupted(_) => "StoreCorrupted",
        }
    }
}

/// Storage of the channels of one participant.
///
/// Implementations have to provide read-your-writes consistency and write a
/// channel together with its transfers atomically.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_channel_state(
        &self,
        channel_address: Address,
    ) -> Result<Option<FullChannelState>, StoreError>;

    /// Channel between `alice` and `bob` on `chain_id`, participants in
    /// either order.
    async fn get_channel_state_by_participants(
        &self,
        alice: Address,
        bob: Address,
        chain_id: u64,
    ) -> Result<Option<FullChannelState>, StoreError>;

    async fn get_channel_states(&self) -> Result<Vec<FullChannelState>, StoreError>;

    async fn get_active_transfers(
        &self,
        channel_address: Address,
    ) -> Result<Vec<FullTransferState>, StoreError>;

    /// Any transfer ever created, resolved ones included.
    async fn get_transfer_state(
        &self,
        transfer_id: Hash,
    ) -> Result<Option<FullTransferState>, StoreError>;

    /// Save the channel after an update. `transfer` is the transfer created or
    /// resolved by `channel.latest_update`.
    async fn save_channel_state(
        &self,
        channel: &FullChannelState,
        transfer: Option<&FullTransferState>,
    ) -> Result<(), StoreError>;

    /// Replace the channel and its complete set of active transfers.
    async fn save_channel_state_and_transfers(
        &self,
        channel: &FullChannelState,
        active_transfers: &[FullTransferState],
    ) -> Result<(), StoreError>;
}
