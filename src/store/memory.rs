use super::{Store, StoreError};
use crate::{
    abiencode::types::{Address, Hash},
    channel::{FullChannelState, FullTransferState, UpdateType},
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Inner {
    channels: HashMap<Address, FullChannelState>,
    transfers: HashMap<Hash, FullTransferState>,
    /// Ids of the active transfers per channel.
    active: HashMap<Address, Vec<Hash>>,
}

/// In-process [Store].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_channel_state(
        &self,
        channel_address: Address,
    ) -> Result<Option<FullChannelState>, StoreError> {
        Ok(self.inner.read().channels.get(&channel_address).cloned())
    }

    async fn get_channel_state_by_participants(
        &self,
        alice: Address,
        bob: Address,
        chain_id: u64,
    ) -> Result<Option<FullChannelState>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .channels
            .values()
            .find(|c| {
                c.network_context.chain_id == chain_id
                    && (c.core.participants == [alice, bob] || c.core.participants == [bob, alice])
            })
            .cloned())
    }

    async fn get_channel_states(&self) -> Result<Vec<FullChannelState>, StoreError> {
        Ok(self.inner.read().channels.values().cloned().collect())
    }

    async fn get_active_transfers(
        &self,
        channel_address: Address,
    ) -> Result<Vec<FullTransferState>, StoreError> {
        let inner = self.inner.read();
        let Some(ids) = inner.active.get(&channel_address) else {
            return Ok(Vec::new());
        };
        ids.iter()
            .map(|id| {
                inner
                    .transfers
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StoreError::Corrupted(format!("active transfer {id} missing")))
            })
            .collect()
    }

    async fn get_transfer_state(
        &self,
        transfer_id: Hash,
    ) -> Result<Option<FullTransferState>, StoreError> {
        Ok(self.inner.read().transfers.get(&transfer_id).cloned())
    }

    async fn save_channel_state(
        &self,
        channel: &FullChannelState,
        transfer: Option<&FullTransferState>,
    ) -> Result<(), StoreError> {
        let address = channel.channel_address();
        let mut inner = self.inner.write();
        if let Some(transfer) = transfer {
            let id = transfer.transfer_id();
            let active = inner.active.entry(address).or_default();
            match channel.latest_update.update_type() {
                UpdateType::Create => {
                    if !active.contains(&id) {
                        active.push(id);
                    }
                }
                UpdateType::Resolve => active.retain(|t| *t != id),
                _ => {}
            }
            inner.transfers.insert(id, transfer.clone());
        }
        inner.channels.insert(address, channel.clone());
        Ok(())
    }

    async fn save_channel_state_and_transfers(
        &self,
        channel: &FullChannelState,
        active_transfers: &[FullTransferState],
    ) -> Result<(), StoreError> {
        let address = channel.channel_address();
        let mut inner = self.inner.write();
        let ids = active_transfers.iter().map(|t| t.transfer_id()).collect();
        for transfer in active_transfers {
            inner.transfers.insert(transfer.transfer_id(), transfer.clone());
        }
        inner.active.insert(address, ids);
        inner.channels.insert(address, channel.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::apply_update,
        testing::{full_transfer, setup_update, signers},
    };

    fn channel() -> FullChannelState {
        let (alice, bob) = signers();
        apply_update(&setup_update(&alice, &bob), None, &[])
            .unwrap()
            .channel
    }

    #[tokio::test]
    async fn lookup_by_participants_in_any_order() {
        let store = MemoryStore::new();
        let channel = channel();
        store.save_channel_state(&channel, None).await.unwrap();

        let [alice, bob] = channel.core.participants;
        for (a, b) in [(alice, bob), (bob, alice)] {
            assert_eq!(
                store
                    .get_channel_state_by_participants(a, b, 1337)
                    .await
                    .unwrap(),
                Some(channel.clone())
            );
        }
        assert_eq!(
            store
                .get_channel_state_by_participants(alice, bob, 1)
                .await
                .unwrap(),
            None
        );
        assert_eq!(store.get_channel_states().await.unwrap(), vec![channel]);
    }

    #[tokio::test]
    async fn replace_transfers() {
        let store = MemoryStore::new();
        let channel = channel();
        let transfers = vec![full_transfer(1), full_transfer(2)];
        store
            .save_channel_state_and_transfers(&channel, &transfers)
            .await
            .unwrap();
        assert_eq!(
            store
                .get_active_transfers(channel.channel_address())
                .await
                .unwrap(),
            transfers
        );

        store
            .save_channel_state_and_transfers(&channel, &transfers[1..])
            .await
            .unwrap();
        assert_eq!(
            store
                .get_active_transfers(channel.channel_address())
                .await
                .unwrap(),
            transfers[1..].to_vec()
        );
        // History is kept.
        assert_eq!(
            store
                .get_transfer_state(transfers[0].transfer_id())
                .await
                .unwrap(),
            Some(transfers[0].clone())
        );
    }

    #[tokio::test]
    async fn unknown_channel() {
        let store = MemoryStore::new();
        assert_eq!(store.get_channel_state(Address::ZERO).await.unwrap(), None);
        assert!(store
            .get_active_transfers(Address::ZERO)
            .await
            .unwrap()
            .is_empty());
    }
}
