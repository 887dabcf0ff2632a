//! Per-channel serialization of updates.
//!
//! Reading the prior state, applying an update and persisting the result form
//! a critical section per channel. Different channels do not block each other.

use crate::abiencode::types::Address;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("channel {0} is busy")]
    Busy(Address),
}

impl QueueError {
    pub fn reason(&self) -> &'static str {
        match self {
            QueueError::Busy(_) => "ChannelBusy",
        }
    }
}

/// Exclusive access to one channel, released on drop.
pub type ChannelGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct ChannelQueue {
    locks: Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>,
}

impl ChannelQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_of(&self, channel_address: Address) -> Arc<AsyncMutex<()>> {
        self.locks.lock().entry(channel_address).or_default().clone()
    }

    /// Wait until the channel is free.
    pub async fn acquire(&self, channel_address: Address) -> ChannelGuard {
        self.lock_of(channel_address).lock_owned().await
    }

    /// Take the channel if it is free right now.
    pub fn try_acquire(&self, channel_address: Address) -> Result<ChannelGuard, QueueError> {
        self.lock_of(channel_address)
            .try_lock_owned()
            .map_err(|_| QueueError::Busy(channel_address))
    }
}
