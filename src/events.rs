//! Typed event bus of a protocol engine.
//!
//! Every event kind has its own [Subscribers] list. Callbacks run
//! synchronously on the emitting task, after the subscriber list is unlocked,
//! so they may subscribe or unsubscribe themselves.

use crate::{
    abiencode::types::Address,
    channel::{FullChannelState, FullTransferState},
};
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::oneshot;

/// A channel was advanced by a persisted update, proposed by either party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdateEvent {
    pub updated_channel_state: FullChannelState,
    /// Active transfers after the update.
    pub updated_transfers: Vec<FullTransferState>,
    /// The transfer created or resolved by the update.
    pub updated_transfer: Option<FullTransferState>,
}

/// A channel was restored from the counterparty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRestoredEvent {
    pub channel_address: Address,
    pub nonce: u64,
}

pub type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;
pub type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription<T> {
    id: SubscriptionId,
    callback: Arc<Callback<T>>,
    filter: Option<Filter<T>>,
    once: bool,
}

pub struct Subscribers<T> {
    subscriptions: Mutex<Vec<Subscription<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> Subscribers<T> {
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + 'static> Subscribers<T> {
    fn subscribe(&self, callback: Callback<T>, filter: Option<Filter<T>>, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            callback: Arc::new(callback),
            filter,
            once,
        });
        id
    }

    /// Call `callback` for every event passing `filter`.
    pub fn on(&self, callback: Callback<T>, filter: Option<Filter<T>>) -> SubscriptionId {
        self.subscribe(callback, filter, false)
    }

    /// Call `callback` for the next event passing `filter`.
    pub fn once(&self, callback: Callback<T>, filter: Option<Filter<T>>) -> SubscriptionId {
        self.subscribe(callback, filter, true)
    }

    /// Remove one subscription, or all if `id` is `None`.
    pub fn off(&self, id: Option<SubscriptionId>) {
        let mut subscriptions = self.subscriptions.lock();
        match id {
            Some(id) => subscriptions.retain(|s| s.id != id),
            None => subscriptions.clear(),
        }
    }

    pub fn emit(&self, event: &T) {
        let callbacks: Vec<_> = {
            let mut subscriptions = self.subscriptions.lock();
            let mut matched = Vec::new();
            subscriptions.retain(|s| {
                if s.filter.as_ref().map_or(true, |f| f(event)) {
                    matched.push(s.callback.clone());
                    !s.once
                } else {
                    true
                }
            });
            matched
        };
        for callback in callbacks {
            (**callback)(event);
        }
    }

    /// Wait for the next event passing `filter`, `None` on timeout.
    pub async fn wait_for(&self, timeout: Duration, filter: Option<Filter<T>>) -> Option<T> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let id = self.once(
            Box::new(move |event: &T| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send(event.clone());
                }
            }),
            filter,
        );
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => Some(event),
            _ => {
                self.off(Some(id));
                None
            }
        }
    }
}

/// All event kinds emitted by one engine.
#[derive(Debug, Default)]
pub struct EventBus {
    pub channel_update: Subscribers<ChannelUpdateEvent>,
    pub channel_restored: Subscribers<ChannelRestoredEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn restored(nonce: u64) -> ChannelRestoredEvent {
        ChannelRestoredEvent {
            channel_address: Address([1; 20]),
            nonce,
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Callback<ChannelRestoredEvent>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            Box::new(move |_: &ChannelRestoredEvent| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn debug_shows_subscriber_count() {
        let subscribers = Subscribers::<std::rc::Rc<u8>>::default();
        assert!(subscribers.is_empty());
        assert_eq!(format!("{subscribers:?}"), "Subscribers { len: 0 }");
    }

    #[test]
    fn on_once_off() {
        let subs = Subscribers::default();
        let (all, on) = counter();
        let (first, once) = counter();
        let id = subs.on(on, None);
        subs.once(once, None);

        subs.emit(&restored(1));
        subs.emit(&restored(2));
        assert_eq!(all.load(Ordering::SeqCst), 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(subs.len(), 1);

        subs.off(Some(id));
        subs.emit(&restored(3));
        assert_eq!(all.load(Ordering::SeqCst), 2);
        assert!(subs.is_empty());
    }

    #[test]
    fn filters_select_events() {
        let subs = Subscribers::default();
        let (even, on) = counter();
        let (later, once) = counter();
        subs.on(on, Some(Box::new(|e: &ChannelRestoredEvent| e.nonce % 2 == 0)));
        subs.once(once, Some(Box::new(|e: &ChannelRestoredEvent| e.nonce > 2)));

        for nonce in 1..=5 {
            subs.emit(&restored(nonce));
        }
        assert_eq!(even.load(Ordering::SeqCst), 2);
        assert_eq!(later.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_for_event() {
        let bus = Arc::new(EventBus::new());
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move {
                bus.channel_restored
                    .wait_for(
                        Duration::from_secs(5),
                        Some(Box::new(|e: &ChannelRestoredEvent| e.nonce == 7)),
                    )
                    .await
            })
        };
        while bus.channel_restored.is_empty() {
            tokio::task::yield_now().await;
        }
        bus.channel_restored.emit(&restored(6));
        bus.channel_restored.emit(&restored(7));
        assert_eq!(waiter.await.unwrap(), Some(restored(7)));
    }

    #[tokio::test]
    async fn wait_for_times_out() {
        let bus = EventBus::new();
        assert_eq!(
            bus.channel_restored
                .wait_for(Duration::from_millis(10), None)
                .await,
            None
        );
        assert!(bus.channel_restored.is_empty());
    }
}
