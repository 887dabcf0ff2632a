mod common;

use async_trait::async_trait;
use common::{create, deposit, pair, party};
use statechannel::{
    channel::{FullChannelState, FullTransferState},
    events::ChannelRestoredEvent,
    messages::{RestoreReply, RestoreRequest},
    restore::RestoreError,
    store::{MemoryStore, Store},
    testing::{self, FlakyStore, HashlockInterpreter, MockChainReader},
    wire::{MemoryMessagingHub, MessagingService, RestoreHandler},
    Address, Protocol, ProtocolError,
};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

/// Set up a channel with an active transfer, nonce 3.
async fn channel_with_transfer(pair: &common::Pair) -> Address {
    let channel = pair.setup().await;
    pair.alice.protocol.deposit(deposit(channel, 10)).await.unwrap();
    pair.alice.protocol.create(create(channel, 4)).await.unwrap();
    channel
}

/// Answers restore requests with a fixed reply.
struct FakeResponder(RestoreReply);

#[async_trait]
impl RestoreHandler for FakeResponder {
    async fn handle_restore_request(&self, _: RestoreRequest) -> Option<RestoreReply> {
        Some(self.0.clone())
    }
}

async fn bob_state(pair: &common::Pair, channel: Address) -> (FullChannelState, Vec<FullTransferState>) {
    let state = pair.bob.protocol.get_channel_state(channel).await.unwrap().unwrap();
    let active = pair.bob.protocol.get_active_transfers(channel).await.unwrap();
    (state, active)
}

/// Replace bob on the hub by a responder sending `reply`, returns a fresh
/// alice.
fn fake_bob(pair: &common::Pair, reply: RestoreReply) -> common::Party {
    let service = pair.hub.connect(pair.bob.signer.public_identifier());
    service
        .on_receive_restore_request(Arc::new(FakeResponder(reply)))
        .unwrap();
    party(&pair.hub, &pair.chain, pair.alice.signer.clone())
}

fn restore_reason(err: ProtocolError) -> &'static str {
    match err {
        ProtocolError::Restore(e) => e.reason(),
        other => panic!("expected a restore error, got {other:?}"),
    }
}

#[tokio::test]
async fn lost_store_is_restored() {
    let pair = pair();
    let channel = channel_with_transfer(&pair).await;
    let (expected, active) = bob_state(&pair, channel).await;

    let alice = party(&pair.hub, &pair.chain, pair.alice.signer.clone());
    let restored_nonce = Arc::new(AtomicU64::new(0));
    let seen = restored_nonce.clone();
    alice.protocol.events().channel_restored.once(
        Box::new(move |e: &ChannelRestoredEvent| seen.store(e.nonce, Ordering::SeqCst)),
        None,
    );

    let restored = alice
        .protocol
        .restore_state(pair.restore_params(&pair.bob.signer))
        .await
        .unwrap();
    assert_eq!(restored, expected);
    assert_eq!(restored_nonce.load(Ordering::SeqCst), 3);
    assert_eq!(alice.store.get_active_transfers(channel).await.unwrap(), active);

    // The restored channel is usable again.
    let result = alice.protocol.deposit(deposit(channel, 1)).await.unwrap();
    assert_eq!(result.updated_channel.nonce(), 4);
}

#[tokio::test]
async fn syncable_state_is_not_overwritten() {
    let pair = pair();
    channel_with_transfer(&pair).await;

    let err = pair
        .alice
        .protocol
        .restore_state(pair.restore_params(&pair.bob.signer))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::Restore(RestoreError::SyncableState {
            local: 3,
            received: 3
        })
    );
}

#[tokio::test]
async fn nothing_to_restore() {
    let pair = pair();
    let err = pair
        .alice
        .protocol
        .restore_state(pair.restore_params(&pair.bob.signer))
        .await
        .unwrap_err();
    assert_eq!(restore_reason(err), "NoData");
}

#[tokio::test]
async fn wrong_merkle_root_leaves_store_untouched() {
    let pair = pair();
    let channel = channel_with_transfer(&pair).await;
    let (state, _) = bob_state(&pair, channel).await;

    let alice = fake_bob(
        &pair,
        RestoreReply::Data {
            channel: Some(state),
            active_transfers: Vec::new(),
        },
    );
    let err = alice
        .protocol
        .restore_state(pair.restore_params(&pair.bob.signer))
        .await
        .unwrap_err();
    assert_eq!(restore_reason(err), "InvalidMerkleRoot");
    assert_eq!(alice.store.get_channel_state(channel).await.unwrap(), None);
    assert!(alice.store.get_active_transfers(channel).await.unwrap().is_empty());
}

#[tokio::test]
async fn forged_states_are_rejected() {
    let pair = pair();
    let channel = channel_with_transfer(&pair).await;
    let (state, active) = bob_state(&pair, channel).await;

    let mut moved = state.clone();
    moved.core.channel_address = Address([9; 20]);
    let mut unsigned = state;
    unsigned.latest_update.signatures[1] = None;

    for (forged, reason) in [
        (moved, "InvalidChannelAddress"),
        (unsigned, "InvalidSignatures"),
    ] {
        let alice = fake_bob(
            &pair,
            RestoreReply::Data {
                channel: Some(forged),
                active_transfers: active.clone(),
            },
        );
        let err = alice
            .protocol
            .restore_state(pair.restore_params(&pair.bob.signer))
            .await
            .unwrap_err();
        assert_eq!(restore_reason(err), reason);
    }
}

#[tokio::test]
async fn responder_store_failure_is_reported() {
    let hub = MemoryMessagingHub::new();
    let chain = Arc::new(MockChainReader::new());
    let (alice, bob) = testing::signers();
    let alice = party(&hub, &chain, alice);
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    let bob_protocol = Protocol::connect(
        hub.connect(bob.public_identifier()),
        store.clone(),
        bob.clone(),
        chain.clone(),
        Arc::new(HashlockInterpreter),
        common::config(),
    )
    .unwrap();
    alice
        .protocol
        .setup(testing::setup_params(&bob))
        .await
        .unwrap();
    assert_eq!(bob_protocol.get_channel_states().await.unwrap().len(), 1);

    store.set_fail_reads(true);
    let fresh = party(&hub, &chain, alice.signer.clone());
    let err = fresh
        .protocol
        .restore_state(statechannel::channel::RestoreParams {
            chain_id: testing::CHAIN_ID,
            counterparty_identifier: bob.public_identifier().to_string(),
        })
        .await
        .unwrap_err();
    match err {
        ProtocolError::Restore(RestoreError::CounterpartyFailure { reason, .. }) => {
            assert_eq!(reason, "CouldNotGetChannel")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn self_addressed_requests_are_ignored() {
    let pair = pair();
    let bob = pair.bob.signer.public_identifier().to_string();
    let raw = pair.hub.connect("raw");
    let err = raw
        .send_restore_request(
            RestoreRequest {
                chain_id: testing::CHAIN_ID,
                from_identifier: bob.clone(),
                to_identifier: bob,
            },
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "Timeout");

    let err = pair
        .alice
        .protocol
        .restore_state(pair.restore_params(&pair.alice.signer))
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "CounterpartyIsSelf");
}
