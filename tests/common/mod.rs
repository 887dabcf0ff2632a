#![allow(dead_code)]

use statechannel::{
    channel::{
        CreateTransferParams, DepositParams, ResolveTransferParams, RestoreParams,
    },
    config::ProtocolConfig,
    sig::Signer,
    store::MemoryStore,
    testing::{self, hashlock_resolver, hashlock_state, HashlockInterpreter, MockChainReader},
    wire::MemoryMessagingHub,
    Address, Hash, Protocol,
};
use std::sync::Arc;

pub const PREIMAGE: [u8; 32] = [7; 32];

pub struct Party {
    pub protocol: Protocol,
    pub store: Arc<MemoryStore>,
    pub signer: Signer,
}

pub struct Pair {
    pub hub: MemoryMessagingHub,
    pub chain: Arc<MockChainReader>,
    pub alice: Party,
    pub bob: Party,
}

pub fn config() -> ProtocolConfig {
    ProtocolConfig {
        message_timeout_ms: 300,
        restore_timeout_ms: 300,
        busy_backoff_ms: 5,
        ..ProtocolConfig::default()
    }
}

/// Connect `signer` with an empty store. Replaces an earlier connection of
/// the same signer on the hub.
pub fn party(hub: &MemoryMessagingHub, chain: &Arc<MockChainReader>, signer: Signer) -> Party {
    let store = Arc::new(MemoryStore::new());
    let messaging = hub.connect(signer.public_identifier());
    let protocol = Protocol::connect(
        messaging,
        store.clone(),
        signer.clone(),
        chain.clone(),
        Arc::new(HashlockInterpreter),
        config(),
    )
    .unwrap();
    Party {
        protocol,
        store,
        signer,
    }
}

pub fn pair() -> Pair {
    let hub = MemoryMessagingHub::new();
    let chain = Arc::new(MockChainReader::new());
    let (alice, bob) = testing::signers();
    Pair {
        alice: party(&hub, &chain, alice),
        bob: party(&hub, &chain, bob),
        hub,
        chain,
    }
}

impl Pair {
    /// Set up the channel, proposed by alice.
    pub async fn setup(&self) -> Address {
        self.alice
            .protocol
            .setup(testing::setup_params(&self.bob.signer))
            .await
            .unwrap()
            .updated_channel
            .channel_address()
    }

    pub fn restore_params(&self, counterparty: &Signer) -> RestoreParams {
        RestoreParams {
            chain_id: testing::CHAIN_ID,
            counterparty_identifier: counterparty.public_identifier().to_string(),
        }
    }
}

pub fn deposit(channel: Address, amount: u64) -> DepositParams {
    DepositParams {
        channel_address: channel.to_string(),
        amount: amount.to_string(),
        asset_id: Address::ZERO.to_string(),
    }
}

pub fn create(channel: Address, amount: u64) -> CreateTransferParams {
    CreateTransferParams {
        channel_address: channel.to_string(),
        amount: amount.to_string(),
        asset_id: Address::ZERO.to_string(),
        transfer_definition: Address([0xde; 20]).to_string(),
        transfer_initial_state: format!("0x{}", hex::encode(hashlock_state(&PREIMAGE))),
        timeout: "1".to_string(),
        encodings: testing::HASHLOCK_ENCODINGS.map(String::from),
    }
}

pub fn resolve(channel: Address, transfer_id: Hash, preimage: &[u8; 32]) -> ResolveTransferParams {
    ResolveTransferParams {
        channel_address: channel.to_string(),
        transfer_id: transfer_id.to_string(),
        transfer_resolver: format!("0x{}", hex::encode(hashlock_resolver(preimage))),
    }
}
