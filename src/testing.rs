//! Fixtures and collaborator doubles shared by unit and integration tests.
//!
//! Fixture constructors panic on failure, they are meant for tests only.

use crate::{
    abiencode::{
        hashing::keccak256,
        types::{Address, Hash, U256},
    },
    chain::{
        create2_address, ChainError, ChainReader, ChannelDispute, TransferInterpreter,
    },
    channel::{
        initial_state_hash, Balance, ChannelUpdate, CoreTransferState, FullChannelState,
        FullTransferState, NetworkContext, NetworkContextParams, SetupDetails, SetupParams,
        UpdateDetails,
    },
    sig::Signer,
    store::{Store, StoreError},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

pub const CHAIN_ID: u64 = 1337;

/// ABI types of the hashlock transfer state and resolver.
pub const HASHLOCK_ENCODINGS: [&str; 2] = ["tuple(bytes32 lockHash)", "tuple(bytes32 preImage)"];

const PROXY_BYTECODE: [u8; 5] = [0x60, 0x80, 0x60, 0x40, 0x52];

/// Deterministic signer for `seed`.
pub fn signer(seed: u64) -> Signer {
    Signer::new(&mut StdRng::seed_from_u64(seed))
}

/// Alice and Bob.
pub fn signers() -> (Signer, Signer) {
    (signer(1), signer(2))
}

pub fn network_context() -> NetworkContext {
    NetworkContext {
        chain_id: CHAIN_ID,
        channel_factory_address: Address([0xfa; 20]),
        channel_mastercopy_address: Address([0x3c; 20]),
        adjudicator_address: Address([0xad; 20]),
        provider_url: "http://localhost:8545".to_string(),
    }
}

pub fn network_context_params() -> NetworkContextParams {
    let network = network_context();
    NetworkContextParams {
        chain_id: network.chain_id,
        channel_factory_address: network.channel_factory_address.to_string(),
        channel_mastercopy_address: network.channel_mastercopy_address.to_string(),
        adjudicator_address: network.adjudicator_address.to_string(),
        provider_url: network.provider_url,
    }
}

/// Setup of a channel with `counterparty`, timeout `"1"` on chain 1337.
pub fn setup_params(counterparty: &Signer) -> SetupParams {
    SetupParams {
        counterparty_identifier: counterparty.public_identifier().to_string(),
        timeout: "1".to_string(),
        network_context: network_context_params(),
    }
}

/// Address the [MockChainReader] derives for a channel of `alice` and `bob`.
pub fn channel_address(alice: &Signer, bob: &Signer) -> Address {
    let network = network_context();
    create2_address(
        network.channel_factory_address,
        network.channel_mastercopy_address,
        &PROXY_BYTECODE,
        alice.address(),
        bob.address(),
        network.chain_id,
    )
}

/// Unsigned setup update proposed by `alice`.
pub fn setup_update(alice: &Signer, bob: &Signer) -> ChannelUpdate {
    ChannelUpdate {
        channel_address: channel_address(alice, bob),
        from_identifier: alice.public_identifier().to_string(),
        to_identifier: bob.public_identifier().to_string(),
        nonce: 1,
        balance: Balance::zero([alice.address(), bob.address()]),
        asset_id: Address::ZERO,
        details: UpdateDetails::Setup(SetupDetails {
            timeout: U256::from(1),
            network_context: network_context(),
        }),
        signatures: [None, None],
    }
}

pub fn hashlock_state(preimage: &[u8; 32]) -> Vec<u8> {
    keccak256(preimage).0.to_vec()
}

pub fn hashlock_resolver(preimage: &[u8; 32]) -> Vec<u8> {
    preimage.to_vec()
}

/// Hashlock transfer with contents derived from `seed`.
pub fn full_transfer(seed: u8) -> FullTransferState {
    let initiator = Address([seed; 20]);
    let responder = Address([seed.wrapping_add(1); 20]);
    let transfer_state = hashlock_state(&[seed; 32]);
    FullTransferState {
        core: CoreTransferState {
            initial_balance: Balance {
                amount: [U256::from(seed), U256::zero()],
                to: [initiator, responder],
            },
            asset_id: Address::ZERO,
            channel_address: Address([0xcc; 20]),
            transfer_id: Hash([seed; 32]),
            transfer_definition: Address([0xde; 20]),
            transfer_timeout: U256::from(1),
            initial_state_hash: initial_state_hash(&transfer_state),
            transfer_encodings: HASHLOCK_ENCODINGS.map(String::from),
        },
        transfer_state,
        transfer_resolver: None,
        initiator,
        responder,
        chain_id: CHAIN_ID,
        channel_nonce: u64::from(seed),
    }
}

pub fn core_transfer(seed: u8) -> CoreTransferState {
    full_transfer(seed).core
}

/// Interpreter of the hashlock transfer definition.
///
/// The state is `bytes32 lockHash`, the resolver `bytes32 preImage`. The
/// correct preimage pays the responder, the zero preimage refunds the
/// initiator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashlockInterpreter;

fn bytes32(data: &[u8], what: &str) -> Result<[u8; 32], ChainError> {
    data.try_into()
        .map_err(|_| ChainError::Reverted(format!("invalid {what} length {}", data.len())))
}

#[async_trait]
impl TransferInterpreter for HashlockInterpreter {
    async fn create(&self, transfer: &FullTransferState) -> Result<bool, ChainError> {
        let Ok(lock) = bytes32(&transfer.transfer_state, "state") else {
            return Ok(false);
        };
        let balance = &transfer.core.initial_balance;
        Ok(lock != [0; 32] && balance.amount[1].is_zero() && !balance.amount[0].is_zero())
    }

    async fn resolve(
        &self,
        transfer: &FullTransferState,
        resolver: &[u8],
    ) -> Result<Balance, ChainError> {
        let lock = bytes32(&transfer.transfer_state, "state")?;
        let preimage = bytes32(resolver, "resolver")?;
        let initial = transfer.core.initial_balance;
        let total = initial.amount[0];
        if preimage == [0; 32] {
            return Ok(Balance {
                amount: [total, U256::zero()],
                to: initial.to,
            });
        }
        if keccak256(&preimage).0 != lock {
            return Err(ChainError::Reverted("incorrect preimage".to_string()));
        }
        Ok(Balance {
            amount: [U256::zero(), total],
            to: initial.to,
        })
    }
}

/// Chain reader serving the fixture contracts of [network_context].
#[derive(Debug, Default)]
pub struct MockChainReader {
    disputes: Mutex<HashMap<Address, ChannelDispute>>,
    registered: Mutex<Vec<Address>>,
    failing: AtomicBool,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dispute(&self, channel_address: Address, dispute: ChannelDispute) {
        self.disputes.lock().insert(channel_address, dispute);
    }

    pub fn registered_channels(&self) -> Vec<Address> {
        self.registered.lock().clone()
    }

    /// Make every call fail with a read error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ChainError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ChainError::ReadFailed("provider unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_chain(&self, chain_id: u64) -> Result<(), ChainError> {
        self.check()?;
        if chain_id != CHAIN_ID {
            return Err(ChainError::ProviderNotFound(chain_id));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn get_channel_factory_bytecode(
        &self,
        _channel_factory: Address,
        chain_id: u64,
    ) -> Result<Vec<u8>, ChainError> {
        self.check_chain(chain_id)?;
        Ok(PROXY_BYTECODE.to_vec())
    }

    async fn get_channel_mastercopy_address(
        &self,
        _channel_factory: Address,
        chain_id: u64,
    ) -> Result<Address, ChainError> {
        self.check_chain(chain_id)?;
        Ok(network_context().channel_mastercopy_address)
    }

    async fn get_channel_address(
        &self,
        alice: Address,
        bob: Address,
        channel_factory: Address,
        chain_id: u64,
    ) -> Result<Address, ChainError> {
        self.check_chain(chain_id)?;
        Ok(create2_address(
            channel_factory,
            network_context().channel_mastercopy_address,
            &PROXY_BYTECODE,
            alice,
            bob,
            chain_id,
        ))
    }

    async fn get_channel_dispute(
        &self,
        channel_address: Address,
        chain_id: u64,
    ) -> Result<Option<ChannelDispute>, ChainError> {
        self.check_chain(chain_id)?;
        Ok(self.disputes.lock().get(&channel_address).cloned())
    }

    async fn register_channel(
        &self,
        channel_address: Address,
        _channel_factory: Address,
        chain_id: u64,
    ) -> Result<(), ChainError> {
        self.check_chain(chain_id)?;
        self.registered.lock().push(channel_address);
        Ok(())
    }
}

/// [Store] wrapper whose reads and writes can be made to fail.
#[derive(Debug, Default)]
pub struct FlakyStore<S> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read failed".to_string()));
        }
        Ok(())
    }

    fn write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Store> Store for FlakyStore<S> {
    async fn get_channel_state(
        &self,
        channel_address: Address,
    ) -> Result<Option<FullChannelState>, StoreError> {
        self.read()?;
        self.inner.get_channel_state(channel_address).await
    }

    async fn get_channel_state_by_participants(
        &self,
        alice: Address,
        bob: Address,
        chain_id: u64,
    ) -> Result<Option<FullChannelState>, StoreError> {
        self.read()?;
        self.inner
            .get_channel_state_by_participants(alice, bob, chain_id)
            .await
    }

    async fn get_channel_states(&self) -> Result<Vec<FullChannelState>, StoreError> {
        self.read()?;
        self.inner.get_channel_states().await
    }

    async fn get_active_transfers(
        &self,
        channel_address: Address,
    ) -> Result<Vec<FullTransferState>, StoreError> {
        self.read()?;
        self.inner.get_active_transfers(channel_address).await
    }

    async fn get_transfer_state(
        &self,
        transfer_id: Hash,
    ) -> Result<Option<FullTransferState>, StoreError> {
        self.read()?;
        self.inner.get_transfer_state(transfer_id).await
    }

    async fn save_channel_state(
        &self,
        channel: &FullChannelState,
        transfer: Option<&FullTransferState>,
    ) -> Result<(), StoreError> {
        self.write()?;
        self.inner.save_channel_state(channel, transfer).await
    }

    async fn save_channel_state_and_transfers(
        &self,
        channel: &FullChannelState,
        active_transfers: &[FullTransferState],
    ) -> Result<(), StoreError> {
        self.write()?;
        self.inner
            .save_channel_state_and_transfers(channel, active_transfers)
            .await
    }
}
