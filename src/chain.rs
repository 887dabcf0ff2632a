//! Boundary to the blockchain: reading contract data and running transfer
//! definitions.

use crate::{
    abiencode::{
        hashing::keccak256,
        types::{Address, Hash, U256},
    },
    channel::{Balance, FullTransferState, NetworkContext},
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("no provider for chain {0}")]
    ProviderNotFound(u64),
    #[error("chain read failed: {0}")]
    ReadFailed(String),
    #[error("execution reverted: {0}")]
    Reverted(String),
}

impl ChainError {
    pub fn reason(&self) -> &'static str {
        match self {
            ChainError::ProviderNotFound(_) => "ProviderNotFound",
            ChainError::ReadFailed(_) => "ChainReadFailed",
            ChainError::Reverted(_) => "ExecutionReverted",
        }
    }
}

/// On-chain dispute record of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDispute {
    pub channel_state_hash: Hash,
    pub nonce: u64,
    pub merkle_root: Hash,
    pub consensus_expiry: U256,
    pub defund_expiry: U256,
}

/// Read access to the channel contracts.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Creation code of the proxy deployed by the channel factory.
    async fn get_channel_factory_bytecode(
        &self,
        channel_factory: Address,
        chain_id: u64,
    ) -> Result<Vec<u8>, ChainError>;

    async fn get_channel_mastercopy_address(
        &self,
        channel_factory: Address,
        chain_id: u64,
    ) -> Result<Address, ChainError>;

    async fn get_channel_address(
        &self,
        alice: Address,
        bob: Address,
        channel_factory: Address,
        chain_id: u64,
    ) -> Result<Address, ChainError>;

    async fn get_channel_dispute(
        &self,
        channel_address: Address,
        chain_id: u64,
    ) -> Result<Option<ChannelDispute>, ChainError>;

    /// Tell the chain service about a new channel so it can watch it.
    async fn register_channel(
        &self,
        channel_address: Address,
        channel_factory: Address,
        chain_id: u64,
    ) -> Result<(), ChainError>;
}

/// Executes the `create` and `resolve` functions of transfer definitions.
#[async_trait]
pub trait TransferInterpreter: Send + Sync {
    /// Whether the definition accepts the initial state of `transfer`.
    async fn create(&self, transfer: &FullTransferState) -> Result<bool, ChainError>;

    /// Final balance of `transfer` given the ABI encoded `resolver`.
    async fn resolve(
        &self,
        transfer: &FullTransferState,
        resolver: &[u8],
    ) -> Result<Balance, ChainError>;
}

/// Runs the embedded interpreter first and falls back to the chain if it
/// fails.
#[derive(Debug, Clone)]
pub struct FallbackInterpreter<E, C> {
    embedded: E,
    chain: C,
}

impl<E, C> FallbackInterpreter<E, C> {
    pub fn new(embedded: E, chain: C) -> Self {
        Self { embedded, chain }
    }
}

#[async_trait]
impl<E, C> TransferInterpreter for FallbackInterpreter<E, C>
where
    E: TransferInterpreter,
    C: TransferInterpreter,
{
    async fn create(&self, transfer: &FullTransferState) -> Result<bool, ChainError> {
        match self.embedded.create(transfer).await {
            Ok(valid) => Ok(valid),
            Err(e) => {
                debug!(transfer = %transfer.transfer_id(), error = %e, "embedded create failed, using chain");
                self.chain.create(transfer).await
            }
        }
    }

    async fn resolve(
        &self,
        transfer: &FullTransferState,
        resolver: &[u8],
    ) -> Result<Balance, ChainError> {
        match self.embedded.resolve(transfer, resolver).await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                debug!(transfer = %transfer.transfer_id(), error = %e, "embedded resolve failed, using chain");
                self.chain.resolve(transfer, resolver).await
            }
        }
    }
}

fn u256_bytes(v: U256) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    v.to_big_endian(&mut bytes);
    bytes
}

/// CREATE2 address of the channel proxy for `alice` and `bob`.
///
/// `keccak256(0xff ‖ factory ‖ salt ‖ keccak256(proxyBytecode ‖ mastercopy))[12..]`
/// with `salt = keccak256(alice ‖ bob ‖ chainId)`, all packed.
pub fn create2_address(
    channel_factory: Address,
    mastercopy: Address,
    proxy_bytecode: &[u8],
    alice: Address,
    bob: Address,
    chain_id: u64,
) -> Address {
    let mut salt_input = Vec::with_capacity(20 + 20 + 32);
    salt_input.extend_from_slice(&alice.0);
    salt_input.extend_from_slice(&bob.0);
    salt_input.extend_from_slice(&u256_bytes(U256::from(chain_id)));
    let salt = keccak256(&salt_input);

    let mut init_code = Vec::with_capacity(proxy_bytecode.len() + 32);
    init_code.extend_from_slice(proxy_bytecode);
    init_code.extend_from_slice(&[0u8; 12]);
    init_code.extend_from_slice(&mastercopy.0);
    let init_code_hash = keccak256(&init_code);

    let mut input = Vec::with_capacity(1 + 20 + 32 + 32);
    input.push(0xff);
    input.extend_from_slice(&channel_factory.0);
    input.extend_from_slice(&salt.0);
    input.extend_from_slice(&init_code_hash.0);
    let hash = keccak256(&input);

    let mut addr = Address::ZERO;
    addr.0.copy_from_slice(&hash.0[12..]);
    addr
}

/// Derive the channel address from the factory data on `network`.
pub async fn derive_channel_address(
    chain: &dyn ChainReader,
    alice: Address,
    bob: Address,
    network: &NetworkContext,
) -> Result<Address, ChainError> {
    let bytecode = chain
        .get_channel_factory_bytecode(network.channel_factory_address, network.chain_id)
        .await?;
    let mastercopy = chain
        .get_channel_mastercopy_address(network.channel_factory_address, network.chain_id)
        .await?;
    Ok(create2_address(
        network.channel_factory_address,
        mastercopy,
        &bytecode,
        alice,
        bob,
        network.chain_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::full_transfer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn create2_depends_on_participant_order_and_chain() {
        let factory = Address([0xfa; 20]);
        let mastercopy = Address([0x3c; 20]);
        let alice = Address([0xa1; 20]);
        let bob = Address([0xb0; 20]);
        let code = [0x60, 0x80, 0x60, 0x40];

        let addr = create2_address(factory, mastercopy, &code, alice, bob, 1337);
        assert_eq!(
            addr,
            create2_address(factory, mastercopy, &code, alice, bob, 1337)
        );
        assert_ne!(
            addr,
            create2_address(factory, mastercopy, &code, bob, alice, 1337)
        );
        assert_ne!(addr, create2_address(factory, mastercopy, &code, alice, bob, 1));
        assert_ne!(addr, Address::ZERO);
    }

    struct Fixed {
        result: Result<bool, ChainError>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(result: Result<bool, ChainError>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransferInterpreter for Fixed {
        async fn create(&self, _: &FullTransferState) -> Result<bool, ChainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        async fn resolve(
            &self,
            transfer: &FullTransferState,
            _: &[u8],
        ) -> Result<Balance, ChainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map(|_| transfer.core.initial_balance)
        }
    }

    #[tokio::test]
    async fn fallback_only_on_error() {
        let transfer = full_transfer(1);

        let interpreter = FallbackInterpreter::new(Fixed::new(Ok(false)), Fixed::new(Ok(true)));
        assert!(!interpreter.create(&transfer).await.unwrap());
        assert_eq!(interpreter.chain.calls.load(Ordering::SeqCst), 0);

        let interpreter = FallbackInterpreter::new(
            Fixed::new(Err(ChainError::Reverted("no bytecode".into()))),
            Fixed::new(Ok(true)),
        );
        assert!(interpreter.create(&transfer).await.unwrap());
        assert_eq!(
            interpreter.resolve(&transfer, &[]).await.unwrap(),
            transfer.core.initial_balance
        );
        assert_eq!(interpreter.chain.calls.load(Ordering::SeqCst), 2);
    }
}
