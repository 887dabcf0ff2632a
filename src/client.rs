use crate::{
    abiencode::types::{Address, Hash},
    chain::{ChainReader, TransferInterpreter},
    channel::{
        CreateTransferParams, DepositParams, FullChannelState, FullTransferState,
        ResolveTransferParams, RestoreParams, SetupParams, UpdateParams, ValidationError,
    },
    config::ProtocolConfig,
    error::ProtocolError,
    events::EventBus,
    messages::{ProtocolMessage, ProtocolReply, RejectReason, RestoreReply, RestoreRequest},
    queue::ChannelQueue,
    restore,
    sig::Signer,
    store::Store,
    sync::{self, UpdateResult},
    wire::{MessagingService, ProtocolHandler, RestoreHandler},
};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::{info, warn};

/// Collaborators and shared state of one participant.
pub(crate) struct Engine {
    pub(crate) messaging: Arc<dyn MessagingService>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) signer: Signer,
    pub(crate) chain: Arc<dyn ChainReader>,
    pub(crate) interpreter: Arc<dyn TransferInterpreter>,
    pub(crate) config: ProtocolConfig,
    pub(crate) queue: ChannelQueue,
    pub(crate) events: EventBus,
}

/// Inbound entry point registered with the messaging service. Holds the
/// engine weakly so the service does not keep it alive.
struct Handler(Weak<Engine>);

#[async_trait]
impl ProtocolHandler for Handler {
    async fn handle_protocol_message(&self, msg: ProtocolMessage) -> ProtocolReply {
        match self.0.upgrade() {
            Some(engine) => sync::handle_inbound(&engine, msg).await,
            None => ProtocolReply::Rejected {
                reason: RejectReason::Invalid("EngineStopped".to_string()),
                message: "protocol engine is shut down".to_string(),
                latest_update: None,
            },
        }
    }
}

#[async_trait]
impl RestoreHandler for Handler {
    async fn handle_restore_request(&self, req: RestoreRequest) -> Option<RestoreReply> {
        let engine = self.0.upgrade()?;
        restore::handle_restore_request(&engine, req).await
    }
}

/// The state channel protocol of one participant.
///
/// Proposes updates to counterparties, countersigns their proposals and keeps
/// the store in sync. Usually an application has one `Protocol` per signer,
/// all of its channels are handled by it.
#[derive(Clone)]
pub struct Protocol {
    engine: Arc<Engine>,
}

impl Protocol {
    /// Create the engine and register it for inbound protocol and restore
    /// messages of `messaging`.
    pub fn connect(
        messaging: Arc<dyn MessagingService>,
        store: Arc<dyn Store>,
        signer: Signer,
        chain_reader: Arc<dyn ChainReader>,
        interpreter: Arc<dyn TransferInterpreter>,
        config: ProtocolConfig,
    ) -> Result<Self, ProtocolError> {
        if messaging.public_identifier() != signer.public_identifier() {
            return Err(ValidationError::InvalidParams {
                params_error: format!(
                    "messaging identifier {} does not belong to the signer",
                    messaging.public_identifier()
                ),
            }
            .into());
        }

        let engine = Arc::new(Engine {
            messaging,
            store,
            signer,
            chain: chain_reader,
            interpreter,
            config,
            queue: ChannelQueue::new(),
            events: EventBus::new(),
        });
        engine
            .messaging
            .on_receive_protocol_message(Arc::new(Handler(Arc::downgrade(&engine))))?;
        engine
            .messaging
            .on_receive_restore_request(Arc::new(Handler(Arc::downgrade(&engine))))?;
        info!(
            identifier = engine.signer.public_identifier(),
            address = %engine.signer.address(),
            "protocol connected"
        );
        Ok(Self { engine })
    }

    pub fn public_identifier(&self) -> &str {
        self.engine.signer.public_identifier()
    }

    pub fn signer_address(&self) -> Address {
        self.engine.signer.address()
    }

    pub fn events(&self) -> &EventBus {
        &self.engine.events
    }

    /// Open a channel with the counterparty, we become participant 0.
    pub async fn setup(&self, params: SetupParams) -> Result<UpdateResult, ProtocolError> {
        sync::propose_outbound(&self.engine, &UpdateParams::Setup(params)).await
    }

    /// Add an on-chain deposit of ours to the channel balance.
    pub async fn deposit(&self, params: DepositParams) -> Result<UpdateResult, ProtocolError> {
        sync::propose_outbound(&self.engine, &UpdateParams::Deposit(params)).await
    }

    /// Lock part of our balance in a new conditional transfer.
    pub async fn create(&self, params: CreateTransferParams) -> Result<UpdateResult, ProtocolError> {
        sync::propose_outbound(&self.engine, &UpdateParams::Create(params)).await
    }

    /// Unlock an active transfer according to its definition.
    pub async fn resolve(
        &self,
        params: ResolveTransferParams,
    ) -> Result<UpdateResult, ProtocolError> {
        sync::propose_outbound(&self.engine, &UpdateParams::Resolve(params)).await
    }

    /// Replace our copy of the channel with the counterparty with theirs.
    pub async fn restore_state(
        &self,
        params: RestoreParams,
    ) -> Result<FullChannelState, ProtocolError> {
        restore::restore_state(&self.engine, &params).await
    }

    /// Mark every stored channel with a dispute on-chain as disputed. Returns
    /// the channels that were newly marked.
    pub async fn sync_disputes(&self) -> Result<Vec<Address>, ProtocolError> {
        let engine = &self.engine;
        let mut disputed = Vec::new();
        for channel in engine.store.get_channel_states().await? {
            if channel.in_dispute {
                continue;
            }
            let address = channel.channel_address();
            let dispute = engine
                .chain
                .get_channel_dispute(address, channel.network_context.chain_id)
                .await?;
            if dispute.is_none() {
                continue;
            }

            let _guard = engine.queue.acquire(address).await;
            let Some(mut current) = engine.store.get_channel_state(address).await? else {
                continue;
            };
            current.in_dispute = true;
            engine.store.save_channel_state(&current, None).await?;
            warn!(channel = %address, nonce = current.nonce(), "channel is in dispute");
            disputed.push(address);
        }
        Ok(disputed)
    }

    pub async fn get_channel_state(
        &self,
        channel_address: Address,
    ) -> Result<Option<FullChannelState>, ProtocolError> {
        Ok(self.engine.store.get_channel_state(channel_address).await?)
    }

    pub async fn get_channel_state_by_participants(
        &self,
        alice: Address,
        bob: Address,
        chain_id: u64,
    ) -> Result<Option<FullChannelState>, ProtocolError> {
        Ok(self
            .engine
            .store
            .get_channel_state_by_participants(alice, bob, chain_id)
            .await?)
    }

    pub async fn get_channel_states(&self) -> Result<Vec<FullChannelState>, ProtocolError> {
        Ok(self.engine.store.get_channel_states().await?)
    }

    pub async fn get_transfer_state(
        &self,
        transfer_id: Hash,
    ) -> Result<Option<FullTransferState>, ProtocolError> {
        Ok(self.engine.store.get_transfer_state(transfer_id).await?)
    }

    pub async fn get_active_transfers(
        &self,
        channel_address: Address,
    ) -> Result<Vec<FullTransferState>, ProtocolError> {
        Ok(self.engine.store.get_active_transfers(channel_address).await?)
    }
}
