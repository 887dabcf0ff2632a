use super::{
    decode_frame, encode_frame, Frame, MessagingError, MessagingService, ProtocolHandler,
    RestoreHandler, WireMessage,
};
use crate::messages::{ProtocolMessage, ProtocolReply, RestoreReply, RestoreRequest};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};
use tracing::debug;

#[derive(Default)]
struct Hub {
    peers: HashMap<String, Arc<MemoryMessagingService>>,
    /// Number of upcoming replies to discard, by responder.
    dropped_replies: HashMap<String, usize>,
}

impl Hub {
    fn take_dropped_reply(&mut self, responder: &str) -> bool {
        match self.dropped_replies.get_mut(responder) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

/// In-process transport connecting any number of [MemoryMessagingService]s.
///
/// Messages are passed as encoded frames, so everything sent through the hub
/// also goes through the protobuf codec.
#[derive(Clone, Default)]
pub struct MemoryMessagingHub {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryMessagingHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, identifier: impl Into<String>) -> Arc<MemoryMessagingService> {
        let identifier = identifier.into();
        let service = Arc::new(MemoryMessagingService {
            identifier: identifier.clone(),
            hub: Arc::downgrade(&self.hub),
            protocol: RwLock::new(None),
            restore: RwLock::new(None),
        });
        self.hub.lock().peers.insert(identifier, service.clone());
        service
    }

    /// Messages to `identifier` go unanswered from now on.
    pub fn disconnect(&self, identifier: &str) {
        self.hub.lock().peers.remove(identifier);
    }

    /// Let `identifier` handle the next `count` requests but lose its replies.
    pub fn drop_replies(&self, identifier: &str, count: usize) {
        *self
            .hub
            .lock()
            .dropped_replies
            .entry(identifier.to_string())
            .or_default() += count;
    }
}

pub struct MemoryMessagingService {
    identifier: String,
    hub: Weak<Mutex<Hub>>,
    protocol: RwLock<Option<Arc<dyn ProtocolHandler>>>,
    restore: RwLock<Option<Arc<dyn RestoreHandler>>>,
}

impl MemoryMessagingService {
    /// Handle an encoded request, `None` if it stays unanswered.
    async fn deliver(&self, bytes: Vec<u8>) -> Result<Option<Vec<u8>>, MessagingError> {
        let frame = decode_frame(&bytes)?;
        let reply = match frame.message {
            WireMessage::Protocol(msg) => {
                let handler = self.protocol.read().clone();
                match handler {
                    Some(handler) => Some(WireMessage::ProtocolReply(
                        handler.handle_protocol_message(msg).await,
                    )),
                    None => None,
                }
            }
            WireMessage::RestoreRequest { chain_id } => {
                let handler = self.restore.read().clone();
                match handler {
                    Some(handler) => handler
                        .handle_restore_request(RestoreRequest {
                            chain_id,
                            from_identifier: frame.sender.clone(),
                            to_identifier: frame.recipient.clone(),
                        })
                        .await
                        .map(WireMessage::RestoreReply),
                    None => None,
                }
            }
            other => return Err(MessagingError::UnexpectedMessage(format!("{other:?}"))),
        };

        reply
            .map(|message| {
                encode_frame(Frame {
                    sender: frame.recipient,
                    recipient: frame.sender,
                    message,
                })
            })
            .transpose()
    }

    async fn request(&self, frame: Frame, timeout: Duration) -> Result<WireMessage, MessagingError> {
        let recipient = frame.recipient.clone();
        let bytes = encode_frame(frame)?;
        let hub = self
            .hub
            .upgrade()
            .ok_or_else(|| MessagingError::Timeout(recipient.clone()))?;

        let exchange = async {
            let peer = hub.lock().peers.get(&recipient).cloned();
            let Some(peer) = peer else {
                debug!(recipient, "no route to recipient");
                return Err(MessagingError::Timeout(recipient.clone()));
            };
            // The responder keeps going even if we stop waiting.
            let reply = tokio::spawn(async move { peer.deliver(bytes).await })
                .await
                .map_err(|_| MessagingError::Timeout(recipient.clone()))??;
            let dropped = hub.lock().take_dropped_reply(&recipient);
            match reply {
                Some(reply) if !dropped => decode_frame(&reply).map(|f| f.message),
                _ => std::future::pending().await,
            }
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| MessagingError::Timeout(recipient.clone()))?
    }
}

#[async_trait]
impl MessagingService for MemoryMessagingService {
    fn public_identifier(&self) -> &str {
        &self.identifier
    }

    async fn send_protocol_message(
        &self,
        to: &str,
        msg: ProtocolMessage,
        timeout: Duration,
    ) -> Result<ProtocolReply, MessagingError> {
        let frame = Frame {
            sender: self.identifier.clone(),
            recipient: to.to_string(),
            message: WireMessage::Protocol(msg),
        };
        match self.request(frame, timeout).await? {
            WireMessage::ProtocolReply(reply) => Ok(reply),
            other => Err(MessagingError::UnexpectedMessage(format!("{other:?}"))),
        }
    }

    async fn send_restore_request(
        &self,
        req: RestoreRequest,
        timeout: Duration,
    ) -> Result<RestoreReply, MessagingError> {
        match self.request(Frame::restore_request(req), timeout).await? {
            WireMessage::RestoreReply(reply) => Ok(reply),
            other => Err(MessagingError::UnexpectedMessage(format!("{other:?}"))),
        }
    }

    fn on_receive_protocol_message(
        &self,
        handler: Arc<dyn ProtocolHandler>,
    ) -> Result<(), MessagingError> {
        let mut slot = self.protocol.write();
        if slot.is_some() {
            return Err(MessagingError::HandlerAlreadyRegistered("protocol"));
        }
        *slot = Some(handler);
        Ok(())
    }

    fn on_receive_restore_request(
        &self,
        handler: Arc<dyn RestoreHandler>,
    ) -> Result<(), MessagingError> {
        let mut slot = self.restore.write();
        if slot.is_some() {
            return Err(MessagingError::HandlerAlreadyRegistered("restore"));
        }
        *slot = Some(handler);
        Ok(())
    }
}
