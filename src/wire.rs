//! Request/reply messaging between the two participants of a channel.

mod encoding;
mod memory;
pub mod proto;

use crate::messages::{ProtocolMessage, ProtocolReply, RestoreReply, RestoreRequest};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

pub use encoding::{decode_frame, encode_frame, Frame, WireMessage};
pub use memory::{MemoryMessagingHub, MemoryMessagingService};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("no reply from {0}")]
    Timeout(String),
    #[error("a {0} handler is already registered")]
    HandlerAlreadyRegistered(&'static str),
    #[error("failed to encode message: {0}")]
    Encode(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
}

impl MessagingError {
    pub fn reason(&self) -> &'static str {
        match self {
            MessagingError::Timeout(_) => "Timeout",
            MessagingError::HandlerAlreadyRegistered(_) => "HandlerAlreadyRegistered",
            MessagingError::Encode(_) => "EncodeFailed",
            MessagingError::Decode(_) => "DecodeFailed",
            MessagingError::UnexpectedMessage(_) => "UnexpectedMessage",
        }
    }
}

/// Inbound entry point for proposed updates.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    async fn handle_protocol_message(&self, msg: ProtocolMessage) -> ProtocolReply;
}

/// Inbound entry point for restore requests. Returning `None` leaves the
/// request unanswered.
#[async_trait]
pub trait RestoreHandler: Send + Sync {
    async fn handle_restore_request(&self, req: RestoreRequest) -> Option<RestoreReply>;
}

#[async_trait]
pub trait MessagingService: Send + Sync {
    fn public_identifier(&self) -> &str;

    async fn send_protocol_message(
        &self,
        to: &str,
        msg: ProtocolMessage,
        timeout: Duration,
    ) -> Result<ProtocolReply, MessagingError>;

    async fn send_restore_request(
        &self,
        req: RestoreRequest,
        timeout: Duration,
    ) -> Result<RestoreReply, MessagingError>;

    /// Fails if a protocol handler is already registered.
    fn on_receive_protocol_message(
        &self,
        handler: Arc<dyn ProtocolHandler>,
    ) -> Result<(), MessagingError>;

    /// Fails if a restore handler is already registered.
    fn on_receive_restore_request(
        &self,
        handler: Arc<dyn RestoreHandler>,
    ) -> Result<(), MessagingError>;
}
