use crate::{
    chain::ChainError,
    channel::{ApplyError, SignatureError, ValidationError},
    merkle::MerkleError,
    messages::ConversionError,
    queue::QueueError,
    restore::RestoreError,
    store::StoreError,
    sync::SyncError,
    wire::MessagingError,
};
use thiserror::Error;

/// Any error returned by a [Protocol](crate::Protocol) operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Merkle(#[from] MerkleError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Restore(#[from] RestoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl ProtocolError {
    /// Machine readable code of the underlying error.
    pub fn reason(&self) -> &'static str {
        match self {
            ProtocolError::Validation(e) => e.reason(),
            ProtocolError::Apply(e) => e.reason(),
            ProtocolError::Signature(e) => e.reason(),
            ProtocolError::Merkle(e) => e.reason(),
            ProtocolError::Messaging(e) => e.reason(),
            ProtocolError::Restore(e) => e.reason(),
            ProtocolError::Store(e) => e.reason(),
            ProtocolError::Chain(e) => e.reason(),
            ProtocolError::Sync(e) => e.reason(),
            ProtocolError::Queue(e) => e.reason(),
            ProtocolError::Conversion(_) => "InvalidMessage",
        }
    }
}
