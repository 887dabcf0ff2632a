//! Messages exchanged between the participants of a channel and their
//! conversion from and to the protobuf wire types.

mod protocol;
mod state;
mod update;

use crate::{
    abiencode::types::{Address, Hash, Signature, U256},
    channel::{ChannelUpdate, FullChannelState, FullTransferState, PARTICIPANTS},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("field {field} has {actual} bytes, expected {expected}")]
    ByteLengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("field {field} has {actual} entries, expected {expected}")]
    ParticipantSizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// An update proposed to the counterparty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMessage {
    pub update: ChannelUpdate,
    /// The latest double signed update of the proposer, lets a counterparty
    /// that is one update behind catch up.
    pub latest_update: Option<ChannelUpdate>,
}

/// Why an update was not countersigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The update nonce is not above the nonce of the responder.
    StaleUpdate,
    /// The responder is more than one update behind.
    RestoreNeeded,
    /// The responder is working on the same channel.
    ChannelBusy,
    /// The update is invalid, carries the error reason code.
    Invalid(String),
}

impl RejectReason {
    pub fn as_str(&self) -> &str {
        match self {
            RejectReason::StaleUpdate => "StaleUpdate",
            RejectReason::RestoreNeeded => "RestoreNeeded",
            RejectReason::ChannelBusy => "ChannelBusy",
            RejectReason::Invalid(reason) => reason,
        }
    }

    pub fn parse(reason: &str) -> Self {
        match reason {
            "StaleUpdate" => RejectReason::StaleUpdate,
            "RestoreNeeded" => RejectReason::RestoreNeeded,
            "ChannelBusy" => RejectReason::ChannelBusy,
            other => RejectReason::Invalid(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolReply {
    /// The update carrying both signatures.
    Accepted { update: ChannelUpdate },
    Rejected {
        reason: RejectReason,
        message: String,
        /// The latest double signed update of the responder.
        latest_update: Option<ChannelUpdate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub chain_id: u64,
    pub from_identifier: String,
    pub to_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreReply {
    Data {
        channel: Option<FullChannelState>,
        active_transfers: Vec<FullTransferState>,
    },
    Error {
        reason: String,
        message: String,
    },
}

fn fixed<const N: usize>(field: &'static str, bytes: Vec<u8>) -> Result<[u8; N], ConversionError> {
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ConversionError::ByteLengthMismatch {
            field,
            expected: N,
            actual,
        })
}

fn address(field: &'static str, bytes: Vec<u8>) -> Result<Address, ConversionError> {
    fixed(field, bytes).map(Address)
}

fn hash(field: &'static str, bytes: Vec<u8>) -> Result<Hash, ConversionError> {
    fixed(field, bytes).map(Hash)
}

fn u256(field: &'static str, bytes: Vec<u8>) -> Result<U256, ConversionError> {
    let bytes: [u8; 32] = fixed(field, bytes)?;
    Ok(U256::from_big_endian(&bytes))
}

fn u256_bytes(value: U256) -> Vec<u8> {
    let mut bytes = vec![0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

fn signature(field: &'static str, bytes: Vec<u8>) -> Result<Option<Signature>, ConversionError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    fixed(field, bytes).map(|s| Some(Signature(s)))
}

fn per_participant<T>(field: &'static str, values: Vec<T>) -> Result<[T; PARTICIPANTS], ConversionError> {
    let actual = values.len();
    values
        .try_into()
        .map_err(|_| ConversionError::ParticipantSizeMismatch {
            field,
            expected: PARTICIPANTS,
            actual,
        })
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, ConversionError> {
    value.ok_or(ConversionError::MissingField(field))
}
