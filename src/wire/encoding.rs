use super::{proto, MessagingError};
use crate::messages::{ProtocolMessage, ProtocolReply, RestoreReply, RestoreRequest};
use prost::{bytes::BufMut, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Protocol(ProtocolMessage),
    ProtocolReply(ProtocolReply),
    RestoreRequest { chain_id: u64 },
    RestoreReply(RestoreReply),
}

/// A message together with its addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sender: String,
    pub recipient: String,
    pub message: WireMessage,
}

impl Frame {
    pub fn restore_request(req: RestoreRequest) -> Self {
        Self {
            sender: req.from_identifier,
            recipient: req.to_identifier,
            message: WireMessage::RestoreRequest {
                chain_id: req.chain_id,
            },
        }
    }
}

/// Encode `frame` as an envelope prefixed with its length as big-endian u32.
pub fn encode_frame(frame: Frame) -> Result<Vec<u8>, MessagingError> {
    let msg = match frame.message {
        WireMessage::Protocol(msg) => proto::envelope::Msg::Protocol(msg.into()),
        WireMessage::ProtocolReply(reply) => reply.into(),
        WireMessage::RestoreRequest { chain_id } => {
            proto::envelope::Msg::RestoreRequest(proto::RestoreRequestMsg { chain_id })
        }
        WireMessage::RestoreReply(reply) => reply.into(),
    };
    let envelope = proto::Envelope {
        sender: frame.sender,
        recipient: frame.recipient,
        msg: Some(msg),
    };

    let len = envelope.encoded_len();
    let prefix = u32::try_from(len)
        .map_err(|_| MessagingError::Encode(format!("envelope of {len} bytes is too large")))?;
    let mut buf = Vec::with_capacity(4 + len);
    buf.put_slice(&prefix.to_be_bytes());
    envelope
        .encode(&mut buf)
        .map_err(|e| MessagingError::Encode(e.to_string()))?;
    Ok(buf)
}

pub fn decode_frame(bytes: &[u8]) -> Result<Frame, MessagingError> {
    if bytes.len() < 4 {
        return Err(MessagingError::Decode("missing length prefix".to_string()));
    }
    let (prefix, body) = bytes.split_at(4);
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if body.len() != len {
        return Err(MessagingError::Decode(format!(
            "length prefix {len} does not match body of {} bytes",
            body.len()
        )));
    }

    let envelope =
        proto::Envelope::decode(body).map_err(|e| MessagingError::Decode(e.to_string()))?;
    let decode = |e: crate::messages::ConversionError| MessagingError::Decode(e.to_string());
    let message = match envelope.msg {
        None => return Err(MessagingError::Decode("empty envelope".to_string())),
        Some(proto::envelope::Msg::Protocol(msg)) => {
            WireMessage::Protocol(msg.try_into().map_err(decode)?)
        }
        Some(proto::envelope::Msg::UpdateAccepted(msg)) => {
            WireMessage::ProtocolReply(msg.try_into().map_err(decode)?)
        }
        Some(proto::envelope::Msg::UpdateRejected(msg)) => {
            WireMessage::ProtocolReply(msg.try_into().map_err(decode)?)
        }
        Some(proto::envelope::Msg::RestoreRequest(msg)) => WireMessage::RestoreRequest {
            chain_id: msg.chain_id,
        },
        Some(proto::envelope::Msg::RestoreData(msg)) => {
            WireMessage::RestoreReply(msg.try_into().map_err(decode)?)
        }
        Some(proto::envelope::Msg::RestoreError(msg)) => WireMessage::RestoreReply(msg.into()),
    };
    Ok(Frame {
        sender: envelope.sender,
        recipient: envelope.recipient,
        message,
    })
}
