use super::{
    required, ConversionError, ProtocolMessage, ProtocolReply, RejectReason, RestoreReply,
};
use crate::{channel::ChannelUpdate, wire::proto};

impl TryFrom<proto::ProtocolMsg> for ProtocolMessage {
    type Error = ConversionError;

    fn try_from(value: proto::ProtocolMsg) -> Result<Self, Self::Error> {
        Ok(ProtocolMessage {
            update: required("update", value.update)?.try_into()?,
            latest_update: value.latest_update.map(TryInto::try_into).transpose()?,
        })
    }
}

impl From<ProtocolMessage> for proto::ProtocolMsg {
    fn from(value: ProtocolMessage) -> Self {
        Self {
            update: Some(value.update.into()),
            latest_update: value.latest_update.map(Into::into),
        }
    }
}

impl TryFrom<proto::UpdateAcceptedMsg> for ProtocolReply {
    type Error = ConversionError;

    fn try_from(value: proto::UpdateAcceptedMsg) -> Result<Self, Self::Error> {
        Ok(ProtocolReply::Accepted {
            update: required("update", value.update)?.try_into()?,
        })
    }
}

impl TryFrom<proto::UpdateRejectedMsg> for ProtocolReply {
    type Error = ConversionError;

    fn try_from(value: proto::UpdateRejectedMsg) -> Result<Self, Self::Error> {
        Ok(ProtocolReply::Rejected {
            reason: RejectReason::parse(&value.reason),
            message: value.message,
            latest_update: value
                .latest_update
                .map(ChannelUpdate::try_from)
                .transpose()?,
        })
    }
}

impl From<ProtocolReply> for proto::envelope::Msg {
    fn from(value: ProtocolReply) -> Self {
        match value {
            ProtocolReply::Accepted { update } => {
                proto::envelope::Msg::UpdateAccepted(proto::UpdateAcceptedMsg {
                    update: Some(update.into()),
                })
            }
            ProtocolReply::Rejected {
                reason,
                message,
                latest_update,
            } => proto::envelope::Msg::UpdateRejected(proto::UpdateRejectedMsg {
                reason: reason.as_str().to_string(),
                message,
                latest_update: latest_update.map(Into::into),
            }),
        }
    }
}

impl TryFrom<proto::RestoreDataMsg> for RestoreReply {
    type Error = ConversionError;

    fn try_from(value: proto::RestoreDataMsg) -> Result<Self, ConversionError> {
        Ok(RestoreReply::Data {
            channel: value.channel.map(TryInto::try_into).transpose()?,
            active_transfers: value
                .active_transfers
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl From<proto::RestoreErrorMsg> for RestoreReply {
    fn from(value: proto::RestoreErrorMsg) -> Self {
        RestoreReply::Error {
            reason: value.reason,
            message: value.message,
        }
    }
}

impl From<RestoreReply> for proto::envelope::Msg {
    fn from(value: RestoreReply) -> Self {
        match value {
            RestoreReply::Data {
                channel,
                active_transfers,
            } => proto::envelope::Msg::RestoreData(proto::RestoreDataMsg {
                channel: channel.map(Into::into),
                active_transfers: active_transfers.into_iter().map(Into::into).collect(),
            }),
            RestoreReply::Error { reason, message } => {
                proto::envelope::Msg::RestoreError(proto::RestoreErrorMsg { reason, message })
            }
        }
    }
}
