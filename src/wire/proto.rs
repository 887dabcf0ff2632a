//! Protobuf messages exchanged between participants.
//!
//! Fixed-size values (addresses, hashes, uint256) are carried as big-endian
//! bytes, missing signatures as empty bytes.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Balance {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub amount: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub to: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NetworkContext {
    #[prost(uint64, tag = "1")]
    pub chain_id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub channel_factory_address: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub channel_mastercopy_address: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub adjudicator_address: Vec<u8>,
    #[prost(string, tag = "5")]
    pub provider_url: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetupDetails {
    #[prost(bytes = "vec", tag = "1")]
    pub timeout: Vec<u8>,
    #[prost(message, optional, tag = "2")]
    pub network_context: Option<NetworkContext>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DepositDetails {
    #[prost(uint64, tag = "1")]
    pub latest_deposit_nonce: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateDetails {
    #[prost(bytes = "vec", tag = "1")]
    pub transfer_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub transfer_definition: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub transfer_timeout: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub transfer_initial_state: Vec<u8>,
    #[prost(string, repeated, tag = "5")]
    pub transfer_encodings: Vec<String>,
    #[prost(message, optional, tag = "6")]
    pub transfer_initial_balance: Option<Balance>,
    #[prost(bytes = "vec", repeated, tag = "7")]
    pub merkle_proof_data: Vec<Vec<u8>>,
    #[prost(bytes = "vec", tag = "8")]
    pub merkle_root: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResolveDetails {
    #[prost(bytes = "vec", tag = "1")]
    pub transfer_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub transfer_definition: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub transfer_resolver: Vec<u8>,
    #[prost(string, repeated, tag = "4")]
    pub transfer_encodings: Vec<String>,
    #[prost(bytes = "vec", tag = "5")]
    pub merkle_root: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelUpdate {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_address: Vec<u8>,
    #[prost(string, tag = "2")]
    pub from_identifier: String,
    #[prost(string, tag = "3")]
    pub to_identifier: String,
    #[prost(uint64, tag = "4")]
    pub nonce: u64,
    #[prost(message, optional, tag = "5")]
    pub balance: Option<Balance>,
    #[prost(bytes = "vec", tag = "6")]
    pub asset_id: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "7")]
    pub signatures: Vec<Vec<u8>>,
    #[prost(oneof = "channel_update::Details", tags = "8, 9, 10, 11")]
    pub details: Option<channel_update::Details>,
}

pub mod channel_update {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Details {
        #[prost(message, tag = "8")]
        Setup(super::SetupDetails),
        #[prost(message, tag = "9")]
        Deposit(super::DepositDetails),
        #[prost(message, tag = "10")]
        Create(super::CreateDetails),
        #[prost(message, tag = "11")]
        Resolve(super::ResolveDetails),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CoreChannelState {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_address: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub participants: Vec<Vec<u8>>,
    #[prost(bytes = "vec", tag = "3")]
    pub timeout: Vec<u8>,
    #[prost(message, repeated, tag = "4")]
    pub balances: Vec<Balance>,
    #[prost(bytes = "vec", repeated, tag = "5")]
    pub locked_value: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "6")]
    pub asset_ids: Vec<Vec<u8>>,
    #[prost(uint64, tag = "7")]
    pub nonce: u64,
    #[prost(uint64, tag = "8")]
    pub latest_deposit_nonce: u64,
    #[prost(bytes = "vec", tag = "9")]
    pub merkle_root: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FullChannelState {
    #[prost(message, optional, tag = "1")]
    pub core: Option<CoreChannelState>,
    #[prost(string, repeated, tag = "2")]
    pub public_identifiers: Vec<String>,
    #[prost(message, optional, tag = "3")]
    pub network_context: Option<NetworkContext>,
    #[prost(message, optional, tag = "4")]
    pub latest_update: Option<ChannelUpdate>,
    #[prost(bool, tag = "5")]
    pub in_dispute: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CoreTransferState {
    #[prost(message, optional, tag = "1")]
    pub initial_balance: Option<Balance>,
    #[prost(bytes = "vec", tag = "2")]
    pub asset_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub channel_address: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub transfer_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub transfer_definition: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub transfer_timeout: Vec<u8>,
    #[prost(bytes = "vec", tag = "7")]
    pub initial_state_hash: Vec<u8>,
    #[prost(string, repeated, tag = "8")]
    pub transfer_encodings: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FullTransferState {
    #[prost(message, optional, tag = "1")]
    pub core: Option<CoreTransferState>,
    #[prost(bytes = "vec", tag = "2")]
    pub transfer_state: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub transfer_resolver: Option<Vec<u8>>,
    #[prost(bytes = "vec", tag = "4")]
    pub initiator: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub responder: Vec<u8>,
    #[prost(uint64, tag = "6")]
    pub chain_id: u64,
    #[prost(uint64, tag = "7")]
    pub channel_nonce: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtocolMsg {
    #[prost(message, optional, tag = "1")]
    pub update: Option<ChannelUpdate>,
    #[prost(message, optional, tag = "2")]
    pub latest_update: Option<ChannelUpdate>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateAcceptedMsg {
    #[prost(message, optional, tag = "1")]
    pub update: Option<ChannelUpdate>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateRejectedMsg {
    #[prost(string, tag = "1")]
    pub reason: String,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, optional, tag = "3")]
    pub latest_update: Option<ChannelUpdate>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RestoreRequestMsg {
    #[prost(uint64, tag = "1")]
    pub chain_id: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RestoreDataMsg {
    #[prost(message, optional, tag = "1")]
    pub channel: Option<FullChannelState>,
    #[prost(message, repeated, tag = "2")]
    pub active_transfers: Vec<FullTransferState>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RestoreErrorMsg {
    #[prost(string, tag = "1")]
    pub reason: String,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub recipient: String,
    #[prost(oneof = "envelope::Msg", tags = "3, 4, 5, 6, 7, 8")]
    pub msg: Option<envelope::Msg>,
}

pub mod envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "3")]
        Protocol(super::ProtocolMsg),
        #[prost(message, tag = "4")]
        UpdateAccepted(super::UpdateAcceptedMsg),
        #[prost(message, tag = "5")]
        UpdateRejected(super::UpdateRejectedMsg),
        #[prost(message, tag = "6")]
        RestoreRequest(super::RestoreRequestMsg),
        #[prost(message, tag = "7")]
        RestoreData(super::RestoreDataMsg),
        #[prost(message, tag = "8")]
        RestoreError(super::RestoreErrorMsg),
    }
}
