//! Channel states, updates and the rules to advance them.

mod apply;
mod params;
mod propose;
mod signatures;
mod state;
mod update;
mod validate;
mod withdraw;

pub use apply::{apply_update, ApplyError, ApplyResult};
pub use params::{
    CreateTransferParams, DepositParams, NetworkContextParams, ResolveTransferParams,
    RestoreParams, SetupParams, UpdateParams, ValidationError,
};
pub use propose::{channel_address_for, propose};
pub use signatures::{
    hash_to_sign, sign_update, validate_channel_signatures, validate_update_signatures,
    SignatureError,
};
pub use state::{
    initial_state_hash, transfer_id, Balance, CoreChannelState, CoreTransferState,
    FullChannelState, FullTransferState, NetworkContext,
};
pub use update::{
    ChannelUpdate, CreateDetails, DepositDetails, ResolveDetails, SetupDetails, UpdateDetails,
    UpdateType,
};
pub use validate::validate_inbound_update;
pub use withdraw::{WithdrawCommitment, WithdrawError};

/// Index of a participant in the channel.
///
/// `0` is the participant that proposed the channel setup.
pub type PartIdx = usize;

/// Number of participants of every channel.
pub const PARTICIPANTS: usize = 2;
