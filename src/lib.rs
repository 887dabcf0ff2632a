//! Two-party state channels: signed off-chain updates of a shared channel
//! state, kept in sync between both participants.

mod abiencode {
    mod error;
    pub mod hashing;
    mod ser;
    mod token;

    pub mod as_bytes;
    pub mod as_dyn_array;
    pub mod types;

    pub use error::Error;
    pub use hashing::to_hash;
    pub use ser::{to_writer, Writer};

    #[cfg(test)]
    pub use ser::to_vec;

    #[cfg(test)]
    mod tests;
}
pub mod sig;

pub mod chain;
pub mod channel;
mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod merkle;
pub mod messages;
pub mod queue;
pub mod restore;
pub mod store;
pub mod sync;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wire;

pub use abiencode::{
    types::{Address, Hash, ParseHexError, Signature, U256},
    Error as EncodingError,
};
pub use client::Protocol;
pub use error::ProtocolError;
pub use sync::{SuccessfullyApplied, UpdateResult};
