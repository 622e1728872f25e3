//! Protocol error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// An envelope failed to encode or decode.
    #[error("envelope codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Slot bookkeeping refused an operation.
    #[error("link error: {0}")]
    Link(#[from] daisy_topology::LinkError),
}
