use crate::store::StoreError;
use thiserror::Error;

/// Message shown to a client when a collaborator failed underneath its request
pub const GENERIC_FAILURE: &str = "Failed to initialize the game. Please contact an administrator.";

/// Failure of a client command
///
/// Validation failures go back to the requester as a warning. Store failures
/// are logged in full and the requester only sees [`GENERIC_FAILURE`].
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

pub fn validation(message: impl Into<String>) -> CommandError {
    CommandError::Validation(message.into())
}
