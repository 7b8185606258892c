//! Store errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Identity {0} already has a registered account")]
    AlreadyRegistered(String),

    #[error("Account username {0} is already linked to another identity")]
    UsernameTaken(String),

    #[error("Duplicate correlation key")]
    DuplicateKey,

    #[error("IP address {0} already registered")]
    IpAlreadyRegistered(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
