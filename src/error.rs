use thiserror::Error;

/// Errors returned by credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid username '{0}'")]
    InvalidUsername(String),

    #[error("user '{0}' already exists")]
    AlreadyExists(String),

    #[error("user '{0}' does not exist")]
    NotFound(String),

    #[error("hash format of user '{0}' is not supported")]
    UnsupportedFormat(String),

    #[error("context ID '{0}' is unknown")]
    UnknownContext(u32),

    #[error("the store has no default context")]
    NoDefaultContext,

    #[error("hash record is invalid: {0}")]
    Format(String),

    #[error("password hashing failed: {0}")]
    Crypto(String),

    #[error("invalid store directory: {0}")]
    InvalidStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
