use nestdb::errors::{ErrorKind, NestError};
use std::error::Error;
use thiserror::Error;

/// Longest partition name fjall accepts.
pub(crate) const MAX_PARTITION_NAME_LEN: usize = 254;

/// Failures raised by the adapter itself rather than by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FjallAdapterError {
    #[error("Map name must not be empty")]
    EmptyName,
    #[error("Map name {0} needs {1} bytes as a partition name, at most {MAX_PARTITION_NAME_LEN} are allowed")]
    NameTooLong(String, usize),
    #[error("Partition name {0} is not a valid map name encoding: {1}")]
    MalformedName(String, String),
    #[error("Keyspace is not open")]
    KeyspaceNotOpen,
    #[error("Database path is not configured")]
    MissingPath,
}

impl From<FjallAdapterError> for NestError {
    fn from(err: FjallAdapterError) -> Self {
        let kind = match &err {
            FjallAdapterError::EmptyName | FjallAdapterError::NameTooLong(..) => {
                ErrorKind::ValidationError
            }
            FjallAdapterError::MalformedName(..) => ErrorKind::EncodingError,
            FjallAdapterError::KeyspaceNotOpen => ErrorKind::StoreAlreadyClosed,
            FjallAdapterError::MissingPath => ErrorKind::StoreNotInitialized,
        };
        NestError::new(&err.to_string(), kind)
    }
}

/// Logs an engine failure and converts it into a [`NestError`].
pub(crate) fn to_nest_error(context: &str, error: impl Error) -> NestError {
    let message = error.to_string();
    log::error!("{}: {}", context, message);

    let lowered = message.to_lowercase();
    let kind = if lowered.contains("poisoned") || lowered.contains("corrupt") {
        ErrorKind::StorageError
    } else if lowered.contains("deleted") {
        ErrorKind::NotFound
    } else if lowered.contains("permission")
        || lowered.contains("no space")
        || lowered.contains("no such file")
    {
        ErrorKind::IOError
    } else {
        ErrorKind::StorageError
    };
    NestError::new(&format!("{}: {}", context, message), kind)
}
