use backtrace::Backtrace;
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Categories of failures raised by the database.
///
/// The kind decides how a caller should react: mapping and constraint errors are
/// recoverable and leave the database untouched, while [`ErrorKind::StorageError`]
/// means the store refuses further writes until it is reopened.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Object mapping
    MappingError,

    // Indexing
    IndexingError,
    IndexNotFound,
    IndexAlreadyExists,
    UniqueConstraintViolation,

    // Identity and lookups
    InvalidId,
    NotFound,

    // Caller mistakes
    InvalidOperation,
    InvalidFieldName,
    ValidationError,

    // Storage
    StorageError,
    StoreNotInitialized,
    StoreAlreadyClosed,
    IOError,
    EncodingError,

    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MappingError => write!(f, "Mapping error"),
            ErrorKind::IndexingError => write!(f, "Indexing error"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::IndexAlreadyExists => write!(f, "Index already exists"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::StorageError => write!(f, "Storage error"),
            ErrorKind::StoreNotInitialized => write!(f, "Store not initialized"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

#[derive(Clone)]
pub struct NestError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<NestError>>,
    backtrace: Atomic<Backtrace>,
}

impl NestError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        NestError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: NestError) -> Self {
        NestError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&NestError> {
        self.cause.as_deref()
    }
}

impl Display for NestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for NestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})\nCaused by: {:?}", self.message, self.error_kind, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "{} ({})\n{:?}", self.message, self.error_kind, backtrace)
            }
        }
    }
}

impl Error for NestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

pub type NestResult<T> = Result<T, NestError>;

impl de::Error for NestError {
    fn custom<T: Display>(msg: T) -> Self {
        NestError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl ser::Error for NestError {
    fn custom<T: Display>(msg: T) -> Self {
        NestError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl From<std::io::Error> for NestError {
    fn from(err: std::io::Error) -> Self {
        NestError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<std::string::FromUtf8Error> for NestError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        NestError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<String> for NestError {
    fn from(msg: String) -> Self {
        NestError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for NestError {
    fn from(msg: &str) -> Self {
        NestError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nest_error_new_creates_error() {
        let error = NestError::new("An error occurred", ErrorKind::IOError);
        assert_eq!(error.message, "An error occurred");
        assert_eq!(error.error_kind, ErrorKind::IOError);
        assert!(error.cause.is_none());
    }

    #[test]
    fn nest_error_new_with_cause_keeps_cause() {
        let cause = NestError::new("disk unplugged", ErrorKind::IOError);
        let error = NestError::new_with_cause("commit failed", ErrorKind::StorageError, cause);
        assert_eq!(error.kind(), &ErrorKind::StorageError);
        assert_eq!(error.cause().map(|c| c.message()), Some("disk unplugged"));
    }

    #[test]
    fn nest_error_source_follows_cause() {
        let cause = NestError::new("inner", ErrorKind::EncodingError);
        let error = NestError::new_with_cause("outer", ErrorKind::MappingError, cause);
        let source = error.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("inner"));

        let plain = NestError::new("plain", ErrorKind::InternalError);
        assert!(plain.source().is_none());
    }

    #[test]
    fn nest_error_display_is_message() {
        let error = NestError::new("An error occurred", ErrorKind::IOError);
        assert_eq!(format!("{}", error), "An error occurred");
    }

    #[test]
    fn nest_error_debug_mentions_kind_and_cause() {
        let cause = NestError::new("inner", ErrorKind::IOError);
        let error = NestError::new_with_cause("outer", ErrorKind::StorageError, cause);
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("outer"));
        assert!(formatted.contains("Storage error"));
        assert!(formatted.contains("Caused by: inner"));
    }

    #[test]
    fn nest_error_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: NestError = err.into();
        assert_eq!(error.kind(), &ErrorKind::IOError);
        assert!(error.message().contains("missing"));
    }

    #[test]
    fn nest_error_from_utf8_error() {
        let err = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let error: NestError = err.into();
        assert_eq!(error.kind(), &ErrorKind::EncodingError);
    }

    #[test]
    fn nest_error_from_strings() {
        let error: NestError = "boom".into();
        assert_eq!(error.kind(), &ErrorKind::InternalError);
        let error: NestError = String::from("bang").into();
        assert_eq!(error.message(), "bang");
    }

    #[test]
    fn serde_custom_errors_are_encoding_errors() {
        let error = <NestError as de::Error>::custom("bad input");
        assert_eq!(error.kind(), &ErrorKind::EncodingError);
        let error = <NestError as ser::Error>::custom("bad output");
        assert_eq!(error.message(), "bad output");
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::MappingError.to_string(), "Mapping error");
        assert_eq!(
            ErrorKind::UniqueConstraintViolation.to_string(),
            "Unique constraint violation"
        );
        assert_eq!(ErrorKind::StorageError.to_string(), "Storage error");
    }
}
