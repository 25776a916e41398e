use std::path::PathBuf;

/// A stable identifier for an [`Error`] variant, so that callers can branch
/// on the failure kind rather than matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    OutOfRange,
    FileNotFound,
    ParseError,
    UninitializedOptionalResult,
    AllocatorExhausted,
    Io,
}

/// All errors surface as typed failures at the call boundary. The engine
/// never logs, never prints, never aborts on caller error; partial results
/// are never exposed on failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("index out of range: {0}")]
    OutOfRange(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("optional result `{0}` was not requested")]
    UninitializedOptionalResult(&'static str),

    #[error("allocator exhausted")]
    AllocatorExhausted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::OutOfRange(_) => ErrorKind::OutOfRange,
            Error::FileNotFound(_) => ErrorKind::FileNotFound,
            Error::ParseError(_) => ErrorKind::ParseError,
            Error::UninitializedOptionalResult(_) => ErrorKind::UninitializedOptionalResult,
            Error::AllocatorExhausted => ErrorKind::AllocatorExhausted,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
