use std::io;

use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tracing_error::SpanTrace;

#[derive(Debug, Error)]
#[error("error: {kind}\n{span}")]
pub struct Error {
    pub(crate) kind: Box<ErrorKind>,
    pub(crate) span: SpanTrace,
}

impl Error {
    /// The underlying error category, for callers that need to branch.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind: kind.into(),
            span: SpanTrace::capture(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("unexpected I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected internal error: {0}")]
    Internal(String),

    #[error("engine is not running")]
    NotRunning,

    #[error("builder error: {0}")]
    Builder(#[from] BuilderError),

    #[error("GMCP error: {0}")]
    Gmcp(#[from] GmcpError),

    #[error("MSDP error: {0}")]
    Msdp(#[from] MsdpError),

    #[error("MSSP error: {0}")]
    Mssp(#[from] MsspError),

    #[error("compression error: {0}")]
    Compression(String),
}

impl From<BuilderError> for Error {
    fn from(err: BuilderError) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

impl From<GmcpError> for Error {
    fn from(err: GmcpError) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

impl From<MsdpError> for Error {
    fn from(err: MsdpError) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

impl From<MsspError> for Error {
    fn from(err: MsspError) -> Self {
        Self::from(ErrorKind::from(err))
    }
}

impl<T> From<SendError<T>> for ErrorKind {
    fn from(value: SendError<T>) -> Self {
        Self::Internal(format!("sending message: {value}"))
    }
}

impl<T> From<SendError<T>> for Error {
    fn from(value: SendError<T>) -> Self {
        Self::from(ErrorKind::from(value))
    }
}

#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum BuilderError {
    #[error("max_buffer_size must be non-zero")]
    ZeroBufferSize,

    #[error("ingress_capacity must be non-zero")]
    ZeroIngressCapacity,

    #[error("charset offer '{0}' is not a known encoding label")]
    UnknownCharset(String),
}

#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum GmcpError {
    #[error("message had invalid non-utf8 package name")]
    InvalidEncoding,

    #[error("message was malformed")]
    Malformed,

    #[error("message payload was invalid JSON")]
    InvalidJson,
}

#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum MsdpError {
    #[error("unexpected byte {byte:#04x} at offset {offset}")]
    UnexpectedByte { byte: u8, offset: usize },

    #[error("truncated message: expected {expected}")]
    Truncated { expected: &'static str },

    #[error("request was not a variable/value structure")]
    MalformedRequest,
}

#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum MsspError {
    #[error("body did not start with MSSP_VAR")]
    MissingVar,

    #[error("variable '{0}' had no value")]
    MissingValue(String),

    #[error("config did not serialize to an object")]
    NotAnObject,

    #[error("decoded config was invalid: {0}")]
    Invalid(String),
}

