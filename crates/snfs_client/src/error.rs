use std::io;

use snfs_protocol::{DecodeError, SnfsError};

/// Client-side errors: transport failures around `remote_call`, plus the
/// server's own [`SnfsError`] when a call completes but reports failure.
///
/// Mirrors the three-tier shape of [`snfs_server::engine::EngineError`] →
/// [`SnfsError`]: this is the outermost tier, the one callers actually
/// match on.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to send request: {0}")]
    Send(#[source] io::Error),
    #[error("failed to receive a response: {0}")]
    RecvTimeout(#[source] io::Error),
    #[error("response serial number mismatch: expected {expected}, got {got}")]
    SerialNumberMismatch { expected: u32, got: u32 },
    #[error("received a zero-length response")]
    ShortRead,
    #[error("malformed response datagram: {0}")]
    Decode(#[from] DecodeError),
    #[error("server reported an error: {0}")]
    Remote(#[from] SnfsError),
    #[error("too many open files (limit is {0})")]
    TooManyOpenFiles(usize),
    #[error("bad file descriptor {0}")]
    BadFileDescriptor(usize),
    #[error("path {0:?} is missing a path separator")]
    InvalidPath(String),
}
