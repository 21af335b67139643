use block_io::BlockDeviceError;
use snfs_protocol::SnfsError;

/// Rich internal error type returned by every engine operation.
///
/// Never sent over the wire directly; the dispatcher collapses it to a
/// [`SnfsError`] at the protocol boundary via [`From<EngineError> for
/// SnfsError`](#impl-From<EngineError>-for-SnfsError), the same way the
/// teacher's kernel collapses dozens of internal error variants down to a
/// small syscall-facing error enum.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("malformed arguments")]
    MalformedArguments,
    #[error("inode {0} is not allocated")]
    InodeNotAllocated(u32),
    #[error("inode {0} is not a directory")]
    NotADirectory(u32),
    #[error("inode {0} is not a file")]
    NotAFile(u32),
    #[error("entry {0:?} not found")]
    EntryNotFound(String),
    #[error("entry {0:?} already exists")]
    NameAlreadyExists(String),
    #[error("name {0:?} is empty or too long")]
    NameTooLong(String),
    #[error("path {0:?} is invalid")]
    InvalidPath(String),
    #[error("path {0:?} is missing a path separator")]
    MissingPathSeparator(String),
    #[error("no free inode")]
    NoFreeInode,
    #[error("no free block")]
    NoFreeBlock,
    #[error("direct block table is full")]
    DirectBlockTableFull,
    #[error("indirect blocks are not supported")]
    IndirectNotSupported,
    #[error("device has {0} blocks, more than the free-block bitmap can address ({1})")]
    DeviceTooLarge(u32, u32),
    #[error("block device error")]
    Device(#[from] BlockDeviceError),
}

impl From<&EngineError> for SnfsError {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::MalformedArguments
            | EngineError::InvalidPath(_)
            | EngineError::MissingPathSeparator(_)
            | EngineError::NameTooLong(_) => Self::InvalidArgument,
            EngineError::InodeNotAllocated(_) | EngineError::EntryNotFound(_) => Self::NotFound,
            EngineError::NameAlreadyExists(_) => Self::AlreadyExists,
            EngineError::NotADirectory(_) => Self::NotADirectory,
            EngineError::NotAFile(_) => Self::NotAFile,
            EngineError::NoFreeInode => Self::ExhaustedInodes,
            EngineError::NoFreeBlock | EngineError::DirectBlockTableFull => Self::ExhaustedBlocks,
            EngineError::IndirectNotSupported => Self::IndirectNotSupported,
            EngineError::DeviceTooLarge(_, _) => Self::InvalidArgument,
            EngineError::Device(_) => Self::Unknown,
        }
    }
}

impl From<EngineError> for SnfsError {
    fn from(err: EngineError) -> Self {
        Self::from(&err)
    }
}
