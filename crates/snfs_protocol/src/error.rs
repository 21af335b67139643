use strum::FromRepr;

/// The small wire-level status/error vocabulary carried by every response.
///
/// Grouped the same way the teacher's `SyscallError` groups a much larger
/// internal error enum into a handful of codes that actually cross a
/// process boundary: `snfs_server::EngineError` is the rich type engine
/// methods return, and collapses into one of these variants at the
/// dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, thiserror::Error)]
#[repr(i32)]
pub enum SnfsError {
    #[error("ok")]
    Ok = 0,
    #[error("no such file or directory")]
    NotFound = 1,
    #[error("name already exists")]
    AlreadyExists = 2,
    #[error("invalid argument")]
    InvalidArgument = 3,
    #[error("not a directory")]
    NotADirectory = 4,
    #[error("not a file")]
    NotAFile = 5,
    #[error("inode table exhausted")]
    ExhaustedInodes = 6,
    #[error("block device exhausted")]
    ExhaustedBlocks = 7,
    #[error("indirect blocks are not supported")]
    IndirectNotSupported = 8,
    #[error("unknown server error")]
    Unknown = -1,
}

impl SnfsError {
    #[must_use]
    pub const fn raw(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        Self::from_repr(raw).unwrap_or(Self::Unknown)
    }

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::SnfsError;

    #[test]
    fn round_trips_through_raw() {
        for err in [
            SnfsError::Ok,
            SnfsError::NotFound,
            SnfsError::AlreadyExists,
            SnfsError::InvalidArgument,
            SnfsError::NotADirectory,
            SnfsError::NotAFile,
            SnfsError::ExhaustedInodes,
            SnfsError::ExhaustedBlocks,
            SnfsError::IndirectNotSupported,
            SnfsError::Unknown,
        ] {
            assert_eq!(SnfsError::from_raw(err.raw()), err);
        }
    }

    #[test]
    fn unrecognized_code_maps_to_unknown() {
        assert_eq!(SnfsError::from_raw(999), SnfsError::Unknown);
    }
}
