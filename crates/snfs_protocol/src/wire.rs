//! Fixed-layout request/response records.
//!
//! Every arm struct here derives [`Pod`] and is reinterpreted in place from
//! raw datagram bytes via `dataview`, the same zero-copy cast idiom used
//! for on-disk records in `snfs_types`. Only the header plus the bytes of
//! the arm that matches the operation are ever put on the wire; the codec
//! in `codec.rs` is responsible for picking the right prefix length.

use dataview::Pod;
use strum::FromRepr;

/// Maximum length of a path string, NUL-terminated.
pub const MAX_PATH_NAME_SIZE: usize = 256;
/// Maximum length of a `ping` message, NUL-terminated.
pub const MAX_PING_MSG_SIZE: usize = 64;
/// Maximum bytes of payload a single `read` can return.
pub const MAX_READ_DATA: usize = 1024;
/// Maximum bytes of payload a single `write` can carry.
pub const MAX_WRITE_DATA: usize = 1024;
/// Maximum directory entries a single `readdir` response can carry.
pub const MAX_READDIR_ENTRIES: usize = 64;

/// Operation codes, one per engine entry point exposed over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u32)]
pub enum OpCode {
    Ping = 0,
    Lookup = 1,
    Read = 2,
    Write = 3,
    Create = 4,
    Mkdir = 5,
    Readdir = 6,
    Copy = 7,
}

/// Common prefix of every request: serial number, operation code, and the
/// unfulfilled multi-replica fan-out flag (accepted, never acted on).
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct RequestHeader {
    pub sn: u32,
    pub op: u32,
    pub to_all_servers: u32,
}

/// Common prefix of every response: the echoed serial number and the
/// status/error code.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct ResponseHeader {
    pub sn: u32,
    pub status: i32,
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct PingArgs {
    pub msg: [u8; MAX_PING_MSG_SIZE],
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct PingResult {
    pub msg: [u8; MAX_PING_MSG_SIZE],
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct LookupArgs {
    pub pname: [u8; MAX_PATH_NAME_SIZE],
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct LookupResult {
    pub file: u32,
    pub fsize: u32,
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct ReadArgs {
    pub fhandle: u32,
    pub offset: u32,
    pub count: u32,
    _pad: u32,
}

impl ReadArgs {
    #[must_use]
    pub const fn new(fhandle: u32, offset: u32, count: u32) -> Self {
        Self {
            fhandle,
            offset,
            count,
            _pad: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct ReadResult {
    pub nread: u32,
    _pad: u32,
    pub data: [u8; MAX_READ_DATA],
}

impl ReadResult {
    #[must_use]
    pub const fn new(nread: u32, data: [u8; MAX_READ_DATA]) -> Self {
        Self {
            nread,
            _pad: 0,
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct WriteArgs {
    pub fhandle: u32,
    pub offset: u32,
    pub count: u32,
    _pad: u32,
    pub data: [u8; MAX_WRITE_DATA],
}

impl WriteArgs {
    #[must_use]
    pub const fn new(fhandle: u32, offset: u32, count: u32, data: [u8; MAX_WRITE_DATA]) -> Self {
        Self {
            fhandle,
            offset,
            count,
            _pad: 0,
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct WriteResult {
    pub fsize: u32,
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct CreateArgs {
    pub dir: u32,
    pub name: [u8; snfs_types::FS_MAX_FNAME_SZ],
    _pad: [u8; 2],
}

impl CreateArgs {
    #[must_use]
    pub const fn new(dir: u32, name: [u8; snfs_types::FS_MAX_FNAME_SZ]) -> Self {
        Self {
            dir,
            name,
            _pad: [0; 2],
        }
    }
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct CreateResult {
    pub file: u32,
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct MkdirArgs {
    pub dir: u32,
    pub name: [u8; snfs_types::FS_MAX_FNAME_SZ],
    _pad: [u8; 2],
}

impl MkdirArgs {
    #[must_use]
    pub const fn new(dir: u32, name: [u8; snfs_types::FS_MAX_FNAME_SZ]) -> Self {
        Self {
            dir,
            name,
            _pad: [0; 2],
        }
    }
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct MkdirResult {
    pub newdirid: u32,
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct ReaddirArgs {
    pub dir: u32,
    pub cmax: u32,
}

/// One entry in a `readdir` response: a name and its inode type.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct ReaddirEntry {
    pub inode_id: u32,
    pub ty: u16,
    _pad0: u16,
    pub name: [u8; snfs_types::FS_MAX_FNAME_SZ],
    _pad1: [u8; 2],
}

impl ReaddirEntry {
    #[must_use]
    pub const fn new(inode_id: u32, ty: u16, name: [u8; snfs_types::FS_MAX_FNAME_SZ]) -> Self {
        Self {
            inode_id,
            ty,
            _pad0: 0,
            name,
            _pad1: [0; 2],
        }
    }
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct ReaddirResult {
    pub count: u32,
    pub entries: [ReaddirEntry; MAX_READDIR_ENTRIES],
}

#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct CopyArgs {
    pub src_pathname: [u8; MAX_PATH_NAME_SIZE],
    pub tgt_pathname: [u8; MAX_PATH_NAME_SIZE],
}

/// `copy` carries no response payload beyond the common header.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct CopyResult {}

const fn max(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}

const MAX_ARGS_SIZE: usize = max(
    max(
        max(size_of::<PingArgs>(), size_of::<LookupArgs>()),
        max(size_of::<ReadArgs>(), size_of::<WriteArgs>()),
    ),
    max(
        max(size_of::<CreateArgs>(), size_of::<MkdirArgs>()),
        max(size_of::<ReaddirArgs>(), size_of::<CopyArgs>()),
    ),
);

const MAX_RESULT_SIZE: usize = max(
    max(
        max(size_of::<PingResult>(), size_of::<LookupResult>()),
        max(size_of::<ReadResult>(), size_of::<WriteResult>()),
    ),
    max(
        max(size_of::<CreateResult>(), size_of::<MkdirResult>()),
        max(size_of::<ReaddirResult>(), size_of::<CopyResult>()),
    ),
);

/// Upper bound on the size in bytes of any encoded request datagram.
pub const MAX_REQUEST_WIRE_SIZE: usize = size_of::<RequestHeader>() + MAX_ARGS_SIZE;
/// Upper bound on the size in bytes of any encoded response datagram.
pub const MAX_RESPONSE_WIRE_SIZE: usize = size_of::<ResponseHeader>() + MAX_RESULT_SIZE;

#[cfg(test)]
mod tests {
    use super::{
        CopyArgs, CreateArgs, LookupArgs, MkdirArgs, PingArgs, ReadArgs, ReaddirArgs,
        RequestHeader, ResponseHeader, WriteArgs,
    };

    #[test]
    fn request_header_has_no_padding() {
        assert_eq!(size_of::<RequestHeader>(), 12);
    }

    #[test]
    fn response_header_has_no_padding() {
        assert_eq!(size_of::<ResponseHeader>(), 8);
    }

    #[test]
    fn arm_sizes_are_four_byte_aligned() {
        for size in [
            size_of::<PingArgs>(),
            size_of::<LookupArgs>(),
            size_of::<ReadArgs>(),
            size_of::<WriteArgs>(),
            size_of::<CreateArgs>(),
            size_of::<MkdirArgs>(),
            size_of::<ReaddirArgs>(),
            size_of::<CopyArgs>(),
        ] {
            assert_eq!(size % 4, 0);
        }
    }
}
