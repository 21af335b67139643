//! POSIX-flavored file API layered over the [`ClientContext`] stub:
//! `init`/`open`/`read`/`write`/`close`/`mkdir`/`listdir` against a
//! bounded, per-process open-file table.

use std::path::Path;

use bitflags::bitflags;
use snfs_types::InodeType;

use crate::error::ClientError;
use crate::stub::{ClientContext, DirEntry};

/// Maximum number of files a single [`FileClient`] may have open at once.
pub const MAX_OPEN_FILES: usize = 10;

bitflags! {
    /// Flags accepted by [`FileClient::open`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Create the file at `path` if `lookup` does not find it.
        const CREATE = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenFile {
    handle: u32,
    size: u32,
    read_offset: u32,
    write_offset: u32,
}

/// A client with an open-file table, the file-descriptor-style layer
/// demo clients and tests are expected to use rather than the raw stub.
pub struct FileClient {
    ctx: ClientContext,
    open_files: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl FileClient {
    /// Connects to `server_addr` from a socket bound at `local_addr`.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::connect`].
    pub fn init(server_addr: &Path, local_addr: &Path) -> Result<Self, ClientError> {
        Ok(Self {
            ctx: ClientContext::connect(server_addr, local_addr)?,
            open_files: [None; MAX_OPEN_FILES],
        })
    }

    /// Opens `path`, creating it in its enclosing directory if `flags`
    /// contains [`OpenFlags::CREATE`] and `path` does not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TooManyOpenFiles`] if the table is full,
    /// [`ClientError::Remote`] if `path` does not exist and `CREATE` was
    /// not requested (or the enclosing directory does not resolve), or
    /// any [`ClientContext`] transport error.
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<usize, ClientError> {
        let slot = self
            .open_files
            .iter()
            .position(Option::is_none)
            .ok_or(ClientError::TooManyOpenFiles(MAX_OPEN_FILES))?;

        let (handle, size) = match self.ctx.lookup(path) {
            Ok(found) => (found.file, found.fsize),
            Err(ClientError::Remote(snfs_protocol::SnfsError::NotFound)) if flags.contains(OpenFlags::CREATE) => {
                let (parent_path, name) = split_parent(path)?;
                let parent = self.ctx.lookup(parent_path)?.file;
                (self.ctx.create(parent, name)?, 0)
            }
            Err(err) => return Err(err),
        };

        self.open_files[slot] = Some(OpenFile {
            handle,
            size,
            read_offset: 0,
            write_offset: size,
        });
        Ok(slot)
    }

    /// Reads into `buf` from the current read offset of `fd`, chunking
    /// across as many calls as `buf`'s length requires, and advances the
    /// read offset by the number of bytes actually read.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BadFileDescriptor`] if `fd` is not open, or
    /// any [`ClientContext`] error from an underlying `read` call.
    pub fn read(&mut self, fd: usize, buf: &mut [u8]) -> Result<usize, ClientError> {
        let mut file = self.file(fd)?;
        let mut total = 0;
        let outcome = loop {
            if total >= buf.len() {
                break Ok(total);
            }
            match self.ctx.read(file.handle, file.read_offset, &mut buf[total..]) {
                Ok(0) => break Ok(total),
                Ok(n) => {
                    file.read_offset += n;
                    total += n as usize;
                }
                Err(err) => break Err(err),
            }
        };
        self.open_files[fd] = Some(file);
        outcome
    }

    /// Writes `data` at the current write offset of `fd`, chunking across
    /// as many calls as `data`'s length requires. Per §9's resolution of
    /// the source's ambiguous offset bookkeeping, the write offset (and
    /// cached size) are advanced from the engine's reported `fsize` after
    /// each chunk, never from client-side arithmetic.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BadFileDescriptor`] if `fd` is not open, or
    /// any [`ClientContext`] error from an underlying `write` call.
    pub fn write(&mut self, fd: usize, data: &[u8]) -> Result<usize, ClientError> {
        let mut file = self.file(fd)?;
        let mut written = 0;
        let outcome = loop {
            if written >= data.len() {
                break Ok(written);
            }
            match self.ctx.write(file.handle, file.write_offset, &data[written..]) {
                Ok(fsize) => {
                    let chunk = (fsize - file.write_offset) as usize;
                    file.write_offset = fsize;
                    file.size = fsize;
                    written += chunk;
                    if chunk == 0 {
                        break Ok(written);
                    }
                }
                Err(err) => break Err(err),
            }
        };
        self.open_files[fd] = Some(file);
        outcome
    }

    /// Closes `fd`, freeing its slot in the open-file table.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::BadFileDescriptor`] if `fd` is not open.
    pub fn close(&mut self, fd: usize) -> Result<(), ClientError> {
        self.file(fd)?;
        self.open_files[fd] = None;
        Ok(())
    }

    /// Creates directory `path`, resolving its enclosing directory first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidPath`] if `path` has no enclosing
    /// directory, or any [`ClientContext`] error.
    pub fn mkdir(&mut self, path: &str) -> Result<u32, ClientError> {
        let (parent_path, name) = split_parent(path)?;
        let parent = self.ctx.lookup(parent_path)?.file;
        self.ctx.mkdir(parent, name)
    }

    /// Lists the entries of directory `path`.
    ///
    /// # Errors
    ///
    /// Returns any [`ClientContext`] error, including resolving `path`.
    pub fn listdir(&mut self, path: &str) -> Result<Vec<(String, InodeType)>, ClientError> {
        let dir = self.ctx.lookup(path)?.file;
        let entries: Vec<DirEntry> = self.ctx.readdir(dir, snfs_protocol::MAX_READDIR_ENTRIES)?;
        Ok(entries.into_iter().map(|e| (e.name, e.ty)).collect())
    }

    fn file(&self, fd: usize) -> Result<OpenFile, ClientError> {
        self.open_files
            .get(fd)
            .copied()
            .flatten()
            .ok_or(ClientError::BadFileDescriptor(fd))
    }
}

fn split_parent(path: &str) -> Result<(&str, &str), ClientError> {
    let (parent, name) = path
        .rsplit_once('/')
        .ok_or_else(|| ClientError::InvalidPath(path.to_owned()))?;
    Ok((if parent.is_empty() { "/" } else { parent }, name))
}

#[cfg(test)]
mod tests {
    use super::{split_parent, OpenFlags};

    #[test]
    fn split_parent_at_root() {
        assert_eq!(split_parent("/file1.txt").unwrap(), ("/", "file1.txt"));
    }

    #[test]
    fn split_parent_nested() {
        assert_eq!(split_parent("/mydir/file1.txt").unwrap(), ("/mydir", "file1.txt"));
    }

    #[test]
    fn split_parent_without_separator_fails() {
        assert!(split_parent("file1.txt").is_err());
    }

    #[test]
    fn create_flag_is_the_only_flag() {
        assert!(OpenFlags::CREATE.contains(OpenFlags::CREATE));
        assert!(!OpenFlags::empty().contains(OpenFlags::CREATE));
    }
}
