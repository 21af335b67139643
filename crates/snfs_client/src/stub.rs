//! The client stub: builds requests, assigns serial numbers, and talks to
//! a server over a `UnixDatagram`.
//!
//! Deliberately not a process-wide singleton (§9 "Global mutable state"):
//! every piece of state `remote_call` needs — the socket, the server's
//! address, and the serial-number counter — lives on [`ClientContext`],
//! constructed explicitly by the caller.

use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, trace};
use snfs_protocol::{
    CopyArgs, CreateArgs, LookupArgs, MkdirArgs, PingArgs, ReadArgs, ReaddirArgs, SnfsRequest,
    SnfsRequestBody, SnfsResponse, SnfsResponseBody, WriteArgs, MAX_PATH_NAME_SIZE,
    MAX_PING_MSG_SIZE, MAX_READDIR_ENTRIES, MAX_READ_DATA, MAX_RESPONSE_WIRE_SIZE,
    MAX_WRITE_DATA,
};
use snfs_types::{InodeType, FS_MAX_FNAME_SZ};

use crate::error::ClientError;

/// One entry of a `readdir` response, resolved to owned, ergonomic types.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub inode_id: u32,
    pub name: String,
    pub ty: InodeType,
}

/// The result of a successful `lookup`: the handle and current size.
#[derive(Debug, Clone, Copy)]
pub struct Lookup {
    pub file: u32,
    pub fsize: u32,
}

/// A connected client: a bound local socket, the server's address, and a
/// monotonic serial-number counter. `Sync` via [`AtomicU32`] so a single
/// context may be shared across threads, the same way the engine shares
/// one [`std::sync::Mutex`] rather than handing each caller its own.
pub struct ClientContext {
    socket: UnixDatagram,
    next_sn: AtomicU32,
}

impl ClientContext {
    /// Binds a client-side socket at `local_addr` and connects it to
    /// `server_addr`, so subsequent calls can use `send`/`recv` without
    /// re-specifying the peer each time.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`] if the socket cannot be bound or
    /// connected.
    pub fn connect(server_addr: &Path, local_addr: &Path) -> Result<Self, ClientError> {
        let _ = std::fs::remove_file(local_addr);
        let socket = UnixDatagram::bind(local_addr).map_err(ClientError::Send)?;
        socket.connect(server_addr).map_err(ClientError::Send)?;
        Ok(Self {
            socket,
            next_sn: AtomicU32::new(1),
        })
    }

    /// Sends `body`, blocks for a response, and verifies its serial
    /// number before returning the typed body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Send`]/[`ClientError::RecvTimeout`] on
    /// socket failure, [`ClientError::ShortRead`] on a zero-length
    /// datagram, [`ClientError::Decode`] on a malformed response,
    /// [`ClientError::SerialNumberMismatch`] if the echoed `sn` does not
    /// match, or [`ClientError::Remote`] if the server reports failure.
    fn remote_call(&self, body: SnfsRequestBody) -> Result<SnfsResponseBody, ClientError> {
        let sn = self.next_sn.fetch_add(1, Ordering::Relaxed);
        let op = body.op();
        let request = SnfsRequest {
            sn,
            to_all_servers: false,
            body,
        };
        trace!("sn={sn} op={op:?} ->");
        self.socket.send(&request.encode()).map_err(ClientError::Send)?;

        let mut buf = [0_u8; MAX_RESPONSE_WIRE_SIZE];
        let n = self.socket.recv(&mut buf).map_err(ClientError::RecvTimeout)?;
        if n == 0 {
            return Err(ClientError::ShortRead);
        }
        let response = SnfsResponse::decode(&buf[..n], op)?;
        debug!("sn={sn} op={op:?} <- status={:?}", response.status);
        if response.sn != sn {
            return Err(ClientError::SerialNumberMismatch {
                expected: sn,
                got: response.sn,
            });
        }
        if !response.status.is_ok() {
            return Err(ClientError::Remote(response.status));
        }
        Ok(response.body)
    }

    /// Sends `msg` and expects it echoed back.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn ping(&self, msg: &str) -> Result<String, ClientError> {
        let body = SnfsRequestBody::Ping(PingArgs {
            msg: to_fixed::<MAX_PING_MSG_SIZE>(msg),
        });
        let SnfsResponseBody::Ping(result) = self.remote_call(body)? else {
            unreachable!("ping always yields a Ping response");
        };
        Ok(cstr_to_string(&result.msg))
    }

    /// Resolves `path` to a handle and its current size.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn lookup(&self, path: &str) -> Result<Lookup, ClientError> {
        let body = SnfsRequestBody::Lookup(LookupArgs {
            pname: to_fixed::<MAX_PATH_NAME_SIZE>(path),
        });
        let SnfsResponseBody::Lookup(result) = self.remote_call(body)? else {
            unreachable!("lookup always yields a Lookup response");
        };
        Ok(Lookup {
            file: result.file,
            fsize: result.fsize,
        })
    }

    /// Reads up to `buf.len()` bytes of file `fhandle` at `offset`,
    /// capped at [`MAX_READ_DATA`] per call.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn read(&self, fhandle: u32, offset: u32, buf: &mut [u8]) -> Result<u32, ClientError> {
        let count = buf.len().min(MAX_READ_DATA) as u32;
        let body = SnfsRequestBody::Read(ReadArgs::new(fhandle, offset, count));
        let SnfsResponseBody::Read(result) = self.remote_call(body)? else {
            unreachable!("read always yields a Read response");
        };
        let n = result.nread.min(count) as usize;
        buf[..n].copy_from_slice(&result.data[..n]);
        Ok(result.nread)
    }

    /// Writes up to [`MAX_WRITE_DATA`] bytes of `data` to file `fhandle`
    /// at `offset`, returning the file's new size.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn write(&self, fhandle: u32, offset: u32, data: &[u8]) -> Result<u32, ClientError> {
        let count = data.len().min(MAX_WRITE_DATA);
        let mut wire_data = [0_u8; MAX_WRITE_DATA];
        wire_data[..count].copy_from_slice(&data[..count]);
        let body = SnfsRequestBody::Write(WriteArgs::new(fhandle, offset, count as u32, wire_data));
        let SnfsResponseBody::Write(result) = self.remote_call(body)? else {
            unreachable!("write always yields a Write response");
        };
        Ok(result.fsize)
    }

    /// Creates a file named `name` in directory `dir`.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn create(&self, dir: u32, name: &str) -> Result<u32, ClientError> {
        let body = SnfsRequestBody::Create(CreateArgs::new(dir, to_fixed::<FS_MAX_FNAME_SZ>(name)));
        let SnfsResponseBody::Create(result) = self.remote_call(body)? else {
            unreachable!("create always yields a Create response");
        };
        Ok(result.file)
    }

    /// Creates a directory named `name` in directory `dir`.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn mkdir(&self, dir: u32, name: &str) -> Result<u32, ClientError> {
        let body = SnfsRequestBody::Mkdir(MkdirArgs::new(dir, to_fixed::<FS_MAX_FNAME_SZ>(name)));
        let SnfsResponseBody::Mkdir(result) = self.remote_call(body)? else {
            unreachable!("mkdir always yields a Mkdir response");
        };
        Ok(result.newdirid)
    }

    /// Lists up to `max` entries of directory `dir`.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn readdir(&self, dir: u32, max: usize) -> Result<Vec<DirEntry>, ClientError> {
        let cmax = max.min(MAX_READDIR_ENTRIES) as u32;
        let body = SnfsRequestBody::Readdir(ReaddirArgs { dir, cmax });
        let SnfsResponseBody::Readdir(result) = self.remote_call(body)? else {
            unreachable!("readdir always yields a Readdir response");
        };
        let count = (result.count as usize).min(MAX_READDIR_ENTRIES);
        Ok(result.entries[..count]
            .iter()
            .map(|e| DirEntry {
                inode_id: e.inode_id,
                name: cstr_to_string(&e.name),
                ty: InodeType::from_raw(e.ty),
            })
            .collect())
    }

    /// Copies the file at `src` to a new file at `tgt`.
    ///
    /// # Errors
    ///
    /// See [`ClientContext::remote_call`].
    pub fn copy(&self, src: &str, tgt: &str) -> Result<(), ClientError> {
        let body = SnfsRequestBody::Copy(CopyArgs {
            src_pathname: to_fixed::<MAX_PATH_NAME_SIZE>(src),
            tgt_pathname: to_fixed::<MAX_PATH_NAME_SIZE>(tgt),
        });
        self.remote_call(body)?;
        Ok(())
    }
}

fn to_fixed<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0_u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N - 1);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

fn cstr_to_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::to_fixed;

    #[test]
    fn to_fixed_truncates_and_nul_terminates() {
        let out = to_fixed::<4>("abcdef");
        assert_eq!(out, *b"abc\0");
    }

    #[test]
    fn to_fixed_pads_with_zeros() {
        let out = to_fixed::<4>("a");
        assert_eq!(out, *b"a\0\0\0");
    }
}
