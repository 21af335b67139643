//! The datagram request dispatcher: decodes a request off a `UnixDatagram`,
//! routes it to the engine by operation code, and sends back a response
//! echoing the request's serial number.
//!
//! One thread is spawned per received datagram, the same "thread per
//! session" shape the teacher's kernel uses for its own dispatch loop,
//! generalized from "per accepted connection" to "per accepted request"
//! since the transport here is connectionless.

use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use log::{debug, error, trace, warn};
use snfs_protocol::{
    CopyResult, CreateResult, LookupResult, MkdirResult, PingResult, ReadResult, ReaddirEntry,
    ReaddirResult, SnfsError, SnfsRequest, SnfsRequestBody, SnfsResponse, SnfsResponseBody,
    WriteResult, MAX_READDIR_ENTRIES, MAX_READ_DATA, MAX_REQUEST_WIRE_SIZE,
};
use snfs_types::InodeId;

use crate::engine::{DirListEntry, Engine, EngineError, LookupOutcome};

/// Runs the dispatch loop on `socket` forever, serving `engine`.
///
/// Each received datagram is handled on its own thread so that one slow
/// client (or one request blocked on simulated disk latency) cannot starve
/// the others; the engine's own locking makes this safe.
pub fn serve(socket: &UnixDatagram, engine: &Arc<Engine>) -> ! {
    loop {
        let mut buf = [0_u8; MAX_REQUEST_WIRE_SIZE];
        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(err) => {
                error!("recv_from failed: {err}");
                continue;
            }
        };
        let Some(path) = from.as_pathname().map(Path::to_path_buf) else {
            warn!("dropping datagram from an unnamed client socket");
            continue;
        };

        let engine = Arc::clone(engine);
        let reply_socket = match socket.try_clone() {
            Ok(s) => s,
            Err(err) => {
                error!("failed to clone server socket to answer {path:?}: {err}");
                continue;
            }
        };
        thread::spawn(move || handle_datagram(&reply_socket, &engine, &buf[..n], &path));
    }
}

fn handle_datagram(socket: &UnixDatagram, engine: &Engine, bytes: &[u8], from: &Path) {
    let request = match SnfsRequest::decode(bytes) {
        Ok(request) => request,
        Err(err) => {
            warn!("failed to decode request from {from:?}: {err}");
            return;
        }
    };
    trace!("sn={} op={:?} from {from:?}", request.sn, request.body.op());
    if request.to_all_servers {
        debug!("sn={} requests to_all_servers fan-out; no-op on a single server", request.sn);
    }

    let (status, body) = dispatch(engine, request.body);
    debug!("sn={} -> {status:?}", request.sn);
    let response = SnfsResponse {
        sn: request.sn,
        status,
        body,
    };
    if let Err(err) = socket.send_to(&response.encode(), from) {
        error!("failed to send response to {from:?}: {err}");
    }
}

fn dispatch(engine: &Engine, body: SnfsRequestBody) -> (SnfsError, SnfsResponseBody) {
    match body {
        SnfsRequestBody::Ping(args) => handle_ping(&args),
        SnfsRequestBody::Lookup(args) => handle_lookup(engine, &args),
        SnfsRequestBody::Read(args) => handle_read(engine, &args),
        SnfsRequestBody::Write(args) => handle_write(engine, &args),
        SnfsRequestBody::Create(args) => handle_create(engine, &args),
        SnfsRequestBody::Mkdir(args) => handle_mkdir(engine, &args),
        SnfsRequestBody::Readdir(args) => handle_readdir(engine, &args),
        SnfsRequestBody::Copy(args) => handle_copy(engine, &args),
    }
}

fn handle_ping(args: &snfs_protocol::PingArgs) -> (SnfsError, SnfsResponseBody) {
    (SnfsError::Ok, SnfsResponseBody::Ping(PingResult { msg: args.msg }))
}

fn handle_lookup(engine: &Engine, args: &snfs_protocol::LookupArgs) -> (SnfsError, SnfsResponseBody) {
    let empty = || SnfsResponseBody::Lookup(LookupResult { file: 0, fsize: 0 });
    let path = match cstr_str(&args.pname) {
        Ok(path) => path,
        Err(err) => return (SnfsError::from(&err), empty()),
    };
    match engine.lookup(path) {
        Ok(LookupOutcome::Found(id)) => match engine.get_attrs(id) {
            Ok(attrs) => (
                SnfsError::Ok,
                SnfsResponseBody::Lookup(LookupResult {
                    file: id.value(),
                    fsize: attrs.size,
                }),
            ),
            Err(err) => (SnfsError::from(&err), empty()),
        },
        Ok(LookupOutcome::NotFound) => (SnfsError::NotFound, empty()),
        Err(err) => (SnfsError::from(&err), empty()),
    }
}

fn handle_read(engine: &Engine, args: &snfs_protocol::ReadArgs) -> (SnfsError, SnfsResponseBody) {
    let count = (args.count as usize).min(MAX_READ_DATA);
    let mut data = [0_u8; MAX_READ_DATA];
    match engine.read(InodeId::new(args.fhandle), args.offset, &mut data[..count]) {
        Ok(nread) => (SnfsError::Ok, SnfsResponseBody::Read(ReadResult::new(nread, data))),
        Err(err) => (
            SnfsError::from(&err),
            SnfsResponseBody::Read(ReadResult::new(0, data)),
        ),
    }
}

fn handle_write(engine: &Engine, args: &snfs_protocol::WriteArgs) -> (SnfsError, SnfsResponseBody) {
    let count = (args.count as usize).min(snfs_protocol::MAX_WRITE_DATA);
    match engine.write(InodeId::new(args.fhandle), args.offset, &args.data[..count]) {
        Ok(fsize) => (SnfsError::Ok, SnfsResponseBody::Write(WriteResult { fsize })),
        Err(err) => (SnfsError::from(&err), SnfsResponseBody::Write(WriteResult { fsize: 0 })),
    }
}

fn handle_create(engine: &Engine, args: &snfs_protocol::CreateArgs) -> (SnfsError, SnfsResponseBody) {
    let empty = || SnfsResponseBody::Create(CreateResult { file: 0 });
    let name = match cstr_str(&args.name) {
        Ok(name) => name,
        Err(err) => return (SnfsError::from(&err), empty()),
    };
    match engine.create(InodeId::new(args.dir), name) {
        Ok(id) => (SnfsError::Ok, SnfsResponseBody::Create(CreateResult { file: id.value() })),
        Err(err) => (SnfsError::from(&err), empty()),
    }
}

fn handle_mkdir(engine: &Engine, args: &snfs_protocol::MkdirArgs) -> (SnfsError, SnfsResponseBody) {
    let empty = || SnfsResponseBody::Mkdir(MkdirResult { newdirid: 0 });
    let name = match cstr_str(&args.name) {
        Ok(name) => name,
        Err(err) => return (SnfsError::from(&err), empty()),
    };
    match engine.mkdir(InodeId::new(args.dir), name) {
        Ok(id) => (
            SnfsError::Ok,
            SnfsResponseBody::Mkdir(MkdirResult { newdirid: id.value() }),
        ),
        Err(err) => (SnfsError::from(&err), empty()),
    }
}

fn handle_readdir(engine: &Engine, args: &snfs_protocol::ReaddirArgs) -> (SnfsError, SnfsResponseBody) {
    let max = (args.cmax as usize).min(MAX_READDIR_ENTRIES);
    match engine.readdir(InodeId::new(args.dir), max) {
        Ok(list) => {
            let mut entries = [ReaddirEntry::new(0, 0, [0; snfs_types::FS_MAX_FNAME_SZ]); MAX_READDIR_ENTRIES];
            for (slot, entry) in entries.iter_mut().zip(&list) {
                *slot = readdir_entry(entry);
            }
            (
                SnfsError::Ok,
                SnfsResponseBody::Readdir(ReaddirResult {
                    count: list.len() as u32,
                    entries,
                }),
            )
        }
        Err(err) => (
            SnfsError::from(&err),
            SnfsResponseBody::Readdir(ReaddirResult {
                count: 0,
                entries: [ReaddirEntry::new(0, 0, [0; snfs_types::FS_MAX_FNAME_SZ]); MAX_READDIR_ENTRIES],
            }),
        ),
    }
}

fn readdir_entry(entry: &DirListEntry) -> ReaddirEntry {
    let mut name = [0_u8; snfs_types::FS_MAX_FNAME_SZ];
    let bytes = entry.name.as_bytes();
    let len = bytes.len().min(name.len());
    name[..len].copy_from_slice(&bytes[..len]);
    ReaddirEntry::new(entry.inode_id.value(), entry.ty.raw(), name)
}

fn handle_copy(engine: &Engine, args: &snfs_protocol::CopyArgs) -> (SnfsError, SnfsResponseBody) {
    let empty = || SnfsResponseBody::Copy(CopyResult {});
    let src = match cstr_str(&args.src_pathname) {
        Ok(src) => src,
        Err(err) => return (SnfsError::from(&err), empty()),
    };
    let tgt = match cstr_str(&args.tgt_pathname) {
        Ok(tgt) => tgt,
        Err(err) => return (SnfsError::from(&err), empty()),
    };
    match engine.copy(src, tgt) {
        Ok(_) => (SnfsError::Ok, empty()),
        Err(err) => (SnfsError::from(&err), empty()),
    }
}

/// Extracts the NUL-terminated string out of a fixed-size wire byte array.
fn cstr_str(bytes: &[u8]) -> Result<&str, EngineError> {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    str::from_utf8(&bytes[..len]).map_err(|_| EngineError::MalformedArguments)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use block_io::MemoryBlockDevice;
    use snfs_protocol::{CreateArgs, LookupArgs, PingArgs};
    use snfs_types::{ROOT_INODE_ID, FS_MAX_FNAME_SZ};

    use super::{dispatch, SnfsError, SnfsRequestBody};
    use crate::engine::Engine;

    fn fresh_engine() -> Engine {
        let device = Box::new(MemoryBlockDevice::new(64, Duration::ZERO));
        Engine::new(device, true).unwrap()
    }

    #[test]
    fn ping_echoes_message() {
        let engine = fresh_engine();
        let mut msg = [0_u8; snfs_protocol::MAX_PING_MSG_SIZE];
        msg[..5].copy_from_slice(b"hello");
        let (status, body) = dispatch(&engine, SnfsRequestBody::Ping(PingArgs { msg }));
        assert_eq!(status, SnfsError::Ok);
        match body {
            super::SnfsResponseBody::Ping(r) => assert_eq!(r.msg, msg),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn lookup_of_root_succeeds() {
        let engine = fresh_engine();
        let mut pname = [0_u8; snfs_protocol::MAX_PATH_NAME_SIZE];
        pname[0] = b'/';
        let (status, body) = dispatch(&engine, SnfsRequestBody::Lookup(LookupArgs { pname }));
        assert_eq!(status, SnfsError::Ok);
        match body {
            super::SnfsResponseBody::Lookup(r) => assert_eq!(r.file, ROOT_INODE_ID.value()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn create_then_lookup_round_trips() {
        let engine = fresh_engine();
        let mut name = [0_u8; FS_MAX_FNAME_SZ];
        name[..5].copy_from_slice(b"hi.md");
        let (status, body) = dispatch(
            &engine,
            SnfsRequestBody::Create(CreateArgs::new(ROOT_INODE_ID.value(), name)),
        );
        assert_eq!(status, SnfsError::Ok);
        let super::SnfsResponseBody::Create(created) = body else {
            panic!("wrong variant");
        };
        assert_ne!(created.file, 0);

        let mut pname = [0_u8; snfs_protocol::MAX_PATH_NAME_SIZE];
        pname[..6].copy_from_slice(b"/hi.md");
        let (status, body) = dispatch(&engine, SnfsRequestBody::Lookup(LookupArgs { pname }));
        assert_eq!(status, SnfsError::Ok);
        match body {
            super::SnfsResponseBody::Lookup(r) => assert_eq!(r.file, created.file),
            _ => panic!("wrong variant"),
        }
    }
}
