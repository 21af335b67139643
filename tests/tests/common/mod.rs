use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use block_io::MemoryBlockDevice;
use snfs_client::{ClientContext, FileClient};
use snfs_server::dispatch;
use snfs_server::engine::Engine;
use tempfile::TempDir;

/// A running server, its own in-memory device, bound to a socket under a
/// scratch directory that is removed when the last handle drops.
pub struct TestServer {
    dir: TempDir,
}

impl TestServer {
    fn socket_path(&self) -> PathBuf {
        self.dir.path().join("server.sock")
    }

    /// Connects a file-API client from a freshly bound local socket named
    /// `who`.
    pub fn connect(&self, who: &str) -> FileClient {
        FileClient::init(&self.socket_path(), &self.dir.path().join(who)).unwrap_or_else(|err| {
            panic!("failed to connect client {who:?}: {err}");
        })
    }

    /// Connects the raw stub, for calls (`ping`, `copy`) the file API does
    /// not cover.
    pub fn connect_stub(&self, who: &str) -> ClientContext {
        ClientContext::connect(&self.socket_path(), &self.dir.path().join(who)).unwrap_or_else(|err| {
            panic!("failed to connect client {who:?}: {err}");
        })
    }
}

/// Starts a server engine over a fresh in-memory device, serving on a
/// thread for the rest of the process's life.
pub fn spawn_server(num_blocks: u32) -> TestServer {
    let dir = tempfile::tempdir().expect("failed to create scratch dir");
    let socket_path = dir.path().join("server.sock");

    let device = Box::new(MemoryBlockDevice::new(num_blocks, Duration::ZERO));
    let engine = Arc::new(Engine::new(device, true).expect("failed to format test engine"));
    let socket = UnixDatagram::bind(&socket_path).expect("failed to bind test server socket");
    thread::spawn(move || dispatch::serve(&socket, &engine));

    TestServer { dir }
}
