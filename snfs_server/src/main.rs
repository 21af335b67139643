//! `snfs_server`: binds a datagram socket and serves the file-system engine
//! over it.

use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use block_io::{BlockDevice, FileBlockDevice, MemoryBlockDevice};
use clap::Parser;
use log::info;
use snfs_server::dispatch;
use snfs_server::engine::Engine;

/// Default device size, matching the source's sample single-server
/// configuration.
const DEFAULT_NUM_BLOCKS: u32 = 1024;

#[derive(Debug, Parser)]
#[command(author, version, about = "SNFS server: serves the file system over a Unix datagram socket")]
struct Args {
    /// Path to bind the server's `AF_UNIX SOCK_DGRAM` socket at.
    #[arg(long)]
    socket: PathBuf,

    /// Number of blocks in the simulated device.
    #[arg(long, default_value_t = DEFAULT_NUM_BLOCKS)]
    num_blocks: u32,

    /// Per-access simulated disk latency, in microseconds.
    #[arg(long, default_value_t = 0)]
    delay_micros: u64,

    /// Back the device with a file at this path instead of an in-memory
    /// buffer. Reopens an existing image unless `--format` is also given.
    #[arg(long)]
    disk: Option<PathBuf>,

    /// Force a fresh format, even if `--disk` points at an existing image.
    #[arg(long)]
    format: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let delay = Duration::from_micros(args.delay_micros);
    let device: Box<dyn BlockDevice + Send + Sync> = match &args.disk {
        Some(path) => {
            info!("opening file-backed device at {path:?} ({} blocks)", args.num_blocks);
            Box::new(FileBlockDevice::open(path, args.num_blocks, delay).unwrap_or_else(|err| {
                eprintln!("failed to open {path:?}: {err}");
                std::process::exit(1);
            }))
        }
        None => {
            info!("using an in-memory device ({} blocks)", args.num_blocks);
            Box::new(MemoryBlockDevice::new(args.num_blocks, delay))
        }
    };
    let format = args.format || args.disk.is_none();

    let engine = Arc::new(Engine::new(device, format).unwrap_or_else(|err| {
        eprintln!("failed to initialize file system: {err}");
        std::process::exit(1);
    }));

    let _ = std::fs::remove_file(&args.socket);
    let socket = UnixDatagram::bind(&args.socket).unwrap_or_else(|err| {
        eprintln!("failed to bind {:?}: {err}", args.socket);
        std::process::exit(1);
    });
    info!("listening on {:?}", args.socket);

    dispatch::serve(&socket, &engine);
}
